//! Kiln reference resolver.
//!
//! [`discover`] finds the library references a source file needs by
//! binding it and walking every node's symbol. It never fails: whatever
//! cannot be resolved is left for the compiler to report.

mod discover;
mod host;

pub use discover::{discover, discover_standard};
pub use host::{standard_location, HostRegistry};

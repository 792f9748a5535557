//! Kiln WASM code generator: bound AST to `.wasm` binary.
//!
//! # Architecture
//!
//! The code generator takes a [`kiln_types::ast::Program`] that bound
//! without errors, plus its [`kiln_binder::SemanticModel`], and produces a
//! self-contained `.wasm` module:
//!
//! ## Imports
//! - `rt.trap(ptr, len)`, `rt.deadline()`
//! - `rt.to_string(v) → v`, `rt.concat(a, b) → v`, `rt.equals(a, b) → i32`
//! - one `<library>.<name>(v…) → v` per library function the program calls
//!
//! ## Exports
//! - `memory`, `alloc(size) → ptr`
//! - globals `heap_ptr` and `gas_limit`
//! - every user function, by name
//!
//! ## Custom sections
//! - `kiln.entry`, `kiln.references`, `kiln.version` (see [`manifest`])
//!
//! ## Value Representation
//!
//! Every Kiln value is a heap-allocated 12-byte cell:
//! `[tag: i32, payload: 8 bytes]`.  See [`types`] for tag constants.

pub mod artifact;
pub mod compiler;
pub mod error;
pub mod expr;
pub mod fold;
pub mod gas;
pub mod manifest;
pub mod runtime;
pub mod stmt;
pub mod types;

pub use artifact::CompiledArtifact;
pub use compiler::{emit, EmitOptions, Optimization};
pub use error::{CodegenError, CodegenResult};
pub use manifest::{read_manifest, Manifest};

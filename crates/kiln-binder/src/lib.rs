//! Kiln binder: resolves every name in a parsed program.
//!
//! The binder knows the library [`Catalog`] (which library symbols exist)
//! and checks library use against a [`ReferenceSet`](kiln_types::ReferenceSet).
//! Its output is a [`SemanticModel`] mapping AST nodes to [`Symbol`]s.

mod binder;
mod env;
mod library;
mod model;
mod symbol;

pub use binder::{bind, BindOptions, BindResult, OutputKind, ENTRY_FUNCTION, INDEXER};
pub use env::{Env, ScopeKind};
pub use library::{Catalog, Library, LibraryConstant, LibraryFunction, Visibility};
pub use model::{EntryPoint, SemanticModel};
pub use symbol::{Symbol, SymbolKind};

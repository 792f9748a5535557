//! Symbols produced by binding.

use std::fmt;

use crate::library::Visibility;

/// What a name or expression refers to.
#[derive(Debug, Clone, PartialEq)]
pub enum Symbol {
    /// A library name used as a qualifier (`math` in `math.sqrt`).
    Namespace { library: String },
    /// A function declared in the source.
    Function { name: String, arity: usize },
    /// A parameter of a source function. `slot` is its local index.
    Parameter { name: String, slot: u32 },
    /// A `let` or `for` variable. `slot` is unique within the function.
    Local { name: String, slot: u32 },
    LibraryFunction {
        library: String,
        name: String,
        arity: usize,
        visibility: Visibility,
    },
    LibraryConstant {
        library: String,
        name: String,
        value: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Namespace,
    Function,
    Parameter,
    Local,
    LibraryFunction,
    LibraryConstant,
}

impl Symbol {
    pub fn kind(&self) -> SymbolKind {
        match self {
            Symbol::Namespace { .. } => SymbolKind::Namespace,
            Symbol::Function { .. } => SymbolKind::Function,
            Symbol::Parameter { .. } => SymbolKind::Parameter,
            Symbol::Local { .. } => SymbolKind::Local,
            Symbol::LibraryFunction { .. } => SymbolKind::LibraryFunction,
            Symbol::LibraryConstant { .. } => SymbolKind::LibraryConstant,
        }
    }

    /// The library that defines this symbol. `None` for symbols declared
    /// by the source itself.
    pub fn containing_library(&self) -> Option<&str> {
        match self {
            Symbol::Namespace { library }
            | Symbol::LibraryFunction { library, .. }
            | Symbol::LibraryConstant { library, .. } => Some(library),
            Symbol::Function { .. } | Symbol::Parameter { .. } | Symbol::Local { .. } => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Symbol::Namespace { library } => library,
            Symbol::Function { name, .. }
            | Symbol::Parameter { name, .. }
            | Symbol::Local { name, .. }
            | Symbol::LibraryFunction { name, .. }
            | Symbol::LibraryConstant { name, .. } => name,
        }
    }

    /// Local slot for variables and parameters.
    pub fn slot(&self) -> Option<u32> {
        match self {
            Symbol::Parameter { slot, .. } | Symbol::Local { slot, .. } => Some(*slot),
            _ => None,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::LibraryFunction { library, name, .. }
            | Symbol::LibraryConstant { library, name, .. } => write!(f, "{library}.{name}"),
            other => f.write_str(other.name()),
        }
    }
}

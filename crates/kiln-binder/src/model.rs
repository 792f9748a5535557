//! The semantic model: what binding learned about a program.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use kiln_types::ast::NodeId;
use serde::{Deserialize, Serialize};

use crate::symbol::Symbol;

/// How a compiled executable is entered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPoint {
    /// Export name of the entry function.
    pub export: String,
    /// 0 or 1: whether the entry receives the argument list.
    pub params: u32,
    /// The entry returns a task the host must drive to completion.
    pub returns_task: bool,
}

/// Per-node symbols plus the program-wide facts codegen needs.
#[derive(Debug, Clone, Default)]
pub struct SemanticModel {
    /// Symbol an expression refers to, keyed by expression id.
    references: HashMap<NodeId, Symbol>,
    /// Symbol a declaration introduces, keyed by declaration id.
    declarations: HashMap<NodeId, Symbol>,
    /// Library functions the program calls, as `(library, name) -> arity`.
    used_functions: BTreeMap<(String, String), usize>,
    /// Libraries whose symbols the program uses.
    used_libraries: BTreeSet<String>,
    /// Slots used per user function, parameters included.
    local_counts: HashMap<String, u32>,
    entry_point: Option<EntryPoint>,
}

impl SemanticModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// The symbol a node refers to (identifier, member access, call, index).
    pub fn symbol_info(&self, node: NodeId) -> Option<&Symbol> {
        self.references.get(&node)
    }

    /// The symbol a declaration node introduces (function, parameter, `let`,
    /// `for`).
    pub fn declared_symbol(&self, node: NodeId) -> Option<&Symbol> {
        self.declarations.get(&node)
    }

    pub fn used_libraries(&self) -> impl Iterator<Item = &str> {
        self.used_libraries.iter().map(String::as_str)
    }

    /// Library functions the program calls, sorted by library then name.
    pub fn used_functions(&self) -> impl Iterator<Item = (&str, &str, usize)> {
        self.used_functions
            .iter()
            .map(|((lib, name), arity)| (lib.as_str(), name.as_str(), *arity))
    }

    pub fn local_count(&self, function: &str) -> u32 {
        self.local_counts.get(function).copied().unwrap_or(0)
    }

    pub fn entry_point(&self) -> Option<&EntryPoint> {
        self.entry_point.as_ref()
    }

    pub(crate) fn record_reference(&mut self, node: NodeId, symbol: Symbol) {
        match &symbol {
            Symbol::LibraryFunction {
                library,
                name,
                arity,
                ..
            } => {
                self.used_libraries.insert(library.clone());
                self.used_functions
                    .insert((library.clone(), name.clone()), *arity);
            }
            Symbol::LibraryConstant { library, .. } => {
                self.used_libraries.insert(library.clone());
            }
            _ => {}
        }
        self.references.insert(node, symbol);
    }

    pub(crate) fn record_declaration(&mut self, node: NodeId, symbol: Symbol) {
        self.declarations.insert(node, symbol);
    }

    pub(crate) fn set_local_count(&mut self, function: &str, count: u32) {
        self.local_counts.insert(function.to_string(), count);
    }

    pub(crate) fn set_entry_point(&mut self, entry: EntryPoint) {
        self.entry_point = Some(entry);
    }
}

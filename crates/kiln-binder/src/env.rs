//! Lexically scoped name environment.
//!
//! [`Env`] manages a stack of scopes, each carrying the variables declared
//! in it, and hands out local slots for the function being bound.

use std::collections::HashMap;

use crate::symbol::Symbol;

// ══════════════════════════════════════════════════════════════════════════════
// Scope Kind
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// A function body; parameters live here.
    Function,
    /// An `if`/`else` block.
    Block,
    /// A `while` or `for` body: `break` and `continue` are allowed.
    Loop,
}

#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    bindings: HashMap<String, Symbol>,
}

// ══════════════════════════════════════════════════════════════════════════════
// Env
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct Env {
    scopes: Vec<Scope>,
    next_slot: u32,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start binding a new function. Resets slot numbering.
    pub fn enter_function(&mut self) {
        self.scopes.clear();
        self.next_slot = 0;
        self.push_scope(ScopeKind::Function);
    }

    /// Finish the current function and return how many slots it used.
    pub fn exit_function(&mut self) -> u32 {
        self.scopes.clear();
        self.next_slot
    }

    pub fn push_scope(&mut self, kind: ScopeKind) {
        self.scopes.push(Scope {
            kind,
            bindings: HashMap::new(),
        });
    }

    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Declare a parameter in the current scope.
    ///
    /// Returns `None` if the name is already declared in this scope.
    pub fn declare_parameter(&mut self, name: &str) -> Option<Symbol> {
        let symbol = Symbol::Parameter {
            name: name.to_string(),
            slot: self.next_slot,
        };
        self.declare(name, symbol)
    }

    /// Declare a local in the current scope. Shadowing an outer scope's
    /// name is allowed; redeclaring in the same scope is not.
    pub fn declare_local(&mut self, name: &str) -> Option<Symbol> {
        let symbol = Symbol::Local {
            name: name.to_string(),
            slot: self.next_slot,
        };
        self.declare(name, symbol)
    }

    fn declare(&mut self, name: &str, symbol: Symbol) -> Option<Symbol> {
        let scope = self.scopes.last_mut()?;
        if scope.bindings.contains_key(name) {
            return None;
        }
        scope.bindings.insert(name.to_string(), symbol.clone());
        self.next_slot += 1;
        Some(symbol)
    }

    /// Look up a variable, innermost scope first.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.bindings.get(name))
    }

    /// Whether a loop encloses the current position.
    pub fn in_loop(&self) -> bool {
        self.scopes.iter().any(|s| s.kind == ScopeKind::Loop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_are_unique_per_function() {
        let mut env = Env::new();
        env.enter_function();
        let p = env.declare_parameter("a").unwrap();
        env.push_scope(ScopeKind::Block);
        let x = env.declare_local("x").unwrap();
        env.pop_scope();
        env.push_scope(ScopeKind::Block);
        let y = env.declare_local("x").unwrap();
        assert_eq!(p.slot(), Some(0));
        assert_eq!(x.slot(), Some(1));
        assert_eq!(y.slot(), Some(2));
        assert_eq!(env.exit_function(), 3);
    }

    #[test]
    fn test_shadowing_and_redeclaration() {
        let mut env = Env::new();
        env.enter_function();
        assert!(env.declare_local("x").is_some());
        assert!(env.declare_local("x").is_none());
        env.push_scope(ScopeKind::Block);
        assert!(env.declare_local("x").is_some());
        assert_eq!(env.lookup("x").and_then(Symbol::slot), Some(1));
        env.pop_scope();
        assert_eq!(env.lookup("x").and_then(Symbol::slot), Some(0));
    }

    #[test]
    fn test_loop_tracking() {
        let mut env = Env::new();
        env.enter_function();
        assert!(!env.in_loop());
        env.push_scope(ScopeKind::Loop);
        env.push_scope(ScopeKind::Block);
        assert!(env.in_loop());
        env.pop_scope();
        env.pop_scope();
        assert!(!env.in_loop());
    }
}

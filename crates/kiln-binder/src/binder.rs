//! Name binding: walks a parsed program and resolves every name.
//!
//! Entry point: [`bind`].
//!
//! Diagnostic codes emitted:
//! - K200: unknown name / K205: unknown library member
//! - K201: wrong argument count / K206: call of a non-function
//! - K202: duplicate declaration / K203: `set` on a non-variable
//! - K204: `break`/`continue` outside a loop
//! - K207, K208: function or library name used as a value
//! - K301, K302, K303: reference checks
//! - K400, K401: entry point checks (executables only)

use std::collections::{HashMap, HashSet};

use kiln_types::ast::*;
use kiln_types::{Diagnostic, DiagnosticCode, Diagnostics, ReferenceSet, SourceFile, Span};
use serde::{Deserialize, Serialize};

use crate::env::{Env, ScopeKind};
use crate::library::{Catalog, Visibility};
use crate::model::{EntryPoint, SemanticModel};
use crate::symbol::Symbol;

/// Name of the function an executable starts in.
pub const ENTRY_FUNCTION: &str = "main";

/// The library and function that index expressions bind to.
pub const INDEXER: (&str, &str) = ("list", "get");

/// What the compilation produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// Runnable program; an entry point is expected.
    #[default]
    Executable,
    /// No entry point required.
    Library,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BindOptions {
    /// Let `Internal` library symbols bind.
    pub ignore_accessibility: bool,
    pub output: OutputKind,
}

/// Result of binding: always a model, plus whatever went wrong.
#[derive(Debug, Clone)]
pub struct BindResult {
    pub model: SemanticModel,
    pub diagnostics: Diagnostics,
}

/// Bind `program` against `catalog`, checking library use against `refs`.
///
/// Never fails: unresolved names are reported and left without a symbol.
pub fn bind(
    program: &Program,
    source: &SourceFile,
    catalog: &Catalog,
    refs: &ReferenceSet,
    options: BindOptions,
) -> BindResult {
    let mut binder = Binder::new(source, catalog, refs, options);
    binder.bind_program(program);
    BindResult {
        model: binder.model,
        diagnostics: binder.diagnostics,
    }
}

/// How an expression bound.
#[derive(Debug, Clone)]
enum Bound {
    /// The expression names a symbol.
    Symbol(Symbol),
    /// An ordinary value with no symbol of its own.
    Value,
    /// Resolution failed; a diagnostic was already reported.
    Unresolved,
}

// ══════════════════════════════════════════════════════════════════════════════
// Binder
// ══════════════════════════════════════════════════════════════════════════════

struct Binder<'a> {
    source: &'a SourceFile,
    catalog: &'a Catalog,
    refs: &'a ReferenceSet,
    options: BindOptions,
    env: Env,
    /// User function name → arity.
    functions: HashMap<String, usize>,
    /// `(library, dependency)` pairs already reported as missing.
    reported_dependencies: HashSet<(String, String)>,
    model: SemanticModel,
    diagnostics: Diagnostics,
}

impl<'a> Binder<'a> {
    fn new(
        source: &'a SourceFile,
        catalog: &'a Catalog,
        refs: &'a ReferenceSet,
        options: BindOptions,
    ) -> Self {
        Self {
            source,
            catalog,
            refs,
            options,
            env: Env::new(),
            functions: HashMap::new(),
            reported_dependencies: HashSet::new(),
            model: SemanticModel::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    fn bind_program(&mut self, program: &Program) {
        for f in &program.functions {
            if self.functions.contains_key(&f.name.name) {
                self.error(
                    DiagnosticCode::DUPLICATE_DECLARATION,
                    format!("a function named '{}' is already defined", f.name.name),
                    f.name.span,
                );
                continue;
            }
            self.functions.insert(f.name.name.clone(), f.params.len());
            self.model.record_declaration(
                f.id,
                Symbol::Function {
                    name: f.name.name.clone(),
                    arity: f.params.len(),
                },
            );
        }

        for f in &program.functions {
            self.bind_function(f);
        }

        if self.options.output == OutputKind::Executable {
            self.check_entry_point(program);
        }
    }

    fn bind_function(&mut self, f: &FnDecl) {
        self.env.enter_function();
        for param in &f.params {
            match self.env.declare_parameter(&param.name.name) {
                Some(symbol) => self.model.record_declaration(param.id, symbol),
                None => self.error(
                    DiagnosticCode::DUPLICATE_DECLARATION,
                    format!("parameter '{}' is declared more than once", param.name.name),
                    param.name.span,
                ),
            }
        }
        for stmt in &f.body.stmts {
            self.bind_stmt(stmt);
        }
        let count = self.env.exit_function();
        self.model.set_local_count(&f.name.name, count);
    }

    fn check_entry_point(&mut self, program: &Program) {
        let Some(main) = program.function(ENTRY_FUNCTION) else {
            let span = Span::point(1, 1);
            let line = self.source_line(span);
            self.diagnostics.push(Diagnostic::warning(
                &self.source.name,
                DiagnosticCode::MISSING_ENTRY_POINT,
                "program does not define a 'main' function suitable for an entry point",
                span,
                line,
            ));
            return;
        };

        if main.params.len() > 1 {
            self.error(
                DiagnosticCode::INVALID_ENTRY_POINT,
                "'main' must take no parameters or a single list of arguments",
                main.name.span,
            );
            return;
        }
        if let Some(param) = main.params.first() {
            if let Some(ann) = &param.type_ann {
                if !matches!(ann.kind, TypeKind::List | TypeKind::Any) {
                    self.error(
                        DiagnosticCode::INVALID_ENTRY_POINT,
                        format!("the argument parameter of 'main' must be a list, found {}", ann.kind),
                        ann.span,
                    );
                    return;
                }
            }
        }

        let returns_task = main
            .ret
            .as_ref()
            .is_some_and(|ann| ann.kind == TypeKind::Task);
        self.model.set_entry_point(EntryPoint {
            export: ENTRY_FUNCTION.to_string(),
            params: main.params.len() as u32,
            returns_task,
        });
    }

    // ══════════════════════════════════════════════════════════════════════
    // Statements
    // ══════════════════════════════════════════════════════════════════════

    fn bind_block(&mut self, block: &Block, kind: ScopeKind) {
        self.env.push_scope(kind);
        for stmt in &block.stmts {
            self.bind_stmt(stmt);
        }
        self.env.pop_scope();
    }

    fn bind_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Let(let_stmt) => {
                // The initializer cannot see the variable it initializes.
                self.bind_value(&let_stmt.value);
                match self.env.declare_local(&let_stmt.name.name) {
                    Some(symbol) => self.model.record_declaration(let_stmt.id, symbol),
                    None => self.error(
                        DiagnosticCode::DUPLICATE_DECLARATION,
                        format!(
                            "a variable named '{}' is already defined in this scope",
                            let_stmt.name.name
                        ),
                        let_stmt.name.span,
                    ),
                }
            }
            Stmt::Set(set) => {
                self.bind_value(&set.value);
                self.bind_assignment(set);
            }
            Stmt::If(if_stmt) => self.bind_if(if_stmt),
            Stmt::While(while_stmt) => {
                self.bind_value(&while_stmt.condition);
                self.bind_block(&while_stmt.body, ScopeKind::Loop);
            }
            Stmt::For(for_stmt) => {
                self.bind_value(&for_stmt.iterable);
                self.env.push_scope(ScopeKind::Loop);
                if let Some(symbol) = self.env.declare_local(&for_stmt.item.name) {
                    self.model.record_declaration(for_stmt.id, symbol);
                }
                for stmt in &for_stmt.body.stmts {
                    self.bind_stmt(stmt);
                }
                self.env.pop_scope();
            }
            Stmt::Return(ret) => {
                if let Some(value) = &ret.value {
                    self.bind_value(value);
                }
            }
            Stmt::Break(span) | Stmt::Continue(span) => {
                if !self.env.in_loop() {
                    self.error(
                        DiagnosticCode::LOOP_CONTROL_OUTSIDE_LOOP,
                        "no enclosing loop out of which to break or continue",
                        *span,
                    );
                }
            }
            Stmt::Expr(expr) => self.bind_value(expr),
        }
    }

    fn bind_if(&mut self, if_stmt: &IfStmt) {
        self.bind_value(&if_stmt.condition);
        self.bind_block(&if_stmt.then_block, ScopeKind::Block);
        match &if_stmt.else_branch {
            Some(ElseBranch::ElseIf(nested)) => self.bind_if(nested),
            Some(ElseBranch::Block(block)) => self.bind_block(block, ScopeKind::Block),
            None => {}
        }
    }

    fn bind_assignment(&mut self, set: &SetStmt) {
        let name = &set.target.name;
        if let Some(symbol) = self.env.lookup(name).cloned() {
            self.model.record_reference(set.id, symbol);
            return;
        }
        match self.lookup_global(name) {
            Some(_) => self.error(
                DiagnosticCode::INVALID_ASSIGNMENT,
                format!("cannot assign to '{name}' because it is not a variable"),
                set.target.span,
            ),
            None => self.unknown_name(name, set.target.span),
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Expressions
    // ══════════════════════════════════════════════════════════════════════

    /// Bind an expression whose result is used as a runtime value.
    fn bind_value(&mut self, expr: &Expr) {
        match self.bind_expr(expr) {
            Bound::Symbol(Symbol::Function { name, .. }) => self.error(
                DiagnosticCode::FUNCTION_AS_VALUE,
                format!("function '{name}' cannot be used as a value; call it instead"),
                expr.span,
            ),
            Bound::Symbol(symbol @ Symbol::LibraryFunction { .. }) => self.error(
                DiagnosticCode::FUNCTION_AS_VALUE,
                format!("function '{symbol}' cannot be used as a value; call it instead"),
                expr.span,
            ),
            Bound::Symbol(Symbol::Namespace { library }) => self.error(
                DiagnosticCode::NAMESPACE_AS_VALUE,
                format!("library '{library}' cannot be used as a value"),
                expr.span,
            ),
            _ => {}
        }
    }

    fn bind_expr(&mut self, expr: &Expr) -> Bound {
        match &expr.kind {
            ExprKind::NumberLit(_)
            | ExprKind::StringLit(_)
            | ExprKind::BoolLit(_)
            | ExprKind::NilLit => Bound::Value,

            ExprKind::StringInterpolation(parts) => {
                for part in parts {
                    if let StringPart::Expr(e) = part {
                        self.bind_value(e);
                    }
                }
                Bound::Value
            }

            ExprKind::ListLit(items) => {
                for item in items {
                    self.bind_value(item);
                }
                Bound::Value
            }

            ExprKind::Identifier(name) => self.bind_identifier(expr, name),

            ExprKind::Member { object, name } => self.bind_member(expr, object, name),

            ExprKind::Call { callee, args } => self.bind_call(expr, callee, args),

            ExprKind::Index { object, index } => {
                self.bind_value(object);
                self.bind_value(index);
                let (library, name) = INDEXER;
                if let Some(symbol) = self.library_function(library, name) {
                    self.check_library_symbol(&symbol, expr.span);
                    self.model.record_reference(expr.id, symbol);
                }
                Bound::Value
            }

            ExprKind::Binary { left, right, .. } => {
                self.bind_value(left);
                self.bind_value(right);
                Bound::Value
            }

            ExprKind::Unary { operand, .. } => {
                self.bind_value(operand);
                Bound::Value
            }

            ExprKind::Paren(inner) => self.bind_expr(inner),
        }
    }

    fn bind_identifier(&mut self, expr: &Expr, name: &str) -> Bound {
        let symbol = match self.env.lookup(name) {
            Some(symbol) => symbol.clone(),
            None => match self.lookup_global(name) {
                Some(symbol) => symbol,
                None => {
                    self.unknown_name(name, expr.span);
                    return Bound::Unresolved;
                }
            },
        };
        if symbol.kind() == crate::symbol::SymbolKind::LibraryFunction {
            self.check_library_symbol(&symbol, expr.span);
        }
        self.model.record_reference(expr.id, symbol.clone());
        Bound::Symbol(symbol)
    }

    fn bind_member(&mut self, expr: &Expr, object: &Expr, member: &Ident) -> Bound {
        let library = match self.bind_expr(object) {
            Bound::Symbol(Symbol::Namespace { library }) => library,
            Bound::Unresolved => return Bound::Unresolved,
            Bound::Symbol(symbol) => {
                self.error(
                    DiagnosticCode::UNKNOWN_MEMBER,
                    format!("'{symbol}' has no members; '.{}' needs a library name", member.name),
                    member.span,
                );
                return Bound::Unresolved;
            }
            Bound::Value => {
                self.error(
                    DiagnosticCode::UNKNOWN_MEMBER,
                    format!("values have no members; '.{}' needs a library name", member.name),
                    member.span,
                );
                return Bound::Unresolved;
            }
        };

        let symbol = self
            .library_function(&library, &member.name)
            .or_else(|| self.library_constant(&library, &member.name));
        match symbol {
            Some(symbol) => {
                self.check_library_symbol(&symbol, expr.span);
                self.model.record_reference(expr.id, symbol.clone());
                Bound::Symbol(symbol)
            }
            None => {
                self.error(
                    DiagnosticCode::UNKNOWN_MEMBER,
                    format!(
                        "library '{library}' does not contain a definition for '{}'",
                        member.name
                    ),
                    member.span,
                );
                Bound::Unresolved
            }
        }
    }

    fn bind_call(&mut self, expr: &Expr, callee: &Expr, args: &[Expr]) -> Bound {
        let target = self.bind_expr(callee);
        for arg in args {
            self.bind_value(arg);
        }

        let (display, arity) = match &target {
            Bound::Symbol(Symbol::Function { name, arity }) => (name.clone(), *arity),
            Bound::Symbol(symbol @ Symbol::LibraryFunction { arity, .. }) => {
                (symbol.to_string(), *arity)
            }
            Bound::Symbol(symbol) => {
                self.error(
                    DiagnosticCode::NOT_CALLABLE,
                    format!("'{symbol}' is not a function"),
                    callee.span,
                );
                return Bound::Value;
            }
            Bound::Value => {
                self.error(
                    DiagnosticCode::NOT_CALLABLE,
                    "expression is not callable",
                    callee.span,
                );
                return Bound::Value;
            }
            Bound::Unresolved => return Bound::Value,
        };

        if args.len() != arity {
            self.error(
                DiagnosticCode::WRONG_ARG_COUNT,
                format!(
                    "'{display}' takes {arity} argument{} but {} {} given",
                    if arity == 1 { "" } else { "s" },
                    args.len(),
                    if args.len() == 1 { "was" } else { "were" },
                ),
                expr.span,
            );
        }
        if let Bound::Symbol(symbol) = target {
            self.model.record_reference(expr.id, symbol);
        }
        Bound::Value
    }

    // ══════════════════════════════════════════════════════════════════════
    // Lookup
    // ══════════════════════════════════════════════════════════════════════

    /// Non-local lookup: user functions, then library names, then globals.
    fn lookup_global(&self, name: &str) -> Option<Symbol> {
        if let Some(arity) = self.functions.get(name) {
            return Some(Symbol::Function {
                name: name.to_string(),
                arity: *arity,
            });
        }
        if self.catalog.library(name).is_some() {
            return Some(Symbol::Namespace {
                library: name.to_string(),
            });
        }
        self.catalog
            .global(name)
            .map(|(library, f)| Symbol::LibraryFunction {
                library: library.name.clone(),
                name: f.name.clone(),
                arity: f.arity,
                visibility: f.visibility,
            })
    }

    fn library_function(&self, library: &str, name: &str) -> Option<Symbol> {
        let lib = self.catalog.library(library)?;
        let f = lib.get_function(name)?;
        Some(Symbol::LibraryFunction {
            library: lib.name.clone(),
            name: f.name.clone(),
            arity: f.arity,
            visibility: f.visibility,
        })
    }

    fn library_constant(&self, library: &str, name: &str) -> Option<Symbol> {
        let lib = self.catalog.library(library)?;
        let c = lib.get_constant(name)?;
        Some(Symbol::LibraryConstant {
            library: lib.name.clone(),
            name: c.name.clone(),
            value: c.value,
        })
    }

    /// Reference and accessibility checks for a library symbol.
    fn check_library_symbol(&mut self, symbol: &Symbol, span: Span) {
        let Some(library) = symbol.containing_library() else {
            return;
        };
        if !self.refs.contains_library(library) {
            self.error(
                DiagnosticCode::MISSING_REFERENCE,
                format!(
                    "'{symbol}' is defined in library '{library}', which is not referenced"
                ),
                span,
            );
            return;
        }
        for dependency in self.catalog.dependency_closure(library) {
            if self.refs.contains_library(&dependency) {
                continue;
            }
            if self
                .reported_dependencies
                .insert((library.to_string(), dependency.clone()))
            {
                self.error(
                    DiagnosticCode::MISSING_DEPENDENCY,
                    format!(
                        "library '{library}' depends on '{dependency}', which is not referenced"
                    ),
                    span,
                );
            }
        }
        if let Symbol::LibraryFunction {
            visibility: Visibility::Internal,
            ..
        } = symbol
        {
            if !self.options.ignore_accessibility {
                self.error(
                    DiagnosticCode::INACCESSIBLE_SYMBOL,
                    format!("'{symbol}' is inaccessible due to its protection level"),
                    span,
                );
            }
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Diagnostics
    // ══════════════════════════════════════════════════════════════════════

    fn unknown_name(&mut self, name: &str, span: Span) {
        self.error(
            DiagnosticCode::UNKNOWN_NAME,
            format!("the name '{name}' does not exist in the current context"),
            span,
        );
    }

    fn error(&mut self, code: DiagnosticCode, message: impl Into<String>, span: Span) {
        let line = self.source_line(span);
        self.diagnostics.push(Diagnostic::error(
            &self.source.name,
            code,
            message,
            span,
            line,
        ));
    }

    fn source_line(&self, span: Span) -> String {
        self.source
            .line(span.start_line)
            .unwrap_or_default()
            .to_string()
    }
}

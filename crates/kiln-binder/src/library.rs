//! Library catalog: every host library the binder knows about.
//!
//! The catalog is metadata only. Whether a library is actually loaded in
//! the process is the host registry's concern.

use std::collections::{BTreeMap, BTreeSet};

/// Who may bind to a library symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    /// Binds only when accessibility checks are relaxed.
    Internal,
}

/// A library function: fixed arity, every argument and the result a value.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryFunction {
    pub name: String,
    pub arity: usize,
    pub visibility: Visibility,
    /// Callable without the library qualifier (`println(x)`).
    pub global: bool,
}

/// A numeric library constant (`math.PI`).
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryConstant {
    pub name: String,
    pub value: f64,
}

/// One catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Library {
    pub name: String,
    /// Always referenced by every compilation.
    pub platform: bool,
    /// Libraries this one requires to be referenced alongside it.
    pub dependencies: Vec<String>,
    functions: BTreeMap<String, LibraryFunction>,
    constants: BTreeMap<String, LibraryConstant>,
}

impl Library {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            platform: false,
            dependencies: Vec::new(),
            functions: BTreeMap::new(),
            constants: BTreeMap::new(),
        }
    }

    pub fn platform(mut self) -> Self {
        self.platform = true;
        self
    }

    pub fn depends_on(mut self, library: &str) -> Self {
        self.dependencies.push(library.to_string());
        self
    }

    pub fn function(mut self, name: &str, arity: usize) -> Self {
        self.insert(name, arity, Visibility::Public, false);
        self
    }

    pub fn global_function(mut self, name: &str, arity: usize) -> Self {
        self.insert(name, arity, Visibility::Public, true);
        self
    }

    pub fn internal_function(mut self, name: &str, arity: usize) -> Self {
        self.insert(name, arity, Visibility::Internal, false);
        self
    }

    pub fn constant(mut self, name: &str, value: f64) -> Self {
        self.constants.insert(
            name.to_string(),
            LibraryConstant {
                name: name.to_string(),
                value,
            },
        );
        self
    }

    fn insert(&mut self, name: &str, arity: usize, visibility: Visibility, global: bool) {
        self.functions.insert(
            name.to_string(),
            LibraryFunction {
                name: name.to_string(),
                arity,
                visibility,
                global,
            },
        );
    }

    pub fn get_function(&self, name: &str) -> Option<&LibraryFunction> {
        self.functions.get(name)
    }

    pub fn get_constant(&self, name: &str) -> Option<&LibraryConstant> {
        self.constants.get(name)
    }

    pub fn functions(&self) -> impl Iterator<Item = &LibraryFunction> {
        self.functions.values()
    }

    pub fn constants(&self) -> impl Iterator<Item = &LibraryConstant> {
        self.constants.values()
    }
}

/// Metadata for every library, keyed by exact name.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    libraries: BTreeMap<String, Library>,
}

impl Catalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The standard Kiln libraries.
    pub fn standard() -> Self {
        let mut catalog = Self::empty();
        catalog.add(
            Library::new("core")
                .platform()
                .global_function("print", 1)
                .global_function("println", 1)
                .global_function("panic", 1)
                .global_function("len", 1)
                .global_function("str", 1)
                .global_function("type_of", 1),
        );
        catalog.add(
            Library::new("string")
                .platform()
                .function("length", 1)
                .function("upper", 1)
                .function("lower", 1)
                .function("trim", 1)
                .function("contains", 2)
                .function("starts_with", 2)
                .function("split", 2)
                .function("replace", 3)
                .function("slice", 3)
                .internal_function("byte_at", 2),
        );
        catalog.add(
            Library::new("list")
                .platform()
                .function("length", 1)
                .function("get", 2)
                .function("push", 2)
                .function("set", 3)
                .function("range", 2)
                .function("join", 2)
                .function("reverse", 1),
        );
        catalog.add(
            Library::new("convert")
                .platform()
                .function("to_number", 1)
                .function("to_string", 1),
        );
        catalog.add(
            Library::new("math")
                .function("abs", 1)
                .function("sqrt", 1)
                .function("floor", 1)
                .function("ceil", 1)
                .function("round", 1)
                .function("pow", 2)
                .function("min", 2)
                .function("max", 2)
                .constant("PI", std::f64::consts::PI)
                .constant("E", std::f64::consts::E),
        );
        catalog.add(
            Library::new("fmt")
                .depends_on("math")
                .function("fixed", 2)
                .function("pad_left", 3)
                .function("pad_right", 3),
        );
        catalog.add(
            Library::new("time")
                .function("now_ms", 0)
                .function("sleep", 1),
        );
        catalog.add(
            Library::new("task")
                .depends_on("time")
                .function("spawn", 1)
                .function("completed", 1),
        );
        catalog.add(Library::new("net").function("fetch", 1));
        catalog
    }

    pub fn add(&mut self, library: Library) {
        self.libraries.insert(library.name.clone(), library);
    }

    /// Exact, case-sensitive lookup.
    pub fn library(&self, name: &str) -> Option<&Library> {
        self.libraries.get(name)
    }

    pub fn libraries(&self) -> impl Iterator<Item = &Library> {
        self.libraries.values()
    }

    /// Names of the platform libraries, sorted.
    pub fn platform_libraries(&self) -> Vec<&str> {
        self.libraries
            .values()
            .filter(|l| l.platform)
            .map(|l| l.name.as_str())
            .collect()
    }

    /// Find a function callable without a qualifier.
    pub fn global(&self, name: &str) -> Option<(&Library, &LibraryFunction)> {
        self.libraries.values().find_map(|lib| {
            lib.get_function(name)
                .filter(|f| f.global)
                .map(|f| (lib, f))
        })
    }

    /// Every library `name` depends on, directly or transitively,
    /// excluding `name` itself. Unknown names are skipped.
    pub fn dependency_closure(&self, name: &str) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<&str> = self
            .library(name)
            .map(|l| l.dependencies.iter().map(String::as_str).collect())
            .unwrap_or_default();
        while let Some(dep) = stack.pop() {
            if dep == name || !seen.insert(dep.to_string()) {
                continue;
            }
            if let Some(lib) = self.library(dep) {
                stack.extend(lib.dependencies.iter().map(String::as_str));
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_platform_set() {
        let catalog = Catalog::standard();
        assert_eq!(
            catalog.platform_libraries(),
            vec!["convert", "core", "list", "string"]
        );
    }

    #[test]
    fn test_globals_live_in_core() {
        let catalog = Catalog::standard();
        let (lib, f) = catalog.global("println").unwrap();
        assert_eq!(lib.name, "core");
        assert_eq!(f.arity, 1);
        assert!(catalog.global("sqrt").is_none());
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let catalog = Catalog::standard();
        assert!(catalog.library("math").is_some());
        assert!(catalog.library("Math").is_none());
    }

    #[test]
    fn test_dependency_closure_is_transitive() {
        let mut catalog = Catalog::standard();
        catalog.add(Library::new("report").depends_on("fmt"));
        let deps: Vec<String> = catalog.dependency_closure("report").into_iter().collect();
        assert_eq!(deps, vec!["fmt".to_string(), "math".to_string()]);
        assert!(catalog.dependency_closure("math").is_empty());
    }

    #[test]
    fn test_dependency_cycle_terminates() {
        let mut catalog = Catalog::empty();
        catalog.add(Library::new("a").depends_on("b"));
        catalog.add(Library::new("b").depends_on("a"));
        let deps: Vec<String> = catalog.dependency_closure("a").into_iter().collect();
        assert_eq!(deps, vec!["b".to_string()]);
    }

    #[test]
    fn test_internal_symbol() {
        let catalog = Catalog::standard();
        let f = catalog
            .library("string")
            .and_then(|l| l.get_function("byte_at"))
            .unwrap();
        assert_eq!(f.visibility, Visibility::Internal);
    }

    #[test]
    fn test_constants() {
        let catalog = Catalog::standard();
        let pi = catalog.library("math").and_then(|l| l.get_constant("PI")).unwrap();
        assert_eq!(pi.value, std::f64::consts::PI);
    }
}

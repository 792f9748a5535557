//! The host registry: libraries actually loaded in this process.

use std::collections::{BTreeMap, BTreeSet};

use kiln_binder::Catalog;
use kiln_types::{LibraryReference, ReferenceSet};

/// Libraries the catalog describes but the host never loads.
const UNLOADED: &[&str] = &["net"];

/// Location a standard library is loaded from.
pub fn standard_location(library: &str) -> String {
    format!("kiln:/lib/{library}.kl")
}

/// Explicit registry of loaded libraries, keyed by exact library name.
#[derive(Debug, Clone, Default)]
pub struct HostRegistry {
    loaded: BTreeMap<String, LibraryReference>,
    platform: BTreeSet<String>,
}

impl HostRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every standard library except `net`, with the catalog's platform set.
    pub fn standard() -> Self {
        let mut host = Self::new();
        for library in Catalog::standard().libraries() {
            if UNLOADED.contains(&library.name.as_str()) {
                continue;
            }
            let location = standard_location(&library.name);
            if library.platform {
                host.load_platform(&library.name, location);
            } else {
                host.load(&library.name, location);
            }
        }
        host
    }

    pub fn load(&mut self, name: &str, location: impl Into<String>) {
        self.loaded
            .insert(name.to_string(), LibraryReference::new(name, location));
    }

    /// Load a library that every compilation references.
    pub fn load_platform(&mut self, name: &str, location: impl Into<String>) {
        self.load(name, location);
        self.platform.insert(name.to_string());
    }

    /// Case-sensitive lookup of a loaded library.
    pub fn reference(&self, name: &str) -> Option<&LibraryReference> {
        self.loaded.get(name)
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.contains_key(name)
    }

    pub fn platform_references(&self) -> ReferenceSet {
        self.platform
            .iter()
            .filter_map(|name| self.loaded.get(name).cloned())
            .collect()
    }

    pub fn loaded(&self) -> impl Iterator<Item = &LibraryReference> {
        self.loaded.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_host_skips_net() {
        let host = HostRegistry::standard();
        assert!(host.is_loaded("math"));
        assert!(host.is_loaded("task"));
        assert!(!host.is_loaded("net"));
    }

    #[test]
    fn test_platform_references() {
        let host = HostRegistry::standard();
        let platform = host.platform_references();
        assert_eq!(platform.names(), vec!["convert", "core", "list", "string"]);
    }

    #[test]
    fn test_lookup_is_exact() {
        let host = HostRegistry::standard();
        assert_eq!(
            host.reference("math").map(|r| r.location.as_str()),
            Some("kiln:/lib/math.kl")
        );
        assert!(host.reference("MATH").is_none());
    }
}

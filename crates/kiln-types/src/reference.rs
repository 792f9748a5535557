use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A reference to a library loaded on the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LibraryReference {
    /// Library name as declared in the catalog (case-sensitive).
    pub name: String,
    /// Where the host loaded the library from.
    pub location: String,
}

impl LibraryReference {
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
        }
    }

    /// Identity key: the location, compared case-insensitively.
    pub fn identity(&self) -> String {
        self.location.to_lowercase()
    }
}

/// Deduplicated set of library references.
///
/// Iteration order is the identity-key order, so two sets built from the
/// same references in any order iterate identically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceSet {
    refs: BTreeMap<String, LibraryReference>,
}

impl ReferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a reference. Returns `false` if one with the same identity
    /// was already present.
    pub fn insert(&mut self, reference: LibraryReference) -> bool {
        let key = reference.identity();
        if self.refs.contains_key(&key) {
            return false;
        }
        self.refs.insert(key, reference);
        true
    }

    /// Whether a library with exactly this name is referenced.
    pub fn contains_library(&self, name: &str) -> bool {
        self.refs.values().any(|r| r.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LibraryReference> {
        self.refs.values()
    }

    /// Referenced library names, in iteration order.
    pub fn names(&self) -> Vec<&str> {
        self.refs.values().map(|r| r.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}

impl Extend<LibraryReference> for ReferenceSet {
    fn extend<T: IntoIterator<Item = LibraryReference>>(&mut self, iter: T) {
        for r in iter {
            self.insert(r);
        }
    }
}

impl FromIterator<LibraryReference> for ReferenceSet {
    fn from_iter<T: IntoIterator<Item = LibraryReference>>(iter: T) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

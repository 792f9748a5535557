//! The compiled artifact: validated module bytes plus the entry descriptor.

use kiln_binder::EntryPoint;
use sha2::{Digest, Sha256};

use crate::error::CodegenResult;
use crate::manifest::read_manifest;

/// An immutable compiled module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledArtifact {
    bytes: Vec<u8>,
    entry: Option<EntryPoint>,
}

impl CompiledArtifact {
    pub fn new(bytes: Vec<u8>, entry: Option<EntryPoint>) -> Self {
        Self { bytes, entry }
    }

    /// Rebuild an artifact from module bytes, recovering the entry
    /// descriptor from the `kiln.entry` section.
    pub fn from_bytes(bytes: Vec<u8>) -> CodegenResult<Self> {
        let entry = if bytes.is_empty() {
            None
        } else {
            read_manifest(&bytes)?.entry
        };
        Ok(Self { bytes, entry })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn entry(&self) -> Option<&EntryPoint> {
        self.entry.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Hex SHA-256 of the module bytes.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        format!("{:x}", hasher.finalize())
    }
}

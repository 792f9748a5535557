//! Reading the Kiln custom sections back out of a module.

use kiln_binder::EntryPoint;
use wasmparser::{Parser, Payload};

use crate::error::{CodegenError, CodegenResult};
use crate::types::{ENTRY_SECTION, REFERENCES_SECTION, VERSION_SECTION};

/// What a compiled module says about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    /// Present for executables whose `main` was valid.
    pub entry: Option<EntryPoint>,
    /// Library names the module was compiled against.
    pub references: Vec<String>,
    pub version: Option<String>,
}

/// Parse the `kiln.*` custom sections of `wasm`.
///
/// Sections that are absent leave their field empty; sections that are
/// present but malformed are an error.
pub fn read_manifest(wasm: &[u8]) -> CodegenResult<Manifest> {
    let mut manifest = Manifest::default();
    for payload in Parser::new(0).parse_all(wasm) {
        let payload = payload.map_err(|e| CodegenError::InvalidModule(e.to_string()))?;
        let Payload::CustomSection(reader) = payload else {
            continue;
        };
        match reader.name() {
            ENTRY_SECTION => {
                let entry = serde_json::from_slice(reader.data()).map_err(|e| {
                    CodegenError::InvalidModule(format!("malformed {ENTRY_SECTION}: {e}"))
                })?;
                manifest.entry = Some(entry);
            }
            REFERENCES_SECTION => {
                manifest.references = serde_json::from_slice(reader.data()).map_err(|e| {
                    CodegenError::InvalidModule(format!("malformed {REFERENCES_SECTION}: {e}"))
                })?;
            }
            VERSION_SECTION => {
                manifest.version = Some(String::from_utf8_lossy(reader.data()).into_owned());
            }
            _ => {}
        }
    }
    Ok(manifest)
}

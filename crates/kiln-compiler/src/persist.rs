//! Writing artifacts to disk.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ArtifactError;

/// Write `bytes` to `<dir>/<name>.wasm`, creating `dir` if needed.
pub fn save_artifact(bytes: &[u8], dir: &Path, name: &str) -> Result<PathBuf, ArtifactError> {
    if bytes.is_empty() {
        return Err(ArtifactError::Empty);
    }
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(ArtifactError::InvalidName(name.to_string()));
    }

    std::fs::create_dir_all(dir).map_err(|source| ArtifactError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(format!("{name}.wasm"));
    std::fs::write(&path, bytes).map_err(|source| ArtifactError::Io {
        path: path.clone(),
        source,
    })?;
    debug!(path = %path.display(), bytes = bytes.len(), "artifact saved");
    Ok(path)
}

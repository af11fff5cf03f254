//! Artifact writer.
//!
//! Each artifact is written to a temp file in the target directory and
//! renamed into place, so a failed write never leaves a partial file behind
//! and an existing file is only replaced by a complete one.

use crate::error::WriteError;
use crate::output::Artifact;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Write `artifact` into `dir`, creating the directory if needed.
///
/// Returns the final path. An existing file of the same name is replaced.
pub fn write_artifact(dir: &Path, artifact: &Artifact) -> Result<PathBuf, WriteError> {
    let path = dir.join(&artifact.file_name);
    let fail = |source: std::io::Error| WriteError {
        path: path.clone(),
        source,
    };

    std::fs::create_dir_all(dir).map_err(fail)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(fail)?;
    tmp.write_all(artifact.content.as_bytes()).map_err(fail)?;
    tmp.flush().map_err(fail)?;
    tmp.persist(&path).map_err(|e| fail(e.error))?;

    debug!("Wrote {} ({} bytes)", path.display(), artifact.content.len());
    Ok(path)
}

/// [`write_artifact`] on tokio's blocking pool.
pub async fn write_artifact_blocking(dir: &Path, artifact: Artifact) -> Result<PathBuf, WriteError> {
    let path = dir.join(&artifact.file_name);
    let dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || write_artifact(&dir, &artifact))
        .await
        .map_err(|e| WriteError {
            path,
            source: std::io::Error::other(e),
        })?
}

//! Input resolution: turn the user-supplied path into a list of documents.
//!
//! A single file that is not a zip container (`PK\x03\x04`) is only warned
//! about here; reading it later fails for that document alone. A
//! directory is scanned non-recursively for `*.docx` files; Word lock files
//! (`~$name.docx`) are ignored and the result is sorted by file name.

use crate::error::EbdToolError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";

/// Resolve `input` to the documents to process.
///
/// # Errors
/// * [`EbdToolError::InputNotFound`] — the path does not exist
/// * [`EbdToolError::PermissionDenied`] — the path cannot be read
/// * [`EbdToolError::NoDocuments`] — a directory without `.docx` files
pub fn resolve_input(input: &Path) -> Result<Vec<PathBuf>, EbdToolError> {
    let metadata = std::fs::metadata(input).map_err(|e| io_error(input, e))?;

    if metadata.is_dir() {
        let documents = scan_directory(input)?;
        if documents.is_empty() {
            return Err(EbdToolError::NoDocuments {
                path: input.to_path_buf(),
            });
        }
        debug!("Found {} documents in {}", documents.len(), input.display());
        Ok(documents)
    } else {
        let magic = read_magic(input)?;
        if magic != ZIP_MAGIC {
            warn!(
                "{} does not look like a .docx (first bytes {:?})",
                input.display(),
                magic
            );
        }
        debug!("Resolved document: {}", input.display());
        Ok(vec![input.to_path_buf()])
    }
}

/// `true` for `*.docx` names that are not Word lock files.
pub fn is_docx_name(name: &str) -> bool {
    !name.starts_with("~$") && name.to_ascii_lowercase().ends_with(".docx")
}

fn scan_directory(dir: &Path) -> Result<Vec<PathBuf>, EbdToolError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_error(dir, e))?;
    let mut documents = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_error(dir, e))?;
        let path = entry.path();
        let is_docx = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(is_docx_name);
        if is_docx && path.is_file() {
            documents.push(path);
        }
    }
    documents.sort();
    Ok(documents)
}

/// First four bytes of `path`; short files leave the tail zeroed.
fn read_magic(path: &Path) -> Result<[u8; 4], EbdToolError> {
    let mut file = std::fs::File::open(path).map_err(|e| io_error(path, e))?;
    let mut magic = [0u8; 4];
    let mut filled = 0;
    while filled < magic.len() {
        match file.read(&mut magic[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) => return Err(io_error(path, e)),
        }
    }
    Ok(magic)
}

fn io_error(path: &Path, e: std::io::Error) -> EbdToolError {
    match e.kind() {
        std::io::ErrorKind::NotFound => EbdToolError::InputNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => EbdToolError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => EbdToolError::Internal(format!("Cannot read '{}': {}", path.display(), e)),
    }
}

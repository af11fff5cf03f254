//! Output types: rendered artifacts and the report of a whole run.

use crate::config::OutputFormat;
use crate::pipeline::extract::EbdKey;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

/// File stem for an EBD key: ASCII alphanumerics, `_` and `-` survive,
/// everything else is dropped (`"EBD#1"` → `"EBD1"`).
///
/// A key with no usable character at all falls back to `"ebd"`.
pub fn artifact_stem(ebd_key: &str) -> String {
    let stem: String = ebd_key
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if stem.is_empty() {
        "ebd".to_string()
    } else {
        stem
    }
}

/// One rendered file, not yet written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub ebd_key: String,
    pub format: OutputFormat,
    /// `{artifact_stem(ebd_key)}.{extension}`.
    pub file_name: String,
    pub content: String,
}

impl Artifact {
    pub fn new(ebd_key: &str, format: OutputFormat, content: String) -> Self {
        Self {
            ebd_key: ebd_key.to_string(),
            format,
            file_name: format!("{}.{}", artifact_stem(ebd_key), format.extension()),
            content,
        }
    }
}

/// An artifact that made it to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenArtifact {
    pub document: String,
    pub ebd_key: String,
    pub format: OutputFormat,
    pub path: PathBuf,
}

/// Pipeline stage a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extract,
    GraphBuild,
    Render,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Extract => "extract",
            Stage::GraphBuild => "graph_build",
            Stage::Render => "render",
            Stage::Write => "write",
        })
    }
}

/// One non-fatal failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeFailure {
    pub document: String,
    /// `None` when the whole document failed before any key was known.
    pub ebd_key: Option<String>,
    pub stage: Stage,
    /// Set for render and write failures.
    pub format: Option<OutputFormat>,
    /// Error variant name, e.g. `DanglingReference`.
    pub kind: String,
    pub message: String,
}

impl TreeFailure {
    /// The key if there is one, the document name otherwise.
    pub fn subject(&self) -> &str {
        self.ebd_key.as_deref().unwrap_or(&self.document)
    }
}

/// An EBD key whose section holds no table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedTree {
    pub document: String,
    pub ebd_key: String,
    pub reason: String,
}

/// Summary of one run over one or more documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Documents attempted.
    pub documents: usize,
    /// EBD keys discovered across all documents.
    pub trees: usize,
    pub artifacts: Vec<WrittenArtifact>,
    pub failures: Vec<TreeFailure>,
    pub skipped: Vec<SkippedTree>,
    pub duration_ms: u64,
}

impl RunReport {
    /// `true` when nothing failed. Skipped trees do not count as failures.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of distinct trees (or documents) with at least one failure.
    pub fn failed_trees(&self) -> usize {
        self.failures
            .iter()
            .map(|f| (f.document.as_str(), f.ebd_key.as_deref()))
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Failing keys grouped by error kind, each list in first-seen order
    /// without duplicates.
    pub fn errors_by_kind(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut grouped: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for failure in &self.failures {
            let keys = grouped.entry(failure.kind.as_str()).or_default();
            let subject = failure.subject();
            if !keys.contains(&subject) {
                keys.push(subject);
            }
        }
        grouped
    }
}

/// The EBD keys of one document, as listed by [`crate::convert::inspect`].
#[derive(Debug, Clone, Serialize)]
pub struct DocumentInventory {
    pub document: String,
    pub keys: Vec<EbdKey>,
    /// Set when the document could not be read.
    pub error: Option<String>,
}

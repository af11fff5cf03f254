//! Error types for the ebd-toolchain library.
//!
//! Two tiers reflect two distinct failure modes:
//!
//! * [`EbdToolError`] — **Fatal**: the run cannot proceed at all (input path
//!   missing, output directory cannot be created, bad configuration).
//!   Returned as `Err(EbdToolError)` from the top-level `convert*` functions.
//!
//! * [`TreeError`] — **Non-fatal**: one decision tree (or one artifact of
//!   it) failed. The orchestrator logs it, records a
//!   [`crate::output::TreeFailure`] and moves on to the next tree.
//!
//! `TreeError` wraps one enum per pipeline stage so callers can match on the
//! stage that failed without parsing messages.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the ebd-toolchain library.
#[derive(Debug, Error)]
pub enum EbdToolError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file or directory was not found at the given path.
    #[error("Input not found: '{path}'\nCheck the path exists and is readable.")]
    InputNotFound { path: PathBuf },

    /// Process does not have read permission on the input.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// A directory was given but it holds no .docx files.
    #[error("No .docx documents found in directory '{path}'")]
    NoDocuments { path: PathBuf },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The output directory could not be created.
    #[error("Failed to create output directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or environment validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Reading a document or converting one of its tables failed.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The document could not be opened as a zip archive.
    #[error("Cannot read '{path}': {detail}")]
    Unreadable { path: PathBuf, detail: String },

    /// `word/document.xml` is missing or is not well-formed XML.
    #[error("Malformed document body in '{path}': {detail}")]
    MalformedXml { path: PathBuf, detail: String },

    /// The document holds no EBD key at all.
    #[error("No decision trees found in '{path}'")]
    NoDecisionTrees { path: PathBuf },

    /// The EBD section has no table (cross reference or "no tree needed").
    #[error("No table found for {ebd_key}: {reason}")]
    TableNotFound { ebd_key: String, reason: String },

    /// The EBD table exists but does not have the expected structure.
    #[error("Malformed table for {ebd_key}: {reason}")]
    MalformedTable { ebd_key: String, reason: String },
}

/// The table is structurally inconsistent and cannot become a graph.
#[derive(Debug, Clone, Error)]
pub enum GraphBuildError {
    #[error("Table {ebd_key} has no rows")]
    EmptyTable { ebd_key: String },

    /// Two rows carry the same step number.
    #[error("Step {step} of {ebd_key} appears more than once")]
    DuplicateStep { ebd_key: String, step: String },

    /// A sub row points at a step number that does not exist.
    #[error("Step {from_step} of {ebd_key} refers to missing step {target}")]
    DanglingReference {
        ebd_key: String,
        from_step: String,
        target: String,
    },

    /// A sub row continues in a different EBD.
    #[error("Step {from_step} of {ebd_key} references {target}; cross references are not supported")]
    CrossReferenceNotSupported {
        ebd_key: String,
        from_step: String,
        target: String,
    },

    /// "Ende" was found in the result-code column.
    #[error("Step {step} of {ebd_key} has 'Ende' in the code column")]
    EndeInWrongColumn { ebd_key: String, step: String },

    /// The same result code is used with different notes or follow-ups.
    #[error("Result code {result_code} of {ebd_key} is ambiguous: {detail}")]
    OutcomeCodeAmbiguous {
        ebd_key: String,
        result_code: String,
        detail: String,
    },
}

/// Rendering one format of one graph failed.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A PlantUML if/else needs exactly one yes and one no branch.
    #[error("Node {node} has {count} outgoing edges; PlantUML needs exactly one 'ja' and one 'nein'")]
    NotExactlyTwoOutgoingEdges { node: String, count: usize },

    /// The graph is not a tree and cannot be expressed as nested if/else.
    #[error("Graph {ebd_key} is too complex for PlantUML: {detail}")]
    GraphTooComplexForPlantuml { ebd_key: String, detail: String },

    /// The rendering service failed.
    #[error(transparent)]
    Service(#[from] RenderServiceError),

    /// JSON serialisation of the table failed.
    #[error("Serialisation failed: {0}")]
    Serialization(String),
}

impl RenderError {
    /// `true` for failures caused by the remote rendering service.
    pub fn is_service_error(&self) -> bool {
        matches!(self, RenderError::Service(_))
    }
}

/// The remote rendering service (Kroki) did not deliver an image.
#[derive(Debug, Error)]
pub enum RenderServiceError {
    /// Connection refused, DNS failure, reset, client-side timeout.
    #[error("Rendering service at '{url}' is unreachable: {detail}")]
    Unreachable { url: String, detail: String },

    /// The service answered with a non-success status.
    #[error("Rendering service at '{url}' returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    /// The body could not be read or is not UTF-8.
    #[error("Invalid response from rendering service at '{url}': {detail}")]
    InvalidResponse { url: String, detail: String },
}

/// Writing one artifact failed; nothing was left at the target path.
#[derive(Debug, Error)]
#[error("Failed to write '{path}': {source}")]
pub struct WriteError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// A non-fatal failure scoped to one decision tree or one of its artifacts.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    GraphBuild(#[from] GraphBuildError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Write(#[from] WriteError),
}

impl TreeError {
    /// Stable variant name used to group failures in the run summary.
    pub fn kind(&self) -> &'static str {
        match self {
            TreeError::Extraction(e) => match e {
                ExtractionError::Unreadable { .. } => "Unreadable",
                ExtractionError::MalformedXml { .. } => "MalformedXml",
                ExtractionError::NoDecisionTrees { .. } => "NoDecisionTrees",
                ExtractionError::TableNotFound { .. } => "TableNotFound",
                ExtractionError::MalformedTable { .. } => "MalformedTable",
            },
            TreeError::GraphBuild(e) => match e {
                GraphBuildError::EmptyTable { .. } => "EmptyTable",
                GraphBuildError::DuplicateStep { .. } => "DuplicateStep",
                GraphBuildError::DanglingReference { .. } => "DanglingReference",
                GraphBuildError::CrossReferenceNotSupported { .. } => "CrossReferenceNotSupported",
                GraphBuildError::EndeInWrongColumn { .. } => "EndeInWrongColumn",
                GraphBuildError::OutcomeCodeAmbiguous { .. } => "OutcomeCodeAmbiguous",
            },
            TreeError::Render(e) => match e {
                RenderError::NotExactlyTwoOutgoingEdges { .. } => "NotExactlyTwoOutgoingEdges",
                RenderError::GraphTooComplexForPlantuml { .. } => "GraphTooComplexForPlantuml",
                RenderError::Service(_) => "RenderServiceError",
                RenderError::Serialization(_) => "Serialization",
            },
            TreeError::Write(_) => "WriteError",
        }
    }
}

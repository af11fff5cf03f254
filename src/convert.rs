//! Run entry points: convert every decision tree of one or more documents.
//!
//! The orchestrator is sequential. For each document it discovers the EBD
//! keys, and for each key it
//!
//! 1. extracts the table,
//! 2. writes the JSON artifact (if requested),
//! 3. builds the graph,
//! 4. renders and writes each remaining format.
//!
//! A failure is scoped to the smallest unit it affects: a broken document
//! loses all its trees, a broken table loses one tree, a failed format loses
//! one file. Each failure is logged and recorded in the [`RunReport`]; only
//! problems that make the whole run impossible surface as `Err`.

use crate::config::{OutputFormat, ToolchainConfig};
use crate::error::{EbdToolError, ExtractionError, TreeError};
use crate::output::{Artifact, DocumentInventory, RunReport, SkippedTree, Stage, TreeFailure, WrittenArtifact};
use crate::pipeline::extract::{self, EbdKey, LoadedDocument};
use crate::pipeline::graph::build_graph;
use crate::pipeline::render::Renderer;
use crate::pipeline::{input, write};
use crate::progress::ProgressCallback;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert all decision trees found under `input` into `output_dir`.
///
/// # Arguments
/// * `input`      — a `.docx` file or a directory of them
/// * `output_dir` — created if absent; existing artifacts are overwritten
/// * `config`     — formats, Kroki location, progress callback
///
/// # Returns
/// `Ok(RunReport)` even when trees failed; check
/// [`RunReport::is_success`].
///
/// # Errors
/// Only fatal problems: missing or non-docx input, an output directory that
/// cannot be created.
pub async fn convert(
    input: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &ToolchainConfig,
) -> Result<RunReport, EbdToolError> {
    let started = Instant::now();
    let input = input.as_ref();
    let output_dir = output_dir.as_ref();
    info!("Starting run: {} → {}", input.display(), output_dir.display());

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let documents = input::resolve_input(input)?;

    // ── Step 2: Prepare output directory ─────────────────────────────────
    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|e| EbdToolError::OutputDirFailed {
            path: output_dir.to_path_buf(),
            source: e,
        })?;

    // ── Step 3: Process documents ────────────────────────────────────────
    let renderer = Renderer::new(&config.kroki);
    let mut run = Run {
        output_dir,
        config,
        renderer: &renderer,
        report: RunReport::default(),
    };

    for path in &documents {
        run.document(path).await?;
    }

    let mut report = run.report;
    report.duration_ms = started.elapsed().as_millis() as u64;

    info!(
        "Run complete: {} trees in {} documents, {} artifacts, {} skipped, {} failures, {}ms",
        report.trees,
        report.documents,
        report.artifacts.len(),
        report.skipped.len(),
        report.failures.len(),
        report.duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(report.trees, report.failed_trees());
    }

    Ok(report)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &ToolchainConfig,
) -> Result<RunReport, EbdToolError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| EbdToolError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input, output_dir, config))
}

/// List the EBD keys of every document without converting anything.
///
/// Unreadable documents are listed with their error instead of failing the
/// call.
pub async fn inspect(input: impl AsRef<Path>) -> Result<Vec<DocumentInventory>, EbdToolError> {
    let documents = input::resolve_input(input.as_ref())?;
    let mut inventory = Vec::with_capacity(documents.len());
    for path in documents {
        let document = display_name(&path);
        let entry = match load(path).await? {
            Ok(doc) => DocumentInventory {
                document,
                keys: doc.keys,
                error: None,
            },
            Err(e) => DocumentInventory {
                document,
                keys: Vec::new(),
                error: Some(e.to_string()),
            },
        };
        inventory.push(entry);
    }
    Ok(inventory)
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Parse a document off the async workers.
///
/// The outer `Result` is a panicked task, the inner one the document's own
/// extraction error.
async fn load(path: PathBuf) -> Result<Result<LoadedDocument, ExtractionError>, EbdToolError> {
    tokio::task::spawn_blocking(move || extract::load_document(&path))
        .await
        .map_err(|e| EbdToolError::Internal(format!("Document task panicked: {}", e)))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// State of one run.
struct Run<'a> {
    output_dir: &'a Path,
    config: &'a ToolchainConfig,
    renderer: &'a Renderer,
    report: RunReport,
}

impl Run<'_> {
    fn callback(&self) -> Option<&ProgressCallback> {
        self.config.progress_callback.as_ref()
    }

    async fn document(&mut self, path: &Path) -> Result<(), EbdToolError> {
        let name = display_name(path);
        self.report.documents += 1;

        let doc = match load(path.to_path_buf()).await? {
            Ok(doc) => doc,
            Err(e) => {
                self.fail(&name, None, Stage::Extract, None, e.into());
                return Ok(());
            }
        };

        let total = doc.keys.len();
        if let Some(cb) = self.callback() {
            cb.on_document_start(&name, total);
        }

        for (index, key) in doc.keys.iter().enumerate() {
            self.report.trees += 1;
            if let Some(cb) = self.callback() {
                cb.on_tree_start(&key.key, index, total);
            }
            let failures_before = self.report.failures.len();
            let Some(written) = self.tree(&name, &doc, key).await else {
                continue;
            };
            if self.report.failures.len() == failures_before {
                if let Some(cb) = self.callback() {
                    cb.on_tree_complete(&key.key, written);
                }
            }
        }
        Ok(())
    }

    /// Process one tree. Returns the number of files written, or `None` when
    /// the tree was skipped or stopped early.
    async fn tree(&mut self, document: &str, doc: &LoadedDocument, key: &EbdKey) -> Option<usize> {
        let ebd_key = key.key.as_str();
        debug!("{}: extracting {}", document, ebd_key);

        let table = match extract::extract_table(doc, key) {
            Ok(table) => table,
            Err(ExtractionError::TableNotFound { reason, .. }) => {
                info!("{}: no table, skipped ({})", ebd_key, reason);
                if let Some(cb) = self.callback() {
                    cb.on_tree_skipped(ebd_key, &reason);
                }
                self.report.skipped.push(SkippedTree {
                    document: document.to_string(),
                    ebd_key: ebd_key.to_string(),
                    reason,
                });
                return None;
            }
            Err(e) => {
                self.fail(document, Some(ebd_key), Stage::Extract, None, e.into());
                return None;
            }
        };

        let mut written = 0;

        if self.config.formats.contains(&OutputFormat::Json) {
            let rendered = self.renderer.render_json(&table);
            match rendered {
                Ok(artifact) => written += self.write(document, artifact).await as usize,
                Err(e) => self.fail(document, Some(ebd_key), Stage::Render, Some(OutputFormat::Json), e.into()),
            }
        }

        // an empty format set still validates the graph
        if !self.config.formats.is_empty() && !self.config.needs_graph() {
            return Some(written);
        }

        let graph = match build_graph(&table) {
            Ok(graph) => graph,
            Err(e) => {
                self.fail(document, Some(ebd_key), Stage::GraphBuild, None, e.into());
                return None;
            }
        };
        debug!(
            "{}: graph with {} nodes, {} edges",
            ebd_key,
            graph.nodes.len(),
            graph.edges.len()
        );

        let formats: Vec<OutputFormat> = self
            .config
            .formats
            .iter()
            .copied()
            .filter(|f| f.requires_graph())
            .collect();
        for format in formats {
            let rendered = self.renderer.render_graph(&graph, format).await;
            match rendered {
                Ok(artifact) => written += self.write(document, artifact).await as usize,
                Err(e) => self.fail(document, Some(ebd_key), Stage::Render, Some(format), e.into()),
            }
        }

        Some(written)
    }

    /// Write one artifact; `true` on success.
    async fn write(&mut self, document: &str, artifact: Artifact) -> bool {
        let ebd_key = artifact.ebd_key.clone();
        let format = artifact.format;
        match write::write_artifact_blocking(self.output_dir, artifact).await {
            Ok(path) => {
                self.report.artifacts.push(WrittenArtifact {
                    document: document.to_string(),
                    ebd_key,
                    format,
                    path,
                });
                true
            }
            Err(e) => {
                self.fail(
                    document,
                    Some(&ebd_key),
                    Stage::Write,
                    Some(format),
                    e.into(),
                );
                false
            }
        }
    }

    fn fail(
        &mut self,
        document: &str,
        ebd_key: Option<&str>,
        stage: Stage,
        format: Option<OutputFormat>,
        error: TreeError,
    ) {
        let message = error.to_string();
        warn!(
            document = %document,
            ebd_key = ebd_key.unwrap_or("-"),
            stage = %stage,
            "{}",
            message
        );
        if let Some(cb) = self.callback() {
            cb.on_tree_error(ebd_key.unwrap_or(document), &message);
        }
        self.report.failures.push(TreeFailure {
            document: document.to_string(),
            ebd_key: ebd_key.map(str::to_string),
            stage,
            format,
            kind: error.kind().to_string(),
            message,
        });
    }
}

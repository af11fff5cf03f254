//! # ebd-toolchain
//!
//! Extract EBD decision trees ("Entscheidungsbaumdiagramme") from `.docx`
//! documents and render them as JSON, Graphviz DOT, PlantUML and SVG.
//!
//! EBDs are the decision tables German energy-market participants publish
//! for their checks ("Prüfschritte"). Each table is a numbered list of
//! yes/no questions that either continue with another step or end with an
//! answer code. This crate reads those tables straight from the Word files,
//! turns each one into a graph and writes one file per requested format.
//!
//! ## Pipeline Overview
//!
//! ```text
//! .docx (file or directory)
//!  │
//!  ├─ 1. Input    resolve file / scan directory, check zip magic
//!  ├─ 2. Docx     word/document.xml → paragraphs + tables (spawn_blocking)
//!  ├─ 3. Extract  EBD keys, chapter positions, EbdTable per key
//!  ├─ 4. Graph    EbdTable → EbdGraph, consistency checks
//!  ├─ 5. Render   json / dot / puml locally, svg via Kroki
//!  └─ 6. Write    temp file + rename into the output directory
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ebd_toolchain::{convert, KrokiSettings, OutputFormat, ToolchainConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // KROKI_HOST / KROKI_PORT, defaulting to localhost:8000
//!     let config = ToolchainConfig::builder()
//!         .formats([OutputFormat::Json, OutputFormat::Svg])
//!         .kroki(KrokiSettings::from_env()?)
//!         .build()?;
//!     let report = convert("ebd.docx", "output", &config).await?;
//!     for (kind, keys) in report.errors_by_kind() {
//!         eprintln!("{kind}: {}", keys.join(", "));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `scrape-and-graph` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! ebd-toolchain = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{KrokiSettings, OutputFormat, ToolchainConfig, ToolchainConfigBuilder};
pub use convert::{convert, convert_sync, inspect};
pub use error::{
    EbdToolError, ExtractionError, GraphBuildError, RenderError, RenderServiceError, TreeError,
    WriteError,
};
pub use model::{EbdGraph, EbdTable};
pub use output::{artifact_stem, Artifact, DocumentInventory, RunReport, Stage, TreeFailure};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};

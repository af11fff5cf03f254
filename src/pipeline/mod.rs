//! Pipeline stages for docx-to-diagram conversion.
//!
//! Each submodule implements one transformation step and is tested on its
//! own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ docx ──▶ extract ──▶ graph ──▶ render ──▶ write
//! (paths)   (zip+xml) (EbdTable)  (EbdGraph) (dot/puml/svg) (atomic)
//!                         └──────────────────▶ json
//! ```
//!
//! 1. [`input`]   — resolve the input path to one or more `.docx` files
//! 2. [`docx`]    — read `word/document.xml` into paragraphs and tables;
//!    blocking, runs in `spawn_blocking`
//! 3. [`extract`] — find EBD keys and convert their tables
//! 4. [`graph`]   — table → decision graph, with consistency checks
//! 5. [`render`]  — one artifact per format; [`dot`] and [`plantuml`] emit
//!    text, [`kroki`] is the only stage with network I/O
//! 6. [`write`]   — temp file + rename into the output directory

pub mod docx;
pub mod dot;
pub mod extract;
pub mod graph;
pub mod input;
pub mod kroki;
pub mod plantuml;
pub mod render;
pub mod write;

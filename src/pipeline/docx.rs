//! Minimal WordprocessingML reader: `.docx` → ordered paragraphs and tables.
//!
//! A `.docx` file is a zip archive; the body lives in `word/document.xml`.
//! We stream that part through `quick_xml` and keep only what the EBD
//! extraction needs:
//!
//! * top-level paragraphs with their style id (headings drive the chapter
//!   counters) and plain text;
//! * top-level tables as a rectangular grid of cell texts.
//!
//! Merged cells are resolved while building the grid: a cell with
//! `w:gridSpan = n` is repeated across `n` grid columns, and a
//! `w:vMerge` continuation cell takes the text of the cell above it. After
//! that every row of an EBD table can be read column by column without
//! knowing how Word laid it out. Nested tables and text boxes are flattened
//! into the text of the enclosing cell or paragraph.

use crate::error::ExtractionError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use tracing::debug;
use zip::ZipArchive;

/// Archive member holding the document body.
pub const DOCUMENT_PART: &str = "word/document.xml";

/// The body of a document as a flat sequence of blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocxBody {
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Paragraph {
    /// Style id from `w:pStyle`, e.g. `Heading1` or `berschrift2`.
    pub style: Option<String>,
    pub text: String,
}

impl Paragraph {
    /// Outline level of a heading style (1-based), `None` for body text.
    ///
    /// Word stores localised style ids: `Heading2` in English templates,
    /// `berschrift2` (from "Überschrift 2") in German ones.
    pub fn heading_level(&self) -> Option<u8> {
        let style = self.style.as_deref()?.to_lowercase();
        let rest = style
            .strip_prefix("heading")
            .or_else(|| style.strip_prefix("berschrift"))
            .or_else(|| style.strip_prefix("überschrift"))?;
        rest.trim().parse::<u8>().ok().filter(|l| (1..=9).contains(l))
    }
}

/// A table with merged cells already expanded into a grid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub rows: Vec<Vec<String>>,
}

/// Read the body of the `.docx` file at `path`.
pub fn read_docx(path: &Path) -> Result<DocxBody, ExtractionError> {
    let file = File::open(path).map_err(|e| ExtractionError::Unreadable {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    read_docx_from(file, path)
}

/// Read a `.docx` body from any seekable reader; `path` is used for errors.
pub fn read_docx_from<R: Read + Seek>(reader: R, path: &Path) -> Result<DocxBody, ExtractionError> {
    let mut archive = ZipArchive::new(reader).map_err(|e| ExtractionError::Unreadable {
        path: path.to_path_buf(),
        detail: format!("not a zip archive: {e}"),
    })?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| ExtractionError::MalformedXml {
            path: path.to_path_buf(),
            detail: format!("missing {DOCUMENT_PART}: {e}"),
        })?
        .read_to_string(&mut xml)
        .map_err(|e| ExtractionError::MalformedXml {
            path: path.to_path_buf(),
            detail: format!("cannot read {DOCUMENT_PART}: {e}"),
        })?;

    let body = parse_document_xml(&xml).map_err(|e| ExtractionError::MalformedXml {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    debug!(
        "Read {}: {} blocks",
        path.display(),
        body.blocks.len()
    );
    Ok(body)
}

// ── XML parsing ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VMerge {
    Restart,
    Continue,
}

#[derive(Debug, Default)]
struct RawCell {
    paragraphs: Vec<String>,
    grid_span: usize,
    v_merge: Option<VMerge>,
}

#[derive(Debug, Default)]
struct RawTable {
    rows: Vec<Vec<RawCell>>,
    current_row: Vec<RawCell>,
    current_cell: Option<RawCell>,
}

/// Parse the XML of `word/document.xml`.
pub fn parse_document_xml(xml: &str) -> Result<DocxBody, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);

    let mut body = DocxBody::default();

    // Only the outermost table becomes a block; deeper ones are flattened.
    let mut table: Option<RawTable> = None;
    let mut table_depth = 0usize;

    // Paragraphs nest inside text boxes; only the outermost is emitted.
    let mut para_depth = 0usize;
    let mut para_text = String::new();
    let mut para_style: Option<String> = None;
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(ref e) => match e.name().as_ref() {
                b"w:tbl" => {
                    table_depth += 1;
                    if table_depth == 1 && para_depth == 0 {
                        table = Some(RawTable::default());
                    }
                }
                b"w:tr" if table_depth == 1 => {
                    if let Some(t) = table.as_mut() {
                        t.current_row.clear();
                    }
                }
                b"w:tc" if table_depth == 1 => {
                    if let Some(t) = table.as_mut() {
                        t.current_cell = Some(RawCell {
                            grid_span: 1,
                            ..RawCell::default()
                        });
                    }
                }
                b"w:p" => {
                    if para_depth == 0 {
                        para_text.clear();
                        para_style = None;
                    }
                    para_depth += 1;
                }
                b"w:t" => in_text = true,
                _ => {}
            },
            Event::Empty(ref e) => match e.name().as_ref() {
                b"w:pStyle" if para_depth == 1 => {
                    para_style = attr_val(e);
                }
                b"w:gridSpan" if table_depth == 1 => {
                    let span = attr_val(e)
                        .and_then(|v| v.parse::<usize>().ok())
                        .unwrap_or(1)
                        .max(1);
                    if let Some(cell) = table.as_mut().and_then(|t| t.current_cell.as_mut()) {
                        cell.grid_span = span;
                    }
                }
                b"w:vMerge" if table_depth == 1 => {
                    let merge = match attr_val(e).as_deref() {
                        Some("restart") => VMerge::Restart,
                        _ => VMerge::Continue,
                    };
                    if let Some(cell) = table.as_mut().and_then(|t| t.current_cell.as_mut()) {
                        cell.v_merge = Some(merge);
                    }
                }
                b"w:tab" if para_depth > 0 => para_text.push('\t'),
                b"w:br" | b"w:cr" if para_depth > 0 => para_text.push('\n'),
                _ => {}
            },
            Event::Text(ref t) if in_text => {
                para_text.push_str(&t.unescape()?);
            }
            Event::CData(ref t) if in_text => {
                para_text.push_str(&String::from_utf8_lossy(t));
            }
            Event::End(ref e) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => {
                    para_depth = para_depth.saturating_sub(1);
                    if para_depth == 0 {
                        let text = std::mem::take(&mut para_text);
                        let style = para_style.take();
                        match table.as_mut().and_then(|t| t.current_cell.as_mut()) {
                            Some(cell) => cell.paragraphs.push(text),
                            None if table_depth == 0 => {
                                body.blocks.push(Block::Paragraph(Paragraph { style, text }))
                            }
                            // Paragraph between cells of a malformed table.
                            None => {}
                        }
                    }
                }
                b"w:tc" if table_depth == 1 => {
                    if let Some(t) = table.as_mut() {
                        if let Some(cell) = t.current_cell.take() {
                            t.current_row.push(cell);
                        }
                    }
                }
                b"w:tr" if table_depth == 1 => {
                    if let Some(t) = table.as_mut() {
                        let row = std::mem::take(&mut t.current_row);
                        t.rows.push(row);
                    }
                }
                b"w:tbl" => {
                    table_depth = table_depth.saturating_sub(1);
                    if table_depth == 0 {
                        if let Some(t) = table.take() {
                            body.blocks.push(Block::Table(resolve_grid(t.rows)));
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(body)
}

/// Value of the `w:val` attribute, if present.
fn attr_val(e: &BytesStart<'_>) -> Option<String> {
    e.attributes()
        .filter_map(Result::ok)
        .find(|a| a.key.as_ref() == b"w:val")
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Expand horizontal spans and fill vertical continuations.
fn resolve_grid(rows: Vec<Vec<RawCell>>) -> Table {
    let mut resolved: Vec<Vec<String>> = Vec::with_capacity(rows.len());

    for raw_row in rows {
        let mut row: Vec<String> = Vec::new();
        for cell in raw_row {
            let col = row.len();
            let text = match cell.v_merge {
                Some(VMerge::Continue) => resolved
                    .last()
                    .and_then(|above| above.get(col))
                    .cloned()
                    .unwrap_or_default(),
                _ => cell_text(&cell.paragraphs),
            };
            for _ in 0..cell.grid_span {
                row.push(text.clone());
            }
        }
        resolved.push(row);
    }

    Table { rows: resolved }
}

fn cell_text(paragraphs: &[String]) -> String {
    paragraphs
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

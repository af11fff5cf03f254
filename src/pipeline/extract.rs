//! EBD extraction: find the decision trees of a document and turn their
//! Word tables into [`EbdTable`]s.
//!
//! ## Locating EBDs
//!
//! Every EBD starts with a paragraph (usually a level-3 heading) whose text
//! begins with its key, e.g. `E_0003_Bestellung der Aggregationsebene
//! prüfen`. The tables that follow it, up to the next heading or key, form
//! the decision table; Word splits long tables at page breaks, so there may
//! be several. Sections without any table (cross references such as "Es ist
//! das EBD E_0402 zu nutzen") yield [`ExtractionError::TableNotFound`].
//!
//! Heading numbers are not part of the paragraph text (Word numbers them
//! automatically), so chapter / section / subsection numbers are recomputed
//! by counting heading paragraphs per level.
//!
//! ## Table layout
//!
//! ```text
//! | Prüfende Rolle: NB                                        |
//! | Nr. | Prüfschritt     | Prüfergebnis | (target) | Code | Hinweis |
//! | 1   | Ist ... bekannt? | ja           | 2        |      |         |
//! | 1   | (merged)        | nein         | Ende     | A01  | ...     |
//! ```
//!
//! The reader has already expanded merged cells, so each data row carries
//! its step number and the two rows of a step can be grouped by it.

use crate::error::ExtractionError;
use crate::model::{
    EbdCheckResult, EbdTable, EbdTableMetaData, EbdTableRow, EbdTableSubRow, MultiStepInstruction,
};
use crate::pipeline::docx::{self, Block, DocxBody, Table};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

static RE_EBD_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^(E_\d{4})(?:$|[_:\s]+(.*)$)").unwrap());

static RE_ROLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Prüfende Rolle\s*:\s*([^\n]+)").unwrap());

static RE_CHECK_RESULT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^(ja|nein)\b[\s➡→>\-]*(.*)$").unwrap());

static RE_FOREIGN_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^E_\d{4}$").unwrap());

/// Position of an EBD in the document outline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EbdKapitel {
    pub chapter: u32,
    pub section: u32,
    pub subsection: u32,
    pub chapter_title: String,
    pub section_title: String,
    pub subsection_title: String,
}

impl EbdKapitel {
    /// `"7.39.1: Section title"`.
    pub fn sub_chapter(&self) -> String {
        format!(
            "{}.{}.{}: {}",
            self.chapter, self.section, self.subsection, self.section_title
        )
    }
}

/// One EBD key found in a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EbdKey {
    pub key: String,
    pub title: String,
    pub kapitel: EbdKapitel,
    /// Index of the key paragraph in [`DocxBody::blocks`].
    #[serde(skip)]
    pub block_index: usize,
}

/// A parsed document together with its EBD keys.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub path: PathBuf,
    pub body: DocxBody,
    pub keys: Vec<EbdKey>,
}

/// Read a document and discover its EBD keys.
///
/// # Errors
/// [`ExtractionError::Unreadable`] / [`ExtractionError::MalformedXml`] for
/// broken files, [`ExtractionError::NoDecisionTrees`] when no key is found.
pub fn load_document(path: &Path) -> Result<LoadedDocument, ExtractionError> {
    let body = docx::read_docx(path)?;
    let keys = discover_keys(&body);
    if keys.is_empty() {
        return Err(ExtractionError::NoDecisionTrees {
            path: path.to_path_buf(),
        });
    }
    info!("Found {} EBD keys in {}", keys.len(), path.display());
    Ok(LoadedDocument {
        path: path.to_path_buf(),
        body,
        keys,
    })
}

/// Find all EBD key paragraphs, in document order, first occurrence wins.
pub fn discover_keys(body: &DocxBody) -> Vec<EbdKey> {
    let mut keys: Vec<EbdKey> = Vec::new();
    let mut kapitel = EbdKapitel::default();

    for (index, block) in body.blocks.iter().enumerate() {
        let Block::Paragraph(p) = block else {
            continue;
        };
        if is_toc_style(p.style.as_deref()) {
            continue;
        }
        let text = p.text.trim();

        if let Some(level) = p.heading_level() {
            match level {
                1 => {
                    kapitel.chapter += 1;
                    kapitel.section = 0;
                    kapitel.subsection = 0;
                    kapitel.chapter_title = text.to_string();
                }
                2 => {
                    kapitel.section += 1;
                    kapitel.subsection = 0;
                    kapitel.section_title = text.to_string();
                }
                3 => {
                    kapitel.subsection += 1;
                    kapitel.subsection_title = text.to_string();
                }
                _ => {}
            }
        }

        let Some(caps) = RE_EBD_KEY.captures(text) else {
            continue;
        };
        let key = caps[1].to_string();
        if keys.iter().any(|k| k.key == key) {
            debug!("Ignoring repeated EBD key {} at block {}", key, index);
            continue;
        }
        let title = caps
            .get(2)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        keys.push(EbdKey {
            key,
            title,
            kapitel: kapitel.clone(),
            block_index: index,
        });
    }

    keys
}

/// Table-of-contents entries repeat every key; they must not count.
fn is_toc_style(style: Option<&str>) -> bool {
    style
        .map(|s| {
            let s = s.to_lowercase();
            s.starts_with("toc") || s.starts_with("verzeichnis")
        })
        .unwrap_or(false)
}

/// Tables and remark paragraphs between a key and the next heading or key.
fn section_blocks<'a>(doc: &'a LoadedDocument, key: &EbdKey) -> (Vec<&'a Table>, Vec<&'a str>) {
    let mut tables = Vec::new();
    let mut paragraphs = Vec::new();

    for block in doc.body.blocks.iter().skip(key.block_index + 1) {
        match block {
            Block::Paragraph(p) => {
                let text = p.text.trim();
                if p.heading_level().is_some() || RE_EBD_KEY.is_match(text) {
                    break;
                }
                if !text.is_empty() && tables.is_empty() {
                    paragraphs.push(text);
                }
            }
            Block::Table(t) => tables.push(t),
        }
    }

    (tables, paragraphs)
}

/// Convert the tables of one EBD into an [`EbdTable`].
///
/// # Errors
/// [`ExtractionError::TableNotFound`] when the section holds no table,
/// [`ExtractionError::MalformedTable`] when it does not look like an EBD.
pub fn extract_table(doc: &LoadedDocument, key: &EbdKey) -> Result<EbdTable, ExtractionError> {
    let (tables, paragraphs) = section_blocks(doc, key);
    if tables.is_empty() {
        let reason = paragraphs
            .first()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "no table before the next EBD".to_string());
        return Err(ExtractionError::TableNotFound {
            ebd_key: key.key.clone(),
            reason,
        });
    }

    let rows: Vec<&Vec<String>> = tables.iter().flat_map(|t| t.rows.iter()).collect();
    let converter = TableConverter::new(&key.key, &rows)?;

    let role = paragraphs
        .iter()
        .copied()
        .chain(converter.preamble().iter().flat_map(|r| r.iter().map(String::as_str)))
        .find_map(role_of)
        .ok_or_else(|| ExtractionError::MalformedTable {
            ebd_key: key.key.clone(),
            reason: "no 'Prüfende Rolle' found".to_string(),
        })?;

    let remark = paragraphs
        .iter()
        .filter(|p| role_of(p).is_none())
        .copied()
        .collect::<Vec<_>>()
        .join("\n");

    let (table_rows, instructions) = converter.convert()?;
    debug!("{}: {} steps", key.key, table_rows.len());

    Ok(EbdTable {
        metadata: EbdTableMetaData {
            ebd_code: key.key.clone(),
            ebd_name: key.title.clone(),
            chapter: key.kapitel.chapter_title.clone(),
            section: key.kapitel.sub_chapter(),
            role,
            remark: (!remark.is_empty()).then_some(remark),
        },
        rows: table_rows,
        multi_step_instructions: (!instructions.is_empty()).then_some(instructions),
    })
}

fn role_of(text: &str) -> Option<String> {
    RE_ROLE
        .captures(text)
        .map(|c| c[1].trim().to_string())
        .filter(|r| !r.is_empty())
}

// ── Table conversion ─────────────────────────────────────────────────────

/// Column positions taken from the header row.
#[derive(Debug, Clone, Copy)]
struct Columns {
    step: usize,
    description: usize,
    result: usize,
    /// Second grid column of a spanned "Prüfergebnis" header.
    target: Option<usize>,
    code: Option<usize>,
    note: Option<usize>,
}

struct TableConverter<'a> {
    ebd_key: &'a str,
    rows: &'a [&'a Vec<String>],
    header: usize,
    columns: Columns,
}

impl<'a> TableConverter<'a> {
    fn new(ebd_key: &'a str, rows: &'a [&'a Vec<String>]) -> Result<Self, ExtractionError> {
        let header = rows
            .iter()
            .position(|r| is_header(r))
            .ok_or_else(|| ExtractionError::MalformedTable {
                ebd_key: ebd_key.to_string(),
                reason: "no header row with 'Nr.' and 'Prüfschritt'".to_string(),
            })?;
        let columns = Self::columns(ebd_key, rows[header])?;
        Ok(Self {
            ebd_key,
            rows,
            header,
            columns,
        })
    }

    fn columns(ebd_key: &str, header: &[String]) -> Result<Columns, ExtractionError> {
        let missing = |name: &str| ExtractionError::MalformedTable {
            ebd_key: ebd_key.to_string(),
            reason: format!("header has no '{name}' column"),
        };

        let step = position(header, |c| c.starts_with("Nr")).ok_or_else(|| missing("Nr."))?;
        let description =
            position(header, |c| c.contains("Prüfschritt")).ok_or_else(|| missing("Prüfschritt"))?;
        let result_cols: Vec<usize> = header
            .iter()
            .enumerate()
            .filter(|(_, c)| c.contains("Prüfergebnis"))
            .map(|(i, _)| i)
            .collect();
        let result = *result_cols.first().ok_or_else(|| missing("Prüfergebnis"))?;

        Ok(Columns {
            step,
            description,
            result,
            target: result_cols.get(1).copied(),
            code: position(header, |c| c.starts_with("Code")),
            note: position(header, |c| c.starts_with("Hinweis")),
        })
    }

    /// Rows above the header (role line, captions).
    fn preamble(&self) -> &[&'a Vec<String>] {
        &self.rows[..self.header]
    }

    fn malformed(&self, reason: String) -> ExtractionError {
        ExtractionError::MalformedTable {
            ebd_key: self.ebd_key.to_string(),
            reason,
        }
    }

    fn convert(&self) -> Result<(Vec<EbdTableRow>, Vec<MultiStepInstruction>), ExtractionError> {
        let header = self.rows[self.header];
        let mut rows: Vec<EbdTableRow> = Vec::new();
        let mut instructions: Vec<MultiStepInstruction> = Vec::new();
        let mut pending_instruction: Option<String> = None;

        for row in &self.rows[self.header + 1..] {
            if row.iter().all(|c| c.trim().is_empty()) || *row == header || is_header(row) {
                continue;
            }
            if row.iter().any(|c| role_of(c).is_some()) {
                continue;
            }
            if let Some(text) = spanning_text(row) {
                pending_instruction = Some(text);
                continue;
            }

            let cell = |i: usize| row.get(i).map(|c| c.trim()).unwrap_or("");
            let step = cell(self.columns.step);
            let sub_row = self.sub_row(step, row)?;
            let seen_before = rows.iter().any(|r| r.step_number == step);

            match rows.last_mut() {
                Some(last) if step.is_empty() || last.step_number == step => {
                    last.sub_rows.push(sub_row);
                }
                _ if step.is_empty() => {
                    return Err(self.malformed("data row without step number".to_string()));
                }
                _ if seen_before => {
                    return Err(self.malformed(format!("step {step} appears twice")));
                }
                _ => {
                    if let Some(text) = pending_instruction.take() {
                        instructions.push(MultiStepInstruction {
                            instruction_text: text,
                            first_step_number_affected: step.to_string(),
                        });
                    }
                    rows.push(EbdTableRow {
                        step_number: step.to_string(),
                        description: cell(self.columns.description).to_string(),
                        sub_rows: vec![sub_row],
                    });
                }
            }
        }

        if rows.is_empty() {
            return Err(self.malformed("table has no steps".to_string()));
        }
        if let Some(text) = pending_instruction {
            debug!("{}: instruction after the last step ignored: {text}", self.ebd_key);
        }
        for row in &rows {
            let yes = row.sub_rows.iter().filter(|s| s.check_result.result).count();
            let no = row.sub_rows.len() - yes;
            if yes != 1 || no != 1 {
                return Err(self.malformed(format!(
                    "step {} needs one 'ja' and one 'nein' row, found {} and {}",
                    row.step_number, yes, no
                )));
            }
        }

        Ok((rows, instructions))
    }

    fn sub_row(&self, step: &str, row: &[String]) -> Result<EbdTableSubRow, ExtractionError> {
        let cell = |i: usize| row.get(i).map(|c| c.trim()).unwrap_or("");
        let first = cell(self.columns.result);

        // A spanned header gives a separate target column unless the data
        // cell itself spans both.
        let (answer, target) = match self.columns.target.map(cell) {
            Some(second) if second != first => (first.to_string(), second.to_string()),
            _ => {
                let caps = RE_CHECK_RESULT.captures(first).ok_or_else(|| {
                    self.malformed(format!("step {step}: unrecognised check result '{first}'"))
                })?;
                (caps[1].to_string(), caps[2].trim().to_string())
            }
        };

        let result = match answer.to_lowercase().as_str() {
            "ja" => true,
            "nein" => false,
            other => {
                return Err(self.malformed(format!(
                    "step {step}: unrecognised check result '{other}'"
                )))
            }
        };

        Ok(EbdTableSubRow {
            check_result: EbdCheckResult {
                result,
                subsequent_step_number: parse_target(&target),
            },
            result_code: self.columns.code.map(cell).and_then(non_empty),
            note: self.columns.note.map(cell).and_then(non_empty),
        })
    }
}

fn position(header: &[String], pred: impl Fn(&str) -> bool) -> Option<usize> {
    header.iter().position(|c| pred(c.trim()))
}

fn is_header(row: &[String]) -> bool {
    row.iter().any(|c| c.trim().starts_with("Nr")) && row.iter().any(|c| c.contains("Prüfschritt"))
}

/// Text of a row whose cells all carry the same text (one merged cell).
fn spanning_text(row: &[String]) -> Option<String> {
    let first = row.first()?.trim();
    (row.len() > 1 && !first.is_empty() && row.iter().all(|c| c.trim() == first))
        .then(|| first.to_string())
}

/// `"2"` → `Some("2")`, `"Ende"`/`""` → `None`, `"E_0402"` kept verbatim.
fn parse_target(text: &str) -> Option<String> {
    let t = text.trim();
    if t.is_empty() || t.eq_ignore_ascii_case("ende") {
        return None;
    }
    if RE_FOREIGN_KEY.is_match(t) {
        return Some(t.to_string());
    }
    Some(t.trim_end_matches('*').trim().to_string())
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

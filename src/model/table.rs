//! Decision-tree table: one EBD as it appears in the document.
//!
//! Every EBD table has the same shape: a numbered list of checks, each with
//! exactly two outcomes ("ja" / "nein"). An outcome either continues with
//! another step, or ends with a result code and an optional note.

use serde::{Deserialize, Serialize};

/// Metadata of one EBD.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EbdTableMetaData {
    /// The EBD key, e.g. `E_0003`.
    pub ebd_code: String,
    /// Human-readable name from the key heading.
    pub ebd_name: String,
    /// Title of the chapter containing the EBD.
    pub chapter: String,
    /// `"{chapter}.{section}.{subsection}: {section title}"`.
    pub section: String,
    /// The checking market role ("Prüfende Rolle"), e.g. `NB`.
    pub role: String,
    /// Free text found between the heading and the table, if any.
    pub remark: Option<String>,
}

/// The result of a check and where it leads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EbdCheckResult {
    /// `true` for "ja", `false` for "nein".
    pub result: bool,
    /// The next step, or `None` when the tree ends here.
    pub subsequent_step_number: Option<String>,
}

/// One outcome of a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EbdTableSubRow {
    pub check_result: EbdCheckResult,
    /// Answer code such as `A01`.
    pub result_code: Option<String>,
    pub note: Option<String>,
}

/// One numbered check with its two outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EbdTableRow {
    pub step_number: String,
    /// The question asked in this step.
    pub description: String,
    pub sub_rows: Vec<EbdTableSubRow>,
}

impl EbdTableRow {
    /// The sub row for the given answer.
    pub fn sub_row(&self, result: bool) -> Option<&EbdTableSubRow> {
        self.sub_rows
            .iter()
            .find(|s| s.check_result.result == result)
    }
}

/// An instruction spanning the whole table width, valid from a given step on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiStepInstruction {
    pub instruction_text: String,
    pub first_step_number_affected: String,
}

/// One complete EBD.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EbdTable {
    pub metadata: EbdTableMetaData,
    pub rows: Vec<EbdTableRow>,
    pub multi_step_instructions: Option<Vec<MultiStepInstruction>>,
}

impl EbdTable {
    /// The row with the given step number.
    pub fn row(&self, step_number: &str) -> Option<&EbdTableRow> {
        self.rows.iter().find(|r| r.step_number == step_number)
    }

    /// Serialise as pretty JSON with lexicographically sorted keys.
    ///
    /// Going through `serde_json::Value` sorts object keys (its map is a
    /// `BTreeMap`), so re-running on the same input yields identical bytes.
    pub fn to_sorted_json(&self) -> Result<String, serde_json::Error> {
        let value = serde_json::to_value(self)?;
        serde_json::to_string_pretty(&value)
    }
}

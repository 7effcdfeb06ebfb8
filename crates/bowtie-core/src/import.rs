use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Reader};

use crate::{BowtieError, BowtieRecord, BowtieResult, Consequence, Threat, TopEvent};

pub const THREATS_SHEET: &str = "Threats";
pub const CONSEQUENCES_SHEET: &str = "Consequences";
pub const INFO_SHEET: &str = "Info";

pub const THREAT_COLUMN: &str = "Threat";
pub const PREVENTIVE_BARRIERS_COLUMN: &str = "Preventive Barriers";
pub const CONSEQUENCE_COLUMN: &str = "Consequence";
pub const MITIGATIVE_BARRIERS_COLUMN: &str = "Mitigative Barriers";

pub use crate::editor::HAZARD_PLACEHOLDER;
pub const TOP_EVENT_PLACEHOLDER: &str = "Enter the top event here";

/// Separator between barriers inside one cell.
pub const BARRIER_SEPARATOR: char = ';';

// --- Workbook ---

/// One worksheet as a grid of optional cell texts. Row 0 is the sheet's
/// first row; empty cells are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Option<String>>>,
}

impl Sheet {
    /// Build a sheet from literal rows; empty strings become empty cells.
    pub fn from_rows(name: &str, rows: &[&[&str]]) -> Self {
        Self {
            name: name.to_string(),
            rows: rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|c| (!c.is_empty()).then(|| c.to_string()))
                        .collect()
                })
                .collect(),
        }
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row)?.get(col)?.as_deref()
    }

    fn row_is_empty(&self, row: usize) -> bool {
        !self.rows[row]
            .iter()
            .any(|c| c.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }

    /// First row with any content. Leading blank rows are not headers.
    pub fn header_row(&self) -> Option<usize> {
        (0..self.rows.len()).find(|&r| !self.row_is_empty(r))
    }

    /// Index of the header cell named `name`.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.rows[self.header_row()?]
            .iter()
            .position(|c| c.as_deref().map(str::trim) == Some(name))
    }

    fn require_column(&self, name: &str) -> BowtieResult<usize> {
        self.column(name).ok_or_else(|| {
            BowtieError::Workbook(format!("sheet '{}' has no '{}' column", self.name, name))
        })
    }

    /// Rows below the header that have at least one non-empty cell.
    fn data_rows(&self) -> impl Iterator<Item = usize> + '_ {
        let first = self.header_row().map_or(self.rows.len(), |h| h + 1);
        (first..self.rows.len()).filter(move |&r| !self.row_is_empty(r))
    }
}

/// A spreadsheet file reduced to its sheets' cell texts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// Read every sheet of an .xlsx/.xls/.ods file held in memory.
    pub fn from_bytes(bytes: &[u8]) -> BowtieResult<Self> {
        let mut book = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
            .map_err(|e| BowtieError::Workbook(e.to_string()))?;

        let mut sheets = Vec::new();
        for name in book.sheet_names() {
            let range = book
                .worksheet_range(&name)
                .map_err(|e| BowtieError::Workbook(format!("sheet '{name}': {e}")))?;

            // Ranges start at the first used cell; pad back to A1 so fixed
            // positions in the Info sheet stay put.
            let (row0, col0) = range
                .start()
                .map(|(r, c)| (r as usize, c as usize))
                .unwrap_or((0, 0));
            let mut rows: Vec<Vec<Option<String>>> = vec![Vec::new(); row0];
            for row in range.rows() {
                let mut cells: Vec<Option<String>> = vec![None; col0];
                cells.extend(row.iter().map(cell_text));
                rows.push(cells);
            }
            sheets.push(Sheet { name, rows });
        }
        Ok(Self { sheets })
    }

    pub fn open(path: &Path) -> BowtieResult<Self> {
        let bytes = std::fs::read(path).map_err(BowtieError::Io)?;
        Self::from_bytes(&bytes)
    }
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => Some(s.clone()),
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

// --- Tabular import ---

/// Split a barrier cell on `;`, trimming and dropping empty fragments.
pub fn split_barriers(cell: Option<&str>) -> Vec<String> {
    cell.unwrap_or_default()
        .split(BARRIER_SEPARATOR)
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(str::to_string)
        .collect()
}

/// Build a single-top-event record from the `Threats`, `Consequences` and
/// optional `Info` sheets. Either both required sheets import or nothing does.
pub fn import_workbook(book: &Workbook) -> BowtieResult<BowtieRecord> {
    let threats_sheet = book
        .sheet(THREATS_SHEET)
        .ok_or_else(|| BowtieError::Workbook(format!("missing '{THREATS_SHEET}' sheet")))?;
    let consequences_sheet = book
        .sheet(CONSEQUENCES_SHEET)
        .ok_or_else(|| BowtieError::Workbook(format!("missing '{CONSEQUENCES_SHEET}' sheet")))?;

    let threat_col = threats_sheet.require_column(THREAT_COLUMN)?;
    let pb_col = threats_sheet.require_column(PREVENTIVE_BARRIERS_COLUMN)?;
    let consequence_col = consequences_sheet.require_column(CONSEQUENCE_COLUMN)?;
    let mb_col = consequences_sheet.require_column(MITIGATIVE_BARRIERS_COLUMN)?;

    let threats: Vec<Threat> = threats_sheet
        .data_rows()
        .map(|r| Threat {
            threat: threats_sheet.cell(r, threat_col).unwrap_or_default().trim().to_string(),
            preventive_barriers: split_barriers(threats_sheet.cell(r, pb_col)),
        })
        .collect();

    let consequences: Vec<Consequence> = consequences_sheet
        .data_rows()
        .map(|r| Consequence {
            consequence: consequences_sheet
                .cell(r, consequence_col)
                .unwrap_or_default()
                .trim()
                .to_string(),
            mitigative_barriers: split_barriers(consequences_sheet.cell(r, mb_col)),
        })
        .collect();

    let info = book.sheet(INFO_SHEET);
    let info_value = |row: usize, placeholder: &str| {
        info.and_then(|s| s.cell(row, 1))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(placeholder)
            .to_string()
    };
    if info.is_none() {
        tracing::debug!("workbook has no Info sheet, using placeholders");
    }

    tracing::info!(
        threats = threats.len(),
        consequences = consequences.len(),
        "imported bowtie workbook"
    );

    Ok(BowtieRecord {
        hazard: info_value(0, HAZARD_PLACEHOLDER),
        top_events: vec![TopEvent {
            top_event: info_value(1, TOP_EVENT_PLACEHOLDER),
            threats,
            consequences,
        }],
    })
}

// --- JSON import ---

/// Parse a record from JSON text.
pub fn import_json(text: &str) -> BowtieResult<BowtieRecord> {
    serde_json::from_str(text).map_err(BowtieError::Json)
}

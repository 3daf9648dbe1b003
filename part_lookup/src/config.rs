// ********* Input data structures ***********

use std::collections::HashMap;
use std::error::Error;
use std::fmt::Display;

/// The content of one cell of a tabular file, as produced by the file readers.
///
/// Numeric cells are kept apart from text so that a phone number stored as a
/// number in a spreadsheet is never rendered through a floating-point path.
#[derive(PartialEq, Debug, Clone)]
pub enum CellValue {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
}

static EMPTY_CELL: CellValue = CellValue::Empty;

impl CellValue {
    /// True for empty cells, whitespace-only text and NaN.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Int(_) => false,
            CellValue::Float(f) => f.is_nan(),
        }
    }

    /// The text form of the cell, as written to an output table.
    ///
    /// Integral floats are written without a fractional part (`12.0` -> `12`).
    pub fn render(&self) -> String {
        match self {
            CellValue::Empty => "".to_string(),
            CellValue::Text(s) => s.clone(),
            CellValue::Int(i) => i.to_string(),
            CellValue::Float(f) if f.is_nan() => "".to_string(),
            CellValue::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => (*f as i64).to_string(),
            CellValue::Float(f) => f.to_string(),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s.to_string())
        }
    }
}

/// A table read from a file: one header row followed by the data rows.
///
/// Rows are not guaranteed to have the same length as the header; use
/// [Table::cell] for a padded view.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Table {
    pub fn new(header: Vec<String>) -> Table {
        Table {
            header,
            rows: Vec::new(),
        }
    }

    /// Finds a column by name. An exact match (ignoring surrounding spaces) is
    /// preferred over a case-insensitive one.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.header
            .iter()
            .position(|h| h.trim() == name)
            .or_else(|| {
                self.header
                    .iter()
                    .position(|h| h.trim().eq_ignore_ascii_case(name))
            })
    }

    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }
}

/// A canonical 10-digit phone number, used as the join key.
///
/// Only produced by [crate::phone::normalize].
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub struct PhoneKey(pub(crate) String);

impl PhoneKey {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for PhoneKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A constituency of the reference table.
///
/// `numeric_id` is the canonical zero-padded number used to name the master
/// data files (`WB023` -> `023`).
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct ConstituencyRecord {
    pub name: String,
    pub code: String,
    pub numeric_id: String,
}

impl ConstituencyRecord {
    /// The numeric id as a number, used for ordering.
    pub fn number(&self) -> u64 {
        // numeric_id only contains digits by construction.
        self.numeric_id.parse::<u64>().unwrap_or(u64::MAX)
    }

    /// The numeric id without the zero padding (`023` -> `23`).
    pub fn unpadded_id(&self) -> String {
        self.number().to_string()
    }
}

/// A row of the response table, as seen by the join.
///
/// The other fields of the row stay in the caller's table; the join only
/// fills in the part number.
#[derive(PartialEq, Debug, Clone)]
pub struct ResponseRow {
    pub constituency: Option<String>,
    pub phone: CellValue,
    part_no: Option<String>,
}

impl ResponseRow {
    pub fn new(constituency: Option<String>, phone: CellValue) -> ResponseRow {
        let constituency = constituency
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        ResponseRow {
            constituency,
            phone,
            part_no: None,
        }
    }

    /// The part number found for this row, or an empty string.
    pub fn part_no(&self) -> &str {
        self.part_no.as_deref().unwrap_or("")
    }

    pub fn is_matched(&self) -> bool {
        self.part_no.is_some()
    }

    // Invariant: called at most once per row, by the pass of its own constituency.
    pub(crate) fn assign_part_no(&mut self, part_no: &str) {
        debug_assert!(self.part_no.is_none(), "part number assigned twice");
        self.part_no = Some(part_no.to_string());
    }
}

/// Phone key to part number, for a single constituency.
///
/// On duplicate keys, the first value inserted is kept.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct MasterMapping {
    entries: HashMap<PhoneKey, String>,
    duplicates: u64,
}

impl MasterMapping {
    pub fn new() -> MasterMapping {
        MasterMapping::default()
    }

    /// Returns false if the key was already present (the existing value is kept).
    pub fn insert(&mut self, key: PhoneKey, part_no: String) -> bool {
        if self.entries.contains_key(&key) {
            self.duplicates += 1;
            return false;
        }
        self.entries.insert(key, part_no);
        true
    }

    pub fn get(&self, key: &PhoneKey) -> Option<&str> {
        self.entries.get(key).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of rows dropped because their key was already present.
    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }
}

// ******** Output data structures *********

/// What happened to the rows of one constituency.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum PartitionOutcome {
    /// The master data was loaded and every row was looked up.
    Matched,
    /// The constituency name is not in the reference table.
    Unresolved,
    /// None of the candidate files exist.
    NoMasterFile { tried: Vec<String> },
    /// The master file exists but could not be used.
    LoadFailed { reason: String },
    /// The master file was read but did not produce a single phone key.
    EmptyMapping,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ConstituencyStats {
    pub name: String,
    pub record: Option<ConstituencyRecord>,
    pub rows: u64,
    pub matched: u64,
    pub outcome: PartitionOutcome,
}

impl ConstituencyStats {
    pub fn unmatched(&self) -> u64 {
        self.rows - self.matched
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct JoinStats {
    /// Resolved constituencies in numeric id order, then the unresolved ones by name.
    pub constituencies: Vec<ConstituencyStats>,
    /// Rows without a constituency name. They are always unmatched.
    pub blank_constituency_rows: u64,
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub struct Summary {
    pub total_rows: u64,
    pub matched: u64,
    pub unmatched: u64,
    /// Between 0 and 100.
    pub match_rate: f64,
}

// ********* Errors **********

/// The two columns looked for in a master data file.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum ColumnRole {
    Phone,
    PartNo,
}

impl Display for ColumnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnRole::Phone => write!(f, "phone"),
            ColumnRole::PartNo => write!(f, "part number"),
        }
    }
}

/// Errors that prevent a master data table from being used.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum LookupError {
    EmptyTable,
    MissingColumn {
        role: ColumnRole,
        header: Vec<String>,
    },
}

impl Error for LookupError {}

impl Display for LookupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupError::EmptyTable => write!(f, "the master data table has no header"),
            LookupError::MissingColumn { role, header } => write!(
                f,
                "{} column not found. Available columns: {:?}",
                role, header
            ),
        }
    }
}

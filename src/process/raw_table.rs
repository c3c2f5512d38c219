use chrono::{NaiveDateTime, Timelike};
use std::fmt;

/// A single cell as read from a workbook, with its type preserved.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDateTime),
}

impl CellValue {
    /// True for absent cells and for text that is blank after trimming.
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Coerce to text; `None` for empty cells.
    pub fn as_text(&self) -> Option<String> {
        if matches!(self, CellValue::Empty) {
            return None;
        }
        Some(self.to_string())
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Number(n) => {
                // integers without decimals, the way spreadsheets show them
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            CellValue::Bool(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            CellValue::Date(dt) => {
                if dt.num_seconds_from_midnight() == 0 {
                    write!(f, "{}", dt.format("%Y-%m-%d"))
                } else {
                    write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S"))
                }
            }
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

/// One sheet of one input file, as a rectangular grid of cells.
#[derive(Debug, Clone)]
pub struct RawSheet {
    /// Name of the file the sheet came from (as uploaded / as found in the archive).
    pub file_name: String,
    /// Sheet name inside that file.
    pub sheet_name: String,
    /// Row-major cells; every row has the same length.
    pub cells: Vec<Vec<CellValue>>,
}

impl RawSheet {
    pub fn new(file_name: impl Into<String>, sheet_name: impl Into<String>, cells: Vec<Vec<CellValue>>) -> Self {
        let width = cells.iter().map(Vec::len).max().unwrap_or(0);
        let cells = cells
            .into_iter()
            .map(|mut row| {
                row.resize(width, CellValue::Empty);
                row
            })
            .collect();
        Self {
            file_name: file_name.into(),
            sheet_name: sheet_name.into(),
            cells,
        }
    }

    pub fn height(&self) -> usize {
        self.cells.len()
    }

    pub fn width(&self) -> usize {
        self.cells.first().map_or(0, Vec::len)
    }

    /// No rows at all, or every cell of every row is absent. Whitespace text counts as content.
    pub fn is_blank(&self) -> bool {
        self.cells
            .iter()
            .all(|row| row.iter().all(|c| matches!(c, CellValue::Empty)))
    }
}

/// Column labels plus data rows. Labels are unique; rows are as wide as the header.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HeaderedTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl HeaderedTable {
    /// Build a table, deduplicating labels and padding/truncating rows to the header width.
    pub fn new(labels: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let columns = dedupe_labels(labels);
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, CellValue::Empty);
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, label: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == label)
    }

    pub fn has_column(&self, label: &str) -> bool {
        self.column_index(label).is_some()
    }

    /// Cell at (`row`, column `label`), if the column exists.
    pub fn get(&self, row: usize, label: &str) -> Option<&CellValue> {
        let idx = self.column_index(label)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Append a column filled with `fill`. The label is deduplicated against existing ones.
    pub fn push_column(&mut self, label: &str, fill: CellValue) -> usize {
        let mut labels = self.columns.clone();
        labels.push(label.to_string());
        self.columns = dedupe_labels(labels);
        for row in &mut self.rows {
            row.push(fill.clone());
        }
        self.columns.len() - 1
    }

    /// Rename every label through `f`, then re-deduplicate.
    pub fn rename_columns<F>(&mut self, f: F)
    where
        F: Fn(&str) -> String,
    {
        let renamed = self.columns.iter().map(|c| f(c)).collect();
        self.columns = dedupe_labels(renamed);
    }

    /// New table with only the columns at `indices`, in that order.
    pub fn select_columns(&self, indices: &[usize]) -> HeaderedTable {
        HeaderedTable {
            columns: indices.iter().map(|&i| self.columns[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        }
    }

    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(&[CellValue]) -> bool,
    {
        self.rows.retain(|row| keep(row));
    }
}

/// Make labels unique: blanks become `Unnamed: {idx}`, repeats get `.1`, `.2`, ... suffixes.
pub fn dedupe_labels(labels: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(labels.len());
    for (idx, label) in labels.into_iter().enumerate() {
        let base = if label.trim().is_empty() {
            format!("Unnamed: {}", idx)
        } else {
            label
        };
        if !out.contains(&base) {
            out.push(base);
            continue;
        }
        let mut n = 1;
        loop {
            let candidate = format!("{}.{}", base, n);
            if !out.contains(&candidate) {
                out.push(candidate);
                break;
            }
            n += 1;
        }
    }
    out
}

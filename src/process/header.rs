use serde::Serialize;
use tracing::{debug, warn};

use crate::process::raw_table::{CellValue, HeaderedTable, RawSheet};

/// Where the header row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "row", rename_all = "snake_case")]
pub enum HeaderSource {
    /// First cell of this row matched a sentinel.
    Sentinel(usize),
    /// No sentinel found; row 0 was used.
    Fallback,
}

impl HeaderSource {
    pub fn row(&self) -> usize {
        match self {
            HeaderSource::Sentinel(idx) => *idx,
            HeaderSource::Fallback => 0,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Located {
    Table {
        table: HeaderedTable,
        header: HeaderSource,
    },
    /// Sheet has no cells, or every cell is absent.
    Blank,
}

/// Split `sheet` into header labels and data rows.
///
/// The header is the first row whose first cell is text exactly equal to one of
/// `sentinels`. Without a match, row 0 is the header and the result is tagged
/// [`HeaderSource::Fallback`].
pub fn locate_header(sheet: &RawSheet, sentinels: &[String]) -> Located {
    if sheet.is_blank() {
        return Located::Blank;
    }

    let found = sheet.cells.iter().position(|row| {
        matches!(row.first(), Some(CellValue::Text(s)) if sentinels.iter().any(|t| t == s))
    });

    let header = match found {
        Some(idx) => {
            debug!(file = %sheet.file_name, sheet = %sheet.sheet_name, row = idx, "header sentinel found");
            HeaderSource::Sentinel(idx)
        }
        None => {
            warn!(
                file = %sheet.file_name,
                sheet = %sheet.sheet_name,
                "no header sentinel found, using first row as header"
            );
            HeaderSource::Fallback
        }
    };

    let h = header.row();
    let labels = sheet.cells[h].iter().map(header_label).collect();
    let rows = sheet.cells[h + 1..].to_vec();

    Located::Table {
        table: HeaderedTable::new(labels, rows),
        header,
    }
}

fn header_label(cell: &CellValue) -> String {
    cell.as_text().unwrap_or_default()
}

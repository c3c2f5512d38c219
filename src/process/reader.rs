// src/process/reader.rs
use anyhow::{Context, Result};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::{collections::HashMap, io::Cursor};
use tracing::{debug, warn};

use crate::process::{
    date_parser::{excel_serial_to_datetime, parse_date_str},
    layout::{read_layouts, SheetLayout},
    raw_table::{CellValue, RawSheet},
    utils::extension,
};

/// One input workbook after reading: every sheet's grid (or the error reading it).
#[derive(Debug)]
pub struct SourceWorkbook {
    pub file_name: String,
    pub sheets: Vec<(String, Result<RawSheet>)>,
    /// Populated only when layouts were requested and the container is xlsx.
    pub layouts: HashMap<String, SheetLayout>,
}

impl SourceWorkbook {
    pub fn layout(&self, sheet_name: &str) -> Option<&SheetLayout> {
        self.layouts.get(sheet_name)
    }
}

/// Open `bytes` as a workbook (format sniffed by calamine) and read every sheet.
///
/// Failing to open the container is an error for the whole file; failing to
/// read a single sheet is kept next to that sheet's name.
#[tracing::instrument(level = "debug", skip(bytes), fields(size = bytes.len()))]
pub fn read_workbook(file_name: &str, bytes: &[u8], with_layouts: bool) -> Result<SourceWorkbook> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .with_context(|| format!("opening workbook {}", file_name))?;
    let sheet_names = workbook.sheet_names().to_owned();
    debug!(file = %file_name, sheets = sheet_names.len(), "workbook opened");

    let mut sheets = Vec::with_capacity(sheet_names.len());
    for sheet_name in sheet_names {
        let grid = workbook
            .worksheet_range(&sheet_name)
            .with_context(|| format!("reading sheet {} of {}", sheet_name, file_name))
            .map(|range| {
                // anchor at A1 so row/column indices match the source sheet
                let (row_off, col_off) = range
                    .start()
                    .map_or((0, 0), |(r, c)| (r as usize, c as usize));
                let mut cells: Vec<Vec<CellValue>> = vec![Vec::new(); row_off];
                for row in range.rows() {
                    let mut out = vec![CellValue::Empty; col_off];
                    out.extend(row.iter().map(cell_from_data));
                    cells.push(out);
                }
                RawSheet::new(file_name, sheet_name.clone(), cells)
            });
        sheets.push((sheet_name, grid));
    }

    let layouts = if with_layouts && matches!(extension(file_name).as_deref(), Some("xlsx" | "xlsm")) {
        read_layouts(bytes).unwrap_or_else(|e| {
            warn!(file = %file_name, "could not read source formatting: {:#}", e);
            HashMap::new()
        })
    } else {
        HashMap::new()
    };

    Ok(SourceWorkbook {
        file_name: file_name.to_string(),
        sheets,
        layouts,
    })
}

/// Map a calamine value onto a [`CellValue`]. Error cells read as empty.
pub fn cell_from_data(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => excel_serial_to_datetime(dt.as_f64())
            .map(CellValue::Date)
            .unwrap_or(CellValue::Number(dt.as_f64())),
        Data::DateTimeIso(s) => parse_date_str(s)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(CellValue::Date)
            .unwrap_or_else(|| CellValue::Text(s.clone())),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(_) => CellValue::Empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::{Format, Workbook};

    fn two_sheet_book() -> Result<Vec<u8>> {
        let mut wb = Workbook::new();
        let ws = wb.add_worksheet();
        ws.set_name("재직")?;
        ws.write_string(2, 0, "No")?;
        ws.write_string(2, 1, "성명")?;
        ws.write_string(2, 2, "입사일")?;
        ws.write_number(3, 0, 1)?;
        ws.write_string(3, 1, "김민수")?;
        ws.write_number_with_format(3, 2, 45415.0, &Format::new().set_num_format("yyyy-mm-dd"))?;
        let ws = wb.add_worksheet();
        ws.set_name("빈시트")?;
        Ok(wb.save_to_buffer()?)
    }

    #[test]
    fn reads_typed_cells_anchored_at_a1() -> Result<()> {
        let bytes = two_sheet_book()?;
        let book = read_workbook("branch.xlsx", &bytes, false)?;
        assert_eq!(book.sheets.len(), 2);

        let (name, sheet) = &book.sheets[0];
        assert_eq!(name, "재직");
        let sheet = sheet.as_ref().map_err(|e| anyhow::anyhow!("{:#}", e))?;
        assert_eq!(sheet.height(), 4);
        assert_eq!(sheet.cells[2][0], CellValue::from("No"));
        assert_eq!(sheet.cells[3][0], CellValue::Number(1.0));
        let hired = chrono::NaiveDate::from_ymd_opt(2024, 5, 3)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(CellValue::Date);
        assert_eq!(Some(sheet.cells[3][2].clone()), hired);

        let (_, empty) = &book.sheets[1];
        assert!(empty.as_ref().map(RawSheet::is_blank).unwrap_or(true));
        Ok(())
    }

    #[test]
    fn garbage_bytes_fail_to_open() {
        assert!(read_workbook("broken.xlsx", b"not a workbook", false).is_err());
    }

    #[test]
    fn layouts_only_when_requested() -> Result<()> {
        let bytes = two_sheet_book()?;
        assert!(read_workbook("a.xlsx", &bytes, false)?.layouts.is_empty());
        let book = read_workbook("a.xlsx", &bytes, true)?;
        assert_eq!(
            book.layout("재직").and_then(|l| l.number_format(3, 2)),
            Some("yyyy-mm-dd")
        );
        Ok(())
    }
}

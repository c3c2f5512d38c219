// src/process/writer.rs
use anyhow::{bail, Context, Result};
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::process::{
    date_parser::datetime_to_excel_serial,
    layout::SheetLayout,
    raw_table::{CellValue, HeaderedTable},
    utils::{sanitize_sheet_name, truncate_chars, SHEET_NAME_MAX_LEN},
};

/// Number format applied to date cells that carry no copied format.
pub const DATE_FORMAT: &str = "yyyy-mm-dd";

const MAX_ROWS: usize = 1_048_576;
const MAX_COLS: usize = 16_384;
const MAX_STRING_LEN: usize = 32_767;

/// How an output sheet maps back onto its source sheet when formatting is copied.
#[derive(Debug, Clone)]
pub struct CopiedFormatting<'a> {
    pub layout: Option<&'a SheetLayout>,
    /// Source row of every output row, header first.
    pub source_rows: Vec<usize>,
    /// Source column index of every output column.
    pub source_columns: Vec<usize>,
    /// Width of every output column.
    pub column_widths: Vec<f64>,
}

/// Accumulates named sheets into one in-memory xlsx workbook.
pub struct WorkbookWriter {
    workbook: Workbook,
    /// Lower-cased; Excel compares sheet names case-insensitively.
    used_names: HashSet<String>,
    written: Vec<String>,
    formats: HashMap<String, Format>,
}

impl Default for WorkbookWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkbookWriter {
    pub fn new() -> Self {
        Self {
            workbook: Workbook::new(),
            used_names: HashSet::new(),
            written: Vec::new(),
            formats: HashMap::new(),
        }
    }

    /// Names of the sheets written so far, in order.
    pub fn sheet_names(&self) -> &[String] {
        &self.written
    }

    pub fn is_empty(&self) -> bool {
        self.written.is_empty()
    }

    /// Sanitize `name` and reserve it, appending `__2`, `__3`, ... on collision.
    pub fn unique_sheet_name(&mut self, name: &str) -> String {
        let name = self.free_sheet_name(name);
        self.used_names.insert(name.to_lowercase());
        name
    }

    /// The name `unique_sheet_name` would hand out, without reserving it.
    fn free_sheet_name(&self, name: &str) -> String {
        let name = sanitize_sheet_name(name);
        if !self.used_names.contains(&name.to_lowercase()) {
            return name;
        }

        let base = truncate_chars(&name, SHEET_NAME_MAX_LEN - 3);
        let mut idx = 2usize;
        loop {
            let candidate = truncate_chars(&format!("{}__{}", base, idx), SHEET_NAME_MAX_LEN);
            if !self.used_names.contains(&candidate.to_lowercase()) {
                return candidate;
            }
            idx += 1;
        }
    }

    /// Write `table` as a new sheet named (a unique variant of) `name`.
    ///
    /// The sheet is built apart from the workbook and only added, and its name only
    /// reserved, once every cell is written. A failed call leaves the workbook as it was.
    /// Returns the name the sheet was actually written under.
    pub fn write_table(
        &mut self,
        name: &str,
        table: &HeaderedTable,
        formatting: Option<&CopiedFormatting<'_>>,
    ) -> Result<String> {
        if table.height() + 1 > MAX_ROWS || table.width() > MAX_COLS {
            bail!(
                "table of {} rows x {} columns does not fit in a worksheet",
                table.height(),
                table.width()
            );
        }

        let sheet_name = self.free_sheet_name(name);
        let date_format = self.format_for(DATE_FORMAT);
        let copied_formats: HashMap<(usize, usize), Format> = match formatting {
            Some(f) => self.copied_formats(f, table),
            None => HashMap::new(),
        };

        let mut worksheet = Worksheet::new();
        worksheet
            .set_name(&sheet_name)
            .with_context(|| format!("naming sheet {}", sheet_name))?;

        for (col, label) in table.columns.iter().enumerate() {
            let fmt = copied_formats.get(&(0, col));
            write_cell(&mut worksheet, 0, col, &CellValue::Text(label.clone()), fmt, &date_format)
                .with_context(|| format!("writing header of {}", sheet_name))?;
        }
        for (r, row) in table.rows.iter().enumerate() {
            for (col, cell) in row.iter().enumerate() {
                let fmt = copied_formats.get(&(r + 1, col));
                write_cell(&mut worksheet, r + 1, col, cell, fmt, &date_format)
                    .with_context(|| format!("writing row {} of {}", r + 1, sheet_name))?;
            }
        }

        if let Some(f) = formatting {
            apply_dimensions(&mut worksheet, f, table.height() + 1)
                .with_context(|| format!("applying formatting to {}", sheet_name))?;
        }

        self.workbook.push_worksheet(worksheet);
        self.used_names.insert(sheet_name.to_lowercase());
        debug!(sheet = %sheet_name, rows = table.height(), cols = table.width(), "sheet written");
        self.written.push(sheet_name.clone());
        Ok(sheet_name)
    }

    /// Serialize the workbook to xlsx bytes.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        self.workbook
            .save_to_buffer()
            .context("serializing output workbook")
    }

    fn format_for(&mut self, code: &str) -> Format {
        self.formats
            .entry(code.to_string())
            .or_insert_with(|| Format::new().set_num_format(code))
            .clone()
    }

    /// Output (row, col) → format, resolved through the source mapping.
    fn copied_formats(
        &mut self,
        f: &CopiedFormatting<'_>,
        table: &HeaderedTable,
    ) -> HashMap<(usize, usize), Format> {
        let mut out = HashMap::new();
        let Some(layout) = f.layout else {
            return out;
        };
        for (out_row, &src_row) in f.source_rows.iter().enumerate().take(table.height() + 1) {
            for (out_col, &src_col) in f.source_columns.iter().enumerate() {
                if let Some(code) = layout.number_format(src_row, src_col) {
                    let fmt = self.format_for(code);
                    out.insert((out_row, out_col), fmt);
                }
            }
        }
        out
    }
}

fn write_cell(
    ws: &mut Worksheet,
    row: usize,
    col: usize,
    cell: &CellValue,
    fmt: Option<&Format>,
    date_format: &Format,
) -> Result<()> {
    let (r, c) = (row as u32, col as u16);
    match (cell, fmt) {
        (CellValue::Empty, _) => {}
        (CellValue::Text(s), None) => {
            ws.write_string(r, c, &clip(s))?;
        }
        (CellValue::Text(s), Some(f)) => {
            ws.write_string_with_format(r, c, &clip(s), f)?;
        }
        (CellValue::Number(n), None) => {
            ws.write_number(r, c, *n)?;
        }
        (CellValue::Number(n), Some(f)) => {
            ws.write_number_with_format(r, c, *n, f)?;
        }
        (CellValue::Bool(b), None) => {
            ws.write_boolean(r, c, *b)?;
        }
        (CellValue::Bool(b), Some(f)) => {
            ws.write_boolean_with_format(r, c, *b, f)?;
        }
        (CellValue::Date(dt), f) => {
            let serial = datetime_to_excel_serial(dt);
            ws.write_number_with_format(r, c, serial, f.unwrap_or(date_format))?;
        }
    }
    Ok(())
}

fn clip(s: &str) -> String {
    if s.len() <= MAX_STRING_LEN {
        s.to_string()
    } else {
        truncate_chars(s, MAX_STRING_LEN)
    }
}

fn apply_dimensions(ws: &mut Worksheet, f: &CopiedFormatting<'_>, out_rows: usize) -> Result<()> {
    for (col, width) in f.column_widths.iter().enumerate() {
        ws.set_column_width(col as u16, *width)?;
    }
    if let Some(layout) = f.layout {
        for (out_row, &src_row) in f.source_rows.iter().enumerate().take(out_rows) {
            if let Some(height) = layout.row_height(src_row) {
                ws.set_row_height(out_row as u32, height)?;
            }
        }
    }
    Ok(())
}

// src/process/merge.rs
use anyhow::Result;
use tracing::{error, info, warn};

use crate::{
    ingest::InputBlob,
    process::{
        header::{locate_header, HeaderSource, Located},
        raw_table::{HeaderedTable, RawSheet},
        reader::{read_workbook, SourceWorkbook},
        report::{FileOutcome, FileReport, SheetOutcome, SheetReport},
        utils::{base_name, sanitize_sheet_name},
        writer::{CopiedFormatting, WorkbookWriter},
    },
    schema::rules::{apply_exclusions, ColumnRules, Exclusion},
};

/// Widest column Excel accepts.
const MAX_COLUMN_WIDTH: f64 = 255.0;

#[derive(Debug, Clone, Copy)]
pub struct MergeOptions<'a> {
    pub header_sentinels: &'a [String],
    pub column_rules: &'a ColumnRules,
    pub exclusions: &'a [Exclusion],
    pub copy_formatting: bool,
}

/// A sheet that made it into the output workbook.
#[derive(Debug, Clone)]
pub struct MergedSheet {
    pub file_name: String,
    pub source_sheet: String,
    pub written_as: String,
    pub header: HeaderSource,
    /// Rows dropped by person exclusions.
    pub excluded_rows: usize,
    /// The table after exclusions but before column rules, for derivation.
    pub table: HeaderedTable,
}

#[derive(Debug, Default)]
pub struct MergeResult {
    pub files: Vec<FileReport>,
    pub sheets: Vec<MergedSheet>,
}

/// Merge every input into `writer`, one output sheet per non-empty input sheet.
///
/// A file or sheet that fails is reported and skipped; the others still merge.
pub fn merge_inputs(inputs: &[InputBlob], writer: &mut WorkbookWriter, opts: MergeOptions<'_>) -> MergeResult {
    let mut result = MergeResult::default();
    for input in inputs {
        let outcome = merge_file(input, writer, opts, &mut result.sheets);
        result.files.push(FileReport {
            file: input.name.clone(),
            outcome,
        });
    }
    result
}

#[tracing::instrument(level = "info", skip_all, fields(file = %input.name))]
fn merge_file(
    input: &InputBlob,
    writer: &mut WorkbookWriter,
    opts: MergeOptions<'_>,
    merged: &mut Vec<MergedSheet>,
) -> FileOutcome {
    // 1) Open the workbook
    let book = match read_workbook(&input.name, &input.bytes, opts.copy_formatting) {
        Ok(b) => b,
        Err(e) => {
            error!("file could not be processed: {:#}", e);
            return FileOutcome::Failed {
                error: format!("{:#}", e),
            };
        }
    };
    if book.sheets.is_empty() {
        warn!("workbook has no sheets, skipping");
        return FileOutcome::Skipped {
            reason: "workbook has no sheets".into(),
        };
    }

    // 2) One output sheet per input sheet
    let base = base_name(&input.name);
    let single = book.sheets.len() == 1;
    let mut reports = Vec::with_capacity(book.sheets.len());
    for (sheet_name, grid) in &book.sheets {
        let candidate = if single {
            base.clone()
        } else {
            format!("{}_{}", base, sheet_name)
        };
        let outcome = match grid {
            Ok(sheet) => merge_sheet(&book, sheet, &candidate, writer, opts, merged),
            Err(e) => Err(anyhow::anyhow!("{:#}", e)),
        };
        let outcome = outcome.unwrap_or_else(|e| {
            error!(sheet = %sheet_name, "sheet could not be processed: {:#}", e);
            SheetOutcome::Failed {
                error: format!("{:#}", e),
            }
        });
        reports.push(SheetReport {
            sheet: sheet_name.clone(),
            outcome,
        });
    }
    FileOutcome::Processed { sheets: reports }
}

fn merge_sheet(
    book: &SourceWorkbook,
    sheet: &RawSheet,
    candidate: &str,
    writer: &mut WorkbookWriter,
    opts: MergeOptions<'_>,
    merged: &mut Vec<MergedSheet>,
) -> Result<SheetOutcome> {
    let (mut table, header) = match locate_header(sheet, opts.header_sentinels) {
        Located::Blank => {
            warn!(sheet = %sheet.sheet_name, "sheet is empty, skipping");
            return Ok(SheetOutcome::Skipped {
                reason: "sheet is empty".into(),
            });
        }
        Located::Table { table, header } => (table, header),
    };

    // 3) Excluded people leave both the merged sheet and the statistics
    let data_rows = table.height();
    let base = base_name(&book.file_name);
    let sanitized = sanitize_sheet_name(candidate);
    let dropped = apply_exclusions(
        &mut table,
        &[candidate, sanitized.as_str(), base.as_str(), sheet.sheet_name.as_str()],
        opts.exclusions,
    );

    // 4) Column rules shape the merged sheet only
    let keep = opts.column_rules.surviving_columns(&table);
    let output = table.select_columns(&keep);

    let formatting = opts.copy_formatting.then(|| CopiedFormatting {
        layout: book.layout(&sheet.sheet_name),
        source_rows: source_rows(header.row(), data_rows, &dropped),
        column_widths: keep.iter().map(|&c| column_width(sheet, c)).collect(),
        source_columns: keep,
    });

    let written_as = writer.write_table(candidate, &output, formatting.as_ref())?;
    info!(
        sheet = %sheet.sheet_name,
        written_as = %written_as,
        rows = output.height(),
        columns = output.width(),
        "sheet merged"
    );

    let outcome = SheetOutcome::Parsed {
        header,
        rows: output.height(),
        columns: output.width(),
        written_as: written_as.clone(),
    };
    merged.push(MergedSheet {
        file_name: book.file_name.clone(),
        source_sheet: sheet.sheet_name.clone(),
        written_as,
        header,
        excluded_rows: dropped.len(),
        table,
    });
    Ok(outcome)
}

/// Source row of every output row: the header, then the data rows that were kept.
fn source_rows(header_row: usize, data_rows: usize, dropped: &[usize]) -> Vec<usize> {
    std::iter::once(header_row)
        .chain(
            (0..data_rows)
                .filter(|r| dropped.binary_search(r).is_err())
                .map(|r| header_row + 1 + r),
        )
        .collect()
}

/// Longest stringified cell of source column `col`, plus 2.
fn column_width(sheet: &RawSheet, col: usize) -> f64 {
    let longest = sheet
        .cells
        .iter()
        .filter_map(|row| row.get(col))
        .map(|c| c.to_string().chars().count())
        .max()
        .unwrap_or(0);
    ((longest + 2) as f64).min(MAX_COLUMN_WIDTH)
}

// src/pipeline.rs
use anyhow::{bail, Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{info, warn};

use crate::{
    config::{RuleSet, RunOptions},
    ingest::{expand_inputs, InputBlob, RunWorkspace},
    period::ReferencePeriod,
    process::{
        merge::{merge_inputs, MergeOptions, MergedSheet},
        order::order_by_priority,
        report::{DerivationReport, RunReport},
        utils::base_name,
        writer::WorkbookWriter,
    },
    schema::{extract_records, normalize},
    stats::{aggregate_details, derive_sheet, SheetStats},
};

pub const OUTPUT_FILE_NAME: &str = "merged_excel.xlsx";
pub const OUTPUT_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Result of one run, before delivery.
#[derive(Debug)]
pub struct RunOutput {
    pub workbook: Vec<u8>,
    pub report: RunReport,
    pub sheets: Vec<SheetStats>,
}

/// Result of a run whose artifact was delivered to disk.
#[derive(Debug)]
pub struct Delivery {
    pub path: PathBuf,
    /// Scratch directory the run used; gone by the time this is returned.
    pub workspace: PathBuf,
    pub output: RunOutput,
}

/// Merge `inputs` and derive the monthly statistics, all in memory.
#[tracing::instrument(level = "info", skip_all, fields(inputs = inputs.len(), previous_month = %period.previous_month))]
pub fn run(
    inputs: Vec<InputBlob>,
    rules: &RuleSet,
    options: &RunOptions,
    period: &ReferencePeriod,
) -> Result<RunOutput> {
    if inputs.is_empty() {
        bail!("no input files given");
    }
    let mut report = RunReport::new(*period);

    // 1) Expand archives, then apply the sheet priority
    let (blobs, expand_reports) = expand_inputs(inputs);
    report.files.extend(expand_reports);
    let blobs = reorder_by_base_name(blobs, &rules.sheet_priority);

    // 2) Merge
    let mut writer = WorkbookWriter::new();
    let merged = merge_inputs(
        &blobs,
        &mut writer,
        MergeOptions {
            header_sentinels: &rules.header_sentinels,
            column_rules: &options.column_rules,
            exclusions: &rules.exclusions,
            copy_formatting: options.copy_formatting,
        },
    );
    report.files.extend(merged.files);
    if writer.is_empty() {
        bail!(
            "no sheet could be written ({} file(s) failed, {} sheet(s) failed)",
            report.failed_files(),
            report.failed_sheets()
        );
    }

    // 3) Derive per sheet
    let mut sheets = Vec::with_capacity(merged.sheets.len());
    for m in &merged.sheets {
        let (stats, derivation) = derive_merged(m, rules, options, period);
        report.derivations.push(derivation);
        sheets.push(stats);
    }

    // 4) Workbook-wide detail sheets
    if options.detail_sheets {
        let names = &rules.detail_sheets;
        let hires = aggregate_details(
            sheets
                .iter()
                .filter_map(|s| s.hires.as_ref().map(|t| (s.sheet.as_str(), t))),
            &names.origin_column,
        );
        let departures = aggregate_details(
            sheets
                .iter()
                .filter_map(|s| s.departures.as_ref().map(|t| (s.sheet.as_str(), t))),
            &names.origin_column,
        );
        for (name, table) in [(&names.hires, hires), (&names.departures, departures)] {
            if let Some(table) = table {
                writer
                    .write_table(name, &table, None)
                    .with_context(|| format!("writing detail sheet {}", name))?;
            }
        }
    }

    report.written_sheets = writer.sheet_names().to_vec();
    let workbook = writer.finish()?;

    for (file, sheet) in report.header_fallbacks() {
        warn!(file, sheet, "header located by fallback; check the merged sheet");
    }
    info!(
        sheets = report.written_sheets.len(),
        failed_files = report.failed_files(),
        failed_sheets = report.failed_sheets(),
        size = workbook.len(),
        "run complete"
    );

    Ok(RunOutput {
        workbook,
        report,
        sheets,
    })
}

/// Stage `inputs` in a fresh workspace, run, and deliver the workbook to `dest_dir`.
///
/// The workspace is removed before this returns, whatever the outcome.
pub fn run_and_deliver(
    inputs: Vec<InputBlob>,
    rules: &RuleSet,
    options: &RunOptions,
    period: &ReferencePeriod,
    dest_dir: &Path,
) -> Result<Delivery> {
    run_in_workspace(RunWorkspace::new()?, inputs, rules, options, period, dest_dir)
}

/// Takes the workspace by value so it is dropped on every return path.
fn run_in_workspace(
    mut workspace: RunWorkspace,
    inputs: Vec<InputBlob>,
    rules: &RuleSet,
    options: &RunOptions,
    period: &ReferencePeriod,
    dest_dir: &Path,
) -> Result<Delivery> {
    let workspace_path = workspace.path().to_path_buf();

    // inputs are processed from their staged copies
    let mut staged = Vec::with_capacity(inputs.len());
    for blob in inputs {
        let path = workspace.stage(&blob)?;
        let bytes = fs::read(&path).with_context(|| format!("reading staged {:?}", path))?;
        staged.push(InputBlob::new(blob.name, bytes));
    }

    let output = run(staged, rules, options, period)?;
    let path = workspace.deliver(&output.workbook, dest_dir, OUTPUT_FILE_NAME)?;
    drop(workspace);

    Ok(Delivery {
        path,
        workspace: workspace_path,
        output,
    })
}

/// Priority is keyed on the file base name (without extension).
fn reorder_by_base_name(blobs: Vec<InputBlob>, priority: &[String]) -> Vec<InputBlob> {
    let keyed: Vec<(String, InputBlob)> = blobs.into_iter().map(|b| (base_name(&b.name), b)).collect();
    order_by_priority(keyed, priority, |(base, _)| base.as_str())
        .into_iter()
        .map(|(_, b)| b)
        .collect()
}

fn derive_merged(
    m: &MergedSheet,
    rules: &RuleSet,
    options: &RunOptions,
    period: &ReferencePeriod,
) -> (SheetStats, DerivationReport) {
    let (table, norm) = normalize(&m.table, rules, options.labels, period);
    let records = extract_records(&table, rules);
    let stats = derive_sheet(&m.written_as, &table, &records, rules, options.labels, period);

    let derivation = DerivationReport {
        sheet: m.written_as.clone(),
        stats: stats.stats.clone(),
        excluded_rows: m.excluded_rows,
        synthesized_columns: norm.synthesized_columns,
        ambiguous_rows: norm.ambiguous_rows,
        hire_details: stats.hires.as_ref().map(|t| t.height()),
        departure_details: stats.departures.as_ref().map(|t| t.height()),
    };
    (stats, derivation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        process::{
            raw_table::CellValue,
            reader::read_workbook,
            report::{FileOutcome, SheetOutcome},
        },
        schema::{rules::Exclusion, CategoryLabelSet},
    };
    use chrono::NaiveDate;
    use rust_xlsxwriter::Workbook;
    use std::io::{Cursor, Write};
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    use zip::{write::FileOptions, CompressionMethod};

    fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,headcount=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    fn period() -> ReferencePeriod {
        // previous month 2024-05
        ReferencePeriod::from_date(NaiveDate::from_ymd_opt(2024, 6, 12).unwrap())
    }

    /// One sheet: a title row, a blank row, then a `No` header and `rows`.
    fn book(header: &[&str], rows: &[Vec<&str>]) -> Result<Vec<u8>> {
        let mut wb = Workbook::new();
        let ws = wb.add_worksheet();
        ws.write_string(0, 0, "인원 현황")?;
        for (c, h) in header.iter().enumerate() {
            ws.write_string(2, c as u16, *h)?;
        }
        for (r, row) in rows.iter().enumerate() {
            for (c, v) in row.iter().enumerate() {
                ws.write_string(3 + r as u32, c as u16, *v)?;
            }
        }
        Ok(wb.save_to_buffer()?)
    }

    fn zip_of(entries: &[(&str, &[u8])]) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            let options: FileOptions<'_, ()> =
                FileOptions::default().compression_method(CompressionMethod::Stored);
            for (name, data) in entries {
                zip.start_file(*name, options)?;
                zip.write_all(data)?;
            }
            zip.finish()?;
        }
        Ok(buf)
    }

    fn sheet_names(bytes: &[u8]) -> Result<Vec<String>> {
        Ok(read_workbook(OUTPUT_FILE_NAME, bytes, false)?
            .sheets
            .into_iter()
            .map(|(n, _)| n)
            .collect())
    }

    #[test]
    fn contract_hire_last_month_is_counted() -> Result<()> {
        init_test_logging();
        let bytes = book(
            &["No", "부서명", "성명", "직급명", "입사일", "Contract Type"],
            &[vec!["1", "영업", "김민수", "사원", "2024-05-03", "FDC"]],
        )?;
        let out = run(
            vec![InputBlob::new("본사.xlsx", bytes)],
            &RuleSet::default(),
            &RunOptions::default(),
            &period(),
        )?;

        let s = &out.sheets[0].stats;
        assert_eq!(s.new_hires, 1);
        let b = s.new_hires_by_category;
        assert_eq!((b.contract, b.regular, b.dispatched, b.executive), (1, 0, 0, 0));
        assert_eq!(s.active_or_departed_this_month, 1);
        assert_eq!(s.departures, 0);

        assert_eq!(sheet_names(&out.workbook)?, vec!["본사", "입사자 명단"]);
        let detail = &out.report.derivations[0];
        assert_eq!(detail.hire_details, Some(1));
        assert_eq!(detail.synthesized_columns, vec!["퇴사일", "사원구분명"]);
        Ok(())
    }

    #[test]
    fn remark_marks_departure_without_separation_column() -> Result<()> {
        init_test_logging();
        let bytes = book(
            &["No", "부서명", "성명", "직급명", "Starting Date", "Remark"],
            &[
                vec!["1", "물류", "이영희", "대리", "2019-03-01", "Resigned and last working day is 2024-04-30"],
                vec!["2", "물류", "박철수", "과장", "2018-07-01", ""],
            ],
        )?;
        let out = run(
            vec![InputBlob::new("물류.xlsx", bytes)],
            &RuleSet::default(),
            &RunOptions::default(),
            &period(),
        )?;
        let s = &out.sheets[0].stats;
        assert_eq!(s.departures, 1);
        assert_eq!(s.active_or_departed_this_month, 1);
        assert_eq!(s.departures_by_category.uncategorized, 1);
        assert_eq!(sheet_names(&out.workbook)?, vec!["물류", "퇴사자 명단"]);

        let book = read_workbook(OUTPUT_FILE_NAME, &out.workbook, false)?;
        let (_, departures) = &book.sheets[1];
        let departures = departures.as_ref().map_err(|e| anyhow::anyhow!("{:#}", e))?;
        assert_eq!(departures.cells[0][0], CellValue::from("시트명"));
        assert_eq!(departures.cells[1][0], CellValue::from("물류"));
        assert_eq!(departures.cells[1][2], CellValue::from("이영희"));
        let last_day = NaiveDate::from_ymd_opt(2024, 5, 31).and_then(|d| d.and_hms_opt(0, 0, 0));
        assert_eq!(departures.cells[1][5], last_day.map(CellValue::Date).unwrap_or_default());
        Ok(())
    }

    #[test]
    fn single_sheet_round_trip_without_rules() -> Result<()> {
        let header = ["No", "성명", "입사일"];
        let rows = vec![vec!["1", "김민수", "재직"], vec!["2", "이영희", "휴직"]];
        let bytes = book(&header, &rows)?;
        let options = RunOptions {
            detail_sheets: false,
            ..RunOptions::default()
        };
        let out = run(vec![InputBlob::new("본사.xlsx", bytes)], &RuleSet::default(), &options, &period())?;

        let book = read_workbook(OUTPUT_FILE_NAME, &out.workbook, false)?;
        assert_eq!(book.sheets.len(), 1);
        let (name, sheet) = &book.sheets[0];
        assert_eq!(name, "본사");
        let sheet = sheet.as_ref().map_err(|e| anyhow::anyhow!("{:#}", e))?;
        let expected: Vec<Vec<CellValue>> = std::iter::once(header.to_vec())
            .chain(rows.iter().cloned())
            .map(|r| r.into_iter().map(CellValue::from).collect())
            .collect();
        assert_eq!(sheet.cells, expected);
        Ok(())
    }

    #[test]
    fn archive_expands_and_corrupt_entry_fails_alone() -> Result<()> {
        init_test_logging();
        let a = book(&["No", "성명"], &[vec!["1", "김"]])?;
        let b = book(&["No", "성명"], &[vec!["1", "이"]])?;
        let archive = zip_of(&[
            ("exports/본사.xlsx", &a),
            ("exports/깨진파일.xlsx", b"not a workbook"),
            ("exports/물류.xlsx", &b),
            ("exports/readme.txt", b"hi"),
        ])?;
        let out = run(
            vec![InputBlob::new("upload.zip", archive)],
            &RuleSet::default(),
            &RunOptions::default(),
            &period(),
        )?;

        assert_eq!(sheet_names(&out.workbook)?, vec!["본사", "물류"]);
        let failed: Vec<&str> = out
            .report
            .files
            .iter()
            .filter(|f| matches!(f.outcome, FileOutcome::Failed { .. }))
            .map(|f| f.file.as_str())
            .collect();
        assert_eq!(failed, vec!["깨진파일.xlsx"]);
        Ok(())
    }

    #[test]
    fn priority_orders_sheets_and_unknowns_follow() -> Result<()> {
        let mk = || book(&["No", "성명"], &[vec!["1", "김"]]);
        let rules = RuleSet {
            sheet_priority: vec!["본사".into(), "도이치오토월드".into()],
            ..RuleSet::default()
        };
        let out = run(
            vec![
                InputBlob::new("기타.xlsx", mk()?),
                InputBlob::new("도이치오토월드.xlsx", mk()?),
                InputBlob::new("가나.xlsx", mk()?),
                InputBlob::new("본사.xlsx", mk()?),
            ],
            &rules,
            &RunOptions {
                detail_sheets: false,
                ..RunOptions::default()
            },
            &period(),
        )?;
        assert_eq!(out.report.written_sheets, vec!["본사", "도이치오토월드", "기타", "가나"]);
        Ok(())
    }

    #[test]
    fn exclusions_and_english_labels_apply_to_derivation() -> Result<()> {
        let bytes = book(
            &["No", "부서명", "성명", "직급명", "입사일", "Contract Type"],
            &[
                vec!["1", "영업", "홍길동", "사원", "2024-05-03", "UDC"],
                vec!["2", "영업", "김민수", "사원", "2024-05-20", "UDC"],
            ],
        )?;
        let rules = RuleSet {
            exclusions: vec![Exclusion {
                sheet: "도이치오토월드".into(),
                column: "성명".into(),
                value: "홍길동".into(),
            }],
            ..RuleSet::default()
        };
        let options = RunOptions {
            labels: CategoryLabelSet::English,
            ..RunOptions::default()
        };
        let out = run(vec![InputBlob::new("도이치오토월드.xlsx", bytes)], &rules, &options, &period())?;
        let merged = read_workbook(OUTPUT_FILE_NAME, &out.workbook, false)?;
        let (_, sheet) = &merged.sheets[0];
        let sheet = sheet.as_ref().map_err(|e| anyhow::anyhow!("{:#}", e))?;
        let names: Vec<String> = sheet.cells.iter().map(|row| row[2].to_string()).collect();
        assert_eq!(names, vec!["성명", "김민수"]);

        assert_eq!(out.sheets[0].stats.new_hires, 1);
        assert_eq!(out.sheets[0].stats.new_hires_by_category.regular, 1);
        assert_eq!(out.report.derivations[0].excluded_rows, 1);
        let hires = out.sheets[0].hires.as_ref().expect("hire details");
        assert_eq!(hires.rows[0][3], CellValue::from("Regular"));
        Ok(())
    }

    #[test]
    fn whitespace_only_sheet_is_merged_not_skipped() -> Result<()> {
        let mut wb = Workbook::new();
        wb.add_worksheet().write_string(0, 0, " ")?;
        let out = run(
            vec![InputBlob::new("공백.xlsx", wb.save_to_buffer()?)],
            &RuleSet::default(),
            &RunOptions::default(),
            &period(),
        )?;
        assert_eq!(out.report.written_sheets, vec!["공백"]);
        Ok(())
    }

    #[test]
    fn header_fallback_is_reported() -> Result<()> {
        let mut wb = Workbook::new();
        let ws = wb.add_worksheet();
        ws.write_string(0, 0, "성명")?;
        ws.write_string(1, 0, "김민수")?;
        let out = run(
            vec![InputBlob::new("plain.xlsx", wb.save_to_buffer()?)],
            &RuleSet::default(),
            &RunOptions::default(),
            &period(),
        )?;
        assert_eq!(out.report.header_fallbacks(), vec![("plain.xlsx", "Sheet1")]);
        let FileOutcome::Processed { sheets } = &out.report.files[0].outcome else {
            panic!("expected processed file");
        };
        assert!(matches!(sheets[0].outcome, SheetOutcome::Parsed { rows: 1, .. }));
        Ok(())
    }

    #[test]
    fn structural_failures_are_errors() {
        assert!(run(vec![], &RuleSet::default(), &RunOptions::default(), &period()).is_err());
        let err = run(
            vec![InputBlob::new("broken.xlsx", b"nope".to_vec())],
            &RuleSet::default(),
            &RunOptions::default(),
            &period(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("no sheet could be written"));
    }

    #[test]
    fn workspace_is_gone_after_success_and_failure() -> Result<()> {
        let dest = tempfile::tempdir()?;
        let bytes = book(&["No", "성명"], &[vec!["1", "김"]])?;
        let delivery = run_and_deliver(
            vec![InputBlob::new("본사.xlsx", bytes)],
            &RuleSet::default(),
            &RunOptions::default(),
            &period(),
            dest.path(),
        )?;
        assert_eq!(delivery.path, dest.path().join(OUTPUT_FILE_NAME));
        assert_eq!(fs::read(&delivery.path)?, delivery.output.workbook);
        assert!(!delivery.workspace.exists());

        let workspace = RunWorkspace::new()?;
        let path = workspace.path().to_path_buf();
        let failed = run_in_workspace(
            workspace,
            vec![InputBlob::new("broken.xlsx", b"nope".to_vec())],
            &RuleSet::default(),
            &RunOptions::default(),
            &period(),
            dest.path(),
        );
        assert!(failed.is_err());
        assert!(!path.exists());
        Ok(())
    }
}

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use headcount::{
    config::{RuleSet, RunOptions},
    ingest::InputBlob,
    period::ReferencePeriod,
    pipeline::{run_and_deliver, OUTPUT_MIME},
    schema::{CategoryLabelSet, ColumnRules},
    stats::render::render_sheet,
};
use std::{fs, path::PathBuf};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

/// Merge HR spreadsheets into one workbook and report last month's personnel figures.
#[derive(Debug, Parser)]
#[command(name = "headcount", version)]
struct Cli {
    /// Spreadsheets or zip archives; glob patterns are expanded.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Directory the merged workbook is written to.
    #[arg(long, default_value = ".")]
    out: PathBuf,

    /// YAML rule file; built-in defaults otherwise.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Comma-separated keywords; columns containing any are dropped.
    #[arg(long, default_value = "연봉")]
    delete_keywords: String,

    /// Comma-separated column labels to keep (empty keeps all).
    #[arg(long, default_value = "")]
    include_columns: String,

    /// Copy column widths, row heights and number formats from the sources.
    #[arg(long)]
    copy_formatting: bool,

    /// Do not add the workbook-wide new-hire/departure sheets.
    #[arg(long)]
    no_detail_sheets: bool,

    /// Reference date (YYYY-MM-DD); today by default.
    #[arg(long, value_parser = parse_as_of)]
    as_of: Option<NaiveDate>,

    /// Write the run report as JSON to this path.
    #[arg(long)]
    report_json: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = CategoryLabelSet::Korean)]
    category_labels: CategoryLabelSet,
}

fn parse_as_of(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {}", e))
}

fn main() {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run_cli(cli) {
        error!("run failed: {:#}", e);
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run_cli(cli: Cli) -> Result<()> {
    // ─── 2) rules & options ──────────────────────────────────────────
    let rules = match &cli.config {
        Some(path) => RuleSet::load(path)?,
        None => RuleSet::default(),
    };
    let options = RunOptions {
        copy_formatting: cli.copy_formatting,
        detail_sheets: !cli.no_detail_sheets,
        labels: cli.category_labels,
        column_rules: ColumnRules::from_lists(&cli.include_columns, &cli.delete_keywords),
    };
    let period = cli
        .as_of
        .map(ReferencePeriod::from_date)
        .unwrap_or_else(ReferencePeriod::today);
    info!(
        current = %period.current_month,
        previous = %period.previous_month,
        "reference period"
    );

    // ─── 3) read inputs ──────────────────────────────────────────────
    let paths = expand_globs(&cli.inputs)?;
    let inputs = paths
        .iter()
        .map(InputBlob::read)
        .collect::<Result<Vec<_>>>()?;
    info!("{} input file(s)", inputs.len());

    // ─── 4) run & deliver ────────────────────────────────────────────
    let delivery = run_and_deliver(inputs, &rules, &options, &period, &cli.out)?;

    // ─── 5) render ───────────────────────────────────────────────────
    for stats in &delivery.output.sheets {
        for row in render_sheet(stats, options.labels, &period) {
            println!("{}", row);
        }
        println!("---");
    }
    println!("{} ({})", delivery.path.display(), OUTPUT_MIME);

    if let Some(path) = &cli.report_json {
        let json = delivery.output.report.to_json()?;
        fs::write(path, json + "\n").with_context(|| format!("writing report {:?}", path))?;
        info!(path = %path.display(), "run report written");
    }
    Ok(())
}

/// Expand each argument as a glob; literal paths that match nothing are kept as-is.
fn expand_globs(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for pattern in patterns {
        let mut matched = false;
        for entry in glob::glob(pattern).with_context(|| format!("bad glob pattern {}", pattern))? {
            let path = entry.with_context(|| format!("expanding {}", pattern))?;
            if path.is_file() {
                out.push(path);
                matched = true;
            }
        }
        if !matched {
            let literal = PathBuf::from(pattern);
            if !literal.is_file() {
                bail!("no input matches {}", pattern);
            }
            out.push(literal);
        }
    }
    Ok(out)
}

// src/process/report.rs
use serde::Serialize;

use crate::{
    period::ReferencePeriod,
    process::header::HeaderSource,
    schema::normalize::AmbiguousRow,
    stats::MonthlyStats,
};

/// What happened to one sheet of one input file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SheetOutcome {
    Parsed {
        header: HeaderSource,
        rows: usize,
        columns: usize,
        written_as: String,
    },
    Skipped {
        reason: String,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetReport {
    pub sheet: String,
    #[serde(flatten)]
    pub outcome: SheetOutcome,
}

/// What happened to one input file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Processed { sheets: Vec<SheetReport> },
    Skipped { reason: String },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReport {
    pub file: String,
    #[serde(flatten)]
    pub outcome: FileOutcome,
}

/// Derivation results for one written sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivationReport {
    pub sheet: String,
    pub stats: MonthlyStats,
    pub excluded_rows: usize,
    pub synthesized_columns: Vec<String>,
    pub ambiguous_rows: Vec<AmbiguousRow>,
    /// Detail row counts; `None` when extraction was skipped for missing columns.
    pub hire_details: Option<usize>,
    pub departure_details: Option<usize>,
}

/// Everything a run did, serializable as the JSON run report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub period: ReferencePeriod,
    pub files: Vec<FileReport>,
    pub derivations: Vec<DerivationReport>,
    /// Output sheet names in workbook order.
    pub written_sheets: Vec<String>,
}

impl RunReport {
    pub fn new(period: ReferencePeriod) -> Self {
        Self {
            period,
            files: Vec::new(),
            derivations: Vec::new(),
            written_sheets: Vec::new(),
        }
    }

    /// Every (file, sheet) whose header was not found by sentinel.
    pub fn header_fallbacks(&self) -> Vec<(&str, &str)> {
        self.sheets()
            .filter(|(_, s)| {
                matches!(
                    s.outcome,
                    SheetOutcome::Parsed {
                        header: HeaderSource::Fallback,
                        ..
                    }
                )
            })
            .map(|(f, s)| (f, s.sheet.as_str()))
            .collect()
    }

    pub fn failed_files(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.outcome, FileOutcome::Failed { .. }))
            .count()
    }

    pub fn failed_sheets(&self) -> usize {
        self.sheets()
            .filter(|(_, s)| matches!(s.outcome, SheetOutcome::Failed { .. }))
            .count()
    }

    fn sheets(&self) -> impl Iterator<Item = (&str, &SheetReport)> {
        self.files.iter().flat_map(|f| {
            let sheets: &[SheetReport] = match &f.outcome {
                FileOutcome::Processed { sheets } => sheets,
                _ => &[],
            };
            sheets.iter().map(move |s| (f.file.as_str(), s))
        })
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// src/ingest/mod.rs
pub mod archive;
pub mod workspace;

use anyhow::{Context, Result};
use std::{fs, path::Path};
use tracing::{error, warn};

use crate::process::{
    report::{FileOutcome, FileReport},
    utils::extension,
};

pub use archive::expand_zip;
pub use workspace::RunWorkspace;

/// Extensions read as workbooks.
pub const SPREADSHEET_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xls", "xlsb", "ods"];

/// A named input payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputBlob {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl InputBlob {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read a file from disk, named after its file name.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("reading input {:?}", path))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, bytes))
    }
}

pub fn is_spreadsheet(name: &str) -> bool {
    extension(name).is_some_and(|e| SPREADSHEET_EXTENSIONS.contains(&e.as_str()))
}

pub fn is_archive(name: &str) -> bool {
    extension(name).as_deref() == Some("zip")
}

/// Replace archives by their spreadsheet entries.
///
/// Corrupt archives and unsupported files do not stop the run; they come back
/// as file reports.
pub fn expand_inputs(inputs: Vec<InputBlob>) -> (Vec<InputBlob>, Vec<FileReport>) {
    let mut blobs = Vec::new();
    let mut reports = Vec::new();
    for input in inputs {
        if is_archive(&input.name) {
            match expand_zip(&input.name, &input.bytes) {
                Ok(entries) if entries.is_empty() => {
                    warn!(file = %input.name, "archive holds no spreadsheets");
                    reports.push(FileReport {
                        file: input.name,
                        outcome: FileOutcome::Skipped {
                            reason: "archive holds no spreadsheets".into(),
                        },
                    });
                }
                Ok(entries) => blobs.extend(entries),
                Err(e) => {
                    error!(file = %input.name, "archive could not be expanded: {:#}", e);
                    reports.push(FileReport {
                        file: input.name,
                        outcome: FileOutcome::Failed {
                            error: format!("{:#}", e),
                        },
                    });
                }
            }
        } else if is_spreadsheet(&input.name) {
            blobs.push(input);
        } else {
            warn!(file = %input.name, "unsupported input type");
            reports.push(FileReport {
                file: input.name,
                outcome: FileOutcome::Skipped {
                    reason: "not a spreadsheet or zip archive".into(),
                },
            });
        }
    }
    (blobs, reports)
}

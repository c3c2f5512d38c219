// src/ingest/archive.rs
use anyhow::{Context, Result};
use std::io::{Cursor, Read};
use tracing::debug;
use zip::ZipArchive;

use super::{is_spreadsheet, InputBlob};

/// Upper bound on the buffer reserved from an entry's declared size.
const MAX_PREALLOC: u64 = 64 << 20;

/// Expand spreadsheet entries of a zip archive, one level deep.
///
/// Nested archives and other non-spreadsheet entries are skipped, `__MACOSX/`
/// metadata is ignored, and directory prefixes are dropped from entry names.
#[tracing::instrument(level = "debug", skip(bytes), fields(size = bytes.len()))]
pub fn expand_zip(archive_name: &str, bytes: &[u8]) -> Result<Vec<InputBlob>> {
    // 1) Open the archive from memory
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .with_context(|| format!("reading zip archive {}", archive_name))?;

    // 2) Buffer every spreadsheet entry, in archive order
    let mut out = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("accessing entry #{} of {}", i, archive_name))?;
        let full_name = entry.name().to_string();

        if !entry.is_file() || full_name.starts_with("__MACOSX/") {
            continue;
        }
        let name = full_name.rsplit('/').next().unwrap_or(&full_name).to_string();
        // office lock files (~$book.xlsx) are not workbooks
        if name.starts_with("~$") || name.starts_with("._") {
            debug!(entry = %full_name, "skipping metadata entry");
            continue;
        }
        if !is_spreadsheet(&name) {
            debug!(entry = %full_name, "skipping non-spreadsheet entry");
            continue;
        }

        let mut buf = Vec::with_capacity(initial_capacity(entry.size()));
        entry
            .read_to_end(&mut buf)
            .with_context(|| format!("reading {} from {}", full_name, archive_name))?;
        out.push(InputBlob::new(name, buf));
    }

    debug!(archive = %archive_name, entries = out.len(), "archive expanded");
    Ok(out)
}

/// The declared size comes from the archive itself and is only a hint.
fn initial_capacity(declared: u64) -> usize {
    usize::try_from(declared.min(MAX_PREALLOC)).unwrap_or(0)
}

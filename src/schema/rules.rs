// src/schema/rules.rs

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::process::{raw_table::HeaderedTable, utils::split_list};

/// Drop rows of sheet `sheet` whose `column` text equals `value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exclusion {
    pub sheet: String,
    pub column: String,
    pub value: String,
}

impl Exclusion {
    /// `names` are every name the sheet is known by (output name, file base name, source sheet name).
    fn applies_to(&self, names: &[&str]) -> bool {
        names.iter().any(|n| *n == self.sheet)
    }
}

/// Data-row indices of `table` that name an excluded person, ascending.
///
/// Columns are matched on the trimmed label, so raw source headers work too.
pub fn excluded_rows(table: &HeaderedTable, names: &[&str], exclusions: &[Exclusion]) -> Vec<usize> {
    let targets: Vec<(usize, &str)> = exclusions
        .iter()
        .filter(|e| e.applies_to(names))
        .filter_map(|e| {
            let column = e.column.trim();
            table
                .columns
                .iter()
                .position(|c| c.trim() == column)
                .map(|idx| (idx, e.value.trim()))
        })
        .collect();
    if targets.is_empty() {
        return Vec::new();
    }

    table
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| {
            targets.iter().any(|(idx, value)| {
                row[*idx]
                    .as_text()
                    .is_some_and(|t| t.trim() == *value)
            })
        })
        .map(|(r, _)| r)
        .collect()
}

/// Remove excluded people from `table`. Returns the indices of the dropped rows.
pub fn apply_exclusions(table: &mut HeaderedTable, names: &[&str], exclusions: &[Exclusion]) -> Vec<usize> {
    let dropped = excluded_rows(table, names, exclusions);
    if dropped.is_empty() {
        return dropped;
    }

    let mut r = 0;
    table.retain_rows(|_| {
        let keep = dropped.binary_search(&r).is_err();
        r += 1;
        keep
    });
    info!(
        sheet = names.first().copied().unwrap_or_default(),
        removed = dropped.len(),
        "excluded rows"
    );
    dropped
}

/// Column allow-list then keyword deny-list, applied to merged output sheets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnRules {
    /// Keep only these labels when non-empty.
    pub include: Vec<String>,
    /// Drop labels containing any of these.
    pub delete_keywords: Vec<String>,
}

impl ColumnRules {
    /// Build from free-text comma-separated inputs.
    pub fn from_lists(include: &str, delete_keywords: &str) -> Self {
        Self {
            include: split_list(include),
            delete_keywords: split_list(delete_keywords),
        }
    }

    /// Indices of the columns of `table` that survive, in table order.
    pub fn surviving_columns(&self, table: &HeaderedTable) -> Vec<usize> {
        table
            .columns
            .iter()
            .enumerate()
            .filter(|(_, label)| {
                let label = label.trim();
                self.include.is_empty() || self.include.iter().any(|i| i == label)
            })
            .filter(|(_, label)| !self.delete_keywords.iter().any(|k| label.contains(k.as_str())))
            .map(|(idx, _)| idx)
            .collect()
    }
}

// src/stats/mod.rs
pub mod render;

use serde::Serialize;

use crate::{
    config::RuleSet,
    period::ReferencePeriod,
    process::raw_table::{CellValue, HeaderedTable},
    schema::types::{CanonicalRecord, CategoryLabelSet, EmployeeCategory},
};

/// Counts per category plus everything that maps to no category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryBreakdown {
    pub regular: usize,
    pub contract: usize,
    pub dispatched: usize,
    pub executive: usize,
    pub uncategorized: usize,
}

impl CategoryBreakdown {
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a CanonicalRecord>,
    {
        let mut b = Self::default();
        for rec in records {
            match rec.employee_category {
                Some(EmployeeCategory::Regular) => b.regular += 1,
                Some(EmployeeCategory::Contract) => b.contract += 1,
                Some(EmployeeCategory::Dispatched) => b.dispatched += 1,
                Some(EmployeeCategory::Executive) => b.executive += 1,
                None => b.uncategorized += 1,
            }
        }
        b
    }

    pub fn get(&self, category: EmployeeCategory) -> usize {
        match category {
            EmployeeCategory::Regular => self.regular,
            EmployeeCategory::Contract => self.contract,
            EmployeeCategory::Dispatched => self.dispatched,
            EmployeeCategory::Executive => self.executive,
        }
    }

    pub fn total(&self) -> usize {
        self.regular + self.contract + self.dispatched + self.executive + self.uncategorized
    }
}

/// Monthly figures for one sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonthlyStats {
    pub new_hires: usize,
    pub departures: usize,
    pub active_or_departed_this_month: usize,
    pub new_hires_by_category: CategoryBreakdown,
    pub departures_by_category: CategoryBreakdown,
    pub active_by_category: CategoryBreakdown,
}

/// Statistics plus the per-person extracts of one sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetStats {
    pub sheet: String,
    pub stats: MonthlyStats,
    /// `None` when the sheet lacks the descriptive columns.
    pub hires: Option<HeaderedTable>,
    pub departures: Option<HeaderedTable>,
}

/// Compute the monthly figures over `records`.
pub fn monthly_stats(records: &[CanonicalRecord], period: &ReferencePeriod) -> MonthlyStats {
    let hired_prev = |r: &&CanonicalRecord| r.hire_date.is_some_and(|d| period.previous_month.contains(d));
    let left_prev = |r: &&CanonicalRecord| {
        r.separation_date
            .is_some_and(|d| period.previous_month.contains(d))
    };
    let active = |r: &&CanonicalRecord| match r.separation_date {
        None => true,
        Some(d) => period.current_month.contains(d),
    };

    let hires: Vec<&CanonicalRecord> = records.iter().filter(hired_prev).collect();
    let leavers: Vec<&CanonicalRecord> = records.iter().filter(left_prev).collect();
    let actives: Vec<&CanonicalRecord> = records.iter().filter(active).collect();

    MonthlyStats {
        new_hires: hires.len(),
        departures: leavers.len(),
        active_or_departed_this_month: actives.len(),
        new_hires_by_category: CategoryBreakdown::from_records(hires),
        departures_by_category: CategoryBreakdown::from_records(leavers),
        active_by_category: CategoryBreakdown::from_records(actives),
    }
}

/// Which event a detail table lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailKind {
    Hires,
    Departures,
}

/// Per-person extract for `kind`, or `None` when `table` lacks name, department or title.
pub fn detail_table(
    kind: DetailKind,
    table: &HeaderedTable,
    records: &[CanonicalRecord],
    rules: &RuleSet,
    labels: CategoryLabelSet,
    period: &ReferencePeriod,
) -> Option<HeaderedTable> {
    let cols = &rules.columns;
    if ![&cols.name, &cols.department, &cols.title]
        .into_iter()
        .all(|c| table.has_column(c))
    {
        return None;
    }

    let date_label = match kind {
        DetailKind::Hires => &cols.hire_date,
        DetailKind::Departures => &cols.separation_date,
    };
    let header = vec![
        cols.department.clone(),
        cols.name.clone(),
        cols.title.clone(),
        cols.category.clone(),
        date_label.clone(),
    ];

    let text = |v: &Option<String>| v.as_deref().map_or(CellValue::Empty, CellValue::from);
    let rows = records
        .iter()
        .filter_map(|r| {
            let date = match kind {
                DetailKind::Hires => r.hire_date,
                DetailKind::Departures => r.separation_date,
            }?;
            if !period.previous_month.contains(date) {
                return None;
            }
            let category = match (r.employee_category, &r.category_label) {
                (Some(c), _) => CellValue::from(c.label(labels)),
                (None, raw) => text(raw),
            };
            Some(vec![
                text(&r.department),
                text(&r.employee_name),
                text(&r.title),
                category,
                date.and_hms_opt(0, 0, 0).map_or(CellValue::Empty, CellValue::Date),
            ])
        })
        .collect();

    Some(HeaderedTable::new(header, rows))
}

/// Everything derivable from one normalized sheet.
pub fn derive_sheet(
    sheet: &str,
    table: &HeaderedTable,
    records: &[CanonicalRecord],
    rules: &RuleSet,
    labels: CategoryLabelSet,
    period: &ReferencePeriod,
) -> SheetStats {
    SheetStats {
        sheet: sheet.to_string(),
        stats: monthly_stats(records, period),
        hires: detail_table(DetailKind::Hires, table, records, rules, labels, period),
        departures: detail_table(DetailKind::Departures, table, records, rules, labels, period),
    }
}

/// Concatenate per-sheet detail tables, prefixing each row with its origin sheet.
///
/// `None` when no sheet contributed a single row.
pub fn aggregate_details<'a, I>(parts: I, origin_column: &str) -> Option<HeaderedTable>
where
    I: IntoIterator<Item = (&'a str, &'a HeaderedTable)>,
{
    let mut columns: Option<Vec<String>> = None;
    let mut rows = Vec::new();
    for (sheet, table) in parts {
        if columns.is_none() {
            let mut c = vec![origin_column.to_string()];
            c.extend(table.columns.iter().cloned());
            columns = Some(c);
        }
        for row in &table.rows {
            let mut out = Vec::with_capacity(row.len() + 1);
            out.push(CellValue::from(sheet));
            out.extend(row.iter().cloned());
            rows.push(out);
        }
    }
    if rows.is_empty() {
        return None;
    }
    columns.map(|c| HeaderedTable::new(c, rows))
}

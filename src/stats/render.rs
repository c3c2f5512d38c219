// src/stats/render.rs
use serde::Serialize;
use std::fmt;

use crate::{
    period::ReferencePeriod,
    process::raw_table::HeaderedTable,
    schema::types::{CategoryLabelSet, EmployeeCategory},
    stats::{CategoryBreakdown, SheetStats},
};

/// One labeled line of output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultRow {
    pub label: String,
    pub value: String,
}

impl ResultRow {
    fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for ResultRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value.is_empty() {
            f.write_str(&self.label)
        } else {
            write!(f, "{}: {}", self.label, self.value)
        }
    }
}

struct Words {
    sheet: &'static str,
    headcount: &'static str,
    new_hires: &'static str,
    departures: &'static str,
    uncategorized: &'static str,
    hires_detail: &'static str,
    departures_detail: &'static str,
    people: fn(usize) -> String,
}

fn words(set: CategoryLabelSet) -> Words {
    match set {
        CategoryLabelSet::Korean => Words {
            sheet: "시트 이름",
            headcount: "1. 인원 수",
            new_hires: "2. 전월 입사자 수",
            departures: "3. 전월 퇴사자 수",
            uncategorized: "미분류",
            hires_detail: "입사자 상세 내역",
            departures_detail: "퇴사자 상세 내역",
            people: |n| format!("{}명", n),
        },
        CategoryLabelSet::English => Words {
            sheet: "Sheet",
            headcount: "1. Headcount",
            new_hires: "2. New hires last month",
            departures: "3. Departures last month",
            uncategorized: "Uncategorized",
            hires_detail: "new hire details",
            departures_detail: "departure details",
            people: |n| n.to_string(),
        },
    }
}

/// Rows for one sheet: headcount, new hires, departures, each with its per-category breakdown.
pub fn render_sheet(s: &SheetStats, labels: CategoryLabelSet, period: &ReferencePeriod) -> Vec<ResultRow> {
    let w = words(labels);
    let mut rows = vec![ResultRow::new(w.sheet, s.sheet.clone())];

    let sections = [
        (w.headcount, s.stats.active_or_departed_this_month, &s.stats.active_by_category),
        (w.new_hires, s.stats.new_hires, &s.stats.new_hires_by_category),
        (w.departures, s.stats.departures, &s.stats.departures_by_category),
    ];
    for (title, total, breakdown) in sections {
        rows.push(ResultRow::new(title, (w.people)(total)));
        rows.extend(breakdown_rows(breakdown, labels, &w));
    }

    for (title, table) in [(w.hires_detail, &s.hires), (w.departures_detail, &s.departures)] {
        if let Some(t) = table.as_ref().filter(|t| t.height() > 0) {
            rows.push(ResultRow::new(format!("{} ({})", title, period.previous_month), ""));
            rows.extend(detail_rows(t));
        }
    }
    rows
}

fn breakdown_rows(b: &CategoryBreakdown, labels: CategoryLabelSet, w: &Words) -> Vec<ResultRow> {
    let mut rows: Vec<ResultRow> = EmployeeCategory::ALL
        .into_iter()
        .map(|c| ResultRow::new(format!("  - {}", c.label(labels)), (w.people)(b.get(c))))
        .collect();
    if b.uncategorized > 0 {
        rows.push(ResultRow::new(
            format!("  - {}", w.uncategorized),
            (w.people)(b.uncategorized),
        ));
    }
    rows
}

/// One row per person: all but the first column joined after the first.
fn detail_rows(t: &HeaderedTable) -> Vec<ResultRow> {
    t.rows
        .iter()
        .map(|row| {
            let mut cells = row.iter().map(|c| c.to_string());
            let first = cells.next().unwrap_or_default();
            let rest: Vec<String> = cells.filter(|s| !s.is_empty()).collect();
            ResultRow::new(format!("    {}", first), rest.join(" / "))
        })
        .collect()
}

// src/schema/types.rs

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Employment category, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmployeeCategory {
    Regular,
    Contract,
    Dispatched,
    Executive,
}

impl EmployeeCategory {
    pub const ALL: [EmployeeCategory; 4] = [
        EmployeeCategory::Regular,
        EmployeeCategory::Contract,
        EmployeeCategory::Dispatched,
        EmployeeCategory::Executive,
    ];

    pub fn label(self, set: CategoryLabelSet) -> &'static str {
        match (set, self) {
            (CategoryLabelSet::Korean, EmployeeCategory::Regular) => "정규직",
            (CategoryLabelSet::Korean, EmployeeCategory::Contract) => "계약직",
            (CategoryLabelSet::Korean, EmployeeCategory::Dispatched) => "파견직",
            (CategoryLabelSet::Korean, EmployeeCategory::Executive) => "임원",
            (CategoryLabelSet::English, EmployeeCategory::Regular) => "Regular",
            (CategoryLabelSet::English, EmployeeCategory::Contract) => "Contract",
            (CategoryLabelSet::English, EmployeeCategory::Dispatched) => "Dispatched",
            (CategoryLabelSet::English, EmployeeCategory::Executive) => "Executive",
        }
    }

    /// Recognise a category label from either label set (trimmed, case-insensitive for English).
    pub fn from_label(raw: &str) -> Option<EmployeeCategory> {
        let s = raw.trim();
        EmployeeCategory::ALL.into_iter().find(|c| {
            s == c.label(CategoryLabelSet::Korean)
                || s.eq_ignore_ascii_case(c.label(CategoryLabelSet::English))
        })
    }
}

/// Which words are written into the category column and used on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CategoryLabelSet {
    #[default]
    Korean,
    English,
}

/// Calendar month, rendered `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    pub fn of(date: NaiveDate) -> Self {
        Self::new(date.year(), date.month())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        YearMonth::of(date) == *self
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

/// One employee row after normalization.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CanonicalRecord {
    /// Row index in the normalized table.
    pub row: usize,
    pub employee_name: Option<String>,
    pub department: Option<String>,
    pub title: Option<String>,
    pub hire_date: Option<NaiveDate>,
    pub separation_date: Option<NaiveDate>,
    pub employee_category: Option<EmployeeCategory>,
    /// Raw category text that maps to no known category.
    pub category_label: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip_through_either_set() {
        for c in EmployeeCategory::ALL {
            assert_eq!(EmployeeCategory::from_label(c.label(CategoryLabelSet::Korean)), Some(c));
            assert_eq!(EmployeeCategory::from_label(c.label(CategoryLabelSet::English)), Some(c));
        }
        assert_eq!(EmployeeCategory::from_label(" 계약직 "), Some(EmployeeCategory::Contract));
        assert_eq!(EmployeeCategory::from_label("regular"), Some(EmployeeCategory::Regular));
        assert_eq!(EmployeeCategory::from_label("인턴"), None);
    }

    #[test]
    fn year_month_display_and_membership() {
        let ym = YearMonth::new(2024, 5);
        assert_eq!(ym.to_string(), "2024-05");
        assert!(ym.contains(NaiveDate::from_ymd_opt(2024, 5, 31).unwrap()));
        assert!(!ym.contains(NaiveDate::from_ymd_opt(2023, 5, 1).unwrap()));
    }
}

// src/period.rs
use chrono::{Datelike, Local, NaiveDate};
use serde::Serialize;

use crate::schema::types::YearMonth;

/// The months a run reports on, fixed once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReferencePeriod {
    pub as_of: NaiveDate,
    pub current_month: YearMonth,
    pub previous_month: YearMonth,
    pub previous_month_last_day: NaiveDate,
}

impl ReferencePeriod {
    pub fn from_date(as_of: NaiveDate) -> Self {
        let first_of_month = as_of.with_day(1).unwrap_or(as_of);
        let previous_month_last_day = first_of_month.pred_opt().unwrap_or(first_of_month);
        Self {
            as_of,
            current_month: YearMonth::of(as_of),
            previous_month: YearMonth::of(previous_month_last_day),
            previous_month_last_day,
        }
    }

    /// Period for the system's local date.
    pub fn today() -> Self {
        Self::from_date(Local::now().date_naive())
    }
}

use chrono::{Duration, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::process::raw_table::CellValue;

/// `YYYY-MM-DD`, `YYYY/MM/DD`, `YYYY.MM.DD`, optional trailing `.` and time part.
static YMD_SEPARATED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})\s*[-/.]\s*(\d{1,2})\s*[-/.]\s*(\d{1,2})\.?(?:[ T]\d{1,2}:\d{2}(?::\d{2}(?:\.\d+)?)?)?$")
        .expect("valid date regex")
});

static YMD_COMPACT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})(\d{2})(\d{2})$").expect("valid date regex"));

static YM_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})\s*[-/.]\s*(\d{1,2})\.?$").expect("valid date regex"));

/// Largest serial Excel can display (9999-12-31).
const EXCEL_SERIAL_MAX: f64 = 2_958_465.0;

/// Excel 1900-system serial day number → datetime.
///
/// Serial 60 is the phantom 1900-02-29; the epoch below absorbs it for every later date.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 1.0 || serial > EXCEL_SERIAL_MAX {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add_signed(Duration::milliseconds(millis))
}

/// Datetime → Excel serial day number.
pub fn datetime_to_excel_serial(dt: &NaiveDateTime) -> f64 {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default();
    (*dt - epoch).num_milliseconds() as f64 / 86_400_000.0
}

/// Parse a cell into a calendar date. Anything unrecognised is `None`.
pub fn parse_date(cell: &CellValue) -> Option<NaiveDate> {
    match cell {
        CellValue::Date(dt) => Some(dt.date()),
        CellValue::Text(s) => parse_date_str(s),
        CellValue::Number(n) => parse_date_number(*n),
        CellValue::Empty | CellValue::Bool(_) => None,
    }
}

fn parse_date_number(n: f64) -> Option<NaiveDate> {
    if n.fract() == 0.0 && (10_000_101.0..=99_991_231.0).contains(&n) {
        return parse_date_str(&format!("{}", n as i64));
    }
    excel_serial_to_datetime(n).map(|dt| dt.date())
}

/// Parse free-form date text the way HR exports write it.
pub fn parse_date_str(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    let caps = YMD_SEPARATED
        .captures(s)
        .or_else(|| YMD_COMPACT.captures(s));
    if let Some(c) = caps {
        let y: i32 = c[1].parse().ok()?;
        let m: u32 = c[2].parse().ok()?;
        let d: u32 = c[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(y, m, d);
    }
    if let Some(c) = YM_ONLY.captures(s) {
        let y: i32 = c[1].parse().ok()?;
        let m: u32 = c[2].parse().ok()?;
        return NaiveDate::from_ymd_opt(y, m, 1);
    }
    None
}

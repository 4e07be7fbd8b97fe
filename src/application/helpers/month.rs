use chrono::{Datelike, NaiveDate};

use crate::app_error::AppError;

/// Parse a wire-format "MM-YYYY" month into a date pinned to the 1st.
pub fn parse_month_year(s: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(&format!("01-{s}"), "%d-%m-%Y")
        .map_err(|_| AppError::InvalidInput(format!("invalid date {s:?} (want MM-YYYY)")))
}

/// Format a date as wire-format "MM-YYYY".
pub fn format_month_year(date: NaiveDate) -> String {
    date.format("%m-%Y").to_string()
}

/// Truncate a date to month granularity.
pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date)
}

//! Canonical recurrence-bucket keys.
//!
//! Maps a calendar date into the bucket key used to record goal check-ins:
//! one key per day, ISO week, month, or a constant for one-off goals. Keys
//! are compared as strings, so they must be stable and zero-padded.

use chrono::{Datelike, NaiveDate};

use crate::types::Frequency;

/// Bucket key for one-off goals, independent of date.
pub const ONCE_KEY: &str = "ONCE";

/// Map a date into its canonical bucket key for the given cadence.
///
/// Weekly keys follow the ISO-8601 week-year rule: the week containing the
/// year's first Thursday is week 1, so a late-December date can belong to
/// week 1 of the following year (`2024-12-31` → `2025-W01`).
pub fn period_key(frequency: Frequency, date: NaiveDate) -> String {
    match frequency {
        Frequency::Daily => date.format("%Y-%m-%d").to_string(),
        Frequency::Weekly => {
            let week = date.iso_week();
            format!("{}-W{:02}", week.year(), week.week())
        }
        Frequency::Monthly => date.format("%Y-%m").to_string(),
        Frequency::Once => ONCE_KEY.to_string(),
    }
}

/// Parse a `YYYY-MM-DD` string as a plain calendar date.
///
/// Deliberately produces a [`NaiveDate`], never a UTC instant: interpreting
/// the string as UTC midnight would shift the calendar day for users west
/// of Greenwich.
pub fn parse_local_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

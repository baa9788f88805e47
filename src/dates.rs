//! Date resolution for report date ranges.
//!
//! Converts relative phrases ("last 7 days", "yesterday") and natural-language
//! dates ("3rd august", "august 3rd", "2024-08-01") into absolute YYYYMMDD
//! strings. All relative windows are computed against an explicit reference
//! date so callers (and tests) control "today".

use chrono::{Datelike, FixedOffset, NaiveDate, Utc};
use lazy_static::lazy_static;
use regex::Regex;

/// Report dates are anchored to UTC-5, with no daylight-saving adjustment.
const REPORTING_UTC_OFFSET_HOURS: i32 = -5;

lazy_static! {
    static ref LAST_N_DAYS: Regex = Regex::new(r"(?i)last\s+(\d+)\s+days?").unwrap();
    static ref YYYYMMDD: Regex = Regex::new(r"^\d{8}$").unwrap();
    static ref DASHED_DATE: Regex = Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").unwrap();
    static ref DAY_MONTH: Regex = Regex::new(r"^(\d{1,2})(?:st|nd|rd|th)?\s+(\w+)$").unwrap();
    static ref MONTH_DAY: Regex = Regex::new(r"^(\w+)\s+(\d{1,2})(?:st|nd|rd|th)?$").unwrap();
}

/// "Today" in the reporting timezone.
pub fn reference_today() -> NaiveDate {
    let offset = FixedOffset::east_opt(REPORTING_UTC_OFFSET_HOURS * 3600)
        .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());
    Utc::now().with_timezone(&offset).date_naive()
}

fn month_number(name: &str) -> Option<&'static str> {
    match name.to_lowercase().as_str() {
        "january" | "jan" => Some("01"),
        "february" | "feb" => Some("02"),
        "march" | "mar" => Some("03"),
        "april" | "apr" => Some("04"),
        "may" => Some("05"),
        "june" | "jun" => Some("06"),
        "july" | "jul" => Some("07"),
        "august" | "aug" => Some("08"),
        "september" | "sep" => Some("09"),
        "october" | "oct" => Some("10"),
        "november" | "nov" => Some("11"),
        "december" | "dec" => Some("12"),
        _ => None,
    }
}

fn format_yyyymmdd(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Resolves date expressions against a fixed reference date.
#[derive(Debug, Clone, Copy)]
pub struct DateResolver {
    today: NaiveDate,
}

impl DateResolver {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    /// Resolver anchored to the ambient clock in the reporting timezone.
    pub fn from_ambient_clock() -> Self {
        Self::new(reference_today())
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Resolves a relative phrase into a (start, end) pair of YYYYMMDD strings.
    ///
    /// Rules, in priority order over the whole expression:
    /// - "last N days": end = yesterday, start = end - (N - 1)
    /// - "last week": 7-day window ending yesterday
    /// - "last month": fixed 30-day window ending yesterday (not calendar-aware)
    /// - "today" / "yesterday": single-day windows
    /// - anything else defaults to today/today
    pub fn resolve_relative(&self, term: &str) -> (String, String) {
        let lower = term.to_lowercase();

        let (start, end) = if let Some(caps) = LAST_N_DAYS.captures(term) {
            let days: i64 = caps[1].parse().unwrap_or(1);
            let end = self.today - chrono::Duration::days(1);
            (end - chrono::Duration::days(days - 1), end)
        } else if lower.contains("last week") {
            let end = self.today - chrono::Duration::days(1);
            (end - chrono::Duration::days(6), end)
        } else if lower.contains("last month") {
            // Fixed 30-day lookback, intentionally not a calendar month.
            let end = self.today - chrono::Duration::days(1);
            (end - chrono::Duration::days(29), end)
        } else if lower.contains("today") {
            (self.today, self.today)
        } else if lower.contains("yesterday") {
            let day = self.today - chrono::Duration::days(1);
            (day, day)
        } else {
            (self.today, self.today)
        };

        (format_yyyymmdd(start), format_yyyymmdd(end))
    }

    /// True if the expression contains any recognized relative-date phrase.
    pub fn is_relative(expr: &str) -> bool {
        let lower = expr.to_lowercase();
        LAST_N_DAYS.is_match(expr)
            || lower.contains("last week")
            || lower.contains("last month")
            || lower.contains("today")
            || lower.contains("yesterday")
    }

    /// Converts a single date expression to YYYYMMDD form.
    ///
    /// Relative phrases resolve to the start of their window. Unrecognized
    /// expressions are returned verbatim; callers must treat a non-8-digit
    /// result as unresolved.
    pub fn resolve(&self, expr: &str) -> String {
        let expr = expr.trim();

        if Self::is_relative(expr) {
            let (start, _) = self.resolve_relative(expr);
            return start;
        }

        if YYYYMMDD.is_match(expr) {
            return expr.to_string();
        }

        if let Some(caps) = DASHED_DATE.captures(expr) {
            return format!("{}{}{}", &caps[1], &caps[2], &caps[3]);
        }

        let year = self.today.year();

        if let Some(caps) = DAY_MONTH.captures(expr) {
            if let Some(month) = month_number(&caps[2]) {
                return format!("{}{}{:0>2}", year, month, &caps[1]);
            }
        }

        if let Some(caps) = MONTH_DAY.captures(expr) {
            if let Some(month) = month_number(&caps[1]) {
                return format!("{}{}{:0>2}", year, month, &caps[2]);
            }
        }

        expr.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> DateResolver {
        DateResolver::new(NaiveDate::from_ymd_opt(2024, 8, 15).unwrap())
    }

    #[test]
    fn last_7_days_ends_yesterday() {
        let (start, end) = resolver().resolve_relative("last 7 days");
        assert_eq!(start, "20240808");
        assert_eq!(end, "20240814");
    }

    #[test]
    fn last_week_is_seven_day_window() {
        let (start, end) = resolver().resolve_relative("last week");
        assert_eq!(start, "20240808");
        assert_eq!(end, "20240814");
    }

    #[test]
    fn last_month_is_fixed_30_day_window() {
        let r = DateResolver::new(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        let (start, end) = r.resolve_relative("last month");
        assert_eq!(start, "20240204");
        assert_eq!(end, "20240304");
    }

    #[test]
    fn today_and_yesterday() {
        let (s, e) = resolver().resolve_relative("today");
        assert_eq!((s.as_str(), e.as_str()), ("20240815", "20240815"));
        let (s, e) = resolver().resolve_relative("yesterday");
        assert_eq!((s.as_str(), e.as_str()), ("20240814", "20240814"));
    }

    #[test]
    fn unknown_relative_defaults_to_today() {
        let (s, e) = resolver().resolve_relative("whenever");
        assert_eq!((s.as_str(), e.as_str()), ("20240815", "20240815"));
    }

    #[test]
    fn absolute_formats() {
        let r = resolver();
        assert_eq!(r.resolve("20240801"), "20240801");
        assert_eq!(r.resolve("2024-08-01"), "20240801");
        assert_eq!(r.resolve("3rd august"), "20240803");
        assert_eq!(r.resolve("august 3rd"), "20240803");
        assert_eq!(r.resolve("Aug 3"), "20240803");
        assert_eq!(r.resolve("10th july"), "20240710");
    }

    #[test]
    fn unknown_month_passes_through() {
        assert_eq!(resolver().resolve("3rd augustus"), "3rd augustus");
        assert_eq!(resolver().resolve("banana"), "banana");
    }
}

//! Intent extraction from free-text analytics requests.
//!
//! Produces a normalized [`QueryIntent`] holding the detected analysis type,
//! metric/dimension mentions, date range, and entity filters. Extraction is
//! purely rule-based: ordered keyword tables and regexes, no model calls.

use crate::dates::DateResolver;
use chrono::NaiveDate;
use itertools::Itertools;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Normalized representation of a user request. Built fresh per submission
/// and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryIntent {
    /// One of the supported analysis types, or empty if nothing was detected.
    pub analysis_type: String,

    /// Metric keywords found in the request.
    pub metrics: Vec<String>,

    /// Dimension keywords found in the request.
    pub dimensions: Vec<String>,

    /// Either "YYYYMMDD to YYYYMMDD", a raw "<date> to <date>" pair awaiting
    /// resolution, or the literal default "last 30 days".
    pub date_range: String,

    /// SQL-fragment-shaped filter clauses, currently only `campaign_id IN (...)`.
    pub filters: Vec<String>,
}

/// Default window used when no date expression is found in the request.
pub const DEFAULT_DATE_RANGE: &str = "last 30 days";

/// Ordered keyword table for analysis-type detection. Evaluated top to
/// bottom, first match wins.
const ANALYSIS_KEYWORDS: &[(&str, &str)] = &[
    ("device", "devices_analysis"),
    ("dma", "dma_analysis"),
    ("geo", "geo_analysis"),
    ("audience", "audience_analysis"),
    ("creative", "creative_analysis"),
    ("frequency", "reach_frequency"),
    ("reach", "reach_frequency"),
    ("site", "site_app_analysis"),
    ("app", "site_app_analysis"),
];

const METRIC_VOCABULARY: &[&str] = &[
    "impressions",
    "clicks",
    "conversions",
    "spend",
    "revenue",
    "ctr",
    "cpm",
    "reach",
    "frequency",
];

const DIMENSION_VOCABULARY: &[&str] = &[
    "device",
    "dma",
    "geo",
    "creative",
    "placement",
    "audience",
];

const MONTH_NAMES: &str = "january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sep|oct|nov|dec";

lazy_static! {
    static ref RELATIVE_DATE: Regex =
        Regex::new(r"(?i)last\s+\d+\s+days?|last\s+week|last\s+month|today|yesterday").unwrap();
    static ref EXPLICIT_RANGE: Regex = Regex::new(
        r"(?i)\b(\w+)\s+(\d{1,2})(?:st|nd|rd|th)?\s+to\s+(\w+)\s+(\d{1,2})(?:st|nd|rd|th)?"
    )
    .unwrap();
    static ref RANGE_SEPARATOR: Regex = Regex::new(r"(?i)\s+to\s+").unwrap();
    static ref DAY_MONTH_DATE: Regex = Regex::new(&format!(
        r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?\s+({MONTH_NAMES})\b"
    ))
    .unwrap();
    static ref MONTH_DAY_DATE: Regex = Regex::new(&format!(
        r"(?i)\b({MONTH_NAMES})\s+(\d{{1,2}})(?:st|nd|rd|th)?\b"
    ))
    .unwrap();
    static ref DASHED_DATE: Regex = Regex::new(r"\d{4}-\d{2}-\d{2}").unwrap();
    static ref COMPACT_DATE: Regex = Regex::new(r"\d{8}").unwrap();
    static ref CAMPAIGN_ID_LABELED: Regex =
        Regex::new(r"(?i)campaign\s*(?:id|identifier)?\s*[:\-]?\s*(\d+)").unwrap();
    static ref CAMPAIGN_ID_BARE: Regex = Regex::new(r"(?i)campaign\s+(\d+)").unwrap();
    static ref DIGIT_RUN: Regex = Regex::new(r"\d+").unwrap();
}

/// Rule-based extractor turning free text into a [`QueryIntent`].
pub struct IntentExtractor {
    resolver: DateResolver,
}

impl IntentExtractor {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            resolver: DateResolver::new(today),
        }
    }

    pub fn extract(&self, query: &str) -> QueryIntent {
        let lower = query.to_lowercase();

        let date_range = self.extract_date_range(query);
        let filters = extract_campaign_filters(query);
        let analysis_type = detect_analysis_type(&lower);

        let metrics = METRIC_VOCABULARY
            .iter()
            .filter(|m| lower.contains(**m))
            .map(|m| m.to_string())
            .collect();
        let dimensions = DIMENSION_VOCABULARY
            .iter()
            .filter(|d| lower.contains(**d))
            .map(|d| d.to_string())
            .collect();

        QueryIntent {
            analysis_type,
            metrics,
            dimensions,
            date_range,
            filters,
        }
    }

    /// Date extraction, in priority order: relative phrase (resolved
    /// immediately), explicit "<month> <day> to <month> <day>" range (kept
    /// raw for the assembler), then the four fallback date shapes collected
    /// in shape order across the whole text.
    fn extract_date_range(&self, query: &str) -> String {
        if let Some(m) = RELATIVE_DATE.find(query) {
            let (start, end) = self.resolver.resolve_relative(m.as_str());
            return format!("{} to {}", start, end);
        }

        if let Some(m) = EXPLICIT_RANGE.find(query) {
            let sides: Vec<&str> = RANGE_SEPARATOR.splitn(m.as_str(), 2).collect();
            if sides.len() == 2 {
                return format!("{} to {}", sides[0].trim(), sides[1].trim());
            }
        }

        let mut tokens: Vec<String> = Vec::new();
        for pattern in [&*DAY_MONTH_DATE, &*MONTH_DAY_DATE, &*DASHED_DATE, &*COMPACT_DATE] {
            for m in pattern.find_iter(query) {
                tokens.push(m.as_str().to_string());
            }
        }

        match tokens.len() {
            0 => DEFAULT_DATE_RANGE.to_string(),
            1 => tokens[0].clone(),
            // Start and end are matched by position when more than two
            // date-like tokens appear.
            _ => format!("{} to {}", tokens[0], tokens[1]),
        }
    }
}

fn detect_analysis_type(lower_query: &str) -> String {
    for (keyword, analysis_type) in ANALYSIS_KEYWORDS {
        if lower_query.contains(keyword) {
            return analysis_type.to_string();
        }
    }
    String::new()
}

/// Accumulates campaign ids across three patterns: labeled ("campaign id: 123"),
/// bare ("campaign 123"), and standalone 2-6 digit numbers not adjacent to
/// other digits. Ids are kept in order of first appearance.
fn extract_campaign_filters(query: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();

    for caps in CAMPAIGN_ID_LABELED.captures_iter(query) {
        ids.push(caps[1].to_string());
    }
    for caps in CAMPAIGN_ID_BARE.captures_iter(query) {
        ids.push(caps[1].to_string());
    }
    for m in DIGIT_RUN.find_iter(query) {
        if !is_standalone(query, m.start(), m.end()) {
            continue;
        }
        let len = m.as_str().len();
        if (2..=6).contains(&len) {
            ids.push(m.as_str().to_string());
        }
    }

    let ids: Vec<String> = ids.into_iter().unique().collect();
    if ids.is_empty() {
        Vec::new()
    } else {
        vec![format!("campaign_id IN ({})", ids.join(", "))]
    }
}

/// A digit run is standalone when bounded by whitespace or the text edges.
fn is_standalone(text: &str, start: usize, end: usize) -> bool {
    let before_ok = text[..start]
        .chars()
        .next_back()
        .map_or(true, |c| c.is_whitespace());
    let after_ok = text[end..].chars().next().map_or(true, |c| c.is_whitespace());
    before_ok && after_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> IntentExtractor {
        IntentExtractor::new(NaiveDate::from_ymd_opt(2024, 8, 15).unwrap())
    }

    #[test]
    fn relative_date_short_circuits() {
        let intent = extractor().extract("device report for campaign 123 last 7 days");
        assert_eq!(intent.date_range, "20240808 to 20240814");
    }

    #[test]
    fn explicit_month_day_range_kept_raw() {
        let intent = extractor().extract("dma report from august 3rd to august 5th");
        assert_eq!(intent.date_range, "august 3rd to august 5th");
    }

    #[test]
    fn day_month_dates_fall_back_to_shape_patterns() {
        let intent = extractor().extract("device query from 3rd august to 5th august");
        assert_eq!(intent.date_range, "3rd august to 5th august");
    }

    #[test]
    fn missing_dates_default_to_last_30_days() {
        let intent = extractor().extract("show me device performance");
        assert_eq!(intent.date_range, DEFAULT_DATE_RANGE);
    }

    #[test]
    fn campaign_ids_accumulate_in_order() {
        let intent = extractor().extract("campaign 123 and campaign id: 456");
        assert_eq!(intent.filters, vec!["campaign_id IN (123, 456)".to_string()]);
    }

    #[test]
    fn standalone_numbers_adjacent_to_punctuation_are_ignored() {
        let intent = extractor().extract("creative report for 789");
        assert_eq!(intent.filters, vec!["campaign_id IN (789)".to_string()]);
        let intent = extractor().extract("creative report for x789y");
        assert!(intent.filters.is_empty());
    }

    #[test]
    fn analysis_type_first_match_wins() {
        // "device" precedes "geo" in the keyword table.
        let intent = extractor().extract("geo and device breakdown");
        assert_eq!(intent.analysis_type, "devices_analysis");
        let intent = extractor().extract("banana");
        assert_eq!(intent.analysis_type, "");
    }

    #[test]
    fn metrics_and_dimensions_are_collected_independently() {
        let intent = extractor().extract("impressions and clicks by device and dma");
        assert_eq!(intent.metrics, vec!["impressions", "clicks"]);
        assert_eq!(intent.dimensions, vec!["device", "dma"]);
    }
}

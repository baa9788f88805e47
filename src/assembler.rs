//! Turns a selected template plus an intent into runnable SQL.
//!
//! Substitutes date, campaign id, and temp-table placeholders (both
//! `{{token}}` and `{token}` spellings), applies the requested granularity,
//! and prepends a descriptive comment header.

use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;

use crate::dates::DateResolver;
use crate::granularity::{apply_granularity, Granularity};
use crate::intent::QueryIntent;
use crate::knowledge_base::SqlTemplate;

const DEFAULT_START_DATE: &str = "20240801";
const DEFAULT_END_DATE: &str = "20240805";
const DEFAULT_CAMPAIGN_ID: &str = "123";

/// Placeholders the assembler knows how to fill. Anything else left in a
/// template is reported but not touched.
const KNOWN_PARAMS: &[&str] = &["start_date", "end_date", "campaign_id", "temp_table"];

lazy_static! {
    static ref EIGHT_DIGITS: Regex = Regex::new(r"^\d{8}$").unwrap();
    static ref FIRST_NUMBER: Regex = Regex::new(r"\d+").unwrap();
    static ref AS_ALIAS: Regex = Regex::new(r"(?i).*\s+as\s+(\w+)").unwrap();
    static ref TRAILING_IDENT: Regex = Regex::new(r"(\w+)$").unwrap();
}

/// Resolves an intent date range into an absolute `(start, end)` pair in
/// YYYYMMDD form. An endpoint the resolver cannot normalize degrades the
/// whole range to the default 30-day window so malformed literals never
/// reach the SQL.
pub fn resolve_range(date_range: &str, resolver: &DateResolver) -> (String, String) {
    let trimmed = date_range.trim();
    if trimmed.is_empty() {
        return (DEFAULT_START_DATE.to_string(), DEFAULT_END_DATE.to_string());
    }
    // A bare relative term resolves to its full window, not a single day.
    if DateResolver::is_relative(trimmed) && !trimmed.contains(" to ") {
        return resolver.resolve_relative(trimmed);
    }
    let (raw_start, raw_end) = match trimmed.split_once(" to ") {
        Some((start, end)) => (start.trim(), end.trim()),
        None => (trimmed, trimmed),
    };
    let start = resolve_endpoint(raw_start, resolver);
    let end = resolve_endpoint(raw_end, resolver);
    match (start, end) {
        (Some(start), Some(end)) => (start, end),
        _ => {
            warn!(date_range = %date_range, "unresolvable date range, using default window");
            resolver.resolve_relative("last 30 days")
        }
    }
}

fn resolve_endpoint(raw: &str, resolver: &DateResolver) -> Option<String> {
    if EIGHT_DIGITS.is_match(raw) {
        return Some(raw.to_string());
    }
    let resolved = resolver.resolve(raw);
    EIGHT_DIGITS.is_match(&resolved).then_some(resolved)
}

/// First numeric run of the first filter, falling back to the stock id.
pub fn campaign_id_from_filters(filters: &[String]) -> String {
    filters
        .first()
        .and_then(|filter| FIRST_NUMBER.find(filter))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| DEFAULT_CAMPAIGN_ID.to_string())
}

/// `temp_<analysis>_<timestamp>`, with underscores and the word "analysis"
/// squeezed out of the analysis type.
pub fn temp_table_name(analysis_type: &str) -> String {
    let cleaned = analysis_type.replace('_', "").replace("analysis", "");
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    format!("temp_{}_{}", cleaned, timestamp)
}

fn substitute(template: &str, token: &str, value: &str) -> String {
    template
        .replace(&format!("{{{{{}}}}}", token), value)
        .replace(&format!("{{{}}}", token), value)
}

/// Assembles final SQL for one template: placeholder substitution, the
/// granularity rewrite, and the comment header.
pub fn assemble(
    template: &SqlTemplate,
    intent: &QueryIntent,
    resolver: &DateResolver,
    granularity: Granularity,
) -> String {
    let (start_date, end_date) = resolve_range(&intent.date_range, resolver);
    let campaign_id = campaign_id_from_filters(&intent.filters);
    let temp_table = temp_table_name(&intent.analysis_type);

    for param in &template.metadata.required_params {
        if !KNOWN_PARAMS.contains(&param.as_str()) {
            warn!(
                template = %template.id,
                param = %param,
                "required parameter has no supplied value, token left in place"
            );
        }
    }

    let mut sql = template.template.clone();
    sql = substitute(&sql, "temp_table", &temp_table);
    sql = substitute(&sql, "start_date", &start_date);
    sql = substitute(&sql, "end_date", &end_date);
    sql = substitute(&sql, "campaign_id", &campaign_id);

    let sql = apply_granularity(&sql, granularity);

    let header = format!(
        "-- Temp Table: {temp_table}\n-- Granularity: {granularity}\n-- Campaign ID: {campaign_id}\n-- Date Range: {start_date} to {end_date}\n-- Analysis Type: {analysis_type}\n\n",
        temp_table = temp_table,
        granularity = granularity.description(),
        campaign_id = campaign_id,
        start_date = start_date,
        end_date = end_date,
        analysis_type = intent.analysis_type,
    );
    header + &sql
}

/// Output column names of the first SELECT list, by alias where one is
/// declared and by the trailing identifier otherwise.
pub fn extract_report_columns(sql: &str) -> Vec<String> {
    let lines: Vec<&str> = sql.lines().collect();
    let select_idx = lines
        .iter()
        .position(|l| l.trim_start().to_lowercase().starts_with("select"));
    let from_idx = lines
        .iter()
        .position(|l| l.trim_start().to_lowercase().starts_with("from"));
    let (select_idx, from_idx) = match (select_idx, from_idx) {
        (Some(s), Some(f)) if s < f => (s, f),
        _ => return Vec::new(),
    };

    let mut columns = Vec::new();
    for line in &lines[select_idx + 1..from_idx] {
        let trimmed = line.trim().trim_end_matches(',');
        if trimmed.is_empty() || trimmed.starts_with("--") {
            continue;
        }
        if let Some(caps) = AS_ALIAS.captures(trimmed) {
            columns.push(caps[1].to_string());
        } else if let Some(caps) = TRAILING_IDENT.captures(trimmed) {
            columns.push(caps[1].to_string());
        }
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::IntentExtractor;
    use crate::knowledge_base::template_by_id;
    use chrono::NaiveDate;

    fn resolver() -> DateResolver {
        DateResolver::new(NaiveDate::from_ymd_opt(2024, 8, 15).unwrap())
    }

    #[test]
    fn resolves_natural_language_range() {
        let (start, end) = resolve_range("3rd august to 5th august", &resolver());
        assert_eq!(start, "20240803");
        assert_eq!(end, "20240805");
    }

    #[test]
    fn bare_relative_term_resolves_to_full_window() {
        let (start, end) = resolve_range("last 30 days", &resolver());
        assert_eq!((start.as_str(), end.as_str()), ("20240716", "20240814"));
    }

    #[test]
    fn eight_digit_endpoints_pass_through() {
        let (start, end) = resolve_range("20240101 to 20240131", &resolver());
        assert_eq!((start.as_str(), end.as_str()), ("20240101", "20240131"));
    }

    #[test]
    fn unresolvable_range_degrades_to_default_window() {
        let (start, end) = resolve_range("whenever to forever", &resolver());
        // last 30 days anchored at 2024-08-15 ends the prior day
        assert_eq!(end, "20240814");
        assert_eq!(start, "20240716");
    }

    #[test]
    fn campaign_id_defaults_when_no_filters() {
        assert_eq!(campaign_id_from_filters(&[]), "123");
        let filters = vec!["campaign_id IN (4567, 89)".to_string()];
        assert_eq!(campaign_id_from_filters(&filters), "4567");
    }

    #[test]
    fn temp_table_name_strips_analysis_suffix() {
        let name = temp_table_name("devices_analysis");
        assert!(name.starts_with("temp_devices_"));
        let name = temp_table_name("reach_frequency");
        assert!(name.starts_with("temp_reachfrequency_"));
    }

    #[test]
    fn substitution_removes_both_placeholder_spellings() {
        let template = "select * from t where d >= {{start_date}} and d <= {start_date}";
        let out = substitute(template, "start_date", "20240801");
        assert!(!out.contains("{{start_date}}"));
        assert!(!out.contains("{start_date}"));
        assert_eq!(out.matches("20240801").count(), 2);
    }

    #[test]
    fn assembled_sql_has_header_and_no_tokens() {
        let today = NaiveDate::from_ymd_opt(2024, 8, 15).unwrap();
        let intent = IntentExtractor::new(today)
            .extract("Generate a device query from 3rd august to 5th august for campaign id 123");
        let template = template_by_id("devices_analysis").unwrap();
        let sql = assemble(template, &intent, &resolver(), Granularity::Campaign);
        assert!(sql.starts_with("-- Temp Table: temp_devices_"));
        assert!(sql.contains("-- Date Range: 20240803 to 20240805"));
        assert!(sql.contains("-- Granularity: Campaign level only"));
        assert!(!sql.contains("{{"));
        assert!(sql.contains("ad_info_campaign_id IN (123)"));
        assert!(!sql.contains("LineItem_ID"));
    }

    #[test]
    fn report_columns_prefer_aliases() {
        let sql = "select\n    dim_lookup('campaigns_by_id', ad_info_campaign_id, 'name') as Campaign_Name,\n    ad_info_campaign_id as Campaign_ID,\n    sum(dsp_client_revenue) Revenue\nfrom t";
        assert_eq!(
            extract_report_columns(sql),
            vec!["Campaign_Name", "Campaign_ID", "Revenue"]
        );
    }
}

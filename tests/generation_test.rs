//! End-to-end tests for the text and form generation pipelines.

use chrono::NaiveDate;
use query_studio::form::{
    self, FormDateRange, FormGranularity, FormRequest, IdField, IdFieldType,
    NEXT_QUERY_DELIMITER,
};
use query_studio::granularity::{apply_granularity, Granularity};
use query_studio::selector::no_template_guidance;
use query_studio::{QueryStudio, StudioError};

fn studio() -> QueryStudio {
    QueryStudio::with_reference_date(NaiveDate::from_ymd_opt(2024, 8, 15).unwrap())
}

#[test]
fn device_request_produces_campaign_level_sql() {
    let generated = studio()
        .generate_from_text(
            "Generate a device query from 3rd august to 5th august for campaign id 123",
            Granularity::Campaign,
        )
        .unwrap();

    assert_eq!(generated.intent.analysis_type, "devices_analysis");
    assert_eq!(generated.intent.date_range, "3rd august to 5th august");
    assert_eq!(generated.intent.filters, vec!["campaign_id IN (123)"]);

    assert!(generated.sql.contains("-- Date Range: 20240803 to 20240805"));
    assert!(generated.sql.contains("-- Granularity: Campaign level only"));
    assert!(generated.sql.contains("data_date >= 20240803"));
    assert!(generated.sql.contains("data_date <= 20240805"));
    assert!(generated.sql.contains("ad_info_campaign_id IN (123)"));

    assert!(generated.columns.contains(&"Campaign_ID".to_string()));
    assert!(!generated.columns.contains(&"LineItem_ID".to_string()));
    assert!(!generated.columns.contains(&"Tactic_ID".to_string()));
}

#[test]
fn relative_dates_resolve_against_reference_day() {
    let generated = studio()
        .generate_from_text(
            "reach and frequency for campaign 4521 last 7 days",
            Granularity::All,
        )
        .unwrap();
    // last 7 days from 2024-08-15 ends the prior day
    assert!(generated.sql.contains("-- Date Range: 20240808 to 20240814"));
}

#[test]
fn unmatched_request_surfaces_guidance_instead_of_sql() {
    let err = studio()
        .generate_from_text("banana", Granularity::All)
        .unwrap_err();
    assert!(matches!(err, StudioError::NoTemplateMatch { .. }));

    let guidance = no_template_guidance();
    assert!(guidance.contains("Supported analyses:"));
    assert!(!guidance.to_lowercase().contains("select"));
}

#[test]
fn regenerating_with_same_granularity_is_stable() {
    let generated = studio()
        .generate_from_text("dma analysis for campaign 99887", Granularity::LineItemTactic)
        .unwrap();
    let body = generated
        .sql
        .split("\n\n")
        .nth(1)
        .expect("header and body");
    assert_eq!(apply_granularity(body, Granularity::LineItemTactic), body);
}

#[test]
fn form_mode_joins_queries_with_delimiter() {
    let request = FormRequest {
        analysis_types: vec!["dma".to_string(), "devices".to_string(), "unknown".to_string()],
        granularity: FormGranularity::LineItem,
        id_field: IdField {
            kind: IdFieldType::CampaignId,
            value: "555".to_string(),
        },
        conversion_action_id: None,
        pixel_id: None,
        date_range: FormDateRange {
            from: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            to: NaiveDate::from_ymd_opt(2024, 7, 31).unwrap(),
        },
        omnichannel_config: None,
    };
    let sql = form::generate(&request);
    let parts: Vec<&str> = sql.split(NEXT_QUERY_DELIMITER).collect();
    assert_eq!(parts.len(), 3);
    assert!(parts[0].starts_with("-- DMA Analysis"));
    assert!(parts[0].contains("LineItem_ID"));
    assert!(!parts[0].contains("Tactic_ID"));
    assert!(parts[0].contains("and ad_info_campaign_id in (555)"));
    assert!(parts[0].contains("data_date >= 20240701"));
    assert_eq!(parts[2], "-- Query template not found for: unknown");
}

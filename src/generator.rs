//! End-to-end query generation from free-form text.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::assembler::{assemble, extract_report_columns};
use crate::dates::DateResolver;
use crate::error::{Result, StudioError};
use crate::granularity::Granularity;
use crate::intent::{IntentExtractor, QueryIntent};
use crate::knowledge_base::templates;
use crate::selector::find_relevant_templates;

/// A generated report query plus the intermediate artifacts callers
/// surface alongside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedQuery {
    pub intent: QueryIntent,
    pub sql: String,
    pub columns: Vec<String>,
    pub templates_used: Vec<String>,
}

/// Front door for the text pipeline. Holds the reference date so a whole
/// session resolves relative expressions consistently.
pub struct QueryStudio {
    reference_date: NaiveDate,
}

impl QueryStudio {
    /// Anchored to the ambient reporting-timezone clock.
    pub fn new() -> Self {
        Self {
            reference_date: DateResolver::from_ambient_clock().today(),
        }
    }

    /// Anchored to a fixed date. Used by tests and batch replays.
    pub fn with_reference_date(reference_date: NaiveDate) -> Self {
        Self { reference_date }
    }

    /// Runs extraction, template retrieval, and assembly for one request.
    ///
    /// Returns `StudioError::NoTemplateMatch` when nothing in the catalog
    /// fits; callers should respond with `selector::no_template_guidance`.
    pub fn generate_from_text(
        &self,
        query: &str,
        granularity: Granularity,
    ) -> Result<GeneratedQuery> {
        let intent = IntentExtractor::new(self.reference_date).extract(query);
        let matched = find_relevant_templates(&intent, templates());
        let best = match matched.first() {
            Some(template) => *template,
            None => {
                return Err(StudioError::NoTemplateMatch {
                    analysis_type: intent.analysis_type,
                })
            }
        };

        let resolver = DateResolver::new(self.reference_date);
        let sql = assemble(best, &intent, &resolver, granularity);
        let columns = extract_report_columns(&sql);

        info!(
            analysis_type = %intent.analysis_type,
            template = %best.id,
            granularity = %granularity,
            "generated query"
        );
        Ok(GeneratedQuery {
            templates_used: matched.iter().map(|t| t.id.clone()).collect(),
            intent,
            sql,
            columns,
        })
    }
}

impl Default for QueryStudio {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn studio() -> QueryStudio {
        QueryStudio::with_reference_date(NaiveDate::from_ymd_opt(2024, 8, 15).unwrap())
    }

    #[test]
    fn device_query_end_to_end() {
        let generated = studio()
            .generate_from_text(
                "Generate a device query from 3rd august to 5th august for campaign id 123",
                Granularity::Campaign,
            )
            .unwrap();
        assert_eq!(generated.intent.analysis_type, "devices_analysis");
        assert_eq!(generated.intent.filters, vec!["campaign_id IN (123)"]);
        assert!(generated.sql.contains("-- Date Range: 20240803 to 20240805"));
        assert!(generated.columns.contains(&"Campaign_ID".to_string()));
        assert!(!generated.columns.contains(&"LineItem_ID".to_string()));
        assert_eq!(generated.templates_used[0], "devices_analysis");
    }

    #[test]
    fn unmatched_request_is_a_no_template_error() {
        let err = studio()
            .generate_from_text("please order me a banana split", Granularity::All)
            .unwrap_err();
        assert!(matches!(err, StudioError::NoTemplateMatch { .. }));
    }
}

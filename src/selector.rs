//! Template retrieval: scores catalog entries against an extracted intent.

use tracing::debug;

use crate::intent::QueryIntent;
use crate::knowledge_base::SqlTemplate;

const MAX_TEMPLATES: usize = 3;

/// Returns up to three catalog templates relevant to the intent.
///
/// A template whose id equals the extracted analysis type is always ranked
/// first. The remainder match on keyword overlap with the analysis type,
/// metrics, and dimensions, kept in catalog order.
pub fn find_relevant_templates<'a>(
    intent: &QueryIntent,
    catalog: &'a [SqlTemplate],
) -> Vec<&'a SqlTemplate> {
    let mut relevant: Vec<&SqlTemplate> = Vec::new();

    if let Some(exact) = catalog.iter().find(|t| t.id == intent.analysis_type) {
        relevant.push(exact);
    }

    for template in catalog {
        if relevant.iter().any(|t| t.id == template.id) {
            continue;
        }
        if matches_intent(template, intent) {
            relevant.push(template);
        }
        if relevant.len() >= MAX_TEMPLATES {
            break;
        }
    }

    debug!(
        analysis_type = %intent.analysis_type,
        matched = relevant.len(),
        "template retrieval complete"
    );
    relevant
}

fn matches_intent(template: &SqlTemplate, intent: &QueryIntent) -> bool {
    template.keywords.iter().any(|keyword| {
        intent.analysis_type.contains(keyword.as_str())
            || intent.metrics.iter().any(|m| keyword.contains(m.as_str()))
            || intent
                .dimensions
                .iter()
                .any(|d| keyword.contains(d.as_str()))
    })
}

/// Human-readable guidance returned when no template matches a request.
pub fn no_template_guidance() -> String {
    let supported = [
        (
            "Performance reports",
            "performance, report, impressions, clicks",
            "show me a performance report for campaign 12345",
        ),
        (
            "DMA / geographic analysis",
            "dma, geography, metro, location",
            "dma analysis for campaign 12345",
        ),
        (
            "Device analysis",
            "device, mobile, desktop, ctv",
            "device breakdown for campaign 12345 last 7 days",
        ),
        (
            "Reach and frequency",
            "reach, frequency, unique users",
            "reach and frequency for campaign 12345",
        ),
        (
            "Site and app analysis",
            "site, app, publisher, inventory",
            "top sites and apps for campaign 12345",
        ),
        (
            "Top creatives",
            "creative, ad, top performing",
            "top creatives for campaign 12345 last month",
        ),
        (
            "Audience insights",
            "audience, segment, demographic",
            "audience insights for campaign 12345",
        ),
    ];

    let mut lines = vec![
        "I could not match that request to a known report type.".to_string(),
        String::new(),
        "Supported analyses:".to_string(),
    ];
    for (idx, (name, keywords, example)) in supported.iter().enumerate() {
        lines.push(format!("{}. {} (keywords: {})", idx + 1, name, keywords));
        lines.push(format!("   e.g. \"{}\"", example));
    }
    lines.push(String::new());
    lines.push(
        "Try rephrasing with one of the keywords above, plus a campaign id and a date range."
            .to_string(),
    );
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::IntentExtractor;
    use crate::knowledge_base::templates;
    use chrono::NaiveDate;

    fn intent_for(query: &str) -> QueryIntent {
        let today = NaiveDate::from_ymd_opt(2024, 8, 15).unwrap();
        IntentExtractor::new(today).extract(query)
    }

    #[test]
    fn exact_analysis_type_ranks_first() {
        let intent = intent_for("device performance for campaign 12345");
        let found = find_relevant_templates(&intent, templates());
        assert!(!found.is_empty());
        assert_eq!(found[0].id, "devices_analysis");
    }

    #[test]
    fn geo_queries_reach_the_dma_template() {
        let intent = intent_for("geo breakdown for campaign 12345");
        assert_eq!(intent.analysis_type, "geo_analysis");
        let found = find_relevant_templates(&intent, templates());
        assert!(found.iter().any(|t| t.id == "dma_analysis"));
    }

    #[test]
    fn at_most_three_templates() {
        let intent = intent_for(
            "report with impressions clicks conversions spend reach frequency for campaign 12345",
        );
        let found = find_relevant_templates(&intent, templates());
        assert!(found.len() <= 3);
    }

    #[test]
    fn nonsense_matches_nothing() {
        let intent = intent_for("please order me a banana split");
        let found = find_relevant_templates(&intent, templates());
        assert!(found.is_empty());
    }

    #[test]
    fn guidance_lists_supported_analyses() {
        let guidance = no_template_guidance();
        assert!(guidance.contains("Supported analyses:"));
        assert!(guidance.contains("Reach and frequency"));
    }
}

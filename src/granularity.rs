//! Report granularity and the SELECT/GROUP BY rewrite that enforces it.
//!
//! Generated SQL always starts from the full campaign/line-item/tactic
//! breakdown. `apply_granularity` reparses the first SELECT list and GROUP BY
//! clause, drops every entity-dimension column, and inserts the canonical
//! column group for the requested granularity. Columns are classified from
//! parsed expressions rather than raw line text, so multi-line expressions
//! and inline function calls survive the rewrite.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StudioError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Campaign,
    LineItem,
    Tactic,
    CampaignLineItem,
    CampaignTactic,
    LineItemTactic,
    All,
}

impl Granularity {
    pub fn label(&self) -> &'static str {
        match self {
            Granularity::Campaign => "campaign",
            Granularity::LineItem => "line_item",
            Granularity::Tactic => "tactic",
            Granularity::CampaignLineItem => "campaign_line_item",
            Granularity::CampaignTactic => "campaign_tactic",
            Granularity::LineItemTactic => "line_item_tactic",
            Granularity::All => "all",
        }
    }

    /// Human-readable form used in generated comment headers.
    pub fn description(&self) -> &'static str {
        match self {
            Granularity::Campaign => "Campaign level only",
            Granularity::LineItem => "Line Item level only",
            Granularity::Tactic => "Tactic level only",
            Granularity::CampaignLineItem => "Campaign + Line Item levels",
            Granularity::CampaignTactic => "Campaign + Tactic levels",
            Granularity::LineItemTactic => "Line Item + Tactic levels",
            Granularity::All => "All levels (Campaign + Line Item + Tactic)",
        }
    }

    pub fn keeps_campaign(&self) -> bool {
        matches!(
            self,
            Granularity::Campaign
                | Granularity::CampaignLineItem
                | Granularity::CampaignTactic
                | Granularity::All
        )
    }

    pub fn keeps_line_item(&self) -> bool {
        matches!(
            self,
            Granularity::LineItem
                | Granularity::CampaignLineItem
                | Granularity::LineItemTactic
                | Granularity::All
        )
    }

    pub fn keeps_tactic(&self) -> bool {
        matches!(
            self,
            Granularity::Tactic
                | Granularity::CampaignTactic
                | Granularity::LineItemTactic
                | Granularity::All
        )
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Granularity {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "campaign" => Ok(Granularity::Campaign),
            "line_item" => Ok(Granularity::LineItem),
            "tactic" => Ok(Granularity::Tactic),
            "campaign_line_item" => Ok(Granularity::CampaignLineItem),
            "campaign_tactic" => Ok(Granularity::CampaignTactic),
            "line_item_tactic" => Ok(Granularity::LineItemTactic),
            "all" => Ok(Granularity::All),
            other => Err(StudioError::Granularity(other.to_string())),
        }
    }
}

const CAMPAIGN_SELECT: &[&str] = &[
    "dim_lookup('campaigns_by_id', ad_info_campaign_id, 'name') as Campaign_Name",
    "ad_info_campaign_id as Campaign_ID",
];
const LINE_ITEM_SELECT: &[&str] = &[
    "dim_lookup('lineitems_by_id', ad_info_line_item_id, 'name') as LineItem_Name",
    "ad_info_line_item_id as LineItem_ID",
];
const TACTIC_SELECT: &[&str] = &[
    "dim_lookup('tactics_by_id', ad_info_tactic_id, 'name') as Tactic_Name",
    "ad_info_tactic_id as Tactic_ID",
];

const CAMPAIGN_GROUP_BY: &[&str] = &[
    "dim_lookup('campaigns_by_id', ad_info_campaign_id, 'name')",
    "ad_info_campaign_id",
];
const LINE_ITEM_GROUP_BY: &[&str] = &[
    "dim_lookup('lineitems_by_id', ad_info_line_item_id, 'name')",
    "ad_info_line_item_id",
];
const TACTIC_GROUP_BY: &[&str] = &[
    "dim_lookup('tactics_by_id', ad_info_tactic_id, 'name')",
    "ad_info_tactic_id",
];

/// Canonical SELECT columns for a granularity, campaign then line item then
/// tactic.
fn canonical_select(granularity: Granularity) -> Vec<&'static str> {
    let mut columns = Vec::new();
    if granularity.keeps_campaign() {
        columns.extend_from_slice(CAMPAIGN_SELECT);
    }
    if granularity.keeps_line_item() {
        columns.extend_from_slice(LINE_ITEM_SELECT);
    }
    if granularity.keeps_tactic() {
        columns.extend_from_slice(TACTIC_SELECT);
    }
    columns
}

fn canonical_group_by(granularity: Granularity) -> Vec<&'static str> {
    let mut columns = Vec::new();
    if granularity.keeps_campaign() {
        columns.extend_from_slice(CAMPAIGN_GROUP_BY);
    }
    if granularity.keeps_line_item() {
        columns.extend_from_slice(LINE_ITEM_GROUP_BY);
    }
    if granularity.keeps_tactic() {
        columns.extend_from_slice(TACTIC_GROUP_BY);
    }
    columns
}

/// True for a parsed column expression that belongs to one of the three
/// entity-dimension groups. Matches the known dimension-key identifiers and
/// lookup table names, plus the bare CTE aliases used by windowed templates.
fn is_granularity_column(expr: &str) -> bool {
    let lowered = expr.to_lowercase();
    let bare = lowered.trim();
    if matches!(bare, "campaign" | "line_item" | "tactic") {
        return true;
    }
    lowered.contains("ad_info_campaign_id")
        || lowered.contains("ad_info_line_item_id")
        || lowered.contains("ad_info_tactic_id")
        || lowered.contains("campaigns_by_id")
        || lowered.contains("lineitems_by_id")
        || lowered.contains("tactics_by_id")
}

/// Splits an expression list on commas at paren depth zero. Quote-aware
/// enough for the dim_lookup('...') literals that appear in templates.
fn split_top_level_commas(list: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut in_single = false;
    let mut in_double = false;
    let mut current = String::new();
    for ch in list.chars() {
        match ch {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            '(' if !in_single && !in_double => depth += 1,
            ')' if !in_single && !in_double => depth = depth.saturating_sub(1),
            ',' if depth == 0 && !in_single && !in_double => {
                let trimmed = current.trim().to_string();
                if !trimmed.is_empty() {
                    parts.push(trimmed);
                }
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    let trimmed = current.trim().to_string();
    if !trimmed.is_empty() {
        parts.push(trimmed);
    }
    parts
}

fn is_select_header(line: &str) -> bool {
    let lowered = line.trim_start().to_lowercase();
    lowered == "select" || lowered.starts_with("select ") || lowered.starts_with("select\t")
}

fn is_from_line(line: &str) -> bool {
    let lowered = line.trim_start().to_lowercase();
    lowered == "from" || lowered.starts_with("from ") || lowered.starts_with("from\t")
}

fn is_group_by_header(line: &str) -> bool {
    line.trim_start().to_lowercase().starts_with("group by")
}

/// A GROUP BY continuation ends at the first blank line, comment, or line
/// that starts a new statement.
fn ends_group_by(line: &str) -> bool {
    let lowered = line.trim_start().to_lowercase();
    lowered.is_empty()
        || lowered.starts_with("--")
        || lowered.starts_with("create ")
        || lowered.starts_with("select")
        || lowered.starts_with("order by")
        || lowered.starts_with("having")
        || lowered.starts_with("limit")
        || lowered.starts_with("join")
        || lowered.starts_with("left join")
        || lowered.starts_with("inner join")
        || lowered.starts_with("union")
        || lowered.starts_with("from")
        || lowered.starts_with("where")
        || lowered.starts_with(')')
}

/// Rewrites the first SELECT list and GROUP BY clause of `sql` so the
/// entity-dimension columns are exactly the canonical group for
/// `granularity`. Non-granularity columns and every other clause are kept
/// verbatim. SQL without a recognizable SELECT and FROM is returned
/// unchanged. The rewrite is idempotent.
pub fn apply_granularity(sql: &str, granularity: Granularity) -> String {
    let lines: Vec<&str> = sql.lines().collect();

    let select_idx = match lines.iter().position(|l| is_select_header(l)) {
        Some(idx) => idx,
        None => return sql.to_string(),
    };
    let from_idx = match lines[select_idx..]
        .iter()
        .position(|l| is_from_line(l))
        .map(|offset| select_idx + offset)
    {
        Some(idx) => idx,
        None => return sql.to_string(),
    };
    let group_by_idx = lines[from_idx..]
        .iter()
        .position(|l| is_group_by_header(l))
        .map(|offset| from_idx + offset);

    let mut out: Vec<String> = lines[..select_idx].iter().map(|l| l.to_string()).collect();

    // SELECT list: header remainder plus continuation lines, reparsed.
    let header = lines[select_idx];
    let indent: String = header.chars().take_while(|c| c.is_whitespace()).collect();
    let keyword = &header.trim_start()[.."select".len()];
    let mut select_list = header.trim_start()["select".len()..].trim_start().to_string();
    for line in &lines[select_idx + 1..from_idx] {
        select_list.push('\n');
        select_list.push_str(line);
    }
    let kept: Vec<String> = split_top_level_commas(&select_list)
        .into_iter()
        .filter(|expr| !is_granularity_column(expr))
        .collect();
    let mut columns: Vec<String> = canonical_select(granularity)
        .into_iter()
        .map(|c| c.to_string())
        .collect();
    columns.extend(kept);

    out.push(format!("{}{}", indent, keyword));
    let last = columns.len().saturating_sub(1);
    for (idx, column) in columns.iter().enumerate() {
        let sep = if idx == last { "" } else { "," };
        out.push(format!("{}    {}{}", indent, column, sep));
    }

    // FROM and trailing clauses up to GROUP BY stay verbatim.
    let from_end = group_by_idx.unwrap_or(lines.len());
    for line in &lines[from_idx..from_end] {
        out.push(line.to_string());
    }

    if let Some(gb_idx) = group_by_idx {
        let gb_header = lines[gb_idx].trim_start();
        let mut gb_list = gb_header["group by".len()..].trim_start().to_string();
        let mut rest_idx = gb_idx + 1;
        while rest_idx < lines.len() && !ends_group_by(lines[rest_idx]) {
            gb_list.push('\n');
            gb_list.push_str(lines[rest_idx]);
            rest_idx += 1;
        }

        let kept_gb: Vec<String> = split_top_level_commas(&gb_list)
            .into_iter()
            .filter(|expr| !is_granularity_column(expr))
            .collect();
        let mut gb_columns: Vec<String> = canonical_group_by(granularity)
            .into_iter()
            .map(|c| c.to_string())
            .collect();
        gb_columns.extend(kept_gb);

        if !gb_columns.is_empty() {
            out.push("GROUP BY".to_string());
            let last = gb_columns.len() - 1;
            for (idx, column) in gb_columns.iter().enumerate() {
                let sep = if idx == last { "" } else { "," };
                out.push(format!("    {}{}", column, sep));
            }
        }

        for line in &lines[rest_idx..] {
            out.push(line.to_string());
        }
    }

    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "select data_date as data_date,\n    dim_lookup('campaigns_by_id', ad_info_campaign_id, 'name') as Campaign_Name,\n    ad_info_campaign_id as Campaign_ID,\n    dim_lookup('lineitems_by_id', ad_info_line_item_id, 'name') as LineItem_Name,\n    ad_info_line_item_id as LineItem_ID,\n    dim_lookup('tactics_by_id', ad_info_tactic_id, 'name') as Tactic_Name,\n    ad_info_tactic_id as Tactic_ID,\n    sum(adv_server_views) as Impressions\nfrom dsp_campaign_reporting_mv\nwhere data_date >= 20240801\ngroup by data_date, ad_info_campaign_id, ad_info_line_item_id, ad_info_tactic_id";

    fn group_by_section(sql: &str) -> String {
        sql.split("GROUP BY").nth(1).unwrap_or_default().to_string()
    }

    #[test]
    fn parses_granularity_strings() {
        assert_eq!("campaign".parse::<Granularity>().unwrap(), Granularity::Campaign);
        assert_eq!(
            "Campaign_Line_Item".parse::<Granularity>().unwrap(),
            Granularity::CampaignLineItem
        );
        assert!("weekly".parse::<Granularity>().is_err());
    }

    #[test]
    fn campaign_granularity_drops_line_item_and_tactic() {
        let rewritten = apply_granularity(SAMPLE, Granularity::Campaign);
        assert!(rewritten.contains("ad_info_campaign_id as Campaign_ID"));
        assert!(!rewritten.contains("LineItem_ID"));
        assert!(!rewritten.contains("Tactic_ID"));
        assert!(!rewritten.contains("lineitems_by_id"));
        assert!(rewritten.contains("sum(adv_server_views) as Impressions"));
        let gb = group_by_section(&rewritten);
        assert!(gb.contains("ad_info_campaign_id"));
        assert!(gb.contains("data_date"));
        assert!(!gb.contains("ad_info_line_item_id"));
    }

    #[test]
    fn line_item_tactic_keeps_both_dimensions() {
        let rewritten = apply_granularity(SAMPLE, Granularity::LineItemTactic);
        assert!(!rewritten.contains("Campaign_ID"));
        assert!(rewritten.contains("LineItem_ID"));
        assert!(rewritten.contains("Tactic_ID"));
    }

    #[test]
    fn all_granularity_restores_every_group() {
        let rewritten = apply_granularity(SAMPLE, Granularity::All);
        assert!(rewritten.contains("Campaign_ID"));
        assert!(rewritten.contains("LineItem_ID"));
        assert!(rewritten.contains("Tactic_ID"));
    }

    #[test]
    fn group_by_puts_canonical_columns_first() {
        let rewritten = apply_granularity(SAMPLE, Granularity::Campaign);
        let gb = group_by_section(&rewritten);
        let canonical = gb.find("dim_lookup('campaigns_by_id'").unwrap();
        let id = gb.find("    ad_info_campaign_id").unwrap();
        let original = gb.find("data_date").unwrap();
        assert!(canonical < id && id < original);
    }

    #[test]
    fn rewrite_is_idempotent() {
        for granularity in [
            Granularity::Campaign,
            Granularity::LineItemTactic,
            Granularity::All,
        ] {
            let once = apply_granularity(SAMPLE, granularity);
            let twice = apply_granularity(&once, granularity);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn switching_granularity_does_not_accumulate_columns() {
        let narrowed = apply_granularity(SAMPLE, Granularity::Campaign);
        let widened = apply_granularity(&narrowed, Granularity::All);
        assert_eq!(widened.matches("Campaign_ID").count(), 1);
        assert_eq!(widened.matches("LineItem_ID").count(), 1);
    }

    #[test]
    fn bare_cte_aliases_are_classified() {
        let sql = "select\n    campaign,\n    line_item,\n    tactic,\n    sum(impressions) as impressions\nfrom ranked\ngroup by campaign, line_item, tactic";
        let rewritten = apply_granularity(sql, Granularity::Campaign);
        assert!(!rewritten.contains("line_item,"));
        assert!(!rewritten.contains("Tactic_ID"));
        assert!(rewritten.contains("Campaign_ID"));
        assert!(rewritten.contains("sum(impressions) as impressions"));
    }

    #[test]
    fn sql_without_select_from_shape_is_untouched() {
        let sql = "-- just a comment\ndrop table foo";
        assert_eq!(apply_granularity(sql, Granularity::Campaign), sql);
    }

    #[test]
    fn quoted_commas_do_not_split() {
        let parts = split_top_level_commas("dim_lookup('a, b', x, 'name') as n, y as other");
        assert_eq!(parts.len(), 2);
    }
}

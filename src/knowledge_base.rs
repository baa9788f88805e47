//! Static catalog of SQL query templates.
//!
//! Each template carries the SQL text with `{{token}}` / `{token}`
//! placeholders, keyword tags used for retrieval, and descriptive metadata.
//! The catalog is loaded once and never mutated by request handling.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateMetadata {
    pub metrics: Vec<String>,
    pub dimensions: Vec<String>,
    /// Descriptive only; presence is not enforced at generation time.
    pub required_params: Vec<String>,
    pub optional_params: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlTemplate {
    pub id: String,
    pub name: String,
    pub purpose: String,
    pub template: String,
    pub keywords: Vec<String>,
    pub metadata: TemplateMetadata,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn template(
    id: &str,
    name: &str,
    purpose: &str,
    template: &str,
    keywords: &[&str],
    metrics: &[&str],
    dimensions: &[&str],
    required_params: &[&str],
    optional_params: &[&str],
) -> SqlTemplate {
    SqlTemplate {
        id: id.to_string(),
        name: name.to_string(),
        purpose: purpose.to_string(),
        template: template.to_string(),
        keywords: strings(keywords),
        metadata: TemplateMetadata {
            metrics: strings(metrics),
            dimensions: strings(dimensions),
            required_params: strings(required_params),
            optional_params: strings(optional_params),
        },
    }
}

/// The full template catalog, in retrieval order.
pub fn templates() -> &'static [SqlTemplate] {
    &CATALOG
}

/// Looks up a template by its id.
pub fn template_by_id(id: &str) -> Option<&'static SqlTemplate> {
    CATALOG.iter().find(|t| t.id == id)
}

lazy_static! {
    static ref CATALOG: Vec<SqlTemplate> = build_catalog();
}

fn build_catalog() -> Vec<SqlTemplate> {
    vec![
        template(
            "performance_report",
            "Performance Report",
            "Performance report analytics",
            r#"select data_date as data_date,
    dim_lookup('campaigns_by_id', ad_info_campaign_id, 'name') as Campaign_Name,
    ad_info_campaign_id as Campaign_ID,
    dim_lookup('lineitems_by_id', ad_info_line_item_id, 'name') as LineItem_Name,
    ad_info_line_item_id as LineItem_ID,
    dim_lookup('tactics_by_id', ad_info_tactic_id, 'name') as Tactic_Name,
    ad_info_tactic_id as Tactic_ID,
    sum(adv_server_views) as Impressions,
    sum(IF(adv_clicks > 0, 1, 0)) as Clicks,
    sum(adv_conversions) as Conversions,
    sum(adv_conversions_view_through) as View_Thru_Conversions,
    sum(adv_conversions_click_through) as Click_Thru_Conversions,
    sum(adv_revenue) as Spend,
    sum(video_starts) as Video_Starts,
    sum(video_midpoint) as Video_Midpoint,
    sum(video_completes) as Video_Completes,
    sum(dsp_viewability_in_view) as In_View_Impressions,
    sum(dsp_viewability_measured) as Measured_Impressions,
    count(distinct user_id) as Unique_Reach
from dsp_campaign_reporting_mv
where data_date >= {{start_date}}
and data_date <= {{end_date}}
and ad_info_campaign_id in ({{campaign_id}})
group by data_date, ad_info_campaign_id, ad_info_line_item_id, ad_info_tactic_id"#,
            &["performance", "report", "impressions", "clicks", "conversions", "spend", "video", "reach"],
            &["impressions", "clicks", "conversions", "spend", "video_starts", "video_completes", "reach"],
            &["campaign", "line_item", "tactic", "date"],
            &["start_date", "end_date", "campaign_id"],
            &["line_item_id", "tactic_id"],
        ),
        template(
            "dma_analysis",
            "DMA Analysis",
            "DMA geographical analysis",
            r#"Create table {{temp_table}} as
SELECT
    dim_lookup("campaigns_by_id", ad_info_campaign_id, "name") as Campaign,
    ad_info_campaign_id as Campaign_ID,
    dim_lookup('lineitems_by_id', ad_info_line_item_id, 'name') as LineItem_Name,
    ad_info_line_item_id as LineItem_ID,
    dim_lookup('tactics_by_id', ad_info_tactic_id, 'name') as Tactic_Name,
    ad_info_tactic_id as Tactic_ID,
    geo_dma as dma,
    dim_lookup('dma_codes', geo_dma, 'metro_name') as DMA_name,
    SUM(adv_server_views) as Impressions,
    SUM(adv_clicks) as Clicks,
    SUM(adv_revenue) as Spend,
    SUM(adv_conversions) as Conversions,
    sum(dsp_client_revenue) as revenue
from dsp_campaign_reporting_mv
where data_date >= {{start_date}}
and data_date <= {{end_date}}
and ad_info_campaign_id IN ({{campaign_id}})
group by
    dim_lookup("campaigns_by_id", ad_info_campaign_id, "name"),
    ad_info_campaign_id,
    dim_lookup('lineitems_by_id', ad_info_line_item_id, 'name'),
    ad_info_line_item_id,
    dim_lookup('tactics_by_id', ad_info_tactic_id, 'name'),
    ad_info_tactic_id,
    geo_dma,
    dim_lookup('dma_codes', geo_dma, 'metro_name')"#,
            &["dma", "geography", "metro", "location", "geographical", "regional"],
            &["impressions", "clicks", "spend", "conversions", "revenue"],
            &["campaign", "dma", "geography"],
            &["start_date", "end_date", "campaign_id"],
            &["temp_table"],
        ),
        template(
            "frequency_lag",
            "Frequency Lag Analysis",
            "Frequency lag analysis",
            r#"-- Step 1: pull impression data
CREATE TABLE {{temp_table}}_impressions as
select bid_ip, server_timestamp as imp_stamp, ad_info_ad_instance_id
from dsp_campaign_reporting_mv
where ad_info_campaign_id in ({{campaign_id}})
and data_date between {{start_date}} and {{end_date}}

-- Step 2: pull pixel data
create table {{temp_table}}_pixels as
select ip, dim_lookup("actions_dim", conversion_action_version_id, "name") as pixel_name, min(server_timestamp) as conv_stamp
from actions
where conversion_action_id in ({{conversion_action_id}})
and data_date between '{{start_date}}' and '{{end_date}}'
and ads is not NULL
group by ip, dim_lookup("actions_dim", conversion_action_version_id, "name")

-- Step 3: Calculate frequency lag
create table {{temp_table}}_results as
select converter, pixel_name, first_touch_lag, last_touch_lag, impression_window, frequency_bucket, count(distinct bid_ip) as uniques
from (
select rtb.bid_ip,
    case when pix.ip is not null then 1 else 0 end as converter,
    pix.pixel_name as pixel_name,
    count(distinct rtb.ad_info_ad_instance_id) as frequency_bucket,
    datediff(from_unixtime(min(pix.conv_stamp), 'yyyy-MM-dd'), from_unixtime(min(rtb.imp_stamp), 'yyyy-MM-dd')) as first_touch_lag,
    datediff(from_unixtime(min(pix.conv_stamp), 'yyyy-MM-dd'), from_unixtime(max(rtb.imp_stamp), 'yyyy-MM-dd')) as last_touch_lag,
    datediff(from_unixtime(max(rtb.imp_stamp), 'yyyy-MM-dd'), from_unixtime(min(rtb.imp_stamp), 'yyyy-MM-dd')) as impression_window
from {{temp_table}}_impressions rtb
left join {{temp_table}}_pixels pix on rtb.bid_ip=pix.ip
where rtb.imp_stamp < pix.conv_stamp
group by rtb.bid_ip, case when pix.ip is not null then 1 else 0 end, pix.pixel_name
) a
group by converter, pixel_name, first_touch_lag, last_touch_lag, impression_window, frequency_bucket"#,
            &["frequency", "lag", "conversion", "touch", "attribution", "pixel"],
            &["frequency_bucket", "first_touch_lag", "last_touch_lag", "impression_window", "uniques"],
            &["converter", "pixel_name"],
            &["start_date", "end_date", "campaign_id", "conversion_action_id"],
            &["temp_table"],
        ),
        template(
            "reach_frequency",
            "Reach and Frequency",
            "Reach and frequency analysis",
            r#"create table {{temp_table}} as
with ranked_impressions as (
select
    data_date,
    ad_info_campaign_id,
    ad_info_line_item_id,
    ad_info_tactic_id,
    dim_lookup("campaigns_by_id", ad_info_campaign_id, "name") as campaign,
    dim_lookup('lineitems_by_id', ad_info_line_item_id, 'name') as line_item,
    dim_lookup('tactics_by_id', ad_info_tactic_id, 'name') as tactic,
    user_id,
    adv_server_views,
    row_number() over (partition by ad_info_campaign_id, user_id order by data_date) as user_rank
from dsp_campaign_reporting_mv
where data_date between {{start_date}} and {{end_date}}
and ad_info_campaign_id in ({{campaign_id}})
)
select
    data_date,
    ad_info_campaign_id,
    campaign,
    ad_info_line_item_id,
    line_item,
    ad_info_tactic_id,
    tactic,
    sum(adv_server_views) as impressions,
    count(distinct case when user_rank = 1 then user_id end) as reach
from ranked_impressions
group by data_date, ad_info_campaign_id, campaign, ad_info_line_item_id, line_item, ad_info_tactic_id, tactic"#,
            &["reach", "frequency", "unique", "users", "impression", "exposure"],
            &["impressions", "reach", "frequency"],
            &["date", "campaign"],
            &["start_date", "end_date", "campaign_id"],
            &["temp_table"],
        ),
        template(
            "devices_analysis",
            "Devices Analysis",
            "Device type and performance analysis",
            r#"Create table {{temp_table}} as
SELECT
    dim_lookup('campaigns_by_id', ad_info_campaign_id, 'name') as Campaign_Name,
    ad_info_campaign_id as Campaign_ID,
    dim_lookup('lineitems_by_id', ad_info_line_item_id, 'name') as LineItem_Name,
    ad_info_line_item_id as LineItem_ID,
    dim_lookup('tactics_by_id', ad_info_tactic_id, 'name') as Tactic_Name,
    ad_info_tactic_id as Tactic_ID,
    delivery_channel as delivery_channel,
    user_agent_info_device_type as device_type,
    user_agent_info_device as device,
    SUM(adv_server_views) as Impressions,
    SUM(video_starts) as Video_Starts,
    SUM(video_completes) as Completes,
    SUM(adv_clicks) as Clicks,
    SUM(adv_conversions) as Conversions,
    SUM(adv_revenue) as Spend,
    SUM(dsp_client_revenue) Revenue
FROM dsp_campaign_reporting_mv mv
WHERE data_date >= {{start_date}}
and data_date <= {{end_date}}
AND ad_info_campaign_id IN ({{campaign_id}})
GROUP BY
    dim_lookup('campaigns_by_id', ad_info_campaign_id, 'name'),
    ad_info_campaign_id,
    dim_lookup('lineitems_by_id', ad_info_line_item_id, 'name'),
    ad_info_line_item_id,
    dim_lookup('tactics_by_id', ad_info_tactic_id, 'name'),
    ad_info_tactic_id,
    delivery_channel,
    user_agent_info_device_type,
    user_agent_info_device"#,
            &["device", "mobile", "desktop", "tablet", "ctv", "tv", "delivery_channel"],
            &["impressions", "video_starts", "completes", "clicks", "conversions", "spend", "revenue"],
            &["delivery_channel", "device_type", "device"],
            &["start_date", "end_date", "campaign_id"],
            &["temp_table"],
        ),
        template(
            "omnichannel_lift",
            "Omnichannel Lift Analysis",
            "Omnichannel lift measurement",
            r#"-- Step 1: Pull metrics for CTV/OLV
create table temp_{{campaign_name}}_lift_CTV as
select
    bid_ip as ip,
    dim_lookup("campaigns_by_id", ad_info_campaign_id, "name") as campaign_name,
    sum(dsp_server_views) as impressions,
    sum(adv_revenue) as spend,
    sum(dsp_client_revenue) revenue,
    sum(adv_conversions) as conversions
from dsp_campaign_reporting_mv
where data_date between {{start_date}} and {{end_date}}
and ad_info_campaign_id in ({{campaign_id}})
group by bid_ip, dim_lookup("campaigns_by_id", ad_info_campaign_id, "name")

-- Step 2: Pull metrics for Display/OLV
create table temp_{{campaign_name}}_lift_display as
SELECT
    bid_ip as ip,
    user_id as user_id,
    dim_lookup("campaigns_by_id", ad_info_campaign_id, "name") as campaign_name,
    sum(dsp_server_views) as impressions,
    sum(dsp_clicks) as clicks,
    sum(adv_revenue) as spend,
    sum(dsp_client_revenue) revenue,
    sum(adv_conversions) as conversions
from dsp_campaign_reporting_mv
where data_date between {{start_date}} and {{end_date}}
and ad_info_campaign_id in ({{campaign_id}})
group by bid_ip, user_id, dim_lookup("campaigns_by_id", ad_info_campaign_id, "name")"#,
            &["omnichannel", "lift", "ctv", "display", "cross", "channel", "overlap"],
            &["impressions", "clicks", "spend", "conversions", "revenue"],
            &["campaign", "ip", "user_id"],
            &["start_date", "end_date", "campaign_id", "campaign_name"],
            &["temp_table"],
        ),
        template(
            "site_app_analysis",
            "Site and App Analysis",
            "Site and app performance breakdown",
            r#"Create table {{temp_table}} as
SELECT
    dim_lookup("campaigns_by_id", ad_info_campaign_id, "name") as Campaign,
    dim_lookup("lineitems_by_id", ad_info_line_item_id, "name") as Line_Item,
    dim_lookup("tactics_by_id", ad_info_tactic_id, "name") as Tactic,
    dim_lookup_new('accounts', exchange_id, 'name') as exchange_name,
    exchange_id as exchange_id,
    get_json_object(mobile_attributes_raw_value, '$.name') as app_name,
    get_json_object(mobile_attributes_raw_value, '$.id') as APP_ID,
    get_json_object(mobile_attributes_raw_value, '$.bundle') as bundle_id,
    site as site,
    SUM(adv_server_views) as Impressions,
    SUM(video_starts) as Video_Starts,
    SUM(video_completes) as Completes,
    SUM(adv_clicks) as Clicks,
    SUM(adv_conversions) as Conversions,
    SUM(adv_revenue) as Spend,
    SUM(dsp_client_revenue) Revenue
FROM dsp_campaign_reporting_mv mv
WHERE data_date >= {{start_date}} and data_date <= {{end_date}}
AND ad_info_campaign_id IN ({{campaign_id}})
GROUP BY dim_lookup("campaigns_by_id", ad_info_campaign_id, "name"),
    dim_lookup("lineitems_by_id", ad_info_line_item_id, "name"),
    dim_lookup("tactics_by_id", ad_info_tactic_id, "name"),
    dim_lookup_new('accounts', exchange_id, 'name'),
    exchange_id, get_json_object(mobile_attributes_raw_value, '$.name'),
    get_json_object(mobile_attributes_raw_value, '$.bundle'),
    get_json_object(mobile_attributes_raw_value, '$.id'), site"#,
            &["site", "app", "publisher", "exchange", "placement", "inventory"],
            &["impressions", "video_starts", "completes", "clicks", "conversions", "spend", "revenue"],
            &["campaign", "line_item", "tactic", "exchange", "app", "site"],
            &["start_date", "end_date", "campaign_id"],
            &["temp_table"],
        ),
        template(
            "audience_insights",
            "Audience Insights",
            "Audience segment performance analysis",
            r#"create table {{temp_table}} as
Select
    b.path as path,
    b.segment_name as segment_name,
    a.ad_info_campaign_id,
    sum(a.clicks) as clicks,
    sum(a.Impressions) as Impressions,
    sum(a.conversions) as conversions,
    sum(completes) as completes
from
    (
select
    sum(adv_server_views) as Impressions,
    sum(adv_clicks) as clicks,
    sum(adv_conversions) as conversions,
    sum(video_completes) as completes,
    ad_info_campaign_id,
    user_id
from dsp_campaign_reporting_mv
where ad_info_campaign_id in ({{campaign_id}})
and data_date between {{start_date}} and {{end_date}}
group by user_id, ad_info_campaign_id) a
join
    (
select seg_path as path, user_id as user_id, name as segment_name
from zeta_segments
where data_date between {{start_date}} and {{end_date}}
group by seg_path, user_id, name) b
on a.user_id = b.user_id
group by b.path, b.segment_name, a.ad_info_campaign_id"#,
            &["audience", "segment", "demographic", "interest", "targeting", "persona"],
            &["impressions", "clicks", "conversions", "completes"],
            &["segment", "path", "campaign"],
            &["start_date", "end_date", "campaign_id"],
            &["temp_table"],
        ),
        template(
            "top_creatives",
            "Top Creatives Analysis",
            "Creative performance ranking",
            r#"Create table {{temp_table}} as
SELECT ad_info_ad_id as ad_id,
    dim_lookup('ads_by_id', ad_info_ad_id, 'name') as creative_name,
    dim_lookup("campaigns_by_id", ad_info_campaign_id, "name") as Campaign,
    SUM(dsp_server_views) as Impressions,
    SUM(dsp_clicks) as Clicks,
    SUM(dsp_conversions) as Conversions,
    SUM(video_completes) as completes
from dsp_campaign_reporting_mv
where data_date >= {{start_date}} and data_date <= {{end_date}}
and ad_info_campaign_id IN ({{campaign_id}})
group by ad_info_ad_id, dim_lookup('ads_by_id', ad_info_ad_id, 'name'), dim_lookup("campaigns_by_id", ad_info_campaign_id, "name")"#,
            &["creative", "ad", "top", "performing", "best", "ranking"],
            &["impressions", "clicks", "conversions", "completes"],
            &["ad_id", "creative_name", "campaign"],
            &["start_date", "end_date", "campaign_id"],
            &["temp_table"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_is_nonempty_and_ids_are_unique() {
        let catalog = templates();
        assert!(catalog.len() >= 9);
        let mut ids: Vec<&str> = catalog.iter().map(|t| t.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), catalog.len());
    }

    #[test]
    fn lookup_by_id() {
        assert!(template_by_id("devices_analysis").is_some());
        assert!(template_by_id("nope").is_none());
    }
}

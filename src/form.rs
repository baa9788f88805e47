//! Structured (form-driven) query generation.
//!
//! Unlike the text pipeline, form requests arrive with every field already
//! decided: analysis types, grouping level, entity filter, and an absolute
//! date range. Each analysis type maps to a dedicated builder; multiple
//! selections are joined with a visible delimiter so the output can be
//! split back into individual statements.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Separator placed between queries when several analysis types are
/// requested at once.
pub const NEXT_QUERY_DELIMITER: &str = "\n\n-- ====== Next Query ======\n\n";

/// Grouping level for form queries. Levels are cumulative: `LineItem`
/// includes campaign columns, `Tactic` includes both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormGranularity {
    Campaign,
    #[serde(rename = "Line_Item")]
    LineItem,
    Tactic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdFieldType {
    CampaignId,
    LineItemId,
    TacticId,
    /// No entity filter at all.
    All,
}

impl IdFieldType {
    fn column(&self) -> Option<&'static str> {
        match self {
            IdFieldType::CampaignId => Some("ad_info_campaign_id"),
            IdFieldType::LineItemId => Some("ad_info_line_item_id"),
            IdFieldType::TacticId => Some("ad_info_tactic_id"),
            IdFieldType::All => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdField {
    #[serde(rename = "type")]
    pub kind: IdFieldType,
    /// Comma-separated id list, pasted into the IN (...) clause verbatim.
    pub value: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FormDateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// "CTV" or "Display". CTV joins on ip, everything else on user id.
    #[serde(rename = "type")]
    pub channel_type: String,
    pub ids: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OmnichannelConfig {
    pub channel1: ChannelConfig,
    pub channel2: ChannelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormRequest {
    pub analysis_types: Vec<String>,
    pub granularity: FormGranularity,
    pub id_field: IdField,
    #[serde(default)]
    pub conversion_action_id: Option<String>,
    #[serde(default)]
    pub pixel_id: Option<String>,
    pub date_range: FormDateRange,
    #[serde(default)]
    pub omnichannel_config: Option<OmnichannelConfig>,
}

impl FormRequest {
    fn pixel_or_action(&self) -> &str {
        self.pixel_id
            .as_deref()
            .filter(|v| !v.is_empty())
            .or(self.conversion_action_id.as_deref())
            .unwrap_or("")
    }

    fn action_id(&self) -> &str {
        self.conversion_action_id.as_deref().unwrap_or("")
    }
}

/// Builds one SQL script per requested analysis type and joins them with
/// [`NEXT_QUERY_DELIMITER`].
pub fn generate(request: &FormRequest) -> String {
    let queries: Vec<String> = request
        .analysis_types
        .iter()
        .map(|analysis_type| build_query(analysis_type, request))
        .collect();
    queries.join(NEXT_QUERY_DELIMITER)
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

fn where_clause(id_field: &IdField) -> String {
    match id_field.kind.column() {
        Some(column) => format!("and {} in ({})", column, id_field.value),
        None => String::new(),
    }
}

/// Filter against the actions table, where entity ids live in the
/// ad_info array rather than named columns. Returns a bare predicate;
/// callers prepend "and" when the clause is not the first condition.
fn actions_filter(id_field: &IdField) -> String {
    let column = match id_field.kind {
        IdFieldType::LineItemId => "ad_info[5]",
        IdFieldType::TacticId => "ad_info[1]",
        IdFieldType::CampaignId | IdFieldType::All => "ad_info[2]",
    };
    format!("{} in ({})", column, id_field.value)
}

/// Conversion rows expose ids through the ads array. Campaign ids need a
/// dimension lookup because ads[3] holds the campaign version id.
fn conversion_ads_filter(id_field: &IdField) -> String {
    let column = match id_field.kind {
        IdFieldType::LineItemId => "ads[5]",
        IdFieldType::TacticId => "ads[1]",
        IdFieldType::CampaignId | IdFieldType::All => {
            r#"dim_lookup("campaigns", ads[3], "campaign_id")"#
        }
    };
    format!("and {} in ({})", column, id_field.value)
}

/// Filter for the modeling table, which carries plain id columns.
fn modeling_filter(id_field: &IdField) -> String {
    let column = match id_field.kind {
        IdFieldType::LineItemId => "line_item_id",
        IdFieldType::TacticId => "tactic_id",
        IdFieldType::CampaignId | IdFieldType::All => "campaign_id",
    };
    format!("{} in ({})", column, id_field.value)
}

/// Entity columns for the SELECT list, widening with the grouping level.
fn select_columns(granularity: FormGranularity) -> String {
    let mut columns = String::from(
        "dim_lookup('campaigns_by_id', ad_info_campaign_id, 'name') as Campaign,\n    ad_info_campaign_id as Campaign_ID",
    );
    if matches!(granularity, FormGranularity::LineItem | FormGranularity::Tactic) {
        columns.push_str(
            ",\n    dim_lookup('lineitems_by_id', ad_info_line_item_id, 'name') as line_item,\n    ad_info_line_item_id as LineItem_ID",
        );
    }
    if granularity == FormGranularity::Tactic {
        columns.push_str(
            ",\n    dim_lookup('tactics_by_id', ad_info_tactic_id, 'name') as tactic,\n    ad_info_tactic_id as Tactic_ID",
        );
    }
    columns
}

fn group_by_columns(granularity: FormGranularity) -> String {
    let mut columns = String::from(
        "dim_lookup('campaigns_by_id', ad_info_campaign_id, 'name'),\n    ad_info_campaign_id",
    );
    if matches!(granularity, FormGranularity::LineItem | FormGranularity::Tactic) {
        columns.push_str(
            ",\n    dim_lookup('lineitems_by_id', ad_info_line_item_id, 'name'),\n    ad_info_line_item_id",
        );
    }
    if granularity == FormGranularity::Tactic {
        columns.push_str(
            ",\n    dim_lookup('tactics_by_id', ad_info_tactic_id, 'name'),\n    ad_info_tactic_id",
        );
    }
    columns
}

fn build_query(analysis_type: &str, request: &FormRequest) -> String {
    let start = format_date(request.date_range.from);
    let end = format_date(request.date_range.to);
    let filter = where_clause(&request.id_field);
    let select = select_columns(request.granularity);
    let group_by = group_by_columns(request.granularity);

    match analysis_type {
        "performance_report" => performance_report(&start, &end, &filter, &select, &group_by),
        "dma" => dma(&start, &end, &filter, &select, &group_by),
        "devices" => devices(&start, &end, &filter),
        "reach_frequency" => reach_frequency(&start, &end, &filter),
        "site_app" => site_app(&start, &end, &filter, &select, &group_by),
        "top_creatives" => top_creatives(&start, &end, &filter, &select, &group_by),
        "top_genre" => top_genre(&start, &end, &filter, &select, &group_by),
        "frequency_lag" => frequency_lag(&start, &end, &filter, request.pixel_or_action()),
        "audience_insights" => audience_insights(&start, &end, &filter),
        "audience_segments" => audience_segments(&start, &end, &request.id_field),
        "omnichannel_lift" => omnichannel_lift(&start, &end, request),
        "path_to_click" => path_to_click(&start, &end, &filter),
        "path_to_conversion" => {
            path_to_conversion(&start, &end, &filter, request.action_id(), &request.id_field)
        }
        "survey" => survey(&start, &end, request.action_id()),
        "time_day_week" => time_day_week(&start, &end, &filter),
        "website_analysis" => website_analysis(&start, &end, request.action_id(), &request.id_field),
        "website_visitor_insights" => {
            website_visitor_insights(&start, &end, request.pixel_or_action(), &request.id_field)
        }
        "click_lag" => click_lag(&start, &end, &filter),
        "prospect_retargeting" => prospect_retargeting(&start, &end, &request.id_field),
        "ctv_attributes" => {
            ctv_attributes(&start, &end, &filter, &select, &group_by, request.action_id())
        }
        other => {
            warn!(analysis_type = %other, "no form template for analysis type");
            format!("-- Query template not found for: {}", other)
        }
    }
}

fn performance_report(
    start: &str,
    end: &str,
    filter: &str,
    select: &str,
    group_by: &str,
) -> String {
    format!(
        r#"-- Performance Report Analysis
Create table temp_performance_report as
select data_date as data_date,
    {select},
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
    count(distinct user_id) as Unique_Reach,
    geo_country_code as Country,
    geo_state_code as State,
    geo_city_code as City,
    geo_zip_code as Zip_Code,
    geo_dma as DMA_Code,
    geo_congressional_district as Congressional_District,
    user_agent_info_device_type as Device_Type,
    user_agent_info_device as Device,
    user_agent_info_os as Operating_System,
    user_agent_info_browser as Browser,
    video_player_size as Player_Size,
    mobile_attributes_genre as Genre,
    mobile_attributes_livestream as Livestream,
    case when exchange_id = 7115 then get_json_object(get_json_object(mobile_attributes_raw_value, "$.content"), "$.id") else get_json_object(get_json_object(mobile_attributes_raw_value, "$.content"), "$.series") end as Content,
    video_content_duration as Content_Duration,
    exchange_id as Publisher_ID,
    dim_lookup_new('accounts', exchange_id, 'name') as Publisher,
    mobile_attributes_app_name as App,
    mobile_attributes_app_id as App_ID,
    get_json_object(mobile_attributes_raw_value, '$.bundle') as Bundle_ID,
    deal_id as Deal_ID,
    site as Site
from dsp_campaign_reporting_mv
where data_date >= {start}
and data_date <= {end}
{filter}
group by data_date,
    {group_by},
    geo_country_code,
    geo_state_code,
    geo_city_code,
    geo_zip_code,
    geo_dma,
    geo_congressional_district,
    user_agent_info_device_type,
    user_agent_info_device,
    user_agent_info_os,
    user_agent_info_browser,
    video_player_size,
    mobile_attributes_genre,
    mobile_attributes_livestream,
    case when exchange_id = 7115 then get_json_object(get_json_object(mobile_attributes_raw_value, "$.content"), "$.id") else get_json_object(get_json_object(mobile_attributes_raw_value, "$.content"), "$.series") end,
    video_content_duration,
    exchange_id,
    dim_lookup_new('accounts', exchange_id, 'name'),
    mobile_attributes_app_name,
    mobile_attributes_app_id,
    get_json_object(mobile_attributes_raw_value, '$.bundle'),
    deal_id,
    site"#,
    )
}

fn dma(start: &str, end: &str, filter: &str, select: &str, group_by: &str) -> String {
    format!(
        r#"-- DMA Analysis
Create table temp_dma_analysis as
SELECT
    {select},
    geo_dma as dma,
    dim_lookup('dma_codes', geo_dma, 'metro_name') as DMA_name,
    SUM(adv_server_views) as Impressions,
    SUM(adv_clicks) as Clicks,
    SUM(adv_revenue) as Spend,
    SUM(adv_conversions) as Conversions,
    sum(dsp_client_revenue) as revenue
from dsp_campaign_reporting_mv
where data_date >= {start}
and data_date <= {end}
{filter}
group by
    {group_by},
    geo_dma,
    dim_lookup('dma_codes', geo_dma, 'metro_name')"#,
    )
}

fn devices(start: &str, end: &str, filter: &str) -> String {
    format!(
        r#"-- Devices Analysis
Create table temp_devices as
SELECT
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
WHERE data_date >= {start}
and data_date <= {end}
{filter}
GROUP BY delivery_channel, user_agent_info_device_type, user_agent_info_device"#,
    )
}

fn reach_frequency(start: &str, end: &str, filter: &str) -> String {
    format!(
        r#"-- Reach and Frequency Analysis
create table temp_reach_frequency as
with ranked_impressions as (
select
    data_date,
    ad_info_campaign_id,
    dim_lookup("campaigns_by_id", ad_info_campaign_id, "name") as campaign,
    user_id,
    adv_server_views,
    row_number() over (partition by ad_info_campaign_id, user_id order by data_date) as user_rank
from dsp_campaign_reporting_mv
where data_date between {start} and {end}
{filter}
)
select
    data_date,
    ad_info_campaign_id,
    campaign,
    sum(adv_server_views) as impressions,
    count(distinct case when user_rank = 1 then user_id end) as reach
from ranked_impressions
group by data_date, ad_info_campaign_id, campaign"#,
    )
}

fn site_app(start: &str, end: &str, filter: &str, select: &str, group_by: &str) -> String {
    format!(
        r#"-- Site and App Analysis
Create table temp_site_app as
SELECT
    {select},
    dim_lookup("ads_by_id", ad_info_ad_id, "name") as Creative_Name,
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
WHERE data_date >= {start}
and data_date <= {end}
{filter}
GROUP BY {group_by},
    dim_lookup("ads_by_id", ad_info_ad_id, "name"),
    dim_lookup_new('accounts', exchange_id, 'name'),
    exchange_id,
    get_json_object(mobile_attributes_raw_value, '$.name'),
    get_json_object(mobile_attributes_raw_value, '$.bundle'),
    get_json_object(mobile_attributes_raw_value, '$.id'),
    site"#,
    )
}

fn top_creatives(start: &str, end: &str, filter: &str, select: &str, group_by: &str) -> String {
    format!(
        r#"-- Top Creatives Analysis
Create table temp_top_creatives as
SELECT ad_info_ad_id as ad_id,
    dim_lookup('ads_by_id', ad_info_ad_id, 'name') as creative_name,
    {select},
    SUM(dsp_server_views) as Impressions,
    SUM(dsp_clicks) as Clicks,
    SUM(dsp_conversions) as Conversions,
    SUM(video_completes) as completes
from dsp_campaign_reporting_mv
where data_date >= {start}
and data_date <= {end}
{filter}
group by ad_info_ad_id,
    dim_lookup('ads_by_id', ad_info_ad_id, 'name'),
    {group_by}"#,
    )
}

fn top_genre(start: &str, end: &str, filter: &str, select: &str, group_by: &str) -> String {
    format!(
        r#"-- Top Genre Analysis
Create table temp_top_genre as
SELECT
    {select},
    mobile_attributes_genre as Genre,
    SUM(adv_server_views) as Impressions,
    SUM(dsp_clicks) as Clicks,
    SUM(dsp_conversions) as Conversions,
    SUM(video_completes) as completes
from dsp_campaign_reporting_mv
where data_date >= {start}
and data_date <= {end}
{filter}
group by {group_by},
    mobile_attributes_genre"#,
    )
}

fn frequency_lag(start: &str, end: &str, filter: &str, action_id: &str) -> String {
    format!(
        r#"-- Frequency Lag Analysis
-- Step 1: pull impression data for each date range
CREATE TABLE temp_impression_data as
select bid_ip,
    server_timestamp as imp_stamp,
    ad_info_ad_instance_id
from dsp_campaign_reporting_mv
where data_date between {start} and {end}
{filter};

-- Step 2: pull pixel data for each date range
create table temp_pixel_data as
select ip,
    dim_lookup("actions_dim", conversion_action_version_id, "name") as pixel_name,
    min(server_timestamp) as conv_stamp
from actions
where conversion_action_id in ({action_id})
and data_date between '{start}' and '{end}'
and ads is not NULL
group by ip, dim_lookup("actions_dim", conversion_action_version_id, "name");

-- Step 3: Pull Frequency lag data
create table temp_frequency_lag as
select converter,
    pixel_name,
    first_touch_lag,
    last_touch_lag,
    impression_window,
    frequency_bucket,
    count(distinct bid_ip) as uniques
from (
select rtb.bid_ip,
    case when pix.ip is not null then 1 else 0 end as converter,
    pix.pixel_name as pixel_name,
    count(distinct rtb.ad_info_ad_instance_id) as frequency_bucket,
    datediff(from_unixtime(min(pix.conv_stamp), 'yyyy-MM-dd'), from_unixtime(min(rtb.imp_stamp), 'yyyy-MM-dd')) as first_touch_lag,
    datediff(from_unixtime(min(pix.conv_stamp), 'yyyy-MM-dd'), from_unixtime(max(rtb.imp_stamp), 'yyyy-MM-dd')) as last_touch_lag,
    datediff(from_unixtime(max(rtb.imp_stamp), 'yyyy-MM-dd'), from_unixtime(min(rtb.imp_stamp), 'yyyy-MM-dd')) as impression_window
from temp_impression_data rtb
left join temp_pixel_data pix on rtb.bid_ip=pix.ip
where rtb.imp_stamp < pix.conv_stamp
group by rtb.bid_ip,
    case when pix.ip is not null then 1 else 0 end,
    pix.pixel_name ) a
group by converter,
    pixel_name,
    first_touch_lag,
    last_touch_lag,
    impression_window,
    frequency_bucket"#,
    )
}

fn audience_insights(start: &str, end: &str, filter: &str) -> String {
    format!(
        r#"-- Audience Insights Analysis
create table temp_audience_insights as
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
where data_date between {start} and {end}
{filter}
group by user_id, ad_info_campaign_id) a
join
    (
select seg_path as path,
    user_id as user_id,
    name as segment_name
from zeta_segments
where data_date between {start} and {end}
group by seg_path, user_id, name) b
on a.user_id = b.user_id
group by b.path, b.segment_name, a.ad_info_campaign_id"#,
    )
}

fn audience_segments(start: &str, end: &str, id_field: &IdField) -> String {
    let modeling = modeling_filter(id_field);
    let video = actions_filter(id_field);
    format!(
        r#"-- Audience Segments Delivery
create table temp_audience_segments as
SELECT
    b.delivery_month,
    b.campaign,
    b.line,
    b.tactic,
    a.id as segment_id,
    a.name as audience_segment,
    sum(b.impressions) as impressions,
    sum(b.clicks) as clicks,
    sum(b.starts) as starts,
    sum(b.completes) as completes,
    sum(b.conversions) as conversions,
    sum(b.spend) as spend,
    sum(b.revenue) as revenue,
    (SUM(b.clicks)/NULLIF(SUM(b.impressions), 0))*100 as CTR,
    case when SUM(b.conversions) = 0 then null else SUM(b.spend)/SUM(b.conversions) end as CPA,
    case when SUM(b.spend) = 0 then null else SUM(b.revenue)/SUM(b.spend) end as roas,
    (SUM(b.completes)/NULLIF(SUM(b.starts), 0))*100 as vcr
FROM (
    SELECT
        m.thirdparty_data_cost,
        m.segment_id as segment_id,
        m.data_date,
        m.campaign,
        m.delivery_month,
        m.line,
        m.tactic,
        sum(m.spend) as spend,
        sum(m.rfi_client_revenue) as revenue,
        sum(m.impressions) as impressions,
        sum(m.clicks) as clicks,
        sum(m.conversions) as conversions,
        sum(v.starts) as starts,
        sum(v.completes) as completes
    FROM (
        SELECT
            ad_instance_id as user_id,
            data_date,
            from_unixtime(server_timestamp, 'MM') as delivery_month,
            thirdparty_data_cost as thirdparty_data_cost,
            split(segment, '_')[1] as segment_id,
            dim_lookup('campaigns_by_id', ad_info[2], 'name') as campaign,
            dim_lookup('lineitems_by_id', ad_info[3], 'name') as line,
            dim_lookup('tactics_by_id', ad_info[1], 'name') as tactic,
            adv_revenue as spend,
            rfi_client_revenue as rfi_client_revenue,
            views as impressions,
            clicks as clicks,
            rfi_conversions as conversions
        from modeling_rtb_mv lateral view explode(split(thirdparty_data_cost, ',')) seg as segment
        where {modeling}
        and data_date >= {start}
        and data_date <= {end}
    ) m
    LEFT JOIN (
        SELECT
            ads[4] as user_id,
            SUM(IF(event_counts[3] > 0, 1, 0)) as starts,
            SUM(IF(event_counts[7] > 0, 1, 0)) as completes
        from video_impression
        where data_date >= {start}
        and data_date <= {end}
        and {video}
        group by ads[4]
    ) v
    ON v.user_id = m.user_id
    group by
        m.thirdparty_data_cost,
        m.segment_id,
        m.data_date,
        m.delivery_month,
        m.campaign,
        m.line,
        m.tactic
) b
LEFT JOIN audiences a
ON b.segment_id = a.id
group by
    b.delivery_month,
    b.campaign,
    b.line,
    b.tactic,
    a.id,
    a.name"#,
    )
}

fn path_to_click(start: &str, end: &str, filter: &str) -> String {
    format!(
        r#"-- Path to Click Analysis
-- Step 1: get impressions data
Create table temp_impression_path as
select distinct
    user_id,
    first_value(impression_channel) over (partition by user_id order by server_timestamp) as first_impression_channel
FROM
    (
Select distinct user_id,
    CASE when ad_info_line_item_id in (lineitem_ids) then 'Video'
    when ad_info_line_item_id IN (lineitem_ids) THEN 'Display Mobile' else 'B2P' end as Impression_Channel,
    server_timestamp
from dsp_campaign_reporting_mv
where data_date >= {start}
and data_date <= {end}
{filter}
and ad_info_line_item_id in (lineitem_ids) ) a;

-- Step 2: get click data
Create table temp_click_path as
select distinct
    user_id,
    first_value(click_channel) over (partition by user_id order by click_server_timestamp) as first_click_channel
FROM
    (
Select distinct user_id,
    CASE when ad_info_line_item_id in (lineitem_ids) then 'Video'
    when ad_info_line_item_id IN (lineitem_ids) THEN 'Display Mobile' else 'B2P' end as click_Channel,
    click_server_timestamp
from dsp_campaign_reporting_mv
where adv_clicks > 0
and data_date >= {start}
and data_date <= {end}
{filter}
and ad_info_line_item_id in (lineitem_ids) ) a;

-- Step 3: join impressions and clicks
Create table temp_impression_click_path as
Select distinct i.user_id,
    i.first_impression_channel as first_impression_channel,
    c.first_click_channel as first_click_channel
from temp_impression_path i
Inner join temp_click_path c
on i.user_id = c.user_id;

-- Step 4: aggregate pathway analysis
select
    CASE
    when first_impression_channel in ('Display Mobile')
and First_click_channel in ('Display Mobile') then 'Display to Display'
    when first_impression_channel in ('Display Mobile')
and first_click_channel in ('Video') then 'Display to Video'
    when first_impression_channel in ('Video')
and first_click_channel in ('Video') then 'Video to Video'
    when first_impression_channel in ('Video')
and first_click_channel in ('Display Mobile') then 'Video to Display'
    end as pathway,
    count(user_id)
from temp_impression_click_path
group by
    CASE
    when first_impression_channel in ('Display Mobile')
and first_click_channel in ('Display Mobile') then 'Display to Display'
    when first_impression_channel in ('Display Mobile')
and first_click_channel in ('Video') then 'Display to Video'
    when first_impression_channel in ('Video')
and first_click_channel in ('Video') then 'Video to Video'
    when first_impression_channel in ('Video')
and first_click_channel in ('Display Mobile') then 'Video to Display'
    end"#,
    )
}

fn path_to_conversion(
    start: &str,
    end: &str,
    filter: &str,
    action_id: &str,
    id_field: &IdField,
) -> String {
    let ads_filter = conversion_ads_filter(id_field);
    format!(
        r#"-- Path to Conversion Analysis
-- Step 1: create impressions base table
CREATE TABLE temp_impressions_base as
select
    ad_info_ad_instance_id as unique_user_id,
    bid_ip as ip,
    user_id as user_id,
    data_date,
    server_timestamp,
    from_unixtime(server_timestamp, 'yyyyMMdd HH:mm:ss') as time_stamp,
    ad_info_campaign_id as campaign_id,
    dim_lookup('campaigns_by_id', ad_info_campaign_id, 'name') as campaign,
    ad_info_line_item_id as line_item_id,
    dim_lookup('lineitems_by_id', ad_info_line_item_id, 'name') as line_item,
    user_agent_info_device_type as user_agent_device_type,
    user_agent_info_device as device,
    sum(adv_server_views) as impressions,
    sum(video_starts) as starts,
    sum(video_completes) as completes,
    sum(adv_revenue) as spend
FROM dsp_campaign_reporting_mv
WHERE data_date >= '{start}'
AND data_date <='{end}'
{filter}
GROUP BY ad_info_ad_instance_id, bid_ip, user_id, data_date, server_timestamp, from_unixtime(server_timestamp, 'yyyyMMdd HH:mm:ss'), ad_info_campaign_id, dim_lookup('campaigns_by_id', ad_info_campaign_id, 'name'), ad_info_line_item_id, dim_lookup('lineitems_by_id', ad_info_line_item_id, 'name'), user_agent_info_device_type, user_agent_info_device;

-- Step 2: order min impression date
CREATE TABLE temp_ordered_impressions as
SELECT
    user_id,
    ip,
    rn,
    unique_user_id,
    data_date,
    server_timestamp,
    time_stamp,
    campaign,
    campaign_id,
    line_item,
    line_item_id,
    user_agent_device_type,
    device,
    SUM(impressions) as impressions,
    sum(starts) as starts,
    sum(completes) as completes,
    sum(spend) as spend
FROM
    (
    SELECT
        ROW_NUMBER() OVER(PARTITION BY user_id ORDER BY time_stamp) AS rn,
        unique_user_id,
        ip,
        user_id,
        data_date,
        server_timestamp,
        time_stamp,
        campaign_id,
        campaign,
        line_item_id,
        line_item,
        user_agent_device_type,
        device,
        SUM(impressions) as impressions,
        sum(starts) as starts,
        sum(completes) as completes,
        sum(spend) as spend
    FROM temp_impressions_base
    GROUP BY unique_user_id, ip, user_id, data_date, server_timestamp, time_stamp, campaign_id, campaign, line_item_id, line_item, user_agent_device_type, device
    ) a
WHERE rn = 1
GROUP BY user_id, ip, rn, unique_user_id, data_date, server_timestamp, time_stamp, campaign, campaign_id, line_item, line_item_id, user_agent_device_type, device;

-- Step 3: create conversions base table
CREATE TABLE temp_conversions_base as
select
    ads[4] as ad_instance_id,
    user_id as user_id,
    ip as ip,
    data_date,
    server_timestamp,
    from_unixtime(server_timestamp, 'yyyyMMdd HH:mm:ss') as time_stamp,
    from_unixtime(server_timestamp, 'kk:00:00 a') as conv_TOD,
    from_unixtime(server_timestamp, 'E')as conv_DOW,
    dim_lookup("campaigns", ads[3], "name") as campaign_name,
    dim_lookup("lineitems", ads[5], "name") as lineitem_name,
    parse_user_agent(user_agent, "DEVICE_TYPE") as user_agent_device_type,
    parse_user_agent(user_agent, "DEVICE") as device,
    dim_lookup("actions_dim", conversion_action_version_id, "name") as pixel_name,
    sum(case when is_click_through>0
and conversion_action_id = {action_id} then 1 else 0 end)+sum(case when is_click_through=0
and conversion_action_id = {action_id} then 1 else 0 end)
    as Total_Conv
from actions
where conversion_action_id in ({action_id})
{ads_filter}
and data_date >= {start}
and data_date <= {end}
group by ads[4], user_id, ip, data_date, server_timestamp, from_unixtime(server_timestamp, 'yyyyMMdd HH:mm:ss'), from_unixtime(server_timestamp, 'kk:00:00 a'), from_unixtime(server_timestamp, 'E'), dim_lookup("campaigns", ads[3], "name"), dim_lookup("lineitems", ads[5], "name"), parse_user_agent(user_agent, "DEVICE_TYPE"), parse_user_agent(user_agent, "DEVICE"), dim_lookup("actions_dim", conversion_action_version_id, "name");

-- Step 4: order min conversion date
CREATE TABLE temp_ordered_conversions as
select
    ad_instance_id as ad_instance_id,
    user_id as user_id,
    ip as ip,
    min(data_date) as min_data_date,
    min(server_timestamp) as min_server_timestamp,
    min(time_stamp) as min_time_stamp,
    min(conv_DOW) as min_conv_DOW,
    min(conv_TOD) as min_conv_TOD,
    campaign_name as campaign_name,
    lineitem_name as lineitem_name,
    user_agent_device_type as channel,
    device as device,
    pixel_name as pixel_name,
    sum(Total_Conv) as Total_Conv
from temp_conversions_base
group by ad_instance_id, user_id, ip, campaign_name, lineitem_name, user_agent_device_type, device, pixel_name;

-- Step 5: match and get conversion paths
CREATE TABLE temp_conversion_paths as
SELECT
    m.campaign as imp_campaign_name,
    m.line_item as imp_lineitem_name,
    m.rn as rn,
    m.data_date as imp_min_data_date,
    m.time_stamp as imp_min_time_stamp,
    m.user_agent_device_type as imp_channel,
    m.device as imp_device,
    sum(m.impressions) as impressions,
    a.campaign_name as conv_campaign_name,
    a.lineitem_name as conv_lineitem_name,
    a.min_data_date as conv_min_data_date,
    a.min_time_stamp as conv_min_time_stamp,
    a.channel as conv_channel,
    a.device as conv_device,
    sum(a.Total_Conv) as Total_Conv
FROM temp_ordered_impressions m
LEFT JOIN temp_ordered_conversions a
ON a.user_id=m.user_id
group by m.campaign, m.line_item, a.campaign_name, a.lineitem_name, m.rn, m.data_date, m.time_stamp, m.user_agent_device_type, m.device, a.min_data_date, a.min_time_stamp, a.channel, a.device"#,
    )
}

fn survey(start: &str, end: &str, action_id: &str) -> String {
    format!(
        r#"-- Survey Query Analysis
create table temp_survey_analysis as
select user_id,
    data_date as date_date,
    media_type as media_type,
    dim_lookup('tactics', ads[2], 'name') as tactics,
    dim_lookup('lineitems', ads[5], 'name') as line,
    dim_lookup('campaigns', ads[3], 'name') as cid,
    dim_lookup('actions_dim', conversion_action_version_id, 'name') as response,
    dim_lookup('dma_codes', dma_code, 'metro_name') as DMA,
    ip_lookup(ip, 'STATE') as state,
    ip_lookup(IP, 'POSTAL_CODE') as ZipCode,
    count(*) as fires
from actions
where data_date between {start} and {end}
and dim_lookup('actions_dim', conversion_action_version_id, 'action_id') IN ({action_id})
group by user_id, data_date, media_type, dim_lookup('tactics', ads[2], 'name'), dim_lookup('lineitems', ads[5], 'name'), dim_lookup('actions_dim', conversion_action_version_id, 'name'), dim_lookup('campaigns', ads[3], 'name'), dim_lookup('dma_codes', dma_code, 'metro_name'), ip_lookup(ip, 'STATE'), ip_lookup(IP, 'POSTAL_CODE');

select * from temp_survey_analysis"#,
    )
}

fn time_day_week(start: &str, end: &str, filter: &str) -> String {
    format!(
        r#"-- Time of Day and Day of Week Analysis
create table temp_time_analysis as
select
    server_timestamp as server_timestamp,
    adv_server_views as Impressions,
    adv_conversions as conversions,
    adv_clicks as clicks,
    adv_revenue as spend
from dsp_campaign_reporting_mv
where data_date between {start} and {end}
{filter};

-- Day of Week Analysis
select from_unixtime(server_timestamp, 'E') as dow,
    sum(Impressions) as impressions,
    sum(conversions) as conversions,
    sum(clicks) as clicks
from temp_time_analysis
group by from_unixtime(server_timestamp, 'E');

-- Time of Day Analysis
SELECT from_unixtime(convert_timezone(server_timestamp, "America/New_York"), "kk:00:00 a") as tod,
    sum(Impressions) as impressions,
    sum(conversions) as conversions,
    sum(clicks) as clicks
from temp_time_analysis
group by from_unixtime(convert_timezone(server_timestamp, "America/New_York"), "kk:00:00 a")"#,
    )
}

fn website_analysis(start: &str, end: &str, action_id: &str, id_field: &IdField) -> String {
    let zeta_filter = actions_filter(id_field);
    format!(
        r#"-- Website Analysis
-- Step 1: filtering the actions table for overall users
create table overall_table as
select *
from actions
where data_date between '{start}' and '{end}'
and conversion_action_id = '{action_id}';

-- Step 2: filtering the actions table for zeta-driven users
create table zeta_driven_table as
select *
from overall_table
where {zeta_filter};

-- Step 3: sessionizing the table for overall users
create table temp_sessions_overall as
select *,
    case
    when unix_timestamp(server_timestamp)
    - lag(unix_timestamp(server_timestamp)) over (partition by user_id order by server_timestamp) >= 30 * 60 * 1000
    then 1
    else 0
    end as new_session
from overall_table;

create table temp_session_ids_overall as
select *,
    concat(user_id, concat('_', sum(new_session) over (partition by user_id order by server_timestamp))) as session_id
from temp_sessions_overall;

-- Step 4: sessionizing the table for zeta-driven users
create table temp_sessions_zeta as
select *,
    case
    when unix_timestamp(server_timestamp)
    - lag(unix_timestamp(server_timestamp)) over (partition by user_id order by server_timestamp) >= 30 * 60 * 1000
    then 1
    else 0
    end as new_session
from zeta_driven_table;

create table temp_session_ids_zeta as
select *,
    concat(user_id, concat('_', sum(new_session) over (partition by user_id order by server_timestamp))) as session_id
from temp_sessions_zeta;

-- Step 5: calculating bounce rate for overall table
select count(distinct session_id) as total_sessions
from temp_session_ids_overall;

select count(distinct session_id) as bounced_sessions
from (
select session_id,
    count(distinct url) as pages_visited
from temp_session_ids_overall
group by session_id
having count(distinct url) = 1
) bounced;

-- Step 6: calculating bounce rate for zeta-driven table
select count(distinct session_id) as total_sessions
from temp_session_ids_zeta;

select count(distinct session_id) as bounced_sessions
from (
select session_id,
    count(distinct url) as pages_visited
from temp_session_ids_zeta
group by session_id
having count(distinct url) = 1
) bounced;

-- Step 7: calculating average pages visited per session for overall table
select round(sum(pages_visited) * 1.0 / count(distinct session_id), 2) as avg_pages_per_session
from (
select session_id,
    count(distinct url) as pages_visited
from temp_session_ids_overall
group by session_id
) page_counts;

-- Step 8: calculating average pages visited per session for zeta-driven table
select round(sum(pages_visited) * 1.0 / count(distinct session_id), 2) as avg_pages_per_session
from (
select session_id,
    count(distinct url) as pages_visited
from temp_session_ids_zeta
group by session_id
) page_counts;

-- Step 9: calculating average session length for overall table
create table temp_session_length_overall as
select session_id,
    max(server_timestamp) - min(server_timestamp) as session_length_seconds
from temp_session_ids_overall
where session_id != '-1_0'
group by session_id;

create table temp_filtered_session_length_overall as
select *
from temp_session_length_overall
where session_length_seconds < 3600000
and session_length_seconds != '0';

select round(avg(session_length_seconds) / 1000, 2) as avg_session_length_seconds
from temp_filtered_session_length_overall;

-- Step 10: calculating average session length for zeta-driven table
create table temp_session_length_zeta as
select session_id,
    max(server_timestamp) - min(server_timestamp) as session_length_seconds
from temp_session_ids_zeta
where session_id != '-1_0'
group by session_id;

create table temp_filtered_session_length_zeta as
select *
from temp_session_length_zeta
where session_length_seconds < 3600000
and session_length_seconds != '0';

select round(avg(session_length_seconds) / 1000, 2) as avg_session_length_seconds
from temp_filtered_session_length_zeta;

-- Step 11: finding overall navigating patterns
select referrer_url as source_url,
    url as destination_url,
    count(*) as navigation_count
from temp_session_ids_overall
where referrer_url like '%ets%'
and url like '%ets%'
group by referrer_url, url
order by navigation_count desc
limit 100000;

-- Step 12: finding zeta-driven navigating patterns
select referrer_url as source_url,
    url as destination_url,
    count(*) as navigation_count
from temp_session_ids_zeta
where referrer_url like '%ets%'
and url like '%ets%'
group by referrer_url, url
order by navigation_count desc
limit 100000"#,
    )
}

fn website_visitor_insights(start: &str, end: &str, pixel: &str, id_field: &IdField) -> String {
    let visitor_filter = actions_filter(id_field);
    format!(
        r#"-- Website Visitor Audience Insights
create table temp_website_visitor_insights as
Select b.path as path,
    b.segment_name as segment_name,
    a.campaign as campaign,
    sum(a.converters) as converters
from
    (
select
    dim_lookup('campaigns_by_id', ad_info[2], 'name') as campaign,
    user_id as user_id,
    count(user_id) as converters
from actions
where conversion_action_id in ({pixel})
and {visitor_filter}
and data_date >= '{start}'
and data_date <= '{end}'
group by dim_lookup('campaigns_by_id', ad_info[2], 'name'), user_id) a
join
    (
select seg_path as path,
    user_id as user_id,
    name as segment_name
from zeta_segments
where demo_name in ('demographic', 'interests', 'location', 'locational', 'transaction', 'transactional', 'ethnicity')
group by seg_path, user_id, name) b
on a.user_id = b.user_id
group by b.path, b.segment_name, a.campaign"#,
    )
}

fn click_lag(start: &str, end: &str, filter: &str) -> String {
    format!(
        r#"-- Click Lag Analysis
create table click_lag_temp as
select
    user_id,
    ad_info_ad_id,
    (click_server_timestamp - server_timestamp)/1000 as avg_click_lag_seconds
from dsp_campaign_reporting_mv
where adv_clicks > 0
and adv_server_views > 0
and data_date >= {start}
and data_date <= {end}
{filter}
group by ad_info_ad_id, user_id, server_timestamp, click_server_timestamp;

-- aggregating and summarizing the click lag data
select
    ad_info_ad_id,
    round(avg_click_lag_seconds) as seconds,
    count(user_id) as count
from click_lag_temp
where avg_click_lag_seconds > 0
and avg_click_lag_seconds < 15
group by ad_info_ad_id, round(avg_click_lag_seconds)
order by count desc
limit 10000"#,
    )
}

fn prospect_retargeting(start: &str, end: &str, id_field: &IdField) -> String {
    let modeling = modeling_filter(id_field);
    format!(
        r#"-- Prospect to Retargeting Analysis
create table temp_prospect_retargeting as
select
    user_type,
    sum(prospecting_impressions) as prospecting_impressions,
    sum(retargeting_impressions) as retargeting_impressions,
    sum(prospecting_conversions) as prospecting_conversions,
    sum(retargeting_conversions) as retargeting_conversions
from
    (
    select user_id,
        case
        when count(campaign_action_recency) = 0 then 'Pure Prospecting'
        when count(1) <> count(campaign_action_recency) then 'Users prospected into RT'
        when count(1) = count(campaign_action_recency) then 'Users not prospected into RT'
        end as user_type,
        sum(if(campaign_action_recency is null, 1, 0)) as prospecting_impressions,
        sum(if(campaign_action_recency is not null, 1, 0)) as retargeting_impressions,
        sum(if(campaign_action_recency is null, rfi_conversions, 0)) as prospecting_conversions,
        sum(if(campaign_action_recency is not null, rfi_conversions, 0)) as retargeting_conversions
    from modeling_rtb_mv
    where {modeling}
    and data_date >= {start}
    and data_date <= {end}
    group by user_id) p
group by user_type"#,
    )
}

fn ctv_attributes(
    start: &str,
    end: &str,
    filter: &str,
    select: &str,
    group_by: &str,
    action_id: &str,
) -> String {
    format!(
        r#"-- CTV Attributes Fires Analysis
-- Step 1: pull ctv impressed users
create table temp_ctv_impressed_users as
select
    server_timestamp,
    from_unixtime(server_timestamp) as server_timestamp_formatted,
    data_date,
    {select},
    user_id,
    bid_ip as ip,
    user_agent_info_device_type as device_type
from dsp_campaign_reporting_mv
where data_date >= '{start}'
and data_date <= '{end}'
{filter}
group by server_timestamp, from_unixtime(server_timestamp), data_date, {group_by}, user_id, bid_ip, user_agent_info_device_type;

-- Step 2: pull pixel data
create table temp_pixel_fires as
select
    data_date,
    server_timestamp,
    from_unixtime(server_timestamp) as server_timestamp_formatted,
    from_unixtime(server_timestamp, 'yyyyMMdd') as conv_date,
    conversion_action_id as pixel,
    dim_lookup("actions_dim", conversion_action_version_id, "name") as pixel_name,
    user_id as user_id,
    ip as ip,
    url,
    parse_user_agent (user_agent, 'device_type') as pixel_device_type
from actions
where conversion_action_id in ({action_id})
and data_date >= '{start}'
and data_date <= '{end}'
group by data_date, server_timestamp, from_unixtime(server_timestamp), from_unixtime(server_timestamp, 'yyyyMMdd'), conversion_action_id, dim_lookup("actions_dim", conversion_action_version_id, "name"), user_id, ip, url, parse_user_agent (user_agent, 'device_type');

-- Step 3: Match CTV impressions with pixel fires
create table temp_ctv_pixel_match as
select
    a.user_id,
    b.user_id,
    a.ip,
    b.ip,
    a.Campaign,
    a.server_timestamp,
    b.server_timestamp,
    a.server_timestamp_formatted as imp_timestamp,
    a.data_date as imp_date,
    b.server_timestamp_formatted as conv_timestamp,
    b.data_date as conv_fire_date,
    b.conv_date,
    b.pixel,
    b.pixel_name,
    b.url,
    a.device_type,
    b.pixel_device_type,
    round(((b.server_timestamp - a.server_timestamp)/86400000), 0) as lag_days
from temp_ctv_impressed_users a
join temp_pixel_fires b
on a.ip = b.ip
and a.server_timestamp < b.server_timestamp
where b.ip is not NULL
and a.ip is not NULL
and a.user_id is not NULL
and a.user_id > 0
and b.user_id is not NULL
and b.user_id > 0;

-- Step 4: Get first impression per user/conversion
CREATE TABLE temp_ctv_first_impression AS
select distinct
    count(distinct user_id) over (partition by user_id, conv_timestamp, pixel) as users,
    first_value(imp_timestamp) over (partition by user_id, conv_timestamp, pixel order by imp_timestamp desc) as imp_timestamp,
    first_value(lag_days) over (partition by user_id, conv_timestamp, pixel order by imp_timestamp desc) as lag_days,
    first_value(imp_date) over (partition by user_id, conv_timestamp, pixel order by imp_timestamp desc) as imp_date,
    conv_timestamp,
    conv_fire_date,
    pixel,
    pixel_name,
    url,
    first_value(device_type) over (partition by user_id, conv_timestamp, pixel order by imp_timestamp desc) as device_type,
    pixel_device_type,
    conv_date,
    first_value(Campaign) over (partition by user_id, conv_timestamp, pixel order by imp_timestamp desc) as campaign_name
from
    (
    SELECT *
    FROM temp_ctv_pixel_match
    WHERE ip IN(
SELECT ip
FROM temp_ctv_pixel_match
GROUP BY ip HAVING COUNT(ip) <= 25)
    ) a
where user_id is not NULL
and user_id >0;

-- Step 5: Final aggregated results
CREATE TABLE temp_ctv_final_results AS
SELECT
    sum(users) as CTV_Exposed_Fires,
    campaign_name as campaign_Name,
    pixel as Pixel_ID,
    pixel_name as Pixel_Name,
    lag_days as Impression_Lag_Days,
    imp_timestamp as Impression_Timestamp,
    imp_date as Impression_Date,
    device_type as Impression_Device,
    conv_timestamp as Pixel_Fire_Timestamp,
    conv_fire_date as Pixel_Fire_Date,
    pixel_device_type as Pixel_Fire_Device,
    url as Pixel_Fire_URL
from temp_ctv_first_impression
where device_type in ('SET_TOP_BOX', 'TV', 'NULL', 'UNKNOWN')
and pixel_device_type in ('COMPUTER', 'GAME_CONSOLE', 'MEDIA_PLAYER', 'MOBILE_PHONE', 'TABLET', 'UNKNOWN')
and lag_days <= 30
group by campaign_name, pixel, pixel_name, lag_days, imp_timestamp, imp_date, device_type, conv_timestamp, conv_fire_date, pixel_device_type, url;

select * from temp_ctv_final_results"#,
    )
}

/// Join key used inside the lift temp tables. CTV inventory has no stable
/// user id, so those channels key on ip.
fn lift_join_key(channel_type: &str) -> &'static str {
    if channel_type == "CTV" {
        "bid_ip"
    } else {
        "user_id"
    }
}

fn lift_workbook_key(channel_type: &str) -> &'static str {
    if channel_type == "CTV" {
        "ip"
    } else {
        "user_id"
    }
}

fn channel_filter(id_field: &IdField, ids: &str) -> String {
    match id_field.kind.column() {
        Some(column) => format!("and {} in ({})", column, ids),
        None => String::new(),
    }
}

fn omnichannel_lift(start: &str, end: &str, request: &FormRequest) -> String {
    let default_config = OmnichannelConfig {
        channel1: ChannelConfig {
            channel_type: "CTV".to_string(),
            ids: String::new(),
        },
        channel2: ChannelConfig {
            channel_type: "Display".to_string(),
            ids: String::new(),
        },
    };
    let config = request.omnichannel_config.as_ref().unwrap_or(&default_config);
    let select = select_columns(request.granularity);
    let group_by = group_by_columns(request.granularity);

    let ch1 = &config.channel1.channel_type;
    let ch2 = &config.channel2.channel_type;
    let ch1_join = lift_join_key(ch1);
    let ch2_join = lift_join_key(ch2);
    let ch1_key = lift_workbook_key(ch1);
    let ch2_key = lift_workbook_key(ch2);
    let ch1_filter = channel_filter(&request.id_field, &config.channel1.ids);
    let ch2_filter = channel_filter(&request.id_field, &config.channel2.ids);

    format!(
        r#"-- Omnichannel Lift Analysis
-- Step 1: Pull metrics for {ch1}
create table temp_lift_{ch1} as
select
    bid_ip as ip,
    {ch1_join} as join_key,
    {select},
    sum(dsp_server_views) as impressions,
    sum(adv_revenue) as spend,
    sum(dsp_client_revenue) revenue,
    sum(adv_conversions) as conversions
from dsp_campaign_reporting_mv
where data_date between {start} and {end}
{ch1_filter}
group by bid_ip, {ch1_join}, {group_by};

-- Step 2: Pull metrics for {ch2}
create table temp_lift_{ch2} as
SELECT
    bid_ip as ip,
    user_id as user_id,
    {ch2_join} as join_key,
    {select},
    sum(dsp_server_views) as impressions,
    sum(dsp_clicks) as clicks,
    sum(adv_revenue) as spend,
    sum(dsp_client_revenue) revenue,
    sum(adv_conversions) as conversions
from dsp_campaign_reporting_mv
where data_date between {start} and {end}
{ch2_filter}
group by bid_ip, user_id, {ch2_join}, {group_by};

-- Step 3: Collect metrics for lift workbook ({ch1})
select campaign_name as campaign_name,
    count({ch1_key}) as {ch1_key},
    sum(impressions) as impressions,
    sum(spend) as spend,
    sum(conversions) as conversions,
    sum(revenue) as revenue
from temp_lift_{ch1}
group by campaign_name;

-- Step 4: Collect metrics for lift workbook ({ch2})
select campaign_name as campaign_name,
    count(ip) as ip,
    count(user_id) as user_id,
    sum(impressions) as impressions,
    sum(spend) as spend,
    sum(conversions) as conversions,
    sum(revenue) as revenue
from temp_lift_{ch2}
group by campaign_name;

-- Step 5: Overlap {ch1} with {ch2}
create table temp_lift_overlap as
select
    m.{ch2_key} as {ch2_key},
    m.campaign_name,
    sum(m.impressions) as impressions,
    sum(m.spend) as spend,
    sum(m.conversions) as conversions,
    sum(m.revenue) as revenue
FROM
    (
SELECT
    campaign_name,
    {ch2_key} as {ch2_key},
    sum(impressions) as impressions,
    sum(spend) as spend,
    sum(conversions) as conversions,
    sum(revenue) as revenue
from temp_lift_{ch2}
group by campaign_name, {ch2_key})m
JOIN
    (
SELECT
    {ch1_key} as {ch1_key}
from temp_lift_{ch1}
group by {ch1_key})v
ON v.{ch1_key}=m.{ch2_key}
group by m.{ch2_key}, m.campaign_name;

-- Step 6: Collect overlap metrics for lift workbook
select campaign_name as campaign_name,
    count({ch2_key}) as {ch2_key},
    sum(impressions) as impressions,
    sum(spend) as spend,
    sum(conversions) as conversions,
    sum(revenue) as revenue
from temp_lift_overlap
group by campaign_name"#,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(types: &[&str], granularity: FormGranularity, kind: IdFieldType) -> FormRequest {
        FormRequest {
            analysis_types: types.iter().map(|t| t.to_string()).collect(),
            granularity,
            id_field: IdField {
                kind,
                value: "123, 456".to_string(),
            },
            conversion_action_id: Some("9001".to_string()),
            pixel_id: None,
            date_range: FormDateRange {
                from: NaiveDate::from_ymd_opt(2024, 8, 1).unwrap(),
                to: NaiveDate::from_ymd_opt(2024, 8, 5).unwrap(),
            },
            omnichannel_config: None,
        }
    }

    #[test]
    fn campaign_granularity_has_no_line_item_columns() {
        let sql = generate(&request(
            &["dma"],
            FormGranularity::Campaign,
            IdFieldType::CampaignId,
        ));
        assert!(sql.contains("ad_info_campaign_id as Campaign_ID"));
        assert!(!sql.contains("LineItem_ID"));
        assert!(sql.contains("and ad_info_campaign_id in (123, 456)"));
    }

    #[test]
    fn tactic_granularity_is_cumulative() {
        let sql = generate(&request(
            &["dma"],
            FormGranularity::Tactic,
            IdFieldType::TacticId,
        ));
        assert!(sql.contains("Campaign_ID"));
        assert!(sql.contains("LineItem_ID"));
        assert!(sql.contains("Tactic_ID"));
        assert!(sql.contains("and ad_info_tactic_id in (123, 456)"));
    }

    #[test]
    fn all_filter_omits_where_condition() {
        let sql = generate(&request(
            &["devices"],
            FormGranularity::Campaign,
            IdFieldType::All,
        ));
        assert!(!sql.contains(" in (123, 456)"));
    }

    #[test]
    fn multiple_types_join_with_delimiter() {
        let sql = generate(&request(
            &["dma", "devices"],
            FormGranularity::Campaign,
            IdFieldType::CampaignId,
        ));
        assert_eq!(sql.matches("-- ====== Next Query ======").count(), 1);
        assert!(sql.contains("-- DMA Analysis"));
        assert!(sql.contains("-- Devices Analysis"));
    }

    #[test]
    fn unknown_type_yields_not_found_comment() {
        let sql = generate(&request(
            &["moon_phase"],
            FormGranularity::Campaign,
            IdFieldType::CampaignId,
        ));
        assert_eq!(sql, "-- Query template not found for: moon_phase");
    }

    #[test]
    fn every_catalog_type_has_a_template() {
        let types = [
            "performance_report",
            "dma",
            "devices",
            "reach_frequency",
            "site_app",
            "top_creatives",
            "top_genre",
            "frequency_lag",
            "audience_insights",
            "audience_segments",
            "omnichannel_lift",
            "path_to_click",
            "path_to_conversion",
            "survey",
            "time_day_week",
            "website_analysis",
            "website_visitor_insights",
            "click_lag",
            "prospect_retargeting",
            "ctv_attributes",
        ];
        for analysis_type in types {
            let sql = generate(&request(
                &[analysis_type],
                FormGranularity::Campaign,
                IdFieldType::CampaignId,
            ));
            assert!(
                !sql.contains("Query template not found"),
                "missing template for {}",
                analysis_type
            );
        }
    }

    #[test]
    fn top_genre_groups_on_genre() {
        let sql = generate(&request(
            &["top_genre"],
            FormGranularity::Campaign,
            IdFieldType::CampaignId,
        ));
        assert!(sql.contains("-- Top Genre Analysis"));
        assert!(sql.contains("mobile_attributes_genre as Genre"));
        assert!(sql.contains("and ad_info_campaign_id in (123, 456)"));
    }

    #[test]
    fn conversion_filters_use_the_ads_array() {
        let campaign = generate(&request(
            &["path_to_conversion"],
            FormGranularity::Campaign,
            IdFieldType::CampaignId,
        ));
        assert!(campaign.contains(r#"and dim_lookup("campaigns", ads[3], "campaign_id") in (123, 456)"#));
        assert!(campaign.contains("conversion_action_id in (9001)"));

        let line_item = generate(&request(
            &["path_to_conversion"],
            FormGranularity::Campaign,
            IdFieldType::LineItemId,
        ));
        assert!(line_item.contains("and ads[5] in (123, 456)"));
    }

    #[test]
    fn modeling_table_filters_use_plain_id_columns() {
        let sql = generate(&request(
            &["prospect_retargeting"],
            FormGranularity::Campaign,
            IdFieldType::LineItemId,
        ));
        assert!(sql.contains("from modeling_rtb_mv"));
        assert!(sql.contains("where line_item_id in (123, 456)"));
    }

    #[test]
    fn website_analysis_filters_zeta_table_on_ad_info() {
        let sql = generate(&request(
            &["website_analysis"],
            FormGranularity::Campaign,
            IdFieldType::TacticId,
        ));
        assert!(sql.contains("create table zeta_driven_table as"));
        assert!(sql.contains("where ad_info[1] in (123, 456)"));
        assert!(sql.contains("and conversion_action_id = '9001'"));
    }

    #[test]
    fn performance_report_keeps_content_and_bundle_columns() {
        let sql = generate(&request(
            &["performance_report"],
            FormGranularity::Campaign,
            IdFieldType::CampaignId,
        ));
        assert!(sql.contains("geo_congressional_district as Congressional_District"));
        assert!(sql.contains("video_player_size as Player_Size"));
        assert!(sql.contains("mobile_attributes_livestream as Livestream"));
        assert!(sql.contains("video_content_duration as Content_Duration"));
        assert!(sql.contains("get_json_object(mobile_attributes_raw_value, '$.bundle') as Bundle_ID"));
    }

    #[test]
    fn frequency_lag_prefers_pixel_id() {
        let mut req = request(
            &["frequency_lag"],
            FormGranularity::Campaign,
            IdFieldType::CampaignId,
        );
        req.pixel_id = Some("777".to_string());
        let sql = generate(&req);
        assert!(sql.contains("conversion_action_id in (777)"));
    }

    #[test]
    fn omnichannel_uses_channel_ids_and_join_keys() {
        let mut req = request(
            &["omnichannel_lift"],
            FormGranularity::Campaign,
            IdFieldType::CampaignId,
        );
        req.omnichannel_config = Some(OmnichannelConfig {
            channel1: ChannelConfig {
                channel_type: "CTV".to_string(),
                ids: "11".to_string(),
            },
            channel2: ChannelConfig {
                channel_type: "Display".to_string(),
                ids: "22".to_string(),
            },
        });
        let sql = generate(&req);
        assert!(sql.contains("create table temp_lift_CTV as"));
        assert!(sql.contains("create table temp_lift_Display as"));
        assert!(sql.contains("and ad_info_campaign_id in (11)"));
        assert!(sql.contains("and ad_info_campaign_id in (22)"));
        assert!(sql.contains("bid_ip as join_key"));
        assert!(sql.contains("ON v.ip=m.user_id"));
    }

    #[test]
    fn form_request_deserializes_ui_payload() {
        let payload = r#"{
            "analysisTypes": ["dma"],
            "granularity": "Line_Item",
            "idField": {"type": "line_item_id", "value": "88"},
            "dateRange": {"from": "2024-08-01", "to": "2024-08-05"}
        }"#;
        let req: FormRequest = serde_json::from_str(payload).unwrap();
        assert_eq!(req.granularity, FormGranularity::LineItem);
        assert_eq!(req.id_field.kind, IdFieldType::LineItemId);
        assert!(req.omnichannel_config.is_none());
    }
}

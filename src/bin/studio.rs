use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::error;

use query_studio::form::{self, FormDateRange, FormGranularity, FormRequest, IdField, IdFieldType};
use query_studio::granularity::Granularity;
use query_studio::history::QueryHistory;
use query_studio::knowledge_base::templates;
use query_studio::selector::no_template_guidance;
use query_studio::{QueryStudio, StudioError};

#[derive(Parser)]
#[command(name = "studio")]
#[command(about = "Report SQL generator for campaign analytics")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate SQL from a natural-language request
    Generate {
        /// The request, e.g. "device breakdown for campaign 12345 last 7 days"
        query: String,

        /// Grouping level: campaign, line_item, tactic, campaign_line_item,
        /// campaign_tactic, line_item_tactic, or all
        #[arg(short, long, default_value = "campaign")]
        granularity: Granularity,

        /// Reference date for relative expressions (YYYY-MM-DD), defaults to today
        #[arg(long)]
        as_of: Option<NaiveDate>,

        /// Save the result under this name in the history file
        #[arg(long)]
        save_as: Option<String>,

        /// Path to the history file
        #[arg(long, default_value = "query_history.json")]
        history: PathBuf,
    },
    /// Generate SQL from structured form fields
    Form {
        /// Analysis types, comma separated (e.g. dma,devices,top_creatives)
        #[arg(value_delimiter = ',')]
        analysis_types: Vec<String>,

        /// Grouping level: Campaign, Line_Item, or Tactic
        #[arg(short, long, default_value = "Campaign")]
        granularity: String,

        /// Entity filter field: campaign_id, line_item_id, tactic_id, or all
        #[arg(long, default_value = "campaign_id")]
        id_field: String,

        /// Comma-separated ids for the filter field
        #[arg(long, default_value = "")]
        ids: String,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        to: NaiveDate,

        /// Conversion action id for pixel-based analyses
        #[arg(long)]
        conversion_action_id: Option<String>,
    },
    /// List the template catalog
    Templates,
    /// List saved queries for a user
    History {
        username: String,

        /// Path to the history file
        #[arg(long, default_value = "query_history.json")]
        history: PathBuf,
    },
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    match args.command {
        Commands::Generate {
            query,
            granularity,
            as_of,
            save_as,
            history,
        } => {
            let studio = match as_of {
                Some(date) => QueryStudio::with_reference_date(date),
                None => QueryStudio::new(),
            };
            match studio.generate_from_text(&query, granularity) {
                Ok(generated) => {
                    println!("{}", generated.sql);
                    if let Some(name) = save_as {
                        let username = whoami();
                        let mut store = QueryHistory::open(&history)?;
                        store.add(
                            &username,
                            &name,
                            &generated.intent.analysis_type,
                            &generated.sql,
                        )?;
                        eprintln!("saved as '{}' for {}", name, username);
                    }
                }
                Err(StudioError::NoTemplateMatch { .. }) => {
                    println!("{}", no_template_guidance());
                }
                Err(e) => {
                    error!("generation failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Commands::Form {
            analysis_types,
            granularity,
            id_field,
            ids,
            from,
            to,
            conversion_action_id,
        } => {
            let granularity = parse_form_granularity(&granularity)?;
            let kind = parse_id_field(&id_field)?;
            let request = FormRequest {
                analysis_types,
                granularity,
                id_field: IdField { kind, value: ids },
                conversion_action_id,
                pixel_id: None,
                date_range: FormDateRange { from, to },
                omnichannel_config: None,
            };
            println!("{}", form::generate(&request));
        }
        Commands::Templates => {
            for template in templates() {
                println!("{:<20} {}", template.id, template.purpose);
            }
        }
        Commands::History { username, history } => {
            let store = QueryHistory::open(&history)?;
            for entry in store.for_user(&username) {
                println!(
                    "{}  {}  [{}]  {}",
                    entry.created_at.format("%Y-%m-%d %H:%M"),
                    entry.id,
                    entry.analysis_type,
                    entry.name
                );
            }
        }
    }
    Ok(())
}

fn parse_form_granularity(value: &str) -> Result<FormGranularity> {
    match value.to_lowercase().as_str() {
        "campaign" => Ok(FormGranularity::Campaign),
        "line_item" => Ok(FormGranularity::LineItem),
        "tactic" => Ok(FormGranularity::Tactic),
        other => anyhow::bail!("unknown form granularity '{}'", other),
    }
}

fn parse_id_field(value: &str) -> Result<IdFieldType> {
    match value.to_lowercase().as_str() {
        "campaign_id" => Ok(IdFieldType::CampaignId),
        "line_item_id" => Ok(IdFieldType::LineItemId),
        "tactic_id" => Ok(IdFieldType::TacticId),
        "all" => Ok(IdFieldType::All),
        other => anyhow::bail!("unknown id field '{}'", other),
    }
}

fn whoami() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "anonymous".to_string())
}

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use centinela_client::PortalClient;
use centinela_core::api::{AttachmentApi, AttachmentSrc, StatSeries, StatsApi};
use centinela_core::config::Config;
use centinela_core::stats;
use centinela_core::types::{AttachmentRef, IncidentKind};
use centinela_core::view::{derive_view, FilterState};
use centinela_sync::store::IncidentStore;

#[derive(Parser)]
#[command(name = "centinela-console", about = "Operator console for the Centinela incident portal")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Page through incidents the way the moderation view does
    List {
        /// Incident family: "reportes" or "emergencias"
        #[arg(long, default_value = "reportes")]
        kind: String,
        /// Case-insensitive substring over id, description and author
        #[arg(long, default_value = "")]
        search: String,
        /// Exact category to keep
        #[arg(long)]
        category: Option<String>,
        /// Exact status label to keep
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// Print every aggregate series plus the heat coverage breakdown
    Stats,
    /// Resolve one photo attachment to something displayable
    Photo {
        /// Photo id from a record's attachment reference
        id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("centinela=info".parse()?))
        .init();

    info!("Centinela console starting...");

    let cli = Cli::parse();
    let config = Config::from_env();
    config.log_redacted();

    let mut client = PortalClient::new(&config.api_url)?;
    if let Some(token) = &config.auth_token {
        client = client.with_token(token.clone());
    }
    let client = Arc::new(client);

    match cli.command {
        Command::List { kind, search, category, status, page } => {
            list(client, &config, &kind, search, category, status, page).await
        }
        Command::Stats => stats_summary(client, &config).await,
        Command::Photo { id } => photo(client, id).await,
    }
}

async fn list(
    client: Arc<PortalClient>,
    config: &Config,
    kind: &str,
    search: String,
    category: Option<String>,
    status: Option<String>,
    page: usize,
) -> Result<()> {
    let kind = IncidentKind::from_str_loose(kind)
        .with_context(|| format!("unknown incident kind '{kind}'"))?;

    let mut store = IncidentStore::new(kind, client);
    store.load_all().await?;

    let filters = FilterState {
        search,
        category,
        status,
        page,
        page_size: config.page_size,
    };
    let view = derive_view(store.incidents(), &filters);

    println!(
        "{} matching of {} loaded, page {}/{}",
        view.total_matching,
        store.len(),
        view.page,
        view.total_pages
    );
    for incident in &view.page_items {
        let category = incident.category.as_deref().unwrap_or("-");
        let place = incident
            .location
            .map(|p| p.to_string())
            .unwrap_or_else(|| "unmappable".to_string());
        println!(
            "#{:<6} {:<20} {:<12} {:<18} {}",
            incident.id,
            category,
            incident.status.label(),
            place,
            incident.description
        );
    }
    let counts = store.counts();
    println!(
        "{} status: {} attended, {} pending, {} other",
        store.kind(),
        counts.attended,
        counts.pending,
        counts.other
    );
    Ok(())
}

async fn stats_summary(client: Arc<PortalClient>, config: &Config) -> Result<()> {
    let fetches: Vec<_> = StatSeries::BUCKET_SERIES
        .iter()
        .map(|&series| {
            let client = client.clone();
            async move { (series, client.series(series).await) }
        })
        .collect();

    for (series, outcome) in futures::future::join_all(fetches).await {
        match outcome {
            Ok(rows) => {
                println!("{}:", series.title());
                for bucket in stats::buckets(&rows) {
                    println!("  {:<28} {:>8}", bucket.label, bucket.count);
                }
            }
            Err(e) => warn!(series = series.title(), error = %e, "Series unavailable"),
        }
    }

    let rows = client.series(StatSeries::Heatmap).await?;
    let summary = stats::heat_summary(&rows, &config.region);
    println!(
        "heat coverage: {} locations ({} inside region, {} outside, {} unmappable), total weight {}",
        summary.locations, summary.inside, summary.outside, summary.unmappable, summary.total_metric
    );
    Ok(())
}

async fn photo(client: Arc<PortalClient>, id: i64) -> Result<()> {
    match client.resolve_attachment(&AttachmentRef::PhotoId(id)).await? {
        AttachmentSrc::Url(url) => println!("{url}"),
        AttachmentSrc::Bytes { data, mime } => {
            println!("{} bytes of {mime}", data.len());
        }
    }
    Ok(())
}

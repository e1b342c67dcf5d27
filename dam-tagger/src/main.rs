//! dam-tagger - DAM taxonomy tagging command line
//!
//! Resolves semantic tags against a remote DAM taxonomy, creating missing
//! tags and values on demand, and assigns them to media records.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dam_common::config::{self, ConfigOverrides};
use dam_common::events::EventBus;
use dam_common::DamConfig;
use dam_tagger::models::{AssignmentReport, MediaQuery, SemanticTag};
use dam_tagger::DamService;

/// Command-line arguments for dam-tagger
#[derive(Parser, Debug)]
#[command(name = "dam-tagger")]
#[command(about = "Resolve and assign semantic tags in a remote DAM")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")"))]
struct Args {
    /// TOML configuration file (default: platform config dir)
    #[arg(short, long, env = "DAM_TAGGER_CONFIG")]
    config: Option<PathBuf>,

    /// DAM API base URL (overrides DAM_BASE_URL and the config file)
    #[arg(long)]
    base_url: Option<String>,

    /// Login identity (overrides DAM_IDENTITY and the config file)
    #[arg(long)]
    identity: Option<String>,

    /// Login secret (overrides DAM_SECRET and the config file)
    #[arg(long)]
    secret: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and print the taxonomy visible to this identity
    Tags,

    /// Search media records
    Search {
        /// Query text passed to the DAM
        query: String,

        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long, default_value_t = MediaQuery::DEFAULT_PAGE_SIZE)]
        page_size: u32,
    },

    /// Assign NAME=VALUE tags to a media record
    Assign {
        /// Target media record id
        media_id: String,

        /// Tag to assign, repeatable (e.g. --tag Location=Paris)
        #[arg(long = "tag", value_name = "NAME=VALUE", required = true)]
        tags: Vec<SemanticTag>,
    },

    /// Assign bare keywords under the configured keywords tag
    Keywords {
        /// Target media record id
        media_id: String,

        /// Keywords to assign
        #[arg(required = true)]
        keywords: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => config::default_config_path().context("Failed to locate config directory")?,
    };
    let toml_config = config::load_toml_config(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    // Initialize tracing (RUST_LOG wins over the config file level)
    let level = toml_config.logging.level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("dam_tagger={level},dam_common={level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git_hash = env!("GIT_HASH"),
        built = env!("BUILD_TIMESTAMP"),
        profile = env!("BUILD_PROFILE"),
        "Starting dam-tagger"
    );
    info!("Config file: {}", config_path.display());

    let overrides = ConfigOverrides {
        base_url: args.base_url.clone(),
        identity: args.identity.clone(),
        secret: args.secret.clone(),
    };
    let dam_config =
        DamConfig::resolve(&toml_config, &overrides).context("Invalid DAM configuration")?;

    let event_bus = EventBus::new(100);
    let service = DamService::from_config(dam_config, event_bus)
        .context("Failed to initialize DAM client")?;

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown(cancel.clone()));

    match args.command {
        Command::Tags => {
            service
                .session()
                .ensure_authenticated()
                .await
                .context("DAM login failed")?;
            let definitions = service.taxonomy().definitions();
            info!(tag_count = definitions.len(), "Taxonomy loaded");
            print_json(&definitions)?;
        }
        Command::Search {
            query,
            page,
            page_size,
        } => {
            let query = MediaQuery::new(query).page(page).page_size(page_size);
            let result = service.search(&query).await.context("Media search failed")?;
            print_json(&result)?;
        }
        Command::Assign { media_id, tags } => {
            let result = service.assign_tags(&media_id, &tags, &cancel).await;
            report(&media_id, result)?;
        }
        Command::Keywords { media_id, keywords } => {
            let result = service.assign_keywords(&media_id, &keywords, &cancel).await;
            report(&media_id, result)?;
        }
    }

    Ok(())
}

fn report(
    media_id: &str,
    result: Result<dam_tagger::models::AssignmentSummary, dam_tagger::RemoteError>,
) -> Result<()> {
    let report = AssignmentReport::from_result(media_id, &result);
    print_json(&report)?;
    if !report.success {
        bail!(
            "Tag assignment failed for media '{}': {}",
            media_id,
            report.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", text);
    Ok(())
}

/// Cancel in-progress work on Ctrl+C; the current remote call completes
async fn cancel_on_shutdown(cancel: CancellationToken) {
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received Ctrl+C, cancelling");
            cancel.cancel();
        }
        Err(e) => warn!("Failed to install Ctrl+C handler: {}", e),
    }
}

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use postrelease_server::{
    settings::{SiteSettings, SPONSORED_POST_TYPE},
    store::OptionKey,
    AppState,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

// ── CLI definition ─────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "postreleased",
    about = "postreleased — PostRelease publisher endpoint daemon",
    version
)]
struct Cli {
    /// Data directory holding postrelease.db and postrelease.key
    #[arg(long, global = true, env = "PRX_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP endpoint
    Serve {
        /// Port to listen on (default: $PRX_PORT or 8080)
        #[arg(long, env = "PRX_PORT", default_value = "8080")]
        port: u16,
        /// Host to bind (default: $PRX_HOST or 0.0.0.0)
        #[arg(long, env = "PRX_HOST", default_value = "0.0.0.0")]
        host: String,
        /// Log level: error, warn, info, debug, verbose (default: $PRX_LOG_LEVEL or info)
        #[arg(long, env = "PRX_LOG_LEVEL")]
        log_level: Option<String>,
    },
    /// Print the stored configuration (offline). The shared secret is never shown.
    Status,
    /// Tear down local state (offline): delete sponsored resources and remove
    /// every configuration key, as a provider-initiated disable would.
    Reset {
        /// Only forget the shared secret so the provider can sign up again
        #[arg(long)]
        key_only: bool,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let raw_level = match &cli.command {
        Commands::Serve { log_level, .. } => log_level.clone(),
        _ => None,
    }
    .or_else(|| std::env::var("PRX_LOG_LEVEL").ok())
    .unwrap_or_else(|| "info".into());
    let effective_log_level = if raw_level.eq_ignore_ascii_case("verbose") {
        "debug".to_owned()
    } else {
        raw_level
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&effective_log_level))
        .init();

    match cli.command {
        Commands::Serve { port, host, .. } => cmd_serve(host, port, cli.data_dir).await,
        Commands::Status => cmd_status(cli.data_dir),
        Commands::Reset { key_only } => cmd_reset(cli.data_dir, key_only),
    }
}

// ── Command implementations ───────────────────────────────────────────────────

async fn cmd_serve(host: String, port: u16, data_dir: Option<PathBuf>) -> Result<()> {
    let cfg = postrelease_server::ServerConfig {
        host,
        port,
        data_dir,
        ..postrelease_server::ServerConfig::from_env()?
    };
    postrelease_server::run(cfg).await
}

fn open_store(data_dir: Option<PathBuf>) -> Result<postrelease_server::store::Store> {
    let dir = postrelease_server::resolve_data_dir(data_dir.as_ref())?;
    postrelease_server::server::open_store(&dir)
        .context("open store (is another postreleased running against this data dir?)")
}

fn cmd_status(data_dir: Option<PathBuf>) -> Result<()> {
    let store = open_store(data_dir)?;
    let cfg = store.load_configuration()?;
    let report = json!({
        "activated": cfg.activated,
        "template_post_id": cfg.template_resource_id,
        "has_key": cfg.shared_secret.is_some(),
        "database_version": cfg.schema_version,
        "sponsored_posts": store.count_posts_of_type(SPONSORED_POST_TYPE)?,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn cmd_reset(data_dir: Option<PathBuf>, key_only: bool) -> Result<()> {
    let store = open_store(data_dir)?;

    if key_only {
        let existed = store.reset_option(OptionKey::PluginKey)?;
        println!("{}", if existed { "shared secret removed" } else { "no shared secret stored" });
        return Ok(());
    }

    let state = AppState::new(store, SiteSettings::from_env()?, None)?;
    let removed = state.activation().teardown()?;
    tracing::info!(removed, "audit: offline reset");
    println!("removed {removed} sponsored resource(s) and all configuration keys");
    Ok(())
}

//! Command-line interface.
//!
//! The binary is mostly `serve`; the other subcommands are operator
//! tools for source alignment and the OpenAPI document.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::registry::SourceRegistry;
use crate::repository::Db;
use crate::server;
use crate::server::handlers::root::openapi_document;

#[derive(Parser)]
#[command(name = "nldi")]
#[command(about = "Network Linked Data Index - navigate NHDPlus hydrography as linked data")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides NLDI_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Address to bind
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Reconcile the crawler_source table with the configured sources list
    AlignSources,
    /// Print the OpenAPI document
    Openapi {
        /// Output format: json or yaml
        #[arg(long, default_value = "json")]
        format: String,
    },
    /// Print the resolved configuration
    Config,
}

/// Parse arguments and dispatch.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    init_logging(&config, cli.verbose);

    match cli.command {
        Commands::Serve { host, port } => server::serve(&config, &host, port).await,
        Commands::AlignSources => align_sources(&config).await,
        Commands::Openapi { format } => print_openapi(&config, &format),
        Commands::Config => {
            println!("{}", serde_yaml::to_string(&config)?);
            Ok(())
        }
    }
}

/// Filter precedence: RUST_LOG, then --verbose, then the configured
/// level.
fn init_logging(config: &Config, verbose: bool) {
    let default_filter = if verbose {
        "nldi=debug".to_string()
    } else {
        format!("nldi={}", config.logging.level)
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn align_sources(config: &Config) -> anyhow::Result<()> {
    let desired = config.source_list()?;
    if desired.is_empty() {
        anyhow::bail!("no sources configured; nothing to align");
    }
    let db = Db::connect(&config.database)?;
    db.ping().await?;
    let repo = db.sources();
    let registry = SourceRegistry::load(&repo).await?;
    let report = registry.align(&repo, &desired).await?;
    println!(
        "Aligned crawler sources: {} inserted, {} updated, {} total",
        report.inserted, report.updated, report.total
    );
    Ok(())
}

fn print_openapi(config: &Config, format: &str) -> anyhow::Result<()> {
    let doc = openapi_document(&config.metadata);
    match format {
        "json" => println!("{}", doc.to_json()?),
        "yaml" => println!("{}", doc.to_yaml()?),
        other => anyhow::bail!("unsupported format '{other}'; use json or yaml"),
    }
    Ok(())
}

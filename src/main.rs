//! toolbroker stdio server - main entry point.
//!
//! Loads the catalog, builds the registry and discovery engine, then serves
//! the meta-tools over stdin/stdout until EOF or ctrl-c. Logs go to stderr.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use toolbroker::transport::StdioServer;
use toolbroker::{Broker, CatalogDocument, HandlerFactories};

#[derive(Debug, Parser)]
#[command(name = "toolbroker", version, about = "Progressive-discovery tool broker over stdio")]
struct Cli {
    /// Path to the YAML catalog.
    #[arg(long, env = "TOOLBROKER_CATALOG")]
    catalog: PathBuf,

    /// Override `registry.schema_ttl` (e.g. `30m`).
    #[arg(long, env = "TOOLBROKER_SCHEMA_TTL", value_parser = parse_duration)]
    schema_ttl: Option<Duration>,

    /// Override `registry.execute_timeout` (e.g. `45s`).
    #[arg(long, env = "TOOLBROKER_EXECUTE_TIMEOUT", value_parser = parse_duration)]
    execute_timeout: Option<Duration>,

    /// Skip initializing `lazy_load: false` capabilities at startup.
    #[arg(long)]
    no_preload: bool,
}

fn parse_duration(raw: &str) -> Result<Duration, String> {
    serde_json::from_value::<humantime_serde::Serde<Duration>>(serde_json::Value::from(raw))
        .map(humantime_serde::Serde::into_inner)
        .map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize observability
    toolbroker::observability::init_tracing();

    let cli = Cli::parse();

    // Load configuration
    let mut document = CatalogDocument::from_path(&cli.catalog)?;
    if let Some(ttl) = cli.schema_ttl {
        document.config.registry.schema_ttl = ttl;
    }
    if let Some(timeout) = cli.execute_timeout {
        document.config.registry.execute_timeout = timeout;
    }

    let broker = Broker::from_document(&document, &HandlerFactories::with_builtin())?;
    tracing::info!(
        catalog = %cli.catalog.display(),
        capabilities = broker.catalog.capabilities().len(),
        tools = broker.catalog.len(),
        "toolbroker starting"
    );

    if !cli.no_preload {
        let ready = broker.registry.preload_eager().await;
        tracing::info!(ready, "eager capabilities initialized");
    }

    let server = StdioServer::new(broker.engine.clone(), broker.config.server.clone());
    let cancel = server.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received");
            cancel.cancel();
        }
    });

    let served = server.serve_stdio().await;
    broker.registry.shutdown().await;
    served?;

    tracing::info!("toolbroker stopped");
    Ok(())
}

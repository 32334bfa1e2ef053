use anyhow::Result;
use clap::Parser;
use docuflow::config::{Cli, ServerConfig};
use docuflow_core::DocumentStore;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::load(Cli::parse())?;
    let store = DocumentStore::new(config.data_dir.clone())?;
    info!(dir = %store.data_dir().display(), nodes = store.len(), "loaded document store");
    for issue in store.check_integrity() {
        warn!(%issue, "tree integrity");
    }

    docuflow::run_server(config.addr, Arc::new(RwLock::new(store))).await
}

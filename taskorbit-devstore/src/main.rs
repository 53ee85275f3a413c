//! `taskorbit-devstore`: in-memory task API for local development.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 127.0.0.1:5000
//! cargo run --bin taskorbit-devstore
//!
//! # Custom address, preloaded with tasks
//! cargo run --bin taskorbit-devstore -- --bind 0.0.0.0:8080 --seed tasks.json
//! ```

use std::sync::Arc;

use clap::Parser;
use taskorbit_devstore::config::{DevStoreCliArgs, DevStoreConfig};
use taskorbit_devstore::server;
use taskorbit_devstore::store::TaskRepository;
use taskorbit_proto::Task;

#[tokio::main]
async fn main() {
    let cli = DevStoreCliArgs::parse();

    let config = match DevStoreConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let repo = match config.seed_file.as_deref().map(load_seed).transpose() {
        Ok(Some(tasks)) => {
            tracing::info!(count = tasks.len(), "loaded seed tasks");
            TaskRepository::with_tasks(tasks)
        }
        Ok(None) => TaskRepository::new(),
        Err(e) => {
            tracing::error!(error = %e, "failed to load seed file");
            std::process::exit(1);
        }
    };

    match server::start_server_with_state(&config.bind_addr, Arc::new(repo)).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "devstore listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "devstore task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start devstore");
            std::process::exit(1);
        }
    }
}

fn load_seed(path: &std::path::Path) -> Result<Vec<Task>, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

use mzansi_books_storage::engine::Snapshot;
use mzansi_books_storage::logging::init_tracing;
use mzansi_books_storage::{
    ClientStore, Namespace, Outcome, PermanentStorage, StorageBackends, StorageConfig,
};

#[derive(Parser)]
#[command(name = "mzansi-storage", about = "Inspect and repair Mok Mzansi Books storage")]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "mzansi-storage.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show per-tier health of a namespace
    Inspect { namespace: Namespace },
    /// Print the current document of a namespace
    Get { namespace: Namespace },
    /// Repopulate the primary tier from the first intact fallback
    Restore { namespace: Namespace },
    /// Remove every tier of a namespace
    Clear { namespace: Namespace },
    /// Write a snapshot of all namespaces to a file
    Export { file: PathBuf },
    /// Load a snapshot file into every tier
    Import { file: PathBuf },
    /// Print the clients document
    Clients,
    /// List stored key-value keys
    Keys,
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = StorageConfig::load(&cli.config)
        .with_context(|| format!("failed to read config {}", cli.config.display()))?;
    init_tracing(&config.log_level);
    tracing::info!(config = %cli.config.display(), data_dir = %config.data_dir, "using config");

    let backends = StorageBackends::open(&config).context("failed to open storage backends")?;
    let storage = PermanentStorage::new(backends);
    storage.initialize(Some(config.options.clone())).await;

    match cli.command {
        Command::Inspect { namespace } => print_json(&storage.inspect(namespace).await)?,
        Command::Get { namespace } => {
            let value = storage.load_data::<Value>(namespace).await.unwrap_or(Value::Null);
            print_json(&value)?;
        }
        Command::Restore { namespace } => {
            let restored = storage.restore(namespace).await;
            print_json(&serde_json::json!({ "namespace": namespace, "restored": restored }))?;
        }
        Command::Clear { namespace } => {
            let cleared = storage.clear_data(namespace).await;
            print_json(&serde_json::json!({ "namespace": namespace, "cleared": cleared }))?;
        }
        Command::Export { file } => {
            let snapshot = storage.export_snapshot().await;
            fs::write(&file, serde_json::to_string_pretty(&snapshot)?)
                .with_context(|| format!("failed to write {}", file.display()))?;
            tracing::info!(file = %file.display(), namespaces = snapshot.namespaces.len(), "exported");
        }
        Command::Import { file } => {
            let contents = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let snapshot: Snapshot =
                serde_json::from_str(&contents).context("snapshot file is not valid")?;
            print_json(&storage.import_snapshot(&snapshot).await)?;
        }
        Command::Clients => {
            let clients = ClientStore::new(storage.clone());
            let outcome: Outcome<_> = clients.get_clients_data().await.into();
            print_json(&outcome)?;
        }
        Command::Keys => print_json(&storage.local().keys())?,
    }

    storage.settle().await;
    Ok(())
}

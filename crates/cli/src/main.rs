use std::env;
use std::fs::File;

use anyhow::{Context, Result};
use backup_status_cli::args::{parse_args, Command, Invocation, USAGE};
use backup_status_cli::commands;
use backup_status_cli::config::{self, Config};
use backup_status_storage::{open_status_store, StatusStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let argv: Vec<String> = env::args().skip(1).collect();
    let (config_path, command) = match parse_args(&argv)? {
        Invocation::Help => {
            println!("{USAGE}");
            return Ok(());
        }
        Invocation::Run {
            config_path,
            command,
        } => (config_path, command),
    };
    let cfg = match config_path {
        Some(path) => config::load_config(&path)?,
        None => Config::default(),
    };
    let location = cfg.store_location(|name| env::var(name).ok());

    info!(
        path = %location.path.display(),
        postgres = location.database_url.is_some(),
        "opening status store"
    );
    let store = open_status_store(&location.path, location.database_url.as_deref()).await?;

    let outcome = run(store.as_ref(), command).await;
    if let Err(e) = store.close().await {
        warn!(error = %e, "closing status store failed");
    }
    outcome
}

async fn run(store: &dyn StatusStore, command: Command) -> Result<()> {
    match command {
        Command::Get(collection) => match commands::get(store, &collection).await? {
            Some(result) => {
                let json = serde_json::to_string_pretty(&result).context("format backup result")?;
                println!("{json}");
            }
            None => info!(%collection, "no backup recorded"),
        },
        Command::Save(path) => {
            let result = match path {
                Some(path) => {
                    let file = File::open(&path)
                        .with_context(|| format!("open backup result file {}", path.display()))?;
                    commands::save_from_reader(store, file).await?
                }
                None => commands::save_from_reader(store, std::io::stdin()).await?,
            };
            info!(
                collection = %result.collection,
                run_id = %result.run_id,
                "backup result saved"
            );
        }
        Command::Plan(collection) => {
            let plan = commands::plan(store, &collection).await?;
            println!("{plan}");
        }
    }
    Ok(())
}

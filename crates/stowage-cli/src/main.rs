//! Stowage CLI: run uploads, deletes and moves through the upload pipeline.
//!
//! Reads configuration from the environment (see `UploadConfig::from_env`). Set DATABASE_URL
//! or pass `--dry-run` to keep metadata in memory.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use stowage_cli::{build_service, init_tracing, open_upload};
use stowage_core::UploadConfig;
use stowage_upload::{BatchEntry, BatchUpload, SingleUpload};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "stowage", about = "Upload pipeline CLI")]
struct Cli {
    /// Owner the files belong to
    #[arg(long, env = "STOWAGE_OWNER_ID", value_name = "UUID")]
    owner: Uuid,

    /// Keep metadata in memory instead of PostgreSQL
    #[arg(long, global = true)]
    dry_run: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload one file
    Upload {
        /// Path to the file to upload
        file: PathBuf,
        /// Target folder UUID
        #[arg(long)]
        folder: Option<Uuid>,
        /// Replace an existing file with the same name
        #[arg(long)]
        confirm_replace: bool,
        /// Inline thumbnail (kept for videos only)
        #[arg(long)]
        thumbnail: Option<String>,
    },
    /// Upload several files in one batch
    Batch {
        /// Paths of the files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Target folder UUID
        #[arg(long)]
        folder: Option<Uuid>,
    },
    /// Delete a file by ID
    Delete {
        /// File UUID
        id: Uuid,
    },
    /// Move a file into a folder, or to the root without --folder
    Move {
        /// File UUID
        id: Uuid,
        #[arg(long)]
        folder: Option<Uuid>,
    },
    /// Show storage usage against the quota
    Storage,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = UploadConfig::from_env().context("Invalid configuration")?;
    let service = build_service(config, cli.dry_run).await?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling uploads");
            on_signal.cancel();
        }
    });

    let owner_id = cli.owner;

    match cli.command {
        Commands::Upload {
            file,
            folder,
            confirm_replace,
            thumbnail,
        } => {
            let local = open_upload(&file).await?;
            let outcome = service
                .upload(
                    SingleUpload {
                        owner_id,
                        folder_id: folder,
                        name: local.name,
                        size: local.size,
                        confirm_replace,
                        thumbnail_data: thumbnail,
                        stream: local.stream,
                    },
                    &cancel,
                )
                .await
                .map_err(|e| anyhow::anyhow!(e.detailed_message()))?;
            print_json(&outcome)?;
        }
        Commands::Batch { files, folder } => {
            let mut entries = Vec::with_capacity(files.len());
            for path in &files {
                let local = open_upload(path).await?;
                entries.push(BatchEntry {
                    name: local.name,
                    size: local.size,
                    stream: local.stream,
                });
            }

            let report = service
                .upload_batch(
                    BatchUpload {
                        owner_id,
                        folder_id: folder,
                        files: entries,
                    },
                    &cancel,
                )
                .await
                .map_err(|e| anyhow::anyhow!(e.detailed_message()))?;
            print_json(&report)?;
        }
        Commands::Delete { id } => {
            let record = service
                .delete(owner_id, id)
                .await
                .map_err(|e| anyhow::anyhow!(e.detailed_message()))?;
            print_json(&serde_json::json!({
                "success": true,
                "message": format!("File {} deleted", record.name),
            }))?;
        }
        Commands::Move { id, folder } => {
            let record = service
                .move_to_folder(owner_id, id, folder)
                .await
                .map_err(|e| anyhow::anyhow!(e.detailed_message()))?;
            print_json(&record)?;
        }
        Commands::Storage => {
            let info = service
                .storage_info(owner_id)
                .await
                .map_err(|e| anyhow::anyhow!(e.detailed_message()))?;
            print_json(&info)?;
        }
    }

    Ok(())
}

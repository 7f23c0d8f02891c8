//! Certforge Worker - bulk certificate document generation
//!
//! This worker connects to NATS and processes generation jobs submitted by
//! the gateway. A local one-shot mode is available for operators via the
//! `generate` subcommand.

mod cli;
mod config;
mod defaults;
mod handlers;
mod services;
mod types;

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::services::assets::AssetPool;
use crate::services::orchestrator::{run_batch, BatchInput, ProgressSink};
use crate::services::render::HttpRenderService;
use crate::services::sheet::parse_sheet;
use crate::services::store_http::HttpRecordStore;
use crate::types::{DocumentKind, Progress};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    let config = config::Config::from_env()?;

    // Initialize logging - stdout always, optional daily-rolling file
    let _guard = init_logging(&config);

    info!("Starting Certforge Worker...");
    info!("Configuration loaded");

    match args.command {
        Some(cli::Command::Generate {
            sheet,
            logos,
            tenant,
            actor,
            kind,
            output,
        }) => run_local_generate(&config, sheet, logos, tenant, actor, kind.into(), output).await,
        Some(cli::Command::Serve) | None => serve(&config).await,
    }
}

fn init_logging(config: &config::Config) -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,certforge_worker=debug".into()),
    );

    if config.log_to_file {
        std::fs::create_dir_all(&config.log_dir).ok();

        // File appender for persistent logs (daily rotation)
        let file_appender = RollingFileAppender::new(Rotation::DAILY, &config.log_dir, "worker.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer()) // stdout
            .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false)) // file
            .init();
        Some(guard)
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
        None
    }
}

async fn serve(config: &config::Config) -> Result<()> {
    // Connect to NATS (supports optional NATS_USER/NATS_PASSWORD auth).
    let nats_client = match (std::env::var("NATS_USER"), std::env::var("NATS_PASSWORD")) {
        (Ok(user), Ok(password)) if !user.is_empty() => {
            async_nats::ConnectOptions::new()
                .user_and_password(user, password)
                .connect(&config.nats_url)
                .await?
        }
        _ => async_nats::connect(&config.nats_url).await?,
    };
    info!("Connected to NATS at {}", config.nats_url);

    // Start message handlers
    let handler_result = handlers::start_handlers(nats_client, config).await;

    if let Err(e) = handler_result {
        error!("Handler error: {}", e);
        return Err(e);
    }

    Ok(())
}

/// Progress printer for the one-shot mode
struct ConsoleProgressSink;

#[async_trait]
impl ProgressSink for ConsoleProgressSink {
    async fn progress(&self, progress: Progress) {
        if progress.total > 0 {
            info!("{} {}/{}", progress.stage, progress.current, progress.total);
        } else {
            info!("{}", progress.stage);
        }
    }
}

/// Run one batch against the configured services, bypassing the queue.
async fn run_local_generate(
    config: &config::Config,
    sheet_path: PathBuf,
    logos: Option<PathBuf>,
    tenant_id: Uuid,
    actor_id: Uuid,
    kind: DocumentKind,
    output: Option<PathBuf>,
) -> Result<()> {
    let sheet_name = sheet_path
        .file_name()
        .and_then(|n| n.to_str())
        .context("sheet path has no file name")?
        .to_string();
    let sheet_bytes = std::fs::read(&sheet_path)
        .with_context(|| format!("failed to read sheet {}", sheet_path.display()))?;
    let sheet = parse_sheet(&sheet_name, &sheet_bytes)?;
    info!("Parsed {} data rows from {}", sheet.rows.len(), sheet_name);

    let assets = match logos {
        Some(path) if path.is_dir() => AssetPool::from_dir(&path)?,
        Some(path) => {
            let zip_bytes = std::fs::read(&path)
                .with_context(|| format!("failed to read logo archive {}", path.display()))?;
            AssetPool::from_zip_bytes(&zip_bytes)?
        }
        None => AssetPool::default(),
    };
    if !assets.is_empty() {
        info!("Loaded {} logo files", assets.len());
    }

    let store = HttpRecordStore::new(&config.record_store_url, &config.internal_service_token);
    let renderer =
        HttpRenderService::new(&config.render_service_url, &config.internal_service_token);

    let input = BatchInput {
        sheet,
        assets,
        tenant_id,
        actor_id,
        kind,
        selection: None,
        overrides: HashMap::new(),
    };

    match run_batch(input, &store, &renderer, &ConsoleProgressSink, CancellationToken::new()).await
    {
        Ok(batch) => {
            let path = match output {
                Some(path) => path,
                None => PathBuf::from(batch.artifact.filename()),
            };
            std::fs::write(&path, batch.artifact.into_bytes())
                .with_context(|| format!("failed to write artifact to {}", path.display()))?;

            println!("{}", batch.report.summary());
            print_row_details(&batch.report);
            println!("Artifact written to {}", path.display());
            Ok(())
        }
        Err(e) => {
            if let Some(report) = e.report() {
                println!("{}", report.summary());
                print_row_details(report);
            }
            Err(e.into())
        }
    }
}

fn print_row_details(report: &crate::types::BatchReport) {
    for failure in &report.failures {
        println!("  row {}: {}", failure.row_number, failure.message);
    }
    for warning in &report.warnings {
        println!("  warning: {}", warning);
    }
}

//! NATS message handlers

pub mod generate;
pub mod ping;

use std::sync::Arc;

use anyhow::Result;
use async_nats::Client;
use tokio::select;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::services::job_processor::GenerateJobProcessor;
use crate::services::render::{HttpRenderService, RenderService};
use crate::services::store::RecordStore;
use crate::services::store_http::HttpRecordStore;

/// Start all message handlers
pub async fn start_handlers(client: Client, config: &Config) -> Result<()> {
    info!("Starting message handlers...");

    if config.worker_concurrency > 1 {
        warn!(
            "WORKER_CONCURRENCY={} requested; generation batches are processed one at a time",
            config.worker_concurrency
        );
    }

    // Shared backend clients
    let store: Arc<dyn RecordStore> = Arc::new(HttpRecordStore::new(
        &config.record_store_url,
        &config.internal_service_token,
    ));
    info!("Record store client ready: {}", config.record_store_url);

    let renderer: Arc<dyn RenderService> = Arc::new(HttpRenderService::new(
        &config.render_service_url,
        &config.internal_service_token,
    ));
    info!("Render service client ready: {}", config.render_service_url);

    // Subscribe to all subjects
    let ping_sub = client.subscribe("certforge.ping").await?;

    info!("Subscribed to NATS subjects");

    // Clone for each handler
    let client_ping = client.clone();

    // Spawn handlers
    let ping_handle = tokio::spawn(async move { ping::handle_ping(client_ping, ping_sub).await });

    // Start generation job processor (JetStream-based)
    let client_generate = client.clone();
    let store_generate = Arc::clone(&store);
    let renderer_generate = Arc::clone(&renderer);
    tokio::spawn(async move {
        match GenerateJobProcessor::new(
            client_generate.clone(),
            store_generate,
            renderer_generate,
        )
        .await
        {
            Ok(processor) => {
                let processor = Arc::new(processor);

                // Subscribe to generation job submit
                let generate_submit_sub =
                    match client_generate.subscribe("certforge.generate.submit").await {
                        Ok(sub) => sub,
                        Err(e) => {
                            error!("Failed to subscribe to generate.submit: {}", e);
                            return;
                        }
                    };

                // Start submit handler
                let client_submit = client_generate.clone();
                let processor_submit = Arc::clone(&processor);
                tokio::spawn(async move {
                    if let Err(e) = generate::handle_generate_submit(
                        client_submit,
                        generate_submit_sub,
                        processor_submit,
                    )
                    .await
                    {
                        error!("Generate submit handler error: {}", e);
                    }
                });

                // Start job processing
                let processor_main = Arc::clone(&processor);
                tokio::spawn(async move {
                    if let Err(e) = processor_main.start_processing().await {
                        error!("Generation job processor error: {}", e);
                    }
                });

                info!("Generation job processor started");
            }
            Err(e) => {
                error!("Failed to create generation job processor: {}", e);
            }
        }
    });

    // Start job management handlers (history, cancel)
    let client_generate_history = client.clone();
    let generate_history_sub = client.subscribe("certforge.generate.history").await?;
    let generate_history_handle = tokio::spawn(async move {
        if let Err(e) =
            generate::handle_generate_history(client_generate_history, generate_history_sub).await
        {
            error!("Generate history handler error: {}", e);
        }
    });

    let client_generate_cancel = client.clone();
    let generate_cancel_sub = client.subscribe("certforge.generate.cancel").await?;
    let generate_cancel_handle = tokio::spawn(async move {
        if let Err(e) =
            generate::handle_generate_cancel(client_generate_cancel, generate_cancel_sub).await
        {
            error!("Generate cancel handler error: {}", e);
        }
    });

    info!("All handlers started, waiting for messages...");

    // Wait for any handler to finish (which means an error occurred)
    select! {
        result = ping_handle => {
            error!("Ping handler finished: {:?}", result);
        }
        result = generate_history_handle => {
            error!("Generate history handler finished: {:?}", result);
        }
        result = generate_cancel_handle => {
            error!("Generate cancel handler finished: {:?}", result);
        }
    }

    Ok(())
}

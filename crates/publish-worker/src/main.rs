//! FreightPress Publish Worker
//!
//! Consumes the article-generation lane:
//! 1. Receives a body-generation task keyed by article id
//! 2. Re-validates the record's state
//! 3. Generates the body and performs the approved -> published transition
//!
//! Delivery is at-least-once. Retryable failures leave the message for the
//! queue's own redelivery/backoff; non-retryable ones are dropped after
//! logging so they cannot loop forever.

mod processor;

use crate::processor::PublishProcessor;
use freightpress_common::{
    config::AppConfig,
    db::{DbPool, PgArticleStore},
    generation::create_generator,
    metrics::{record_queue_message, register_metrics},
    queue::{BodyGenerationMessage, Queue, QueueConfig},
    retry::RetryPolicy,
    VERSION,
};
use std::sync::Arc;
use tracing::{error, info, warn, Level};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(true)
        .json()
        .init();

    info!("Starting FreightPress Publish Worker v{}", VERSION);

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        e
    })?;

    register_metrics();
    if let Err(e) = metrics_exporter_prometheus::PrometheusBuilder::new().install() {
        warn!(error = %e, "Prometheus exporter not installed");
    }

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    let store = Arc::new(PgArticleStore::new(db));

    // Initialize generator
    let generator = create_generator(&config.generation)?;
    info!(model = %generator.model_name(), "Generator initialized");

    // Initialize processor; the body stage normally runs a single attempt
    // per delivery and leans on the queue's redelivery for the rest.
    let retry = RetryPolicy::new(config.generation.body_max_attempts);
    let processor = PublishProcessor::new(store, generator, retry);

    // Connect to the dedicated article-generation lane
    let queue = match config.queue.article_queue_url.clone() {
        Some(url) => {
            info!(url = %url, "Connecting to article-generation queue...");
            Queue::new(QueueConfig::from_app_config(&config.queue, url)).await?
        }
        None => {
            warn!("queue.article_queue_url not set, waiting for shutdown signal...");
            tokio::signal::ctrl_c().await?;
            info!("Publish worker shutting down");
            return Ok(());
        }
    };

    info!("Publish worker ready, starting queue polling...");

    // Circuit breaker state
    let mut consecutive_failures = 0u32;
    const MAX_FAILURES: u32 = 5;
    const CIRCUIT_BREAK_DURATION: std::time::Duration = std::time::Duration::from_secs(30);

    // Start polling loop
    loop {
        // Circuit breaker check
        if consecutive_failures >= MAX_FAILURES {
            warn!(
                failures = consecutive_failures,
                "Circuit breaker open, pausing..."
            );
            tokio::time::sleep(CIRCUIT_BREAK_DURATION).await;
            consecutive_failures = 0;
            info!("Circuit breaker reset, resuming...");
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            result = queue.receive() => {
                match result {
                    Ok(messages) => {
                        for message in messages {
                            let Some(receipt_handle) = message.receipt_handle.clone() else {
                                warn!("Message without receipt handle, skipping");
                                continue;
                            };

                            let task: BodyGenerationMessage = match Queue::parse_message(&message) {
                                Ok(task) => task,
                                Err(e) => {
                                    // A message that cannot be parsed will never
                                    // succeed; drop it instead of redelivering.
                                    error!(error = %e, "Malformed task message, dropping");
                                    record_queue_message("malformed");
                                    if let Err(e) = queue.delete(&receipt_handle).await {
                                        error!(error = %e, "Failed to delete message");
                                    }
                                    continue;
                                }
                            };

                            info!(article_id = %task.article_id, "Received body generation task");

                            match processor.process(task.article_id).await {
                                Ok(outcome) => {
                                    consecutive_failures = 0;
                                    record_queue_message("processed");
                                    info!(article_id = %task.article_id, ?outcome, "Task complete");
                                    if let Err(e) = queue.delete(&receipt_handle).await {
                                        error!(error = %e, "Failed to delete message");
                                    }
                                }
                                Err(e) if e.is_retryable() => {
                                    consecutive_failures += 1;
                                    record_queue_message("retryable_failure");
                                    error!(
                                        article_id = %task.article_id,
                                        error = %e,
                                        failures = consecutive_failures,
                                        "Task failed, leaving message for redelivery"
                                    );
                                    // Message stays on the queue; visibility
                                    // timeout and the DLQ policy take it from here.
                                }
                                Err(e) => {
                                    consecutive_failures = 0;
                                    record_queue_message("dropped");
                                    error!(
                                        article_id = %task.article_id,
                                        error = %e,
                                        "Task failed permanently, dropping message"
                                    );
                                    if let Err(e) = queue.delete(&receipt_handle).await {
                                        error!(error = %e, "Failed to delete message");
                                    }
                                }
                            }
                        }
                    }
                    Err(e) => {
                        consecutive_failures += 1;
                        error!(error = %e, "Failed to receive messages from queue");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    }
                }
            }
        }
    }

    info!("Publish worker shutting down");
    Ok(())
}

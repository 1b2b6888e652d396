//! FreightPress Draft Batch
//!
//! Stage one of the article pipeline:
//! 1. Builds the category-constrained prompt
//! 2. Calls the generation service with bounded retries per item
//! 3. Persists one draft article per successful, valid payload
//!
//! Invoked by an operator or scheduler: `draft-batch [count]`.

mod generator;

use crate::generator::DraftBatchGenerator;
use freightpress_common::{
    config::AppConfig,
    db::{DbPool, PgArticleStore},
    generation::create_generator,
    metrics::register_metrics,
    retry::RetryPolicy,
    VERSION,
};
use std::sync::Arc;
use tracing::{info, Level};

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

    info!("Starting FreightPress Draft Batch v{}", VERSION);

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        e
    })?;

    register_metrics();

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    let store = Arc::new(PgArticleStore::new(db));

    // Initialize generator
    let generator = create_generator(&config.generation)?;
    info!(model = %generator.model_name(), "Generator initialized");

    // Batch count from argv, falling back to the configured default
    let batch_count = match std::env::args().nth(1) {
        Some(arg) => arg.parse::<u32>().map_err(|e| {
            tracing::error!(arg = %arg, "Batch count must be a non-negative integer");
            e
        })?,
        None => config.batch.default_count,
    };

    let retry = RetryPolicy::new(config.generation.draft_max_attempts);
    let batch = DraftBatchGenerator::new(store, generator, retry);

    let summary = batch.generate_drafts(batch_count).await;

    info!(
        requested = summary.requested,
        created = summary.created,
        skipped = summary.skipped,
        "Draft batch finished"
    );

    Ok(())
}

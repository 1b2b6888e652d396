//! FreightPress Common Library
//!
//! Shared code for the FreightPress services including:
//! - Database entity and article store
//! - Generation client abstraction
//! - Retry policy for upstream calls
//! - Error types and handling
//! - Configuration management
//! - Queue integration for the article-generation lane
//! - Metrics and observability

pub mod config;
pub mod db;
pub mod errors;
pub mod generation;
pub mod metrics;
pub mod queue;
pub mod retry;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{ArticleStore, MemoryArticleStore, PgArticleStore};
pub use errors::{AppError, Result};
pub use generation::TextGenerator;
pub use retry::RetryPolicy;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default generation model
pub const DEFAULT_GENERATION_MODEL: &str = "gemini-2.5-flash";

/// Default generation API base URL
pub const DEFAULT_GENERATION_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

//! Body generation processor
//!
//! Executes one queued task: re-validate the article's state, generate the
//! body, and perform the approved -> published transition. The worker loop
//! decides what each error means for the queue message; this module only
//! classifies them.

use freightpress_common::db::models::{Article, ArticleStatus};
use freightpress_common::db::ArticleStore;
use freightpress_common::generation::schema::{body_schema, BodyPayload};
use freightpress_common::generation::TextGenerator;
use freightpress_common::metrics::record_publish;
use freightpress_common::retry::{RetryPolicy, Sleeper, TokioSleeper};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// What one task execution did to the record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Body written, status advanced to published
    Published,
    /// Record was not in `approved`; nothing touched. Covers duplicate
    /// deliveries, records that already advanced, and never-approved ids.
    Skipped,
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Article not found: {0}")]
    ArticleNotFound(Uuid),

    #[error("Body generation failed for article {0}")]
    GenerationFailed(Uuid),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl PublishError {
    /// Whether the queue should redeliver the task. Generation and database
    /// hiccups are worth another delivery; a missing record is not, since
    /// retrying cannot resurrect the id.
    pub fn is_retryable(&self) -> bool {
        match self {
            PublishError::ArticleNotFound(_) => false,
            PublishError::GenerationFailed(_) => true,
            PublishError::DatabaseError(_) => true,
        }
    }
}

/// Body generation processor
pub struct PublishProcessor {
    store: Arc<dyn ArticleStore>,
    generator: Arc<dyn TextGenerator>,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl PublishProcessor {
    pub fn new(
        store: Arc<dyn ArticleStore>,
        generator: Arc<dyn TextGenerator>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            generator,
            retry,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replace the backoff sleeper; tests use this to skip real delays
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Body prompt built from the draft's own metadata
    fn body_prompt(article: &Article) -> String {
        format!(
            "Write the full body of a blog article for a light-freight delivery \
             service, in plain prose ready to publish.\n\
             \n\
             The readers are decision-makers at companies evaluating light-freight \
             carriers for outsourcing or partnership. Keep the content practical \
             and understandable outside the industry.\n\
             \n\
             Title: {}\n\
             Summary: {}\n\
             SEO keyword: {}\n\
             Category: {}",
            article.title, article.description, article.keyword, article.choice
        )
    }

    /// Process one task execution
    #[instrument(skip(self), fields(article_id = %article_id))]
    pub async fn process(&self, article_id: Uuid) -> Result<PublishOutcome, PublishError> {
        let article = self
            .store
            .find_by_id(article_id)
            .await
            .map_err(|e| PublishError::DatabaseError(e.to_string()))?
            .ok_or(PublishError::ArticleNotFound(article_id))?;

        // Only approved records may generate a body. Anything else is a
        // duplicate or stale delivery and must stay untouched.
        let status = article.article_status();
        if status != ArticleStatus::Approved {
            info!(?status, "Article not approved, skipping");
            return Ok(PublishOutcome::Skipped);
        }

        info!("Starting body generation");

        let prompt = Self::body_prompt(&article);
        let schema = body_schema();

        let raw = self
            .retry
            .run(self.sleeper.as_ref(), || {
                let generator = self.generator.clone();
                let prompt = prompt.clone();
                let schema = schema.clone();
                async move { generator.generate(&prompt, &schema).await }
            })
            .await;

        let Some(raw) = raw else {
            record_publish(false);
            return Err(PublishError::GenerationFailed(article_id));
        };

        let payload = BodyPayload::parse(&raw).map_err(|e| {
            warn!(error = %e, "Body payload rejected");
            record_publish(false);
            PublishError::GenerationFailed(article_id)
        })?;

        // Single conditional update: body, status, and published_at land
        // together or not at all.
        let published = self
            .store
            .publish_if_approved(article_id, &payload.body)
            .await
            .map_err(|e| PublishError::DatabaseError(e.to_string()))?;

        if published {
            info!("Body generated and article published");
            record_publish(true);
            Ok(PublishOutcome::Published)
        } else {
            // A concurrent delivery won the race between our status read and
            // the update. The record is already past approved; nothing to do.
            info!("Article no longer approved at update time, skipping");
            Ok(PublishOutcome::Skipped)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use freightpress_common::db::models::Category;
    use freightpress_common::db::MemoryArticleStore;
    use freightpress_common::generation::MockGenerator;
    use freightpress_common::retry::NoopSleeper;

    fn article(id: Uuid, status: ArticleStatus) -> Article {
        let now = chrono::Utc::now();
        Article {
            id,
            title: "Cutting delivery costs without cutting reliability".to_string(),
            description: "Levers shippers can pull when renegotiating contracts".to_string(),
            keyword: "delivery cost optimization".to_string(),
            choice: Category::CostOptimization.as_str().to_string(),
            body: None,
            status: String::from(status),
            published_at: None,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    fn processor(
        store: Arc<MemoryArticleStore>,
        generator: Arc<MockGenerator>,
    ) -> PublishProcessor {
        PublishProcessor::new(store, generator, RetryPolicy::single_attempt())
            .with_sleeper(Arc::new(NoopSleeper))
    }

    #[tokio::test]
    async fn test_draft_record_is_a_noop() {
        let store = Arc::new(MemoryArticleStore::new());
        let generator = Arc::new(MockGenerator::always(r#"{"body":"text"}"#));
        let id = Uuid::new_v4();
        store.insert(article(id, ArticleStatus::Draft));

        let outcome = processor(store.clone(), generator.clone())
            .process(id)
            .await
            .unwrap();

        assert_eq!(outcome, PublishOutcome::Skipped);
        // No generation call was made for the unapproved record
        assert_eq!(generator.calls(), 0);

        let record = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(record.article_status(), ArticleStatus::Draft);
        assert!(record.body.is_none());
    }

    #[tokio::test]
    async fn test_published_record_is_a_noop() {
        let store = Arc::new(MemoryArticleStore::new());
        let generator = Arc::new(MockGenerator::always(r#"{"body":"text"}"#));
        let id = Uuid::new_v4();
        let mut existing = article(id, ArticleStatus::Published);
        existing.body = Some("original body".to_string());
        store.insert(existing);

        let outcome = processor(store.clone(), generator.clone())
            .process(id)
            .await
            .unwrap();

        assert_eq!(outcome, PublishOutcome::Skipped);
        assert_eq!(generator.calls(), 0);

        let record = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(record.body.as_deref(), Some("original body"));
    }

    #[tokio::test]
    async fn test_approved_record_publishes_atomically() {
        let store = Arc::new(MemoryArticleStore::new());
        let generator = Arc::new(MockGenerator::always(r#"{"body":"generated body"}"#));
        let id = Uuid::new_v4();
        store.insert(article(id, ArticleStatus::Approved));

        let before = chrono::Utc::now();
        let outcome = processor(store.clone(), generator).process(id).await.unwrap();

        assert_eq!(outcome, PublishOutcome::Published);

        let record = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(record.article_status(), ArticleStatus::Published);
        assert_eq!(record.body.as_deref(), Some("generated body"));
        assert!(record.published_at.unwrap() >= before);
    }

    #[tokio::test]
    async fn test_generation_failure_leaves_record_unchanged() {
        let store = Arc::new(MemoryArticleStore::new());
        let generator = Arc::new(MockGenerator::never());
        let id = Uuid::new_v4();
        store.insert(article(id, ArticleStatus::Approved));

        let err = processor(store.clone(), generator).process(id).await.unwrap_err();

        assert!(matches!(err, PublishError::GenerationFailed(failed_id) if failed_id == id));
        assert!(err.is_retryable());

        let record = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(record.article_status(), ArticleStatus::Approved);
        assert!(record.body.is_none());
        assert!(record.published_at.is_none());
    }

    #[tokio::test]
    async fn test_malformed_body_payload_is_a_generation_failure() {
        let store = Arc::new(MemoryArticleStore::new());
        let generator = Arc::new(MockGenerator::always(r#"{"body":""}"#));
        let id = Uuid::new_v4();
        store.insert(article(id, ArticleStatus::Approved));

        let err = processor(store.clone(), generator).process(id).await.unwrap_err();

        assert!(matches!(err, PublishError::GenerationFailed(_)));

        let record = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(record.article_status(), ArticleStatus::Approved);
    }

    #[tokio::test]
    async fn test_missing_record_is_fatal_and_not_retryable() {
        let store = Arc::new(MemoryArticleStore::new());
        let generator = Arc::new(MockGenerator::always(r#"{"body":"text"}"#));

        let err = processor(store, generator).process(Uuid::new_v4()).await.unwrap_err();

        assert!(matches!(err, PublishError::ArticleNotFound(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_body_retry_budget_comes_from_policy() {
        let store = Arc::new(MemoryArticleStore::new());
        let generator = Arc::new(MockGenerator::with_responses(vec![
            None,
            Some(r#"{"body":"second try"}"#.to_string()),
        ]));
        let id = Uuid::new_v4();
        store.insert(article(id, ArticleStatus::Approved));

        let processor = PublishProcessor::new(store.clone(), generator.clone(), RetryPolicy::new(2))
            .with_sleeper(Arc::new(NoopSleeper));

        let outcome = processor.process(id).await.unwrap();

        assert_eq!(outcome, PublishOutcome::Published);
        assert_eq!(generator.calls(), 2);
    }

    #[test]
    fn test_body_prompt_carries_draft_fields() {
        let record = article(Uuid::new_v4(), ArticleStatus::Approved);
        let prompt = PublishProcessor::body_prompt(&record);

        assert!(prompt.contains(&record.title));
        assert!(prompt.contains(&record.description));
        assert!(prompt.contains(&record.keyword));
        assert!(prompt.contains(&record.choice));
    }
}

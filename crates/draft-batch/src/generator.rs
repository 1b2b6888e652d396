//! Draft batch generator
//!
//! Drives the stage-one loop: build the category-constrained prompt, call
//! the generation service through the retry policy, decode the structured
//! payload, and persist one draft per success. The batch is best-effort and
//! latency-tolerant; a failed item is logged and skipped, never fatal.

use freightpress_common::db::models::Category;
use freightpress_common::db::ArticleStore;
use freightpress_common::generation::schema::{draft_schema, DraftPayload};
use freightpress_common::generation::TextGenerator;
use freightpress_common::metrics::record_draft_item;
use freightpress_common::retry::{RetryPolicy, Sleeper, TokioSleeper};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Outcome counts for one batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub requested: u32,
    pub created: u32,
    pub skipped: u32,
}

/// Stage-one batch generator
pub struct DraftBatchGenerator {
    store: Arc<dyn ArticleStore>,
    generator: Arc<dyn TextGenerator>,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl DraftBatchGenerator {
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

    /// The draft prompt. The category list appears verbatim so the model
    /// picks from it; the response schema enforces the same set.
    pub fn draft_prompt() -> String {
        format!(
            "Generate a blog article theme, summary, SEO keyword, and category \
             for a light-freight delivery service.\n\
             \n\
             The readers are decision-makers at companies evaluating light-freight \
             carriers for outsourcing or partnership, such as shippers and IT \
             vendors. This is not content for job seekers or for the carriers \
             themselves.\n\
             \n\
             Spread themes evenly across the category list below. Keep every theme \
             understandable outside the industry and useful in day-to-day work; \
             avoid highly specialized or academic topics.\n\
             \n\
             Focus on what helps the readers decide on ordering or partnering: \
             carrier selection criteria, benefits, market movements, and risk \
             management.\n\
             \n\
             Pick the category from exactly this list: {}",
            Category::labels().join(", ")
        )
    }

    /// Run the batch loop. Strictly sequential; per-item failures are
    /// absorbed here and only show up in the summary and the logs.
    #[instrument(skip(self))]
    pub async fn generate_drafts(&self, batch_count: u32) -> BatchSummary {
        info!(batch_count, "Starting draft batch");

        let prompt = Self::draft_prompt();
        let schema = draft_schema();
        let mut created = 0u32;

        for item in 0..batch_count {
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
                warn!(item, "Generation attempts exhausted, item dropped");
                record_draft_item(false, "generation");
                continue;
            };

            let draft = match DraftPayload::parse(&raw) {
                Ok(payload) => payload,
                Err(e) => {
                    error!(item, error = %e, response = %raw, "Payload rejected, item dropped");
                    record_draft_item(false, "parse");
                    continue;
                }
            };

            let new_draft = match draft.into_new_draft() {
                Ok(new_draft) => new_draft,
                Err(e) => {
                    error!(item, error = %e, "Payload rejected, item dropped");
                    record_draft_item(false, "parse");
                    continue;
                }
            };

            match self.store.create_draft(new_draft).await {
                Ok(article) => {
                    info!(item, article_id = %article.id, category = %article.choice, "Draft created");
                    record_draft_item(true, "");
                    created += 1;
                }
                Err(e) => {
                    error!(item, error = %e, "Draft persistence failed, item dropped");
                    record_draft_item(false, "persistence");
                }
            }
        }

        let summary = BatchSummary {
            requested: batch_count,
            created,
            skipped: batch_count - created,
        };

        info!(
            requested = summary.requested,
            created = summary.created,
            skipped = summary.skipped,
            "Draft batch complete"
        );

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use freightpress_common::db::models::ArticleStatus;
    use freightpress_common::db::MemoryArticleStore;
    use freightpress_common::generation::MockGenerator;
    use freightpress_common::retry::NoopSleeper;

    fn payload(category: &str) -> String {
        format!(
            r#"{{"title":"t","description":"d","keyword":"k","category":"{}"}}"#,
            category
        )
    }

    fn batch(
        store: Arc<MemoryArticleStore>,
        generator: Arc<MockGenerator>,
        attempts: u32,
    ) -> DraftBatchGenerator {
        DraftBatchGenerator::new(store, generator, RetryPolicy::new(attempts))
            .with_sleeper(Arc::new(NoopSleeper))
    }

    #[tokio::test]
    async fn test_batch_of_five_all_succeed() {
        let store = Arc::new(MemoryArticleStore::new());
        let generator = Arc::new(MockGenerator::always(&payload("cost optimization")));

        let summary = batch(store.clone(), generator.clone(), 3)
            .generate_drafts(5)
            .await;

        assert_eq!(summary.created, 5);
        assert_eq!(summary.skipped, 0);
        assert_eq!(store.len(), 5);
        // One attempt per item when generation succeeds immediately
        assert_eq!(generator.calls(), 5);

        for article in store.all() {
            assert_eq!(article.article_status(), ArticleStatus::Draft);
            assert_eq!(article.choice, "cost optimization");
            assert!(article.body.is_none());
            assert!(article.published_at.is_none());
        }
    }

    #[tokio::test]
    async fn test_batch_with_every_attempt_failing() {
        let store = Arc::new(MemoryArticleStore::new());
        let generator = Arc::new(MockGenerator::never());

        let summary = batch(store.clone(), generator.clone(), 3)
            .generate_drafts(4)
            .await;

        assert_eq!(summary.created, 0);
        assert_eq!(summary.skipped, 4);
        assert!(store.is_empty());
        // All retry attempts were spent on every item
        assert_eq!(generator.calls(), 12);
    }

    #[tokio::test]
    async fn test_item_recovers_within_retry_budget() {
        let store = Arc::new(MemoryArticleStore::new());
        let generator = Arc::new(MockGenerator::with_responses(vec![
            None,
            None,
            Some(payload("market trends")),
        ]));

        let summary = batch(store.clone(), generator.clone(), 3)
            .generate_drafts(1)
            .await;

        assert_eq!(summary.created, 1);
        assert_eq!(generator.calls(), 3);
        assert_eq!(store.all()[0].category(), Some(Category::MarketTrends));
    }

    #[tokio::test]
    async fn test_parse_failure_drops_item_and_batch_continues() {
        let store = Arc::new(MemoryArticleStore::new());
        let generator = Arc::new(MockGenerator::with_responses(vec![
            Some("not json".to_string()),
            Some(payload("logistics DX")),
        ]));

        let summary = batch(store.clone(), generator, 1).generate_drafts(2).await;

        assert_eq!(summary.created, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_out_of_set_category_never_persisted() {
        let store = Arc::new(MemoryArticleStore::new());
        let generator = Arc::new(MockGenerator::always(&payload("crypto trading")));

        let summary = batch(store.clone(), generator, 1).generate_drafts(3).await;

        assert_eq!(summary.created, 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_prompt_carries_the_category_list() {
        let prompt = DraftBatchGenerator::draft_prompt();
        for label in Category::labels() {
            assert!(prompt.contains(label));
        }
    }
}

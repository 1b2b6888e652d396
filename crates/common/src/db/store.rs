//! Article store - the persistence boundary of the generation pipeline
//!
//! Exposes the three operations the pipeline relies on: draft creation,
//! lookup by id, and the conditional publish update. The publish update is a
//! single statement so no observer ever sees `published` without a body.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::Result;
use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DbBackend, EntityTrait, Set, Statement};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Fields for a new draft record
///
/// The category is typed, so a draft outside the fixed set cannot reach the
/// store in the first place.
#[derive(Debug, Clone)]
pub struct NewDraft {
    pub title: String,
    pub description: String,
    pub keyword: String,
    pub category: Category,
}

/// Persistence operations used by the batch generator and the publish worker
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Insert a new article in `draft` status with no body
    async fn create_draft(&self, draft: NewDraft) -> Result<Article>;

    /// Find an article by ID
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Article>>;

    /// Atomically set body, status and published_at, only while the record
    /// is still `approved`. Returns false when zero rows matched, which is
    /// a safe no-op for the caller (another delivery won the race, or the
    /// record never reached `approved`).
    async fn publish_if_approved(&self, id: Uuid, body: &str) -> Result<bool>;
}

/// Postgres-backed article store
#[derive(Clone)]
pub struct PgArticleStore {
    pool: DbPool,
}

impl PgArticleStore {
    /// Create a new store with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArticleStore for PgArticleStore {
    async fn create_draft(&self, draft: NewDraft) -> Result<Article> {
        let article_id = Uuid::new_v4();
        let now = chrono::Utc::now();

        let article = ArticleActiveModel {
            id: Set(article_id),
            title: Set(draft.title),
            description: Set(draft.description),
            keyword: Set(draft.keyword),
            choice: Set(draft.category.as_str().to_string()),
            body: Set(None),
            status: Set(String::from(ArticleStatus::Draft)),
            published_at: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        article.insert(self.pool.conn()).await.map_err(Into::into)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Article>> {
        ArticleEntity::find_by_id(id)
            .one(self.pool.conn())
            .await
            .map_err(Into::into)
    }

    async fn publish_if_approved(&self, id: Uuid, body: &str) -> Result<bool> {
        let now = chrono::Utc::now();

        // Conditional update: the status guard and the write are one
        // statement, so concurrent deliveries cannot double-publish.
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            UPDATE articles
            SET body = $2, status = 'published', published_at = $3, updated_at = $3
            WHERE id = $1 AND status = 'approved'
            "#,
            vec![id.into(), body.into(), now.into()],
        );

        let result = self.pool.conn().execute(stmt).await?;

        Ok(result.rows_affected() > 0)
    }
}

/// In-memory article store for tests and queue-less local runs
#[derive(Default)]
pub struct MemoryArticleStore {
    articles: Mutex<HashMap<Uuid, Article>>,
}

impl MemoryArticleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an article as-is, bypassing the draft path. Lets tests stage
    /// records in `approved` or `published` status directly.
    pub fn insert(&self, article: Article) {
        self.articles.lock().unwrap().insert(article.id, article);
    }

    /// Snapshot of all stored articles
    pub fn all(&self) -> Vec<Article> {
        self.articles.lock().unwrap().values().cloned().collect()
    }

    /// Number of stored articles
    pub fn len(&self) -> usize {
        self.articles.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ArticleStore for MemoryArticleStore {
    async fn create_draft(&self, draft: NewDraft) -> Result<Article> {
        let now = chrono::Utc::now();

        let article = Article {
            id: Uuid::new_v4(),
            title: draft.title,
            description: draft.description,
            keyword: draft.keyword,
            choice: draft.category.as_str().to_string(),
            body: None,
            status: String::from(ArticleStatus::Draft),
            published_at: None,
            created_at: now.into(),
            updated_at: now.into(),
        };

        self.articles
            .lock()
            .unwrap()
            .insert(article.id, article.clone());

        Ok(article)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Article>> {
        Ok(self.articles.lock().unwrap().get(&id).cloned())
    }

    async fn publish_if_approved(&self, id: Uuid, body: &str) -> Result<bool> {
        let now = chrono::Utc::now();
        let mut articles = self.articles.lock().unwrap();

        match articles.get_mut(&id) {
            Some(article) if article.article_status() == ArticleStatus::Approved => {
                article.body = Some(body.to_string());
                article.status = String::from(ArticleStatus::Published);
                article.published_at = Some(now.into());
                article.updated_at = now.into();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

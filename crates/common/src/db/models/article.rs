//! Article entity and its state machine

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Article status enum
///
/// Forward-only lifecycle: draft -> approved -> published. The approval
/// transition belongs to the content-management surface; this crate only
/// creates drafts and performs the publish transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    Draft,
    Approved,
    Published,
}

impl From<String> for ArticleStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "draft" => ArticleStatus::Draft,
            "approved" => ArticleStatus::Approved,
            "published" => ArticleStatus::Published,
            _ => ArticleStatus::Draft,
        }
    }
}

impl From<ArticleStatus> for String {
    fn from(status: ArticleStatus) -> Self {
        match status {
            ArticleStatus::Draft => "draft".to_string(),
            ArticleStatus::Approved => "approved".to_string(),
            ArticleStatus::Published => "published".to_string(),
        }
    }
}

/// Fixed category set for generated articles
///
/// The list is embedded in every draft prompt and enforced server-side via
/// the response schema enum; a record outside this set is never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    PartnerSelection,
    LogisticsDx,
    OrderRiskCompliance,
    MarketTrends,
    CostOptimization,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::PartnerSelection,
        Category::LogisticsDx,
        Category::OrderRiskCompliance,
        Category::MarketTrends,
        Category::CostOptimization,
    ];

    /// The label stored in the database and sent to the generation service
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::PartnerSelection => "partner selection",
            Category::LogisticsDx => "logistics DX",
            Category::OrderRiskCompliance => "order risk & compliance",
            Category::MarketTrends => "market trends",
            Category::CostOptimization => "cost optimization",
        }
    }

    /// Parse a label back into a category
    pub fn parse(s: &str) -> Option<Category> {
        Category::ALL.iter().copied().find(|c| c.as_str() == s)
    }

    /// All labels, in declaration order
    pub fn labels() -> [&'static str; 5] {
        [
            Category::PartnerSelection.as_str(),
            Category::LogisticsDx.as_str(),
            Category::OrderRiskCompliance.as_str(),
            Category::MarketTrends.as_str(),
            Category::CostOptimization.as_str(),
        ]
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "articles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    #[sea_orm(column_type = "Text")]
    pub keyword: String,

    /// Category label, always a member of [`Category::ALL`]
    #[sea_orm(column_type = "Text")]
    pub choice: String,

    /// Absent until the publish stage succeeds
    #[sea_orm(column_type = "Text", nullable)]
    pub body: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    /// Set exactly once, together with `body`, at the publish transition
    pub published_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Get the article status as an enum
    pub fn article_status(&self) -> ArticleStatus {
        ArticleStatus::from(self.status.clone())
    }

    /// Get the category as an enum
    pub fn category(&self) -> Option<Category> {
        Category::parse(&self.choice)
    }

    /// Check if the article is in its terminal state
    pub fn is_published(&self) -> bool {
        self.article_status() == ArticleStatus::Published
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [ArticleStatus::Draft, ArticleStatus::Approved, ArticleStatus::Published] {
            let s: String = status.into();
            assert_eq!(ArticleStatus::from(s), status);
        }
    }

    #[test]
    fn test_unknown_status_falls_back_to_draft() {
        assert_eq!(ArticleStatus::from("rejected".to_string()), ArticleStatus::Draft);
    }

    #[test]
    fn test_category_round_trip() {
        for category in Category::ALL {
            assert_eq!(Category::parse(category.as_str()), Some(category));
        }
    }

    #[test]
    fn test_category_rejects_unknown_label() {
        assert_eq!(Category::parse("seo strategy"), None);
    }

    #[test]
    fn test_category_labels_order() {
        let labels = Category::labels();
        assert_eq!(labels.len(), 5);
        assert_eq!(labels[0], "partner selection");
        assert_eq!(labels[4], "cost optimization");
    }
}

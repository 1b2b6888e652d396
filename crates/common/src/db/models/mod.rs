//! SeaORM entity models
//!
//! Database entities for FreightPress

mod article;

pub use article::{
    ArticleStatus,
    Category,
    Entity as ArticleEntity,
    Model as Article,
    ActiveModel as ArticleActiveModel,
    Column as ArticleColumn,
};

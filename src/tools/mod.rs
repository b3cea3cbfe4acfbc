//! Tool infrastructure: schema, registry, and the concrete tool sets.
//!
//! Every tool implements [`Tool`]; a [`ToolRegistry`] validates arguments
//! against the published [`ToolDescriptor`] before a handler runs.

pub mod news;
pub mod registry;
pub mod schema;
pub mod store;

pub use registry::{Tool, ToolRegistry};
pub use schema::{ParamDef, ParamType, ToolDescriptor};
pub use store::{GuardedStore, QueryOutcome, QueryTool, SqliteStore, StatementStore};
pub use news::{FeedHeadlines, HeadlineSource, WikipediaSummaryTool};

use crate::types::Result;
use std::sync::Arc;
use std::time::Duration;

/// Registry holding the four people-store query tools over a SQLite file.
///
/// `strict` wraps the store so each tool only runs its own statement kind.
pub fn store_registry(db_path: &str, strict: bool) -> Result<ToolRegistry> {
    let sqlite = SqliteStore::new(db_path);
    let store: Arc<dyn StatementStore> = if strict {
        Arc::new(GuardedStore::new(sqlite))
    } else {
        Arc::new(sqlite)
    };
    let mut registry = ToolRegistry::new();
    store::register_query_tools(&mut registry, store)?;
    Ok(registry)
}

/// Registry holding the news/reference tools backed by live HTTP sources.
pub fn news_registry(http_timeout: Duration) -> Result<ToolRegistry> {
    let headlines: Arc<dyn HeadlineSource> = Arc::new(FeedHeadlines::new(http_timeout)?);
    let wikipedia = WikipediaSummaryTool::new(news::WIKIPEDIA_API, http_timeout)?;
    let mut registry = ToolRegistry::new();
    news::register_news_tools(&mut registry, headlines, wikipedia)?;
    Ok(registry)
}

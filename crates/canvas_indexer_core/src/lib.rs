//! Core of the canvas backlink indexer.
//! Crawls curation activity streams into a spatial index and answers
//! backlink queries over it.

pub mod config;
pub mod crawl;
pub mod db;
pub mod fetch;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, FetchConfig, IndexerConfig};
pub use crawl::{CrawlError, CrawlSummary, Crawler, FeedCrawlReport, FeedRunLocks};
pub use db::{open_db, open_db_in_memory, DbError};
pub use fetch::{DocumentFetcher, FetchError, HttpFetcher, RetryPolicy};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::activity::{Activity, ActivityKind};
pub use model::region::{Region, RegionParseError};
pub use repo::curation_repo::{CurationStore, SqliteCurationStore};
pub use repo::cursor_repo::{CursorStore, SqliteCursorStore};
pub use repo::{RepoError, RepoResult};
pub use service::backlink_document::{build_backlink_document, BacklinkDocumentOptions};
pub use service::indexer::{ApplyOutcome, CurationIndexer, IndexError};
pub use service::spatial_query::{AreaBacklinks, CanvasBacklinks, SpatialQuery};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

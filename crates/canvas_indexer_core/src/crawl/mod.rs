//! Incremental activity-stream crawling.
//!
//! # Responsibility
//! - Walk each feed newest-first (`paginator`), select unprocessed curation
//!   activities (`filter`), apply them (`crawler`) and advance the cursor.
//! - Keep overlapping runs of one feed apart (`locks`).
//!
//! # Invariants
//! - Feeds are processed one after another; a failing feed never stops the
//!   remaining feeds.
//! - A feed run is atomic: it commits index changes and cursor together or
//!   rolls both back.

use crate::fetch::{DerefError, FetchError};
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod crawler;
pub mod filter;
pub mod locks;
pub mod paginator;

pub use crawler::{CrawlSummary, Crawler, FeedCrawlReport};
pub use filter::{ActivityFilter, Selection, SkipReason};
pub use locks::{FeedRunGuard, FeedRunLocks};
pub use paginator::{FeedPage, FeedPages, PageError};

/// Failure that aborts one feed run. The feed's cursor stays unchanged.
#[derive(Debug)]
pub enum CrawlError {
    /// Another run of the same feed is in progress.
    AlreadyRunning(String),
    /// The feed's collection document could not be fetched.
    Feed(FetchError),
    /// A page of the feed could not be dereferenced.
    Page(DerefError),
    /// The feed has more pages than one run may walk; nothing is applied.
    PageCapReached { max_pages: usize },
    /// Index or cursor persistence failed.
    Store(RepoError),
}

impl Display for CrawlError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyRunning(feed_url) => write!(f, "feed already being crawled: {feed_url}"),
            Self::Feed(err) => write!(f, "feed unavailable: {err}"),
            Self::Page(err) => write!(f, "feed page unavailable: {err}"),
            Self::PageCapReached { max_pages } => {
                write!(f, "feed exceeds the page cap of {max_pages}")
            }
            Self::Store(err) => write!(f, "store failure: {err}"),
        }
    }
}

impl Error for CrawlError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::AlreadyRunning(_) | Self::PageCapReached { .. } => None,
            Self::Feed(err) => Some(err),
            Self::Page(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<RepoError> for CrawlError {
    fn from(value: RepoError) -> Self {
        Self::Store(value)
    }
}

impl From<PageError> for CrawlError {
    fn from(value: PageError) -> Self {
        match value {
            PageError::Unavailable(err) => Self::Page(err),
            PageError::CapReached { max_pages } => Self::PageCapReached { max_pages },
        }
    }
}

impl From<rusqlite::Error> for CrawlError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Store(RepoError::from(value))
    }
}

impl CrawlError {
    /// Stable snake_case code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyRunning(_) => "already_running",
            Self::Feed(_) => "feed_fetch_failed",
            Self::Page(_) => "page_deref_failed",
            Self::PageCapReached { .. } => "page_cap_reached",
            Self::Store(_) => "store_failed",
        }
    }
}

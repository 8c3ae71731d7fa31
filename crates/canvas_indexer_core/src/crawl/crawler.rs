//! Crawl orchestration over all configured feeds.
//!
//! # Responsibility
//! - Run one feed at a time: load cursor, walk pages, apply selected
//!   activities, persist the new cursor.
//! - Report per-feed outcomes without letting one feed abort the others.
//!
//! # Invariants
//! - Each feed run executes inside one `IMMEDIATE` transaction; index
//!   changes and the cursor commit together or not at all.
//! - A curation that cannot be fetched is skipped; store failures, page
//!   failures and feeds longer than the page cap abort the feed run.
//! - The cursor is written once per successful run, never older than
//!   before the run.

use crate::config::IndexerConfig;
use crate::crawl::filter::{order_newest_first, ActivityFilter, Selection};
use crate::crawl::locks::FeedRunLocks;
use crate::crawl::paginator::FeedPages;
use crate::crawl::CrawlError;
use crate::fetch::DocumentFetcher;
use crate::model::activity::{format_timestamp, unix_epoch, Activity, ActivityKind};
use crate::repo::curation_repo::{CurationStore, SqliteCurationStore};
use crate::repo::cursor_repo::{CursorStore, SqliteCursorStore};
use crate::service::indexer::{ApplyOutcome, CurationIndexer, IndexError};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::time::Instant;

/// Counters and cursor movement of one successful feed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedCrawlReport {
    pub feed_url: String,
    /// Cursor before the run; `None` on the first crawl of the feed.
    pub previous_cursor: Option<DateTime<Utc>>,
    /// Cursor persisted by the run.
    pub cursor: DateTime<Utc>,
    pub pages: usize,
    pub items: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Selected activities whose curation could not be indexed.
    pub skipped: usize,
    pub elements_inserted: usize,
    pub elements_removed: usize,
}

impl FeedCrawlReport {
    fn new(feed_url: &str, previous_cursor: Option<DateTime<Utc>>) -> Self {
        Self {
            feed_url: feed_url.to_string(),
            previous_cursor,
            cursor: previous_cursor.unwrap_or_else(unix_epoch),
            pages: 0,
            items: 0,
            created: 0,
            updated: 0,
            deleted: 0,
            skipped: 0,
            elements_inserted: 0,
            elements_removed: 0,
        }
    }

    /// Activities applied to the index.
    pub fn applied(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    fn record(&mut self, outcome: ApplyOutcome) {
        match outcome {
            ApplyOutcome::Indexed { inserted } => {
                self.created += 1;
                self.elements_inserted += inserted;
            }
            ApplyOutcome::Reindexed { removed, inserted } => {
                self.updated += 1;
                self.elements_removed += removed;
                self.elements_inserted += inserted;
            }
            ApplyOutcome::Deindexed { removed } => {
                self.deleted += 1;
                self.elements_removed += removed.unwrap_or(0);
            }
        }
    }
}

/// Outcome of one run over all feeds.
#[derive(Debug, Default)]
pub struct CrawlSummary {
    pub reports: Vec<FeedCrawlReport>,
    pub failures: Vec<(String, CrawlError)>,
}

impl CrawlSummary {
    pub fn report_for(&self, feed_url: &str) -> Option<&FeedCrawlReport> {
        self.reports.iter().find(|report| report.feed_url == feed_url)
    }

    pub fn failure_for(&self, feed_url: &str) -> Option<&CrawlError> {
        self.failures
            .iter()
            .find(|(url, _)| url == feed_url)
            .map(|(_, err)| err)
    }
}

/// Crawl engine; invoked by whatever schedules crawl runs.
pub struct Crawler<F> {
    fetcher: F,
    locks: FeedRunLocks,
    max_pages: usize,
}

impl<F: DocumentFetcher> Crawler<F> {
    pub fn new(fetcher: F, max_pages: usize) -> Self {
        Self {
            fetcher,
            locks: FeedRunLocks::new(),
            max_pages,
        }
    }

    pub fn from_config(fetcher: F, config: &IndexerConfig) -> Self {
        Self::new(fetcher, config.max_pages_per_feed)
    }

    /// Shares a lock registry with other crawlers of the same store.
    pub fn with_locks(mut self, locks: FeedRunLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn locks(&self) -> &FeedRunLocks {
        &self.locks
    }

    /// Crawls every feed in order, collecting per-feed outcomes.
    pub fn crawl_all(&self, conn: &Connection, feed_urls: &[String]) -> CrawlSummary {
        let started_at = Instant::now();
        info!(
            "event=crawl_run module=crawl status=start feeds={}",
            feed_urls.len()
        );

        let mut summary = CrawlSummary::default();
        for feed_url in feed_urls {
            match self.crawl_feed(conn, feed_url) {
                Ok(report) => summary.reports.push(report),
                Err(err) => summary.failures.push((feed_url.clone(), err)),
            }
        }

        let status = if summary.failures.is_empty() { "ok" } else { "warn" };
        info!(
            "event=crawl_run module=crawl status={status} feeds_ok={} feeds_failed={} duration_ms={}",
            summary.reports.len(),
            summary.failures.len(),
            started_at.elapsed().as_millis()
        );
        summary
    }

    /// Crawls one feed. On error nothing of this run is persisted.
    pub fn crawl_feed(
        &self,
        conn: &Connection,
        feed_url: &str,
    ) -> Result<FeedCrawlReport, CrawlError> {
        let started_at = Instant::now();
        let Some(_guard) = self.locks.try_acquire(feed_url) else {
            warn!(
                "event=crawl_feed module=crawl status=skip feed={feed_url} error_code=already_running"
            );
            return Err(CrawlError::AlreadyRunning(feed_url.to_string()));
        };

        info!("event=crawl_feed module=crawl status=start feed={feed_url}");
        let result = self.run_feed(conn, feed_url);
        match &result {
            Ok(report) => info!(
                "event=crawl_feed module=crawl status=ok feed={feed_url} pages={} items={} created={} updated={} deleted={} skipped={} elements_inserted={} elements_removed={} cursor={} duration_ms={}",
                report.pages,
                report.items,
                report.created,
                report.updated,
                report.deleted,
                report.skipped,
                report.elements_inserted,
                report.elements_removed,
                format_timestamp(report.cursor),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=crawl_feed module=crawl status=error feed={feed_url} error_code={} duration_ms={} error={err}",
                err.code(),
                started_at.elapsed().as_millis()
            ),
        }
        result
    }

    fn run_feed(&self, conn: &Connection, feed_url: &str) -> Result<FeedCrawlReport, CrawlError> {
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
        let cursors = SqliteCursorStore::new(&tx);

        let previous_cursor = cursors.last_activity_time(feed_url)?;
        match previous_cursor {
            None => info!("event=cursor_load module=cursor status=ok feed={feed_url} first_crawl=true"),
            Some(time) => info!(
                "event=cursor_load module=cursor status=ok feed={feed_url} last_activity_time={}",
                format_timestamp(time)
            ),
        }
        let mut filter = ActivityFilter::new(previous_cursor.unwrap_or_else(unix_epoch));
        let mut report = FeedCrawlReport::new(feed_url, previous_cursor);

        let collection = self.fetcher.fetch_json(feed_url).map_err(CrawlError::Feed)?;
        let indexer = CurationIndexer::new(SqliteCurationStore::new(&tx), &self.fetcher);

        for page in FeedPages::new(&self.fetcher, &collection, self.max_pages) {
            let mut page = page?;
            report.pages += 1;
            debug!(
                "event=feed_page module=crawl status=ok feed={feed_url} page={} items={}",
                page.id.as_deref().unwrap_or("unknown"),
                page.items.len()
            );

            order_newest_first(&mut page.items);
            for item in &page.items {
                report.items += 1;
                match filter.select(item) {
                    Selection::Selected(activity) => {
                        apply_activity(&indexer, &activity, &mut report)?;
                    }
                    Selection::Skipped(reason) => debug!(
                        "event=activity_select module=crawl status=skip feed={feed_url} activity={} reason={reason}",
                        item.get("id").and_then(|id| id.as_str()).unwrap_or("unknown")
                    ),
                }
            }
        }

        let cursor = filter.next_cursor();
        cursors.advance(feed_url, cursor)?;
        tx.commit()?;

        report.cursor = cursor;
        Ok(report)
    }
}

fn apply_activity<S: CurationStore, G: DocumentFetcher>(
    indexer: &CurationIndexer<S, G>,
    activity: &Activity,
    report: &mut FeedCrawlReport,
) -> Result<(), CrawlError> {
    debug!(
        "event=activity_apply module=crawl status=start type={} curation={} activity={}",
        activity.kind.as_str(),
        activity.object_id,
        activity.id.as_deref().unwrap_or("unknown")
    );

    match indexer.apply(activity) {
        Ok(outcome) => {
            report.record(outcome);
            Ok(())
        }
        Err(IndexError::Repo(err)) => Err(CrawlError::Store(err)),
        Err(err) => {
            let kept = if activity.kind == ActivityKind::Update {
                " kept=previous_state"
            } else {
                ""
            };
            warn!(
                "event=activity_apply module=crawl status=skip type={} curation={} error_code=curation_unavailable{kept} error={err}",
                activity.kind.as_str(),
                activity.object_id
            );
            report.skipped += 1;
            Ok(())
        }
    }
}

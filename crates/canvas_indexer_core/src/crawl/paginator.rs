//! Backward traversal of activity-stream pages.
//!
//! # Responsibility
//! - Start at the collection's `last` page and follow `prev` links.
//! - Yield pages lazily, newest page first, items in stream order.
//!
//! # Invariants
//! - Traversal ends at the first page without `prev`.
//! - A page (or link) already visited ends the traversal; this is logged,
//!   not an error.
//! - A `prev` link left over once the page cap is reached is yielded as
//!   `PageError::CapReached`, so callers never mistake a cut-off walk for a
//!   complete one.
//! - A failed dereference is yielded once as `Err`, then the sequence ends.

use crate::fetch::{resolve_reference, DerefError, DocumentFetcher};
use crate::model::reference::reference_uri;
use log::{error, warn};
use serde_json::Value;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Key whose presence marks an embedded page object as complete.
const EMBEDDED_PAGE_KEY: &str = "orderedItems";

/// One page of a feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedPage {
    /// Page id, or the link it was fetched from when the page has none.
    pub id: Option<String>,
    pub items: Vec<Value>,
}

/// Reason a traversal ended before reaching the first page.
#[derive(Debug)]
pub enum PageError {
    /// `last` or `prev` could not be dereferenced.
    Unavailable(DerefError),
    /// More pages remain after `max_pages` pages.
    CapReached { max_pages: usize },
}

impl Display for PageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(err) => write!(f, "{err}"),
            Self::CapReached { max_pages } => {
                write!(f, "feed has more than {max_pages} pages")
            }
        }
    }
}

impl Error for PageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Unavailable(err) => Some(err),
            Self::CapReached { .. } => None,
        }
    }
}

impl From<DerefError> for PageError {
    fn from(value: DerefError) -> Self {
        Self::Unavailable(value)
    }
}

enum NextPage {
    Link { label: &'static str, value: Value },
    Done,
}

/// Lazy, non-restartable page sequence of one feed.
pub struct FeedPages<F> {
    fetcher: F,
    next: NextPage,
    visited: HashSet<String>,
    max_pages: usize,
    pages_walked: usize,
}

impl<F: DocumentFetcher> FeedPages<F> {
    /// Prepares a traversal from the feed's collection document.
    pub fn new(fetcher: F, collection: &Value, max_pages: usize) -> Self {
        let last = collection.get("last").cloned().unwrap_or(Value::Null);
        Self {
            fetcher,
            next: NextPage::Link {
                label: "last",
                value: last,
            },
            visited: HashSet::new(),
            max_pages,
            pages_walked: 0,
        }
    }

    /// Pages yielded so far.
    pub fn pages_walked(&self) -> usize {
        self.pages_walked
    }
}

impl<F: DocumentFetcher> Iterator for FeedPages<F> {
    type Item = Result<FeedPage, PageError>;

    fn next(&mut self) -> Option<Self::Item> {
        let NextPage::Link { label, value } = std::mem::replace(&mut self.next, NextPage::Done)
        else {
            return None;
        };

        let link_uri = reference_uri(&value).map(str::to_string);
        if let Some(uri) = link_uri.as_deref() {
            if self.visited.contains(uri) {
                warn!("event=feed_page module=crawl status=warn page={uri} error_code=page_cycle");
                return None;
            }
        }
        if self.pages_walked >= self.max_pages {
            error!(
                "event=feed_page module=crawl status=error error_code=page_cap_reached max_pages={}",
                self.max_pages
            );
            return Some(Err(PageError::CapReached {
                max_pages: self.max_pages,
            }));
        }

        let mut document =
            match resolve_reference(&self.fetcher, &value, label, Some(EMBEDDED_PAGE_KEY)) {
                Ok(document) => document,
                Err(err) => return Some(Err(err.into())),
            };

        let page_id = reference_uri(&document)
            .map(str::to_string)
            .or_else(|| link_uri.clone());
        if let Some(id) = page_id.as_deref() {
            if !self.visited.insert(id.to_string()) {
                warn!("event=feed_page module=crawl status=warn page={id} error_code=page_cycle");
                return None;
            }
        }
        if let Some(uri) = link_uri {
            self.visited.insert(uri);
        }
        self.pages_walked += 1;

        if let Some(prev) = document.get_mut("prev").map(Value::take) {
            if !prev.is_null() {
                self.next = NextPage::Link {
                    label: "prev",
                    value: prev,
                };
            }
        }

        let items = match document.get_mut(EMBEDDED_PAGE_KEY).map(Value::take) {
            Some(Value::Array(items)) => items,
            _ => {
                warn!(
                    "event=feed_page module=crawl status=warn page={} error_code=missing_ordered_items",
                    page_id.as_deref().unwrap_or("unknown")
                );
                Vec::new()
            }
        };

        Some(Ok(FeedPage { id: page_id, items }))
    }
}

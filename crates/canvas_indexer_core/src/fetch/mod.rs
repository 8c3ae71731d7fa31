//! Network access for feeds and the documents they reference.
//!
//! # Responsibility
//! - Fetch JSON documents with bounded retries (`fetcher`).
//! - Resolve attributes given inline or by reference (`deref`).
//!
//! # Invariants
//! - Nothing in this module panics on network or parse failures; every
//!   failure is an explicit error value.

pub mod deref;
pub mod fetcher;

pub use deref::{dereference, dereference_embedded, resolve_reference, DerefError, DerefResult};
pub use fetcher::{DocumentFetcher, FetchError, FetchResult, HttpFetcher, RetryPolicy};

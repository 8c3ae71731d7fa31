//! JSON document fetching with bounded retries.
//!
//! # Responsibility
//! - Define the `DocumentFetcher` seam used by pagination and indexing.
//! - Provide the blocking HTTP implementation with exponential backoff.
//!
//! # Invariants
//! - Connection failures, read failures and configured statuses are
//!   retried at most `retries` times; everything else returns at once.
//! - Failures are returned as `FetchError`, never raised as panics.

use crate::config::FetchConfig;
use log::{debug, warn};
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

const MAX_BACKOFF: Duration = Duration::from_secs(120);
const ACCEPT_JSON: &str = "application/ld+json, application/json;q=0.9, */*;q=0.1";

pub type FetchResult<T> = Result<T, FetchError>;

/// Transport-level failure while retrieving a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// HTTP client could not be constructed or the request could not be built.
    Client(String),
    /// Connection or read failure after exhausting retries.
    Transport {
        url: String,
        attempts: u32,
        message: String,
    },
    /// Non-success HTTP status (retryable ones only after exhausting retries).
    Status {
        url: String,
        attempts: u32,
        status: u16,
    },
    /// Body was received but is not JSON.
    InvalidJson { url: String, message: String },
    /// No document is known for the URL (used by non-HTTP fetchers).
    NotFound(String),
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Client(message) => write!(f, "http client error: {message}"),
            Self::Transport {
                url,
                attempts,
                message,
            } => write!(f, "GET {url} failed after {attempts} attempt(s): {message}"),
            Self::Status {
                url,
                attempts,
                status,
            } => write!(f, "GET {url} returned HTTP {status} after {attempts} attempt(s)"),
            Self::InvalidJson { url, message } => {
                write!(f, "GET {url} returned invalid JSON: {message}")
            }
            Self::NotFound(url) => write!(f, "no document at {url}"),
        }
    }
}

impl Error for FetchError {}

/// Retrieves JSON documents by URL.
pub trait DocumentFetcher {
    fn fetch_json(&self, url: &str) -> FetchResult<Value>;
}

impl<T: DocumentFetcher + ?Sized> DocumentFetcher for &T {
    fn fetch_json(&self, url: &str) -> FetchResult<Value> {
        (**self).fetch_json(url)
    }
}

/// Retry budget and backoff schedule for transient failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub retries: u32,
    /// Seconds; retry `n` sleeps `backoff_factor * 2^(n-1)`.
    pub backoff_factor: f64,
    pub retry_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 5,
            backoff_factor: 0.2,
            retry_statuses: vec![500, 502, 504],
        }
    }
}

impl RetryPolicy {
    /// Sleep before the 1-based `retry`, capped at two minutes.
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        if retry == 0 || self.backoff_factor.is_nan() || self.backoff_factor <= 0.0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(retry - 1).unwrap_or(i32::MAX);
        let seconds = self.backoff_factor * 2f64.powi(exponent);
        if !seconds.is_finite() || seconds >= MAX_BACKOFF.as_secs_f64() {
            return MAX_BACKOFF;
        }
        Duration::from_secs_f64(seconds)
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retry_statuses.contains(&status)
    }
}

/// Outcome of one request attempt.
enum Attempt {
    Retryable(FetchError),
    Final(FetchError),
}

/// Blocking HTTP fetcher backed by `reqwest`.
pub struct HttpFetcher {
    client: Client,
    policy: RetryPolicy,
}

impl HttpFetcher {
    /// Builds a fetcher from the configured timeouts and retry policy.
    pub fn new(config: &FetchConfig) -> FetchResult<Self> {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .user_agent(concat!("canvas-indexer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| FetchError::Client(err.to_string()))?;
        Ok(Self {
            client,
            policy: config.retry_policy(),
        })
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn attempt(&self, url: &str, attempts: u32) -> Result<Value, Attempt> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, ACCEPT_JSON)
            .send()
            .map_err(|err| classify_transport_error(url, attempts, &err))?;

        let status = response.status();
        if !status.is_success() {
            let error = FetchError::Status {
                url: url.to_string(),
                attempts,
                status: status.as_u16(),
            };
            return Err(if self.policy.is_retryable_status(status.as_u16()) {
                Attempt::Retryable(error)
            } else {
                Attempt::Final(error)
            });
        }

        let body = response
            .text()
            .map_err(|err| classify_transport_error(url, attempts, &err))?;
        serde_json::from_str(&body).map_err(|err| {
            Attempt::Final(FetchError::InvalidJson {
                url: url.to_string(),
                message: err.to_string(),
            })
        })
    }
}

impl DocumentFetcher for HttpFetcher {
    fn fetch_json(&self, url: &str) -> FetchResult<Value> {
        let mut attempts = 0_u32;
        loop {
            attempts += 1;
            debug!("event=fetch module=fetch status=start url={url} attempt={attempts}");
            match self.attempt(url, attempts) {
                Ok(document) => return Ok(document),
                Err(Attempt::Retryable(err)) if attempts <= self.policy.retries => {
                    let delay = self.policy.delay_before_retry(attempts);
                    warn!(
                        "event=fetch_retry module=fetch status=warn url={url} attempt={attempts} delay_ms={} error={err}",
                        delay.as_millis()
                    );
                    std::thread::sleep(delay);
                }
                Err(Attempt::Retryable(err)) | Err(Attempt::Final(err)) => return Err(err),
            }
        }
    }
}

fn classify_transport_error(url: &str, attempts: u32, err: &reqwest::Error) -> Attempt {
    let error = FetchError::Transport {
        url: url.to_string(),
        attempts,
        message: err.to_string(),
    };
    if err.is_builder() {
        Attempt::Final(FetchError::Client(format!("{url}: {err}")))
    } else if err.is_connect() || err.is_timeout() || err.is_request() || err.is_body() {
        Attempt::Retryable(error)
    } else {
        Attempt::Final(error)
    }
}

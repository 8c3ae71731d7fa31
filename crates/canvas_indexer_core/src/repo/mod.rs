//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define the storage contracts used by crawling, indexing and querying.
//! - Isolate SQL details from orchestration code.
//!
//! # Invariants
//! - Canvas rows are addressed by `(uri, manifest_uri)`, curation rows by
//!   `uri`.
//! - Repositories borrow a connection (or transaction) and never commit on
//!   their own; transaction scope belongs to the caller.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod curation_repo;
pub mod cursor_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for index and cursor persistence.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// Persisted state that cannot be decoded (e.g. a malformed cursor).
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

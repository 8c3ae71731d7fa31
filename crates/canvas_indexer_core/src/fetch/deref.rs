//! Attribute dereferencing for JSON-LD documents.
//!
//! # Responsibility
//! - Turn an attribute holding a URI or an `id`-bearing object into the
//!   referenced document.
//!
//! # Invariants
//! - A failed dereference is an `Err`, never an empty placeholder
//!   document that callers could mistake for data.
//! - Embedded documents are only used as-is when they carry the key that
//!   marks them complete; bare references are always fetched.

use crate::fetch::fetcher::{DocumentFetcher, FetchError};
use crate::model::reference::reference_uri;
use log::warn;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type DerefResult<T> = Result<T, DerefError>;

/// Failure to resolve a referenced document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DerefError {
    /// Attribute is absent or holds no usable `id` / `@id`.
    MissingReference(String),
    /// Referenced document could not be retrieved.
    Fetch(FetchError),
}

impl Display for DerefError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingReference(attribute) => {
                write!(f, "attribute `{attribute}` carries no reference")
            }
            Self::Fetch(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DerefError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Fetch(err) => Some(err),
            Self::MissingReference(_) => None,
        }
    }
}

impl From<FetchError> for DerefError {
    fn from(value: FetchError) -> Self {
        Self::Fetch(value)
    }
}

/// Fetches the document referenced by `document[attribute]`.
pub fn dereference<F: DocumentFetcher + ?Sized>(
    fetcher: &F,
    document: &Value,
    attribute: &str,
) -> DerefResult<Value> {
    let value = document.get(attribute).unwrap_or(&Value::Null);
    resolve_reference(fetcher, value, attribute, None)
}

/// Like [`dereference`], but returns an embedded object unchanged when it
/// already contains `embedded_key`.
pub fn dereference_embedded<F: DocumentFetcher + ?Sized>(
    fetcher: &F,
    document: &Value,
    attribute: &str,
    embedded_key: &str,
) -> DerefResult<Value> {
    let value = document.get(attribute).unwrap_or(&Value::Null);
    resolve_reference(fetcher, value, attribute, Some(embedded_key))
}

/// Resolves a standalone reference value. `label` names it in errors/logs.
pub fn resolve_reference<F: DocumentFetcher + ?Sized>(
    fetcher: &F,
    value: &Value,
    label: &str,
    embedded_key: Option<&str>,
) -> DerefResult<Value> {
    if let Some(key) = embedded_key {
        if value.get(key).is_some() {
            return Ok(value.clone());
        }
    }

    let Some(url) = reference_uri(value) else {
        warn!("event=deref module=fetch status=error attribute={label} error_code=missing_reference");
        return Err(DerefError::MissingReference(label.to_string()));
    };

    fetcher.fetch_json(url).map_err(|err| {
        warn!(
            "event=deref module=fetch status=error attribute={label} url={url} error_code=fetch_failed error={err}"
        );
        DerefError::Fetch(err)
    })
}

//! Curation indexing use-cases.
//!
//! # Responsibility
//! - Turn curation documents into canvas, curation and element rows.
//! - Apply Create/Update/Delete activities to the index.
//!
//! # Invariants
//! - Update is delete-then-insert of the refreshed document; the document
//!   is fetched before anything is deleted, so a failed fetch keeps the
//!   previously indexed state.
//! - Delete of an unknown curation is a no-op.
//! - Create does not deduplicate elements of an already indexed curation.
//! - Malformed selections and members are skipped with a warning; the rest
//!   of the curation is still indexed.

use crate::fetch::{resolve_reference, DerefError, DocumentFetcher};
use crate::model::activity::{Activity, ActivityKind};
use crate::model::reference::reference_uri;
use crate::model::region::Region;
use crate::repo::curation_repo::CurationStore;
use crate::repo::{RepoError, RepoResult};
use log::{debug, info, warn};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Key whose presence marks an embedded curation object as complete.
const EMBEDDED_CURATION_KEY: &str = "selections";
const MEMBER_LIST_KEYS: &[&str] = &["members", "canvases"];

/// Indexing failure.
#[derive(Debug)]
pub enum IndexError {
    /// Curation document could not be retrieved.
    Deref(DerefError),
    /// Neither the document nor the activity names the curation.
    MissingCurationId,
    /// Persistence failure.
    Repo(RepoError),
}

impl Display for IndexError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Deref(err) => write!(f, "curation unavailable: {err}"),
            Self::MissingCurationId => write!(f, "curation document has no @id"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for IndexError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Deref(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::MissingCurationId => None,
        }
    }
}

impl From<DerefError> for IndexError {
    fn from(value: DerefError) -> Self {
        Self::Deref(value)
    }
}

impl From<RepoError> for IndexError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Effect of one applied activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Indexed { inserted: usize },
    Reindexed { removed: usize, inserted: usize },
    /// `removed` is `None` when the curation was not indexed.
    Deindexed { removed: Option<usize> },
}

/// Applies curation documents to a [`CurationStore`].
pub struct CurationIndexer<S, F> {
    store: S,
    fetcher: F,
}

impl<S: CurationStore, F: DocumentFetcher> CurationIndexer<S, F> {
    pub fn new(store: S, fetcher: F) -> Self {
        Self { store, fetcher }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Dispatches one selected activity by its type.
    pub fn apply(&self, activity: &Activity) -> Result<ApplyOutcome, IndexError> {
        match activity.kind {
            ActivityKind::Create => Ok(ApplyOutcome::Indexed {
                inserted: self.index(&activity.object)?,
            }),
            ActivityKind::Update => {
                let (removed, inserted) = self.reindex(&activity.object_id, &activity.object)?;
                Ok(ApplyOutcome::Reindexed { removed, inserted })
            }
            ActivityKind::Delete => Ok(ApplyOutcome::Deindexed {
                removed: self.deindex(&activity.object_id)?,
            }),
        }
    }

    /// Retrieves the curation document behind an activity object.
    pub fn fetch_curation(&self, object: &Value) -> Result<Value, DerefError> {
        resolve_reference(&self.fetcher, object, "object", Some(EMBEDDED_CURATION_KEY))
    }

    /// Fetches and indexes a curation. Returns the number of elements
    /// inserted.
    pub fn index(&self, object: &Value) -> Result<usize, IndexError> {
        let document = self.fetch_curation(object)?;
        self.index_document(&document, reference_uri(object))
    }

    /// Replaces a curation's elements with those of its current document.
    /// `curation_uri` only names the curation when the document lacks `@id`.
    /// Returns `(removed, inserted)`.
    pub fn reindex(
        &self,
        curation_uri: &str,
        object: &Value,
    ) -> Result<(usize, usize), IndexError> {
        let document = self.fetch_curation(object)?;
        // Rows are keyed by the document's own id, which may differ from
        // the activity's object id.
        let indexed_uri = reference_uri(&document).unwrap_or(curation_uri);
        let removed = self.deindex(indexed_uri)?.unwrap_or(0);
        let inserted = self.index_document(&document, Some(curation_uri))?;
        Ok((removed, inserted))
    }

    /// Removes a curation and its elements. Returns `None` when the
    /// curation is not indexed.
    pub fn deindex(&self, curation_uri: &str) -> RepoResult<Option<usize>> {
        let Some(curation_id) = self.store.find_curation(curation_uri)? else {
            debug!(
                "event=curation_deindex module=index status=skip curation={curation_uri} reason=not_indexed"
            );
            return Ok(None);
        };

        let removed = self.store.delete_curation(curation_id)?;
        info!(
            "event=curation_deindex module=index status=ok curation={curation_uri} elements_removed={removed}"
        );
        Ok(Some(removed))
    }

    /// Indexes an already retrieved curation document.
    ///
    /// `fallback_uri` names the curation when the document lacks `@id`.
    pub fn index_document(
        &self,
        document: &Value,
        fallback_uri: Option<&str>,
    ) -> Result<usize, IndexError> {
        let curation_uri = reference_uri(document)
            .or(fallback_uri)
            .ok_or(IndexError::MissingCurationId)?;
        let curation_id = self.store.upsert_curation(curation_uri)?;

        let selections = document
            .get("selections")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        if selections.is_empty() {
            warn!(
                "event=curation_index module=index status=warn curation={curation_uri} error_code=no_selections"
            );
        }

        let mut inserted = 0_usize;
        for (index, selection) in selections.iter().enumerate() {
            let Some(manifest_uri) = selection.get("within").and_then(reference_uri) else {
                warn!(
                    "event=curation_index module=index status=skip curation={curation_uri} selection={index} error_code=missing_manifest"
                );
                continue;
            };

            for member in selection_members(selection) {
                let Some(reference) = reference_uri(member) else {
                    warn!(
                        "event=curation_index module=index status=skip curation={curation_uri} selection={index} error_code=member_without_id"
                    );
                    continue;
                };
                let (canvas_uri, region) = match Region::split_canvas_fragment(reference) {
                    Ok(parsed) => parsed,
                    Err(err) => {
                        warn!(
                            "event=curation_index module=index status=skip curation={curation_uri} member={reference} error_code=invalid_region error={err}"
                        );
                        continue;
                    }
                };

                let canvas_id = self.store.upsert_canvas(canvas_uri, manifest_uri)?;
                self.store.insert_element(curation_id, canvas_id, &region)?;
                inserted += 1;
            }
        }

        info!(
            "event=curation_index module=index status=ok curation={curation_uri} elements_inserted={inserted}"
        );
        Ok(inserted)
    }
}

fn selection_members(selection: &Value) -> impl Iterator<Item = &Value> {
    MEMBER_LIST_KEYS
        .iter()
        .filter_map(|key| selection.get(*key).and_then(Value::as_array))
        .flatten()
}

//! Backlink lookup by canvas region.
//!
//! # Responsibility
//! - Resolve a canvas URI and collect the curations referencing it,
//!   optionally limited to regions inside a bounding rectangle.
//! - Rebuild each stored polygon into its `x,y,w,h` rectangle and group
//!   curations by identical rectangle.
//!
//! # Invariants
//! - Unknown canvases yield `None`, not an error.
//! - Areas keep first-seen order; URIs within an area keep element
//!   insertion order.
//! - Rows whose polygon is not a closed five-vertex ring are logged and
//!   skipped.

use crate::model::region::Region;
use crate::repo::curation_repo::CurationStore;
use crate::repo::RepoResult;
use log::{debug, warn};

/// Curations referencing one rectangle of a canvas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaBacklinks {
    pub area: Region,
    pub curation_uris: Vec<String>,
}

/// Result of a backlink query for one canvas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanvasBacklinks {
    pub canvas_uri: String,
    /// Manifest of the canvas row the query resolved to.
    pub manifest_uri: String,
    pub areas: Vec<AreaBacklinks>,
}

impl CanvasBacklinks {
    /// Curations for exactly `area`, if any.
    pub fn curations_at(&self, area: &Region) -> Option<&[String]> {
        self.areas
            .iter()
            .find(|entry| entry.area == *area)
            .map(|entry| entry.curation_uris.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }
}

/// Read-only spatial query over a [`CurationStore`].
pub struct SpatialQuery<S> {
    store: S,
}

impl<S: CurationStore> SpatialQuery<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Looks up backlinks for `canvas_uri`, restricted to elements lying
    /// within `within` when given.
    pub fn backlinks(
        &self,
        canvas_uri: &str,
        within: Option<&Region>,
    ) -> RepoResult<Option<CanvasBacklinks>> {
        let canvases = self.store.find_canvases(canvas_uri)?;
        let Some(canvas) = canvases.first() else {
            debug!("event=backlink_query module=query status=skip canvas={canvas_uri} reason=unknown_canvas");
            return Ok(None);
        };
        if canvases.len() > 1 {
            warn!(
                "event=backlink_query module=query status=warn canvas={canvas_uri} error_code=ambiguous_canvas rows={} chosen_manifest={}",
                canvases.len(),
                canvas.manifest_uri
            );
        }

        let mut areas: Vec<AreaBacklinks> = Vec::new();
        for element in self.store.list_canvas_elements(canvas.id, within)? {
            let area = match Region::from_polygon_wkt(&element.area) {
                Ok(area) => area,
                Err(err) => {
                    warn!(
                        "event=backlink_query module=query status=skip canvas={canvas_uri} element_id={} error_code=unexpected_polygon error={err}",
                        element.id
                    );
                    continue;
                }
            };

            match areas.iter_mut().find(|entry| entry.area == area) {
                Some(entry) => entry.curation_uris.push(element.curation_uri),
                None => areas.push(AreaBacklinks {
                    area,
                    curation_uris: vec![element.curation_uri],
                }),
            }
        }

        debug!(
            "event=backlink_query module=query status=ok canvas={canvas_uri} areas={}",
            areas.len()
        );
        Ok(Some(CanvasBacklinks {
            canvas_uri: canvas.uri.clone(),
            manifest_uri: canvas.manifest_uri.clone(),
            areas,
        }))
    }
}

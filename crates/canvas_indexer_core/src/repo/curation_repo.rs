//! Canvas, curation and curation-element storage.
//!
//! # Responsibility
//! - Upsert canvases and curations, insert region elements.
//! - Remove a curation together with all of its elements.
//! - Serve the per-canvas element lookups behind the spatial query.
//!
//! # Invariants
//! - Element rows are inserted unconditionally; there is no uniqueness
//!   constraint on `(curation, canvas, area)`.
//! - Bounding columns always match the stored `area` polygon.

use crate::model::region::Region;
use crate::repo::RepoResult;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub type CanvasId = i64;
pub type CurationId = i64;
pub type ElementId = i64;

/// One canvas row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanvasRecord {
    pub id: CanvasId,
    pub uri: String,
    pub manifest_uri: String,
}

/// One element row joined with its curation URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRecord {
    pub id: ElementId,
    pub curation_uri: String,
    /// Stored WKT polygon.
    pub area: String,
}

/// Storage contract for the curation index.
pub trait CurationStore {
    /// Inserts the canvas if unknown; returns its id either way.
    fn upsert_canvas(&self, uri: &str, manifest_uri: &str) -> RepoResult<CanvasId>;
    /// Inserts the curation if unknown; returns its id either way.
    fn upsert_curation(&self, uri: &str) -> RepoResult<CurationId>;
    fn find_curation(&self, uri: &str) -> RepoResult<Option<CurationId>>;
    fn insert_element(
        &self,
        curation_id: CurationId,
        canvas_id: CanvasId,
        region: &Region,
    ) -> RepoResult<ElementId>;
    /// Deletes the curation's elements, then the curation. Returns the
    /// number of elements removed.
    fn delete_curation(&self, curation_id: CurationId) -> RepoResult<usize>;
    /// All canvas rows sharing `uri`, ordered by id.
    fn find_canvases(&self, uri: &str) -> RepoResult<Vec<CanvasRecord>>;
    /// Elements on a canvas in insertion order, optionally limited to those
    /// lying within `within`.
    fn list_canvas_elements(
        &self,
        canvas_id: CanvasId,
        within: Option<&Region>,
    ) -> RepoResult<Vec<ElementRecord>>;
}

/// SQLite-backed curation store.
pub struct SqliteCurationStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCurationStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl CurationStore for SqliteCurationStore<'_> {
    fn upsert_canvas(&self, uri: &str, manifest_uri: &str) -> RepoResult<CanvasId> {
        self.conn.execute(
            "INSERT INTO canvases (uri, manifest_uri)
             VALUES (?1, ?2)
             ON CONFLICT (uri, manifest_uri) DO NOTHING;",
            params![uri, manifest_uri],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM canvases WHERE uri = ?1 AND manifest_uri = ?2;",
            params![uri, manifest_uri],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn upsert_curation(&self, uri: &str) -> RepoResult<CurationId> {
        self.conn.execute(
            "INSERT INTO curations (uri)
             VALUES (?1)
             ON CONFLICT (uri) DO NOTHING;",
            [uri],
        )?;
        let id = self
            .conn
            .query_row("SELECT id FROM curations WHERE uri = ?1;", [uri], |row| {
                row.get(0)
            })?;
        Ok(id)
    }

    fn find_curation(&self, uri: &str) -> RepoResult<Option<CurationId>> {
        let id = self
            .conn
            .query_row("SELECT id FROM curations WHERE uri = ?1;", [uri], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(id)
    }

    fn insert_element(
        &self,
        curation_id: CurationId,
        canvas_id: CanvasId,
        region: &Region,
    ) -> RepoResult<ElementId> {
        self.conn.execute(
            "INSERT INTO curation_elements (
                canvas_id,
                curation_id,
                area,
                min_x,
                min_y,
                max_x,
                max_y
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                canvas_id,
                curation_id,
                region.to_polygon_wkt(),
                region.x,
                region.y,
                region.max_x(),
                region.max_y(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn delete_curation(&self, curation_id: CurationId) -> RepoResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM curation_elements WHERE curation_id = ?1;",
            [curation_id],
        )?;
        self.conn
            .execute("DELETE FROM curations WHERE id = ?1;", [curation_id])?;
        Ok(removed)
    }

    fn find_canvases(&self, uri: &str) -> RepoResult<Vec<CanvasRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, uri, manifest_uri
             FROM canvases
             WHERE uri = ?1
             ORDER BY id ASC;",
        )?;
        let mut rows = stmt.query([uri])?;
        let mut canvases = Vec::new();
        while let Some(row) = rows.next()? {
            canvases.push(CanvasRecord {
                id: row.get("id")?,
                uri: row.get("uri")?,
                manifest_uri: row.get("manifest_uri")?,
            });
        }
        Ok(canvases)
    }

    fn list_canvas_elements(
        &self,
        canvas_id: CanvasId,
        within: Option<&Region>,
    ) -> RepoResult<Vec<ElementRecord>> {
        let mut elements = Vec::new();
        match within {
            None => {
                let mut stmt = self.conn.prepare(
                    "SELECT ce.id AS id, c.uri AS curation_uri, ce.area AS area
                     FROM curation_elements ce
                     JOIN curations c ON c.id = ce.curation_id
                     WHERE ce.canvas_id = ?1
                     ORDER BY ce.id ASC;",
                )?;
                let mut rows = stmt.query([canvas_id])?;
                while let Some(row) = rows.next()? {
                    elements.push(parse_element_row(row)?);
                }
            }
            Some(bounds) => {
                let mut stmt = self.conn.prepare(
                    "SELECT ce.id AS id, c.uri AS curation_uri, ce.area AS area
                     FROM curation_elements ce
                     JOIN curations c ON c.id = ce.curation_id
                     WHERE ce.canvas_id = ?1
                       AND ce.min_x >= ?2
                       AND ce.min_y >= ?3
                       AND ce.max_x <= ?4
                       AND ce.max_y <= ?5
                     ORDER BY ce.id ASC;",
                )?;
                let mut rows = stmt.query(params![
                    canvas_id,
                    bounds.x,
                    bounds.y,
                    bounds.max_x(),
                    bounds.max_y(),
                ])?;
                while let Some(row) = rows.next()? {
                    elements.push(parse_element_row(row)?);
                }
            }
        }
        Ok(elements)
    }
}

fn parse_element_row(row: &Row<'_>) -> RepoResult<ElementRecord> {
    Ok(ElementRecord {
        id: row.get("id")?,
        curation_uri: row.get("curation_uri")?,
        area: row.get("area")?,
    })
}

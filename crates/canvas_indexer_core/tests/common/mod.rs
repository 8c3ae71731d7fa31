#![allow(dead_code)]

use canvas_indexer_core::fetch::{DocumentFetcher, FetchError, FetchResult};
use rusqlite::Connection;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::collections::HashMap;

pub const MANIFEST: &str = "http://example.org/iiif/book1/manifest";
pub const CANVAS: &str = "http://example.org/iiif/book1/canvas/p1";

/// In-memory web: URL to JSON document, with a request log.
#[derive(Default)]
pub struct FakeWeb {
    documents: RefCell<HashMap<String, Value>>,
    requests: RefCell<Vec<String>>,
}

impl FakeWeb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, url: &str, document: Value) {
        self.documents.borrow_mut().insert(url.to_string(), document);
    }

    pub fn remove(&self, url: &str) {
        self.documents.borrow_mut().remove(url);
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    pub fn clear_requests(&self) {
        self.requests.borrow_mut().clear();
    }
}

impl DocumentFetcher for FakeWeb {
    fn fetch_json(&self, url: &str) -> FetchResult<Value> {
        self.requests.borrow_mut().push(url.to_string());
        self.documents
            .borrow()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(url.to_string()))
    }
}

pub fn collection(feed_url: &str, last_page: &str) -> Value {
    json!({
        "@context": "https://www.w3.org/ns/activitystreams",
        "id": feed_url,
        "type": "OrderedCollection",
        "last": {"id": last_page, "type": "OrderedCollectionPage"},
    })
}

pub fn page(id: &str, prev: Option<&str>, items: Vec<Value>) -> Value {
    let mut page = json!({
        "id": id,
        "type": "OrderedCollectionPage",
        "orderedItems": items,
    });
    if let Some(prev) = prev {
        page["prev"] = json!({"id": prev, "type": "OrderedCollectionPage"});
    }
    page
}

pub fn activity(kind: &str, curation_uri: &str, end_time: &str) -> Value {
    json!({
        "id": format!("{curation_uri}/activity/{kind}/{end_time}"),
        "type": kind,
        "endTime": end_time,
        "object": {"@id": curation_uri, "@type": "cr:Curation"},
    })
}

/// Curation document with one selection on [`MANIFEST`].
pub fn curation(uri: &str, members: &[&str]) -> Value {
    curation_within(uri, MANIFEST, members)
}

pub fn curation_within(uri: &str, manifest: &str, members: &[&str]) -> Value {
    let members = members
        .iter()
        .map(|member| json!({"@id": member, "@type": "sc:Canvas", "label": "p. 1"}))
        .collect::<Vec<_>>();
    json!({
        "@context": [
            "http://iiif.io/api/presentation/2/context.json",
            "http://codh.rois.ac.jp/iiif/curation/1/context.json",
        ],
        "@id": uri,
        "@type": "cr:Curation",
        "label": "test curation",
        "selections": [{
            "@id": format!("{uri}/range/r1"),
            "@type": "sc:Range",
            "label": "Manual curation",
            "members": members,
            "within": {"@id": manifest, "@type": "sc:Manifest", "label": "book1"},
        }],
    })
}

pub fn fragment(canvas: &str, xywh: &str) -> String {
    format!("{canvas}#xywh={xywh}")
}

pub fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

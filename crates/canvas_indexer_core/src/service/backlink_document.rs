//! IIIF curation document presenting backlinks on one canvas.
//!
//! The document is a throwaway `cr:Curation` with one range holding the
//! queried canvas; every indexed area becomes a metadata entry whose
//! annotations link back to the referencing curations.

use crate::service::spatial_query::CanvasBacklinks;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{json, Value};
use uuid::Uuid;

const PRESENTATION_CONTEXT: &str = "http://iiif.io/api/presentation/2/context.json";
const CURATION_CONTEXT: &str = "http://codh.rois.ac.jp/iiif/curation/1/context.json";
const GENERATED_ID_BASE: &str = "http://example.org/iiif";
const MARKER_BORDER_COLOR: &str = "#0f0";

/// Characters left unescaped in prefixed backlinks: unreserved plus `/`.
const BACKLINK_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

/// Rendering options for [`build_backlink_document`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BacklinkDocumentOptions {
    /// When set, links point to `<prefix><url-encoded curation uri>`
    /// (e.g. a curation viewer) instead of the bare curation URI.
    pub link_prefix: Option<String>,
}

/// Builds the backlink curation document for a query result.
pub fn build_backlink_document(
    backlinks: &CanvasBacklinks,
    options: &BacklinkDocumentOptions,
) -> Value {
    let canvas_uri = backlinks.canvas_uri.as_str();
    let metadata = backlinks
        .areas
        .iter()
        .map(|entry| {
            let xywh = entry.area.to_string();
            let annotations = entry
                .curation_uris
                .iter()
                .map(|uri| annotation(canvas_uri, &xywh, &backlink_href(uri, options)))
                .collect::<Vec<_>>();
            json!({
                "label": "Annotation",
                "value": annotations,
            })
        })
        .collect::<Vec<_>>();

    json!({
        "@context": [PRESENTATION_CONTEXT, CURATION_CONTEXT],
        "@type": "cr:Curation",
        "@id": generated_id("curation"),
        "viewingHint": "annotation",
        "label": format!("Curation Backlinks for {canvas_uri}"),
        "selections": [{
            "@id": generated_id("range"),
            "@type": "sc:Range",
            "label": "Temporary range for displaying a canvas",
            "members": [{
                "@id": canvas_uri,
                "@type": "sc:Canvas",
                "label": "Temporary canvas for displaying annotations",
                "metadata": metadata,
            }],
            "within": {
                "@id": backlinks.manifest_uri,
                "@type": "sc:Manifest",
                "label": "Temporary manifest for displaying a canvas",
            },
        }],
    })
}

fn annotation(canvas_uri: &str, xywh: &str, href: &str) -> Value {
    json!({
        "@id": generated_id("annotation"),
        "@type": "oa:Annotation",
        "motivation": "sc:painting",
        "on": format!("{canvas_uri}#xywh={xywh}"),
        "resource": {
            "@type": "cnt:ContentAsText",
            "format": "text/html",
            "chars": format!("<a href=\"{href}\">Curation</a>"),
            "marker": {
                "border-color": MARKER_BORDER_COLOR,
            },
        },
    })
}

fn backlink_href(curation_uri: &str, options: &BacklinkDocumentOptions) -> String {
    match options.link_prefix.as_deref() {
        Some(prefix) => format!(
            "{prefix}{}",
            utf8_percent_encode(curation_uri, BACKLINK_ESCAPE)
        ),
        None => curation_uri.to_string(),
    }
}

fn generated_id(kind: &str) -> String {
    format!("{GENERATED_ID_BASE}/{kind}/{}", Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::{build_backlink_document, BacklinkDocumentOptions};
    use crate::model::region::Region;
    use crate::service::spatial_query::{AreaBacklinks, CanvasBacklinks};

    fn sample() -> CanvasBacklinks {
        CanvasBacklinks {
            canvas_uri: "http://example.org/canvas/1".to_string(),
            manifest_uri: "http://example.org/manifest".to_string(),
            areas: vec![
                AreaBacklinks {
                    area: Region::new(10, 20, 30, 40).unwrap(),
                    curation_uris: vec![
                        "http://example.org/curation/a".to_string(),
                        "http://example.org/curation/b".to_string(),
                    ],
                },
                AreaBacklinks {
                    area: Region::new(0, 0, 5, 5).unwrap(),
                    curation_uris: vec!["http://example.org/curation/c".to_string()],
                },
            ],
        }
    }

    #[test]
    fn document_has_one_metadata_entry_per_area() {
        let document = build_backlink_document(&sample(), &BacklinkDocumentOptions::default());
        let member = &document["selections"][0]["members"][0];
        assert_eq!(document["@type"], "cr:Curation");
        assert_eq!(member["@id"], "http://example.org/canvas/1");
        assert_eq!(document["selections"][0]["within"]["@id"], "http://example.org/manifest");

        let metadata = member["metadata"].as_array().unwrap();
        assert_eq!(metadata.len(), 2);
        let first_area = metadata[0]["value"].as_array().unwrap();
        assert_eq!(first_area.len(), 2);
        assert_eq!(first_area[0]["on"], "http://example.org/canvas/1#xywh=10,20,30,40");
        assert_eq!(
            first_area[1]["resource"]["chars"],
            "<a href=\"http://example.org/curation/b\">Curation</a>"
        );
    }

    #[test]
    fn link_prefix_percent_encodes_curation_uri() {
        let options = BacklinkDocumentOptions {
            link_prefix: Some("http://viewer.example/?curation=".to_string()),
        };
        let document = build_backlink_document(&sample(), &options);
        let chars = document["selections"][0]["members"][0]["metadata"][1]["value"][0]["resource"]
            ["chars"]
            .as_str()
            .unwrap()
            .to_string();
        assert_eq!(
            chars,
            "<a href=\"http://viewer.example/?curation=http%3A//example.org/curation/c\">Curation</a>"
        );
    }

    #[test]
    fn generated_ids_are_unique() {
        let document = build_backlink_document(&sample(), &BacklinkDocumentOptions::default());
        assert_ne!(document["@id"], document["selections"][0]["@id"]);
    }
}

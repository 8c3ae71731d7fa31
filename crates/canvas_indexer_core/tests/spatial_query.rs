mod common;

use canvas_indexer_core::db::open_db_in_memory;
use canvas_indexer_core::{
    build_backlink_document, BacklinkDocumentOptions, CurationIndexer, CurationStore, Region,
    SpatialQuery, SqliteCurationStore,
};
use common::{curation, curation_within, fragment, FakeWeb, CANVAS, MANIFEST};
use rusqlite::Connection;

const C1: &str = "http://example.org/curation/c1";
const C2: &str = "http://example.org/curation/c2";

fn index(conn: &Connection, uri: &str, members: &[&str]) {
    let web = FakeWeb::new();
    CurationIndexer::new(SqliteCurationStore::new(conn), &web)
        .index_document(&curation(uri, members), None)
        .unwrap();
}

fn region(x: i64, y: i64, w: i64, h: i64) -> Region {
    Region::new(x, y, w, h).unwrap()
}

#[test]
fn indexed_region_round_trips_through_storage() {
    let conn = open_db_in_memory().unwrap();
    index(&conn, C1, &[&fragment(CANVAS, "10,20,30,40")]);

    let backlinks = SpatialQuery::new(SqliteCurationStore::new(&conn))
        .backlinks(CANVAS, None)
        .unwrap()
        .unwrap();

    assert_eq!(backlinks.canvas_uri, CANVAS);
    assert_eq!(backlinks.manifest_uri, MANIFEST);
    assert_eq!(
        backlinks.curations_at(&region(10, 20, 30, 40)),
        Some(&[C1.to_string()][..])
    );
    let stored: String = conn
        .query_row("SELECT area FROM curation_elements;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(stored, "POLYGON((10 20, 40 20, 40 60, 10 60, 10 20))");
}

#[test]
fn unknown_canvas_yields_none() {
    let conn = open_db_in_memory().unwrap();
    index(&conn, C1, &[&fragment(CANVAS, "10,20,30,40")]);

    let result = SpatialQuery::new(SqliteCurationStore::new(&conn))
        .backlinks("http://example.org/iiif/book1/canvas/p99", None)
        .unwrap();

    assert!(result.is_none());
}

#[test]
fn identical_areas_group_curations_in_insertion_order() {
    let conn = open_db_in_memory().unwrap();
    index(
        &conn,
        C1,
        &[&fragment(CANVAS, "10,20,30,40"), &fragment(CANVAS, "0,0,5,5")],
    );
    index(&conn, C2, &[&fragment(CANVAS, "10,20,30,40")]);

    let backlinks = SpatialQuery::new(SqliteCurationStore::new(&conn))
        .backlinks(CANVAS, None)
        .unwrap()
        .unwrap();

    let areas = backlinks
        .areas
        .iter()
        .map(|entry| entry.area)
        .collect::<Vec<_>>();
    assert_eq!(areas, vec![region(10, 20, 30, 40), region(0, 0, 5, 5)]);
    assert_eq!(
        backlinks.curations_at(&region(10, 20, 30, 40)).unwrap(),
        [C1.to_string(), C2.to_string()]
    );
}

#[test]
fn bounding_area_keeps_only_contained_regions() {
    let conn = open_db_in_memory().unwrap();
    index(
        &conn,
        C1,
        &[
            &fragment(CANVAS, "10,20,30,40"),
            &fragment(CANVAS, "500,500,10,10"),
            &fragment(CANVAS, "90,90,20,20"),
        ],
    );

    let backlinks = SpatialQuery::new(SqliteCurationStore::new(&conn))
        .backlinks(CANVAS, Some(&region(0, 0, 100, 100)))
        .unwrap()
        .unwrap();

    assert_eq!(backlinks.areas.len(), 1);
    assert_eq!(backlinks.areas[0].area, region(10, 20, 30, 40));
}

#[test]
fn bounding_area_is_inclusive_of_its_edges() {
    let conn = open_db_in_memory().unwrap();
    index(&conn, C1, &[&fragment(CANVAS, "0,0,100,100")]);

    let backlinks = SpatialQuery::new(SqliteCurationStore::new(&conn))
        .backlinks(CANVAS, Some(&region(0, 0, 100, 100)))
        .unwrap()
        .unwrap();

    assert_eq!(backlinks.areas.len(), 1);
}

#[test]
fn known_canvas_without_matching_regions_is_empty_not_none() {
    let conn = open_db_in_memory().unwrap();
    index(&conn, C1, &[&fragment(CANVAS, "500,500,10,10")]);

    let backlinks = SpatialQuery::new(SqliteCurationStore::new(&conn))
        .backlinks(CANVAS, Some(&region(0, 0, 100, 100)))
        .unwrap()
        .unwrap();

    assert!(backlinks.is_empty());
}

#[test]
fn ambiguous_canvas_resolves_to_first_indexed_row() {
    let conn = open_db_in_memory().unwrap();
    let web = FakeWeb::new();
    let indexer = CurationIndexer::new(SqliteCurationStore::new(&conn), &web);
    indexer
        .index_document(&curation(C1, &[&fragment(CANVAS, "1,1,1,1")]), None)
        .unwrap();
    indexer
        .index_document(
            &curation_within(
                C2,
                "http://example.org/iiif/other/manifest",
                &[&fragment(CANVAS, "2,2,2,2")],
            ),
            None,
        )
        .unwrap();
    assert_eq!(indexer.store().find_canvases(CANVAS).unwrap().len(), 2);

    let backlinks = SpatialQuery::new(SqliteCurationStore::new(&conn))
        .backlinks(CANVAS, None)
        .unwrap()
        .unwrap();

    assert_eq!(backlinks.manifest_uri, MANIFEST);
    assert_eq!(backlinks.areas.len(), 1);
    assert_eq!(backlinks.areas[0].curation_uris, vec![C1.to_string()]);
}

#[test]
fn corrupt_polygon_rows_are_skipped() {
    let conn = open_db_in_memory().unwrap();
    index(&conn, C1, &[&fragment(CANVAS, "10,20,30,40")]);
    conn.execute(
        "INSERT INTO curation_elements (canvas_id, curation_id, area, min_x, min_y, max_x, max_y)
         SELECT canvas_id, curation_id, 'POLYGON((0 0, 1 0, 0 0))', 0, 0, 1, 1
         FROM curation_elements LIMIT 1;",
        [],
    )
    .unwrap();

    let backlinks = SpatialQuery::new(SqliteCurationStore::new(&conn))
        .backlinks(CANVAS, None)
        .unwrap()
        .unwrap();

    assert_eq!(backlinks.areas.len(), 1);
}

#[test]
fn backlink_document_lists_one_annotation_per_curation() {
    let conn = open_db_in_memory().unwrap();
    index(&conn, C1, &[&fragment(CANVAS, "10,20,30,40")]);
    index(&conn, C2, &[&fragment(CANVAS, "10,20,30,40")]);
    let backlinks = SpatialQuery::new(SqliteCurationStore::new(&conn))
        .backlinks(CANVAS, None)
        .unwrap()
        .unwrap();

    let document = build_backlink_document(&backlinks, &BacklinkDocumentOptions::default());

    let selection = &document["selections"][0];
    assert_eq!(selection["within"]["@id"], MANIFEST);
    let canvas = &selection["members"][0];
    assert_eq!(canvas["@id"], CANVAS);
    let annotations = canvas["metadata"][0]["value"].as_array().unwrap();
    assert_eq!(annotations.len(), 2);
    assert_eq!(annotations[0]["on"], format!("{CANVAS}#xywh=10,20,30,40"));
}

use canvas_indexer_core::db::open_db_in_memory;
use canvas_indexer_core::model::activity::parse_timestamp;
use canvas_indexer_core::{CursorStore, RepoError, SqliteCursorStore};

const FEED: &str = "http://example.org/as/collection.json";

#[test]
fn never_crawled_feed_has_no_cursor() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteCursorStore::new(&conn);

    assert_eq!(store.last_activity_time(FEED).unwrap(), None);
}

#[test]
fn advance_moves_forward_and_never_regresses() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteCursorStore::new(&conn);
    let older = parse_timestamp("2019-06-01T12:00:00Z").unwrap();
    let newer = parse_timestamp("2019-06-02T08:30:00.250Z").unwrap();

    store.advance(FEED, older).unwrap();
    assert_eq!(store.last_activity_time(FEED).unwrap(), Some(older));

    store.advance(FEED, newer).unwrap();
    assert_eq!(store.last_activity_time(FEED).unwrap(), Some(newer));

    store.advance(FEED, older).unwrap();
    assert_eq!(store.last_activity_time(FEED).unwrap(), Some(newer));
}

#[test]
fn cursors_are_kept_per_feed() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteCursorStore::new(&conn);
    let time = parse_timestamp("2020-01-01T00:00:00Z").unwrap();

    store.advance(FEED, time).unwrap();
    assert_eq!(
        store
            .last_activity_time("http://other.example/as/collection.json")
            .unwrap(),
        None
    );
}

#[test]
fn unreadable_stored_cursor_is_invalid_data() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO feed_cursors (feed_url, last_activity_time) VALUES (?1, 'yesterday');",
        [FEED],
    )
    .unwrap();

    let err = SqliteCursorStore::new(&conn)
        .last_activity_time(FEED)
        .unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
}

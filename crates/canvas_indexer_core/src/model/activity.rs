//! Activity-stream events that touch curations.
//!
//! # Responsibility
//! - Name the activity types the indexer reacts to.
//! - Parse and format the timestamps used by events and feed cursors.
//!
//! # Invariants
//! - Formatted timestamps are fixed-width UTC, so lexical order equals
//!   chronological order in storage.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value;

/// JSON-LD type marking an activity object as a curation.
pub const CURATION_TYPE: &str = "cr:Curation";

const NAIVE_TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Activity types that change the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    Create,
    Update,
    Delete,
}

impl ActivityKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Create" => Some(Self::Create),
            "Update" => Some(Self::Update),
            "Delete" => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Delete => "Delete",
        }
    }
}

/// A feed item selected for indexing.
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    /// Activity id, when the feed provides one. Only used for logging.
    pub id: Option<String>,
    pub kind: ActivityKind,
    pub end_time: DateTime<Utc>,
    /// Identity of the curation this activity is about.
    pub object_id: String,
    /// Raw `object` value: a reference or an embedded curation document.
    pub object: Value,
}

/// Cursor value for a feed that was never crawled.
pub fn unix_epoch() -> DateTime<Utc> {
    DateTime::<Utc>::default()
}

/// Parses an RFC 3339 timestamp; values without an offset are read as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .map(|naive| naive.and_utc())
}

/// Formats a timestamp as `YYYY-MM-DDTHH:MM:SS.ffffffZ`.
pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::{format_timestamp, parse_timestamp, unix_epoch, ActivityKind};

    #[test]
    fn activity_kind_parses_only_index_relevant_types() {
        assert_eq!(ActivityKind::parse("Create"), Some(ActivityKind::Create));
        assert_eq!(ActivityKind::parse("Update"), Some(ActivityKind::Update));
        assert_eq!(ActivityKind::parse("Delete"), Some(ActivityKind::Delete));
        assert_eq!(ActivityKind::parse("Add"), None);
        assert_eq!(ActivityKind::parse("create"), None);
    }

    #[test]
    fn parse_timestamp_accepts_offsets_and_naive_values() {
        let zulu = parse_timestamp("2018-04-16T17:22:03Z").unwrap();
        let offset = parse_timestamp("2018-04-16T19:22:03+02:00").unwrap();
        let naive = parse_timestamp("2018-04-16T17:22:03").unwrap();
        assert_eq!(zulu, offset);
        assert_eq!(zulu, naive);
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn formatted_timestamps_sort_chronologically() {
        let earlier = format_timestamp(parse_timestamp("2018-04-16T17:22:03.5Z").unwrap());
        let later = format_timestamp(parse_timestamp("2018-04-16T17:22:04Z").unwrap());
        assert_eq!(earlier, "2018-04-16T17:22:03.500000Z");
        assert!(earlier < later);
        assert_eq!(format_timestamp(unix_epoch()), "1970-01-01T00:00:00.000000Z");
    }
}

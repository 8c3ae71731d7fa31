//! Per-run activity selection.
//!
//! # Responsibility
//! - Decide which feed items are applied to the index during one run.
//! - Track the newest applied activity time as the next cursor candidate.
//!
//! # Invariants
//! - Only Create/Update/Delete items about a `cr:Curation`, strictly newer
//!   than the prior cursor, are selected.
//! - Items arrive newest-first, so the first selected item per object id
//!   wins; later (older) items for that id are superseded.
//! - The seen-set is keyed by the object's id string.
//! - `next_cursor()` never returns a value older than the prior cursor.

use crate::model::activity::{parse_timestamp, Activity, ActivityKind, CURATION_TYPE};
use crate::model::reference::{declared_type, reference_uri};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::cmp::Reverse;
use std::collections::HashSet;
use std::fmt::{Display, Formatter};

/// Why an item was not selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Required field missing or unparseable.
    Malformed(&'static str),
    /// Not newer than the prior cursor.
    AlreadyProcessed,
    /// Object is not a curation.
    NotCuration,
    /// Activity type the index does not react to.
    UnsupportedType(String),
    /// A newer item for the same object was already selected.
    Superseded(String),
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(field) => write!(f, "malformed_{field}"),
            Self::AlreadyProcessed => write!(f, "not_newer_than_cursor"),
            Self::NotCuration => write!(f, "not_a_curation"),
            Self::UnsupportedType(kind) => write!(f, "unsupported_type:{kind}"),
            Self::Superseded(object_id) => write!(f, "superseded:{object_id}"),
        }
    }
}

/// Filter decision for one item.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Selected(Activity),
    Skipped(SkipReason),
}

/// Selection state carried across one feed traversal.
#[derive(Debug)]
pub struct ActivityFilter {
    prior_cursor: DateTime<Utc>,
    seen_objects: HashSet<String>,
    newest_selected: Option<DateTime<Utc>>,
}

impl ActivityFilter {
    pub fn new(prior_cursor: DateTime<Utc>) -> Self {
        Self {
            prior_cursor,
            seen_objects: HashSet::new(),
            newest_selected: None,
        }
    }

    pub fn prior_cursor(&self) -> DateTime<Utc> {
        self.prior_cursor
    }

    pub fn newest_selected(&self) -> Option<DateTime<Utc>> {
        self.newest_selected
    }

    /// Cursor to persist after the run.
    pub fn next_cursor(&self) -> DateTime<Utc> {
        self.newest_selected
            .map_or(self.prior_cursor, |newest| newest.max(self.prior_cursor))
    }

    /// Classifies one feed item, updating the seen-set on selection.
    pub fn select(&mut self, item: &Value) -> Selection {
        let Some(end_time) = item
            .get("endTime")
            .and_then(Value::as_str)
            .and_then(parse_timestamp)
        else {
            return Selection::Skipped(SkipReason::Malformed("endTime"));
        };
        if end_time <= self.prior_cursor {
            return Selection::Skipped(SkipReason::AlreadyProcessed);
        }

        let Some(object) = item.get("object") else {
            return Selection::Skipped(SkipReason::Malformed("object"));
        };
        if declared_type(object) != Some(CURATION_TYPE) {
            return Selection::Skipped(SkipReason::NotCuration);
        }

        let Some(kind_text) = item.get("type").and_then(Value::as_str) else {
            return Selection::Skipped(SkipReason::Malformed("type"));
        };
        let Some(kind) = ActivityKind::parse(kind_text) else {
            return Selection::Skipped(SkipReason::UnsupportedType(kind_text.to_string()));
        };

        let Some(object_id) = reference_uri(object) else {
            return Selection::Skipped(SkipReason::Malformed("object_id"));
        };
        if !self.seen_objects.insert(object_id.to_string()) {
            return Selection::Skipped(SkipReason::Superseded(object_id.to_string()));
        }

        self.newest_selected = Some(
            self.newest_selected
                .map_or(end_time, |newest| newest.max(end_time)),
        );
        Selection::Selected(Activity {
            id: reference_uri(item).map(str::to_string),
            kind,
            end_time,
            object_id: object_id.to_string(),
            object: object.clone(),
        })
    }
}

/// Stable-sorts page items newest `endTime` first.
///
/// Pages already in newest-first order are left unchanged; items without a
/// parseable `endTime` move to the end.
pub fn order_newest_first(items: &mut [Value]) {
    items.sort_by_key(|item| {
        Reverse(
            item.get("endTime")
                .and_then(Value::as_str)
                .and_then(parse_timestamp),
        )
    });
}

#[cfg(test)]
mod tests {
    use super::{order_newest_first, ActivityFilter, Selection, SkipReason};
    use crate::model::activity::{parse_timestamp, unix_epoch, ActivityKind};
    use serde_json::{json, Value};

    fn event(kind: &str, object_id: &str, end_time: &str) -> Value {
        json!({
            "id": format!("http://feed/activity/{kind}/{end_time}"),
            "type": kind,
            "endTime": end_time,
            "object": {"@id": object_id, "@type": "cr:Curation"},
        })
    }

    #[test]
    fn first_event_per_object_wins() {
        let mut filter = ActivityFilter::new(unix_epoch());
        let update = filter.select(&event("Update", "cur/a", "2020-01-02T00:00:00Z"));
        let create = filter.select(&event("Create", "cur/a", "2020-01-01T00:00:00Z"));

        match update {
            Selection::Selected(activity) => assert_eq!(activity.kind, ActivityKind::Update),
            other => panic!("unexpected selection: {other:?}"),
        }
        assert_eq!(
            create,
            Selection::Skipped(SkipReason::Superseded("cur/a".to_string()))
        );
    }

    #[test]
    fn events_at_or_before_cursor_are_skipped() {
        let prior = parse_timestamp("2020-01-01T00:00:00Z").unwrap();
        let mut filter = ActivityFilter::new(prior);
        assert_eq!(
            filter.select(&event("Create", "cur/a", "2020-01-01T00:00:00Z")),
            Selection::Skipped(SkipReason::AlreadyProcessed)
        );
        assert_eq!(filter.next_cursor(), prior);
    }

    #[test]
    fn non_curation_and_unsupported_types_are_skipped() {
        let mut filter = ActivityFilter::new(unix_epoch());
        let manifest = json!({
            "type": "Create",
            "endTime": "2020-01-01T00:00:00Z",
            "object": {"@id": "man/1", "@type": "sc:Manifest"},
        });
        assert_eq!(
            filter.select(&manifest),
            Selection::Skipped(SkipReason::NotCuration)
        );
        assert_eq!(
            filter.select(&event("Add", "cur/a", "2020-01-01T00:00:00Z")),
            Selection::Skipped(SkipReason::UnsupportedType("Add".to_string()))
        );
        assert_eq!(
            filter.select(&json!({"type": "Create", "object": {}})),
            Selection::Skipped(SkipReason::Malformed("endTime"))
        );
        assert!(filter.newest_selected().is_none());
    }

    #[test]
    fn next_cursor_is_newest_selected_time() {
        let mut filter = ActivityFilter::new(unix_epoch());
        filter.select(&event("Create", "cur/b", "2020-03-01T00:00:00Z"));
        filter.select(&event("Create", "cur/a", "2020-05-01T00:00:00Z"));
        assert_eq!(
            filter.next_cursor(),
            parse_timestamp("2020-05-01T00:00:00Z").unwrap()
        );
    }

    #[test]
    fn ordering_puts_newest_first_and_keeps_ties_stable() {
        let mut items = vec![
            json!({"id": "old", "endTime": "2020-01-01T00:00:00Z"}),
            json!({"id": "broken"}),
            json!({"id": "new-1", "endTime": "2020-02-01T00:00:00Z"}),
            json!({"id": "new-2", "endTime": "2020-02-01T00:00:00Z"}),
        ];
        order_newest_first(&mut items);
        let ids = items
            .iter()
            .map(|item| item["id"].as_str().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["new-1", "new-2", "old", "broken"]);
    }
}

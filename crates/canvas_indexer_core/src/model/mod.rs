//! Domain model for activity-stream events and indexed canvas regions.
//!
//! # Responsibility
//! - Parse the JSON-LD shapes consumed from feeds and curation documents.
//! - Define the region geometry shared by indexing and querying.
//!
//! # Invariants
//! - Object identity is always the `id`/`@id` string, never structural
//!   equality of JSON values.

pub mod activity;
pub mod reference;
pub mod region;

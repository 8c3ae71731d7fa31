//! Index use-case services.
//!
//! # Responsibility
//! - Apply curation activities to the store (`indexer`).
//! - Answer backlink queries and render them (`spatial_query`,
//!   `backlink_document`).
//!
//! # Invariants
//! - Services stay storage-agnostic; they only talk to repository traits.

pub mod backlink_document;
pub mod indexer;
pub mod spatial_query;

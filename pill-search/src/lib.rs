//! # pill-search
//!
//! Identifies a pill from partial, noisy attributes (shape, color and
//! printed or embossed imprint) and ranks candidates from a catalog index.
//!
//! ## Pipeline
//!
//! ```text
//! RawFeatures → normalize → NormalizedFeatures (+ imprint variations)
//!             → QueryBuilder → QueryDocument → Backend (Tantivy | Elasticsearch)
//!             → ranked hits → rank filter → SearchOutcome
//! ```

/// Search backends: embedded catalog index or remote Elasticsearch.
pub mod backend;
/// Catalog document model and index-side group derivation.
pub mod catalog;
/// Service configuration, tunable boosts and rank thresholds.
pub mod config;
/// Elasticsearch HTTP client, index mapping and hit parsing.
pub mod elastic;
/// Embedded Tantivy catalog index executing built queries.
pub mod index;
/// Shape and color vocabularies and attribute normalization.
pub mod normalize;
/// End-to-end search: normalize, build, execute, filter.
pub mod pipeline;
/// Weighted multi-clause query construction and DSL rendering.
pub mod query;
/// Adaptive cutoff over descending score lists.
pub mod rank;
/// Axum router and HTTP handlers.
pub mod server;
/// Visually confusable imprint spellings.
pub mod variations;

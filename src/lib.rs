// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod document;
pub mod enrich;
pub mod ingest;
pub mod metrics;
pub mod output;
pub mod pipeline;

// ---- Re-exports for stable public API ----
pub use crate::config::AggregatorConfig;
pub use crate::document::ResultDocument;
pub use crate::enrich::GeoResolver;
pub use crate::ingest::types::{FeedSource, GeoRecord, Indicator, IndicatorKind, SourceProvider};
pub use crate::output::{JsonFileSink, OutputSink};
pub use crate::pipeline::{AggregationPipeline, RunSummary};

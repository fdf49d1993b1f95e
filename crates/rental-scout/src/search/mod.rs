//! Listing retrieval: query planning, pagination, extraction, filtering,
//! deduplication against the persisted history, fee enrichment and emission.

pub mod domain;
pub mod emitter;
pub mod enrich;
pub mod extractor;
pub mod fetch;
pub mod filter;
pub mod history;
pub mod paginator;
pub mod pipeline;
pub mod planner;

pub use domain::ListingRecord;
pub use emitter::Emitter;
pub use enrich::{EnrichOutcome, FeeEnricher, FeeExtractor, ListingEnricher, NoEnrichment};
pub use extractor::{ListingExtractor, PageExtraction, ParseError};
pub use fetch::{FetchError, HttpFetcher, PageFetcher, RetryPolicy};
pub use filter::{CriteriaFilter, ExclusionFilter};
pub use history::{DedupStore, PersistenceError};
pub use paginator::{PageFailure, Paginator, ResultPage};
pub use pipeline::{PipelineSettings, QueryReport, RunSummary, SearchPipeline};
pub use planner::{QueryDescriptor, QueryPlanner};

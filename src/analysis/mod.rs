//! Attribution analysis
//!
//! Turns one loaded image into an [`AttributionVerdict`]:
//!
//! - **SignalExtractor trait**: one heuristic over the container metadata
//! - **ExtractionOrchestrator**: runs extractors concurrently under a timeout
//!   and isolates their failures
//! - **Aggregator**: combines the signals under a [`CombinationPolicy`]
//!
//! # Built-in Extractors
//!
//! - **GenerationMetadataExtractor**: recorded prompt/model
//! - **ExifProvenanceExtractor**: generator names in EXIF tags
//! - **XmpProvenanceExtractor**: IPTC source type, tool namespace, CreatorTool
//! - **FingerprintExtractor**: generator-specific metadata layouts
//! - **CompletenessExtractor**: how much of the record is filled in
//! - **ContainerProfileExtractor**: informational container summary
//!
//! # Example
//!
//! ```ignore
//! use attribute::analysis::{Aggregator, ExtractionOrchestrator, ExtractorKind};
//! use attribute::analysis::extractors::registry_for;
//!
//! let orchestrator = ExtractionOrchestrator::new()
//!     .with_registry(registry_for(&ExtractorKind::ALL));
//! let outcome = orchestrator.run(Arc::new(artifact)).await;
//! let verdict = Aggregator::default().aggregate(outcome.signals)?;
//! ```

mod aggregator;
pub mod extractors;
mod orchestrator;
mod traits;
mod types;

pub use aggregator::{AggregationConfig, Aggregator, CombinationPolicy};
pub use extractors::{registry_for, ExtractorKind};
pub use orchestrator::{ExtractionOrchestrator, ExtractionOutcome, DEFAULT_EXTRACTOR_TIMEOUT};
pub use traits::{ExtractorRegistry, SignalExtractor};
pub use types::{
    clamp_unit, AggregationError, AttributionVerdict, Classification, ExtractionSkipped, Signal,
    SignalValue,
};

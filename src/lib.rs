//! Attribute: provenance metadata for AI-generated images
//!
//! Reads, writes and analyzes the generation metadata (prompt, model, date,
//! description, tags, copyright, artist, custom fields) that image
//! generators and this tool store in PNG, JPEG and WebP files.
//!
//! # Core Concepts
//!
//! - **InputArtifact**: one loaded image with its decoded container metadata
//! - **Signals**: independent heuristics, each reporting a weighted observation
//! - **Verdict**: signals combined into attributed / unattributed / inconclusive
//! - **ImageMetadata**: the record read and written by `view`, `set` and import
//!
//! # Example
//!
//! ```no_run
//! use attribute::{AttributeConfig, Pipeline};
//!
//! # async fn run() -> Result<(), attribute::AttributeError> {
//! let pipeline = Pipeline::from_config(&AttributeConfig::default());
//! let verdict = pipeline.analyze_path("render.png").await?;
//! println!("{} ({:.2})", verdict.classification, verdict.confidence);
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod artifact;
pub mod config;
pub mod container;
mod error;
pub mod export;
pub mod metadata;
mod pipeline;
pub mod report;

pub use analysis::{
    AggregationConfig, Aggregator, AttributionVerdict, Classification, CombinationPolicy,
    ExtractionSkipped, ExtractorKind, Signal, SignalExtractor, SignalValue,
};
pub use artifact::{load, ArtifactSummary, InputArtifact, LoadError};
pub use config::{AttributeConfig, ConfigError};
pub use container::ImageFormat;
pub use error::{AttributeError, Result};
pub use export::{ExportError, ExportFormat};
pub use metadata::{read_metadata, write_metadata, ImageMetadata, MetadataError};
pub use pipeline::Pipeline;
pub use report::{render, ReportError, ReportFormat};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

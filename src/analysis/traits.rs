//! Extractor trait and registry

use super::types::{ExtractionSkipped, Signal};
use crate::artifact::InputArtifact;
use crate::container::ImageFormat;
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for signal extractors
///
/// An extractor inspects one artifact and reports at most one signal. A
/// heuristic that cannot apply returns [`ExtractionSkipped`] instead of an
/// error, so the rest of the pipeline keeps going.
///
/// # Example
///
/// ```ignore
/// struct C2paPresence;
///
/// #[async_trait]
/// impl SignalExtractor for C2paPresence {
///     fn id(&self) -> &str { "c2pa_presence" }
///     fn name(&self) -> &str { "C2PA Presence" }
///     fn signal_name(&self) -> &str { "c2pa" }
///
///     async fn extract(&self, artifact: &InputArtifact) -> Result<Signal, ExtractionSkipped> {
///         Ok(Signal::flag("c2pa", artifact.container.c2pa_manifest, 0.9))
///     }
/// }
/// ```
#[async_trait]
pub trait SignalExtractor: Send + Sync {
    /// Unique identifier for this extractor
    fn id(&self) -> &str;

    /// Human-readable name
    fn name(&self) -> &str;

    /// Name of the signal this extractor produces
    fn signal_name(&self) -> &str;

    /// Which container formats this extractor can inspect
    fn handles(&self) -> Vec<ImageFormat> {
        vec![ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::WebP]
    }

    /// Priority for ordering signals in the verdict (lower = earlier)
    fn priority(&self) -> u32 {
        100
    }

    async fn extract(&self, artifact: &InputArtifact) -> Result<Signal, ExtractionSkipped>;

    fn can_handle(&self, format: ImageFormat) -> bool {
        self.handles().contains(&format)
    }

    /// Shorthand for a skip attributed to this extractor
    fn skip(&self, reason: impl Into<String>) -> ExtractionSkipped
    where
        Self: Sized,
    {
        ExtractionSkipped::new(self.id(), reason)
    }
}

/// Ordered set of extractors
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    extractors: Vec<Arc<dyn SignalExtractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extractor
    pub fn register<E: SignalExtractor + 'static>(&mut self, extractor: E) {
        self.extractors.push(Arc::new(extractor));
    }

    pub fn register_arc(&mut self, extractor: Arc<dyn SignalExtractor>) {
        self.extractors.push(extractor);
    }

    /// All extractors sorted by priority, then id
    pub fn extractors(&self) -> Vec<Arc<dyn SignalExtractor>> {
        let mut extractors = self.extractors.clone();
        extractors.sort_by(|a, b| {
            a.priority()
                .cmp(&b.priority())
                .then_with(|| a.id().cmp(b.id()))
        });
        extractors
    }

    /// Extractors that can inspect a given format
    pub fn extractors_for(&self, format: ImageFormat) -> Vec<Arc<dyn SignalExtractor>> {
        self.extractors()
            .into_iter()
            .filter(|e| e.can_handle(format))
            .collect()
    }

    pub fn ids(&self) -> Vec<String> {
        self.extractors().iter().map(|e| e.id().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }
}

//! Load → extract → aggregate

use crate::analysis::{
    registry_for, Aggregator, AttributionVerdict, ExtractionOrchestrator, SignalExtractor,
};
use crate::artifact::{self, InputArtifact};
use crate::config::AttributeConfig;
use crate::error::AttributeError;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// One analysis pipeline; configuration is fixed at construction
pub struct Pipeline {
    orchestrator: ExtractionOrchestrator,
    aggregator: Aggregator,
}

impl Pipeline {
    pub fn new(orchestrator: ExtractionOrchestrator, aggregator: Aggregator) -> Self {
        Self {
            orchestrator,
            aggregator,
        }
    }

    /// Pipeline with the configured built-in extractors
    pub fn from_config(config: &AttributeConfig) -> Self {
        let orchestrator = ExtractionOrchestrator::new()
            .with_registry(registry_for(&config.extractors))
            .with_timeout(config.extractor_timeout());
        Self::new(orchestrator, Aggregator::new(config.aggregation.clone()))
    }

    /// Add an extractor beyond the configured ones
    pub fn register<E: SignalExtractor + 'static>(&mut self, extractor: E) {
        self.orchestrator.register(extractor);
    }

    /// Load the file and analyze it. Nothing runs when loading fails.
    pub async fn analyze_path(&self, path: impl AsRef<Path>) -> Result<AttributionVerdict, AttributeError> {
        let artifact = artifact::load(path)?;
        self.analyze(Arc::new(artifact)).await
    }

    pub async fn analyze(&self, artifact: Arc<InputArtifact>) -> Result<AttributionVerdict, AttributeError> {
        let outcome = self.orchestrator.run(Arc::clone(&artifact)).await;
        let verdict = self
            .aggregator
            .aggregate(outcome.signals)?
            .with_skipped(outcome.skipped)
            .with_subject(artifact.summary());

        info!(
            path = %artifact.path.display(),
            classification = %verdict.classification,
            confidence = verdict.confidence,
            signals = verdict.signals.len(),
            skipped = verdict.skipped.len(),
            "analysis complete"
        );
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Classification, ExtractorKind};
    use crate::container::png::{encode_text, tests::sample_png};
    use tempfile::TempDir;

    fn config(kinds: &[ExtractorKind]) -> AttributeConfig {
        AttributeConfig {
            extractors: kinds.to_vec(),
            ..AttributeConfig::default()
        }
    }

    #[tokio::test]
    async fn test_attributed_png() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gen.png");
        let png = sample_png(&[
            encode_text("prompt", "a lighthouse at dusk").unwrap(),
            encode_text("model", "SDXL").unwrap(),
        ]);
        std::fs::write(&path, png).unwrap();

        let pipeline = Pipeline::from_config(&AttributeConfig::default());
        let verdict = pipeline.analyze_path(&path).await.unwrap();
        assert_eq!(verdict.classification, Classification::Attributed);
        let subject = verdict.subject.as_ref().unwrap();
        assert_eq!(subject.path, path);
        assert_eq!(verdict.signals[0].extractor, "generation_metadata");
        assert_eq!(
            verdict.signals.last().map(|s| s.extractor.as_str()),
            Some("container_profile")
        );
        assert!(verdict.skipped.iter().any(|s| s.extractor == "exif_provenance"));
    }

    #[tokio::test]
    async fn test_missing_file_fails_before_extraction() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::from_config(&AttributeConfig::default());
        let err = pipeline
            .analyze_path(dir.path().join("missing.png"))
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.stage(), "load");
    }

    #[tokio::test]
    async fn test_all_skipped_is_empty_signal_set() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bare.png");
        std::fs::write(&path, sample_png(&[])).unwrap();

        let pipeline = Pipeline::from_config(&config(&[
            ExtractorKind::ExifProvenance,
            ExtractorKind::XmpProvenance,
        ]));
        let err = pipeline.analyze_path(&path).await.unwrap_err();
        assert_eq!(err.exit_code(), 4);
        assert_eq!(err.stage(), "aggregate");
    }
}

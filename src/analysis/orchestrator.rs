//! Extraction orchestrator
//!
//! Runs every registered extractor against one artifact concurrently, one
//! task per extractor, each under its own timeout. Failures of any kind
//! (skip, timeout, panic) are isolated into [`ExtractionSkipped`].

use super::traits::{ExtractorRegistry, SignalExtractor};
use super::types::{ExtractionSkipped, Signal};
use crate::artifact::InputArtifact;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default per-extractor timeout
pub const DEFAULT_EXTRACTOR_TIMEOUT: Duration = Duration::from_millis(2000);

/// Signals and skips of one extraction run, in registry order
#[derive(Debug, Clone, Default)]
pub struct ExtractionOutcome {
    pub signals: Vec<Signal>,
    pub skipped: Vec<ExtractionSkipped>,
}

/// Coordinates extractors over one artifact
pub struct ExtractionOrchestrator {
    registry: ExtractorRegistry,
    timeout: Duration,
}

impl Default for ExtractionOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionOrchestrator {
    pub fn new() -> Self {
        Self {
            registry: ExtractorRegistry::new(),
            timeout: DEFAULT_EXTRACTOR_TIMEOUT,
        }
    }

    pub fn with_registry(mut self, registry: ExtractorRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register an extractor
    pub fn register<E: SignalExtractor + 'static>(&mut self, extractor: E) {
        self.registry.register(extractor);
    }

    pub fn registry(&self) -> &ExtractorRegistry {
        &self.registry
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run all extractors against `artifact`
    pub async fn run(&self, artifact: Arc<InputArtifact>) -> ExtractionOutcome {
        let extractors = self.registry.extractors();

        let mut handles = Vec::with_capacity(extractors.len());
        for extractor in &extractors {
            if !extractor.can_handle(artifact.format) {
                handles.push(None);
                continue;
            }

            let extractor = Arc::clone(extractor);
            let artifact = Arc::clone(&artifact);
            let timeout = self.timeout;
            handles.push(Some(tokio::spawn(async move {
                match tokio::time::timeout(timeout, extractor.extract(&artifact)).await {
                    Ok(result) => result,
                    Err(_) => Err(ExtractionSkipped::new(
                        extractor.id(),
                        format!("timed out after {} ms", timeout.as_millis()),
                    )),
                }
            })));
        }

        // Tasks already run concurrently; awaiting in order only fixes the output order
        let mut results = Vec::with_capacity(handles.len());
        for (extractor, handle) in extractors.iter().zip(handles) {
            let result = match handle {
                None => Err(ExtractionSkipped::new(
                    extractor.id(),
                    format!("does not handle {} images", artifact.format),
                )),
                Some(handle) => match handle.await {
                    Ok(result) => result,
                    Err(e) if e.is_panic() => Err(ExtractionSkipped::new(extractor.id(), "panicked")),
                    Err(e) => Err(ExtractionSkipped::new(
                        extractor.id(),
                        format!("task failed: {}", e),
                    )),
                },
            };
            results.push(result);
        }

        let mut outcome = ExtractionOutcome::default();
        for (extractor, result) in extractors.iter().zip(results) {
            match result {
                Ok(signal) => {
                    let signal = signal.with_extractor(extractor.id());
                    debug!(
                        extractor = extractor.id(),
                        signal = %signal.name,
                        value = %signal.value,
                        confidence = signal.confidence,
                        "signal extracted"
                    );
                    outcome.signals.push(signal);
                }
                Err(mut skipped) => {
                    skipped.extractor = extractor.id().to_string();
                    warn!(extractor = extractor.id(), reason = %skipped.reason, "extractor skipped");
                    outcome.skipped.push(skipped);
                }
            }
        }
        outcome
    }
}

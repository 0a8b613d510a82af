//! Container profile extractor
//!
//! Informational only: the label describes the file and never votes.

use crate::analysis::{ExtractionSkipped, Signal, SignalExtractor};
use crate::artifact::InputArtifact;
use async_trait::async_trait;

pub struct ContainerProfileExtractor {
    priority: u32,
}

impl Default for ContainerProfileExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerProfileExtractor {
    pub fn new() -> Self {
        Self { priority: 90 }
    }
}

#[async_trait]
impl SignalExtractor for ContainerProfileExtractor {
    fn id(&self) -> &str {
        "container_profile"
    }

    fn name(&self) -> &str {
        "Container Profile"
    }

    fn signal_name(&self) -> &str {
        "container"
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn extract(&self, artifact: &InputArtifact) -> Result<Signal, ExtractionSkipped> {
        let container = &artifact.container;
        let dimensions = container
            .dimensions
            .map(|(w, h)| format!("{}x{}", w, h))
            .unwrap_or_else(|| "?x?".to_string());
        let label = format!(
            "{} {}, {} chunks",
            artifact.format,
            dimensions,
            container.chunks.len()
        );

        let mut signal = Signal::label(self.signal_name(), label, 1.0);
        if !container.warnings.is_empty() {
            signal = signal.with_detail(container.warnings.join("; "));
        }
        Ok(signal)
    }
}

//! Attribution completeness extractor

use crate::analysis::{ExtractionSkipped, Signal, SignalExtractor};
use crate::artifact::InputArtifact;
use crate::metadata::{self, STANDARD_FIELDS};
use async_trait::async_trait;

/// Scores how much of the metadata record is filled in
pub struct CompletenessExtractor {
    priority: u32,
}

impl Default for CompletenessExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletenessExtractor {
    pub fn new() -> Self {
        Self { priority: 50 }
    }
}

#[async_trait]
impl SignalExtractor for CompletenessExtractor {
    fn id(&self) -> &str {
        "attribution_completeness"
    }

    fn name(&self) -> &str {
        "Attribution Completeness"
    }

    fn signal_name(&self) -> &str {
        "completeness"
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn extract(&self, artifact: &InputArtifact) -> Result<Signal, ExtractionSkipped> {
        if !artifact.container.has_metadata() {
            return Err(self.skip("no metadata sources in container"));
        }

        let record = metadata::from_container(&artifact.container);
        let populated = record.populated_fields();
        let fraction = populated.len() as f64 / STANDARD_FIELDS.len() as f64;

        let detail = if populated.is_empty() {
            "no standard fields populated".to_string()
        } else {
            format!(
                "{}/{} fields: {}",
                populated.len(),
                STANDARD_FIELDS.len(),
                populated.join(", ")
            )
        };
        Ok(Signal::score(self.signal_name(), fraction, 0.3).with_detail(detail))
    }
}

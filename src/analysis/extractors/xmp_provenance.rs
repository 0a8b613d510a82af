//! XMP provenance extractor

use super::generator_named_in;
use crate::analysis::{ExtractionSkipped, Signal, SignalExtractor};
use crate::artifact::InputArtifact;
use crate::container::xmp;
use async_trait::async_trait;

/// IPTC digital source types that declare generative AI involvement
const AI_SOURCE_TYPES: &[&str] = &[
    "trainedAlgorithmicMedia",
    "compositeWithTrainedAlgorithmicMedia",
];

/// Reads the XMP packet for IPTC DigitalSourceType, the tool's own
/// namespace and a generator CreatorTool, strongest evidence first
pub struct XmpProvenanceExtractor {
    priority: u32,
}

impl Default for XmpProvenanceExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl XmpProvenanceExtractor {
    pub fn new() -> Self {
        Self { priority: 30 }
    }
}

#[async_trait]
impl SignalExtractor for XmpProvenanceExtractor {
    fn id(&self) -> &str {
        "xmp_provenance"
    }

    fn name(&self) -> &str {
        "XMP Provenance"
    }

    fn signal_name(&self) -> &str {
        "xmp_source_type"
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn extract(&self, artifact: &InputArtifact) -> Result<Signal, ExtractionSkipped> {
        let packet = artifact
            .container
            .xmp
            .as_deref()
            .ok_or_else(|| self.skip("no XMP packet"))?;
        let props = xmp::decode(packet).map_err(|e| self.skip(e.to_string()))?;
        let name = self.signal_name();

        if let Some(source) = props.digital_source_type.as_deref().filter(|source| {
            AI_SOURCE_TYPES
                .iter()
                .any(|t| source.rsplit('/').next() == Some(*t))
        }) {
            return Ok(Signal::flag(name, true, 0.9)
                .with_detail(format!("DigitalSourceType {}", source)));
        }

        if !props.tool_fields.is_empty() {
            let fields: Vec<_> = props.tool_fields.keys().map(String::as_str).collect();
            return Ok(Signal::flag(name, true, 0.8)
                .with_detail(format!("attribution fields: {}", fields.join(", "))));
        }

        if let Some(generator) = props.creator_tool.as_deref().and_then(generator_named_in) {
            return Ok(Signal::flag(name, true, 0.7)
                .with_detail(format!("CreatorTool names {}", generator)));
        }

        Ok(Signal::flag(name, false, 0.4).with_detail("XMP declares no generator"))
    }
}

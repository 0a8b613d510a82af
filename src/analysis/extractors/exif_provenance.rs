//! EXIF provenance extractor

use super::{generator_named_in, is_a1111_parameters};
use crate::analysis::{ExtractionSkipped, Signal, SignalExtractor};
use crate::artifact::InputArtifact;
use crate::container::exif;
use async_trait::async_trait;

/// Checks EXIF Software, Artist, ImageDescription and UserComment for a
/// generator name or generation settings
pub struct ExifProvenanceExtractor {
    priority: u32,
}

impl Default for ExifProvenanceExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ExifProvenanceExtractor {
    pub fn new() -> Self {
        Self { priority: 20 }
    }
}

#[async_trait]
impl SignalExtractor for ExifProvenanceExtractor {
    fn id(&self) -> &str {
        "exif_provenance"
    }

    fn name(&self) -> &str {
        "EXIF Provenance"
    }

    fn signal_name(&self) -> &str {
        "exif_generator"
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn extract(&self, artifact: &InputArtifact) -> Result<Signal, ExtractionSkipped> {
        let block = artifact
            .container
            .exif
            .as_deref()
            .ok_or_else(|| self.skip("no EXIF block"))?;
        let fields = exif::decode(block).map_err(|e| self.skip(format!("malformed EXIF: {}", e)))?;

        let named = [
            ("Software", &fields.software),
            ("Artist", &fields.artist),
            ("ImageDescription", &fields.image_description),
            ("UserComment", &fields.user_comment),
        ]
        .into_iter()
        .find_map(|(tag, value)| {
            let value = value.as_deref()?;
            generator_named_in(value).map(|name| format!("{} names {}", tag, name))
        });

        let settings = fields
            .user_comment
            .as_deref()
            .filter(|c| is_a1111_parameters(c))
            .map(|_| "UserComment holds generation settings".to_string());

        Ok(match named.or(settings) {
            Some(detail) => Signal::flag(self.signal_name(), true, 0.7).with_detail(detail),
            None => Signal::flag(self.signal_name(), false, 0.4)
                .with_detail("EXIF names no known generator"),
        })
    }
}

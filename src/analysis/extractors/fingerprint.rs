//! Generator fingerprint extractor
//!
//! Recognises the metadata layouts that specific generators leave behind,
//! independent of any self-declared attribution fields.

use super::{is_a1111_parameters, is_comfyui_graph};
use crate::analysis::{ExtractionSkipped, Signal, SignalExtractor};
use crate::artifact::InputArtifact;
use crate::container::{exif, ContainerMetadata};
use async_trait::async_trait;
use serde_json::Value;

/// PNG text keys written by InvokeAI
const INVOKEAI_KEYS: &[&str] = &["invokeai_metadata", "invokeai_graph", "sd-metadata", "Dream"];

pub struct FingerprintExtractor {
    priority: u32,
}

impl Default for FingerprintExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FingerprintExtractor {
    pub fn new() -> Self {
        Self { priority: 40 }
    }
}

/// ComfyUI stores its node graph as JSON in `prompt` and `workflow` chunks
fn is_comfyui(container: &ContainerMetadata) -> bool {
    if container.text("prompt").is_some_and(is_comfyui_graph) {
        return true;
    }
    let workflow = container
        .text("workflow")
        .and_then(|text| serde_json::from_str::<Value>(text).ok());
    matches!(workflow, Some(Value::Object(ref w)) if w.contains_key("nodes"))
}

fn fingerprints(container: &ContainerMetadata) -> Vec<&'static str> {
    let mut hits = Vec::new();

    let a1111_text = container
        .text_entries
        .iter()
        .any(|e| e.key == "parameters" && is_a1111_parameters(&e.value));
    let a1111_exif = container
        .exif
        .as_deref()
        .and_then(|block| exif::decode(block).ok())
        .and_then(|fields| fields.user_comment)
        .map_or(false, |comment| is_a1111_parameters(&comment));
    if a1111_text || a1111_exif {
        hits.push("Automatic1111 parameters");
    }

    if is_comfyui(container) {
        hits.push("ComfyUI workflow");
    }

    if INVOKEAI_KEYS.iter().any(|key| container.text(key).is_some()) {
        hits.push("InvokeAI metadata");
    }

    let novelai = ["Software", "Source"]
        .iter()
        .filter_map(|key| container.text(key))
        .any(|value| value.to_lowercase().contains("novelai"));
    if novelai {
        hits.push("NovelAI text chunks");
    }

    if container.c2pa_manifest {
        hits.push("C2PA manifest");
    }

    hits
}

#[async_trait]
impl SignalExtractor for FingerprintExtractor {
    fn id(&self) -> &str {
        "generator_fingerprint"
    }

    fn name(&self) -> &str {
        "Generator Fingerprint"
    }

    fn signal_name(&self) -> &str {
        "fingerprint_match"
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn extract(&self, artifact: &InputArtifact) -> Result<Signal, ExtractionSkipped> {
        let hits = fingerprints(&artifact.container);
        Ok(if hits.is_empty() {
            Signal::flag(self.signal_name(), false, 0.3).with_detail("no generator fingerprint")
        } else {
            Signal::flag(self.signal_name(), true, 0.85).with_detail(hits.join(", "))
        })
    }
}

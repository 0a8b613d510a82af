//! Built-in signal extractors
//!
//! The set is closed: [`ExtractorKind`] enumerates every built-in extractor
//! and configuration selects among them by id.

mod completeness;
mod container_profile;
mod exif_provenance;
mod fingerprint;
mod generation;
mod xmp_provenance;

pub use completeness::CompletenessExtractor;
pub use container_profile::ContainerProfileExtractor;
pub use exif_provenance::ExifProvenanceExtractor;
pub use fingerprint::FingerprintExtractor;
pub use generation::GenerationMetadataExtractor;
pub use xmp_provenance::XmpProvenanceExtractor;

use super::traits::{ExtractorRegistry, SignalExtractor};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

/// Lowercase fragments of generator and tool names
pub const KNOWN_GENERATORS: &[&str] = &[
    "stable diffusion",
    "stablediffusion",
    "sdxl",
    "automatic1111",
    "comfyui",
    "invokeai",
    "novelai",
    "midjourney",
    "dall-e",
    "dall·e",
    "dalle",
    "firefly",
    "imagen",
    "gpt-image",
    "chatgpt",
    "leonardo.ai",
    "ideogram",
    "flux.1",
    "playground v",
];

/// First known generator named in `text`, case-insensitively
pub fn generator_named_in(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    KNOWN_GENERATORS
        .iter()
        .copied()
        .find(|name| lower.contains(name))
}

/// Automatic1111-style `parameters` block: prompt lines followed by a
/// `Steps: N, Sampler: ..., Model: ...` settings line
pub(crate) fn is_a1111_parameters(text: &str) -> bool {
    static STEPS: OnceLock<Option<Regex>> = OnceLock::new();
    STEPS
        .get_or_init(|| Regex::new(r"\bSteps: \d+").ok())
        .as_ref()
        .map_or(false, |re| re.is_match(text))
}

/// ComfyUI node graph JSON: an object of nodes carrying `class_type`
pub(crate) fn is_comfyui_graph(text: &str) -> bool {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(nodes)) => nodes.values().any(|node| node.get("class_type").is_some()),
        _ => false,
    }
}

/// `Model: <name>` from an Automatic1111 settings line
pub(crate) fn a1111_model(text: &str) -> Option<String> {
    static MODEL: OnceLock<Option<Regex>> = OnceLock::new();
    let re = MODEL
        .get_or_init(|| Regex::new(r"\bModel: ([^,\n]+)").ok())
        .as_ref()?;
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|m| !m.is_empty())
}

/// Built-in extractors, selectable by id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorKind {
    GenerationMetadata,
    ExifProvenance,
    XmpProvenance,
    GeneratorFingerprint,
    AttributionCompleteness,
    ContainerProfile,
}

impl ExtractorKind {
    pub const ALL: [ExtractorKind; 6] = [
        Self::GenerationMetadata,
        Self::ExifProvenance,
        Self::XmpProvenance,
        Self::GeneratorFingerprint,
        Self::AttributionCompleteness,
        Self::ContainerProfile,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Self::GenerationMetadata => "generation_metadata",
            Self::ExifProvenance => "exif_provenance",
            Self::XmpProvenance => "xmp_provenance",
            Self::GeneratorFingerprint => "generator_fingerprint",
            Self::AttributionCompleteness => "attribution_completeness",
            Self::ContainerProfile => "container_profile",
        }
    }

    /// Instantiate the extractor
    pub fn build(&self) -> Arc<dyn SignalExtractor> {
        match self {
            Self::GenerationMetadata => Arc::new(GenerationMetadataExtractor::new()),
            Self::ExifProvenance => Arc::new(ExifProvenanceExtractor::new()),
            Self::XmpProvenance => Arc::new(XmpProvenanceExtractor::new()),
            Self::GeneratorFingerprint => Arc::new(FingerprintExtractor::new()),
            Self::AttributionCompleteness => Arc::new(CompletenessExtractor::new()),
            Self::ContainerProfile => Arc::new(ContainerProfileExtractor::new()),
        }
    }
}

impl fmt::Display for ExtractorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ExtractorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.id() == normalized)
            .ok_or_else(|| {
                let known: Vec<_> = Self::ALL.iter().map(|k| k.id()).collect();
                format!("unknown extractor '{}' (known: {})", s, known.join(", "))
            })
    }
}

/// Registry holding the given built-in extractors
pub fn registry_for(kinds: &[ExtractorKind]) -> ExtractorRegistry {
    let mut registry = ExtractorRegistry::new();
    for kind in kinds {
        if !registry.ids().iter().any(|id| id == kind.id()) {
            registry.register_arc(kind.build());
        }
    }
    registry
}

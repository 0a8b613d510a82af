//! Generation metadata extractor
//!
//! Looks for a recorded prompt or model: PNG text keys, the tool's XMP
//! namespace, or an Automatic1111 `parameters` block. ComfyUI graphs stored
//! under `prompt` are left to the fingerprint extractor.

use super::{a1111_model, is_a1111_parameters, is_comfyui_graph};
use crate::analysis::{ExtractionSkipped, Signal, SignalExtractor};
use crate::artifact::InputArtifact;
use crate::container::xmp;
use async_trait::async_trait;

pub struct GenerationMetadataExtractor {
    priority: u32,
}

impl Default for GenerationMetadataExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationMetadataExtractor {
    pub fn new() -> Self {
        Self { priority: 10 }
    }
}

#[derive(Debug, Default)]
struct Findings {
    prompt: Option<String>,
    model: Option<String>,
    source: Option<&'static str>,
}

impl Findings {
    fn record(&mut self, prompt: Option<&str>, model: Option<&str>, source: &'static str) {
        let clean = |v: Option<&str>| v.map(str::trim).filter(|v| !v.is_empty()).map(String::from);
        let (prompt, model) = (clean(prompt), clean(model));
        if prompt.is_none() && model.is_none() {
            return;
        }
        if self.source.is_none() {
            self.source = Some(source);
        }
        if self.prompt.is_none() {
            self.prompt = prompt;
        }
        if self.model.is_none() {
            self.model = model;
        }
    }
}

fn find(artifact: &InputArtifact) -> Findings {
    let container = &artifact.container;
    let mut findings = Findings::default();

    // A ComfyUI `prompt` chunk is a node graph, not a prompt
    let prompt = container.text("prompt").filter(|text| !is_comfyui_graph(text));
    findings.record(prompt, container.text("model"), "text chunks");

    if let Some(props) = container.xmp.as_deref().and_then(|p| xmp::decode(p).ok()) {
        findings.record(
            props.tool_fields.get("prompt").map(String::as_str),
            props.tool_fields.get("model").map(String::as_str),
            "XMP",
        );
    }

    if let Some(params) = container.text("parameters").filter(|p| is_a1111_parameters(p)) {
        let prompt = params.lines().next();
        let model = a1111_model(params);
        findings.record(prompt, model.as_deref(), "generation parameters");
    }

    findings
}

#[async_trait]
impl SignalExtractor for GenerationMetadataExtractor {
    fn id(&self) -> &str {
        "generation_metadata"
    }

    fn name(&self) -> &str {
        "Generation Metadata"
    }

    fn signal_name(&self) -> &str {
        "metadata_match"
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn extract(&self, artifact: &InputArtifact) -> Result<Signal, ExtractionSkipped> {
        let findings = find(artifact);
        let source = findings.source.unwrap_or("none");

        let signal = match (&findings.model, &findings.prompt) {
            (Some(model), _) => Signal::flag(self.signal_name(), true, 0.8)
                .with_detail(format!("model '{}' recorded in {}", model, source)),
            (None, Some(_)) => Signal::flag(self.signal_name(), true, 0.6)
                .with_detail(format!("prompt recorded in {}", source)),
            (None, None) => Signal::flag(self.signal_name(), false, 0.5)
                .with_detail("no prompt or model recorded"),
        };
        Ok(signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::extractors::tests::artifact;
    use crate::analysis::SignalValue;
    use crate::container::png::{encode_text, tests::sample_png};

    #[tokio::test]
    async fn test_model_in_text_chunks() {
        let png = sample_png(&[
            encode_text("prompt", "a red fox").unwrap(),
            encode_text("model", "SDXL 1.0").unwrap(),
        ]);
        let signal = GenerationMetadataExtractor::new()
            .extract(&artifact("fox.png", png))
            .await
            .unwrap();
        assert_eq!(signal.value, SignalValue::Flag(true));
        assert_eq!(signal.confidence, 0.8);
        assert!(signal.detail.unwrap().contains("SDXL 1.0"));
    }

    #[tokio::test]
    async fn test_prompt_only_from_parameters() {
        let png = sample_png(&[encode_text(
            "parameters",
            "a lighthouse\nSteps: 20, Sampler: Euler a, CFG scale: 7",
        )
        .unwrap()]);
        let signal = GenerationMetadataExtractor::new()
            .extract(&artifact("lighthouse.png", png))
            .await
            .unwrap();
        assert_eq!(signal.value, SignalValue::Flag(true));
        assert_eq!(signal.confidence, 0.6);
    }

    #[tokio::test]
    async fn test_comfyui_graph_is_not_a_prompt() {
        let graph = r#"{"3": {"class_type": "KSampler", "inputs": {"seed": 1}}}"#;
        let png = sample_png(&[encode_text("prompt", graph).unwrap()]);
        let signal = GenerationMetadataExtractor::new()
            .extract(&artifact("comfy.png", png))
            .await
            .unwrap();
        assert_eq!(signal.value, SignalValue::Flag(false));
        assert_eq!(signal.confidence, 0.5);

        let png = sample_png(&[
            encode_text("prompt", graph).unwrap(),
            encode_text("model", "sd_xl_base_1.0").unwrap(),
        ]);
        let signal = GenerationMetadataExtractor::new()
            .extract(&artifact("comfy.png", png))
            .await
            .unwrap();
        assert_eq!(signal.confidence, 0.8);
    }

    #[tokio::test]
    async fn test_nothing_recorded() {
        let signal = GenerationMetadataExtractor::new()
            .extract(&artifact("blank.png", sample_png(&[])))
            .await
            .unwrap();
        assert_eq!(signal.value, SignalValue::Flag(false));
        assert_eq!(signal.confidence, 0.5);
    }
}

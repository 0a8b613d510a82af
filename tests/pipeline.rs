mod common;

use async_trait::async_trait;
use attribute::analysis::{registry_for, ExtractionOrchestrator};
use attribute::{
    AggregationConfig, Aggregator, AttributeConfig, Classification, ExtractionSkipped,
    ExtractorKind, InputArtifact, Pipeline, ReportFormat, Signal, SignalExtractor,
};
use common::*;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test]
async fn test_a1111_png_is_attributed() {
    let dir = TempDir::new().unwrap();
    let params = "portrait of a cat\nNegative prompt: blurry\nSteps: 30, Sampler: DPM++ 2M, Model: dreamshaper_8";
    let path = write_image(dir.path(), "cat.png", &png_with_text(&[("parameters", params)]));

    let pipeline = Pipeline::from_config(&AttributeConfig::default());
    let verdict = pipeline.analyze_path(&path).await.unwrap();

    assert_eq!(verdict.classification, Classification::Attributed);
    assert!(verdict.confidence > 0.5);
    let names: Vec<&str> = verdict.signals.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["metadata_match", "fingerprint_match", "completeness", "container"]
    );
    let skipped: Vec<&str> = verdict.skipped.iter().map(|s| s.extractor.as_str()).collect();
    assert_eq!(skipped, vec!["exif_provenance", "xmp_provenance"]);
}

#[tokio::test]
async fn test_camera_jpeg_is_unattributed() {
    let dir = TempDir::new().unwrap();
    let jpeg = jpeg_with_exif(&[
        (TAG_SOFTWARE, "Firmware Version 1.4.0"),
        (TAG_ARTIST, "Jo Doe"),
        (TAG_COPYRIGHT, "Jo Doe 2024"),
    ]);
    let path = write_image(dir.path(), "holiday.jpg", &jpeg);

    let pipeline = Pipeline::from_config(&AttributeConfig::default());
    let verdict = pipeline.analyze_path(&path).await.unwrap();

    let metadata = verdict.signals.iter().find(|s| s.name == "metadata_match").unwrap();
    assert_eq!(metadata.value, attribute::SignalValue::Flag(false));
    assert_eq!(verdict.classification, Classification::Unattributed);
    assert_eq!(verdict.subject.as_ref().unwrap().dimensions, Some((16, 16)));
}

#[tokio::test]
async fn test_analysis_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = write_image(
        dir.path(),
        "gen.png",
        &png_with_text(&[("prompt", "fog over hills"), ("model", "SDXL"), ("tags", "fog, hills")]),
    );

    let pipeline = Pipeline::from_config(&AttributeConfig::default());
    let first = pipeline.analyze_path(&path).await.unwrap();
    let second = pipeline.analyze_path(&path).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_load_errors_map_to_exit_codes() {
    let dir = TempDir::new().unwrap();
    let pipeline = Pipeline::from_config(&AttributeConfig::default());

    let missing = pipeline.analyze_path(dir.path().join("nope.png")).await.unwrap_err();
    assert_eq!(missing.exit_code(), 2);

    let gif = write_image(dir.path(), "anim.gif", b"GIF89a");
    assert_eq!(pipeline.analyze_path(&gif).await.unwrap_err().exit_code(), 3);

    assert_eq!(pipeline.analyze_path(dir.path()).await.unwrap_err().exit_code(), 3);
}

struct CountingExtractor {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl SignalExtractor for CountingExtractor {
    fn id(&self) -> &str {
        "counting"
    }

    fn name(&self) -> &str {
        "Counting"
    }

    fn signal_name(&self) -> &str {
        "counted"
    }

    async fn extract(&self, _artifact: &InputArtifact) -> Result<Signal, ExtractionSkipped> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Signal::flag("counted", true, 0.1))
    }
}

#[tokio::test]
async fn test_missing_file_runs_no_extractor() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut pipeline = Pipeline::from_config(&AttributeConfig::default());
    pipeline.register(CountingExtractor {
        calls: Arc::clone(&calls),
    });

    let dir = TempDir::new().unwrap();
    assert!(pipeline.analyze_path(dir.path().join("gone.webp")).await.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let path = write_image(dir.path(), "ok.webp", &webp_lossy(8, 8));
    pipeline.analyze_path(&path).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

struct SlowExtractor;

#[async_trait]
impl SignalExtractor for SlowExtractor {
    fn id(&self) -> &str {
        "slow"
    }

    fn name(&self) -> &str {
        "Slow"
    }

    fn signal_name(&self) -> &str {
        "slow"
    }

    async fn extract(&self, _artifact: &InputArtifact) -> Result<Signal, ExtractionSkipped> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(Signal::flag("slow", false, 1.0))
    }
}

#[tokio::test]
async fn test_slow_extractor_is_skipped() {
    let orchestrator = ExtractionOrchestrator::new()
        .with_registry(registry_for(&[ExtractorKind::GenerationMetadata]))
        .with_timeout(Duration::from_millis(50));
    let mut pipeline = Pipeline::new(orchestrator, Aggregator::new(AggregationConfig::default()));
    pipeline.register(SlowExtractor);

    let dir = TempDir::new().unwrap();
    let path = write_image(dir.path(), "a.png", &png_with_text(&[("model", "Flux")]));
    let verdict = pipeline.analyze_path(&path).await.unwrap();

    assert_eq!(verdict.classification, Classification::Attributed);
    assert_eq!(verdict.skipped.len(), 1);
    assert_eq!(verdict.skipped[0].extractor, "slow");
    assert!(verdict.skipped[0].reason.contains("timed out"));
}

#[tokio::test]
async fn test_structured_report() {
    let dir = TempDir::new().unwrap();
    let path = write_image(dir.path(), "g.png", &png_with_text(&[("model", "SDXL")]));
    let verdict = Pipeline::from_config(&AttributeConfig::default())
        .analyze_path(&path)
        .await
        .unwrap();

    let text = attribute::render(&verdict, ReportFormat::Structured).unwrap();
    let json: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["classification"], "attributed");
    assert_eq!(json["subject"]["format"], "png");
    assert_eq!(json["subject"]["sha256"].as_str().unwrap().len(), 64);
}

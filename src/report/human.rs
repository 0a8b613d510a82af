//! Plain-text verdict renderer

use crate::analysis::AttributionVerdict;

/// Render a verdict as a fixed-layout text block
pub fn render(verdict: &AttributionVerdict) -> String {
    let mut out = String::with_capacity(1024);

    if let Some(subject) = &verdict.subject {
        out.push_str(&format!("image:          {}\n", subject.path.display()));
        let dimensions = subject
            .dimensions
            .map(|(w, h)| format!(", {}x{}", w, h))
            .unwrap_or_default();
        out.push_str(&format!(
            "format:         {} ({} bytes{})\n",
            subject.format, subject.size, dimensions
        ));
        out.push_str(&format!("sha256:         {}\n", subject.sha256));
    }

    out.push_str(&format!("classification: {}\n", verdict.classification));
    out.push_str(&format!("confidence:     {:.3}\n", verdict.confidence));
    out.push_str(&format!(
        "score:          {:.3} ({})\n",
        verdict.score, verdict.policy
    ));

    out.push_str(&format!("\nsignals ({}):\n", verdict.signals.len()));
    if verdict.signals.is_empty() {
        out.push_str("  (none)\n");
    }
    let width = verdict
        .signals
        .iter()
        .map(|s| s.name.len())
        .max()
        .unwrap_or(0);
    for signal in &verdict.signals {
        let weight = if signal.is_voting() {
            format!("w={:.2}", signal.confidence)
        } else {
            "info".to_string()
        };
        out.push_str(&format!(
            "  {:<width$}  {:<8} {}  [{}]",
            signal.name,
            weight,
            signal.value,
            signal.extractor,
            width = width
        ));
        if let Some(detail) = &signal.detail {
            out.push_str(&format!(" {}", detail));
        }
        out.push('\n');
    }

    if !verdict.skipped.is_empty() {
        out.push_str(&format!("\nskipped ({}):\n", verdict.skipped.len()));
        for skipped in &verdict.skipped {
            out.push_str(&format!("  {}: {}\n", skipped.extractor, skipped.reason));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::sample_verdict;

    #[test]
    fn test_human_layout() {
        let text = render(&sample_verdict());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "classification: attributed");
        assert_eq!(lines[1], "confidence:     0.571");
        assert_eq!(lines[2], "score:          0.571 (weighted_average)");
        assert_eq!(lines[4], "signals (3):");
        assert_eq!(
            lines[5],
            "  metadata_match     w=0.80   true  [generation_metadata] model SDXL recorded"
        );
        assert!(lines[7].contains("info"));
        assert!(text.ends_with("skipped (1):\n  exif_provenance: no EXIF block\n"));
    }
}

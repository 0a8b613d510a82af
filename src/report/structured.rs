//! JSON verdict renderer

use super::ReportError;
use crate::analysis::AttributionVerdict;

/// Render a verdict as pretty-printed JSON
pub fn render(verdict: &AttributionVerdict) -> Result<String, ReportError> {
    Ok(serde_json::to_string_pretty(verdict)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::sample_verdict;
    use serde_json::Value;

    #[test]
    fn test_structured_shape() {
        let json: Value = serde_json::from_str(&render(&sample_verdict()).unwrap()).unwrap();
        assert_eq!(json["classification"], "attributed");
        assert_eq!(json["policy"], "weighted_average");
        assert_eq!(json["signals"][0]["name"], "metadata_match");
        assert_eq!(json["signals"][0]["value"]["type"], "flag");
        assert_eq!(json["signals"][0]["value"]["value"], true);
        assert_eq!(json["skipped"][0]["extractor"], "exif_provenance");
        assert!(json.get("subject").is_none());
    }

    #[test]
    fn test_structured_parses_back() {
        let verdict = sample_verdict();
        let parsed: AttributionVerdict = serde_json::from_str(&render(&verdict).unwrap()).unwrap();
        assert_eq!(parsed, verdict);
    }
}

//! Signal aggregation
//!
//! Combines the signals of one run into an [`AttributionVerdict`] under a
//! named combination policy.

use super::types::{AggregationError, AttributionVerdict, Classification, Signal};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// How voting signals are combined into one score
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombinationPolicy {
    /// Σ wᵢ·sᵢ / Σ wᵢ over voting signals
    #[default]
    WeightedAverage,
    /// Support of the heaviest voting signal (earliest wins ties)
    StrongestSignal,
}

impl CombinationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WeightedAverage => "weighted_average",
            Self::StrongestSignal => "strongest_signal",
        }
    }
}

impl fmt::Display for CombinationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CombinationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "weighted_average" => Ok(Self::WeightedAverage),
            "strongest_signal" => Ok(Self::StrongestSignal),
            other => Err(format!(
                "unknown policy '{}' (expected weighted_average or strongest_signal)",
                other
            )),
        }
    }
}

/// Aggregation options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub policy: CombinationPolicy,
    /// Score at or above which the verdict is "attributed"; scores at or
    /// below `1 - threshold` are "unattributed"
    pub threshold: f64,
    /// Minimum summed weight of voting signals for a decisive verdict
    pub min_evidence: f64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            policy: CombinationPolicy::WeightedAverage,
            threshold: 0.5,
            min_evidence: 0.0,
        }
    }
}

/// Combines signals into a verdict
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    config: AggregationConfig,
}

impl Aggregator {
    pub fn new(config: AggregationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    /// Aggregate an ordered signal set.
    ///
    /// Fails with [`AggregationError::EmptySignalSet`] when there is no
    /// signal at all. Sets with only non-voting or zero-weight signals give
    /// an inconclusive verdict with confidence 0.
    pub fn aggregate(&self, signals: Vec<Signal>) -> Result<AttributionVerdict, AggregationError> {
        if signals.is_empty() {
            return Err(AggregationError::EmptySignalSet);
        }

        let voting: Vec<(f64, f64)> = signals
            .iter()
            .filter(|s| s.is_voting())
            .filter_map(|s| s.value.support().map(|support| (s.confidence, support)))
            .collect();
        let evidence: f64 = voting.iter().map(|(w, _)| w).sum();

        let score = match self.config.policy {
            _ if voting.is_empty() => 0.5,
            CombinationPolicy::WeightedAverage => {
                voting.iter().map(|(w, s)| w * s).sum::<f64>() / evidence
            }
            CombinationPolicy::StrongestSignal => {
                let mut best = voting[0];
                for &(w, s) in &voting[1..] {
                    if w > best.0 {
                        best = (w, s);
                    }
                }
                best.1
            }
        };
        let score = score.clamp(0.0, 1.0);

        let threshold = self.config.threshold;
        let enough_evidence = !voting.is_empty() && evidence >= self.config.min_evidence;

        let (classification, confidence) = if !enough_evidence {
            (Classification::Inconclusive, 0.0)
        } else if score >= threshold {
            (Classification::Attributed, score.max(1.0 - score))
        } else if score <= 1.0 - threshold {
            (Classification::Unattributed, score.max(1.0 - score))
        } else {
            (Classification::Inconclusive, 1.0 - (2.0 * score - 1.0).abs())
        };

        debug!(
            policy = %self.config.policy,
            score,
            evidence,
            threshold,
            classification = %classification,
            "aggregated signals"
        );

        Ok(AttributionVerdict {
            classification,
            confidence: confidence.clamp(0.0, 1.0),
            score,
            policy: self.config.policy.to_string(),
            signals,
            skipped: Vec::new(),
            subject: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worked_example() -> Vec<Signal> {
        vec![
            Signal::flag("metadata_match", true, 0.8),
            Signal::flag("fingerprint_match", false, 0.6),
        ]
    }

    fn with_threshold(threshold: f64) -> Aggregator {
        Aggregator::new(AggregationConfig {
            threshold,
            ..Default::default()
        })
    }

    #[test]
    fn test_empty_signal_set() {
        let err = Aggregator::default().aggregate(Vec::new()).unwrap_err();
        assert_eq!(err, AggregationError::EmptySignalSet);
    }

    #[test]
    fn test_worked_example() {
        let verdict = with_threshold(0.5).aggregate(worked_example()).unwrap();
        assert!((verdict.score - 0.8 / 1.4).abs() < 1e-9);
        assert_eq!(verdict.classification, Classification::Attributed);
        assert!((verdict.confidence - 0.8 / 1.4).abs() < 1e-9);
        assert_eq!(verdict.policy, "weighted_average");
        assert_eq!(verdict.signals.len(), 2);

        let verdict = with_threshold(0.6).aggregate(worked_example()).unwrap();
        assert_eq!(verdict.classification, Classification::Inconclusive);
        assert!(verdict.confidence > 0.8);
    }

    #[test]
    fn test_unattributed_band() {
        let verdict = with_threshold(0.6)
            .aggregate(vec![
                Signal::flag("a", false, 0.9),
                Signal::flag("b", true, 0.1),
            ])
            .unwrap();
        assert_eq!(verdict.classification, Classification::Unattributed);
        assert!((verdict.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_strongest_signal_tie_takes_first() {
        let aggregator = Aggregator::new(AggregationConfig {
            policy: CombinationPolicy::StrongestSignal,
            ..Default::default()
        });
        let verdict = aggregator
            .aggregate(vec![
                Signal::flag("a", false, 0.7),
                Signal::flag("b", true, 0.7),
                Signal::score("c", 0.9, 0.2),
            ])
            .unwrap();
        assert_eq!(verdict.score, 0.0);
        assert_eq!(verdict.classification, Classification::Unattributed);
        assert_eq!(verdict.policy, "strongest_signal");
    }

    #[test]
    fn test_labels_only_is_inconclusive() {
        let verdict = Aggregator::default()
            .aggregate(vec![Signal::label("container", "PNG 1x1", 1.0)])
            .unwrap();
        assert_eq!(verdict.classification, Classification::Inconclusive);
        assert_eq!(verdict.confidence, 0.0);
        assert_eq!(verdict.score, 0.5);
    }

    #[test]
    fn test_min_evidence() {
        let aggregator = Aggregator::new(AggregationConfig {
            min_evidence: 1.0,
            ..Default::default()
        });
        let verdict = aggregator
            .aggregate(vec![Signal::flag("a", true, 0.9)])
            .unwrap();
        assert_eq!(verdict.classification, Classification::Inconclusive);
        assert_eq!(verdict.confidence, 0.0);
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!(
            "weighted-average".parse::<CombinationPolicy>(),
            Ok(CombinationPolicy::WeightedAverage)
        );
        assert_eq!(
            "Strongest_Signal".parse::<CombinationPolicy>(),
            Ok(CombinationPolicy::StrongestSignal)
        );
        assert!("majority".parse::<CombinationPolicy>().is_err());
    }
}

//! Core types for the attribution pipeline

use crate::artifact::ArtifactSummary;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Typed value carried by a signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SignalValue {
    /// Boolean observation (e.g. "generator metadata present")
    Flag(bool),
    /// Numeric score in [0,1]
    Score(f64),
    /// Category label; informational, never votes
    Label(String),
}

impl SignalValue {
    /// How strongly the value supports "attributed", or `None` for labels
    pub fn support(&self) -> Option<f64> {
        match self {
            Self::Flag(true) => Some(1.0),
            Self::Flag(false) => Some(0.0),
            Self::Score(s) => Some(*s),
            Self::Label(_) => None,
        }
    }
}

impl fmt::Display for SignalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag(b) => write!(f, "{}", b),
            Self::Score(s) => write!(f, "{:.3}", s),
            Self::Label(l) => f.write_str(l),
        }
    }
}

/// One extractor's observation about an artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub name: String,
    pub value: SignalValue,
    /// Id of the extractor that produced it
    pub extractor: String,
    /// Weight in [0,1]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Signal {
    pub fn new(name: impl Into<String>, value: SignalValue, confidence: f64) -> Self {
        let value = match value {
            SignalValue::Score(s) => SignalValue::Score(clamp_unit(s)),
            other => other,
        };
        Self {
            name: name.into(),
            value,
            extractor: String::new(),
            confidence: clamp_unit(confidence),
            detail: None,
        }
    }

    pub fn flag(name: impl Into<String>, value: bool, confidence: f64) -> Self {
        Self::new(name, SignalValue::Flag(value), confidence)
    }

    pub fn score(name: impl Into<String>, value: f64, confidence: f64) -> Self {
        Self::new(name, SignalValue::Score(value), confidence)
    }

    pub fn label(name: impl Into<String>, value: impl Into<String>, confidence: f64) -> Self {
        Self::new(name, SignalValue::Label(value.into()), confidence)
    }

    pub fn with_extractor(mut self, extractor: impl Into<String>) -> Self {
        self.extractor = extractor.into();
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Whether the signal takes part in the vote
    pub fn is_voting(&self) -> bool {
        self.value.support().is_some() && self.confidence > 0.0
    }
}

/// Clamp into [0,1]; NaN becomes 0
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// An extractor produced no signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("extractor '{extractor}' skipped: {reason}")]
pub struct ExtractionSkipped {
    pub extractor: String,
    pub reason: String,
}

impl ExtractionSkipped {
    pub fn new(extractor: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            extractor: extractor.into(),
            reason: reason.into(),
        }
    }
}

/// Final attribution outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Attributed,
    Unattributed,
    Inconclusive,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Attributed => "attributed",
            Self::Unattributed => "unattributed",
            Self::Inconclusive => "inconclusive",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregated classification with its supporting evidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionVerdict {
    pub classification: Classification,
    /// Overall confidence in [0,1]
    pub confidence: f64,
    /// Combined support for "attributed" in [0,1]
    pub score: f64,
    /// Combination policy that produced the verdict
    pub policy: String,
    pub signals: Vec<Signal>,
    #[serde(default)]
    pub skipped: Vec<ExtractionSkipped>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<ArtifactSummary>,
}

impl AttributionVerdict {
    pub fn with_subject(mut self, subject: ArtifactSummary) -> Self {
        self.subject = Some(subject);
        self
    }

    pub fn with_skipped(mut self, skipped: Vec<ExtractionSkipped>) -> Self {
        self.skipped = skipped;
        self
    }
}

/// Errors raised while aggregating signals
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregationError {
    #[error("no extractor produced a usable signal")]
    EmptySignalSet,
}

//! Verdict rendering
//!
//! Renders an [`AttributionVerdict`] as fixed-layout text for people or as
//! pretty-printed JSON for tools. Rendering is pure.

pub mod human;
pub mod structured;

use crate::analysis::AttributionVerdict;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Output format for a verdict
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    /// Fixed-layout text
    #[default]
    Human,
    /// Pretty-printed JSON
    Structured,
}

impl ReportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Structured => "structured",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportFormat {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "human" | "text" => Ok(Self::Human),
            "structured" | "json" => Ok(Self::Structured),
            other => Err(ReportError::UnknownFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("unknown report format '{0}' (expected human or structured)")]
    UnknownFormat(String),

    #[error("failed to serialize verdict: {0}")]
    Json(#[from] serde_json::Error),
}

/// Render a verdict in the given format
pub fn render(verdict: &AttributionVerdict, format: ReportFormat) -> Result<String, ReportError> {
    match format {
        ReportFormat::Human => Ok(human::render(verdict)),
        ReportFormat::Structured => structured::render(verdict),
    }
}

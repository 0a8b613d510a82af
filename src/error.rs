//! Top-level error type

use crate::analysis::AggregationError;
use crate::artifact::LoadError;
use crate::config::ConfigError;
use crate::export::ExportError;
use crate::metadata::MetadataError;
use crate::report::ReportError;
use thiserror::Error;

/// Any fatal failure of a command
#[derive(Debug, Error)]
pub enum AttributeError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl AttributeError {
    /// Pipeline stage that failed, as printed in `error: <stage>: <cause>`
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Load(_) => "load",
            Self::Aggregation(_) => "aggregate",
            Self::Report(_) => "report",
            Self::Metadata(_) => "metadata",
            Self::Export(_) => "export",
            Self::Config(_) => "config",
        }
    }

    /// Process exit code: 2 not found, 3 unreadable or unsupported, 4 no
    /// signals, 1 anything else
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Load(LoadError::NotFound(_)) => 2,
            Self::Load(LoadError::Unreadable { .. }) => 3,
            Self::Metadata(err) | Self::Export(ExportError::Metadata(err)) => match err {
                MetadataError::NotFound(_) => 2,
                MetadataError::UnsupportedFormat { .. } | MetadataError::Unreadable { .. } => 3,
                _ => 1,
            },
            Self::Aggregation(AggregationError::EmptySignalSet) => 4,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, AttributeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_exit_codes() {
        let not_found: AttributeError = LoadError::NotFound(PathBuf::from("x.png")).into();
        assert_eq!(not_found.exit_code(), 2);
        assert_eq!(not_found.stage(), "load");

        let unreadable: AttributeError = LoadError::Unreadable {
            path: PathBuf::from("x.gif"),
            reason: "unsupported".to_string(),
        }
        .into();
        assert_eq!(unreadable.exit_code(), 3);

        let empty: AttributeError = AggregationError::EmptySignalSet.into();
        assert_eq!(empty.exit_code(), 4);
        assert_eq!(empty.stage(), "aggregate");

        let config: AttributeError = ConfigError::Invalid("bad".to_string()).into();
        assert_eq!(config.exit_code(), 1);

        let metadata: AttributeError = MetadataError::NotFound(PathBuf::from("y.jpg")).into();
        assert_eq!(metadata.exit_code(), 2);
    }

    #[test]
    fn test_display_is_the_cause() {
        let err: AttributeError = AggregationError::EmptySignalSet.into();
        assert_eq!(
            format!("error: {}: {}", err.stage(), err),
            "error: aggregate: no extractor produced a usable signal"
        );
    }
}

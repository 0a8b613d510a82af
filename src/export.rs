//! Metadata export and batch import (JSON and CSV)
//!
//! JSON documents are objects keyed by image path. CSV files carry one row
//! per image with an `image_path` column, the standard fields, and one column
//! per custom field.

use crate::metadata::{self, ImageMetadata, MetadataError};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

/// Fixed leading CSV columns; custom field columns follow, sorted
pub const CSV_COLUMNS: &[&str] = &[
    "image_path",
    "prompt",
    "model",
    "date",
    "description",
    "tags",
    "copyright",
    "artist",
];

const IMAGE_PATH_COLUMN: &str = "image_path";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }

    /// Format implied by a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| e.parse().ok())
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(ExportError::UnsupportedFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("unsupported metadata file format '{0}' (expected json or csv)")]
    UnsupportedFormat(String),

    #[error("CSV file has no '{0}' column")]
    MissingColumn(&'static str),

    #[error("invalid metadata document: {0}")]
    InvalidDocument(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("cannot access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

pub type Result<T> = std::result::Result<T, ExportError>;

/// `photo.png` → `photo.metadata.json`
pub fn default_output_path(image: &Path, format: ExportFormat) -> PathBuf {
    image.with_extension(format!("metadata.{}", format.extension()))
}

/// Export the metadata of one image; returns the file written
pub fn export_metadata(image: &Path, format: ExportFormat, output: Option<&Path>) -> Result<PathBuf> {
    let record = metadata::read_metadata(image)?;
    let records = [(image.to_path_buf(), record)];
    let text = match format {
        ExportFormat::Json => render_json(&records)?,
        ExportFormat::Csv => render_csv(&records)?,
    };

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output_path(image, format));
    std::fs::write(&output, text).map_err(|source| ExportError::Io {
        path: output.clone(),
        source,
    })?;
    info!(image = %image.display(), output = %output.display(), %format, "exported metadata");
    Ok(output)
}

/// Records as a pretty JSON object keyed by image path
pub fn render_json(records: &[(PathBuf, ImageMetadata)]) -> Result<String> {
    let mut document = Map::new();
    for (path, record) in records {
        document.insert(path.display().to_string(), serde_json::to_value(record)?);
    }
    Ok(serde_json::to_string_pretty(&Value::Object(document))?)
}

/// Records as CSV: fixed columns, then the union of custom keys, sorted
pub fn render_csv(records: &[(PathBuf, ImageMetadata)]) -> Result<String> {
    let custom_keys: BTreeSet<&str> = records
        .iter()
        .flat_map(|(_, r)| r.custom_fields.keys().map(String::as_str))
        .collect();

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_COLUMNS.iter().copied().chain(custom_keys.iter().copied()))?;

    for (path, record) in records {
        let path = path.display().to_string();
        let tags = record.tags_joined();
        let mut row: Vec<&str> = vec![
            path.as_str(),
            record.prompt.as_str(),
            record.model.as_str(),
            record.date.as_deref().unwrap_or(""),
            record.description.as_deref().unwrap_or(""),
            tags.as_str(),
            record.copyright.as_deref().unwrap_or(""),
            record.artist.as_deref().unwrap_or(""),
        ];
        row.extend(
            custom_keys
                .iter()
                .map(|key| record.custom_fields.get(*key).map_or("", String::as_str)),
        );
        writer.write_record(&row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| ExportError::InvalidDocument(e.to_string()))
}

/// Apply every record of a JSON or CSV metadata file to its image.
///
/// Relative image paths resolve against the metadata file's directory.
/// Every record is validated by itself before it is merged, so a record
/// without a model is skipped even when the image already names one.
/// Records whose image is missing, or that fail validation or writing, are
/// skipped with a warning. Returns the images that were updated.
pub fn import_metadata(file: &Path) -> Result<Vec<PathBuf>> {
    let ext = file
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_string();
    let format: ExportFormat = ext.parse()?;

    let text = std::fs::read_to_string(file).map_err(|source| ExportError::Io {
        path: file.to_path_buf(),
        source,
    })?;
    let records = match format {
        ExportFormat::Json => parse_json(&text)?,
        ExportFormat::Csv => parse_csv(&text)?,
    };

    let base = file.parent().unwrap_or_else(|| Path::new(""));
    let mut updated = Vec::new();
    for (image, record) in records {
        let image = if image.is_relative() { base.join(image) } else { image };
        let record = match record {
            Ok(record) => record,
            Err(reason) => {
                warn!(image = %image.display(), %reason, "skipping invalid record");
                continue;
            }
        };
        if let Err(reason) = record.validate() {
            warn!(image = %image.display(), %reason, "skipping invalid record");
            continue;
        }
        if !image.is_file() {
            warn!(image = %image.display(), "skipping record: image not found");
            continue;
        }
        match metadata::write_metadata(&image, &record) {
            Ok(_) => updated.push(image),
            Err(e) => warn!(image = %image.display(), error = %e, "skipping record"),
        }
    }

    info!(file = %file.display(), updated = updated.len(), "imported metadata");
    Ok(updated)
}

type ParsedRecord = (PathBuf, std::result::Result<ImageMetadata, String>);

fn parse_json(text: &str) -> Result<Vec<ParsedRecord>> {
    let document: Value = serde_json::from_str(text)?;
    let object = document.as_object().ok_or_else(|| {
        ExportError::InvalidDocument("expected an object keyed by image path".to_string())
    })?;
    Ok(object
        .iter()
        .map(|(path, value)| {
            let record = ImageMetadata::from_json_value(value).map_err(|e| e.to_string());
            (PathBuf::from(path), record)
        })
        .collect())
}

fn parse_csv(text: &str) -> Result<Vec<ParsedRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader.headers()?.clone();
    let path_index = headers
        .iter()
        .position(|h| h.trim() == IMAGE_PATH_COLUMN)
        .ok_or(ExportError::MissingColumn(IMAGE_PATH_COLUMN))?;

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let path = row.get(path_index).unwrap_or("").trim();
        if path.is_empty() {
            warn!("skipping CSV row without image_path");
            continue;
        }
        let fields = headers
            .iter()
            .zip(row.iter())
            .enumerate()
            .filter(|(i, _)| *i != path_index)
            .map(|(_, (key, value))| (key.trim(), value));
        records.push((PathBuf::from(path), Ok(ImageMetadata::from_fields(fields))));
    }
    Ok(records)
}

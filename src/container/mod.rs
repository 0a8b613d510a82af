//! Image container readers
//!
//! Walks PNG chunks, JPEG segments and WebP RIFF chunks and collects the
//! metadata-bearing parts into a format-neutral [`ContainerMetadata`].
//! EXIF and XMP payloads are kept raw here; [`exif`] and [`xmp`] decode them
//! on demand so a damaged block only affects the consumers that read it.

pub mod exif;
pub mod jpeg;
pub mod png;
pub mod webp;
pub mod xmp;

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// File extensions (lowercase, without dot) the tool accepts
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// Image container formats understood by the readers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    #[serde(rename = "webp")]
    WebP,
}

impl ImageFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Detect the format from the leading magic bytes
    pub fn from_magic(data: &[u8]) -> Option<Self> {
        if data.starts_with(&png::SIGNATURE) {
            Some(Self::Png)
        } else if data.starts_with(&jpeg::SOI) {
            Some(Self::Jpeg)
        } else if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            Some(Self::WebP)
        } else {
            None
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Png => "PNG",
            Self::Jpeg => "JPEG",
            Self::WebP => "WebP",
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A key/value text record stored in the container (PNG text chunk, JPEG comment)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEntry {
    pub key: String,
    pub value: String,
}

impl TextEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Metadata-bearing parts of an image container
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerMetadata {
    /// Pixel dimensions (width, height) when the header exposes them
    pub dimensions: Option<(u32, u32)>,
    /// Text records in file order
    pub text_entries: Vec<TextEntry>,
    /// Raw TIFF block of the EXIF payload, without the `Exif\0\0` prefix
    #[serde(skip)]
    pub exif: Option<Vec<u8>>,
    /// XMP packet text
    #[serde(skip)]
    pub xmp: Option<String>,
    /// Chunk / segment names in file order
    pub chunks: Vec<String>,
    /// A C2PA manifest store is embedded
    pub c2pa_manifest: bool,
    /// Non-fatal irregularities found while walking the container
    pub warnings: Vec<String>,
}

impl ContainerMetadata {
    /// First text value stored under `key`
    pub fn text(&self, key: &str) -> Option<&str> {
        self.text_entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.value.as_str())
    }

    /// Whether any metadata source (text, EXIF or XMP) is present
    pub fn has_metadata(&self) -> bool {
        !self.text_entries.is_empty() || self.exif.is_some() || self.xmp.is_some()
    }
}

/// Errors raised while walking or rewriting a container
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContainerError {
    #[error("not a {0} file: bad signature")]
    BadSignature(&'static str),

    #[error("truncated {format} data at offset {offset}")]
    Truncated { format: &'static str, offset: usize },

    #[error("malformed {format} data: {reason}")]
    Malformed { format: &'static str, reason: String },

    #[error("invalid metadata key '{0}'")]
    InvalidKey(String),
}

/// Walk `data` as a container of the given format
pub fn parse(format: ImageFormat, data: &[u8]) -> Result<ContainerMetadata, ContainerError> {
    match format {
        ImageFormat::Png => png::parse(data),
        ImageFormat::Jpeg => jpeg::parse(data),
        ImageFormat::WebP => webp::parse(data),
    }
}

pub(crate) fn be_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

pub(crate) fn be_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

pub(crate) fn le_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

pub(crate) fn le_u24(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset.checked_add(3)?)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]))
}

pub(crate) fn le_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

pub(crate) fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|window| window == needle)
}

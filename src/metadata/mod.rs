//! Reading and writing the metadata record of an image
//!
//! PNG files keep the record in text chunks (`prompt`, `model`, ...,
//! `custom_<key>`). JPEG and WebP files keep it in an XMP packet, using
//! Dublin Core for description, tags, rights and creator and the tool
//! namespace for prompt, model, date and custom fields. JPEG writes also
//! set the EXIF ImageDescription (prompt), Artist (model), Copyright and
//! DateTimeOriginal tags for EXIF-only readers.
//!
//! Reading merges every source found in the file; a later source only fills
//! fields the earlier ones left empty:
//!
//! 1. PNG text chunks and tool-namespace XMP properties
//! 2. EXIF (ImageDescription, Artist, Copyright, DateTimeOriginal)
//! 3. Generic XMP (Dublin Core)

pub mod model;

pub use model::{split_tags, ImageMetadata, ValidationError, STANDARD_FIELDS};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use crate::artifact::{self, InputArtifact, LoadError};
use crate::container::{
    exif::{self, ExifBlock},
    jpeg, png, webp,
    xmp::{self, XmpError, XmpProperties},
    ContainerError, ContainerMetadata, ImageFormat, TextEntry, SUPPORTED_EXTENSIONS,
};
use model::{CUSTOM_FIELDS_KEY, CUSTOM_PREFIX};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

const TOOL_PROMPT: &str = "prompt";
const TOOL_MODEL: &str = "model";
const TOOL_DATE: &str = "date";

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("image file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("unsupported format {extension} (supported: {supported})")]
    UnsupportedFormat {
        extension: String,
        supported: String,
    },

    #[error("cannot read {}: {reason}", .path.display())]
    Unreadable { path: PathBuf, reason: String },

    #[error("invalid metadata: {0}")]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Xmp(#[from] XmpError),

    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<LoadError> for MetadataError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::NotFound(path) => Self::NotFound(path),
            LoadError::Unreadable { path, reason } => Self::Unreadable { path, reason },
        }
    }
}

pub type Result<T> = std::result::Result<T, MetadataError>;

/// Whether the path has an image extension the store can handle
pub fn is_supported_format(path: &Path) -> bool {
    ImageFormat::from_path(path).is_some()
}

/// Read the metadata record of an image
pub fn read_metadata(path: impl AsRef<Path>) -> Result<ImageMetadata> {
    let artifact = open(path.as_ref())?;
    Ok(from_container(&artifact.container))
}

/// Merge `update` over the record stored in the image and write the result
/// back. Returns the record as written.
pub fn write_metadata(path: impl AsRef<Path>, update: &ImageMetadata) -> Result<ImageMetadata> {
    let path = path.as_ref();
    let artifact = open(path)?;

    let existing = from_container(&artifact.container);
    let merged = update.merged_over(&existing);
    merged.validate()?;

    let bytes = match artifact.format {
        ImageFormat::Png => {
            png::rewrite_text(&artifact.bytes, &png_entries(&merged), is_managed_key)?
        }
        ImageFormat::Jpeg => {
            let tiff = exif_block(&merged, &artifact.container).encode();
            let with_exif = jpeg::set_exif(&artifact.bytes, &tiff)?;
            let packet = xmp::build_packet(&xmp_properties(&merged, &artifact.container))?;
            jpeg::set_xmp(&with_exif, &packet)?
        }
        ImageFormat::WebP => {
            let packet = xmp::build_packet(&xmp_properties(&merged, &artifact.container))?;
            webp::set_xmp(&artifact.bytes, &packet)?
        }
    };

    replace_file(path, &bytes)?;
    info!(
        path = %path.display(),
        format = %artifact.format,
        fields = merged.populated_fields().len(),
        custom = merged.custom_fields.len(),
        "wrote metadata"
    );
    Ok(merged)
}

/// Assemble the record from the metadata sources of a container
pub fn from_container(container: &ContainerMetadata) -> ImageMetadata {
    let mut meta = ImageMetadata::default();

    for entry in &container.text_entries {
        if is_managed_key(&entry.key) {
            fill_field(&mut meta, &entry.key, &entry.value);
        }
    }

    let xmp = container
        .xmp
        .as_deref()
        .and_then(|packet| match xmp::decode(packet) {
            Ok(props) => Some(props),
            Err(e) => {
                debug!("ignoring XMP packet: {}", e);
                None
            }
        });

    if let Some(props) = &xmp {
        for (name, value) in &props.tool_fields {
            match name.as_str() {
                TOOL_PROMPT | TOOL_MODEL | TOOL_DATE => fill_field(&mut meta, name, value),
                CUSTOM_FIELDS_KEY => {}
                _ => {
                    meta.custom_fields
                        .entry(name.clone())
                        .or_insert_with(|| value.clone());
                }
            }
        }
    }

    if let Some(block) = &container.exif {
        match exif::decode(block) {
            Ok(fields) => {
                // Written JPEGs mirror prompt and model into these two tags
                if let Some(description) = &fields.image_description {
                    if description.trim() != meta.prompt.trim() {
                        fill_field(&mut meta, "description", description);
                    }
                    fill_field(&mut meta, "prompt", description);
                }
                if let Some(artist) = &fields.artist {
                    if artist.trim() != meta.model.trim() {
                        fill_field(&mut meta, "artist", artist);
                    }
                    fill_field(&mut meta, "model", artist);
                }
                if let Some(copyright) = &fields.copyright {
                    fill_field(&mut meta, "copyright", copyright);
                }
                if let Some(date) = fields.iso_date() {
                    fill_field(&mut meta, "date", &date);
                }
            }
            Err(e) => debug!("ignoring EXIF block: {}", e),
        }
    }

    if let Some(props) = &xmp {
        if let Some(description) = &props.description {
            fill_field(&mut meta, "description", description);
            fill_field(&mut meta, "prompt", description);
        }
        if meta.tags.is_empty() {
            meta.tags = props.subjects.clone();
        }
        if let Some(rights) = &props.rights {
            fill_field(&mut meta, "copyright", rights);
        }
        if let Some(creator) = &props.creator {
            fill_field(&mut meta, "artist", creator);
        }
    }

    meta
}

fn open(path: &Path) -> Result<InputArtifact> {
    if !path.exists() {
        return Err(MetadataError::NotFound(path.to_path_buf()));
    }
    if !is_supported_format(path) {
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        return Err(MetadataError::UnsupportedFormat {
            extension,
            supported: SUPPORTED_EXTENSIONS.join(", "),
        });
    }
    Ok(artifact::load(path)?)
}

/// Set `key` only when the record has no value for it yet
fn fill_field(meta: &mut ImageMetadata, key: &str, value: &str) {
    let value = value.trim();
    let empty = match key {
        "prompt" => meta.prompt.trim().is_empty(),
        "model" => meta.model.trim().is_empty(),
        "date" => meta.date.is_none(),
        "description" => meta.description.is_none(),
        "tags" => meta.tags.is_empty(),
        "copyright" => meta.copyright.is_none(),
        "artist" => meta.artist.is_none(),
        _ => {
            let name = key.strip_prefix(CUSTOM_PREFIX).unwrap_or(key);
            !meta.custom_fields.contains_key(name)
        }
    };
    if empty {
        meta.set_field(key, value);
    }
}

/// Text chunk keys owned by the store
fn is_managed_key(key: &str) -> bool {
    STANDARD_FIELDS.contains(&key) || key.starts_with(CUSTOM_PREFIX)
}

fn png_entries(meta: &ImageMetadata) -> Vec<TextEntry> {
    let mut entries = Vec::new();
    let mut push = |key: &str, value: &str| {
        if !value.trim().is_empty() {
            entries.push(TextEntry::new(key, value));
        }
    };

    push("prompt", &meta.prompt);
    push("model", &meta.model);
    push("description", meta.description.as_deref().unwrap_or_default());
    push("copyright", meta.copyright.as_deref().unwrap_or_default());
    push("artist", meta.artist.as_deref().unwrap_or_default());
    push("date", meta.date.as_deref().unwrap_or_default());
    push("tags", &meta.tags_joined());
    for (key, value) in &meta.custom_fields {
        push(&format!("{}{}", CUSTOM_PREFIX, key), value);
    }
    entries
}

/// XMP properties for `meta`, keeping provenance markers already present
fn xmp_properties(meta: &ImageMetadata, container: &ContainerMetadata) -> XmpProperties {
    let existing = container
        .xmp
        .as_deref()
        .and_then(|packet| xmp::decode(packet).ok())
        .unwrap_or_default();

    let mut tool_fields = meta.custom_fields.clone();
    if !meta.prompt.trim().is_empty() {
        tool_fields.insert(TOOL_PROMPT.to_string(), meta.prompt.clone());
    }
    if !meta.model.trim().is_empty() {
        tool_fields.insert(TOOL_MODEL.to_string(), meta.model.clone());
    }
    if let Some(date) = &meta.date {
        tool_fields.insert(TOOL_DATE.to_string(), date.clone());
    }

    XmpProperties {
        description: meta.description.clone(),
        subjects: meta.tags.clone(),
        rights: meta.copyright.clone(),
        creator: meta.artist.clone(),
        creator_tool: existing.creator_tool,
        digital_source_type: existing.digital_source_type,
        tool_fields,
    }
}

/// EXIF block for a JPEG: the existing block with ImageDescription, Artist,
/// Copyright and DateTimeOriginal set from the prompt, model, copyright and
/// date of `meta`
fn exif_block(meta: &ImageMetadata, container: &ContainerMetadata) -> ExifBlock {
    let mut block = match container.exif.as_deref().map(ExifBlock::parse) {
        Some(Ok(block)) => block,
        Some(Err(e)) => {
            debug!("replacing unreadable EXIF block: {}", e);
            ExifBlock::default()
        }
        None => ExifBlock::default(),
    };

    let mut set = |tag: u16, value: &str| {
        let value = value.trim();
        if !value.is_empty() {
            block.set_ascii(tag, value);
        }
    };
    set(exif::TAG_IMAGE_DESCRIPTION, &meta.prompt);
    set(exif::TAG_ARTIST, &meta.model);
    set(exif::TAG_COPYRIGHT, meta.copyright.as_deref().unwrap_or_default());
    if let Some(date) = &meta.date {
        set(exif::TAG_DATETIME_ORIGINAL, &exif_datetime(date));
    }
    block
}

/// ISO date or date-time as EXIF `YYYY:MM:DD hh:mm:ss`
fn exif_datetime(date: &str) -> String {
    const EXIF_FORMAT: &str = "%Y:%m:%d %H:%M:%S";
    let date = date.trim();
    if let Ok(day) = NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        return day.format("%Y:%m:%d 00:00:00").to_string();
    }
    if let Ok(moment) = DateTime::parse_from_rfc3339(date) {
        return moment.naive_local().format(EXIF_FORMAT).to_string();
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(date, fmt).ok())
        .map(|moment| moment.format(EXIF_FORMAT).to_string())
        .unwrap_or_else(|| date.to_string())
}

/// Write `bytes` next to `path` and rename over it
fn replace_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let io_err = |source| MetadataError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.attribute-tmp", file_name));

    std::fs::write(&tmp, bytes).map_err(io_err)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::exif::tests::encode as encode_exif;
    use crate::container::exif::{TAG_ARTIST, TAG_DATETIME_ORIGINAL, TAG_IMAGE_DESCRIPTION};
    use crate::container::png::tests::sample_png;
    use tempfile::TempDir;

    fn text_chunk(key: &str, value: &str) -> ([u8; 4], Vec<u8>) {
        png::encode_text(key, value).unwrap()
    }

    #[test]
    fn test_png_text_beats_exif() {
        let exif = encode_exif(
            &[(TAG_IMAGE_DESCRIPTION, "from exif"), (TAG_ARTIST, "Camera Owner")],
            &[(TAG_DATETIME_ORIGINAL, "2023:12:24 18:00:00")],
        );
        let data = sample_png(&[
            text_chunk("prompt", "from text"),
            text_chunk("custom_seed", "99"),
            (*b"eXIf", exif),
        ]);
        let container = png::parse(&data).unwrap();

        let meta = from_container(&container);
        assert_eq!(meta.prompt, "from text");
        assert_eq!(meta.description.as_deref(), Some("from exif"));
        assert_eq!(meta.model, "Camera Owner");
        assert_eq!(meta.date.as_deref(), Some("2023-12-24"));
        assert_eq!(meta.custom_fields.get("seed").map(String::as_str), Some("99"));
    }

    #[test]
    fn test_write_png_replaces_managed_chunks_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("image.png");
        std::fs::write(
            &path,
            sample_png(&[
                text_chunk("prompt", "old"),
                text_chunk("parameters", "Steps: 20, Sampler: Euler"),
            ]),
        )
        .unwrap();

        let mut update = ImageMetadata::new("new prompt", "SDXL");
        update.tags = vec!["a".to_string(), "b".to_string()];
        let written = write_metadata(&path, &update).unwrap();
        assert_eq!(written.prompt, "new prompt");

        let container = png::parse(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(container.text("prompt"), Some("new prompt"));
        assert_eq!(container.text("tags"), Some("a, b"));
        assert_eq!(container.text("parameters"), Some("Steps: 20, Sampler: Euler"));
        assert_eq!(
            container.text_entries.iter().filter(|e| e.key == "prompt").count(),
            1
        );
        assert!(container.warnings.is_empty());
    }

    #[test]
    fn test_write_rejects_invalid_and_leaves_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("image.png");
        let original = sample_png(&[]);
        std::fs::write(&path, &original).unwrap();

        let update = ImageMetadata::new("prompt only", "");
        assert!(matches!(
            write_metadata(&path, &update),
            Err(MetadataError::Invalid(_))
        ));
        assert_eq!(std::fs::read(&path).unwrap(), original);
    }

    #[test]
    fn test_exif_datetime() {
        assert_eq!(exif_datetime("2024-03-15"), "2024:03:15 00:00:00");
        assert_eq!(exif_datetime("2024-03-15T10:30:00"), "2024:03:15 10:30:00");
        assert_eq!(exif_datetime("2024-03-15 10:30"), "2024:03:15 10:30:00");
        assert_eq!(exif_datetime("2024-03-15T10:30:00+02:00"), "2024:03:15 10:30:00");
    }

    #[test]
    fn test_write_jpeg_keeps_camera_exif_tags() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("photo.jpg");
        let camera = encode_exif(&[(exif::TAG_SOFTWARE, "Firmware 1.1"), (TAG_ARTIST, "Jo")], &[]);
        let mut payload = jpeg::EXIF_HEADER.to_vec();
        payload.extend_from_slice(&camera);
        std::fs::write(&path, jpeg::tests::sample_jpeg(&[(0xE1, payload)], 8, 8)).unwrap();

        write_metadata(&path, &ImageMetadata::new("a fox", "SDXL")).unwrap();

        let container = jpeg::parse(&std::fs::read(&path).unwrap()).unwrap();
        let fields = exif::decode(container.exif.as_deref().unwrap()).unwrap();
        assert_eq!(fields.software.as_deref(), Some("Firmware 1.1"));
        assert_eq!(fields.image_description.as_deref(), Some("a fox"));
        assert_eq!(fields.artist.as_deref(), Some("SDXL"));
    }

    #[test]
    fn test_read_errors() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            read_metadata(dir.path().join("nope.png")),
            Err(MetadataError::NotFound(_))
        ));

        let gif = dir.path().join("image.gif");
        std::fs::write(&gif, b"GIF89a").unwrap();
        assert!(matches!(
            read_metadata(&gif),
            Err(MetadataError::UnsupportedFormat { .. })
        ));
    }
}

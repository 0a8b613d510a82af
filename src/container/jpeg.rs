//! JPEG segment reader and EXIF/XMP segment writer
//!
//! Only the marker segments before the first SOS are walked; the entropy
//! coded image data after it is carried along untouched.

use super::{be_u16, contains_bytes, ContainerError, ContainerMetadata, TextEntry};

pub const SOI: [u8; 2] = [0xFF, 0xD8];

/// APP1 identifier for EXIF payloads
pub const EXIF_HEADER: &[u8] = b"Exif\0\0";
/// APP1 identifier for XMP payloads
pub const XMP_HEADER: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";

const FORMAT: &str = "JPEG";
const APP0: u8 = 0xE0;
const APP1: u8 = 0xE1;
const APP11: u8 = 0xEB;
const SOS: u8 = 0xDA;
const EOI: u8 = 0xD9;
const COM: u8 = 0xFE;
const MAX_SEGMENT_PAYLOAD: usize = 0xFFFF - 2;

/// A marker segment borrowed from the file buffer
#[derive(Debug, Clone, Copy)]
pub struct Segment<'a> {
    pub marker: u8,
    pub offset: usize,
    /// Segment body without marker and length
    pub payload: &'a [u8],
    /// Marker, length and payload
    pub raw: &'a [u8],
}

impl Segment<'_> {
    fn is_exif(&self) -> bool {
        self.marker == APP1 && self.payload.starts_with(EXIF_HEADER)
    }

    fn is_xmp(&self) -> bool {
        self.marker == APP1 && self.payload.starts_with(XMP_HEADER)
    }
}

/// Header segments plus the offset where the remainder of the file starts
#[derive(Debug)]
pub struct Layout<'a> {
    pub segments: Vec<Segment<'a>>,
    pub body_offset: usize,
}

/// Split the JPEG header into marker segments, up to and including SOS
pub fn segments(data: &[u8]) -> Result<Layout<'_>, ContainerError> {
    if !data.starts_with(&SOI) {
        return Err(ContainerError::BadSignature(FORMAT));
    }

    let mut segments = Vec::new();
    let mut offset = SOI.len();

    while offset < data.len() {
        if data[offset] != 0xFF {
            return Err(ContainerError::Malformed {
                format: FORMAT,
                reason: format!("expected a marker at offset {}", offset),
            });
        }
        // Fill bytes
        while data.get(offset + 1) == Some(&0xFF) {
            offset += 1;
        }
        let marker = *data.get(offset + 1).ok_or(ContainerError::Truncated {
            format: FORMAT,
            offset,
        })?;

        if is_standalone(marker) {
            segments.push(Segment {
                marker,
                offset,
                payload: &[],
                raw: &data[offset..offset + 2],
            });
            offset += 2;
            if marker == EOI {
                break;
            }
            continue;
        }

        let len = be_u16(data, offset + 2).ok_or(ContainerError::Truncated {
            format: FORMAT,
            offset,
        })? as usize;
        if len < 2 {
            return Err(ContainerError::Malformed {
                format: FORMAT,
                reason: format!("segment length {} at offset {}", len, offset),
            });
        }
        let end = offset + 2 + len;
        if end > data.len() {
            return Err(ContainerError::Truncated {
                format: FORMAT,
                offset,
            });
        }

        segments.push(Segment {
            marker,
            offset,
            payload: &data[offset + 4..end],
            raw: &data[offset..end],
        });
        offset = end;

        if marker == SOS {
            break;
        }
    }

    Ok(Layout {
        segments,
        body_offset: offset,
    })
}

/// Walk a JPEG file and collect its metadata
pub fn parse(data: &[u8]) -> Result<ContainerMetadata, ContainerError> {
    let layout = segments(data)?;
    let mut meta = ContainerMetadata::default();

    for segment in &layout.segments {
        meta.chunks.push(marker_name(segment.marker));

        match segment.marker {
            APP1 if segment.is_exif() => {
                meta.exif = Some(segment.payload[EXIF_HEADER.len()..].to_vec());
            }
            APP1 if segment.is_xmp() => {
                let packet = &segment.payload[XMP_HEADER.len()..];
                meta.xmp = Some(String::from_utf8_lossy(packet).into_owned());
            }
            APP11 if contains_bytes(segment.payload, b"jumb")
                && contains_bytes(segment.payload, b"c2pa") =>
            {
                meta.c2pa_manifest = true;
            }
            COM => {
                let text = String::from_utf8_lossy(segment.payload)
                    .trim_end_matches('\0')
                    .to_string();
                meta.text_entries.push(TextEntry::new("comment", text));
            }
            0xC0..=0xCF if !matches!(segment.marker, 0xC4 | 0xC8 | 0xCC) => {
                if let (Some(h), Some(w)) = (be_u16(segment.payload, 1), be_u16(segment.payload, 3)) {
                    meta.dimensions = Some((w as u32, h as u32));
                }
            }
            _ => {}
        }
    }

    if !layout.segments.iter().any(|s| s.marker == SOS) {
        meta.warnings.push("no SOS segment before end of file".to_string());
    }

    Ok(meta)
}

/// Replace (or insert) the EXIF APP1 segment with the given TIFF block.
///
/// A new segment goes right after APP0.
pub fn set_exif(data: &[u8], tiff: &[u8]) -> Result<Vec<u8>, ContainerError> {
    let mut payload = EXIF_HEADER.to_vec();
    payload.extend_from_slice(tiff);
    put_app1(data, &payload, "EXIF block", |s| s.is_exif(), |s| s.marker == APP0)
}

/// Replace (or insert) the XMP APP1 segment.
///
/// The new segment goes after the leading APP0/EXIF segments; every other
/// segment and the image data are copied verbatim.
pub fn set_xmp(data: &[u8], packet: &str) -> Result<Vec<u8>, ContainerError> {
    let mut payload = XMP_HEADER.to_vec();
    payload.extend_from_slice(packet.as_bytes());
    put_app1(data, &payload, "XMP packet", |s| s.is_xmp(), |s| {
        s.marker == APP0 || s.is_exif()
    })
}

/// Drop the segments `replaces` matches and write one APP1 with `payload`
/// after the leading run of segments matched by `leading`
fn put_app1(
    data: &[u8],
    payload: &[u8],
    what: &str,
    replaces: fn(&Segment<'_>) -> bool,
    leading: fn(&Segment<'_>) -> bool,
) -> Result<Vec<u8>, ContainerError> {
    let layout = segments(data)?;
    if payload.len() > MAX_SEGMENT_PAYLOAD {
        return Err(ContainerError::Malformed {
            format: FORMAT,
            reason: format!("{} of {} bytes exceeds one APP1 segment", what, payload.len()),
        });
    }

    let mut out = Vec::with_capacity(data.len() + payload.len() + 4);
    out.extend_from_slice(&SOI);

    let mut inserted = false;
    for segment in &layout.segments {
        if replaces(segment) {
            continue;
        }
        if !inserted && !leading(segment) {
            write_segment(&mut out, APP1, payload);
            inserted = true;
        }
        out.extend_from_slice(segment.raw);
    }
    if !inserted {
        write_segment(&mut out, APP1, payload);
    }

    out.extend_from_slice(&data[layout.body_offset..]);
    Ok(out)
}

/// Append a marker segment to `out`
pub fn write_segment(out: &mut Vec<u8>, marker: u8, payload: &[u8]) {
    out.push(0xFF);
    out.push(marker);
    out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(payload);
}

fn is_standalone(marker: u8) -> bool {
    matches!(marker, 0x01 | 0xD0..=0xD9)
}

fn marker_name(marker: u8) -> String {
    match marker {
        0xE0..=0xEF => format!("APP{}", marker - 0xE0),
        0xC4 => "DHT".to_string(),
        0xC0..=0xCF => format!("SOF{}", marker - 0xC0),
        0xDB => "DQT".to_string(),
        0xDD => "DRI".to_string(),
        SOS => "SOS".to_string(),
        EOI => "EOI".to_string(),
        COM => "COM".to_string(),
        _ => format!("FF{:02X}", marker),
    }
}

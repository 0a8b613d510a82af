//! Sample image builders shared by the integration tests

#![allow(dead_code)]

use attribute::container::{jpeg, png, webp};
use std::path::{Path, PathBuf};

pub const TAG_IMAGE_DESCRIPTION: u16 = 270;
pub const TAG_SOFTWARE: u16 = 305;
pub const TAG_ARTIST: u16 = 315;
pub const TAG_COPYRIGHT: u16 = 33432;

/// 1x1 PNG carrying the given text chunks before IEND
pub fn png_with_text(entries: &[(&str, &str)]) -> Vec<u8> {
    let extra: Vec<([u8; 4], Vec<u8>)> = entries
        .iter()
        .map(|(key, value)| png::encode_text(key, value).expect("valid text chunk"))
        .collect();
    png_with_chunks(&extra)
}

pub fn png_with_chunks(extra: &[([u8; 4], Vec<u8>)]) -> Vec<u8> {
    let mut out = png::SIGNATURE.to_vec();
    let mut ihdr = Vec::new();
    ihdr.extend_from_slice(&1u32.to_be_bytes());
    ihdr.extend_from_slice(&1u32.to_be_bytes());
    ihdr.extend_from_slice(&[8, 2, 0, 0, 0]);
    png::write_chunk(&mut out, b"IHDR", &ihdr);
    png::write_chunk(&mut out, b"IDAT", &[0x78, 0x9C, 0x63, 0x60, 0x60, 0x60, 0x00, 0x00, 0x00, 0x04, 0x00, 0x01]);
    for (kind, data) in extra {
        png::write_chunk(&mut out, kind, data);
    }
    png::write_chunk(&mut out, b"IEND", &[]);
    out
}

/// Baseline JPEG with the given segments after APP0
pub fn jpeg_with_segments(extra: &[(u8, Vec<u8>)], width: u16, height: u16) -> Vec<u8> {
    let mut out = jpeg::SOI.to_vec();
    jpeg::write_segment(&mut out, 0xE0, b"JFIF\0\x01\x01\0\0\x01\0\x01\0\0");
    for (marker, payload) in extra {
        jpeg::write_segment(&mut out, *marker, payload);
    }
    let mut sof = vec![8];
    sof.extend_from_slice(&height.to_be_bytes());
    sof.extend_from_slice(&width.to_be_bytes());
    sof.extend_from_slice(&[1, 1, 0x11, 0]);
    jpeg::write_segment(&mut out, 0xC0, &sof);
    jpeg::write_segment(&mut out, 0xDA, &[1, 1, 0, 0, 0x3F, 0]);
    out.extend_from_slice(&[0x2A, 0xFF, 0x00, 0x15, 0xFF, 0xD9]);
    out
}

/// JPEG whose APP1 Exif segment carries the given IFD0 ASCII tags
pub fn jpeg_with_exif(tags: &[(u16, &str)]) -> Vec<u8> {
    let mut payload = jpeg::EXIF_HEADER.to_vec();
    payload.extend_from_slice(&tiff_ascii(tags));
    jpeg_with_segments(&[(0xE1, payload)], 16, 16)
}

/// Little-endian TIFF block with one IFD of ASCII entries
pub fn tiff_ascii(tags: &[(u16, &str)]) -> Vec<u8> {
    let mut out = b"II\x2a\0".to_vec();
    out.extend_from_slice(&8u32.to_le_bytes());

    let mut heap_offset = 8 + 2 + tags.len() * 12 + 4;
    let mut heap = Vec::new();
    out.extend_from_slice(&(tags.len() as u16).to_le_bytes());
    for (tag, value) in tags {
        let mut bytes = value.as_bytes().to_vec();
        bytes.push(0);
        out.extend_from_slice(&tag.to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        if bytes.len() <= 4 {
            bytes.resize(4, 0);
            out.extend_from_slice(&bytes);
        } else {
            out.extend_from_slice(&(heap_offset as u32).to_le_bytes());
            heap_offset += bytes.len();
            heap.extend_from_slice(&bytes);
        }
    }
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&heap);
    out
}

/// Simple lossy WebP (`VP8 ` chunk only)
pub fn webp_lossy(width: u16, height: u16) -> Vec<u8> {
    let mut frame = vec![0x10, 0x02, 0x00, 0x9d, 0x01, 0x2a];
    frame.extend_from_slice(&width.to_le_bytes());
    frame.extend_from_slice(&height.to_le_bytes());
    frame.extend_from_slice(&[0; 8]);

    let mut body = Vec::new();
    webp::write_chunk(&mut body, b"VP8 ", &frame);

    let mut out = b"RIFF".to_vec();
    out.extend_from_slice(&((body.len() + 4) as u32).to_le_bytes());
    out.extend_from_slice(b"WEBP");
    out.extend_from_slice(&body);
    out
}

pub fn write_image(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("write sample image");
    path
}

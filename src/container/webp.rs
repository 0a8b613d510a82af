//! WebP RIFF chunk reader and XMP chunk writer

use super::{contains_bytes, le_u16, le_u24, le_u32, ContainerError, ContainerMetadata};

const FORMAT: &str = "WebP";
const HEADER_LEN: usize = 12;

const FLAG_XMP: u8 = 0x04;
const FLAG_EXIF: u8 = 0x08;
const FLAG_ALPHA: u8 = 0x10;

/// A RIFF chunk borrowed from the file buffer
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    pub fourcc: [u8; 4],
    pub offset: usize,
    pub data: &'a [u8],
    /// Header, data and padding byte
    pub raw: &'a [u8],
}

impl Chunk<'_> {
    pub fn name(&self) -> String {
        String::from_utf8_lossy(&self.fourcc).trim_end().to_string()
    }
}

/// Split the RIFF body into chunks
pub fn chunks(data: &[u8]) -> Result<Vec<Chunk<'_>>, ContainerError> {
    if data.len() < HEADER_LEN || &data[..4] != b"RIFF" || &data[8..12] != b"WEBP" {
        return Err(ContainerError::BadSignature(FORMAT));
    }

    let riff_end = (le_u32(data, 4).unwrap_or(0) as usize)
        .saturating_add(8)
        .min(data.len());

    let mut chunks = Vec::new();
    let mut offset = HEADER_LEN;
    while offset + 8 <= riff_end {
        let truncated = ContainerError::Truncated {
            format: FORMAT,
            offset,
        };
        let size = le_u32(data, offset + 4).ok_or(truncated.clone())? as usize;
        let data_start = offset + 8;
        let data_end = data_start.checked_add(size).ok_or(truncated.clone())?;
        if data_end > data.len() {
            return Err(truncated);
        }
        let padded_end = (data_end + (size & 1)).min(data.len());

        let mut fourcc = [0u8; 4];
        fourcc.copy_from_slice(&data[offset..offset + 4]);
        chunks.push(Chunk {
            fourcc,
            offset,
            data: &data[data_start..data_end],
            raw: &data[offset..padded_end],
        });
        offset = padded_end;
    }

    Ok(chunks)
}

/// Walk a WebP file and collect its metadata
pub fn parse(data: &[u8]) -> Result<ContainerMetadata, ContainerError> {
    let chunks = chunks(data)?;
    let mut meta = ContainerMetadata::default();

    for chunk in &chunks {
        meta.chunks.push(chunk.name());

        match &chunk.fourcc {
            b"VP8X" => {
                if let (Some(w), Some(h)) = (le_u24(chunk.data, 4), le_u24(chunk.data, 7)) {
                    meta.dimensions = Some((w + 1, h + 1));
                }
            }
            b"VP8 " if meta.dimensions.is_none() => {
                meta.dimensions = vp8_dimensions(chunk.data);
                if meta.dimensions.is_none() {
                    meta.warnings.push("VP8 frame header missing start code".to_string());
                }
            }
            b"VP8L" if meta.dimensions.is_none() => {
                meta.dimensions = vp8l_dimensions(chunk.data);
                if meta.dimensions.is_none() {
                    meta.warnings.push("VP8L header missing signature".to_string());
                }
            }
            b"EXIF" => {
                let block = chunk.data.strip_prefix(b"Exif\0\0").unwrap_or(chunk.data);
                meta.exif = Some(block.to_vec());
            }
            b"XMP " => {
                meta.xmp = Some(String::from_utf8_lossy(chunk.data).into_owned());
            }
            b"C2PA" => meta.c2pa_manifest = true,
            _ => {
                if contains_bytes(chunk.data, b"jumb") && contains_bytes(chunk.data, b"c2pa") {
                    meta.c2pa_manifest = true;
                }
            }
        }
    }

    Ok(meta)
}

fn vp8_dimensions(frame: &[u8]) -> Option<(u32, u32)> {
    if frame.get(3..6)? != &[0x9d, 0x01, 0x2a][..] {
        return None;
    }
    let w = le_u16(frame, 6)? & 0x3fff;
    let h = le_u16(frame, 8)? & 0x3fff;
    Some((w as u32, h as u32))
}

fn vp8l_dimensions(frame: &[u8]) -> Option<(u32, u32)> {
    if *frame.first()? != 0x2f {
        return None;
    }
    let bits = le_u32(frame, 1)?;
    Some(((bits & 0x3fff) + 1, ((bits >> 14) & 0x3fff) + 1))
}

fn vp8l_has_alpha(frame: &[u8]) -> bool {
    le_u32(frame, 1).map_or(false, |bits| (bits >> 28) & 1 == 1)
}

/// Replace (or append) the XMP chunk.
///
/// A simple-format file gets a VP8X header synthesised from the image
/// chunk so the XMP flag can be set. The RIFF size is rewritten.
pub fn set_xmp(data: &[u8], packet: &str) -> Result<Vec<u8>, ContainerError> {
    let chunks = chunks(data)?;

    let mut body: Vec<u8> = Vec::with_capacity(data.len() + packet.len() + 32);

    let vp8x = chunks.iter().find(|c| &c.fourcc == b"VP8X");
    match vp8x {
        Some(vp8x) => {
            if vp8x.data.len() < 10 {
                return Err(ContainerError::Malformed {
                    format: FORMAT,
                    reason: "VP8X chunk shorter than 10 bytes".to_string(),
                });
            }
        }
        None => {
            let header = synthesise_vp8x(&chunks)?;
            write_chunk(&mut body, b"VP8X", &header);
        }
    }

    for chunk in &chunks {
        match &chunk.fourcc {
            b"XMP " => continue,
            b"VP8X" => {
                let mut header = chunk.data.to_vec();
                header[0] |= FLAG_XMP;
                write_chunk(&mut body, b"VP8X", &header);
            }
            _ => body.extend_from_slice(chunk.raw),
        }
    }
    write_chunk(&mut body, b"XMP ", packet.as_bytes());

    let riff_size = u32::try_from(body.len() + 4).map_err(|_| ContainerError::Malformed {
        format: FORMAT,
        reason: "file exceeds RIFF size limit".to_string(),
    })?;

    let mut out = Vec::with_capacity(body.len() + HEADER_LEN);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&riff_size.to_le_bytes());
    out.extend_from_slice(b"WEBP");
    out.extend_from_slice(&body);
    Ok(out)
}

fn synthesise_vp8x(chunks: &[Chunk<'_>]) -> Result<[u8; 10], ContainerError> {
    let (dimensions, alpha) = chunks
        .iter()
        .find_map(|chunk| match &chunk.fourcc {
            b"VP8 " => vp8_dimensions(chunk.data).map(|d| (d, false)),
            b"VP8L" => vp8l_dimensions(chunk.data).map(|d| (d, vp8l_has_alpha(chunk.data))),
            _ => None,
        })
        .ok_or_else(|| ContainerError::Malformed {
            format: FORMAT,
            reason: "no image chunk to derive a VP8X header from".to_string(),
        })?;

    let mut flags = FLAG_XMP;
    if alpha || chunks.iter().any(|c| &c.fourcc == b"ALPH") {
        flags |= FLAG_ALPHA;
    }
    if chunks.iter().any(|c| &c.fourcc == b"EXIF") {
        flags |= FLAG_EXIF;
    }

    let (w, h) = dimensions;
    let mut header = [0u8; 10];
    header[0] = flags;
    header[4..7].copy_from_slice(&(w.saturating_sub(1)).to_le_bytes()[..3]);
    header[7..10].copy_from_slice(&(h.saturating_sub(1)).to_le_bytes()[..3]);
    Ok(header)
}

/// Append a RIFF chunk (with padding byte for odd sizes) to `out`
pub fn write_chunk(out: &mut Vec<u8>, fourcc: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(fourcc);
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(data);
    if data.len() % 2 == 1 {
        out.push(0);
    }
}

//! PNG chunk reader and text-chunk writer
//!
//! Text metadata lives in `tEXt` (Latin-1) and `iTXt` (UTF-8) chunks. XMP is
//! an `iTXt` chunk with the keyword `XML:com.adobe.xmp`, EXIF an `eXIf`
//! chunk, and a C2PA manifest store a `caBX` chunk. Compressed text chunks
//! are reported as warnings and left undecoded.

use super::{be_u32, ContainerError, ContainerMetadata, TextEntry};

pub const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// `iTXt` keyword carrying an XMP packet
pub const XMP_KEYWORD: &str = "XML:com.adobe.xmp";

const FORMAT: &str = "PNG";
const MAX_KEYWORD_LEN: usize = 79;

/// A chunk borrowed from the file buffer
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    pub kind: [u8; 4],
    pub data: &'a [u8],
    pub crc: u32,
    /// Offset of the length field
    pub offset: usize,
    /// Whole chunk including length, type and CRC
    pub raw: &'a [u8],
}

impl Chunk<'_> {
    pub fn kind_str(&self) -> String {
        String::from_utf8_lossy(&self.kind).into_owned()
    }

    pub fn crc_matches(&self) -> bool {
        chunk_crc(&self.kind, self.data) == self.crc
    }

    fn is_text(&self) -> bool {
        matches!(&self.kind, b"tEXt" | b"iTXt" | b"zTXt")
    }
}

/// Split a PNG file into chunks, stopping after `IEND`
pub fn chunks(data: &[u8]) -> Result<Vec<Chunk<'_>>, ContainerError> {
    if !data.starts_with(&SIGNATURE) {
        return Err(ContainerError::BadSignature(FORMAT));
    }

    let mut chunks = Vec::new();
    let mut offset = SIGNATURE.len();

    while offset < data.len() {
        let truncated = ContainerError::Truncated {
            format: FORMAT,
            offset,
        };
        let len = be_u32(data, offset).ok_or_else(|| truncated.clone())? as usize;
        let kind_bytes = data
            .get(offset + 4..offset + 8)
            .ok_or_else(|| truncated.clone())?;
        let kind = [kind_bytes[0], kind_bytes[1], kind_bytes[2], kind_bytes[3]];

        let data_start = offset + 8;
        let data_end = data_start
            .checked_add(len)
            .ok_or_else(|| truncated.clone())?;
        let crc = be_u32(data, data_end).ok_or(truncated)?;
        let end = data_end + 4;

        chunks.push(Chunk {
            kind,
            data: &data[data_start..data_end],
            crc,
            offset,
            raw: &data[offset..end],
        });
        offset = end;

        if &kind == b"IEND" {
            break;
        }
    }

    Ok(chunks)
}

/// Walk a PNG file and collect its metadata
pub fn parse(data: &[u8]) -> Result<ContainerMetadata, ContainerError> {
    let mut meta = ContainerMetadata::default();
    let chunks = chunks(data)?;

    for chunk in &chunks {
        let kind = chunk.kind_str();
        if !chunk.crc_matches() {
            meta.warnings
                .push(format!("{} chunk at offset {} has a bad CRC", kind, chunk.offset));
        }

        match &chunk.kind {
            b"IHDR" => {
                if let (Some(w), Some(h)) = (be_u32(chunk.data, 0), be_u32(chunk.data, 4)) {
                    meta.dimensions = Some((w, h));
                }
            }
            b"tEXt" => match decode_text(chunk.data) {
                Some(entry) => meta.text_entries.push(entry),
                None => meta
                    .warnings
                    .push(format!("tEXt chunk at offset {} has no keyword", chunk.offset)),
            },
            b"iTXt" => match decode_itxt(chunk.data) {
                Ok(entry) if entry.key == XMP_KEYWORD => meta.xmp = Some(entry.value),
                Ok(entry) => meta.text_entries.push(entry),
                Err(reason) => meta.warnings.push(reason),
            },
            b"zTXt" => {
                let keyword = keyword_of(chunk.data).unwrap_or_default();
                meta.warnings
                    .push(format!("compressed text chunk '{}' not decoded", keyword));
            }
            b"eXIf" => meta.exif = Some(chunk.data.to_vec()),
            b"caBX" => meta.c2pa_manifest = true,
            _ => {}
        }

        meta.chunks.push(kind);
    }

    if chunks.last().map(|c| &c.kind) != Some(b"IEND") {
        meta.warnings.push("missing IEND chunk".to_string());
    }

    Ok(meta)
}

/// Rewrite the text chunks of a PNG file.
///
/// Text chunks whose keyword satisfies `replace` are dropped and `entries`
/// are written just before `IEND`. Every other chunk is copied verbatim.
pub fn rewrite_text(
    data: &[u8],
    entries: &[TextEntry],
    replace: impl Fn(&str) -> bool,
) -> Result<Vec<u8>, ContainerError> {
    let chunks = chunks(data)?;

    let mut encoded = Vec::with_capacity(entries.len());
    for entry in entries {
        encoded.push(encode_text(&entry.key, &entry.value)?);
    }

    let mut out = Vec::with_capacity(data.len() + encoded.iter().map(|(_, d)| d.len() + 12).sum::<usize>());
    out.extend_from_slice(&SIGNATURE);

    let mut written = false;
    for chunk in &chunks {
        if &chunk.kind == b"IEND" {
            for (kind, body) in &encoded {
                write_chunk(&mut out, kind, body);
            }
            written = true;
        }
        if chunk.is_text() {
            if let Some(keyword) = keyword_of(chunk.data) {
                if replace(&keyword) {
                    continue;
                }
            }
        }
        out.extend_from_slice(chunk.raw);
    }

    if !written {
        for (kind, body) in &encoded {
            write_chunk(&mut out, kind, body);
        }
        write_chunk(&mut out, b"IEND", &[]);
    }

    Ok(out)
}

/// Append one chunk (length, type, data, CRC) to `out`
pub fn write_chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(data);
    out.extend_from_slice(&chunk_crc(kind, data).to_be_bytes());
}

/// Encode a text record as `tEXt` when it is plain ASCII, `iTXt` otherwise
pub fn encode_text(key: &str, value: &str) -> Result<([u8; 4], Vec<u8>), ContainerError> {
    if key.is_empty() || key.len() > MAX_KEYWORD_LEN || !key.is_ascii() || key.contains('\0') {
        return Err(ContainerError::InvalidKey(key.to_string()));
    }

    let mut body = Vec::with_capacity(key.len() + value.len() + 5);
    body.extend_from_slice(key.as_bytes());
    body.push(0);

    if value.is_ascii() && !value.contains('\0') {
        body.extend_from_slice(value.as_bytes());
        Ok((*b"tEXt", body))
    } else {
        // compression flag, compression method, empty language tag, empty translated keyword
        body.extend_from_slice(&[0, 0, 0, 0]);
        body.extend_from_slice(value.as_bytes());
        Ok((*b"iTXt", body))
    }
}

fn chunk_crc(kind: &[u8; 4], data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(kind);
    hasher.update(data);
    hasher.finalize()
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

fn keyword_of(data: &[u8]) -> Option<String> {
    let nul = data.iter().position(|&b| b == 0)?;
    Some(latin1(&data[..nul]))
}

fn decode_text(data: &[u8]) -> Option<TextEntry> {
    let nul = data.iter().position(|&b| b == 0)?;
    if nul == 0 {
        return None;
    }
    Some(TextEntry::new(latin1(&data[..nul]), latin1(&data[nul + 1..])))
}

fn decode_itxt(data: &[u8]) -> Result<TextEntry, String> {
    let nul = data
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| "iTXt chunk without keyword terminator".to_string())?;
    let keyword = latin1(&data[..nul]);

    let rest = &data[nul + 1..];
    if rest.len() < 2 {
        return Err(format!("iTXt chunk '{}' is truncated", keyword));
    }
    if rest[0] != 0 {
        return Err(format!("compressed iTXt chunk '{}' not decoded", keyword));
    }

    let rest = &rest[2..];
    let lang_end = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| format!("iTXt chunk '{}' has no language tag", keyword))?;
    let rest = &rest[lang_end + 1..];
    let translated_end = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| format!("iTXt chunk '{}' has no translated keyword", keyword))?;

    let text = String::from_utf8(rest[translated_end + 1..].to_vec())
        .map_err(|_| format!("iTXt chunk '{}' is not valid UTF-8", keyword))?;

    Ok(TextEntry::new(keyword, text))
}

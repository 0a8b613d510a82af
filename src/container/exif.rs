//! Minimal EXIF (TIFF IFD) reader and writer
//!
//! [`ExifBlock`] holds the entries of IFD0 and the Exif sub-IFD with their
//! raw value bytes. Reading picks out the handful of ASCII/UNDEFINED tags
//! that carry attribution data; writing replaces those tags and lays the
//! remaining entries out again unchanged. Entries whose values point at
//! other structures (GPS and interoperability IFDs, strip offsets) and the
//! IFD1 thumbnail cannot be relocated and are dropped on rewrite.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const TAG_IMAGE_DESCRIPTION: u16 = 270;
pub const TAG_SOFTWARE: u16 = 305;
pub const TAG_ARTIST: u16 = 315;
pub const TAG_COPYRIGHT: u16 = 33432;
pub const TAG_EXIF_IFD: u16 = 34665;
pub const TAG_DATETIME_ORIGINAL: u16 = 36867;
pub const TAG_USER_COMMENT: u16 = 37510;

const TAG_STRIP_OFFSETS: u16 = 273;
const TAG_TILE_OFFSETS: u16 = 324;
const TAG_GPS_IFD: u16 = 34853;
const TAG_INTEROP_IFD: u16 = 40965;

const TYPE_BYTE: u16 = 1;
const TYPE_ASCII: u16 = 2;
const TYPE_LONG: u16 = 4;
const TYPE_UNDEFINED: u16 = 7;

const MAX_ENTRIES: u16 = 512;

/// Attribution-related EXIF fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExifFields {
    pub image_description: Option<String>,
    pub software: Option<String>,
    pub artist: Option<String>,
    pub copyright: Option<String>,
    pub datetime_original: Option<String>,
    pub user_comment: Option<String>,
}

impl ExifFields {
    /// `DateTimeOriginal` converted from `YYYY:MM:DD hh:mm:ss` to `YYYY-MM-DD`
    pub fn iso_date(&self) -> Option<String> {
        let raw = self.datetime_original.as_deref()?.trim();
        let date = raw.split_whitespace().next()?;
        if date.contains(':') {
            Some(date.replace(':', "-"))
        } else {
            Some(date.to_string())
        }
    }

    /// Non-empty text values, for generator-name scans
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        [
            &self.image_description,
            &self.software,
            &self.artist,
            &self.copyright,
            &self.user_comment,
        ]
        .into_iter()
        .filter_map(|v| v.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.texts().next().is_none() && self.datetime_original.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExifError {
    #[error("EXIF block too short")]
    TooShort,

    #[error("unknown TIFF byte order")]
    ByteOrder,

    #[error("EXIF offset {0} out of bounds")]
    OutOfBounds(usize),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum ByteOrder {
    Little,
    #[default]
    Big,
}

impl ByteOrder {
    fn u16_bytes(self, value: u16) -> [u8; 2] {
        match self {
            Self::Little => value.to_le_bytes(),
            Self::Big => value.to_be_bytes(),
        }
    }

    fn u32_bytes(self, value: u32) -> [u8; 4] {
        match self {
            Self::Little => value.to_le_bytes(),
            Self::Big => value.to_be_bytes(),
        }
    }
}

/// Size in bytes of one value of a TIFF field type
fn type_size(kind: u16) -> Option<usize> {
    match kind {
        1 | 2 | 6 | 7 => Some(1),
        3 | 8 => Some(2),
        4 | 9 | 11 => Some(4),
        5 | 10 | 12 => Some(8),
        _ => None,
    }
}

struct Reader<'a> {
    data: &'a [u8],
    order: ByteOrder,
}

impl<'a> Reader<'a> {
    fn u16(&self, offset: usize) -> Result<u16, ExifError> {
        let bytes = self.slice(offset, 2)?;
        Ok(match self.order {
            ByteOrder::Little => u16::from_le_bytes([bytes[0], bytes[1]]),
            ByteOrder::Big => u16::from_be_bytes([bytes[0], bytes[1]]),
        })
    }

    fn u32(&self, offset: usize) -> Result<u32, ExifError> {
        let bytes = self.slice(offset, 4)?;
        let arr = [bytes[0], bytes[1], bytes[2], bytes[3]];
        Ok(match self.order {
            ByteOrder::Little => u32::from_le_bytes(arr),
            ByteOrder::Big => u32::from_be_bytes(arr),
        })
    }

    fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8], ExifError> {
        offset
            .checked_add(len)
            .and_then(|end| self.data.get(offset..end))
            .ok_or(ExifError::OutOfBounds(offset))
    }
}

/// One IFD entry; `value` holds the `count` values in the block's byte order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub tag: u16,
    pub kind: u16,
    pub count: u32,
    pub value: Vec<u8>,
}

impl Entry {
    /// The value as text, for BYTE/ASCII/UNDEFINED entries
    fn text(&self) -> Option<String> {
        if !matches!(self.kind, TYPE_BYTE | TYPE_ASCII | TYPE_UNDEFINED) {
            return None;
        }
        let bytes = if self.tag == TAG_USER_COMMENT && self.value.len() >= 8 {
            // 8-byte character code prefix ("ASCII\0\0\0", "UNICODE\0", ...)
            &self.value[8..]
        } else {
            &self.value[..]
        };
        let text = String::from_utf8_lossy(bytes)
            .trim_end_matches('\0')
            .trim()
            .to_string();
        (!text.is_empty()).then_some(text)
    }
}

/// IFD0 and Exif sub-IFD of a TIFF-structured EXIF block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExifBlock {
    order: ByteOrder,
    ifd0: Vec<Entry>,
    exif: Vec<Entry>,
}

impl ExifBlock {
    /// Parse a TIFF block (without the `Exif\0\0` prefix)
    pub fn parse(block: &[u8]) -> Result<Self, ExifError> {
        if block.len() < 8 {
            return Err(ExifError::TooShort);
        }
        let order = match &block[..2] {
            b"II" => ByteOrder::Little,
            b"MM" => ByteOrder::Big,
            _ => return Err(ExifError::ByteOrder),
        };
        let reader = Reader { data: block, order };
        if reader.u16(2)? != 42 {
            return Err(ExifError::ByteOrder);
        }

        let ifd0_offset = reader.u32(4)? as usize;
        let (ifd0, exif_offset) = read_ifd(&reader, ifd0_offset)?;

        // Sub-IFD is followed once; a pointer back to IFD0 is not revisited
        let exif = match exif_offset.filter(|&o| o != ifd0_offset) {
            Some(offset) => read_ifd(&reader, offset)?.0,
            None => Vec::new(),
        };

        Ok(Self { order, ifd0, exif })
    }

    pub fn entry(&self, tag: u16) -> Option<&Entry> {
        self.ifd0.iter().chain(&self.exif).find(|e| e.tag == tag)
    }

    fn text(&self, tag: u16) -> Option<String> {
        self.entry(tag).and_then(Entry::text)
    }

    /// The attribution fields of the block
    pub fn fields(&self) -> ExifFields {
        ExifFields {
            image_description: self.text(TAG_IMAGE_DESCRIPTION),
            software: self.text(TAG_SOFTWARE),
            artist: self.text(TAG_ARTIST),
            copyright: self.text(TAG_COPYRIGHT),
            datetime_original: self.text(TAG_DATETIME_ORIGINAL),
            user_comment: self.text(TAG_USER_COMMENT),
        }
    }

    /// Set a NUL-terminated ASCII tag, replacing any previous value.
    /// Capture-time tags go to the Exif sub-IFD, the rest to IFD0.
    pub fn set_ascii(&mut self, tag: u16, value: &str) {
        self.remove(tag);
        let mut bytes = value.as_bytes().to_vec();
        bytes.push(0);
        let entry = Entry {
            tag,
            kind: TYPE_ASCII,
            count: bytes.len() as u32,
            value: bytes,
        };
        if matches!(tag, TAG_DATETIME_ORIGINAL | TAG_USER_COMMENT) {
            self.exif.push(entry);
        } else {
            self.ifd0.push(entry);
        }
    }

    pub fn remove(&mut self, tag: u16) {
        self.ifd0.retain(|e| e.tag != tag);
        self.exif.retain(|e| e.tag != tag);
    }

    /// Serialize as a TIFF block: header, IFD0, Exif IFD, then value data
    pub fn encode(&self) -> Vec<u8> {
        fn ifd_len(entries: usize) -> usize {
            2 + entries * 12 + 4
        }

        let has_exif = !self.exif.is_empty();
        let ifd0_offset = 8;
        let exif_offset = ifd0_offset + ifd_len(self.ifd0.len() + usize::from(has_exif));
        let heap_start = exif_offset + if has_exif { ifd_len(self.exif.len()) } else { 0 };

        let mut ifd0 = self.ifd0.clone();
        if has_exif {
            ifd0.push(Entry {
                tag: TAG_EXIF_IFD,
                kind: TYPE_LONG,
                count: 1,
                value: self.order.u32_bytes(exif_offset as u32).to_vec(),
            });
        }

        let mut out = match self.order {
            ByteOrder::Little => b"II".to_vec(),
            ByteOrder::Big => b"MM".to_vec(),
        };
        out.extend_from_slice(&self.order.u16_bytes(42));
        out.extend_from_slice(&self.order.u32_bytes(ifd0_offset as u32));

        let mut heap = Vec::new();
        self.write_ifd(&mut out, &mut heap, heap_start, ifd0);
        if has_exif {
            self.write_ifd(&mut out, &mut heap, heap_start, self.exif.clone());
        }
        out.extend_from_slice(&heap);
        out
    }

    fn write_ifd(&self, out: &mut Vec<u8>, heap: &mut Vec<u8>, heap_start: usize, mut entries: Vec<Entry>) {
        entries.sort_by_key(|e| e.tag);
        out.extend_from_slice(&self.order.u16_bytes(entries.len() as u16));
        for entry in &entries {
            out.extend_from_slice(&self.order.u16_bytes(entry.tag));
            out.extend_from_slice(&self.order.u16_bytes(entry.kind));
            out.extend_from_slice(&self.order.u32_bytes(entry.count));
            if entry.value.len() <= 4 {
                let mut inline = entry.value.clone();
                inline.resize(4, 0);
                out.extend_from_slice(&inline);
            } else {
                let offset = heap_start + heap.len();
                out.extend_from_slice(&self.order.u32_bytes(offset as u32));
                heap.extend_from_slice(&entry.value);
                // Values start on a word boundary
                if heap.len() % 2 == 1 {
                    heap.push(0);
                }
            }
        }
        out.extend_from_slice(&self.order.u32_bytes(0));
    }
}

/// Decode the attribution fields of a TIFF-structured EXIF block
pub fn decode(block: &[u8]) -> Result<ExifFields, ExifError> {
    ExifBlock::parse(block).map(|block| block.fields())
}

/// Read one IFD, returning its entries and the Exif sub-IFD offset if present
fn read_ifd(reader: &Reader<'_>, offset: usize) -> Result<(Vec<Entry>, Option<usize>), ExifError> {
    let count = reader.u16(offset)?;
    if count > MAX_ENTRIES {
        return Err(ExifError::OutOfBounds(offset));
    }

    let mut entries = Vec::with_capacity(count as usize);
    let mut exif_ifd = None;
    for i in 0..count as usize {
        let at = offset + 2 + i * 12;
        let tag = reader.u16(at)?;
        let kind = reader.u16(at + 2)?;
        let n = reader.u32(at + 4)?;

        if tag == TAG_EXIF_IFD && kind == TYPE_LONG {
            exif_ifd = Some(reader.u32(at + 8)? as usize);
            continue;
        }
        if matches!(
            tag,
            TAG_STRIP_OFFSETS | TAG_TILE_OFFSETS | TAG_GPS_IFD | TAG_INTEROP_IFD
        ) {
            continue;
        }
        let Some(size) = type_size(kind) else {
            continue;
        };

        let len = (n as usize)
            .checked_mul(size)
            .ok_or(ExifError::OutOfBounds(at))?;
        let value = if len <= 4 {
            reader.slice(at + 8, len)?
        } else {
            reader.slice(reader.u32(at + 8)? as usize, len)?
        };
        entries.push(Entry {
            tag,
            kind,
            count: n,
            value: value.to_vec(),
        });
    }

    Ok((entries, exif_ifd))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Big-endian TIFF block with ASCII tags; capture-time tags land in the
    /// Exif IFD
    pub(crate) fn encode(ifd0: &[(u16, &str)], exif: &[(u16, &str)]) -> Vec<u8> {
        let mut block = ExifBlock::default();
        for (tag, value) in ifd0.iter().chain(exif) {
            block.set_ascii(*tag, value);
        }
        block.encode()
    }

    #[test]
    fn test_decode_ifd0_and_exif_ifd() {
        let block = encode(
            &[
                (TAG_IMAGE_DESCRIPTION, "a lighthouse at dusk"),
                (TAG_ARTIST, "Jane"),
                (TAG_SOFTWARE, "Stable Diffusion"),
            ],
            &[(TAG_DATETIME_ORIGINAL, "2024:03:15 10:30:00")],
        );
        let fields = decode(&block).unwrap();
        assert_eq!(fields.image_description.as_deref(), Some("a lighthouse at dusk"));
        assert_eq!(fields.artist.as_deref(), Some("Jane"));
        assert_eq!(fields.software.as_deref(), Some("Stable Diffusion"));
        assert_eq!(fields.iso_date().as_deref(), Some("2024-03-15"));
        assert!(!fields.is_empty());
    }

    #[test]
    fn test_decode_little_endian_inline_value() {
        // II, 42, IFD at 8, one entry: Artist "Ann\0" inline
        let mut block = b"II\x2a\0\x08\0\0\0".to_vec();
        block.extend_from_slice(&1u16.to_le_bytes());
        block.extend_from_slice(&TAG_ARTIST.to_le_bytes());
        block.extend_from_slice(&TYPE_ASCII.to_le_bytes());
        block.extend_from_slice(&4u32.to_le_bytes());
        block.extend_from_slice(b"Ann\0");
        block.extend_from_slice(&0u32.to_le_bytes());

        let fields = decode(&block).unwrap();
        assert_eq!(fields.artist.as_deref(), Some("Ann"));
    }

    #[test]
    fn test_rewrite_keeps_other_entries_and_byte_order() {
        // II, one SHORT Orientation entry (value 6) and a Software string
        let mut block = b"II\x2a\0\x08\0\0\0".to_vec();
        block.extend_from_slice(&2u16.to_le_bytes());
        block.extend_from_slice(&274u16.to_le_bytes());
        block.extend_from_slice(&3u16.to_le_bytes());
        block.extend_from_slice(&1u32.to_le_bytes());
        block.extend_from_slice(&[6, 0, 0, 0]);
        block.extend_from_slice(&TAG_SOFTWARE.to_le_bytes());
        block.extend_from_slice(&TYPE_ASCII.to_le_bytes());
        block.extend_from_slice(&4u32.to_le_bytes());
        block.extend_from_slice(b"v2\0\0");
        block.extend_from_slice(&0u32.to_le_bytes());

        let mut parsed = ExifBlock::parse(&block).unwrap();
        parsed.set_ascii(TAG_ARTIST, "SDXL 1.0");
        parsed.set_ascii(TAG_DATETIME_ORIGINAL, "2024:05:01 00:00:00");
        let encoded = parsed.encode();
        assert!(encoded.starts_with(b"II"));

        let reread = ExifBlock::parse(&encoded).unwrap();
        assert_eq!(reread, parsed);
        assert_eq!(reread.entry(274).map(|e| e.value.clone()), Some(vec![6, 0]));
        let fields = reread.fields();
        assert_eq!(fields.software.as_deref(), Some("v2"));
        assert_eq!(fields.artist.as_deref(), Some("SDXL 1.0"));
        assert_eq!(fields.iso_date().as_deref(), Some("2024-05-01"));
    }

    #[test]
    fn test_set_ascii_replaces() {
        let mut block = ExifBlock::default();
        block.set_ascii(TAG_COPYRIGHT, "old");
        block.set_ascii(TAG_COPYRIGHT, "new");
        let fields = decode(&block.encode()).unwrap();
        assert_eq!(fields.copyright.as_deref(), Some("new"));
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(decode(b"MM\0"), Err(ExifError::TooShort));
        assert_eq!(decode(b"XX\0\x2a\0\0\0\x08"), Err(ExifError::ByteOrder));
        assert_eq!(decode(b"MM\0\x2a\0\0\xff\xff"), Err(ExifError::OutOfBounds(0xffff)));
    }

    #[test]
    fn test_iso_date_passthrough() {
        let fields = ExifFields {
            datetime_original: Some("2024-01-02".to_string()),
            ..Default::default()
        };
        assert_eq!(fields.iso_date().as_deref(), Some("2024-01-02"));
    }
}

//! File attachment frame.
//!
//! # Wire Format
//!
//! ```text
//! +-------------+----------+----------+---------+-----------+--------+
//! | data_offset | name\0   | type\0   | size    | sha256    | data   |
//! | i32 BE      | UTF-8    | UTF-8    | i32 BE  | 32 bytes  | size B |
//! +-------------+----------+----------+---------+-----------+--------+
//! ```
//!
//! `data_offset` is measured from the start of the frame and always equals
//! `4 + header_length`, so a reader can find the payload boundary with one
//! fixed-size read before touching the variable-length fields.
//!
//! The digest detects corruption in transit or storage. It does not
//! authenticate the sender; signing happens above this layer on the whole
//! encoded frame.

use bytes::{BufMut, Bytes, BytesMut};
use sha2::{Digest, Sha256};
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
    byteorder::{BigEndian, I32},
};

use crate::errors::{DecodingError, EncodingError};

/// Size of the SHA-256 digest in bytes.
pub const HASH_SIZE: usize = 32;

/// Size of the leading `data_offset` field.
const PREFIX_SIZE: usize = std::mem::size_of::<FramePrefix>();

/// Size of the fixed `size` + `hash` block closing the header.
const TRAILER_SIZE: usize = std::mem::size_of::<HeaderTrailer>();

/// Smallest valid data offset: prefix, two empty NUL-terminated strings, and
/// the size/hash block.
pub const MIN_DATA_OFFSET: usize = PREFIX_SIZE + 2 + TRAILER_SIZE;

/// Largest length representable by the signed 32-bit size fields.
const MAX_FIELD_LEN: usize = i32::MAX as usize;

/// Leading fixed-size field of the frame.
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct FramePrefix {
    data_offset: I32<BigEndian>,
}

/// Fixed-size block following the two NUL-terminated strings.
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct HeaderTrailer {
    size: I32<BigEndian>,
    hash: [u8; HASH_SIZE],
}

/// A named, typed file carried as message content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name. Must not contain NUL.
    pub name: String,
    /// MIME-like type string. Must not contain NUL.
    pub mime_type: String,
    /// Raw file contents.
    pub data: Bytes,
}

impl Attachment {
    /// Create a new attachment.
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self { name: name.into(), mime_type: mime_type.into(), data: data.into() }
    }

    /// Length of the encoded frame in bytes.
    pub fn encoded_len(&self) -> usize {
        self.data_offset() + self.data.len()
    }

    fn data_offset(&self) -> usize {
        PREFIX_SIZE + self.name.len() + 1 + self.mime_type.len() + 1 + TRAILER_SIZE
    }

    /// Encode into the attachment frame.
    ///
    /// # Errors
    ///
    /// - `EmbeddedNul` if `name` or `mime_type` contain a NUL byte, which would
    ///   silently truncate the field on the receiving side
    /// - `TooLarge` if the header or data exceed `i32::MAX` bytes
    pub fn encode(&self) -> Result<Bytes, EncodingError> {
        check_nul("name", &self.name)?;
        check_nul("mime_type", &self.mime_type)?;

        let data_offset = self.data_offset();
        let data_offset = i32::try_from(data_offset).map_err(|_| EncodingError::TooLarge {
            what: "header",
            len: data_offset,
            max: MAX_FIELD_LEN,
        })?;
        let size = i32::try_from(self.data.len()).map_err(|_| EncodingError::TooLarge {
            what: "data",
            len: self.data.len(),
            max: MAX_FIELD_LEN,
        })?;

        let prefix = FramePrefix { data_offset: I32::new(data_offset) };
        let trailer =
            HeaderTrailer { size: I32::new(size), hash: Sha256::digest(&self.data).into() };

        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_slice(prefix.as_bytes());
        buf.put_slice(self.name.as_bytes());
        buf.put_u8(0);
        buf.put_slice(self.mime_type.as_bytes());
        buf.put_u8(0);
        buf.put_slice(trailer.as_bytes());
        buf.put_slice(&self.data);

        Ok(buf.freeze())
    }

    /// Parse and verify an attachment frame.
    ///
    /// The returned `data` is a zero-copy slice of `frame`.
    ///
    /// # Errors
    ///
    /// - `Truncated` if the frame ends before its declared offsets
    /// - `InvalidOffset` if `data_offset` is negative, too small for a header,
    ///   or leaves unaccounted bytes after the digest
    /// - `InvalidUtf8` if `name` or `mime_type` is not UTF-8
    /// - `SizeMismatch` if the declared size differs from the trailing length
    /// - `HashMismatch` if the SHA-256 digest does not match
    pub fn parse(frame: &Bytes) -> Result<Self, DecodingError> {
        let (prefix, _) = FramePrefix::read_from_prefix(frame).map_err(|_| {
            DecodingError::Truncated { needed: PREFIX_SIZE, available: frame.len() }
        })?;

        let raw_offset = prefix.data_offset.get();
        let data_offset = usize::try_from(raw_offset)
            .ok()
            .filter(|offset| *offset >= MIN_DATA_OFFSET)
            .ok_or(DecodingError::InvalidOffset { offset: raw_offset })?;

        if frame.len() < data_offset {
            return Err(DecodingError::Truncated { needed: data_offset, available: frame.len() });
        }

        let header = &frame[PREFIX_SIZE..data_offset];
        let (name, rest) = split_nul_terminated(header, data_offset)?;
        let (mime_type, rest) = split_nul_terminated(rest, data_offset)?;

        if rest.len() < TRAILER_SIZE {
            return Err(DecodingError::Truncated {
                needed: data_offset + TRAILER_SIZE - rest.len(),
                available: data_offset,
            });
        }
        let trailer = HeaderTrailer::read_from_bytes(rest)
            .map_err(|_| DecodingError::InvalidOffset { offset: raw_offset })?;

        let data = frame.slice(data_offset..);

        let declared = trailer.size.get();
        if usize::try_from(declared).ok() != Some(data.len()) {
            return Err(DecodingError::SizeMismatch { declared, actual: data.len() });
        }

        let digest: [u8; HASH_SIZE] = Sha256::digest(&data).into();
        if digest != trailer.hash {
            return Err(DecodingError::HashMismatch);
        }

        Ok(Self { name: name.to_string(), mime_type: mime_type.to_string(), data })
    }
}

fn check_nul(field: &'static str, value: &str) -> Result<(), EncodingError> {
    match value.bytes().position(|b| b == 0) {
        Some(position) => Err(EncodingError::EmbeddedNul { field, position }),
        None => Ok(()),
    }
}

/// Split a NUL-terminated UTF-8 string off the front of `header`.
fn split_nul_terminated(header: &[u8], data_offset: usize) -> Result<(&str, &[u8]), DecodingError> {
    let nul = header
        .iter()
        .position(|&b| b == 0)
        .ok_or(DecodingError::Truncated { needed: data_offset + 1, available: data_offset })?;

    let field = std::str::from_utf8(&header[..nul])?;
    Ok((field, &header[nul + 1..]))
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    fn sample() -> Attachment {
        Attachment::new("a.txt", "text/plain", Bytes::from_static(b"hello"))
    }

    #[test]
    fn encode_matches_reference_layout() {
        let frame = sample().encode().expect("encode");

        // 4 + "a.txt\0" + "text/plain\0" + 4 + 32 = 57
        assert_eq!(&frame[..4], &hex!("00000039"));
        assert_eq!(&frame[4..10], b"a.txt\0");
        assert_eq!(&frame[10..21], b"text/plain\0");
        assert_eq!(&frame[21..25], &hex!("00000005"));
        assert_eq!(
            &frame[25..57],
            &hex!("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824")
        );
        assert_eq!(&frame[57..], b"hello");
    }

    #[test]
    fn encoded_len_matches_frame() {
        let attachment = sample();
        assert_eq!(attachment.encode().expect("encode").len(), attachment.encoded_len());
    }

    #[test]
    fn parse_returns_fields() {
        let frame = sample().encode().expect("encode");
        assert_eq!(Attachment::parse(&frame), Ok(sample()));
    }

    #[test]
    fn empty_attachment() {
        let empty = Attachment::new("", "", Bytes::new());
        let frame = empty.encode().expect("encode");
        assert_eq!(frame.len(), MIN_DATA_OFFSET);
        assert_eq!(Attachment::parse(&frame), Ok(empty));
    }

    #[test]
    fn nul_in_name_rejected() {
        let attachment = Attachment::new("a\0b", "text/plain", Bytes::new());
        assert_eq!(
            attachment.encode(),
            Err(EncodingError::EmbeddedNul { field: "name", position: 1 })
        );
    }

    #[test]
    fn nul_in_type_rejected() {
        let attachment = Attachment::new("a", "text\0", Bytes::new());
        assert_eq!(
            attachment.encode(),
            Err(EncodingError::EmbeddedNul { field: "mime_type", position: 4 })
        );
    }

    #[test]
    fn empty_frame_is_truncated() {
        let result = Attachment::parse(&Bytes::new());
        assert_eq!(result, Err(DecodingError::Truncated { needed: 4, available: 0 }));
    }

    #[test]
    fn truncated_after_offset() {
        let frame = sample().encode().expect("encode");
        let result = Attachment::parse(&frame.slice(..4));
        assert_eq!(result, Err(DecodingError::Truncated { needed: 57, available: 4 }));
    }

    #[test]
    fn truncated_inside_header() {
        let frame = sample().encode().expect("encode");
        let result = Attachment::parse(&frame.slice(..30));
        assert!(matches!(result, Err(DecodingError::Truncated { .. })));
    }

    #[test]
    fn negative_offset_rejected() {
        let mut frame = BytesMut::from(&sample().encode().expect("encode")[..]);
        frame[..4].copy_from_slice(&(-1i32).to_be_bytes());
        let result = Attachment::parse(&frame.freeze());
        assert_eq!(result, Err(DecodingError::InvalidOffset { offset: -1 }));
    }

    #[test]
    fn offset_below_minimum_rejected() {
        let mut frame = BytesMut::from(&sample().encode().expect("encode")[..]);
        frame[..4].copy_from_slice(&8i32.to_be_bytes());
        let result = Attachment::parse(&frame.freeze());
        assert_eq!(result, Err(DecodingError::InvalidOffset { offset: 8 }));
    }

    #[test]
    fn size_one_greater_is_mismatch() {
        let mut frame = BytesMut::from(&sample().encode().expect("encode")[..]);
        frame[21..25].copy_from_slice(&6i32.to_be_bytes());
        let result = Attachment::parse(&frame.freeze());
        assert_eq!(result, Err(DecodingError::SizeMismatch { declared: 6, actual: 5 }));
    }

    #[test]
    fn flipped_data_byte_is_hash_mismatch() {
        let mut frame = BytesMut::from(&sample().encode().expect("encode")[..]);
        let last = frame.len() - 1;
        frame[last] ^= 0x01;
        let result = Attachment::parse(&frame.freeze());
        assert_eq!(result, Err(DecodingError::HashMismatch));
    }

    #[test]
    fn non_utf8_name_rejected() {
        let mut frame = BytesMut::from(&sample().encode().expect("encode")[..]);
        frame[4] = 0xff;
        let result = Attachment::parse(&frame.freeze());
        assert_eq!(result, Err(DecodingError::InvalidUtf8 { valid_up_to: 0 }));
    }

    #[test]
    fn parsed_data_shares_frame_buffer() {
        let frame = sample().encode().expect("encode");
        let parsed = Attachment::parse(&frame).expect("parse");
        assert_eq!(parsed.data.as_ptr(), frame[57..].as_ptr());
    }
}

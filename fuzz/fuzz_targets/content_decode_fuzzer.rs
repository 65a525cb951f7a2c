//! Fuzz target for [`Content::decode`]
//!
//! Untrusted message bodies must never crash the client.
//!
//! # Strategy
//!
//! - Tags: every known type tag plus arbitrary strings
//! - Bodies: raw bytes, and File frames built from fuzzed parts with a
//!   fuzzed offset, size and hash mutation
//!
//! # Invariants
//!
//! - NEVER panic, whatever the tag or body
//! - Unknown tags always decode to `Fallback` with the body unchanged
//! - A successfully decoded value re-encodes to a body that decodes to the
//!   same value under the same tag
//! - A File frame whose data was altered after encoding MUST fail with a
//!   corruption error

#![no_main]

use arbitrary::Arbitrary;
use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use subtext_proto::{Attachment, Content, TypeTag};

#[derive(Debug, Arbitrary)]
enum FuzzTag {
    Known(u8),
    Other(String),
}

impl FuzzTag {
    fn to_tag(&self) -> TypeTag {
        match self {
            Self::Known(n) => match n % 5 {
                0 => TypeTag::Message,
                1 => TypeTag::TextMessage,
                2 => TypeTag::FileMessage,
                3 => TypeTag::AddMember,
                _ => TypeTag::RemoveMember,
            },
            Self::Other(name) => TypeTag::parse(name),
        }
    }
}

#[derive(Debug, Arbitrary)]
enum FuzzBody {
    Raw(Vec<u8>),
    File { name: String, mime_type: String, data: Vec<u8>, flip: Option<u16> },
}

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    tag: FuzzTag,
    body: FuzzBody,
}

fuzz_target!(|input: FuzzInput| {
    let tag = input.tag.to_tag();

    match input.body {
        FuzzBody::Raw(raw) => {
            let body = Bytes::from(raw);
            match Content::decode(&tag, body.clone()) {
                Ok(content) => {
                    if matches!(tag, TypeTag::Other(_)) {
                        assert_eq!(content, Content::Fallback { data: body });
                        return;
                    }
                    let reencoded = content.encode().expect("decoded content re-encodes");
                    let again = Content::decode(&tag, reencoded).expect("re-encoded content decodes");
                    assert_eq!(again, content);
                },
                Err(e) => {
                    assert!(!matches!(tag, TypeTag::Other(_)), "unknown tag rejected: {e}");
                },
            }
        },
        FuzzBody::File { name, mime_type, data, flip } => {
            let attachment = Attachment::new(name, mime_type, data);
            let Ok(frame) = attachment.encode() else {
                // Names with NUL bytes cannot be framed.
                return;
            };

            let mut bytes = frame.to_vec();
            let data_start = bytes.len() - attachment.data.len();
            let flipped = match flip {
                Some(at) if !attachment.data.is_empty() => {
                    let index = data_start + usize::from(at) % attachment.data.len();
                    bytes[index] ^= 0xFF;
                    true
                },
                _ => false,
            };

            let result = Content::decode(&TypeTag::FileMessage, Bytes::from(bytes));
            if flipped {
                let err = result.expect_err("tampered frame decoded");
                assert!(err.is_corruption(), "unexpected error kind: {err}");
            } else {
                assert_eq!(result.expect("intact frame decodes"), Content::File(attachment));
            }
        },
    }
});

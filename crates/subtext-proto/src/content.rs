//! Typed message content.

use bytes::Bytes;
use uuid::Uuid;

use crate::{
    attachment::Attachment,
    errors::{DecodingError, EncodingError},
    type_tag::{ContentKind, TypeTag},
};

/// Message payload semantics, independent of wire encoding.
///
/// `Content::decode(tag, content.encode()?)` reproduces `content` for every
/// variant when `tag` is the canonical tag (or, for membership changes,
/// either membership tag). The reverse does not hold in general.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// UTF-8 text.
    Text {
        /// Message text.
        body: String,
    },

    /// File attachment.
    File(Attachment),

    /// A user joined or left a board. The tag says which.
    MembershipChange {
        /// The affected user.
        user_id: Uuid,
    },

    /// Payload of a type this crate does not interpret.
    Fallback {
        /// Original bytes, untouched.
        data: Bytes,
    },
}

impl Content {
    /// Text content.
    pub fn text(body: impl Into<String>) -> Self {
        Self::Text { body: body.into() }
    }

    /// File content.
    pub fn file(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self::File(Attachment::new(name, mime_type, data))
    }

    /// Encode into the wire payload.
    ///
    /// Only attachments can fail, see [`Attachment::encode`].
    pub fn encode(&self) -> Result<Bytes, EncodingError> {
        match self {
            Self::Text { body } => Ok(Bytes::copy_from_slice(body.as_bytes())),
            Self::File(attachment) => attachment.encode(),
            Self::MembershipChange { user_id } => {
                Ok(Bytes::from(user_id.hyphenated().to_string()))
            },
            Self::Fallback { data } => Ok(data.clone()),
        }
    }

    /// Decode a wire payload according to its type tag.
    ///
    /// Unknown tags always succeed with [`Content::Fallback`].
    pub fn decode(tag: &TypeTag, data: Bytes) -> Result<Self, DecodingError> {
        match tag.kind() {
            ContentKind::Text => {
                let body = std::str::from_utf8(&data)?;
                Ok(Self::Text { body: body.to_string() })
            },
            ContentKind::File => Attachment::parse(&data).map(Self::File),
            ContentKind::Membership => decode_member(&data),
            ContentKind::Fallback => Ok(Self::Fallback { data }),
        }
    }

    /// Decode with a tag given as its wire string.
    pub fn decode_str(tag: &str, data: impl Into<Bytes>) -> Result<Self, DecodingError> {
        Self::decode(&TypeTag::parse(tag), data.into())
    }

    /// Tag to send this content under as a new message.
    ///
    /// `None` means the caller must choose: membership changes need
    /// `AddMember` or `RemoveMember`, and fallback content has no type of its
    /// own.
    pub fn canonical_type_tag(&self) -> Option<TypeTag> {
        match self {
            Self::Text { .. } => Some(TypeTag::TextMessage),
            Self::File(_) => Some(TypeTag::FileMessage),
            Self::MembershipChange { .. } | Self::Fallback { .. } => None,
        }
    }

    /// The content kind of this variant.
    pub fn kind(&self) -> ContentKind {
        match self {
            Self::Text { .. } => ContentKind::Text,
            Self::File(_) => ContentKind::File,
            Self::MembershipChange { .. } => ContentKind::Membership,
            Self::Fallback { .. } => ContentKind::Fallback,
        }
    }
}

impl From<Attachment> for Content {
    fn from(attachment: Attachment) -> Self {
        Self::File(attachment)
    }
}

fn decode_member(data: &[u8]) -> Result<Content, DecodingError> {
    let text = std::str::from_utf8(data)
        .map_err(|e| DecodingError::InvalidUuid { reason: e.to_string() })?;
    let user_id =
        Uuid::parse_str(text).map_err(|e| DecodingError::InvalidUuid { reason: e.to_string() })?;
    Ok(Content::MembershipChange { user_id })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMBER: Uuid = Uuid::from_u128(0x6ba7_b810_9dad_11d1_80b4_00c0_4fd4_30c8);

    #[test]
    fn text_encodes_as_utf8() {
        let content = Content::text("grüß");
        assert_eq!(content.encode().expect("encode"), Bytes::from("grüß"));
    }

    #[test]
    fn legacy_message_tag_decodes_text() {
        let decoded = Content::decode_str("Message", "hi").expect("decode");
        assert_eq!(decoded, Content::text("hi"));
    }

    #[test]
    fn invalid_utf8_text_is_rejected() {
        let result = Content::decode_str("TextMessage", vec![0x68, 0xc3]);
        assert_eq!(result, Err(DecodingError::InvalidUtf8 { valid_up_to: 1 }));
    }

    #[test]
    fn member_encodes_hyphenated_lowercase() {
        let content = Content::MembershipChange { user_id: MEMBER };
        assert_eq!(
            content.encode().expect("encode"),
            Bytes::from("6ba7b810-9dad-11d1-80b4-00c04fd430c8")
        );
    }

    #[test]
    fn member_decodes_under_both_tags() {
        let payload = Content::MembershipChange { user_id: MEMBER }.encode().expect("encode");

        for tag in [TypeTag::AddMember, TypeTag::RemoveMember] {
            let decoded = Content::decode(&tag, payload.clone()).expect("decode");
            assert_eq!(decoded, Content::MembershipChange { user_id: MEMBER });
        }
    }

    #[test]
    fn malformed_member_is_invalid_uuid() {
        let result = Content::decode_str("AddMember", "not-a-uuid");
        assert!(matches!(result, Err(DecodingError::InvalidUuid { .. })));

        let result = Content::decode_str("RemoveMember", vec![0xff, 0xfe]);
        assert!(matches!(result, Err(DecodingError::InvalidUuid { .. })));
    }

    #[test]
    fn unknown_tag_keeps_bytes() {
        let data = Bytes::from_static(&[0x00, 0xff, 0x10]);
        let decoded = Content::decode_str("CustomXYZ", data.clone()).expect("decode");
        assert_eq!(decoded, Content::Fallback { data });
    }

    #[test]
    fn fallback_encodes_verbatim() {
        let data = Bytes::from_static(b"\x01\x02");
        assert_eq!(Content::Fallback { data: data.clone() }.encode(), Ok(data));
    }

    #[test]
    fn canonical_tags() {
        assert_eq!(Content::text("x").canonical_type_tag(), Some(TypeTag::TextMessage));
        assert_eq!(Content::file("a", "b", Bytes::new()).canonical_type_tag(), Some(TypeTag::FileMessage));
        assert_eq!(Content::MembershipChange { user_id: MEMBER }.canonical_type_tag(), None);
        assert_eq!(Content::Fallback { data: Bytes::new() }.canonical_type_tag(), None);
    }

    #[test]
    fn file_round_trip() {
        let content = Content::file("a.txt", "text/plain", Bytes::from_static(b"hello"));
        let payload = content.encode().expect("encode");
        assert_eq!(Content::decode(&TypeTag::FileMessage, payload), Ok(content));
    }
}

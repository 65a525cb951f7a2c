//! Message type tags and content dispatch.
//!
//! The server labels every message with a free-form type string. The tags
//! listed here are the ones this crate knows how to decode; anything else is
//! kept verbatim in [`TypeTag::Other`] and decodes to opaque fallback content.

use std::{convert::Infallible, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Type label accompanying raw message bytes.
///
/// Parsing is total: every string maps to some tag, and [`TypeTag::as_str`]
/// returns exactly the string it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TypeTag {
    /// Legacy plain text message.
    Message,
    /// UTF-8 text message.
    TextMessage,
    /// File attachment frame.
    FileMessage,
    /// A member was added to the board.
    AddMember,
    /// A member was removed from the board.
    RemoveMember,
    /// Tag this crate does not interpret.
    Other(String),
}

/// Content variant selected by a type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    /// Decode as [`Content::Text`](crate::Content::Text).
    Text,
    /// Decode as [`Content::File`](crate::Content::File).
    File,
    /// Decode as [`Content::MembershipChange`](crate::Content::MembershipChange).
    Membership,
    /// Keep bytes as [`Content::Fallback`](crate::Content::Fallback).
    Fallback,
}

/// Known tag strings and the tags they parse to.
const KNOWN_TAGS: [(&str, TypeTag); 5] = [
    ("Message", TypeTag::Message),
    ("TextMessage", TypeTag::TextMessage),
    ("FileMessage", TypeTag::FileMessage),
    ("AddMember", TypeTag::AddMember),
    ("RemoveMember", TypeTag::RemoveMember),
];

impl TypeTag {
    /// Parse a wire tag string.
    pub fn parse(tag: &str) -> Self {
        KNOWN_TAGS
            .iter()
            .find(|(name, _)| *name == tag)
            .map_or_else(|| Self::Other(tag.to_string()), |(_, known)| known.clone())
    }

    /// The wire string for this tag.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Message => "Message",
            Self::TextMessage => "TextMessage",
            Self::FileMessage => "FileMessage",
            Self::AddMember => "AddMember",
            Self::RemoveMember => "RemoveMember",
            Self::Other(tag) => tag,
        }
    }

    /// Which content variant payloads with this tag decode into.
    pub fn kind(&self) -> ContentKind {
        match self {
            Self::Message | Self::TextMessage => ContentKind::Text,
            Self::FileMessage => ContentKind::File,
            Self::AddMember | Self::RemoveMember => ContentKind::Membership,
            Self::Other(_) => ContentKind::Fallback,
        }
    }

    /// Returns true for membership notices.
    pub fn is_membership(&self) -> bool {
        self.kind() == ContentKind::Membership
    }
}

impl From<&str> for TypeTag {
    fn from(tag: &str) -> Self {
        Self::parse(tag)
    }
}

impl From<String> for TypeTag {
    fn from(tag: String) -> Self {
        match Self::parse(&tag) {
            Self::Other(_) => Self::Other(tag),
            known => known,
        }
    }
}

impl From<TypeTag> for String {
    fn from(tag: TypeTag) -> Self {
        match tag {
            TypeTag::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl FromStr for TypeTag {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

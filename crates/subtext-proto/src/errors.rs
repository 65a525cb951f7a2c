//! Codec error types.

use thiserror::Error;

/// Errors raised while encoding content into its wire form.
///
/// These are local precondition violations: retrying with the same input
/// always fails the same way.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    /// A NUL-terminated header field contains an embedded NUL byte.
    #[error("attachment {field} contains an embedded NUL byte at position {position}")]
    EmbeddedNul {
        /// Name of the offending header field (`name` or `mime_type`).
        field: &'static str,
        /// Byte position of the first NUL within the field.
        position: usize,
    },

    /// A length does not fit the 4-byte signed size fields of the frame.
    #[error("{what} is {len} bytes, exceeds frame limit of {max} bytes")]
    TooLarge {
        /// Which length overflowed.
        what: &'static str,
        /// Actual length in bytes.
        len: usize,
        /// Largest encodable length.
        max: usize,
    },
}

/// Errors raised while decoding a wire payload.
///
/// Decoding never recovers locally: a malformed attachment is reported rather
/// than returned with truncated or unverified data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodingError {
    /// Payload is shorter than its own header claims.
    #[error("payload truncated: need {needed} bytes, have {available}")]
    Truncated {
        /// Bytes required to continue parsing.
        needed: usize,
        /// Bytes actually present.
        available: usize,
    },

    /// Declared data offset cannot describe a valid attachment header.
    #[error("invalid data offset {offset}")]
    InvalidOffset {
        /// Offset as read from the frame.
        offset: i32,
    },

    /// Declared attachment size differs from the trailing byte count.
    #[error("size mismatch: header declares {declared} bytes, frame carries {actual}")]
    SizeMismatch {
        /// Size from the frame header.
        declared: i32,
        /// Length of the trailing data.
        actual: usize,
    },

    /// SHA-256 of the trailing data does not match the header digest.
    #[error("attachment hash mismatch")]
    HashMismatch,

    /// Text field is not valid UTF-8.
    #[error("invalid UTF-8 after {valid_up_to} bytes")]
    InvalidUtf8 {
        /// Length of the valid prefix.
        valid_up_to: usize,
    },

    /// Membership payload is not a UUID.
    #[error("invalid member UUID: {reason}")]
    InvalidUuid {
        /// Description of the parse failure.
        reason: String,
    },
}

impl DecodingError {
    /// Returns true if the payload looks damaged or tampered with.
    ///
    /// Corruption means the bytes were framed correctly at some point but no
    /// longer are. The remaining kinds mean the bytes were never of the
    /// declared type.
    pub fn is_corruption(&self) -> bool {
        match self {
            Self::Truncated { .. }
            | Self::InvalidOffset { .. }
            | Self::SizeMismatch { .. }
            | Self::HashMismatch => true,

            Self::InvalidUtf8 { .. } | Self::InvalidUuid { .. } => false,
        }
    }
}

impl From<std::str::Utf8Error> for DecodingError {
    fn from(err: std::str::Utf8Error) -> Self {
        Self::InvalidUtf8 { valid_up_to: err.valid_up_to() }
    }
}

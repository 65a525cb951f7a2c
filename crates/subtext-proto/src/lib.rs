//! Subtext Content Codec
//!
//! Converts between typed message content and the opaque byte payloads the
//! Subtext server stores and relays.
//!
//! # Design
//!
//! The codec is pure and stateless. Every function here is a byte
//! transformation with no I/O and no shared state, so it can be called from
//! any number of threads at once.
//!
//! Decoding is driven by a [`TypeTag`] supplied out-of-band (the `type` field
//! of a message listing or the `X-Metadata` header of a single message fetch).
//! Unknown tags are data, not errors: they decode to [`Content::Fallback`]
//! carrying the original bytes.
//!
//! # Wire Format
//!
//! Only file attachments have a structured frame, see [`Attachment`]. Text is
//! raw UTF-8, membership notices are the hyphenated UUID string, and fallback
//! content is passed through untouched.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod attachment;
pub mod content;
pub mod errors;
pub mod type_tag;

pub use attachment::{Attachment, HASH_SIZE, MIN_DATA_OFFSET};
pub use content::Content;
pub use errors::{DecodingError, EncodingError};
pub use type_tag::{ContentKind, TypeTag};

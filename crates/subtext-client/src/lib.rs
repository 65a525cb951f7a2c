//! Subtext Client
//!
//! Blocking client for the Subtext messaging service: session login, users,
//! boards, keys and messages over the REST API.
//!
//! # Architecture
//!
//! ```text
//! Client ──login──▶ Context (transport + Session)
//!                      ├─ User   ─ friends / blocked / friend_requests / keys
//!                      ├─ Board  ─ members / messages / send
//!                      └─ Message ─ lazy Content decode
//! ```
//!
//! - Every list relationship is a [`PagedCollection`] driven by one
//!   authenticated GET per page
//! - Message payloads are decoded with [`subtext_proto::Content`] on demand
//! - The network sits behind the [`Transport`] trait; [`HttpTransport`] is
//!   the reqwest implementation
//! - Session state is an explicit [`Context`] value, never mutated in place
//!
//! # Errors
//!
//! Server errors are classified into [`ApiErrorKind`] by their literal name.
//! Transport errors are passed through untouched; nothing here retries.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod api_error;
mod board;
mod client;
mod config;
mod context;
mod encryption;
mod error;
mod key;
mod message;
mod transport;
mod user;

pub use api_error::{ApiError, ApiErrorKind};
pub use board::{Board, BoardEncryption, BoardInfo, BoardSummary};
pub use client::{Client, ServerInfo, UserRef};
pub use config::{ClientConfig, DEFAULT_PAGE_SIZE};
pub use context::{Context, Session};
pub use encryption::{Encryptor, GpgEncryptor};
pub use error::ClientError;
pub use key::Key;
pub use message::{Message, Payload};
pub use subtext_core::{Identified, PageError, PagedCollection, Traversal};
pub use subtext_proto::{Attachment, Content, DecodingError, EncodingError, TypeTag};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, METADATA_HEADER, Method, Transport};
pub use user::{User, UserInfo, UserPresence};

//! Board messages and lazy content decoding.
//!
//! Listings may carry a message's payload inline (base64 `content`) or omit
//! it. Inline payloads are decoded on first access to [`Message::content`]
//! and the result is cached. Omitted payloads are loaded with
//! [`Message::fetch_payload`], which reads the raw body and the `X-Metadata`
//! header of the single-message endpoint.

use std::{fmt, sync::OnceLock};

use base64::{Engine, engine::general_purpose::STANDARD};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use subtext_core::Identified;
use subtext_proto::{Content, TypeTag};
use uuid::Uuid;

use crate::{
    context::Context, encryption::Encryptor, error::ClientError, transport::Method, user::User,
};

/// Raw entry of a board's message list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MessageEntry {
    pub(crate) id: Uuid,
    pub(crate) author_id: Uuid,
    pub(crate) timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub(crate) type_tag: TypeTag,
    #[serde(default)]
    pub(crate) is_system: bool,
    #[serde(default)]
    pub(crate) content: Option<String>,
}

/// JSON carried in the `X-Metadata` header of a single-message fetch.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageMetadata {
    #[serde(rename = "type")]
    type_tag: TypeTag,
    author_id: Uuid,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    is_system: bool,
}

/// Payload state of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Wire bytes, decoded on demand.
    Raw(Bytes),
    /// Already typed content.
    Decoded(Content),
    /// Not transferred with the listing.
    Absent,
}

/// A message posted to a board.
#[derive(Clone)]
pub struct Message {
    id: Uuid,
    board_id: Uuid,
    author_id: Uuid,
    timestamp: DateTime<Utc>,
    type_tag: TypeTag,
    is_system: bool,
    payload: Payload,
    decoded: OnceLock<Content>,
    ctx: Context,
}

impl Message {
    pub(crate) fn from_entry(
        board_id: Uuid,
        entry: MessageEntry,
        ctx: &Context,
    ) -> Result<Self, ClientError> {
        let payload = match entry.content {
            Some(encoded) => Payload::Raw(Bytes::from(STANDARD.decode(encoded).map_err(|e| {
                ClientError::InvalidResponse { reason: format!("message {}: {e}", entry.id) }
            })?)),
            None => Payload::Absent,
        };

        Ok(Self {
            id: entry.id,
            board_id,
            author_id: entry.author_id,
            timestamp: entry.timestamp,
            type_tag: entry.type_tag,
            is_system: entry.is_system,
            payload,
            decoded: OnceLock::new(),
            ctx: ctx.clone(),
        })
    }

    /// A message this client just posted, with its content already typed.
    pub(crate) fn sent(board_id: Uuid, entry: MessageEntry, content: Content, ctx: &Context) -> Self {
        Self {
            id: entry.id,
            board_id,
            author_id: entry.author_id,
            timestamp: entry.timestamp,
            type_tag: entry.type_tag,
            is_system: entry.is_system,
            payload: Payload::Decoded(content),
            decoded: OnceLock::new(),
            ctx: ctx.clone(),
        }
    }

    /// Fetch one message through the single-message endpoint.
    pub(crate) fn fetch(ctx: Context, board_id: Uuid, message_id: Uuid) -> Result<Self, ClientError> {
        let (metadata, body) = fetch_raw(&ctx, board_id, message_id)?;
        Ok(Self {
            id: message_id,
            board_id,
            author_id: metadata.author_id,
            timestamp: metadata.timestamp,
            type_tag: metadata.type_tag,
            is_system: metadata.is_system,
            payload: Payload::Raw(body),
            decoded: OnceLock::new(),
            ctx,
        })
    }

    /// Message id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Board the message was posted to.
    pub fn board_id(&self) -> Uuid {
        self.board_id
    }

    /// Author handle.
    pub fn author(&self) -> User {
        self.ctx.user(self.author_id)
    }

    /// Author id.
    pub fn author_id(&self) -> Uuid {
        self.author_id
    }

    /// Server timestamp.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Declared type tag.
    pub fn type_tag(&self) -> &TypeTag {
        &self.type_tag
    }

    /// Whether the server generated this message.
    pub fn is_system(&self) -> bool {
        self.is_system
    }

    /// Current payload state.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Raw wire bytes, if loaded and not yet replaced by typed content.
    pub fn raw(&self) -> Option<&Bytes> {
        match &self.payload {
            Payload::Raw(bytes) => Some(bytes),
            Payload::Decoded(_) | Payload::Absent => None,
        }
    }

    /// Typed content, decoded once and cached.
    ///
    /// # Errors
    ///
    /// - `MissingPayload` if the payload was not listed; call
    ///   [`fetch_payload`](Self::fetch_payload) first
    /// - `Decode` if the bytes do not match the declared type
    pub fn content(&self) -> Result<&Content, ClientError> {
        match &self.payload {
            Payload::Decoded(content) => Ok(content),
            Payload::Absent => Err(ClientError::MissingPayload { message_id: self.id }),
            Payload::Raw(bytes) => {
                if let Some(content) = self.decoded.get() {
                    return Ok(content);
                }
                let content = Content::decode(&self.type_tag, bytes.clone()).inspect_err(|e| {
                    tracing::warn!(message_id = %self.id, tag = %self.type_tag, error = %e, "undecodable message");
                })?;
                Ok(self.decoded.get_or_init(|| content))
            },
        }
    }

    /// Load the payload through the single-message endpoint.
    ///
    /// Metadata from the `X-Metadata` header replaces the listed values.
    pub fn fetch_payload(&mut self) -> Result<(), ClientError> {
        let (metadata, body) = fetch_raw(&self.ctx, self.board_id, self.id)?;
        self.author_id = metadata.author_id;
        self.timestamp = metadata.timestamp;
        self.type_tag = metadata.type_tag;
        self.payload = Payload::Raw(body);
        self.decoded = OnceLock::new();
        Ok(())
    }

    /// Decrypt the raw payload, then decode it.
    ///
    /// Encryption wraps the whole encoded frame, so the type tag still
    /// applies to the plaintext.
    pub fn decrypt_content(&self, encryptor: &dyn Encryptor) -> Result<Content, ClientError> {
        let raw = match &self.payload {
            Payload::Raw(bytes) => bytes,
            Payload::Decoded(content) => return Ok(content.clone()),
            Payload::Absent => return Err(ClientError::MissingPayload { message_id: self.id }),
        };
        let plaintext = encryptor.decrypt(raw)?;
        Ok(Content::decode(&self.type_tag, Bytes::from(plaintext))?)
    }
}

fn fetch_raw(
    ctx: &Context,
    board_id: Uuid,
    message_id: Uuid,
) -> Result<(MessageMetadata, Bytes), ClientError> {
    let request =
        ctx.authed(Method::Get, format!("/Subtext/board/{board_id}/messages/{message_id}"));
    let response = ctx.call(&request)?;

    let header = response.metadata.as_deref().ok_or_else(|| ClientError::InvalidResponse {
        reason: format!("message {message_id}: missing X-Metadata header"),
    })?;
    let metadata: MessageMetadata = serde_json::from_str(header)?;

    Ok((metadata, response.body))
}

impl Identified for Message {
    type Id = Uuid;

    fn id(&self) -> Uuid {
        self.id
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("id", &self.id)
            .field("board_id", &self.board_id)
            .field("author_id", &self.author_id)
            .field("timestamp", &self.timestamp)
            .field("type_tag", &self.type_tag)
            .field("is_system", &self.is_system)
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}

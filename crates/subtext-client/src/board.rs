//! Boards: membership and message streams.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use subtext_core::{Identified, PagedCollection};
use subtext_proto::{Content, TypeTag};
use uuid::Uuid;

use crate::{
    context::Context,
    encryption::Encryptor,
    error::ClientError,
    message::{Message, MessageEntry},
    transport::Method,
    user::User,
};

/// How messages on a board are protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoardEncryption {
    /// OpenPGP, one ciphertext per message for all members
    #[serde(rename = "GnuPG")]
    GnuPg,
    /// Symmetric key shared out of band
    SharedKey,
    /// Plaintext
    None,
}

/// Board attributes as returned by `/Subtext/board/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardInfo {
    /// Board name
    pub name: Option<String>,
    /// Owning user
    #[serde(rename = "ownerId")]
    pub owner: Option<Uuid>,
    /// Direct conversation between two users
    pub is_direct: Option<bool>,
    /// Encryption scheme
    pub encryption: Option<BoardEncryption>,
    /// Last change of any kind
    pub last_update: Option<DateTime<Utc>>,
    /// Last change that should notify members
    pub last_significant_update: Option<DateTime<Utc>>,
}

/// Raw entry of the board list.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BoardListing {
    id: Uuid,
    #[serde(flatten)]
    info: BoardInfo,
}

impl BoardListing {
    pub(crate) fn into_summary(self, ctx: &Context) -> BoardSummary {
        BoardSummary { board: ctx.board(self.id), info: self.info }
    }
}

/// A board together with the attributes listed alongside it.
#[derive(Debug, Clone)]
pub struct BoardSummary {
    /// Board handle
    pub board: Board,
    /// Attributes at listing time
    pub info: BoardInfo,
}

impl Identified for BoardSummary {
    type Id = Uuid;

    fn id(&self) -> Uuid {
        self.board.id()
    }
}

/// Handle for a board.
#[derive(Clone)]
pub struct Board {
    id: Uuid,
    ctx: Context,
}

impl Board {
    pub(crate) fn new(id: Uuid, ctx: Context) -> Self {
        Self { id, ctx }
    }

    /// Board id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Fetch current attributes.
    pub fn refresh(&self) -> Result<BoardInfo, ClientError> {
        let request = self.ctx.authed(Method::Get, format!("/Subtext/board/{}", self.id));
        self.ctx.call(&request)?.json()
    }

    /// Board owner, from fresh attributes.
    pub fn owner(&self) -> Result<Option<User>, ClientError> {
        Ok(self.refresh()?.owner.map(|id| self.ctx.user(id)))
    }

    /// Board members.
    pub fn members(&self) -> PagedCollection<User, ClientError> {
        self.ctx.paged(format!("/Subtext/board/{}/members", self.id), |id: Uuid, ctx| {
            Ok(ctx.user(id))
        })
    }

    /// Messages in server order.
    pub fn messages(&self) -> PagedCollection<Message, ClientError> {
        let board_id = self.id;
        self.ctx.paged(format!("/Subtext/board/{board_id}/messages"), move |entry: MessageEntry, ctx| {
            Message::from_entry(board_id, entry, ctx)
        })
    }

    /// Fetch a single message with its payload.
    pub fn message(&self, message_id: Uuid) -> Result<Message, ClientError> {
        self.ctx.message(self.id, message_id)
    }

    /// Post content as a new message.
    ///
    /// Uses the content's canonical tag unless `tag` is given.
    ///
    /// # Errors
    ///
    /// - `MissingTypeTag` for membership or fallback content without `tag`
    /// - `Encode` if the content cannot be framed
    pub fn send(&self, content: &Content, tag: Option<TypeTag>) -> Result<Message, ClientError> {
        let tag = resolve_tag(content, tag)?;
        let payload = content.encode()?;
        self.post(tag, payload.to_vec(), content.clone())
    }

    /// Encrypt the encoded frame for `recipients`, then post it.
    pub fn send_encrypted(
        &self,
        content: &Content,
        tag: Option<TypeTag>,
        recipients: &[User],
        encryptor: &dyn Encryptor,
    ) -> Result<Message, ClientError> {
        let tag = resolve_tag(content, tag)?;
        let payload = content.encode()?;
        let recipients: Vec<Uuid> = recipients.iter().map(User::id).collect();
        let ciphertext = encryptor.encrypt(&payload, &recipients, self.ctx.user_id())?;
        self.post(tag, ciphertext, content.clone())
    }

    fn post(&self, tag: TypeTag, body: Vec<u8>, content: Content) -> Result<Message, ClientError> {
        let request = self
            .ctx
            .authed(Method::Post, format!("/Subtext/board/{}/messages", self.id))
            .param("type", &tag)
            .body(body);
        let entry: MessageEntry = self.ctx.call(&request)?.json()?;

        tracing::debug!(board_id = %self.id, message_id = %entry.id, %tag, "message sent");
        Ok(Message::sent(self.id, entry, content, &self.ctx))
    }
}

fn resolve_tag(content: &Content, tag: Option<TypeTag>) -> Result<TypeTag, ClientError> {
    tag.or_else(|| content.canonical_type_tag()).ok_or(ClientError::MissingTypeTag)
}

impl Identified for Board {
    type Id = Uuid;

    fn id(&self) -> Uuid {
        self.id
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Board").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_info_from_camel_case() {
        let info: BoardInfo = serde_json::from_str(
            r#"{"name":"general","ownerId":"6ba7b810-9dad-11d1-80b4-00c04fd430c8",
                "isDirect":false,"encryption":"GnuPG","lastUpdate":"2026-10-15T08:30:00Z"}"#,
        )
        .expect("decode");

        assert_eq!(info.name.as_deref(), Some("general"));
        assert_eq!(info.encryption, Some(BoardEncryption::GnuPg));
        assert!(info.owner.is_some());
        assert_eq!(info.is_direct, Some(false));
        assert!(info.last_significant_update.is_none());
    }

    #[test]
    fn explicit_tag_overrides_canonical() {
        let tag = resolve_tag(&Content::text("hi"), Some(TypeTag::Message)).expect("tag");
        assert_eq!(tag, TypeTag::Message);
    }

    #[test]
    fn membership_needs_explicit_tag() {
        let content = Content::MembershipChange { user_id: Uuid::nil() };
        assert!(matches!(resolve_tag(&content, None), Err(ClientError::MissingTypeTag)));
        assert_eq!(resolve_tag(&content, Some(TypeTag::AddMember)).expect("tag"), TypeTag::AddMember);
    }
}

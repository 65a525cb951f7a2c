//! Users and their relationship lists.

use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use subtext_core::{Identified, PagedCollection};
use uuid::Uuid;

use crate::{
    context::Context,
    error::ClientError,
    key::{Key, KeyEntry},
    transport::Method,
};

/// Availability a user advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserPresence {
    /// Available
    Online,
    /// Idle
    Away,
    /// Do not disturb
    Busy,
    /// Not connected
    Offline,
}

impl UserPresence {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "Online",
            Self::Away => "Away",
            Self::Busy => "Busy",
            Self::Offline => "Offline",
        }
    }
}

impl fmt::Display for UserPresence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User attributes as returned by `/Subtext/user/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    /// Display name
    pub name: Option<String>,
    /// Current presence
    pub presence: Option<UserPresence>,
    /// Last activity
    pub last_active: Option<DateTime<Utc>>,
    /// Free-form status line
    pub status: Option<String>,
    /// Account is deleted
    pub is_deleted: Option<bool>,
}

/// Handle for a user.
///
/// Cheap to clone; holds only the id and the context.
#[derive(Clone)]
pub struct User {
    id: Uuid,
    ctx: Context,
}

impl User {
    pub(crate) fn new(id: Uuid, ctx: Context) -> Self {
        Self { id, ctx }
    }

    /// User id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns true if this is the logged-in user.
    pub fn is_self(&self) -> bool {
        self.id == self.ctx.user_id()
    }

    /// Fetch current attributes.
    pub fn refresh(&self) -> Result<UserInfo, ClientError> {
        let request = self.ctx.authed(Method::Get, format!("/Subtext/user/{}", self.id));
        self.ctx.call(&request)?.json()
    }

    /// Friends of the logged-in user.
    pub fn friends(&self) -> Result<PagedCollection<Self, ClientError>, ClientError> {
        self.own_user_list("friends")
    }

    /// Users blocked by the logged-in user.
    pub fn blocked(&self) -> Result<PagedCollection<Self, ClientError>, ClientError> {
        self.own_user_list("blocked")
    }

    /// Pending friend requests to the logged-in user.
    pub fn friend_requests(&self) -> Result<PagedCollection<Self, ClientError>, ClientError> {
        self.own_user_list("friendrequests")
    }

    /// Public keys published by this user.
    pub fn keys(&self) -> PagedCollection<Key, ClientError> {
        self.ctx.paged(format!("/Subtext/user/{}/keys", self.id), |entry: KeyEntry, ctx| {
            Ok(Key::from_entry(entry, ctx))
        })
    }

    /// Remove this user from the logged-in user's friends.
    pub fn unfriend(&self) -> Result<(), ClientError> {
        self.send_own(Method::Delete, &format!("friends/{}", self.id))
    }

    /// Block this user.
    pub fn block(&self) -> Result<(), ClientError> {
        let request = self
            .ctx
            .authed(Method::Post, format!("/Subtext/user/{}/blocked", self.ctx.user_id()))
            .param("blockedId", self.id);
        self.ctx.call(&request).map(drop)
    }

    /// Unblock this user.
    pub fn unblock(&self) -> Result<(), ClientError> {
        self.send_own(Method::Delete, &format!("blocked/{}", self.id))
    }

    /// Send this user a friend request.
    pub fn send_friend_request(&self) -> Result<(), ClientError> {
        let request =
            self.ctx.authed(Method::Post, format!("/Subtext/user/{}/friendrequests", self.id));
        self.ctx.call(&request).map(drop)
    }

    /// Accept this user's friend request.
    pub fn accept_friend_request(&self) -> Result<(), ClientError> {
        self.send_own(Method::Post, &format!("friendrequests/{}", self.id))
    }

    /// Reject this user's friend request.
    pub fn reject_friend_request(&self) -> Result<(), ClientError> {
        self.send_own(Method::Delete, &format!("friendrequests/{}", self.id))
    }

    /// Publish a public key. Only allowed on the logged-in user.
    pub fn add_key(&self, data: impl Into<Bytes>) -> Result<(), ClientError> {
        self.require_self()?;
        let request =
            self.ctx.authed(Method::Post, format!("/Subtext/user/{}/keys", self.id)).body(data);
        self.ctx.call(&request).map(drop)
    }

    /// Set presence. Only allowed on the logged-in user.
    pub fn set_presence(
        &self,
        presence: UserPresence,
        until: Option<DateTime<Utc>>,
        other_data: Option<&str>,
    ) -> Result<(), ClientError> {
        self.require_self()?;
        let request = self
            .ctx
            .authed(Method::Put, format!("/Subtext/user/{}/presence", self.id))
            .param("presence", presence)
            .param_opt("untilTime", until.map(|t| t.to_rfc3339()))
            .param_opt("otherData", other_data);
        self.ctx.call(&request).map(drop)
    }

    fn require_self(&self) -> Result<(), ClientError> {
        if self.is_self() { Ok(()) } else { Err(ClientError::NotSelf { user_id: self.id }) }
    }

    fn own_user_list(&self, list: &str) -> Result<PagedCollection<Self, ClientError>, ClientError> {
        self.require_self()?;
        Ok(self.ctx.paged(format!("/Subtext/user/{}/{list}", self.id), |id: Uuid, ctx| {
            Ok(ctx.user(id))
        }))
    }

    /// Call a sub-resource of the logged-in user.
    fn send_own(&self, method: Method, suffix: &str) -> Result<(), ClientError> {
        let request =
            self.ctx.authed(method, format!("/Subtext/user/{}/{suffix}", self.ctx.user_id()));
        self.ctx.call(&request).map(drop)
    }
}

impl Identified for User {
    type Id = Uuid;

    fn id(&self) -> Uuid {
        self.id
    }
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for User {}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_info_from_camel_case() {
        let info: UserInfo = serde_json::from_str(
            r#"{"name":"testing","presence":"Busy","lastActive":"2026-10-15T08:30:00Z","isDeleted":false}"#,
        )
        .expect("decode");

        assert_eq!(info.name.as_deref(), Some("testing"));
        assert_eq!(info.presence, Some(UserPresence::Busy));
        assert_eq!(info.is_deleted, Some(false));
        assert!(info.status.is_none());
        assert!(info.last_active.is_some());
    }

    #[test]
    fn presence_wire_names() {
        assert_eq!(UserPresence::Away.to_string(), "Away");
        let parsed: UserPresence = serde_json::from_str("\"Offline\"").expect("decode");
        assert_eq!(parsed, UserPresence::Offline);
    }
}

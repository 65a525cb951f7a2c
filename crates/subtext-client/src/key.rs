//! Public keys.

use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use subtext_core::Identified;
use uuid::Uuid;

use crate::{context::Context, error::ClientError, transport::Method};

/// Raw entry of a user's key list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct KeyEntry {
    pub(crate) id: Uuid,
    #[serde(default)]
    pub(crate) publish_time: Option<DateTime<Utc>>,
}

/// A public key published by a user.
#[derive(Clone)]
pub struct Key {
    id: Uuid,
    publish_time: Option<DateTime<Utc>>,
    ctx: Context,
}

impl Key {
    pub(crate) fn from_entry(entry: KeyEntry, ctx: &Context) -> Self {
        Self { id: entry.id, publish_time: entry.publish_time, ctx: ctx.clone() }
    }

    /// Key id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// When the key was published, if listed.
    pub fn publish_time(&self) -> Option<DateTime<Utc>> {
        self.publish_time
    }

    /// Download the raw key material.
    pub fn fetch_data(&self) -> Result<Bytes, ClientError> {
        let response = self.ctx.call(&self.ctx.authed(Method::Get, format!("/Subtext/key/{}", self.id)))?;
        Ok(response.body)
    }
}

impl Identified for Key {
    type Id = Uuid;

    fn id(&self) -> Uuid {
        self.id
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key").field("id", &self.id).field("publish_time", &self.publish_time).finish()
    }
}

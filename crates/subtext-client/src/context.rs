//! Explicit session context.
//!
//! A [`Context`] bundles the transport, configuration and the authenticated
//! [`Session`]. It is immutable: logging in produces a new context, logging
//! out consumes it. Every handle ([`User`], [`Board`], ...) carries a clone.

use std::{fmt, sync::Arc};

use serde::de::DeserializeOwned;
use subtext_core::{Identified, PagedCollection};
use uuid::Uuid;

use crate::{
    api_error::ApiError,
    board::{Board, BoardListing, BoardSummary},
    config::ClientConfig,
    error::ClientError,
    message::Message,
    transport::{ApiRequest, ApiResponse, Method, Transport},
    user::User,
};

/// Authenticated session identifiers.
///
/// # Security
///
/// - **Debug Redaction**: The `Debug` impl redacts `session_id`, which is a
///   bearer credential.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Session {
    /// Session token passed as `sessionId` on every authenticated call
    pub session_id: Uuid,
    /// The logged-in user
    pub user_id: Uuid,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &"<redacted>")
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Transport and configuration shared by a client and all its contexts.
pub(crate) struct Shared {
    pub(crate) transport: Box<dyn Transport>,
    pub(crate) config: ClientConfig,
}

impl Shared {
    /// Send a request and turn non-2xx responses into errors.
    pub(crate) fn call(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError> {
        tracing::debug!(method = %request.method, path = %request.path, "sending request");

        let response = self.transport.send(request)?;
        if !response.is_success() {
            let err = ApiError::from_response(&response);
            tracing::warn!(
                method = %request.method,
                path = %request.path,
                status = response.status,
                error = %err.name,
                "request rejected"
            );
            return Err(err.into());
        }

        Ok(response)
    }
}

/// Session-bound view of a Subtext instance.
#[derive(Clone)]
pub struct Context {
    shared: Arc<Shared>,
    session: Session,
}

impl Context {
    pub(crate) fn new(shared: Arc<Shared>, session: Session) -> Self {
        Self { shared, session }
    }

    /// The authenticated session.
    pub fn session(&self) -> Session {
        self.session
    }

    /// The logged-in user's id.
    pub fn user_id(&self) -> Uuid {
        self.session.user_id
    }

    /// Client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    /// Handle for the logged-in user.
    pub fn me(&self) -> User {
        User::new(self.session.user_id, self.clone())
    }

    /// Handle for any user.
    pub fn user(&self, id: Uuid) -> User {
        User::new(id, self.clone())
    }

    /// Handle for a board.
    pub fn board(&self, id: Uuid) -> Board {
        Board::new(id, self.clone())
    }

    /// Boards visible to the logged-in user.
    pub fn boards(&self) -> PagedCollection<BoardSummary, ClientError> {
        self.paged("/Subtext/board".to_string(), |listing: BoardListing, ctx| {
            Ok(listing.into_summary(ctx))
        })
    }

    /// Fetch a single message with its payload.
    pub fn message(&self, board_id: Uuid, message_id: Uuid) -> Result<Message, ClientError> {
        Message::fetch(self.clone(), board_id, message_id)
    }

    /// End the session.
    pub fn logout(self) -> Result<(), ClientError> {
        self.call(&self.authed(Method::Post, "/Subtext/user/logout"))?;
        tracing::info!(user_id = %self.session.user_id, "logged out");
        Ok(())
    }

    /// Request carrying the `sessionId` parameter.
    pub(crate) fn authed(&self, method: Method, path: impl Into<String>) -> ApiRequest {
        ApiRequest::new(method, path).param("sessionId", self.session.session_id)
    }

    pub(crate) fn call(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError> {
        self.shared.call(request)
    }

    /// Paged collection over a list endpoint.
    ///
    /// Each page is one authenticated GET with `start` and `count`; every raw
    /// entry is mapped to a handle bound to this context.
    pub(crate) fn paged<R, T, M>(&self, path: String, map: M) -> PagedCollection<T, ClientError>
    where
        R: DeserializeOwned,
        T: Identified,
        M: Fn(R, &Self) -> Result<T, ClientError> + Send + 'static,
    {
        let ctx = self.clone();
        PagedCollection::new(move |start| {
            let request = ctx
                .authed(Method::Get, path.as_str())
                .param("start", start)
                .param("count", ctx.shared.config.page_size);
            let page: Vec<R> = ctx.call(&request)?.json()?;
            page.into_iter().map(|raw| map(raw, &ctx)).collect()
        })
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("base_url", &self.shared.config.base_url)
            .field("session", &self.session)
            .finish()
    }
}

//! Connection and login.

use std::{fmt, sync::Arc};

use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    config::ClientConfig,
    context::{Context, Session, Shared},
    error::ClientError,
    transport::{ApiRequest, HttpTransport, Method, Transport},
};

/// How to identify the user logging in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserRef {
    /// By id
    Id(Uuid),
    /// By user name, resolved with `/Subtext/user/queryidbyname`
    Name(String),
}

impl From<Uuid> for UserRef {
    fn from(id: Uuid) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for UserRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for UserRef {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

/// Instance information returned by `GET /Subtext`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    /// Instance name, the domain part of OpenPGP user ids
    pub instance_name: String,
    /// Instance id
    pub instance_id: Uuid,
    /// Any other advertised fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Unauthenticated connection to a Subtext instance.
///
/// Cheap to clone. Produces a [`Context`] per login.
#[derive(Clone)]
pub struct Client {
    shared: Arc<Shared>,
}

impl Client {
    /// Connect over HTTP.
    ///
    /// # Errors
    ///
    /// - `Transport` if the instance cannot be reached
    /// - `NotSubtext` if the root endpoint does not identify as Subtext
    pub fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        let transport = HttpTransport::new(&config)?;
        Self::with_transport(config, transport)
    }

    /// Connect over a caller-supplied transport.
    pub fn with_transport(
        config: ClientConfig,
        transport: impl Transport + 'static,
    ) -> Result<Self, ClientError> {
        let shared = Arc::new(Shared { transport: Box::new(transport), config });

        let root = shared.call(&ApiRequest::new(Method::Get, "/"))?;
        if !root.text().trim().eq_ignore_ascii_case("subtext") {
            return Err(ClientError::NotSubtext { url: shared.config.base_url.clone() });
        }

        tracing::debug!(base_url = %shared.config.base_url, "connected");
        Ok(Self { shared })
    }

    /// Client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    /// Server information.
    pub fn about(&self) -> Result<ServerInfo, ClientError> {
        self.shared.call(&ApiRequest::new(Method::Get, "/Subtext"))?.json()
    }

    /// Look up a user id by name.
    pub fn query_id_by_name(&self, name: &str) -> Result<Uuid, ClientError> {
        let request = ApiRequest::new(Method::Get, "/Subtext/user/queryidbyname").param("name", name);
        self.shared.call(&request)?.json()
    }

    /// Log in and obtain a session context.
    ///
    /// # Errors
    ///
    /// - `Api` with `AuthError`, `UserLocked`, ... as reported by the server
    pub fn login(&self, user: impl Into<UserRef>, password: &str) -> Result<Context, ClientError> {
        let user_id = match user.into() {
            UserRef::Id(id) => id,
            UserRef::Name(name) => self.query_id_by_name(&name)?,
        };

        let request = ApiRequest::new(Method::Post, "/Subtext/user/login")
            .param("userId", user_id)
            .param("password", password);
        let session_id: Uuid = self.shared.call(&request)?.json()?;

        tracing::info!(%user_id, "logged in");
        Ok(Context::new(Arc::clone(&self.shared), Session { session_id, user_id }))
    }

    /// Rebuild a context from a previously obtained session.
    pub fn resume(&self, session: Session) -> Context {
        Context::new(Arc::clone(&self.shared), session)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client").field("base_url", &self.shared.config.base_url).finish()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::transport::ApiResponse;

    struct Root(u16);

    impl Transport for Root {
        fn send(&self, _request: &ApiRequest) -> Result<ApiResponse, ClientError> {
            Ok(ApiResponse {
                status: self.0,
                content_type: Some("text/plain".to_string()),
                metadata: None,
                body: Bytes::from_static(b"Subtext\n"),
            })
        }
    }

    #[test]
    fn any_success_status_on_root_connects() {
        assert!(Client::with_transport(ClientConfig::new("sim://a"), Root(200)).is_ok());
        assert!(Client::with_transport(ClientConfig::new("sim://a"), Root(203)).is_ok());
        assert!(Client::with_transport(ClientConfig::new("sim://a"), Root(500)).is_err());
    }

    #[test]
    fn server_info_keeps_unknown_fields() {
        let info: ServerInfo = serde_json::from_str(
            r#"{"instanceName":"chat.example.org",
                "instanceId":"6ba7b810-9dad-11d1-80b4-00c04fd430c8",
                "version":"0.4.1"}"#,
        )
        .expect("decode");

        assert_eq!(info.instance_name, "chat.example.org");
        assert_eq!(info.extra.get("version"), Some(&Value::from("0.4.1")));
    }

    #[test]
    fn user_ref_conversions() {
        let id = Uuid::from_u128(7);
        assert_eq!(UserRef::from(id), UserRef::Id(id));
        assert_eq!(UserRef::from("testing"), UserRef::Name("testing".to_string()));
    }
}

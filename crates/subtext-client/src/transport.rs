//! HTTP transport abstraction.
//!
//! The `Transport` trait decouples the REST glue from the network. The
//! production implementation is [`HttpTransport`] (blocking reqwest); tests
//! plug in an in-memory server instead.
//!
//! A transport only fails for transport-level reasons. Non-2xx responses are
//! returned as ordinary [`ApiResponse`] values and classified by the caller.

use std::fmt;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::{config::ClientConfig, error::ClientError};

/// Header carrying JSON message metadata on single-message fetches.
pub const METADATA_HEADER: &str = "X-Metadata";

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        })
    }
}

/// A request relative to the instance base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    /// HTTP method
    pub method: Method,
    /// Path starting with `/`
    pub path: String,
    /// Query parameters in insertion order
    pub query: Vec<(String, String)>,
    /// Raw request body
    pub body: Option<Bytes>,
}

impl ApiRequest {
    /// Request without query or body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), query: Vec::new(), body: None }
    }

    /// Append a query parameter.
    #[must_use]
    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Append a query parameter if `value` is present.
    #[must_use]
    pub fn param_opt(self, key: &str, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.param(key, value),
            None => self,
        }
    }

    /// Set the raw body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Value of the first query parameter named `key`.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

/// A response as seen by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// `Content-Type` header
    pub content_type: Option<String>,
    /// `X-Metadata` header
    pub metadata: Option<String>,
    /// Raw body
    pub body: Bytes,
}

impl ApiResponse {
    /// Successful response with a JSON body.
    pub fn json_body(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type: Some("application/json".to_string()),
            metadata: None,
            body: body.into(),
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        self.status / 100 == 2
    }

    /// Returns true if the body is declared as JSON.
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .is_some_and(|ct| ct.trim().eq_ignore_ascii_case("application/json"))
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Body as lossy UTF-8 text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Sends requests to a Subtext instance.
///
/// Implementations must be shareable across threads: a single transport
/// backs every handle derived from a [`Context`](crate::Context).
pub trait Transport: Send + Sync {
    /// Perform one request.
    ///
    /// Returns `Err` only if no response was obtained. Cancellation and
    /// timeouts are the implementation's concern.
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError>;
}

/// Blocking reqwest transport.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpTransport {
    /// Build a transport from configuration.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client, base_url: config.normalized_base_url().to_string() })
    }

    /// Base URL requests are resolved against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport").field("base_url", &self.base_url).finish_non_exhaustive()
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };
        let url = format!("{}{}", self.base_url, request.path);

        let mut builder = self.client.request(method, &url).query(&request.query);
        if let Some(body) = &request.body {
            builder = builder.body(body.to_vec());
        }

        let response = builder.send()?;

        let status = response.status().as_u16();
        let header = |name: &str| {
            response.headers().get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
        };
        let content_type = header(reqwest::header::CONTENT_TYPE.as_str());
        let metadata = header(METADATA_HEADER);
        let body = response.bytes()?;

        Ok(ApiResponse { status, content_type, metadata, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder_keeps_param_order() {
        let request = ApiRequest::new(Method::Get, "/Subtext/user/x/friends")
            .param("sessionId", "s")
            .param("start", 0)
            .param_opt("count", None::<u32>)
            .param_opt("other", Some("y"));

        assert_eq!(
            request.query,
            vec![
                ("sessionId".to_string(), "s".to_string()),
                ("start".to_string(), "0".to_string()),
                ("other".to_string(), "y".to_string()),
            ]
        );
        assert_eq!(request.query_value("start"), Some("0"));
    }

    #[test]
    fn json_content_type_with_charset() {
        let mut response = ApiResponse::json_body(200, "[]");
        response.content_type = Some("application/json; charset=utf-8".to_string());
        assert!(response.is_json());

        response.content_type = Some("text/plain".to_string());
        assert!(!response.is_json());
    }

    #[test]
    fn success_range() {
        assert!(ApiResponse::json_body(204, "").is_success());
        assert!(!ApiResponse::json_body(302, "").is_success());
        assert!(!ApiResponse::json_body(404, "").is_success());
    }

    #[test]
    fn http_transport_strips_trailing_slash() {
        let transport =
            HttpTransport::new(&ClientConfig::new("http://localhost:5000/")).expect("transport");
        assert_eq!(transport.base_url(), "http://localhost:5000");
    }
}

//! Server-reported errors.
//!
//! The server names its errors with a literal string (the `error` field of a
//! JSON error body). Known names map to an [`ApiErrorKind`]; anything else
//! becomes [`ApiErrorKind::Other`] with the name preserved, so newer servers
//! keep working against older clients.

use chrono::{DateTime, FixedOffset};
use serde_json::{Map, Value};

use crate::transport::ApiResponse;

/// Closed set of error kinds the server is known to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    /// Generic authentication failure.
    AuthError,
    /// Admin already has an active session elsewhere.
    AdminLoggedIn,
    /// Admin has logged out.
    AdminLoggedOut,
    /// Wrong answer to the admin challenge.
    IncorrectResponse,
    /// Account is locked, see [`ApiError::lock_expiry`].
    UserLocked,
    /// Session has expired.
    SessionExpired,
    /// Caller may not perform this action.
    NotAuthorized,
    /// No object with the given id exists.
    NoObjectWithId,
    /// Object is marked deleted.
    ObjectDeleted,
    /// Request is malformed.
    InvalidRequest,
    /// User or board name is taken.
    NameTaken,
    /// User or board name is not valid.
    NameInvalid,
    /// Password does not meet server requirements.
    PasswordInsecure,
    /// User is already blocked.
    AlreadyBlocked,
    /// Users are already friends.
    AlreadyFriends,
    /// Friend request already sent.
    AlreadySent,
    /// User is already a board member.
    AlreadyAdded,
    /// Users are not friends.
    NotFriends,
    /// Unrecognized error name.
    Other,
}

/// Lookup table from wire name to kind.
const ERROR_NAMES: [(&str, ApiErrorKind); 18] = [
    ("AuthError", ApiErrorKind::AuthError),
    ("AdminLoggedIn", ApiErrorKind::AdminLoggedIn),
    ("AdminLoggedOut", ApiErrorKind::AdminLoggedOut),
    ("IncorrectResponse", ApiErrorKind::IncorrectResponse),
    ("UserLocked", ApiErrorKind::UserLocked),
    ("SessionExpired", ApiErrorKind::SessionExpired),
    ("NotAuthorized", ApiErrorKind::NotAuthorized),
    ("NoObjectWithId", ApiErrorKind::NoObjectWithId),
    ("ObjectDeleted", ApiErrorKind::ObjectDeleted),
    ("InvalidRequest", ApiErrorKind::InvalidRequest),
    ("NameTaken", ApiErrorKind::NameTaken),
    ("NameInvalid", ApiErrorKind::NameInvalid),
    ("PasswordInsecure", ApiErrorKind::PasswordInsecure),
    ("AlreadyBlocked", ApiErrorKind::AlreadyBlocked),
    ("AlreadyFriends", ApiErrorKind::AlreadyFriends),
    ("AlreadySent", ApiErrorKind::AlreadySent),
    ("AlreadyAdded", ApiErrorKind::AlreadyAdded),
    ("NotFriends", ApiErrorKind::NotFriends),
];

impl ApiErrorKind {
    /// Kind for a wire error name. Unknown names map to `Other`.
    pub fn from_name(name: &str) -> Self {
        ERROR_NAMES.iter().find(|(known, _)| *known == name).map_or(Self::Other, |(_, kind)| *kind)
    }

    /// Wire name of this kind, `None` for `Other`.
    pub fn name(self) -> Option<&'static str> {
        ERROR_NAMES.iter().find(|(_, kind)| *kind == self).map(|(name, _)| *name)
    }
}

/// Error reported by the server for a non-2xx response.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{name} (HTTP {status}){}", message_suffix(.data))]
pub struct ApiError {
    /// Classified error kind.
    pub kind: ApiErrorKind,
    /// Literal error name, or the raw body for non-JSON responses.
    pub name: String,
    /// HTTP status code.
    pub status: u16,
    /// Remaining fields of the error body, keys in snake_case.
    pub data: Map<String, Value>,
}

impl ApiError {
    /// Build an error from a non-2xx response.
    ///
    /// JSON bodies contribute their `error` field as the name and everything
    /// else as data. Other bodies become the name verbatim.
    pub fn from_response(response: &ApiResponse) -> Self {
        let status = response.status;

        if response.is_json() {
            if let Ok(Value::Object(mut fields)) = serde_json::from_slice::<Value>(&response.body)
            {
                let name = match fields.remove("error") {
                    Some(Value::String(name)) => name,
                    Some(other) => other.to_string(),
                    None => String::new(),
                };
                let data = fields.into_iter().map(|(key, value)| (snake_case(&key), value)).collect();
                return Self { kind: ApiErrorKind::from_name(&name), name, status, data };
            }
        }

        let name = String::from_utf8_lossy(&response.body).trim().to_string();
        Self { kind: ApiErrorKind::from_name(&name), name, status, data: Map::new() }
    }

    /// Human-readable message, if the server sent one.
    pub fn message(&self) -> Option<&str> {
        self.data.get("message").and_then(Value::as_str)
    }

    /// When a locked account unlocks.
    ///
    /// Only present on `UserLocked` errors carrying a `lockExpiry` timestamp.
    pub fn lock_expiry(&self) -> Option<DateTime<FixedOffset>> {
        if self.kind != ApiErrorKind::UserLocked {
            return None;
        }
        let raw = self.data.get("lock_expiry")?.as_str()?;
        DateTime::parse_from_rfc3339(raw).ok()
    }

    /// Returns true for 5xx responses.
    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }
}

/// `": {message}"` when the error body carried a message.
fn message_suffix(data: &Map<String, Value>) -> String {
    data.get("message").and_then(Value::as_str).map(|m| format!(": {m}")).unwrap_or_default()
}

/// `lockExpiry` -> `lock_expiry`
fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn json_response(status: u16, body: &'static str) -> ApiResponse {
        ApiResponse {
            status,
            content_type: Some("application/json".to_string()),
            metadata: None,
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    #[test]
    fn every_known_name_round_trips() {
        for (name, kind) in ERROR_NAMES {
            assert_eq!(ApiErrorKind::from_name(name), kind);
            assert_eq!(kind.name(), Some(name));
        }
    }

    #[test]
    fn unknown_name_is_other() {
        assert_eq!(ApiErrorKind::from_name("QuotaExceeded"), ApiErrorKind::Other);
        assert_eq!(ApiErrorKind::Other.name(), None);
    }

    #[test]
    fn json_body_is_classified() {
        let response =
            json_response(403, r#"{"error":"NotAuthorized","message":"not a board member"}"#);
        let err = ApiError::from_response(&response);

        assert_eq!(err.kind, ApiErrorKind::NotAuthorized);
        assert_eq!(err.status, 403);
        assert_eq!(err.message(), Some("not a board member"));
        assert_eq!(err.to_string(), "NotAuthorized (HTTP 403): not a board member");
    }

    #[test]
    fn data_keys_become_snake_case() {
        let response = json_response(400, r#"{"error":"NameTaken","takenBy":"abc","x":1}"#);
        let err = ApiError::from_response(&response);

        assert!(err.data.contains_key("taken_by"));
        assert!(err.data.contains_key("x"));
        assert!(!err.data.contains_key("error"));
        assert_eq!(err.to_string(), "NameTaken (HTTP 400)");
    }

    #[test]
    fn user_locked_exposes_expiry() {
        let response =
            json_response(401, r#"{"error":"UserLocked","lockExpiry":"2026-10-15T12:00:00+00:00"}"#);
        let err = ApiError::from_response(&response);

        let expiry = err.lock_expiry().expect("expiry");
        assert_eq!(expiry.to_rfc3339(), "2026-10-15T12:00:00+00:00");
    }

    #[test]
    fn lock_expiry_only_for_user_locked() {
        let response =
            json_response(401, r#"{"error":"AuthError","lockExpiry":"2026-10-15T12:00:00+00:00"}"#);
        assert!(ApiError::from_response(&response).lock_expiry().is_none());
    }

    #[test]
    fn plain_body_becomes_name() {
        let response = ApiResponse {
            status: 502,
            content_type: Some("text/plain".to_string()),
            metadata: None,
            body: Bytes::from_static(b"Bad Gateway\n"),
        };
        let err = ApiError::from_response(&response);

        assert_eq!(err.kind, ApiErrorKind::Other);
        assert_eq!(err.name, "Bad Gateway");
        assert!(err.is_server_error());
    }

    #[test]
    fn malformed_json_falls_back_to_text() {
        let err = ApiError::from_response(&json_response(400, "SessionExpired"));
        assert_eq!(err.kind, ApiErrorKind::SessionExpired);
    }

    #[test]
    fn snake_case_conversion() {
        assert_eq!(snake_case("lockExpiry"), "lock_expiry");
        assert_eq!(snake_case("ID"), "i_d");
        assert_eq!(snake_case("plain"), "plain");
    }
}

//! In-memory Subtext server.
//!
//! [`SimServer`] implements the REST surface the client speaks, backed by
//! plain vectors so tests can seed state, mutate lists between page fetches
//! and inject failures. [`SharedSimServer`] is the cloneable handle that
//! implements [`Transport`]: one clone goes into the client, the test keeps
//! another.
//!
//! # Determinism
//!
//! Ids come from a seeded `ChaCha8Rng` and timestamps from a logical clock
//! that ticks once per created object, so the same seed and the same calls
//! always produce the same responses.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use base64::{Engine, engine::general_purpose::STANDARD};
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::{Value, json};
use subtext_client::{ApiRequest, ApiResponse, ClientError, METADATA_HEADER, Method, Transport};
use uuid::Uuid;

/// Logical clock origin (2026-09-21T00:00:00Z).
const EPOCH_SECS: i64 = 1_790_000_000;

/// Simulation configuration.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Upper bound on page length, whatever `count` the client asks for
    pub page_limit: usize,
    /// Whether message listings carry base64 payloads
    pub inline_content: bool,
    /// RNG seed for ids
    pub seed: u64,
    /// Name reported by `GET /Subtext`
    pub instance_name: String,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            page_limit: 100,
            inline_content: true,
            seed: 0,
            instance_name: "sim.subtext".to_string(),
        }
    }
}

/// A stored board message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimMessage {
    /// Message id
    pub id: Uuid,
    /// Author id
    pub author: Uuid,
    /// Creation time
    pub timestamp: DateTime<Utc>,
    /// Type tag as posted
    pub type_tag: String,
    /// Raw payload as posted
    pub payload: Bytes,
    /// Generated by the server rather than posted by a user
    pub system: bool,
}

#[derive(Debug, Clone)]
struct SimUser {
    id: Uuid,
    name: String,
    password: String,
    presence: String,
    status: Option<String>,
    locked_until: Option<DateTime<Utc>>,
    friends: Vec<Uuid>,
    blocked: Vec<Uuid>,
    friend_requests: Vec<Uuid>,
    keys: Vec<Uuid>,
}

#[derive(Debug, Clone)]
struct SimKey {
    id: Uuid,
    published: DateTime<Utc>,
    data: Bytes,
}

#[derive(Debug, Clone)]
struct SimBoard {
    id: Uuid,
    name: String,
    owner: Uuid,
    direct: bool,
    encryption: &'static str,
    last_update: DateTime<Utc>,
    members: Vec<Uuid>,
    messages: Vec<SimMessage>,
}

/// A rejected request, rendered as a JSON error body.
#[derive(Debug)]
struct Rejection {
    status: u16,
    name: &'static str,
    message: String,
    extra: Vec<(&'static str, Value)>,
}

impl Rejection {
    fn new(status: u16, name: &'static str, message: impl Into<String>) -> Self {
        Self { status, name, message: message.into(), extra: Vec::new() }
    }

    fn with(mut self, key: &'static str, value: Value) -> Self {
        self.extra.push((key, value));
        self
    }

    fn not_found(what: &str) -> Self {
        Self::new(404, "NoObjectWithId", format!("no {what} with that id"))
    }

    fn not_authorized() -> Self {
        Self::new(403, "NotAuthorized", "not authorized")
    }

    fn invalid(message: impl Into<String>) -> Self {
        Self::new(400, "InvalidRequest", message)
    }

    fn into_response(self) -> ApiResponse {
        let mut body = serde_json::Map::new();
        body.insert("error".to_string(), Value::from(self.name));
        body.insert("message".to_string(), Value::from(self.message));
        for (key, value) in self.extra {
            body.insert(key.to_string(), value);
        }
        ApiResponse::json_body(self.status, Value::Object(body).to_string())
    }
}

type Reply = Result<ApiResponse, Rejection>;

fn ok_json(value: &Value) -> Reply {
    Ok(ApiResponse::json_body(200, value.to_string()))
}

fn ok_empty() -> Reply {
    Ok(ApiResponse { status: 204, content_type: None, metadata: None, body: Bytes::new() })
}

fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_id(raw: &str, what: &str) -> Result<Uuid, Rejection> {
    Uuid::parse_str(raw).map_err(|_| Rejection::not_found(what))
}

/// In-memory server state.
#[derive(Debug)]
pub struct SimServer {
    config: SimConfig,
    rng: ChaCha8Rng,
    instance_id: Uuid,
    clock: i64,
    users: Vec<SimUser>,
    keys: Vec<SimKey>,
    boards: Vec<SimBoard>,
    sessions: HashMap<Uuid, Uuid>,
    failures: VecDeque<(u16, &'static str)>,
    requests: Vec<ApiRequest>,
}

impl SimServer {
    /// Create an empty server.
    pub fn new(config: SimConfig) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let instance_id = uuid::Builder::from_random_bytes(rng.r#gen()).into_uuid();
        Self {
            config,
            rng,
            instance_id,
            clock: 0,
            users: Vec::new(),
            keys: Vec::new(),
            boards: Vec::new(),
            sessions: HashMap::new(),
            failures: VecDeque::new(),
            requests: Vec::new(),
        }
    }

    /// Simulation configuration.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Id reported by `GET /Subtext`.
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Change the page limit of subsequent list requests.
    pub fn set_page_limit(&mut self, page_limit: usize) {
        self.config.page_limit = page_limit;
    }

    fn next_id(&mut self) -> Uuid {
        uuid::Builder::from_random_bytes(self.rng.r#gen()).into_uuid()
    }

    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += 1;
        DateTime::from_timestamp(EPOCH_SECS + self.clock, 0).unwrap_or_default()
    }

    /// Register a user.
    pub fn add_user(&mut self, name: &str, password: &str) -> Uuid {
        let id = self.next_id();
        self.users.push(SimUser {
            id,
            name: name.to_string(),
            password: password.to_string(),
            presence: "Offline".to_string(),
            status: None,
            locked_until: None,
            friends: Vec::new(),
            blocked: Vec::new(),
            friend_requests: Vec::new(),
            keys: Vec::new(),
        });
        id
    }

    /// Lock a user's account until `until`.
    pub fn lock_user(&mut self, user: Uuid, until: DateTime<Utc>) {
        if let Some(u) = self.user_mut(user) {
            u.locked_until = Some(until);
        }
    }

    /// Make two users friends.
    pub fn make_friends(&mut self, a: Uuid, b: Uuid) {
        for (user, friend) in [(a, b), (b, a)] {
            if let Some(u) = self.user_mut(user) {
                if !u.friends.contains(&friend) {
                    u.friends.push(friend);
                }
            }
        }
    }

    /// Record a pending friend request from `from` to `to`.
    pub fn add_friend_request(&mut self, from: Uuid, to: Uuid) {
        if let Some(u) = self.user_mut(to) {
            if !u.friend_requests.contains(&from) {
                u.friend_requests.push(from);
            }
        }
    }

    /// Publish a key for a user.
    pub fn add_key(&mut self, user: Uuid, data: impl Into<Bytes>) -> Uuid {
        let id = self.next_id();
        let published = self.tick();
        self.keys.push(SimKey { id, published, data: data.into() });
        if let Some(u) = self.user_mut(user) {
            u.keys.push(id);
        }
        id
    }

    /// Create a board. The owner is always its first member.
    pub fn add_board(&mut self, name: &str, owner: Uuid, members: &[Uuid]) -> Uuid {
        let id = self.next_id();
        let last_update = self.tick();
        let mut all = vec![owner];
        all.extend(members.iter().copied().filter(|m| *m != owner));
        self.boards.push(SimBoard {
            id,
            name: name.to_string(),
            owner,
            direct: false,
            encryption: "None",
            last_update,
            members: all,
            messages: Vec::new(),
        });
        id
    }

    /// Create a direct board between two users.
    pub fn add_direct_board(&mut self, a: Uuid, b: Uuid) -> Uuid {
        let id = self.add_board("", a, &[b]);
        if let Some(board) = self.board_mut(id) {
            board.direct = true;
        }
        id
    }

    /// Append a server-generated message to a board.
    pub fn post_system_message(
        &mut self,
        board: Uuid,
        author: Uuid,
        type_tag: &str,
        payload: impl Into<Bytes>,
    ) -> Uuid {
        let id = self.post_message(board, author, type_tag, payload);
        if let Some(m) = self.board_mut(board).and_then(|b| b.messages.iter_mut().find(|m| m.id == id)) {
            m.system = true;
        }
        id
    }

    /// Append a message to a board.
    pub fn post_message(
        &mut self,
        board: Uuid,
        author: Uuid,
        type_tag: &str,
        payload: impl Into<Bytes>,
    ) -> Uuid {
        let index = self.board(board).map_or(0, |b| b.messages.len());
        self.insert_message(board, index, author, type_tag, payload)
    }

    /// Insert a message at `index` (clamped to the list length).
    ///
    /// Inserting ahead of a running traversal's cursor shifts already
    /// returned items into the next page.
    pub fn insert_message(
        &mut self,
        board: Uuid,
        index: usize,
        author: Uuid,
        type_tag: &str,
        payload: impl Into<Bytes>,
    ) -> Uuid {
        let id = self.next_id();
        let timestamp = self.tick();
        let message = SimMessage {
            id,
            author,
            timestamp,
            type_tag: type_tag.to_string(),
            payload: payload.into(),
            system: false,
        };
        if let Some(b) = self.board_mut(board) {
            let index = index.min(b.messages.len());
            b.messages.insert(index, message);
            b.last_update = timestamp;
        }
        id
    }

    /// Remove the message at `index`, if any.
    pub fn remove_message(&mut self, board: Uuid, index: usize) -> Option<SimMessage> {
        let b = self.board_mut(board)?;
        (index < b.messages.len()).then(|| b.messages.remove(index))
    }

    /// Insert a member at `index` (clamped to the list length).
    pub fn insert_member(&mut self, board: Uuid, index: usize, user: Uuid) {
        if let Some(b) = self.board_mut(board) {
            let index = index.min(b.members.len());
            b.members.insert(index, user);
        }
    }

    /// Snapshot of a board's messages in server order.
    pub fn messages(&self, board: Uuid) -> Vec<SimMessage> {
        self.board(board).map(|b| b.messages.clone()).unwrap_or_default()
    }

    /// Friends of a user in server order.
    pub fn friends_of(&self, user: Uuid) -> Vec<Uuid> {
        self.user(user).map(|u| u.friends.clone()).unwrap_or_default()
    }

    /// Users blocked by a user.
    pub fn blocked_by(&self, user: Uuid) -> Vec<Uuid> {
        self.user(user).map(|u| u.blocked.clone()).unwrap_or_default()
    }

    /// Pending friend requests addressed to a user.
    pub fn friend_requests_of(&self, user: Uuid) -> Vec<Uuid> {
        self.user(user).map(|u| u.friend_requests.clone()).unwrap_or_default()
    }

    /// Current presence of a user.
    pub fn presence_of(&self, user: Uuid) -> Option<String> {
        self.user(user).map(|u| u.presence.clone())
    }

    /// Raw key material.
    pub fn key_data(&self, key: Uuid) -> Option<Bytes> {
        self.keys.iter().find(|k| k.id == key).map(|k| k.data.clone())
    }

    /// Keys published by a user, oldest first.
    pub fn keys_of(&self, user: Uuid) -> Vec<Uuid> {
        self.user(user).map(|u| u.keys.clone()).unwrap_or_default()
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Reject the next request with `status` and error name `name`.
    ///
    /// Queued failures are consumed in order, one per request.
    pub fn fail_next(&mut self, status: u16, name: &'static str) {
        self.failures.push_back((status, name));
    }

    /// Every request received so far.
    pub fn requests(&self) -> &[ApiRequest] {
        &self.requests
    }

    /// `start` values of the GET requests made to `path`, in order.
    pub fn page_starts(&self, path: &str) -> Vec<u64> {
        self.requests
            .iter()
            .filter(|r| r.method == Method::Get && r.path == path)
            .filter_map(|r| r.query_value("start").and_then(|s| s.parse().ok()))
            .collect()
    }

    fn user(&self, id: Uuid) -> Option<&SimUser> {
        self.users.iter().find(|u| u.id == id)
    }

    fn user_mut(&mut self, id: Uuid) -> Option<&mut SimUser> {
        self.users.iter_mut().find(|u| u.id == id)
    }

    fn board(&self, id: Uuid) -> Option<&SimBoard> {
        self.boards.iter().find(|b| b.id == id)
    }

    fn board_mut(&mut self, id: Uuid) -> Option<&mut SimBoard> {
        self.boards.iter_mut().find(|b| b.id == id)
    }

    /// Handle one request.
    pub fn handle(&mut self, request: &ApiRequest) -> ApiResponse {
        self.requests.push(request.clone());

        if let Some((status, name)) = self.failures.pop_front() {
            tracing::debug!(path = %request.path, status, name, "injected failure");
            return Rejection::new(status, name, "injected failure").into_response();
        }

        self.route(request).unwrap_or_else(Rejection::into_response)
    }

    fn route(&mut self, request: &ApiRequest) -> Reply {
        let path = request.path.trim_matches('/');
        let segments: Vec<&str> = path.split('/').collect();

        match (request.method, segments.as_slice()) {
            (Method::Get, [""]) => Ok(ApiResponse {
                status: 200,
                content_type: Some("text/plain".to_string()),
                metadata: None,
                body: Bytes::from_static(b"Subtext"),
            }),
            (Method::Get, ["Subtext"]) => ok_json(&json!({
                "instanceName": self.config.instance_name,
                "instanceId": self.instance_id,
            })),
            (Method::Get, ["Subtext", "user", "queryidbyname"]) => self.query_id_by_name(request),
            (Method::Post, ["Subtext", "user", "login"]) => self.login(request),
            _ => {
                let caller = self.authenticate(request)?;
                self.route_authed(request, caller, &segments)
            },
        }
    }

    fn route_authed(&mut self, request: &ApiRequest, caller: Uuid, segments: &[&str]) -> Reply {
        match (request.method, segments) {
            (Method::Post, ["Subtext", "user", "logout"]) => {
                self.sessions.retain(|_, user| *user != caller);
                ok_empty()
            },
            (Method::Get, ["Subtext", "user", id]) => self.user_info(parse_id(id, "user")?),
            (Method::Get, ["Subtext", "user", id, list @ ("friends" | "blocked" | "friendrequests")]) => {
                let id = parse_id(id, "user")?;
                if id != caller {
                    return Err(Rejection::not_authorized());
                }
                let user = self.user(id).ok_or_else(|| Rejection::not_found("user"))?;
                let ids = match *list {
                    "friends" => &user.friends,
                    "blocked" => &user.blocked,
                    _ => &user.friend_requests,
                };
                let page = self.page(request, ids)?;
                ok_json(&json!(page))
            },
            (Method::Delete, ["Subtext", "user", id, "friends", other]) => {
                self.unfriend(caller, parse_id(id, "user")?, parse_id(other, "user")?)
            },
            (Method::Post, ["Subtext", "user", id, "blocked"]) => {
                let blocked = request
                    .query_value("blockedId")
                    .ok_or_else(|| Rejection::invalid("missing blockedId"))?;
                self.block(caller, parse_id(id, "user")?, parse_id(blocked, "user")?)
            },
            (Method::Delete, ["Subtext", "user", id, "blocked", other]) => {
                self.unblock(caller, parse_id(id, "user")?, parse_id(other, "user")?)
            },
            (Method::Post, ["Subtext", "user", id, "friendrequests"]) => {
                self.send_friend_request(caller, parse_id(id, "user")?)
            },
            (Method::Post | Method::Delete, ["Subtext", "user", id, "friendrequests", other]) => {
                let accept = request.method == Method::Post;
                self.answer_friend_request(caller, parse_id(id, "user")?, parse_id(other, "user")?, accept)
            },
            (Method::Get, ["Subtext", "user", id, "keys"]) => self.list_keys(request, parse_id(id, "user")?),
            (Method::Post, ["Subtext", "user", id, "keys"]) => {
                let id = parse_id(id, "user")?;
                if id != caller {
                    return Err(Rejection::not_authorized());
                }
                let data = request.body.clone().unwrap_or_default();
                let key = self.add_key(id, data);
                ok_json(&json!(key))
            },
            (Method::Put, ["Subtext", "user", id, "presence"]) => {
                self.set_presence(request, caller, parse_id(id, "user")?)
            },
            (Method::Get, ["Subtext", "key", id]) => {
                let data = self.key_data(parse_id(id, "key")?).ok_or_else(|| Rejection::not_found("key"))?;
                Ok(ApiResponse {
                    status: 200,
                    content_type: Some("application/octet-stream".to_string()),
                    metadata: None,
                    body: data,
                })
            },
            (Method::Get, ["Subtext", "board"]) => self.list_boards(request, caller),
            (Method::Get, ["Subtext", "board", id]) => {
                let board = self.member_board(caller, parse_id(id, "board")?)?;
                ok_json(&board_json(board))
            },
            (Method::Get, ["Subtext", "board", id, "members"]) => {
                let board = self.member_board(caller, parse_id(id, "board")?)?;
                let page = self.page(request, &board.members)?;
                ok_json(&json!(page))
            },
            (Method::Get, ["Subtext", "board", id, "messages"]) => {
                let board = self.member_board(caller, parse_id(id, "board")?)?;
                let inline = self.config.inline_content;
                let page = self.page(request, &board.messages)?;
                let entries: Vec<Value> = page.iter().map(|m| message_json(m, inline)).collect();
                ok_json(&Value::Array(entries))
            },
            (Method::Post, ["Subtext", "board", id, "messages"]) => {
                self.send_message(request, caller, parse_id(id, "board")?)
            },
            (Method::Get, ["Subtext", "board", id, "messages", message]) => {
                let board = self.member_board(caller, parse_id(id, "board")?)?;
                let message_id = parse_id(message, "message")?;
                let message = board
                    .messages
                    .iter()
                    .find(|m| m.id == message_id)
                    .ok_or_else(|| Rejection::not_found("message"))?;
                let metadata = json!({
                    "type": message.type_tag,
                    "authorId": message.author,
                    "timestamp": timestamp(message.timestamp),
                    "isSystem": message.system,
                });
                Ok(ApiResponse {
                    status: 200,
                    content_type: Some("application/octet-stream".to_string()),
                    metadata: Some(metadata.to_string()),
                    body: message.payload.clone(),
                })
            },
            _ => Err(Rejection::invalid(format!("no route for {} {}", request.method, request.path))),
        }
    }

    fn page<'a, T>(&self, request: &ApiRequest, items: &'a [T]) -> Result<&'a [T], Rejection> {
        let start: usize = match request.query_value("start") {
            Some(raw) => raw.parse().map_err(|_| Rejection::invalid("bad start"))?,
            None => 0,
        };
        let count: usize = match request.query_value("count") {
            Some(raw) => raw.parse().map_err(|_| Rejection::invalid("bad count"))?,
            None => self.config.page_limit,
        };
        let count = count.min(self.config.page_limit);

        let from = start.min(items.len());
        let to = start.saturating_add(count).min(items.len());
        Ok(&items[from..to])
    }

    fn authenticate(&self, request: &ApiRequest) -> Result<Uuid, Rejection> {
        request
            .query_value("sessionId")
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .and_then(|session| self.sessions.get(&session).copied())
            .ok_or_else(|| Rejection::new(401, "SessionExpired", "session expired"))
    }

    fn query_id_by_name(&self, request: &ApiRequest) -> Reply {
        let name = request.query_value("name").ok_or_else(|| Rejection::invalid("missing name"))?;
        let user = self.users.iter().find(|u| u.name == name).ok_or_else(|| Rejection::not_found("user"))?;
        ok_json(&json!(user.id))
    }

    fn login(&mut self, request: &ApiRequest) -> Reply {
        let user_id = request
            .query_value("userId")
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .ok_or_else(|| Rejection::new(401, "AuthError", "invalid credentials"))?;
        let password = request.query_value("password").unwrap_or_default();
        let now = DateTime::from_timestamp(EPOCH_SECS + self.clock, 0).unwrap_or_default();

        let user = self.user(user_id).ok_or_else(|| Rejection::new(401, "AuthError", "invalid credentials"))?;
        if let Some(until) = user.locked_until.filter(|until| *until > now) {
            return Err(Rejection::new(403, "UserLocked", "account locked")
                .with("lockExpiry", Value::from(timestamp(until))));
        }
        if user.password != password {
            return Err(Rejection::new(401, "AuthError", "invalid credentials"));
        }

        let session = self.next_id();
        self.sessions.insert(session, user_id);
        tracing::debug!(%user_id, "session opened");
        ok_json(&json!(session))
    }

    fn user_info(&self, id: Uuid) -> Reply {
        let user = self.user(id).ok_or_else(|| Rejection::not_found("user"))?;
        ok_json(&json!({
            "name": user.name,
            "presence": user.presence,
            "status": user.status,
            "isDeleted": false,
        }))
    }

    fn unfriend(&mut self, caller: Uuid, id: Uuid, other: Uuid) -> Reply {
        if id != caller {
            return Err(Rejection::not_authorized());
        }
        if !self.friends_of(caller).contains(&other) {
            return Err(Rejection::new(400, "NotFriends", "not friends"));
        }
        for (user, friend) in [(caller, other), (other, caller)] {
            if let Some(u) = self.user_mut(user) {
                u.friends.retain(|f| *f != friend);
            }
        }
        ok_empty()
    }

    fn block(&mut self, caller: Uuid, id: Uuid, target: Uuid) -> Reply {
        if id != caller {
            return Err(Rejection::not_authorized());
        }
        if self.user(target).is_none() {
            return Err(Rejection::not_found("user"));
        }
        let user = self.user_mut(caller).ok_or_else(|| Rejection::not_found("user"))?;
        if user.blocked.contains(&target) {
            return Err(Rejection::new(400, "AlreadyBlocked", "already blocked"));
        }
        user.blocked.push(target);
        ok_empty()
    }

    fn unblock(&mut self, caller: Uuid, id: Uuid, target: Uuid) -> Reply {
        if id != caller {
            return Err(Rejection::not_authorized());
        }
        let user = self.user_mut(caller).ok_or_else(|| Rejection::not_found("user"))?;
        let before = user.blocked.len();
        user.blocked.retain(|b| *b != target);
        if user.blocked.len() == before {
            return Err(Rejection::not_found("blocked user"));
        }
        ok_empty()
    }

    fn send_friend_request(&mut self, caller: Uuid, target: Uuid) -> Reply {
        if target == caller {
            return Err(Rejection::invalid("cannot befriend yourself"));
        }
        let user = self.user_mut(target).ok_or_else(|| Rejection::not_found("user"))?;
        if user.friends.contains(&caller) {
            return Err(Rejection::new(400, "AlreadyFriends", "already friends"));
        }
        if user.friend_requests.contains(&caller) {
            return Err(Rejection::new(400, "AlreadySent", "request already sent"));
        }
        user.friend_requests.push(caller);
        ok_empty()
    }

    fn answer_friend_request(&mut self, caller: Uuid, id: Uuid, from: Uuid, accept: bool) -> Reply {
        if id != caller {
            return Err(Rejection::not_authorized());
        }
        let user = self.user_mut(caller).ok_or_else(|| Rejection::not_found("user"))?;
        if !user.friend_requests.contains(&from) {
            return Err(Rejection::not_found("friend request"));
        }
        user.friend_requests.retain(|r| *r != from);
        if accept {
            self.make_friends(caller, from);
        }
        ok_empty()
    }

    fn list_keys(&self, request: &ApiRequest, id: Uuid) -> Reply {
        let user = self.user(id).ok_or_else(|| Rejection::not_found("user"))?;
        let page = self.page(request, &user.keys)?;
        let entries: Vec<Value> = page
            .iter()
            .filter_map(|key| self.keys.iter().find(|k| k.id == *key))
            .map(|k| json!({ "id": k.id, "publishTime": timestamp(k.published) }))
            .collect();
        ok_json(&Value::Array(entries))
    }

    fn set_presence(&mut self, request: &ApiRequest, caller: Uuid, id: Uuid) -> Reply {
        if id != caller {
            return Err(Rejection::not_authorized());
        }
        let presence = request
            .query_value("presence")
            .filter(|p| matches!(*p, "Online" | "Away" | "Busy" | "Offline"))
            .ok_or_else(|| Rejection::invalid("bad presence"))?
            .to_string();
        let status = request.query_value("otherData").map(str::to_string);
        let user = self.user_mut(caller).ok_or_else(|| Rejection::not_found("user"))?;
        user.presence = presence;
        user.status = status;
        ok_empty()
    }

    fn list_boards(&self, request: &ApiRequest, caller: Uuid) -> Reply {
        let visible: Vec<&SimBoard> = self.boards.iter().filter(|b| b.members.contains(&caller)).collect();
        let page = self.page(request, &visible)?;
        let entries: Vec<Value> = page
            .iter()
            .map(|b| {
                let mut entry = board_json(b);
                if let Value::Object(fields) = &mut entry {
                    fields.insert("id".to_string(), json!(b.id));
                }
                entry
            })
            .collect();
        ok_json(&Value::Array(entries))
    }

    fn member_board(&self, caller: Uuid, id: Uuid) -> Result<&SimBoard, Rejection> {
        let board = self.board(id).ok_or_else(|| Rejection::not_found("board"))?;
        if board.members.contains(&caller) { Ok(board) } else { Err(Rejection::not_authorized()) }
    }

    fn send_message(&mut self, request: &ApiRequest, caller: Uuid, board: Uuid) -> Reply {
        self.member_board(caller, board)?;
        let type_tag = request
            .query_value("type")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Rejection::invalid("missing type"))?
            .to_string();
        let payload = request.body.clone().unwrap_or_default();

        let id = self.post_message(board, caller, &type_tag, payload);
        let message = self
            .board(board)
            .and_then(|b| b.messages.iter().find(|m| m.id == id))
            .ok_or_else(|| Rejection::not_found("message"))?;
        ok_json(&message_json(message, false))
    }
}

fn board_json(board: &SimBoard) -> Value {
    json!({
        "name": board.name,
        "ownerId": board.owner,
        "isDirect": board.direct,
        "encryption": board.encryption,
        "lastUpdate": timestamp(board.last_update),
        "lastSignificantUpdate": timestamp(board.last_update),
    })
}

fn message_json(message: &SimMessage, inline: bool) -> Value {
    let mut entry = json!({
        "id": message.id,
        "authorId": message.author,
        "timestamp": timestamp(message.timestamp),
        "type": message.type_tag,
        "isSystem": message.system,
    });
    if inline {
        if let Value::Object(fields) = &mut entry {
            fields.insert("content".to_string(), Value::from(STANDARD.encode(&message.payload)));
        }
    }
    entry
}

/// Cloneable handle to a [`SimServer`].
///
/// Implements [`Transport`], so a clone can be handed to
/// [`Client::with_transport`](subtext_client::Client::with_transport) while
/// the test keeps seeding and inspecting state through another.
#[derive(Debug, Clone)]
pub struct SharedSimServer {
    inner: Arc<Mutex<SimServer>>,
}

impl SharedSimServer {
    /// Lock the server state.
    pub fn lock(&self) -> MutexGuard<'_, SimServer> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for SharedSimServer {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError> {
        Ok(self.lock().handle(request))
    }
}

/// Create a shared server handle.
pub fn create_shared_server(config: SimConfig) -> SharedSimServer {
    SharedSimServer { inner: Arc::new(Mutex::new(SimServer::new(config))) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(path: &str) -> ApiRequest {
        ApiRequest::new(Method::Get, path)
    }

    #[test]
    fn root_identifies_as_subtext() {
        let mut server = SimServer::new(SimConfig::default());
        let response = server.handle(&get("/"));

        assert_eq!(response.status, 200);
        assert_eq!(response.text(), "Subtext");
    }

    #[test]
    fn about_reports_instance() {
        let mut server = SimServer::new(SimConfig::default());
        let info: Value = server.handle(&get("/Subtext")).json().expect("info");

        assert_eq!(info["instanceName"], "sim.subtext");
        assert_eq!(info["instanceId"], json!(server.instance_id()));
    }

    #[test]
    fn unauthenticated_request_is_rejected() {
        let mut server = SimServer::new(SimConfig::default());
        let response = server.handle(&get("/Subtext/board"));

        assert_eq!(response.status, 401);
        assert!(response.text().contains("SessionExpired"));
    }

    #[test]
    fn pages_are_clamped_to_limit() {
        let mut server = SimServer::new(SimConfig { page_limit: 2, ..SimConfig::default() });
        let owner = server.add_user("owner", "pw");
        let board = server.add_board("general", owner, &[]);
        for n in 0..5 {
            server.post_message(board, owner, "TextMessage", format!("m{n}"));
        }

        let login = ApiRequest::new(Method::Post, "/Subtext/user/login")
            .param("userId", owner)
            .param("password", "pw");
        let session: Uuid = server.handle(&login).json().expect("session");

        let request = get(&format!("/Subtext/board/{board}/messages"))
            .param("sessionId", session)
            .param("start", 3)
            .param("count", 50);
        let page: Vec<Value> = server.handle(&request).json().expect("page");

        assert_eq!(page.len(), 2);
        assert_eq!(server.page_starts(&format!("/Subtext/board/{board}/messages")), vec![3]);
    }

    #[test]
    fn same_seed_same_ids() {
        let mut a = SimServer::new(SimConfig { seed: 7, ..SimConfig::default() });
        let mut b = SimServer::new(SimConfig { seed: 7, ..SimConfig::default() });

        assert_eq!(a.add_user("x", "pw"), b.add_user("x", "pw"));
    }

    #[test]
    fn injected_failure_is_consumed_once() {
        let mut server = SimServer::new(SimConfig::default());
        server.fail_next(503, "Unavailable");

        assert_eq!(server.handle(&get("/")).status, 503);
        assert_eq!(server.handle(&get("/")).status, 200);
    }

    #[test]
    fn insert_clamps_index() {
        let mut server = SimServer::new(SimConfig::default());
        let owner = server.add_user("owner", "pw");
        let board = server.add_board("general", owner, &[]);
        let first = server.post_message(board, owner, "TextMessage", "a");
        let second = server.insert_message(board, 99, owner, "TextMessage", "b");

        let ids: Vec<Uuid> = server.messages(board).iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![first, second]);
    }
}

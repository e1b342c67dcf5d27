//! Mock DAM REST server for integration tests
//!
//! axum router on `127.0.0.1:0` with in-memory taxonomy and media state.
//! Sessions are cookies (`sid=session-N`); `expire_session` makes the live
//! cookie stale so the next authed call answers 401.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const MOCK_IDENTITY: &str = "svc-tagger";
pub const MOCK_SECRET: &str = "s3cret-pw";

#[derive(Debug, Clone)]
pub struct MockTag {
    pub id: i64,
    pub guid: String,
    pub name: String,
    pub allows_assignment: bool,
}

#[derive(Debug, Clone)]
pub struct MockValue {
    pub id: i64,
    pub tag_id: i64,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct RecordedAssignment {
    pub method: String,
    pub media_id: String,
    pub body: Value,
}

#[derive(Default)]
pub struct MockState {
    next_id: i64,
    session_counter: usize,
    live_session: Option<String>,
    pub logins: usize,
    pub tags: Vec<MockTag>,
    pub values: Vec<MockValue>,
    pub tag_creations: usize,
    pub value_creations: usize,
    pub assignments: Vec<RecordedAssignment>,
    pub value_queries: Vec<HashMap<String, String>>,
    pub media_queries: Vec<HashMap<String, String>>,
    pub media_page: Option<Value>,
    /// Names whose creation answers 409 after inserting the tag
    pub race_on_create: HashSet<String>,
    /// Value creations answer 500 with this body
    pub value_creation_error_body: Option<String>,
}

impl MockState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn insert_tag(&mut self, name: &str, allows_assignment: bool) -> MockTag {
        let id = self.next_id();
        let tag = MockTag {
            id,
            guid: format!("0000-tag-{}", id),
            name: name.to_string(),
            allows_assignment,
        };
        self.tags.push(tag.clone());
        tag
    }

    fn insert_value(&mut self, tag_id: i64, text: &str) -> MockValue {
        let value = MockValue {
            id: self.next_id(),
            tag_id,
            text: text.to_string(),
        };
        self.values.push(value.clone());
        value
    }

    fn is_authorized(&self, headers: &HeaderMap) -> bool {
        let Some(live) = &self.live_session else {
            return false;
        };
        headers
            .get("cookie")
            .and_then(|v| v.to_str().ok())
            .map(|cookie| cookie.split(';').any(|pair| pair.trim() == live))
            .unwrap_or(false)
    }
}

type Shared = Arc<Mutex<MockState>>;

pub struct MockDam {
    pub base_url: String,
    state: Shared,
    handle: JoinHandle<()>,
}

impl MockDam {
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(MockState::default()));

        let app = Router::new()
            .route("/login", post(login))
            .route("/tags", get(list_tags))
            .route("/tags/create", post(create_tag))
            .route("/tagValues", get(list_values))
            .route("/tagValues/create", post(create_value))
            .route("/media", get(search_media))
            .route("/media/:id/tags", axum::routing::any(assign_tags))
            .route("/assets/:id/labels", axum::routing::any(assign_tags))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
            handle,
        }
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn add_tag(&self, name: &str, allows_assignment: bool) -> MockTag {
        self.state().insert_tag(name, allows_assignment)
    }

    pub fn add_value(&self, tag_id: i64, text: &str) -> MockValue {
        self.state().insert_value(tag_id, text)
    }

    /// Server-side session expiry: the current cookie stops working
    pub fn expire_session(&self) {
        self.state().live_session = None;
    }

    pub fn set_media_page(&self, page: Value) {
        self.state().media_page = Some(page);
    }
}

impl Drop for MockDam {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[derive(Deserialize)]
struct LoginRequest {
    identity: String,
    secret: String,
}

async fn login(State(state): State<Shared>, Json(body): Json<LoginRequest>) -> Response {
    let mut state = state.lock().unwrap();
    if body.identity != MOCK_IDENTITY || body.secret != MOCK_SECRET {
        return (StatusCode::UNAUTHORIZED, "bad credentials").into_response();
    }
    state.logins += 1;
    state.session_counter += 1;
    let sid = format!("sid=session-{}", state.session_counter);
    state.live_session = Some(sid.clone());

    (
        StatusCode::OK,
        AppendHeaders([
            ("set-cookie", format!("{}; Path=/; HttpOnly", sid)),
            ("set-cookie", "theme=dark; Path=/".to_string()),
        ]),
        Json(json!({"ok": true})),
    )
        .into_response()
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, "session expired").into_response()
}

fn tag_json(tag: &MockTag) -> Value {
    json!({
        "id": tag.id,
        "guid": tag.guid,
        "name": tag.name,
        "isMultiValue": true,
        "isHierarchical": false,
        "allowsAssignment": tag.allows_assignment,
    })
}

async fn list_tags(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let state = state.lock().unwrap();
    if !state.is_authorized(&headers) {
        return unauthorized();
    }
    let items: Vec<Value> = state.tags.iter().map(tag_json).collect();
    Json(json!({ "items": items })).into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTagRequest {
    name: String,
    #[serde(rename = "type")]
    tag_type: String,
    multi_value: bool,
}

async fn create_tag(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<CreateTagRequest>,
) -> Response {
    let mut state = state.lock().unwrap();
    if !state.is_authorized(&headers) {
        return unauthorized();
    }
    if body.tag_type != "string" || !body.multi_value {
        return (StatusCode::BAD_REQUEST, "unexpected tag properties").into_response();
    }
    state.tag_creations += 1;

    if state.race_on_create.remove(&body.name) {
        state.insert_tag(&body.name, true);
        return (StatusCode::CONFLICT, "tag already exists").into_response();
    }
    if state
        .tags
        .iter()
        .any(|t| t.name.eq_ignore_ascii_case(&body.name))
    {
        return (StatusCode::CONFLICT, "tag already exists").into_response();
    }
    state.insert_tag(&body.name, true);
    StatusCode::OK.into_response()
}

async fn list_values(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mut state = state.lock().unwrap();
    if !state.is_authorized(&headers) {
        return unauthorized();
    }
    state.value_queries.push(params.clone());

    let tag_id: i64 = params
        .get("tagId")
        .and_then(|id| id.parse().ok())
        .unwrap_or_default();
    let filter = params.get("filter").cloned().unwrap_or_default().to_lowercase();

    // Substring match, as real DAM filters do
    let items: Vec<Value> = state
        .values
        .iter()
        .filter(|v| v.tag_id == tag_id && v.text.to_lowercase().contains(&filter))
        .map(|v| json!({"id": v.id, "tagId": v.tag_id, "text": v.text, "rawValue": v.text}))
        .collect();
    Json(Value::Array(items)).into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateValueRequest {
    tag_guid: String,
    value: String,
}

async fn create_value(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<CreateValueRequest>,
) -> Response {
    let mut state = state.lock().unwrap();
    if !state.is_authorized(&headers) {
        return unauthorized();
    }
    state.value_creations += 1;
    if let Some(error_body) = state.value_creation_error_body.clone() {
        return (StatusCode::INTERNAL_SERVER_ERROR, error_body).into_response();
    }
    let Some(tag_id) = state
        .tags
        .iter()
        .find(|t| t.guid == body.tag_guid)
        .map(|t| t.id)
    else {
        return (StatusCode::NOT_FOUND, "unknown tag guid").into_response();
    };
    // tagId deliberately omitted: clients fill it from the tag
    let value = state.insert_value(tag_id, &body.value);
    Json(json!({"id": value.id, "text": value.text})).into_response()
}

async fn search_media(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mut state = state.lock().unwrap();
    if !state.is_authorized(&headers) {
        return unauthorized();
    }
    state.media_queries.push(params);
    let page = state
        .media_page
        .clone()
        .unwrap_or_else(|| json!({"items": [], "totalCount": 0, "success": true}));
    Json(page).into_response()
}

async fn assign_tags(
    State(state): State<Shared>,
    method: Method,
    headers: HeaderMap,
    Path(media_id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    if !state.is_authorized(&headers) {
        return unauthorized();
    }
    if media_id == "missing" {
        return (StatusCode::NOT_FOUND, "no such media").into_response();
    }
    state.assignments.push(RecordedAssignment {
        method: method.to_string(),
        media_id,
        body,
    });
    StatusCode::NO_CONTENT.into_response()
}

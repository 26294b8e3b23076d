//! In-process stand-in for the IAM token endpoint and the Cloudant HTTP API.
//!
//! Routes:
//! - `POST /identity/token`: API-key grant, accepts only [`MOCK_API_KEY`]
//! - `POST /identity/malformed`: answers 200 with a non-JSON body
//! - `/store/...`: databases and documents with CouchDB-style revisions
//! - `PUT /conflicting/:db`: database creation that answers 409 instead of
//!   412 when the database exists, as some Cloudant front ends do
//! - `/unavailable/...`: always 503

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get, post, put},
    Form, Json, Router,
};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::TcpListener;

use crate::config::IAM_APIKEY_GRANT_TYPE;

pub const MOCK_API_KEY: &str = "mock-api-key";
pub const MOCK_BEARER_TOKEN: &str = "mock-bearer-token";

#[derive(Debug, Clone)]
struct StoredDocument {
    generation: u64,
    rev: String,
    body: Map<String, Value>,
}

#[derive(Debug, Default)]
struct MockStore {
    databases: HashMap<String, BTreeMap<String, StoredDocument>>,
    token_requests: usize,
    next_suffix: u64,
}

impl MockStore {
    fn next_rev(&mut self, generation: u64) -> String {
        self.next_suffix += 1;
        format!("{}-{:032x}", generation, self.next_suffix)
    }

    fn next_id(&mut self) -> String {
        self.next_suffix += 1;
        format!("{:032x}", self.next_suffix)
    }

    fn store(&mut self, db: &str, id: String, mut body: Map<String, Value>, generation: u64) -> String {
        let rev = self.next_rev(generation);
        body.insert("_id".to_string(), Value::String(id.clone()));
        body.insert("_rev".to_string(), Value::String(rev.clone()));
        self.databases.entry(db.to_string()).or_default().insert(
            id,
            StoredDocument {
                generation,
                rev: rev.clone(),
                body,
            },
        );
        rev
    }
}

type SharedStore = Arc<Mutex<MockStore>>;

pub struct MockCloudant {
    pub base_url: String,
    store: SharedStore,
    _server_handle: tokio::task::JoinHandle<()>,
}

impl MockCloudant {
    pub async fn start() -> anyhow::Result<Self> {
        let store: SharedStore = Arc::new(Mutex::new(MockStore::default()));

        let app = Router::new()
            .route("/identity/token", post(issue_token))
            .route("/identity/malformed", post(|| async { "this is not json" }))
            .route("/unavailable/*rest", any(unavailable))
            .route("/conflicting/:db", put(create_database_with_conflict))
            .route(
                "/store/:db",
                put(create_database).get(database_info).post(add_document),
            )
            .route(
                "/store/:db/:doc_id",
                get(get_document).put(put_document).delete(delete_document),
            )
            .with_state(store.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();

        let server_handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Mock Cloudant server stopped: {}", e);
            }
        });

        Ok(Self {
            base_url: format!("http://127.0.0.1:{}", port),
            store,
            _server_handle: server_handle,
        })
    }

    pub fn store_url(&self) -> String {
        format!("{}/store", self.base_url)
    }

    /// Base URL whose database creation reports an existing database as 409.
    pub fn conflicting_store_url(&self) -> String {
        format!("{}/conflicting", self.base_url)
    }

    pub fn iam_token_url(&self) -> String {
        format!("{}/identity/token", self.base_url)
    }

    pub fn token_requests(&self) -> usize {
        self.lock().token_requests
    }

    pub fn create_database(&self, db: &str) {
        self.lock().databases.entry(db.to_string()).or_default();
    }

    pub fn has_database(&self, db: &str) -> bool {
        self.lock().databases.contains_key(db)
    }

    pub fn document_count(&self, db: &str) -> usize {
        self.lock().databases.get(db).map_or(0, BTreeMap::len)
    }

    /// Inserts a document directly, bypassing HTTP. Returns its revision.
    pub fn insert_document(&self, db: &str, doc: Value) -> String {
        let body = match doc {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let mut store = self.lock();
        let id = match body.get("_id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => store.next_id(),
        };
        store.store(db, id, body, 1)
    }

    pub fn documents(&self, db: &str) -> Vec<Value> {
        self.lock()
            .databases
            .get(db)
            .map(|docs| docs.values().map(|d| Value::Object(d.body.clone())).collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, MockStore> {
        lock(&self.store)
    }
}

fn lock(store: &SharedStore) -> MutexGuard<'_, MockStore> {
    store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn error(status: StatusCode, error: &str, reason: &str) -> Response {
    (status, Json(json!({"error": error, "reason": reason}))).into_response()
}

fn check_bearer(headers: &HeaderMap) -> Result<(), Response> {
    let expected = format!("Bearer {}", MOCK_BEARER_TOKEN);
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some(value) if value == expected => Ok(()),
        _ => Err(error(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "Invalid or missing bearer token.",
        )),
    }
}

fn missing_database() -> Response {
    error(StatusCode::NOT_FOUND, "not_found", "Database does not exist.")
}

fn update_conflict() -> Response {
    error(StatusCode::CONFLICT, "conflict", "Document update conflict.")
}

async fn issue_token(
    State(store): State<SharedStore>,
    Form(params): Form<HashMap<String, String>>,
) -> Response {
    lock(&store).token_requests += 1;

    let grant_ok = params.get("grant_type").map(String::as_str) == Some(IAM_APIKEY_GRANT_TYPE);
    let key_ok = params.get("apikey").map(String::as_str) == Some(MOCK_API_KEY);

    if !(grant_ok && key_ok) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "errorCode": "BXNIM0415E",
                "errorMessage": "Provided API key could not be found.",
            })),
        )
            .into_response();
    }

    Json(json!({
        "access_token": MOCK_BEARER_TOKEN,
        "refresh_token": "not_supported",
        "token_type": "Bearer",
        "expires_in": 3600,
        "expiration": 4_102_444_800u64,
        "scope": "ibm openid",
    }))
    .into_response()
}

async fn unavailable() -> Response {
    error(
        StatusCode::SERVICE_UNAVAILABLE,
        "service_unavailable",
        "Service temporarily unavailable.",
    )
}

async fn create_database(
    State(store): State<SharedStore>,
    Path(db): Path<String>,
    headers: HeaderMap,
) -> Response {
    insert_database(&store, db, &headers, StatusCode::PRECONDITION_FAILED)
}

async fn create_database_with_conflict(
    State(store): State<SharedStore>,
    Path(db): Path<String>,
    headers: HeaderMap,
) -> Response {
    insert_database(&store, db, &headers, StatusCode::CONFLICT)
}

fn insert_database(
    store: &SharedStore,
    db: String,
    headers: &HeaderMap,
    exists_status: StatusCode,
) -> Response {
    if let Err(denied) = check_bearer(headers) {
        return denied;
    }

    let mut store = lock(store);
    if store.databases.contains_key(&db) {
        return error(
            exists_status,
            "file_exists",
            "The database could not be created, the file already exists.",
        );
    }
    store.databases.insert(db, BTreeMap::new());

    (StatusCode::CREATED, Json(json!({"ok": true}))).into_response()
}

async fn database_info(
    State(store): State<SharedStore>,
    Path(db): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(denied) = check_bearer(&headers) {
        return denied;
    }

    let store = lock(&store);
    match store.databases.get(&db) {
        Some(docs) => Json(json!({
            "db_name": db,
            "doc_count": docs.len(),
            "doc_del_count": 0,
        }))
        .into_response(),
        None => missing_database(),
    }
}

async fn add_document(
    State(store): State<SharedStore>,
    Path(db): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(denied) = check_bearer(&headers) {
        return denied;
    }

    let Value::Object(body) = body else {
        return error(StatusCode::BAD_REQUEST, "bad_request", "Document must be a JSON object.");
    };

    let mut store = lock(&store);
    let id = match body.get("_id").and_then(Value::as_str) {
        Some(id) => id.to_string(),
        None => store.next_id(),
    };

    let Some(docs) = store.databases.get(&db) else {
        return missing_database();
    };
    if docs.contains_key(&id) {
        return update_conflict();
    }

    let rev = store.store(&db, id.clone(), body, 1);
    (
        StatusCode::CREATED,
        Json(json!({"ok": true, "id": id, "rev": rev})),
    )
        .into_response()
}

async fn get_document(
    State(store): State<SharedStore>,
    Path((db, doc_id)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if let Err(denied) = check_bearer(&headers) {
        return denied;
    }

    let store = lock(&store);
    let Some(docs) = store.databases.get(&db) else {
        return missing_database();
    };

    if doc_id == "_all_docs" {
        let include_docs = params.get("include_docs").map(String::as_str) == Some("true");
        let rows: Vec<Value> = docs
            .iter()
            .map(|(id, doc)| {
                let mut row = json!({"id": id, "key": id, "value": {"rev": doc.rev}});
                if include_docs {
                    row["doc"] = Value::Object(doc.body.clone());
                }
                row
            })
            .collect();
        return Json(json!({"total_rows": rows.len(), "offset": 0, "rows": rows})).into_response();
    }

    match docs.get(&doc_id) {
        Some(doc) => Json(Value::Object(doc.body.clone())).into_response(),
        None => error(StatusCode::NOT_FOUND, "not_found", "missing"),
    }
}

async fn put_document(
    State(store): State<SharedStore>,
    Path((db, doc_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(denied) = check_bearer(&headers) {
        return denied;
    }

    let Value::Object(body) = body else {
        return error(StatusCode::BAD_REQUEST, "bad_request", "Document must be a JSON object.");
    };

    let mut store = lock(&store);
    let Some(docs) = store.databases.get(&db) else {
        return missing_database();
    };

    let supplied_rev = body.get("_rev").and_then(Value::as_str);
    let generation = match (docs.get(&doc_id), supplied_rev) {
        (Some(current), Some(rev)) if rev == current.rev => current.generation + 1,
        (None, None) => 1,
        _ => return update_conflict(),
    };

    let rev = store.store(&db, doc_id.clone(), body, generation);
    (
        StatusCode::CREATED,
        Json(json!({"ok": true, "id": doc_id, "rev": rev})),
    )
        .into_response()
}

async fn delete_document(
    State(store): State<SharedStore>,
    Path((db, doc_id)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if let Err(denied) = check_bearer(&headers) {
        return denied;
    }

    let mut store = lock(&store);
    let Some(docs) = store.databases.get_mut(&db) else {
        return missing_database();
    };
    let Some(current) = docs.get(&doc_id) else {
        return error(StatusCode::NOT_FOUND, "not_found", "missing");
    };
    if params.get("rev") != Some(&current.rev) {
        return update_conflict();
    }

    let generation = current.generation + 1;
    docs.remove(&doc_id);
    let rev = store.next_rev(generation);

    Json(json!({"ok": true, "id": doc_id, "rev": rev})).into_response()
}

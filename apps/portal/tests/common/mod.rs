//! In-process fake portal backend for integration tests. Speaks the same REST
//! contract as the real thing: SimpleJWT-style token endpoints, DRF-style
//! paginated lists, and a multipart apply endpoint.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::{json, Value};

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "secret";
pub const INITIAL_ACCESS: &str = "acc-1";
pub const INITIAL_REFRESH: &str = "ref-1";

pub struct BackendState {
    base: Mutex<String>,
    /// The only access token the protected endpoints accept.
    pub valid_access: Mutex<String>,
    pub valid_refresh: Mutex<String>,
    /// When false, `token/refresh/` rejects every request.
    pub refresh_ok: AtomicBool,
    /// When true, the refresh endpoint grants a token the backend will not
    /// honor, forcing the retried request to 401 again.
    pub refresh_grants_bogus: AtomicBool,
    pub refresh_calls: AtomicUsize,
    pub apply_calls: AtomicUsize,
    pub page_size: usize,
    pub jobs: Mutex<Vec<Value>>,
    pub applications: Mutex<Vec<Value>>,
    /// PATCHes against these ids come back 409.
    pub conflict_ids: Mutex<Vec<i64>>,
}

impl Default for BackendState {
    fn default() -> Self {
        BackendState {
            base: Mutex::new(String::new()),
            valid_access: Mutex::new(INITIAL_ACCESS.to_string()),
            valid_refresh: Mutex::new(INITIAL_REFRESH.to_string()),
            refresh_ok: AtomicBool::new(true),
            refresh_grants_bogus: AtomicBool::new(false),
            refresh_calls: AtomicUsize::new(0),
            apply_calls: AtomicUsize::new(0),
            page_size: 2,
            jobs: Mutex::new(vec![json!({
                "id": 1,
                "title": "Computer Vision Engineer",
                "location": "Remote",
                "description": "Build things that see.",
                "is_open": true,
                "type": "full_time"
            })]),
            applications: Mutex::new(Vec::new()),
            conflict_ids: Mutex::new(Vec::new()),
        }
    }
}

pub struct Backend {
    pub addr: SocketAddr,
    pub state: Arc<BackendState>,
}

impl Backend {
    pub fn api_base(&self) -> reqwest::Url {
        format!("http://{}/api/", self.addr).parse().unwrap()
    }

    pub fn origin(&self) -> reqwest::Url {
        format!("http://{}/", self.addr).parse().unwrap()
    }
}

pub fn raw_application(id: i64, stage: &str, applied_at: &str) -> Value {
    json!({
        "id": id,
        "stage": stage,
        "job": { "id": 1, "title": "Computer Vision Engineer" },
        "candidate": {
            "full_name": format!("Candidate {id}"),
            "email": format!("c{id}@example.com"),
            "phone": "+92 300 0000000",
            "resume": format!("/media/resumes/{id}.pdf")
        },
        "applied_at": applied_at
    })
}

pub async fn spawn_backend(state: BackendState) -> Backend {
    let state = Arc::new(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    *state.base.lock().unwrap() = format!("http://{addr}/api/");

    let app = Router::new()
        .route("/api/token/", post(token))
        .route("/api/token/refresh/", post(token_refresh))
        .route("/api/jobs/", get(list_jobs))
        .route("/api/jobs/:id/", get(get_job))
        .route("/api/jobs/:id/apply/", post(apply))
        .route("/api/applications/", get(list_applications))
        .route("/api/applications/:id/", patch(patch_application))
        .with_state(state.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Backend { addr, state }
}

fn authorized(state: &BackendState, headers: &HeaderMap) -> bool {
    let expected = format!("Bearer {}", state.valid_access.lock().unwrap());
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == expected)
        .unwrap_or(false)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "detail": "Given token not valid for any token type" })),
    )
        .into_response()
}

async fn token(State(state): State<Arc<BackendState>>, Json(body): Json<Value>) -> Response {
    let username = body["username"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    if username != USERNAME || password != PASSWORD {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "No active account found" })),
        )
            .into_response();
    }
    *state.valid_access.lock().unwrap() = INITIAL_ACCESS.to_string();
    *state.valid_refresh.lock().unwrap() = INITIAL_REFRESH.to_string();
    Json(json!({
        "access": INITIAL_ACCESS,
        "refresh": INITIAL_REFRESH,
        "role": "Admin"
    }))
    .into_response()
}

async fn token_refresh(
    State(state): State<Arc<BackendState>>,
    Json(body): Json<Value>,
) -> Response {
    let n = state.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
    let presented = body["refresh"].as_str().unwrap_or_default();
    let expected = state.valid_refresh.lock().unwrap().clone();
    if !state.refresh_ok.load(Ordering::SeqCst) || presented != expected {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Token is invalid or expired" })),
        )
            .into_response();
    }
    let access = format!("acc-refreshed-{n}");
    if !state.refresh_grants_bogus.load(Ordering::SeqCst) {
        *state.valid_access.lock().unwrap() = access.clone();
    }
    Json(json!({ "access": access })).into_response()
}

async fn list_jobs(State(state): State<Arc<BackendState>>) -> Response {
    let jobs = state.jobs.lock().unwrap().clone();
    Json(json!({
        "count": jobs.len(),
        "next": null,
        "previous": null,
        "results": jobs
    }))
    .into_response()
}

async fn get_job(State(state): State<Arc<BackendState>>, Path(id): Path<i64>) -> Response {
    let jobs = state.jobs.lock().unwrap();
    match jobs.iter().find(|j| j["id"].as_i64() == Some(id)) {
        Some(job) => Json(job.clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": "Not found." })),
        )
            .into_response(),
    }
}

async fn list_applications(
    State(state): State<Arc<BackendState>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }

    let all = state.applications.lock().unwrap();
    let scoped: Vec<&Value> = all
        .iter()
        .filter(|a| match params.get("job").and_then(|j| j.parse::<i64>().ok()) {
            Some(job) => {
                let record_job = a["job"]["id"].as_i64().or_else(|| a["job"].as_i64());
                record_job == Some(job)
            }
            None => true,
        })
        .collect();

    let page: usize = params
        .get("page")
        .and_then(|p| p.parse().ok())
        .unwrap_or(1);
    let start = (page - 1) * state.page_size;
    let end = (start + state.page_size).min(scoped.len());
    let results: Vec<Value> = scoped[start.min(scoped.len())..end]
        .iter()
        .map(|v| (*v).clone())
        .collect();
    let base = state.base.lock().unwrap().clone();
    let next = if end < scoped.len() {
        Value::String(format!("{base}applications/?page={}", page + 1))
    } else {
        Value::Null
    };
    Json(json!({
        "count": scoped.len(),
        "next": next,
        "previous": null,
        "results": results
    }))
    .into_response()
}

async fn patch_application(
    State(state): State<Arc<BackendState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    if state.conflict_ids.lock().unwrap().contains(&id) {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "error": "stage transition not allowed" })),
        )
            .into_response();
    }
    let mut apps = state.applications.lock().unwrap();
    match apps.iter_mut().find(|a| a["id"].as_i64() == Some(id)) {
        Some(app) => {
            if let Some(stage) = body["stage"].as_str() {
                app["stage"] = Value::String(stage.to_string());
            }
            Json(app.clone()).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": "Not found." })),
        )
            .into_response(),
    }
}

async fn apply(
    State(state): State<Arc<BackendState>>,
    Path(job_id): Path<i64>,
    mut multipart: Multipart,
) -> Response {
    state.apply_calls.fetch_add(1, Ordering::SeqCst);

    let mut fields: HashMap<String, Vec<u8>> = HashMap::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        fields.insert(name, field.bytes().await.unwrap().to_vec());
    }
    if !fields.contains_key("resume") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "resume is required" })),
        )
            .into_response();
    }

    let mut apps = state.applications.lock().unwrap();
    let id = apps.len() as i64 + 100;
    let full_name = String::from_utf8(fields.remove("full_name").unwrap_or_default())
        .unwrap_or_default();
    let record = json!({
        "id": id,
        "stage": "applied",
        "job": job_id,
        "candidate": {
            "full_name": full_name,
            "email": String::from_utf8(fields.remove("email").unwrap_or_default())
                .unwrap_or_default(),
            "phone": String::from_utf8(fields.remove("phone").unwrap_or_default())
                .unwrap_or_default(),
            "resume": format!("/media/resumes/{id}.pdf")
        },
        "applied_at": null
    });
    apps.push(record.clone());
    (StatusCode::CREATED, Json(record)).into_response()
}

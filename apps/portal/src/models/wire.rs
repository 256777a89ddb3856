//! Raw server payload shapes, decoded once at the gateway boundary.
//!
//! The backend denormalizes inconsistently: an application's `job` field may
//! arrive as an embedded object or a bare id, and candidate fields appear both
//! nested and at the top level. These shapes capture the wire exactly; the
//! normalizer resolves them into the canonical `Application`.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// DRF-style paginated envelope. `next`/`previous` are absolute continuation
/// URLs when more pages exist.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default)]
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Nested candidate record on a raw application.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCandidate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Resume path, possibly relative to the backend origin.
    pub resume: Option<String>,
}

/// Job reference on a raw application: embedded object or bare id.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum JobRef {
    Embedded(EmbeddedJob),
    Id(i64),
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddedJob {
    pub id: i64,
    pub title: String,
}

/// An application record as the server sends it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawApplication {
    pub id: i64,
    pub stage: String,
    pub job: Option<JobRef>,
    pub job_title: Option<String>,
    pub candidate_name: Option<String>,
    pub candidate_email: Option<String>,
    pub candidate: Option<RawCandidate>,
    pub applied_at: Option<DateTime<Utc>>,
}

/// `POST token/` response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access: String,
    pub refresh: String,
    pub role: Option<String>,
}

/// `POST token/refresh/` response.
#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
}

use serde::{Deserialize, Serialize};

/// Read-only job reference data. Fetched per view for title lookups and
/// open/closed gating on the public apply flow; never owned by the controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_open")]
    pub is_open: bool,
    #[serde(default, rename = "type")]
    pub job_type: String,
}

fn default_open() -> bool {
    true
}

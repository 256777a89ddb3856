use serde::{Deserialize, Serialize};

/// Persisted client session: created on login, refreshed transparently on
/// access-token expiry, destroyed on logout or irrecoverable refresh failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access: String,
    pub refresh: String,
    /// Lower-cased role string used for role-gated views.
    pub role: String,
}

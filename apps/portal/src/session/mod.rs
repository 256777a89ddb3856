//! Auth Session Manager: owns the token lifecycle and the single-flight
//! refresh discipline.
//!
//! At most one refresh call is ever in flight. Every request that fails with
//! 401 while a refresh is pending is satisfied from that single refresh's
//! outcome, success or failure, never triggering a second refresh.

pub mod store;

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::errors::ApiError;
use crate::models::session::Session;
use crate::models::wire::{RefreshResponse, TokenResponse};
use store::SessionStore;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Injectable session context passed to the gateway and controller, replacing
/// any ambient global token access.
pub struct AuthSession {
    http: Client,
    base: Url,
    store: Arc<dyn SessionStore>,
    /// Single-flight gate: the holder performs the refresh, queued losers
    /// re-read the store once the winner settles.
    refresh_lock: tokio::sync::Mutex<()>,
}

impl AuthSession {
    pub fn new(base: Url, store: Arc<dyn SessionStore>) -> Self {
        AuthSession {
            http: Client::builder()
                .timeout(HTTP_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
            base,
            store,
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Current access token, if any. Pure read; tolerates a concurrently
    /// cleared store.
    pub fn bearer(&self) -> Option<String> {
        self.store.load().map(|s| s.access)
    }

    /// Lower-cased role of the logged-in user, if any.
    pub fn role(&self) -> Option<String> {
        self.store.load().map(|s| s.role)
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.load().is_some()
    }

    /// Exchanges credentials for access/refresh tokens + role and persists
    /// all three.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, ApiError> {
        let response = self
            .http
            .post(self.endpoint("token/"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::BAD_REQUEST {
            return Err(ApiError::InvalidCredentials);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let tokens: TokenResponse = response.json().await?;
        let session = Session {
            access: tokens.access,
            refresh: tokens.refresh,
            role: tokens.role.unwrap_or_default().to_lowercase(),
        };
        self.store.save(session.clone());
        info!(role = %session.role, "logged in");
        Ok(session)
    }

    /// Clears all persisted session fields. Idempotent; "navigate to login"
    /// is the caller's concern.
    pub fn logout(&self) {
        self.store.clear();
        debug!("session cleared");
    }

    /// Called when an authenticated request came back 401. `stale` is the
    /// token that request carried. Returns a token to retry with, or
    /// `SessionInvalid` after tearing the session down.
    pub async fn handle_unauthorized(&self, stale: Option<&str>) -> Result<String, ApiError> {
        let _guard = self.refresh_lock.lock().await;

        // Another caller may have finished a refresh while we queued.
        if let Some(session) = self.store.load() {
            if stale != Some(session.access.as_str()) && !session.access.is_empty() {
                debug!("reusing access token refreshed by a concurrent request");
                return Ok(session.access);
            }
        }

        let Some(session) = self.store.load() else {
            return Err(ApiError::SessionInvalid);
        };
        if session.refresh.is_empty() {
            warn!("401 with no refresh token; clearing session");
            self.store.clear();
            return Err(ApiError::SessionInvalid);
        }

        debug!("access token rejected; refreshing");
        let response = self
            .http
            .post(self.endpoint("token/refresh/"))
            .json(&json!({ "refresh": session.refresh }))
            .send()
            .await;

        let refreshed = match response {
            Ok(r) if r.status().is_success() => r.json::<RefreshResponse>().await.ok(),
            Ok(r) => {
                warn!(status = %r.status(), "token refresh rejected");
                None
            }
            Err(e) => {
                warn!("token refresh failed: {e}");
                None
            }
        };

        match refreshed {
            Some(body) => {
                self.store.set_access(&body.access);
                info!("access token refreshed");
                Ok(body.access)
            }
            None => {
                // Irrecoverable: tear down so every queued caller fails
                // together and the next read sees "unauthenticated".
                self.store.clear();
                Err(ApiError::SessionInvalid)
            }
        }
    }

    fn endpoint(&self, path: &str) -> Url {
        self.base
            .join(path)
            .expect("endpoint path is valid relative to the API base")
    }
}

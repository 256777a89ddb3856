//! API Gateway Client: typed wrapper over the portal REST endpoints.
//!
//! Every authenticated call goes through `send_authed`, which attaches the
//! bearer token and retries exactly once after a single-flight refresh. The
//! retry budget is explicit (the request is rebuilt from scratch), not a
//! mutable flag on an ambient request object.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::errors::ApiError;
use crate::models::application::Stage;
use crate::models::job::Job;
use crate::models::wire::{Page, RawApplication};
use crate::session::AuthSession;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Structured query over `GET applications/`.
#[derive(Debug, Clone, Default)]
pub struct ApplicationsFilter {
    pub stage: Option<Stage>,
    pub job: Option<i64>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

impl ApplicationsFilter {
    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(stage) = &self.stage {
            pairs.push(("stage", stage.as_str().to_string()));
        }
        if let Some(job) = self.job {
            pairs.push(("job", job.to_string()));
        }
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(page_size) = self.page_size {
            pairs.push(("page_size", page_size.to_string()));
        }
        if let Some(search) = &self.search {
            pairs.push(("search", search.clone()));
        }
        if let Some(ordering) = &self.ordering {
            pairs.push(("ordering", ordering.clone()));
        }
        pairs
    }
}

/// Either a server-provided continuation URL or a structured query.
#[derive(Debug, Clone)]
pub enum ApplicationsQuery {
    Cursor(String),
    Filter(ApplicationsFilter),
}

impl Default for ApplicationsQuery {
    fn default() -> Self {
        ApplicationsQuery::Filter(ApplicationsFilter::default())
    }
}

/// Candidate apply submission. The resume is mandatory and validated locally
/// before any network round trip.
#[derive(Debug, Clone)]
pub struct ApplicationForm {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub resume: Option<ResumeFile>,
}

#[derive(Debug, Clone)]
pub struct ResumeFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ApplicationForm {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.full_name.trim().is_empty() {
            return Err(ApiError::Validation("full name is required".to_string()));
        }
        if self.email.trim().is_empty() || !self.email.contains('@') {
            return Err(ApiError::Validation("a valid email is required".to_string()));
        }
        if self.phone.trim().is_empty() {
            return Err(ApiError::Validation("phone number is required".to_string()));
        }
        if self.resume.is_none() {
            return Err(ApiError::Validation("a resume file is required".to_string()));
        }
        Ok(())
    }

    /// Builds a fresh multipart body. Called once per send attempt because a
    /// multipart body cannot be replayed.
    fn to_multipart(&self) -> Form {
        let mut form = Form::new()
            .text("full_name", self.full_name.clone())
            .text("email", self.email.clone())
            .text("phone", self.phone.clone());
        if let Some(resume) = &self.resume {
            let part = Part::bytes(resume.bytes.clone()).file_name(resume.file_name.clone());
            let part = part
                .mime_str(&resume.content_type)
                .unwrap_or_else(|_| {
                    Part::bytes(resume.bytes.clone()).file_name(resume.file_name.clone())
                });
            form = form.part("resume", part);
        }
        form
    }
}

/// The network seam the pipeline controller depends on. Implemented by
/// `ApiClient`; swapped for a fake in controller unit tests.
#[async_trait]
pub trait PortalApi: Send + Sync {
    async fn fetch_all_jobs(&self) -> Result<Vec<Job>, ApiError>;
    async fn fetch_all_applications(
        &self,
        query: ApplicationsQuery,
    ) -> Result<Vec<RawApplication>, ApiError>;
    async fn update_application_stage(&self, id: i64, stage: &Stage) -> Result<(), ApiError>;
}

/// The single HTTP client for all portal API calls.
pub struct ApiClient {
    http: Client,
    base: Url,
    session: Arc<AuthSession>,
}

impl ApiClient {
    pub fn new(base: Url, session: Arc<AuthSession>) -> Self {
        ApiClient {
            http: Client::builder()
                .timeout(HTTP_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
            base,
            session,
        }
    }

    // ── Jobs (public, no auth) ─────────────────────────────────────────────

    pub async fn list_jobs(&self) -> Result<Page<Job>, ApiError> {
        let response = self.http.get(self.endpoint("jobs/")).send().await?;
        Ok(expect_success(response).await?.json().await?)
    }

    pub async fn get_job(&self, id: i64) -> Result<Job, ApiError> {
        let response = self
            .http
            .get(self.endpoint(&format!("jobs/{id}/")))
            .send()
            .await?;
        Ok(expect_success(response).await?.json().await?)
    }

    /// Follows `next` cursors until the job list is exhausted.
    pub async fn fetch_all_jobs(&self) -> Result<Vec<Job>, ApiError> {
        let mut page = self.list_jobs().await?;
        let mut jobs = std::mem::take(&mut page.results);
        while let Some(next) = page.next {
            let url = parse_cursor(&next)?;
            let response = self.http.get(url).send().await?;
            page = expect_success(response).await?.json().await?;
            jobs.append(&mut page.results);
        }
        Ok(jobs)
    }

    // ── Applications (admin, authed) ───────────────────────────────────────

    pub async fn list_applications(
        &self,
        query: &ApplicationsQuery,
    ) -> Result<Page<RawApplication>, ApiError> {
        let response = match query {
            ApplicationsQuery::Cursor(cursor) => {
                let url = parse_cursor(cursor)?;
                self.send_authed(|http| http.get(url.clone())).await?
            }
            ApplicationsQuery::Filter(filter) => {
                let pairs = filter.query_pairs();
                let url = self.endpoint("applications/");
                self.send_authed(|http| http.get(url.clone()).query(&pairs))
                    .await?
            }
        };
        Ok(expect_success(response).await?.json().await?)
    }

    /// Follows `next` until exhausted and returns the concatenated records.
    /// Unbounded latency; callers that need bounds must paginate manually
    /// with `list_applications`.
    pub async fn fetch_all_applications(
        &self,
        query: ApplicationsQuery,
    ) -> Result<Vec<RawApplication>, ApiError> {
        let mut pages = 1usize;
        let mut page = self.list_applications(&query).await?;
        let mut items = std::mem::take(&mut page.results);
        while let Some(next) = page.next {
            pages += 1;
            page = self
                .list_applications(&ApplicationsQuery::Cursor(next))
                .await?;
            items.append(&mut page.results);
        }
        debug!(records = items.len(), pages, "fetched all applications");
        Ok(items)
    }

    /// Partial update of an application's stage. Returns the updated record
    /// when the server sends one back; `None` for an opaque success body.
    pub async fn update_application_stage(
        &self,
        id: i64,
        stage: &Stage,
    ) -> Result<Option<RawApplication>, ApiError> {
        let url = self.endpoint(&format!("applications/{id}/"));
        let body = json!({ "stage": stage.as_str() });
        let response = self
            .send_authed(|http| http.patch(url.clone()).json(&body))
            .await?;
        let response = expect_success(response).await?;
        Ok(response.json().await.ok())
    }

    /// Multipart apply submission on the public flow. The bearer token is
    /// attached when present (logged-in admins previewing the flow), but the
    /// endpoint does not require one.
    pub async fn submit_application(
        &self,
        job_id: i64,
        form: &ApplicationForm,
    ) -> Result<Option<RawApplication>, ApiError> {
        form.validate()?;
        let url = self.endpoint(&format!("jobs/{job_id}/apply/"));
        let response = self
            .send_authed(|http| http.post(url.clone()).multipart(form.to_multipart()))
            .await?;
        let response = expect_success(response).await?;
        Ok(response.json().await.ok())
    }

    // ── Plumbing ───────────────────────────────────────────────────────────

    /// Sends a request with the current bearer token. On 401, asks the
    /// session manager for a refreshed token (single-flight) and retries the
    /// rebuilt request exactly once; a second 401 tears the session down.
    async fn send_authed<F>(&self, build: F) -> Result<Response, ApiError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let token = self.session.bearer();
        let request = match &token {
            Some(token) => build(&self.http).bearer_auth(token),
            None => build(&self.http),
        };
        let response = request.send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let fresh = self.session.handle_unauthorized(token.as_deref()).await?;
        let response = build(&self.http).bearer_auth(fresh).send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("request unauthorized even after a token refresh");
            self.session.logout();
            return Err(ApiError::SessionInvalid);
        }
        Ok(response)
    }

    fn endpoint(&self, path: &str) -> Url {
        self.base
            .join(path)
            .expect("endpoint path is valid relative to the API base")
    }
}

#[async_trait]
impl PortalApi for ApiClient {
    async fn fetch_all_jobs(&self) -> Result<Vec<Job>, ApiError> {
        ApiClient::fetch_all_jobs(self).await
    }

    async fn fetch_all_applications(
        &self,
        query: ApplicationsQuery,
    ) -> Result<Vec<RawApplication>, ApiError> {
        ApiClient::fetch_all_applications(self, query).await
    }

    async fn update_application_stage(&self, id: i64, stage: &Stage) -> Result<(), ApiError> {
        ApiClient::update_application_stage(self, id, stage)
            .await
            .map(|_| ())
    }
}

fn parse_cursor(cursor: &str) -> Result<Url, ApiError> {
    Url::parse(cursor)
        .map_err(|e| ApiError::Validation(format!("invalid continuation URL: {e}")))
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    detail: Option<String>,
}

/// Maps a non-success response to the error taxonomy, pulling a message out
/// of `{"error": ...}` / `{"detail": ...}` bodies when present.
async fn expect_success(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.error.or(b.detail))
        .unwrap_or(body);
    Err(match status.as_u16() {
        404 => ApiError::NotFound(message),
        409 => ApiError::Conflict(message),
        400 => ApiError::Validation(message),
        status => ApiError::Server { status, message },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_form() -> ApplicationForm {
        ApplicationForm {
            full_name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            phone: "+92 300 0000000".to_string(),
            resume: Some(ResumeFile {
                file_name: "ada.pdf".to_string(),
                content_type: "application/pdf".to_string(),
                bytes: b"%PDF-1.4".to_vec(),
            }),
        }
    }

    #[test]
    fn form_with_resume_validates() {
        assert!(make_form().validate().is_ok());
    }

    #[test]
    fn missing_resume_is_rejected_locally() {
        let mut form = make_form();
        form.resume = None;
        assert!(matches!(form.validate(), Err(ApiError::Validation(_))));
    }

    #[test]
    fn blank_fields_are_rejected_locally() {
        let mut form = make_form();
        form.full_name = "  ".to_string();
        assert!(matches!(form.validate(), Err(ApiError::Validation(_))));

        let mut form = make_form();
        form.email = "not-an-email".to_string();
        assert!(matches!(form.validate(), Err(ApiError::Validation(_))));

        let mut form = make_form();
        form.phone = String::new();
        assert!(matches!(form.validate(), Err(ApiError::Validation(_))));
    }

    #[test]
    fn filter_builds_only_set_params() {
        let filter = ApplicationsFilter {
            stage: Some(Stage::Screening),
            job: Some(3),
            ..Default::default()
        };
        let pairs = filter.query_pairs();
        assert_eq!(
            pairs,
            vec![
                ("stage", "screening".to_string()),
                ("job", "3".to_string())
            ]
        );
    }
}

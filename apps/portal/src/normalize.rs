//! Pipeline Normalizer: maps heterogeneous raw application records into the
//! canonical `Application` shape.
//!
//! All shape inspection happens here. Downstream code never sees an untagged
//! job ref, a relative resume path, or a mixed-case stage string.

use std::collections::HashMap;

use reqwest::Url;
use tracing::warn;

use crate::models::application::{Application, Stage};
use crate::models::wire::{JobRef, RawApplication};

/// Placeholder title when a bare job id cannot be resolved.
pub const UNRESOLVED_JOB_TITLE: &str = "Unknown role";

/// Normalizes one raw record. `job_titles` is the lookup table for bare job
/// ids; `origin` is the backend origin used to absolutize relative resume
/// paths.
pub fn normalize(
    raw: RawApplication,
    job_titles: &HashMap<i64, String>,
    origin: &Url,
) -> Application {
    let stage = Stage::from(raw.stage);
    if let Stage::Other(s) = &stage {
        // Safe degradation: the row stays visible but gains no transitions.
        warn!(application = raw.id, stage = %s, "unrecognized stage from server");
    }

    let (job_id, job_title) = resolve_job(raw.id, raw.job, raw.job_title, job_titles);

    let candidate = raw.candidate.unwrap_or_default();
    let candidate_name = candidate
        .full_name
        .or(raw.candidate_name)
        .unwrap_or_default();
    let candidate_email = candidate
        .email
        .or(raw.candidate_email)
        .unwrap_or_default();

    Application {
        id: raw.id,
        stage,
        job_id,
        job_title,
        candidate_name,
        candidate_email,
        phone: candidate.phone.unwrap_or_default(),
        resume_link: absolutize_resume(candidate.resume.as_deref(), origin),
        applied_at: raw.applied_at,
    }
}

/// Resolves the duck-typed job field: embedded object wins, then the
/// top-level denormalized title, then the lookup table, then a placeholder.
fn resolve_job(
    application_id: i64,
    job: Option<JobRef>,
    top_level_title: Option<String>,
    job_titles: &HashMap<i64, String>,
) -> (i64, String) {
    match job {
        Some(JobRef::Embedded(job)) => (job.id, job.title),
        Some(JobRef::Id(id)) => {
            let title = top_level_title
                .or_else(|| job_titles.get(&id).cloned())
                .unwrap_or_else(|| UNRESOLVED_JOB_TITLE.to_string());
            (id, title)
        }
        None => {
            warn!(application = application_id, "application has no job reference");
            (
                0,
                top_level_title.unwrap_or_else(|| UNRESOLVED_JOB_TITLE.to_string()),
            )
        }
    }
}

/// Absolute URLs pass through; relative paths are joined onto the backend
/// origin. Missing or empty input yields an empty string, never an Option,
/// so presentation tests truthiness uniformly.
fn absolutize_resume(resume: Option<&str>, origin: &Url) -> String {
    match resume {
        None | Some("") => String::new(),
        Some(r) if r.starts_with("http://") || r.starts_with("https://") => r.to_string(),
        Some(r) => match origin.join(r) {
            Ok(url) => url.to_string(),
            Err(e) => {
                // A relative path must never leak past this boundary.
                warn!(path = r, "unjoinable resume path: {e}");
                String::new()
            }
        },
    }
}

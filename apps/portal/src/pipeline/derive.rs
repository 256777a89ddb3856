//! Pure projections over the canonical application set. Everything here is a
//! function of its inputs; the controller owns the state these operate on.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::models::application::{Application, Stage};

/// Deterministic sort key: newest-first by `applied_at`, tie-broken by id
/// descending. Records without a timestamp sort as if applied at epoch 0,
/// i.e. oldest.
fn sort_key(app: &Application) -> (DateTime<Utc>, i64) {
    (
        app.applied_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        app.id,
    )
}

/// Job-scoped, stage-filtered, sorted view of the canonical set.
pub fn stage_list(
    applications: &HashMap<i64, Application>,
    stage: &Stage,
    job_filter: Option<i64>,
) -> Vec<Application> {
    let mut items: Vec<Application> = applications
        .values()
        .filter(|a| job_filter.map_or(true, |job| a.job_id == job))
        .filter(|a| a.stage == *stage)
        .cloned()
        .collect();
    items.sort_by(|a, b| sort_key(b).cmp(&sort_key(a)));
    items
}

/// Per-stage counts over the known stages, for the pipeline tabs.
pub fn stage_counts(
    applications: &HashMap<i64, Application>,
    job_filter: Option<i64>,
) -> Vec<(Stage, usize)> {
    Stage::ALL
        .iter()
        .map(|stage| {
            let count = applications
                .values()
                .filter(|a| job_filter.map_or(true, |job| a.job_id == job))
                .filter(|a| a.stage == *stage)
                .count();
            (stage.clone(), count)
        })
        .collect()
}

/// Number of client-side pages for a list of `len` items; an empty list still
/// has one (empty) page.
pub fn page_count(len: usize, page_size: usize) -> usize {
    len.div_ceil(page_size).max(1)
}

/// The slice of `list` visible on `page`.
pub fn page_slice(list: &[Application], page: usize, page_size: usize) -> &[Application] {
    let start = page.saturating_mul(page_size).min(list.len());
    let end = (start + page_size).min(list.len());
    &list[start..end]
}

//! Pipeline State Controller: the canonical in-memory application set and
//! every derived view the admin console renders.
//!
//! All mutation happens on one logical thread; the state mutex is never held
//! across an await. Every network call is a suspension point, so resolution
//! handlers re-validate relevance (load generation, current selection) before
//! touching derived state. Stage mutations are confirm-then-apply: the
//! canonical record changes only after the server accepts the transition.

pub mod derive;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use reqwest::Url;
use tracing::{debug, info, warn};

use crate::errors::ApiError;
use crate::gateway::{ApplicationsFilter, ApplicationsQuery, PortalApi};
use crate::models::application::{Application, Stage};
use crate::models::job::Job;
use crate::normalize::normalize;

/// Stepping direction, for both stage moves and pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

#[derive(Default)]
struct PipelineState {
    applications: HashMap<i64, Application>,
    jobs: HashMap<i64, Job>,
    job_filter: Option<i64>,
    active_stage: Stage,
    selected: Option<i64>,
    /// Page index per (stage, job) view.
    pages: HashMap<(Stage, Option<i64>), usize>,
    /// Applications with an outstanding stage mutation; their row actions are
    /// disabled, everything else stays live.
    in_flight: HashSet<i64>,
    /// Generation of the last load whose results were applied.
    loaded_gen: u64,
}

pub struct PipelineController {
    api: Arc<dyn PortalApi>,
    /// Backend origin for resume absolutization at normalize time.
    origin: Url,
    page_size: usize,
    state: Mutex<PipelineState>,
    /// Generation of the most recently requested load. A load whose
    /// generation is no longer current discards its results
    /// (last-requested-wins).
    load_gen: AtomicU64,
    /// Target of the load currently in flight, so an identical concurrent
    /// load can share its outcome instead of duplicating the sweep.
    pending_load: Mutex<Option<(u64, Option<i64>)>>,
    /// Serializes pagination sweeps; queued loads re-check relevance after
    /// acquiring it.
    load_lock: tokio::sync::Mutex<()>,
}

impl PipelineController {
    pub fn new(api: Arc<dyn PortalApi>, origin: Url, page_size: usize) -> Self {
        PipelineController {
            api,
            origin,
            page_size,
            state: Mutex::new(PipelineState::default()),
            load_gen: AtomicU64::new(0),
            pending_load: Mutex::new(None),
            load_lock: tokio::sync::Mutex::new(()),
        }
    }

    // ── Loading ────────────────────────────────────────────────────────────

    /// Fetches job metadata and all applications (across server pages) scoped
    /// to `job_filter`, normalizes them, and replaces the canonical set.
    /// Resets pagination and the active stage, and selects the first
    /// application of the default stage.
    ///
    /// Concurrent loads never race: a load superseded by a newer request
    /// discards its results, and a load issued for the target already in
    /// flight shares that sweep's outcome instead of refetching.
    pub async fn load(&self, job_filter: Option<i64>) -> Result<(), ApiError> {
        let my_gen = {
            let mut pending = self
                .pending_load
                .lock()
                .expect("pending load lock poisoned");
            match *pending {
                Some((gen, target)) if target == job_filter => gen,
                _ => {
                    let gen = self.load_gen.fetch_add(1, Ordering::SeqCst) + 1;
                    *pending = Some((gen, job_filter));
                    gen
                }
            }
        };

        let _sweep = self.load_lock.lock().await;

        // An identical load finished while we queued for the sweep.
        if self.state().loaded_gen >= my_gen {
            debug!(gen = my_gen, "load satisfied by a shared sweep");
            return Ok(());
        }
        // A newer load was requested before this one started.
        if self.load_gen.load(Ordering::SeqCst) != my_gen {
            debug!(gen = my_gen, "load superseded before starting");
            return Ok(());
        }

        let result = self.fetch_and_apply(my_gen, job_filter).await;

        let mut pending = self
            .pending_load
            .lock()
            .expect("pending load lock poisoned");
        if *pending == Some((my_gen, job_filter)) {
            *pending = None;
        }
        result
    }

    async fn fetch_and_apply(&self, my_gen: u64, job_filter: Option<i64>) -> Result<(), ApiError> {
        let jobs = self.api.fetch_all_jobs().await?;
        let query = ApplicationsQuery::Filter(ApplicationsFilter {
            job: job_filter,
            ..Default::default()
        });
        let raws = self.api.fetch_all_applications(query).await?;

        let mut state = self.state();
        // Relevance check after the suspension point: only the latest
        // requested load may replace the canonical set.
        if self.load_gen.load(Ordering::SeqCst) != my_gen {
            debug!(gen = my_gen, "discarding results of a superseded load");
            return Ok(());
        }

        let titles: HashMap<i64, String> =
            jobs.iter().map(|j| (j.id, j.title.clone())).collect();
        state.applications.clear();
        for raw in raws {
            let app = normalize(raw, &titles, &self.origin);
            // Keyed by id: a duplicate in the same sweep overwrites.
            state.applications.insert(app.id, app);
        }
        state.jobs = jobs.into_iter().map(|j| (j.id, j)).collect();
        state.job_filter = job_filter;
        state.active_stage = Stage::default();
        state.pages.clear();
        state.in_flight.clear();
        let selected = derive::stage_list(&state.applications, &state.active_stage, job_filter)
            .first()
            .map(|a| a.id);
        state.selected = selected;
        state.loaded_gen = my_gen;
        info!(
            applications = state.applications.len(),
            job = ?job_filter,
            "pipeline loaded"
        );
        Ok(())
    }

    // ── Stage filter, selection, pagination ────────────────────────────────

    /// Changes the stage filter, resets pagination to the first page, and
    /// reselects the first item of the new list.
    pub fn set_active_stage(&self, stage: Stage) {
        let mut state = self.state();
        state.active_stage = stage;
        let list = derive::stage_list(&state.applications, &state.active_stage, state.job_filter);
        let key = (state.active_stage.clone(), state.job_filter);
        state.pages.insert(key, 0);
        state.selected = list.first().map(|a| a.id);
    }

    pub fn active_stage(&self) -> Stage {
        self.state().active_stage.clone()
    }

    pub fn job_filter(&self) -> Option<i64> {
        self.state().job_filter
    }

    /// Selects an application if it is visible in the active view.
    pub fn select(&self, id: i64) -> bool {
        let mut state = self.state();
        let visible =
            derive::stage_list(&state.applications, &state.active_stage, state.job_filter)
                .iter()
                .any(|a| a.id == id);
        if visible {
            state.selected = Some(id);
        }
        visible
    }

    pub fn selected(&self) -> Option<Application> {
        let state = self.state();
        state
            .selected
            .and_then(|id| state.applications.get(&id).cloned())
    }

    /// Advances or retreats the page of the current (stage, job) view.
    /// Client-side only; never refetches. Returns the new page index.
    pub fn paginate(&self, direction: Direction) -> usize {
        let mut state = self.state();
        let len =
            derive::stage_list(&state.applications, &state.active_stage, state.job_filter).len();
        let pages = derive::page_count(len, self.page_size);
        let key = (state.active_stage.clone(), state.job_filter);
        let current = state.pages.get(&key).copied().unwrap_or(0);
        let new = match direction {
            Direction::Next => (current + 1).min(pages - 1),
            Direction::Previous => current.saturating_sub(1),
        };
        state.pages.insert(key, new);
        new
    }

    pub fn page_index(&self) -> usize {
        let state = self.state();
        let key = (state.active_stage.clone(), state.job_filter);
        state.pages.get(&key).copied().unwrap_or(0)
    }

    /// The visible slice of the active stage list.
    pub fn current_page(&self) -> Vec<Application> {
        let state = self.state();
        let list = derive::stage_list(&state.applications, &state.active_stage, state.job_filter);
        let key = (state.active_stage.clone(), state.job_filter);
        let page = state.pages.get(&key).copied().unwrap_or(0);
        derive::page_slice(&list, page, self.page_size).to_vec()
    }

    // ── Derived read views ─────────────────────────────────────────────────

    pub fn stage_list(&self, stage: &Stage) -> Vec<Application> {
        let state = self.state();
        derive::stage_list(&state.applications, stage, state.job_filter)
    }

    pub fn stage_counts(&self) -> Vec<(Stage, usize)> {
        let state = self.state();
        derive::stage_counts(&state.applications, state.job_filter)
    }

    pub fn application(&self, id: i64) -> Option<Application> {
        self.state().applications.get(&id).cloned()
    }

    pub fn job(&self, id: i64) -> Option<Job> {
        self.state().jobs.get(&id).cloned()
    }

    pub fn total_count(&self) -> usize {
        self.state().applications.len()
    }

    pub fn is_in_flight(&self, id: i64) -> bool {
        self.state().in_flight.contains(&id)
    }

    /// Button enablement: whether a stage step is currently possible for this
    /// row.
    pub fn can_step(&self, id: i64, direction: Direction) -> bool {
        let state = self.state();
        if state.in_flight.contains(&id) {
            return false;
        }
        state.applications.get(&id).is_some_and(|a| match direction {
            Direction::Next => a.stage.next().is_some(),
            Direction::Previous => a.stage.previous().is_some(),
        })
    }

    // ── Stage mutations (confirm-then-apply) ───────────────────────────────

    /// Steps an application along the pipeline. A missing neighbor in the
    /// requested direction is a no-op with no network call.
    pub async fn move_stage(&self, id: i64, direction: Direction) -> Result<(), ApiError> {
        let target = {
            let state = self.state();
            let Some(app) = state.applications.get(&id) else {
                return Ok(());
            };
            if state.in_flight.contains(&id) {
                return Ok(());
            }
            let target = match direction {
                Direction::Next => app.stage.next(),
                Direction::Previous => app.stage.previous(),
            };
            match target {
                Some(target) => target,
                None => return Ok(()),
            }
        };
        self.transition(id, target).await
    }

    /// Unconditionally rejects a candidate. Available from any non-terminal
    /// recognized stage.
    pub async fn disqualify(&self, id: i64) -> Result<(), ApiError> {
        let allowed = {
            let state = self.state();
            state
                .applications
                .get(&id)
                .is_some_and(|a| a.stage.is_active())
        };
        if !allowed {
            return Ok(());
        }
        self.transition(id, Stage::Rejected).await
    }

    /// Puts a rejected candidate back at the start of the pipeline.
    pub async fn restore(&self, id: i64) -> Result<(), ApiError> {
        let allowed = {
            let state = self.state();
            state
                .applications
                .get(&id)
                .is_some_and(|a| a.stage == Stage::Rejected)
        };
        if !allowed {
            return Ok(());
        }
        self.transition(id, Stage::Applied).await
    }

    async fn transition(&self, id: i64, target: Stage) -> Result<(), ApiError> {
        {
            let mut state = self.state();
            if !state.in_flight.insert(id) {
                debug!(application = id, "transition already in flight");
                return Ok(());
            }
        }

        let result = self.api.update_application_stage(id, &target).await;

        let mut state = self.state();
        // Cleared on every path; a failed call must not leave the row stuck.
        state.in_flight.remove(&id);
        match result {
            Ok(()) => {
                self.apply_confirmed_stage(&mut state, id, target);
                Ok(())
            }
            Err(e) => {
                warn!(application = id, stage = %target, "stage update failed: {e}");
                Err(e)
            }
        }
    }

    /// Applies a server-confirmed stage to the canonical record and repairs
    /// the selection if the moved row left the active list. The record update
    /// is unconditional (the data is correct even if the user navigated
    /// away); only selection is relevance-checked.
    fn apply_confirmed_stage(&self, state: &mut PipelineState, id: i64, target: Stage) {
        let was_selected = state.selected == Some(id);
        let old_index = if was_selected {
            derive::stage_list(&state.applications, &state.active_stage, state.job_filter)
                .iter()
                .position(|a| a.id == id)
        } else {
            None
        };

        match state.applications.get_mut(&id) {
            Some(app) => app.stage = target.clone(),
            None => {
                // A reload replaced the set while the PATCH was in flight.
                debug!(application = id, "confirmed stage for an unloaded application");
                return;
            }
        }

        if was_selected && target != state.active_stage {
            let list =
                derive::stage_list(&state.applications, &state.active_stage, state.job_filter);
            state.selected = match old_index {
                Some(index) if !list.is_empty() => Some(list[index.min(list.len() - 1)].id),
                _ => list.first().map(|a| a.id),
            };
        }
    }

    fn state(&self) -> MutexGuard<'_, PipelineState> {
        self.state.lock().expect("pipeline state lock poisoned")
    }
}

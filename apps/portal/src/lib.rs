//! Recruiting-portal client: typed API gateway, auth session management, and
//! the candidate-pipeline state controller.
//!
//! Presentation layers (web, TUI, anything) drive `PipelineController` and
//! render its derived views; the controller talks to the backend through
//! `ApiClient`, which routes every authenticated call through `AuthSession`.

pub mod config;
pub mod errors;
pub mod gateway;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod session;

pub use config::Config;
pub use errors::ApiError;
pub use gateway::{
    ApiClient, ApplicationForm, ApplicationsFilter, ApplicationsQuery, PortalApi, ResumeFile,
};
pub use models::{Application, Job, Session, Stage};
pub use pipeline::{Direction, PipelineController};
pub use session::store::{FileSessionStore, MemorySessionStore, SessionStore};
pub use session::AuthSession;

pub mod application;
pub mod job;
pub mod session;
pub mod wire;

pub use application::{Application, Stage};
pub use job::Job;
pub use session::Session;

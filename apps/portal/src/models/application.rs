use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A candidate-application's position in the hiring pipeline.
///
/// `Other` carries unrecognized server strings verbatim (lower-cased). It is
/// never produced by client-side transitions and has no valid next/previous
/// step, so rows in an unknown stage degrade to read-only instead of erroring.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Stage {
    Applied,
    Screening,
    Interview,
    Hired,
    Rejected,
    Other(String),
}

impl Stage {
    /// The five known stages, in pipeline order. `Other` is deliberately absent.
    pub const ALL: [Stage; 5] = [
        Stage::Applied,
        Stage::Screening,
        Stage::Interview,
        Stage::Hired,
        Stage::Rejected,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Stage::Applied => "applied",
            Stage::Screening => "screening",
            Stage::Interview => "interview",
            Stage::Hired => "hired",
            Stage::Rejected => "rejected",
            Stage::Other(s) => s,
        }
    }

    /// Human-readable tab label.
    pub fn label(&self) -> &str {
        match self {
            Stage::Applied => "Applied",
            Stage::Screening => "Phone Screen",
            Stage::Interview => "Interview",
            Stage::Hired => "Offer / Hired",
            Stage::Rejected => "Disqualified",
            Stage::Other(s) => s,
        }
    }

    /// The next stage along the stepping order
    /// `applied -> screening -> interview -> hired`.
    ///
    /// "Next" from interview is the hire action; hired and rejected are
    /// terminal and cannot be stepped out of (rejected is exited via restore
    /// only). Unrecognized stages have no steps.
    pub fn next(&self) -> Option<Stage> {
        match self {
            Stage::Applied => Some(Stage::Screening),
            Stage::Screening => Some(Stage::Interview),
            Stage::Interview => Some(Stage::Hired),
            _ => None,
        }
    }

    /// The previous stage, defined only within the three active stages.
    pub fn previous(&self) -> Option<Stage> {
        match self {
            Stage::Screening => Some(Stage::Applied),
            Stage::Interview => Some(Stage::Screening),
            _ => None,
        }
    }

    /// True for stages that can still be disqualified (any non-terminal,
    /// recognized stage).
    pub fn is_active(&self) -> bool {
        matches!(self, Stage::Applied | Stage::Screening | Stage::Interview)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Hired | Stage::Rejected)
    }
}

impl Default for Stage {
    fn default() -> Self {
        Stage::Applied
    }
}

impl From<String> for Stage {
    fn from(raw: String) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "applied" => Stage::Applied,
            "screening" => Stage::Screening,
            "interview" => Stage::Interview,
            "hired" => Stage::Hired,
            "rejected" => Stage::Rejected,
            other => Stage::Other(other.to_string()),
        }
    }
}

impl From<Stage> for String {
    fn from(stage: Stage) -> Self {
        stage.as_str().to_string()
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical, client-side application record. Produced by the normalizer;
/// only the controller ever mutates `stage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: i64,
    pub stage: Stage,
    pub job_id: i64,
    pub job_title: String,
    pub candidate_name: String,
    pub candidate_email: String,
    pub phone: String,
    /// Empty string, or an absolute, directly dereferenceable URL.
    pub resume_link: String,
    /// Ordering timestamp; records without one sort as oldest.
    pub applied_at: Option<DateTime<Utc>>,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a job. Variants are declared in lifecycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Created,
    Unavailable,
    Queued,
    Running,
    Completed,
    Failed,
    Canceled,
}

impl JobState {
    /// States the scheduler polls the store for during discovery, in poll order.
    pub const PENDING: [JobState; 2] = [JobState::Unavailable, JobState::Created];

    pub fn is_pending(self) -> bool {
        matches!(self, JobState::Created | JobState::Unavailable)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Created => write!(f, "created"),
            JobState::Unavailable => write!(f, "unavailable"),
            JobState::Queued => write!(f, "queued"),
            JobState::Running => write!(f, "running"),
            JobState::Completed => write!(f, "completed"),
            JobState::Failed => write!(f, "failed"),
            JobState::Canceled => write!(f, "canceled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub provider: String,
    pub payload: String,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(provider: impl Into<String>, payload: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            provider: provider.into(),
            payload: payload.into(),
            state: JobState::Created,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_state(mut self, state: JobState) -> Self {
        self.state = state;
        self
    }
}

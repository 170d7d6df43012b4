use crate::worker::WorkerAddr;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

pub type JobId = String;

pub const PRIORITY_LOW: i32 = 0;
pub const PRIORITY_NORMAL: i32 = 1;
pub const PRIORITY_HIGH: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Dead,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Dead)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Dead => "DEAD",
        };
        f.write_str(s)
    }
}

/// A unit of work. Payload format is `<skill>|<data...>`; the leading field
/// selects the worker capability that executes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub payload: String,
    pub priority: i32,
    pub scheduled_at: DateTime<Utc>,
    pub status: JobStatus,
    pub retry_count: u32,
    pub dependencies: Vec<JobId>,
    pub satisfied: HashSet<JobId>,
    pub affinity: bool,
    pub bound_worker: Option<WorkerAddr>,
}

impl Job {
    /// Ad-hoc job with a generated id.
    pub fn new(payload: impl Into<String>, priority: i32, delay_ms: i64) -> Self {
        Self::with_id(
            Uuid::new_v4().to_string(),
            payload,
            priority,
            delay_ms,
            Vec::new(),
            false,
        )
    }

    /// DAG node with a caller-supplied id and dependency set.
    pub fn with_id(
        id: impl Into<JobId>,
        payload: impl Into<String>,
        priority: i32,
        delay_ms: i64,
        dependencies: Vec<JobId>,
        affinity: bool,
    ) -> Self {
        Self {
            id: id.into(),
            payload: payload.into(),
            priority,
            scheduled_at: Utc::now() + Duration::milliseconds(delay_ms),
            status: JobStatus::Pending,
            retry_count: 0,
            dependencies,
            satisfied: HashSet::new(),
            affinity,
            bound_worker: None,
        }
    }

    /// Leading pipe-delimited field of the payload.
    pub fn skill(&self) -> &str {
        self.payload.split('|').next().unwrap_or("")
    }

    /// A job is ready iff every declared dependency has been satisfied.
    pub fn is_ready(&self) -> bool {
        self.dependencies.iter().all(|d| self.satisfied.contains(d))
    }

    /// Mark a parent as completed. Idempotent; unknown parents are ignored.
    pub fn satisfy(&mut self, parent_id: &str) {
        if self.dependencies.iter().any(|d| d == parent_id) {
            self.satisfied.insert(parent_id.to_string());
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_at <= now
    }

    pub fn increment_retry(&mut self) {
        self.retry_count += 1;
    }
}

impl std::fmt::Display for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] job {} (retries: {})",
            self.status, self.id, self.retry_count
        )
    }
}

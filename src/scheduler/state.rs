//! Per-task supervision state and the read-only health views built from it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lifecycle of a scheduled name.
///
/// ```text
/// pending ──► running ──┬─► failed ──► running (restart)
///    ▲                  │      └─────► failed  (exhausted / fatal)
///    └── (no budget) ───┤
///                       ├─► cancelled
///                       └─► completed (run action returned Ok)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Failed,
    Cancelled,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable supervision record; owned by the scheduler.
#[derive(Debug, Clone)]
pub(crate) struct TaskState {
    pub status: TaskStatus,
    pub last_error: Option<String>,
    pub restarts: u32,
    pub last_heartbeat: DateTime<Utc>,
}

impl TaskState {
    pub fn pending() -> Self {
        Self {
            status: TaskStatus::Pending,
            last_error: None,
            restarts: 0,
            last_heartbeat: Utc::now(),
        }
    }

    pub fn health(&self) -> TaskHealth {
        TaskHealth {
            status: self.status,
            last_error: self.last_error.clone(),
            restarts: self.restarts,
            last_heartbeat: self.last_heartbeat,
        }
    }
}

/// Read-only view of one task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskHealth {
    pub status: TaskStatus,
    pub last_error: Option<String>,
    pub restarts: u32,
    pub last_heartbeat: DateTime<Utc>,
}

/// Read-only view of the whole scheduler.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    /// Per task name, sorted.
    pub tasks: BTreeMap<String, TaskHealth>,
    pub power_used: f64,
    pub power_budget: f64,
}

impl HealthSnapshot {
    pub fn get(&self, name: &str) -> Option<&TaskHealth> {
        self.tasks.get(name)
    }

    /// Names currently in `status`, sorted.
    pub fn with_status(&self, status: TaskStatus) -> Vec<&str> {
        self.tasks
            .iter()
            .filter(|(_, h)| h.status == status)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

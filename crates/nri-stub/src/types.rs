//! Envelopes wrapping events and replies on the host connection.

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// Identifies one event delivered to one plugin.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

/// An event as streamed to a plugin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskItem<T> {
    pub id: TaskId,
    pub data: T,
    /// When the host queued the event, used for reply latency
    pub queued_at: DateTime<Utc>,
}

impl<T> TaskItem<T> {
    pub fn new(data: T) -> Self {
        Self {
            id: TaskId::new(),
            data,
            queued_at: Utc::now(),
        }
    }
}

/// A plugin's answer to one [`TaskItem`]: the reply, or the handler's error
/// message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult<R> {
    pub task_id: TaskId,
    pub plugin_id: String,
    pub outcome: Result<R, String>,
}

impl<R> TaskResult<R> {
    pub fn success(task_id: TaskId, plugin_id: impl Into<String>, reply: R) -> Self {
        Self {
            task_id,
            plugin_id: plugin_id.into(),
            outcome: Ok(reply),
        }
    }

    pub fn failure(task_id: TaskId, plugin_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            task_id,
            plugin_id: plugin_id.into(),
            outcome: Err(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

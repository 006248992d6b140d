//! Modelo de Task
//!
//! Tasks belong to one order. The status travels as its ordinal on the wire
//! and in the `tasks.status` column.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Task status - ordinal values 0, 1, 2
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum TaskStatus {
    #[default]
    ToDo,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("invalid task status ordinal {0}, expected 0 (ToDo), 1 (InProgress) or 2 (Completed)")]
pub struct InvalidTaskStatus(pub i32);

impl TryFrom<i32> for TaskStatus {
    type Error = InvalidTaskStatus;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TaskStatus::ToDo),
            1 => Ok(TaskStatus::InProgress),
            2 => Ok(TaskStatus::Completed),
            other => Err(InvalidTaskStatus(other)),
        }
    }
}

impl From<TaskStatus> for i32 {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::ToDo => 0,
            TaskStatus::InProgress => 1,
            TaskStatus::Completed => 2,
        }
    }
}

/// Task owned by an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub description: String,
    pub assigned_to: Option<String>,
    pub status: TaskStatus,
    pub priority: Option<i32>,
    pub due_date: Option<DateTime<Utc>>,
    pub created_date: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            assigned_to: None,
            status: TaskStatus::ToDo,
            priority: None,
            due_date: None,
            created_date: None,
        }
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status != TaskStatus::Completed && self.due_date.map(|due| due < now).unwrap_or(false)
    }
}

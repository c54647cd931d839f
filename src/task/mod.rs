//! Task module - task entities and the lifecycle state machine.
//!
//! A task moves `pending -> claimed -> in_progress -> completed -> approved`,
//! with `reject` (back to in_progress), `reassign` (back to pending, assignee
//! cleared) and an administrative terminal `cancelled`. All mutation goes
//! through validated transitions; the table lives in [`machine`].

pub mod machine;
pub mod registry;

pub use machine::{transition, AssigneeEffect, Gate, PointsEffect, TransitionSpec};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Domain category for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskType {
    /// Project management
    PM,
    /// Family/household labor
    FTL,
    /// Personal advancement
    PA,
    /// Universal basic income (recurring baseline tasks)
    UBI,
}

impl TaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PM => "PM",
            Self::FTL => "FTL",
            Self::PA => "PA",
            Self::UBI => "UBI",
        }
    }

    pub fn parse(s: &str) -> Option<TaskType> {
        match s {
            "PM" => Some(Self::PM),
            "FTL" => Some(Self::FTL),
            "PA" => Some(Self::PA),
            "UBI" => Some(Self::UBI),
            _ => None,
        }
    }
}

/// Lifecycle status. `Approved` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Claimed,
    InProgress,
    Completed,
    Approved,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Claimed => "claimed",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Approved => "approved",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<TaskStatus> {
        match s {
            "pending" => Some(Self::Pending),
            "claimed" => Some(Self::Claimed),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "approved" => Some(Self::Approved),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Cancelled)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An action a caller may request on a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskAction {
    Claim,
    Start,
    Submit,
    Approve,
    Reject,
    Reassign,
    Cancel,
}

impl TaskAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Claim => "claim",
            Self::Start => "start",
            Self::Submit => "submit",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Reassign => "reassign",
            Self::Cancel => "cancel",
        }
    }

    pub fn parse(s: &str) -> Option<TaskAction> {
        match s {
            "claim" => Some(Self::Claim),
            "start" => Some(Self::Start),
            "submit" => Some(Self::Submit),
            "approve" => Some(Self::Approve),
            "reject" => Some(Self::Reject),
            "reassign" => Some(Self::Reassign),
            "cancel" => Some(Self::Cancel),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chore task as stored and returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub task_type: TaskType,
    /// Point value awarded on approval. Never negative.
    pub points: i64,
    pub status: TaskStatus,
    pub created_by: i64,
    pub assignee_id: Option<i64>,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for task creation.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub task_type: TaskType,
    pub points: i64,
    pub due_date: Option<DateTime<Utc>>,
}

impl NewTask {
    /// Reject malformed input before anything touches storage.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("task title must not be empty".to_string());
        }
        if self.points < 0 {
            return Err("task points must not be negative".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_validation() {
        let task = NewTask {
            title: "Dishes".to_string(),
            description: String::new(),
            task_type: TaskType::FTL,
            points: 25,
            due_date: None,
        };
        assert!(task.validate().is_ok());

        let empty_title = NewTask {
            title: "   ".to_string(),
            ..task.clone()
        };
        assert!(empty_title.validate().is_err());

        let negative = NewTask { points: -1, ..task };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Claimed,
            TaskStatus::InProgress,
            TaskStatus::Completed,
            TaskStatus::Approved,
            TaskStatus::Cancelled,
        ] {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::parse("rejected"), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(TaskStatus::Approved.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::Completed.is_terminal());
    }
}

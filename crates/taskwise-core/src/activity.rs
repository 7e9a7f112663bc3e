use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    Created,
    Updated,
    StatusChanged,
    ProgressUpdated,
    Commented,
    AttachmentAdded,
    AttachmentRemoved,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::Created => "created",
            ActivityAction::Updated => "updated",
            ActivityAction::StatusChanged => "status_changed",
            ActivityAction::ProgressUpdated => "progress_updated",
            ActivityAction::Commented => "commented",
            ActivityAction::AttachmentAdded => "attachment_added",
            ActivityAction::AttachmentRemoved => "attachment_removed",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "created" => Some(ActivityAction::Created),
            "updated" => Some(ActivityAction::Updated),
            "status_changed" => Some(ActivityAction::StatusChanged),
            "progress_updated" => Some(ActivityAction::ProgressUpdated),
            "commented" => Some(ActivityAction::Commented),
            "attachment_added" => Some(ActivityAction::AttachmentAdded),
            "attachment_removed" => Some(ActivityAction::AttachmentRemoved),
            _ => None,
        }
    }
}

/// One line of a task's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskActivity {
    pub id: i64,
    pub task_id: i64,
    pub user_id: i64,
    pub action: ActivityAction,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateActivity {
    pub task_id: i64,
    pub user_id: i64,
    pub action: ActivityAction,
    pub description: String,
}

impl CreateActivity {
    pub fn new(task_id: i64, user_id: i64, action: ActivityAction, description: impl Into<String>) -> Self {
        Self {
            task_id,
            user_id,
            action,
            description: description.into(),
        }
    }
}

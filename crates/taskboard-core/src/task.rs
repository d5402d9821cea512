use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::datetime::api_timestamp;

pub type TaskId = u64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,

    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub completed: bool,

    #[serde(with = "api_timestamp")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "api_timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Description with empty strings folded into `None`.
    pub fn description(&self) -> Option<&str> {
        self.description
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }
}

/// Body of `POST /api/tasks`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: String,
}

/// Body of `PUT /api/tasks/{id}`. Absent fields stay untouched on the server.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl TaskPatch {
    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.completed.is_none()
    }
}

/// Unsaved input for a new task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub title: String,
    pub description: String,
}

impl Draft {
    pub fn is_blank(&self) -> bool {
        self.title.trim().is_empty()
    }

    pub fn to_new_task(&self) -> NewTask {
        NewTask {
            title: self.title.clone(),
            description: self.description.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Health {
    pub status: String,

    #[serde(default)]
    pub timestamp: Option<String>,

    #[serde(default)]
    pub database: Option<String>,

    #[serde(default)]
    pub error: Option<String>,
}

impl Health {
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Draft, Task, TaskPatch};

    #[test]
    fn decodes_flask_task_payload() {
        let task: Task = serde_json::from_value(json!({
            "id": 7,
            "title": "Ship it",
            "description": null,
            "completed": true,
            "created_at": "2024-03-01T09:15:00.123456",
            "updated_at": "2024-03-02T10:00:00"
        }))
        .expect("task should decode");

        assert_eq!(task.id, 7);
        assert!(task.completed);
        assert_eq!(task.description(), None);
        assert_eq!(
            task.created_at.format("%Y-%m-%d %H:%M").to_string(),
            "2024-03-01 09:15"
        );
    }

    #[test]
    fn missing_completed_defaults_to_false() {
        let task: Task = serde_json::from_value(json!({
            "id": 1,
            "title": "x",
            "created_at": "2024-03-01T09:15:00Z",
            "updated_at": "2024-03-01T09:15:00Z"
        }))
        .expect("task should decode");

        assert!(!task.completed);
        assert_eq!(task.description, None);
    }

    #[test]
    fn toggle_patch_only_carries_completed() {
        let body = serde_json::to_value(TaskPatch::completed(true)).expect("encode patch");
        assert_eq!(body, json!({ "completed": true }));
    }

    #[test]
    fn whitespace_title_is_blank() {
        let draft = Draft {
            title: "  \t ".to_string(),
            description: "still here".to_string(),
        };
        assert!(draft.is_blank());
    }
}

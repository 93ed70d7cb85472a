//! Task board endpoints.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::credentials::{opt_string_or_number, string_or_number};
use crate::error::ApiError;
use crate::pipeline::{ApiClient, ApiRequest, path_segment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        Self::Pending,
        Self::InProgress,
        Self::Completed,
        Self::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| format!("unknown task status `{s}`"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub const ALL: [TaskPriority; 4] = [Self::Low, Self::Medium, Self::High, Self::Urgent];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|priority| priority.as_str() == normalized)
            .ok_or_else(|| format!("unknown task priority `{s}`"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub assigned_to: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub created_by: Option<String>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Whether the task is still open past its due date.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status.is_open() && self.due_date.is_some_and(|due| due < now)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub priority: TaskPriority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Partial update; only set fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
}

impl TaskUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Query filter for [`TasksApi::list`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assigned_to: Option<String>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl TaskFilter {
    fn apply(&self, mut request: ApiRequest) -> ApiRequest {
        if let Some(status) = self.status {
            request = request.query("status", status);
        }
        if let Some(priority) = self.priority {
            request = request.query("priority", priority);
        }
        if let Some(assignee) = &self.assigned_to {
            request = request.query("assignedTo", assignee);
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            request = request.query("search", search.trim());
        }
        if let Some(page) = self.page {
            request = request.query("page", page);
        }
        if let Some(limit) = self.limit {
            request = request.query("limit", limit);
        }
        request
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskStats {
    pub total: u32,
    pub pending: u32,
    pub in_progress: u32,
    pub completed: u32,
    pub cancelled: u32,
    pub overdue: u32,
}

/// The server answers list calls either with a bare array or wrapped.
#[derive(Deserialize)]
#[serde(untagged)]
enum TaskList {
    Bare(Vec<Task>),
    Wrapped { tasks: Vec<Task> },
}

impl From<TaskList> for Vec<Task> {
    fn from(list: TaskList) -> Self {
        match list {
            TaskList::Bare(tasks) | TaskList::Wrapped { tasks } => tasks,
        }
    }
}

#[derive(Serialize)]
struct StatusChange {
    status: TaskStatus,
}

pub struct TasksApi<'a> {
    client: &'a ApiClient,
}

impl<'a> TasksApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>, ApiError> {
        let request = filter.apply(ApiRequest::get("/tasks"));
        let list: TaskList = self.client.execute_json(&request, "task list").await?;
        Ok(list.into())
    }

    pub async fn get(&self, id: &str) -> Result<Task, ApiError> {
        let path = format!("/tasks/{}", path_segment(id)?);
        self.client.execute_json(&ApiRequest::get(path), "task").await
    }

    pub async fn create(&self, task: &NewTask) -> Result<Task, ApiError> {
        let request = ApiRequest::post("/tasks").json(task)?;
        self.client.execute_json(&request, "task").await
    }

    pub async fn update(&self, id: &str, update: &TaskUpdate) -> Result<Task, ApiError> {
        let path = format!("/tasks/{}", path_segment(id)?);
        let request = ApiRequest::put(path).json(update)?;
        self.client.execute_json(&request, "task").await
    }

    pub async fn update_status(&self, id: &str, status: TaskStatus) -> Result<Task, ApiError> {
        let path = format!("/tasks/{}/status", path_segment(id)?);
        let request = ApiRequest::patch(path).json(&StatusChange { status })?;
        self.client.execute_json(&request, "task").await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        let path = format!("/tasks/{}", path_segment(id)?);
        self.client.execute_empty(&ApiRequest::delete(path)).await
    }

    pub async fn stats(&self) -> Result<TaskStats, ApiError> {
        self.client
            .execute_json(&ApiRequest::get("/tasks/stats"), "task stats")
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("pending", TaskStatus::Pending)]
    #[case("in-progress", TaskStatus::InProgress)]
    #[case("In Progress", TaskStatus::InProgress)]
    #[case("COMPLETED", TaskStatus::Completed)]
    fn test_status_parsing(#[case] input: &str, #[case] expected: TaskStatus) {
        assert_eq!(input.parse::<TaskStatus>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_status_rejected() {
        assert!("archived".parse::<TaskStatus>().is_err());
        assert!("critical".parse::<TaskPriority>().is_err());
    }

    #[test]
    fn test_task_list_accepts_both_shapes() {
        let bare = r#"[{"id":1,"title":"Write report","status":"pending"}]"#;
        let wrapped = r#"{"tasks":[{"id":"t-2","title":"Review","status":"in_progress","priority":"high","assignedTo":7}]}"#;

        let bare: Vec<Task> = serde_json::from_str::<TaskList>(bare).unwrap().into();
        assert_eq!(bare[0].id, "1");
        assert_eq!(bare[0].priority, TaskPriority::Medium);
        assert_eq!(bare[0].assigned_to, None);

        let wrapped: Vec<Task> = serde_json::from_str::<TaskList>(wrapped).unwrap().into();
        assert_eq!(wrapped[0].status, TaskStatus::InProgress);
        assert_eq!(wrapped[0].assigned_to.as_deref(), Some("7"));
    }

    #[test]
    fn test_filter_query_encoding() {
        let filter = TaskFilter {
            status: Some(TaskStatus::InProgress),
            search: Some("  ".to_string()),
            limit: Some(20),
            ..TaskFilter::default()
        };
        let request = filter.apply(ApiRequest::get("/tasks"));
        assert_eq!(
            request.query_pairs(),
            &[
                ("status".to_string(), "in_progress".to_string()),
                ("limit".to_string(), "20".to_string()),
            ]
        );
    }

    #[test]
    fn test_update_serializes_only_set_fields() {
        let update = TaskUpdate {
            priority: Some(TaskPriority::Urgent),
            ..TaskUpdate::default()
        };
        assert!(!update.is_empty());
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            serde_json::json!({"priority": "urgent"})
        );
    }

    #[test]
    fn test_overdue() {
        let now = Utc::now();
        let mut task: Task =
            serde_json::from_str(r#"{"id":1,"title":"x","status":"pending"}"#).unwrap();
        assert!(!task.is_overdue(now));
        task.due_date = Some(now - chrono::Duration::hours(1));
        assert!(task.is_overdue(now));
        task.status = TaskStatus::Completed;
        assert!(!task.is_overdue(now));
    }
}

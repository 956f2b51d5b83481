//! Todoist destination provider (REST API v1, static bearer token)

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{error_for_status, parse_url, DestinationProvider, ProviderResult};
use crate::task::{Due, NewTask, PriorityScale, Task, TaskId};

pub const TODOIST_API_URL: &str = "https://api.todoist.com/api/v1";

const USER_AGENT: &str = concat!("tasksync/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the Todoist REST API.
pub struct TodoistClient {
    http: reqwest::Client,
    base_url: String,
    api_token: String,
    project_id: Option<String>,
}

impl TodoistClient {
    pub fn new(api_token: impl Into<String>) -> ProviderResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: TODOIST_API_URL.to_string(),
            api_token: api_token.into(),
            project_id: None,
        })
    }

    /// Point the client at a different API root (used by tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Restrict listing and creation to one project
    pub fn with_project(mut self, project_id: Option<String>) -> Self {
        self.project_id = project_id;
        self
    }

    fn tasks_url(&self) -> String {
        format!("{}/tasks", self.base_url)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TaskListResponse {
    Page {
        results: Vec<TodoistTask>,
        #[serde(default)]
        next_cursor: Option<String>,
    },
    Bare(Vec<TodoistTask>),
}

#[derive(Debug, Deserialize)]
struct TodoistTask {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    priority: Option<u8>,
    #[serde(default)]
    due: Option<TodoistDue>,
    #[serde(default)]
    checked: bool,
    #[serde(default)]
    is_completed: bool,
    #[serde(default, alias = "created_at")]
    added_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TodoistDue {
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    datetime: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Str(String),
        Num(u64),
    }

    Ok(match Repr::deserialize(deserializer)? {
        Repr::Str(s) => s,
        Repr::Num(n) => n.to_string(),
    })
}

impl TodoistTask {
    fn into_task(self) -> Option<Task> {
        if self.content.trim().is_empty() {
            return None;
        }

        let due = self
            .due
            .and_then(|d| d.datetime.or(d.date))
            .and_then(|raw| Due::parse(&raw));
        let created_at = self
            .added_at
            .and_then(|raw| chrono::DateTime::parse_from_rfc3339(&raw).ok())
            .map(|dt| dt.with_timezone(&chrono::Utc));

        Some(Task {
            id: TaskId::new(self.id),
            title: self.content,
            description: self.description.filter(|d| !d.is_empty()),
            due,
            priority: self.priority,
            completed: self.checked || self.is_completed,
            created_at,
        })
    }
}

#[derive(Debug, Serialize)]
struct CreateTaskBody<'a> {
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    due_datetime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    priority: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    project_id: Option<&'a str>,
}

impl<'a> CreateTaskBody<'a> {
    fn new(task: &'a NewTask, project_id: Option<&'a str>) -> Self {
        let (due_date, due_datetime) = match task.due {
            Some(Due::Date(date)) => (Some(date.format("%Y-%m-%d").to_string()), None),
            Some(Due::DateTime(dt)) => (None, Some(dt.to_rfc3339())),
            None => (None, None),
        };

        Self {
            content: &task.title,
            description: task.description.as_deref().filter(|d| !d.is_empty()),
            due_date,
            due_datetime,
            priority: task.priority,
            project_id,
        }
    }
}

#[async_trait]
impl DestinationProvider for TodoistClient {
    fn name(&self) -> &str {
        "todoist"
    }

    fn priority_scale(&self) -> PriorityScale {
        PriorityScale::TODOIST
    }

    async fn list_open_tasks(&self) -> ProviderResult<Vec<Task>> {
        let mut tasks = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut url = parse_url(&self.tasks_url())?;
            {
                let mut query = url.query_pairs_mut();
                if let Some(project_id) = &self.project_id {
                    query.append_pair("project_id", project_id);
                }
                if let Some(cursor) = &cursor {
                    query.append_pair("cursor", cursor);
                }
            }
            if url.query() == Some("") {
                url.set_query(None);
            }

            let response = self
                .http
                .get(url)
                .bearer_auth(&self.api_token)
                .send()
                .await?;
            let page: TaskListResponse = error_for_status(response).await?.json().await?;

            let (items, next) = match page {
                TaskListResponse::Page {
                    results,
                    next_cursor,
                } => (results, next_cursor),
                TaskListResponse::Bare(items) => (items, None),
            };
            tasks.extend(
                items
                    .into_iter()
                    .filter_map(TodoistTask::into_task)
                    .filter(|t| !t.completed),
            );

            match next.filter(|c| !c.is_empty()) {
                Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
                _ => break,
            }
        }

        debug!("Fetched {} open Todoist tasks", tasks.len());
        Ok(tasks)
    }

    async fn create_task(&self, task: &NewTask) -> ProviderResult<TaskId> {
        let body = CreateTaskBody::new(task, self.project_id.as_deref());
        let response = self
            .http
            .post(self.tasks_url())
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await?;
        let created: TodoistTask = error_for_status(response).await?.json().await?;
        debug!("Created Todoist task {} ({})", created.id, task.title);
        Ok(TaskId::new(created.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_parse_envelope_response() {
        let json = r#"{
            "results": [
                {"id": "6X7rM8997g3RQmvh", "content": "Buy milk", "priority": 4,
                 "due": {"date": "2026-03-01"}, "checked": false},
                {"id": "6X7rfFVPjhvv84XG", "content": "", "priority": 1}
            ],
            "next_cursor": null
        }"#;
        let page: TaskListResponse = serde_json::from_str(json).unwrap();
        let TaskListResponse::Page { results, next_cursor } = page else {
            panic!("expected envelope");
        };
        assert!(next_cursor.is_none());

        let tasks: Vec<Task> = results.into_iter().filter_map(TodoistTask::into_task).collect();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Buy milk");
        assert_eq!(tasks[0].priority, Some(4));
        assert_eq!(
            tasks[0].due,
            Some(Due::Date(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()))
        );
    }

    #[test]
    fn test_parse_bare_array_with_numeric_ids() {
        let json = r#"[{"id": 2995104339, "content": "Call Alice", "description": "",
                        "is_completed": true}]"#;
        let page: TaskListResponse = serde_json::from_str(json).unwrap();
        let TaskListResponse::Bare(items) = page else {
            panic!("expected bare array");
        };
        let task = items.into_iter().next().and_then(TodoistTask::into_task).unwrap();
        assert_eq!(task.id, TaskId::from("2995104339"));
        assert!(task.description.is_none());
        assert!(task.completed);
    }

    #[test]
    fn test_create_body_date_only() {
        let task = NewTask {
            title: "Buy milk".to_string(),
            description: Some("2%".to_string()),
            due: Some(Due::Date(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap())),
            priority: Some(3),
        };
        let body = serde_json::to_value(CreateTaskBody::new(&task, None)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "content": "Buy milk",
                "description": "2%",
                "due_date": "2026-03-01",
                "priority": 3
            })
        );
    }

    #[test]
    fn test_create_body_datetime_and_project() {
        let due = Due::parse("2026-03-01T09:30:00Z").unwrap();
        let task = NewTask {
            title: "Standup".to_string(),
            description: Some(String::new()),
            due: Some(due),
            priority: None,
        };
        let body = serde_json::to_value(CreateTaskBody::new(&task, Some("inbox"))).unwrap();
        assert_eq!(body["due_datetime"], "2026-03-01T09:30:00+00:00");
        assert_eq!(body["project_id"], "inbox");
        assert!(body.get("description").is_none());
        assert!(body.get("due_date").is_none());
        assert!(body.get("priority").is_none());
    }
}

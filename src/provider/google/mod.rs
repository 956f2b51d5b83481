//! Google Tasks source provider (Tasks API v1, OAuth2)

pub mod auth;

pub use auth::{AuthError, ClientSecrets, StoredToken, TokenManager};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use super::{error_for_status, parse_url, ProviderError, ProviderResult, SourceProvider};
use crate::task::{Due, PriorityScale, Task, TaskId};

pub const GOOGLE_TASKS_API_URL: &str = "https://tasks.googleapis.com/tasks/v1";
pub const DEFAULT_TASKLIST: &str = "@default";

const USER_AGENT: &str = concat!("tasksync/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PAGE_SIZE: &str = "100";

/// Client for one Google Tasks list.
pub struct GoogleTasksClient {
    http: reqwest::Client,
    base_url: String,
    tasklist_id: String,
    auth: TokenManager,
}

impl GoogleTasksClient {
    pub fn new(secrets: ClientSecrets, token_path: PathBuf) -> ProviderResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let auth = TokenManager::new(http.clone(), secrets, token_path);

        Ok(Self {
            http,
            base_url: GOOGLE_TASKS_API_URL.to_string(),
            tasklist_id: DEFAULT_TASKLIST.to_string(),
            auth,
        })
    }

    /// Point the client at a different API root (used by tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_tasklist(mut self, tasklist_id: impl Into<String>) -> Self {
        self.tasklist_id = tasklist_id.into();
        self
    }

    pub fn auth(&self) -> &TokenManager {
        &self.auth
    }

    fn tasks_url(&self, id: Option<&TaskId>) -> ProviderResult<reqwest::Url> {
        let mut url = parse_url(&self.base_url)?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                ProviderError::Validation(format!("cannot use {} as a base URL", self.base_url))
            })?;
            segments
                .pop_if_empty()
                .extend(["lists", self.tasklist_id.as_str(), "tasks"]);
            if let Some(id) = id {
                segments.push(id.as_str());
            }
        }
        Ok(url)
    }

    /// Send an authorized request, refreshing the token once on a 401.
    async fn send<F>(&self, build: F) -> ProviderResult<reqwest::Response>
    where
        F: Fn(&str) -> reqwest::RequestBuilder,
    {
        let token = self.auth.access_token().await?;
        let response = build(&token).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return error_for_status(response).await;
        }

        debug!("Google rejected the access token, forcing a refresh");
        let token = self.auth.force_refresh().await?;
        let response = build(&token).send().await?;
        error_for_status(response).await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskPage {
    #[serde(default)]
    items: Vec<GoogleTask>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleTask {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    due: Option<String>,
    #[serde(default)]
    created: Option<String>,
    #[serde(default)]
    updated: Option<String>,
    #[serde(default)]
    deleted: bool,
}

impl GoogleTask {
    fn into_task(self) -> Option<Task> {
        let title = self.title.filter(|t| !t.trim().is_empty())?;
        if self.deleted {
            return None;
        }

        // The API only exposes `updated`; `created` is honored when present.
        let created_at = self
            .created
            .or(self.updated)
            .and_then(|raw| chrono::DateTime::parse_from_rfc3339(&raw).ok())
            .map(|dt| dt.with_timezone(&chrono::Utc));

        Some(Task {
            id: TaskId::new(self.id),
            title,
            description: self.notes.filter(|n| !n.is_empty()),
            due: self.due.as_deref().and_then(Due::parse),
            priority: None,
            completed: self.status.as_deref() == Some("completed"),
            created_at,
        })
    }
}

#[async_trait]
impl SourceProvider for GoogleTasksClient {
    fn name(&self) -> &str {
        "google-tasks"
    }

    fn priority_scale(&self) -> PriorityScale {
        PriorityScale::GOOGLE_TASKS
    }

    async fn list_open_tasks(&self) -> ProviderResult<Vec<Task>> {
        let mut tasks = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.tasks_url(None)?;
            {
                let mut query = url.query_pairs_mut();
                query
                    .append_pair("showCompleted", "false")
                    .append_pair("showHidden", "false")
                    .append_pair("maxResults", PAGE_SIZE);
                if let Some(token) = &page_token {
                    query.append_pair("pageToken", token);
                }
            }

            let response = self
                .send(|token| self.http.get(url.clone()).bearer_auth(token))
                .await?;
            let page: TaskPage = response.json().await?;

            tasks.extend(
                page.items
                    .into_iter()
                    .filter_map(GoogleTask::into_task)
                    .filter(|t| !t.completed),
            );

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) if page_token.as_deref() != Some(next.as_str()) => {
                    page_token = Some(next)
                }
                _ => break,
            }
        }

        debug!("Fetched {} open Google tasks", tasks.len());
        Ok(tasks)
    }

    async fn delete_task(&self, id: &TaskId) -> ProviderResult<()> {
        let url = self.tasks_url(Some(id))?;
        self.send(|token| self.http.delete(url.clone()).bearer_auth(token))
            .await?;
        debug!("Deleted Google task {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn client(base_url: &str) -> GoogleTasksClient {
        let secrets = ClientSecrets {
            client_id: "id".into(),
            client_secret: "secret".into(),
            auth_uri: "https://example.test/auth".into(),
            token_uri: "https://example.test/token".into(),
        };
        GoogleTasksClient::new(secrets, PathBuf::from("token.json"))
            .unwrap()
            .with_base_url(base_url)
    }

    #[test]
    fn test_tasks_url_default_list() {
        let url = client(GOOGLE_TASKS_API_URL).tasks_url(None).unwrap();
        assert_eq!(
            url.as_str(),
            "https://tasks.googleapis.com/tasks/v1/lists/@default/tasks"
        );
    }

    #[test]
    fn test_tasks_url_with_id_and_bare_host() {
        let url = client("http://127.0.0.1:8080")
            .with_tasklist("MDk1")
            .tasks_url(Some(&TaskId::from("abc")))
            .unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/lists/MDk1/tasks/abc");
    }

    #[test]
    fn test_parse_task_page() {
        let json = r#"{
            "kind": "tasks#tasks",
            "nextPageToken": "CgYI",
            "items": [
                {"id": "t1", "title": "Buy milk", "notes": "2%", "status": "needsAction",
                 "due": "2026-03-01T00:00:00.000Z", "updated": "2026-02-20T10:00:00.000Z"},
                {"id": "t2", "title": "", "status": "needsAction"},
                {"id": "t3", "title": "Done already", "status": "completed"},
                {"id": "t4", "title": "Gone", "deleted": true}
            ]
        }"#;
        let page: TaskPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.next_page_token.as_deref(), Some("CgYI"));

        let tasks: Vec<Task> = page.items.into_iter().filter_map(GoogleTask::into_task).collect();
        assert_eq!(tasks.len(), 2);

        let milk = &tasks[0];
        assert_eq!(milk.id, TaskId::from("t1"));
        assert_eq!(milk.description.as_deref(), Some("2%"));
        assert_eq!(
            milk.due,
            Some(Due::Date(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()))
        );
        assert!(milk.created_at.is_some());
        assert!(milk.priority.is_none());
        assert!(!milk.completed);

        assert!(tasks[1].completed);
    }
}

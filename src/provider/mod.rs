//! Task providers
//!
//! The sync engine only talks to the two traits defined here:
//! - [`SourceProvider`]: tasks are listed and, once migrated, deleted
//! - [`DestinationProvider`]: tasks are listed and created
//!
//! Concrete implementations live in the submodules.

pub mod error;
pub mod google;
pub mod memory;
pub mod todoist;

pub use error::{ErrorKind, ProviderError, ProviderResult};
pub use google::GoogleTasksClient;
pub use memory::InMemoryProvider;
pub use todoist::TodoistClient;

use async_trait::async_trait;

use crate::task::{NewTask, PriorityScale, Task, TaskId};

/// Provider that tasks are moved out of.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Short name for logs and reports
    fn name(&self) -> &str;

    /// Scale of the `priority` values this provider reports
    fn priority_scale(&self) -> PriorityScale;

    /// All open tasks, in the provider's listed order.
    ///
    /// # Errors
    ///
    /// Any [`ProviderError`]; the engine treats a listing failure as
    /// pass-fatal.
    async fn list_open_tasks(&self) -> ProviderResult<Vec<Task>>;

    /// Removes a task.
    ///
    /// # Errors
    ///
    /// [`ProviderError::NotFound`] when the task is already gone,
    /// [`ProviderError::Transient`] on network or server failures.
    async fn delete_task(&self, id: &TaskId) -> ProviderResult<()>;
}

/// Provider that tasks are moved into.
#[async_trait]
pub trait DestinationProvider: Send + Sync {
    /// Short name for logs and reports
    fn name(&self) -> &str;

    /// Scale that created tasks' priorities must be expressed on
    fn priority_scale(&self) -> PriorityScale;

    /// All open tasks, in the provider's listed order.
    ///
    /// # Errors
    ///
    /// Any [`ProviderError`]; the engine treats a listing failure as
    /// pass-fatal.
    async fn list_open_tasks(&self) -> ProviderResult<Vec<Task>>;

    /// Creates a task and returns the identifier the provider assigned.
    ///
    /// # Errors
    ///
    /// [`ProviderError::Validation`] when the content is rejected,
    /// [`ProviderError::Transient`] on network or server failures.
    async fn create_task(&self, task: &NewTask) -> ProviderResult<TaskId>;
}

/// Turn a non-success HTTP response into a classified [`ProviderError`].
pub(crate) async fn error_for_status(
    response: reqwest::Response,
) -> ProviderResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::from_status(status, &body))
}

pub(crate) fn parse_url(raw: &str) -> ProviderResult<reqwest::Url> {
    reqwest::Url::parse(raw)
        .map_err(|e| ProviderError::Validation(format!("invalid URL {}: {}", raw, e)))
}

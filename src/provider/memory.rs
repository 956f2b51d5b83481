//! In-memory provider for tests and local experiments.
//!
//! Cloning an [`InMemoryProvider`] shares the underlying state, so a test can
//! hand one clone to the sync engine and inspect the other afterwards.

use async_trait::async_trait;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{DestinationProvider, ProviderError, ProviderResult, SourceProvider};
use crate::task::{NewTask, PriorityScale, Task, TaskId};

/// A provider call, recorded in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List,
    Create(String),
    Delete(TaskId),
}

#[derive(Debug, Clone)]
struct Failure {
    error: ProviderError,
    /// `None` fails forever
    remaining: Option<u32>,
}

#[derive(Debug, Default)]
struct State {
    tasks: Vec<Task>,
    next_id: u64,
    list_failure: Option<ProviderError>,
    create_failures: HashMap<String, Failure>,
    delete_failures: HashMap<TaskId, Failure>,
    calls: Vec<Call>,
}

/// Thread-safe in-memory task list with failure injection.
#[derive(Debug, Clone)]
pub struct InMemoryProvider {
    name: String,
    scale: PriorityScale,
    state: Arc<Mutex<State>>,
}

impl InMemoryProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scale: PriorityScale::TODOIST,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    pub fn with_scale(mut self, scale: PriorityScale) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_tasks(self, tasks: impl IntoIterator<Item = Task>) -> Self {
        for task in tasks {
            self.insert(task);
        }
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a task as if it had been created out of band
    pub fn insert(&self, task: Task) {
        self.lock().tasks.push(task);
    }

    /// Every stored task, including completed ones
    pub fn tasks(&self) -> Vec<Task> {
        self.lock().tasks.clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.lock().tasks.iter().map(|t| t.title.clone()).collect()
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.lock().tasks.iter().any(|t| &t.id == id)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn fail_list(&self, error: ProviderError) {
        self.lock().list_failure = Some(error);
    }

    /// Fail every create of a task with this exact title
    pub fn fail_create(&self, title: &str, error: ProviderError) {
        self.lock().create_failures.insert(
            title.to_string(),
            Failure {
                error,
                remaining: None,
            },
        );
    }

    /// Fail the next `times` creates of a task with this exact title
    pub fn fail_create_times(&self, title: &str, error: ProviderError, times: u32) {
        self.lock().create_failures.insert(
            title.to_string(),
            Failure {
                error,
                remaining: Some(times),
            },
        );
    }

    pub fn fail_delete(&self, id: &TaskId, error: ProviderError) {
        self.lock().delete_failures.insert(
            id.clone(),
            Failure {
                error,
                remaining: None,
            },
        );
    }

    pub fn fail_delete_times(&self, id: &TaskId, error: ProviderError, times: u32) {
        self.lock().delete_failures.insert(
            id.clone(),
            Failure {
                error,
                remaining: Some(times),
            },
        );
    }

    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.list_failure = None;
        state.create_failures.clear();
        state.delete_failures.clear();
    }

    fn list(&self) -> ProviderResult<Vec<Task>> {
        let mut state = self.lock();
        state.calls.push(Call::List);
        if let Some(error) = &state.list_failure {
            return Err(error.clone());
        }
        Ok(state.tasks.iter().filter(|t| !t.completed).cloned().collect())
    }
}

fn take_failure<K: Eq + Hash>(
    failures: &mut HashMap<K, Failure>,
    key: &K,
) -> Option<ProviderError> {
    let (error, exhausted) = {
        let failure = failures.get_mut(key)?;
        let exhausted = match failure.remaining.as_mut() {
            Some(remaining) => {
                *remaining = remaining.saturating_sub(1);
                *remaining == 0
            }
            None => false,
        };
        (failure.error.clone(), exhausted)
    };
    if exhausted {
        failures.remove(key);
    }
    Some(error)
}

#[async_trait]
impl SourceProvider for InMemoryProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority_scale(&self) -> PriorityScale {
        self.scale
    }

    async fn list_open_tasks(&self) -> ProviderResult<Vec<Task>> {
        self.list()
    }

    async fn delete_task(&self, id: &TaskId) -> ProviderResult<()> {
        let mut state = self.lock();
        state.calls.push(Call::Delete(id.clone()));
        if let Some(error) = take_failure(&mut state.delete_failures, id) {
            return Err(error);
        }

        let before = state.tasks.len();
        state.tasks.retain(|t| &t.id != id);
        if state.tasks.len() == before {
            return Err(ProviderError::NotFound(format!("task {}", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl DestinationProvider for InMemoryProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority_scale(&self) -> PriorityScale {
        self.scale
    }

    async fn list_open_tasks(&self) -> ProviderResult<Vec<Task>> {
        self.list()
    }

    async fn create_task(&self, task: &NewTask) -> ProviderResult<TaskId> {
        let mut state = self.lock();
        state.calls.push(Call::Create(task.title.clone()));
        if let Some(error) = take_failure(&mut state.create_failures, &task.title) {
            return Err(error);
        }
        if task.title.trim().is_empty() {
            return Err(ProviderError::Validation("task title is empty".to_string()));
        }

        state.next_id += 1;
        let id = TaskId::new(format!("{}-{}", self.name, state.next_id));
        state.tasks.push(Task {
            id: id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            due: task.due,
            priority: task.priority,
            completed: false,
            created_at: Some(chrono::Utc::now()),
        });
        Ok(id)
    }
}

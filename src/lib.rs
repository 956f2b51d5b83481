//! tasksync library - moves open tasks from Google Tasks into Todoist

pub mod cli;
pub mod config;
pub mod provider;
pub mod sync;
pub mod task;

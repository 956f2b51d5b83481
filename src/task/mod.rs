//! Task model shared by every provider
//!
//! - Provider-scoped task identifiers
//! - Due dates that keep the date/date-time distinction
//! - Priority scales and the lossy mapping between them

pub mod model;

pub use model::{normalize_title, Due, NewTask, PriorityScale, Task, TaskId};

//! Title-based matching between source and destination lists

use std::collections::HashSet;

use crate::task::Task;

/// Outcome of matching one source snapshot against one destination snapshot.
#[derive(Debug, Default)]
pub struct MatchPlan<'a> {
    /// Source tasks with no destination counterpart, in source order
    pub to_migrate: Vec<&'a Task>,
    /// Source tasks whose normalized title already exists in the destination
    pub already_present: Vec<&'a Task>,
    /// Later source tasks sharing a normalized title with an earlier one in
    /// `to_migrate`; they are left alone this pass
    pub shadowed: Vec<&'a Task>,
    /// Source tasks whose title is blank after normalization
    pub untitled: Vec<&'a Task>,
}

/// Split `source` by whether each task is already represented in
/// `destination`.
///
/// Title equality after trimming and lower-casing is the only key. Two source
/// tasks that normalize to the same title are indistinguishable: only the
/// first is ever scheduled for migration.
pub fn plan<'a>(source: &'a [Task], destination: &[Task]) -> MatchPlan<'a> {
    let existing: HashSet<String> = destination.iter().map(Task::normalized_title).collect();
    let mut scheduled: HashSet<String> = HashSet::new();
    let mut plan = MatchPlan::default();

    for task in source {
        let key = task.normalized_title();
        if key.is_empty() {
            plan.untitled.push(task);
        } else if existing.contains(&key) {
            plan.already_present.push(task);
        } else if scheduled.insert(key) {
            plan.to_migrate.push(task);
        } else {
            plan.shadowed.push(task);
        }
    }

    plan
}

/// Source tasks considered not yet migrated, in source order.
pub fn tasks_to_migrate<'a>(source: &'a [Task], destination: &[Task]) -> Vec<&'a Task> {
    plan(source, destination).to_migrate
}

//! Task data model

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque task handle assigned by the provider that owns the task.
///
/// Unique within one provider, meaningless across providers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Due date of a task, either a calendar day or an exact instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Due {
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
}

impl Due {
    /// Parse a due value from a provider.
    ///
    /// Accepts `YYYY-MM-DD`, RFC 3339 timestamps and floating
    /// `YYYY-MM-DDTHH:MM:SS` timestamps (treated as UTC). A timestamp at
    /// exactly midnight UTC is folded to a plain date, which is how Google
    /// Tasks encodes date-only due values.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Some(Self::Date(date));
        }

        let instant = DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                    .ok()
                    .map(|naive| naive.and_utc())
            })?;

        if instant.time() == NaiveTime::MIN {
            Some(Self::Date(instant.date_naive()))
        } else {
            Some(Self::DateTime(instant))
        }
    }
}

impl fmt::Display for Due {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            Self::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
        }
    }
}

/// Number of ordinal priority levels a provider supports.
///
/// Level 1 is always the lowest priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityScale {
    levels: u8,
}

impl PriorityScale {
    /// Google Tasks has no native priority; nominally low/medium/high.
    pub const GOOGLE_TASKS: Self = Self { levels: 3 };

    /// Todoist priorities run from 1 (normal) to 4 (urgent).
    pub const TODOIST: Self = Self { levels: 4 };

    pub const fn new(levels: u8) -> Self {
        Self {
            levels: if levels == 0 { 1 } else { levels },
        }
    }

    pub fn levels(&self) -> u8 {
        self.levels
    }

    /// Map a level on this scale to the nearest level on `target`.
    ///
    /// Exact ties round up, favoring the higher target priority. Out of range
    /// levels are clamped into this scale first.
    pub fn convert(&self, level: u8, target: PriorityScale) -> u8 {
        let level = level.clamp(1, self.levels);
        if self.levels == 1 || target.levels == 1 {
            return 1;
        }

        let numerator = u32::from(level - 1) * u32::from(target.levels - 1);
        let denominator = u32::from(self.levels - 1);
        let mut index = numerator / denominator;
        if 2 * (numerator % denominator) >= denominator {
            index += 1;
        }

        // index <= target.levels - 1, so this always fits
        u8::try_from(index + 1).unwrap_or(target.levels)
    }
}

/// A unit of work as listed by a provider.
///
/// Instances are snapshots: the sync engine never mutates a task it fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Provider-assigned identifier
    pub id: TaskId,

    /// Human-readable title, the sole matching key
    pub title: String,

    /// Free text notes
    #[serde(default)]
    pub description: Option<String>,

    /// Due date (if any)
    #[serde(default)]
    pub due: Option<Due>,

    /// Priority level on the owning provider's scale
    #[serde(default)]
    pub priority: Option<u8>,

    /// Whether the task is already done
    #[serde(default)]
    pub completed: bool,

    /// When the task was created, if the provider reports it
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a new open task
    pub fn new(id: impl Into<TaskId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            due: None,
            priority: None,
            completed: false,
            created_at: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_due(mut self, due: Due) -> Self {
        self.due = Some(due);
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn completed(mut self) -> Self {
        self.completed = true;
        self
    }

    /// Title lower-cased with surrounding whitespace removed
    pub fn normalized_title(&self) -> String {
        normalize_title(&self.title)
    }

    /// True when the creation time is known and earlier than `cutoff`
    pub fn is_created_before(&self, cutoff: DateTime<Utc>) -> bool {
        self.created_at.is_some_and(|created| created < cutoff)
    }
}

/// Attributes for a task to be created in the destination.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub due: Option<Due>,
    /// Priority level already mapped onto the destination's scale
    pub priority: Option<u8>,
}

/// Cross-provider identity key for a title.
pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("  Buy Milk \n"), "buy milk");
        assert_eq!(normalize_title("CALL ALICE"), "call alice");
        assert_eq!(normalize_title("   "), "");
    }

    #[test]
    fn test_priority_same_scale_is_identity() {
        let scale = PriorityScale::TODOIST;
        for level in 1..=4 {
            assert_eq!(scale.convert(level, scale), level);
        }
    }

    #[test]
    fn test_priority_up_conversion_favors_higher_on_ties() {
        let google = PriorityScale::GOOGLE_TASKS;
        let todoist = PriorityScale::TODOIST;
        assert_eq!(google.convert(1, todoist), 1);
        // medium sits exactly between todoist 2 and 3
        assert_eq!(google.convert(2, todoist), 3);
        assert_eq!(google.convert(3, todoist), 4);
    }

    #[test]
    fn test_priority_down_conversion_picks_nearest() {
        let todoist = PriorityScale::TODOIST;
        let google = PriorityScale::GOOGLE_TASKS;
        assert_eq!(todoist.convert(1, google), 1);
        assert_eq!(todoist.convert(2, google), 2);
        assert_eq!(todoist.convert(3, google), 2);
        assert_eq!(todoist.convert(4, google), 3);
    }

    #[test]
    fn test_priority_clamps_out_of_range_levels() {
        let google = PriorityScale::GOOGLE_TASKS;
        assert_eq!(google.convert(0, PriorityScale::TODOIST), 1);
        assert_eq!(google.convert(9, PriorityScale::TODOIST), 4);
        assert_eq!(PriorityScale::new(0).levels(), 1);
        assert_eq!(PriorityScale::new(1).convert(1, PriorityScale::TODOIST), 1);
    }

    #[test]
    fn test_due_parse_date_only() {
        let due = Due::parse("2026-02-15").unwrap();
        assert_eq!(due, Due::Date(NaiveDate::from_ymd_opt(2026, 2, 15).unwrap()));
        assert_eq!(due.to_string(), "2026-02-15");
    }

    #[test]
    fn test_due_parse_midnight_folds_to_date() {
        let due = Due::parse("2026-02-15T00:00:00.000Z").unwrap();
        assert_eq!(due, Due::Date(NaiveDate::from_ymd_opt(2026, 2, 15).unwrap()));
    }

    #[test]
    fn test_due_parse_datetime() {
        let due = Due::parse("2026-02-15T09:30:00Z").unwrap();
        assert_eq!(
            due,
            Due::DateTime(Utc.with_ymd_and_hms(2026, 2, 15, 9, 30, 0).unwrap())
        );

        let floating = Due::parse("2026-02-15T09:30:00").unwrap();
        assert_eq!(floating, due);
    }

    #[test]
    fn test_due_parse_garbage() {
        assert!(Due::parse("next tuesday").is_none());
        assert!(Due::parse("").is_none());
    }

    #[test]
    fn test_task_created_before() {
        let cutoff = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let old = Task::new("a", "Old").with_created_at(cutoff - chrono::Duration::days(1));
        let new = Task::new("b", "New").with_created_at(cutoff + chrono::Duration::days(1));
        let unknown = Task::new("c", "Unknown");

        assert!(old.is_created_before(cutoff));
        assert!(!new.is_created_before(cutoff));
        assert!(!unknown.is_created_before(cutoff));
    }
}

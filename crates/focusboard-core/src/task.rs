use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::{ValidationError, require};

pub const DEFAULT_ESTIMATED_MINUTES: u32 = 25;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" | "h" => Ok(Self::High),
            "medium" | "m" => Ok(Self::Medium),
            "low" | "l" => Ok(Self::Low),
            other => Err(anyhow::anyhow!("unknown priority: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,

    pub title: String,

    #[serde(default)]
    pub description: String,

    pub date: NaiveDate,

    #[serde(
        default = "default_estimated_minutes",
        deserialize_with = "lenient_estimated_minutes"
    )]
    pub estimated_minutes: u32,

    #[serde(default, deserialize_with = "lenient_priority")]
    pub priority: Priority,

    #[serde(default)]
    pub completed: bool,

    pub created_at: DateTime<Utc>,
}

fn default_estimated_minutes() -> u32 {
    DEFAULT_ESTIMATED_MINUTES
}

// Stored fields go through the same normalization as new input.
fn lenient_estimated_minutes<'de, D: Deserializer<'de>>(de: D) -> Result<u32, D::Error> {
    let raw = Option::<serde_json::Value>::deserialize(de)?;
    Ok(normalize_estimated_minutes(
        raw.as_ref().and_then(serde_json::Value::as_i64),
    ))
}

fn lenient_priority<'de, D: Deserializer<'de>>(de: D) -> Result<Priority, D::Error> {
    let raw = Option::<serde_json::Value>::deserialize(de)?;
    Ok(normalize_priority(
        raw.as_ref().and_then(serde_json::Value::as_str),
    ))
}

/// Unvalidated input for a new task, as it arrives from a form or the
/// command line.
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub date: String,
    pub estimated_minutes: Option<i64>,
    pub priority: Option<String>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            date: date.into(),
            ..Self::default()
        }
    }
}

/// Missing, zero or negative estimates become
/// [`DEFAULT_ESTIMATED_MINUTES`].
pub fn normalize_estimated_minutes(raw: Option<i64>) -> u32 {
    match raw {
        Some(minutes) if minutes > 0 => u32::try_from(minutes).unwrap_or(u32::MAX),
        _ => DEFAULT_ESTIMATED_MINUTES,
    }
}

/// Missing or unrecognized priorities become [`Priority::Medium`].
pub fn normalize_priority(raw: Option<&str>) -> Priority {
    raw.and_then(|value| value.parse().ok()).unwrap_or_default()
}

pub fn parse_task_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    let value = require("date", raw)?;
    NaiveDate::parse_from_str(&value, "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDate { value })
}

impl Task {
    /// Validates `draft` and fills defaults; `title` and `date` are
    /// required.
    pub fn from_draft(draft: TaskDraft, now: DateTime<Utc>) -> Result<Self, ValidationError> {
        let title = require("title", &draft.title)?;
        let date = parse_task_date(&draft.date)?;

        Ok(Self {
            id: Uuid::now_v7(),
            title,
            description: draft.description.unwrap_or_default().trim().to_string(),
            date,
            estimated_minutes: normalize_estimated_minutes(draft.estimated_minutes),
            priority: normalize_priority(draft.priority.as_deref()),
            completed: false,
            created_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{
        DEFAULT_ESTIMATED_MINUTES, Priority, Task, TaskDraft, normalize_estimated_minutes,
        normalize_priority,
    };
    use crate::error::ValidationError;

    #[test]
    fn defaults_fill_missing_fields() {
        let now = Utc.with_ymd_and_hms(2026, 2, 16, 9, 0, 0).unwrap();
        let task = Task::from_draft(TaskDraft::new("Read chapter 3", "2026-02-16"), now)
            .expect("valid draft");

        assert_eq!(task.title, "Read chapter 3");
        assert_eq!(task.description, "");
        assert_eq!(task.estimated_minutes, DEFAULT_ESTIMATED_MINUTES);
        assert_eq!(task.priority, Priority::Medium);
        assert!(!task.completed);
        assert_eq!(task.created_at, now);
    }

    #[test]
    fn title_and_date_are_required() {
        let now = Utc::now();
        assert_eq!(
            Task::from_draft(TaskDraft::new("", "2026-02-16"), now),
            Err(ValidationError::missing("title"))
        );
        assert_eq!(
            Task::from_draft(TaskDraft::new("x", "  "), now),
            Err(ValidationError::missing("date"))
        );
        assert_eq!(
            Task::from_draft(TaskDraft::new("x", "16/02/2026"), now),
            Err(ValidationError::InvalidDate {
                value: "16/02/2026".to_string()
            })
        );
    }

    #[test]
    fn normalization_tables() {
        assert_eq!(normalize_estimated_minutes(None), 25);
        assert_eq!(normalize_estimated_minutes(Some(0)), 25);
        assert_eq!(normalize_estimated_minutes(Some(-10)), 25);
        assert_eq!(normalize_estimated_minutes(Some(50)), 50);

        assert_eq!(normalize_priority(None), Priority::Medium);
        assert_eq!(normalize_priority(Some("urgent")), Priority::Medium);
        assert_eq!(normalize_priority(Some("HIGH")), Priority::High);
        assert_eq!(normalize_priority(Some("low")), Priority::Low);
    }

    #[test]
    fn persisted_layout_uses_camel_case() {
        let now = Utc.with_ymd_and_hms(2026, 2, 16, 9, 0, 0).unwrap();
        let task = Task::from_draft(TaskDraft::new("Plan", "2026-02-20"), now).expect("valid");
        let json = serde_json::to_value(&task).expect("serialize");

        assert_eq!(json["date"], "2026-02-20");
        assert_eq!(json["estimatedMinutes"], 25);
        assert_eq!(json["priority"], "medium");
        assert!(json.get("createdAt").is_some());
    }
}

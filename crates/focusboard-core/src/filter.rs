use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{
  Deserialize,
  Serialize
};

use crate::task::{
  Priority,
  Task
};

/// Read-time selection over the task
/// list. Never reorders or mutates the
/// stored collection.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskFilter {
  #[default]
  All,
  Pending,
  Completed,
  High
}

impl TaskFilter {
  pub fn matches(
    self,
    task: &Task
  ) -> bool {
    match self {
      | Self::All => true,
      | Self::Pending => !task.completed,
      | Self::Completed => {
        task.completed
      }
      | Self::High => {
        task.priority == Priority::High
      }
    }
  }

  pub fn apply<'a>(
    self,
    tasks: &'a [Task]
  ) -> Vec<&'a Task> {
    tasks
      .iter()
      .filter(|task| self.matches(task))
      .collect()
  }

  pub fn as_str(self) -> &'static str {
    match self {
      | Self::All => "all",
      | Self::Pending => "pending",
      | Self::Completed => "completed",
      | Self::High => "high"
    }
  }
}

impl fmt::Display for TaskFilter {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for TaskFilter {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "all" => Ok(Self::All),
      | "pending" | "open" => {
        Ok(Self::Pending)
      }
      | "completed" | "done" => {
        Ok(Self::Completed)
      }
      | "high" => Ok(Self::High),
      | other => {
        Err(anyhow!(
          "unknown task filter: \
           {other}"
        ))
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::{
    TimeZone,
    Utc
  };

  use super::TaskFilter;
  use crate::task::{
    Priority,
    Task,
    TaskDraft
  };

  fn sample() -> Vec<Task> {
    let now = Utc
      .with_ymd_and_hms(
        2026, 2, 16, 5, 0, 0
      )
      .unwrap();
    let mut out = Vec::new();
    for (idx, title) in
      ["a", "b", "c", "d"]
        .iter()
        .enumerate()
    {
      let mut task = Task::from_draft(
        TaskDraft::new(
          *title,
          "2026-02-16"
        ),
        now
      )
      .unwrap();
      task.completed = idx % 2 == 1;
      if idx < 2 {
        task.priority = Priority::High;
      }
      out.push(task);
    }
    out
  }

  #[test]
  fn pending_and_completed_partition_all()
  {
    let tasks = sample();
    let all = TaskFilter::All
      .apply(&tasks);
    let pending = TaskFilter::Pending
      .apply(&tasks);
    let completed =
      TaskFilter::Completed
        .apply(&tasks);

    assert_eq!(
      pending.len() + completed.len(),
      all.len()
    );
    for task in &all {
      let in_pending = pending
        .iter()
        .any(|t| t.id == task.id);
      let in_completed = completed
        .iter()
        .any(|t| t.id == task.id);
      assert!(in_pending ^ in_completed);
    }
  }

  #[test]
  fn high_keeps_insertion_order() {
    let tasks = sample();
    let titles: Vec<&str> =
      TaskFilter::High
        .apply(&tasks)
        .iter()
        .map(|t| t.title.as_str())
        .collect();
    assert_eq!(titles, vec!["a", "b"]);
  }

  #[test]
  fn parses_names() {
    assert_eq!(
      "done"
        .parse::<TaskFilter>()
        .unwrap(),
      TaskFilter::Completed
    );
    assert!(
      "urgent"
        .parse::<TaskFilter>()
        .is_err()
    );
  }
}

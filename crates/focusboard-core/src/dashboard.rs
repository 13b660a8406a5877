use serde::Serialize;

use crate::mood::{MoodManager, Trend};
use crate::pomodoro::PomodoroManager;
use crate::tasks::TaskManager;

pub const DEFAULT_WEEKLY_TARGET: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeeklyProgress {
    pub completed: u32,
    pub target: u32,
    /// Capped at 100.
    pub percent: f64,
}

impl WeeklyProgress {
    pub fn new(completed: u32, target: u32) -> Self {
        let percent = if target == 0 {
            100.0
        } else {
            (f64::from(completed) / f64::from(target) * 100.0).min(100.0)
        };
        Self {
            completed,
            target,
            percent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub completed_today: u32,
    pub weekly: WeeklyProgress,
    pub pending_tasks: u32,
    pub upcoming_tasks: u32,
    pub current_streak: u32,
    pub best_streak: u32,
    pub completed_sessions: u32,
    pub total_focus_hours: f64,
    pub average_mood: f64,
    pub mood_trend: Trend,
}

/// Figures derived from the managers on every call; holds nothing but
/// its own settings.
#[derive(Debug, Clone, Copy)]
pub struct Dashboard {
    weekly_target: u32,
    mood_window: usize,
    upcoming_limit: usize,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new(DEFAULT_WEEKLY_TARGET)
    }
}

impl Dashboard {
    pub fn new(weekly_target: u32) -> Self {
        Self {
            weekly_target,
            mood_window: crate::mood::DEFAULT_HISTORY,
            upcoming_limit: 5,
        }
    }

    pub fn with_mood_window(mut self, days: usize) -> Self {
        self.mood_window = days;
        self
    }

    pub fn with_upcoming_limit(mut self, limit: usize) -> Self {
        self.upcoming_limit = limit;
        self
    }

    pub fn completed_today(&self, tasks: &TaskManager) -> u32 {
        count(tasks.completed_today().len())
    }

    pub fn weekly_progress(&self, tasks: &TaskManager) -> WeeklyProgress {
        WeeklyProgress::new(count(tasks.completed_this_week().len()), self.weekly_target)
    }

    pub fn current_streak(&self, pomodoro: &PomodoroManager) -> u32 {
        pomodoro.stats().current_streak
    }

    pub fn total_focus_hours(&self, pomodoro: &PomodoroManager) -> f64 {
        pomodoro.stats().total_focus_hours()
    }

    pub fn summary(
        &self,
        tasks: &TaskManager,
        pomodoro: &PomodoroManager,
        moods: &MoodManager,
    ) -> DashboardSummary {
        let stats = pomodoro.stats();
        DashboardSummary {
            completed_today: self.completed_today(tasks),
            weekly: self.weekly_progress(tasks),
            pending_tasks: count(tasks.filter(crate::filter::TaskFilter::Pending).len()),
            upcoming_tasks: count(tasks.upcoming(self.upcoming_limit).len()),
            current_streak: self.current_streak(pomodoro),
            best_streak: stats.best_streak,
            completed_sessions: stats.completed_session_count,
            total_focus_hours: self.total_focus_hours(pomodoro),
            average_mood: moods.average_mood(self.mood_window),
            mood_trend: moods.trend(),
        }
    }
}

fn count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::datetime::{Calendar, Clock};
use crate::error::ValidationError;
use crate::hooks::{Change, Hooks};
use crate::store::{MOODS_KEY, Store};

pub const MIN_LEVEL: u8 = 1;
pub const MAX_LEVEL: u8 = 5;
pub const DEFAULT_HISTORY: usize = 7;

const TREND_RECENT: usize = 3;
const TREND_BASELINE: usize = 6;

const RECOMMENDATIONS: [[&str; 5]; 5] = [
    [
        "Take a short walk outside",
        "Reach out to a friend or family member",
        "Try five minutes of slow breathing",
        "Pick one very small task and finish it",
        "Go to bed a little earlier tonight",
    ],
    [
        "Listen to music you enjoy",
        "Drink a glass of water and have a snack",
        "Write down three things that went okay today",
        "Stretch for ten minutes",
        "Limit news and social media for an hour",
    ],
    [
        "Plan one focus session for your top task",
        "Tidy your workspace for five minutes",
        "Take a break away from screens",
        "Review your flashcards for a quick win",
        "Check in on how you slept last night",
    ],
    [
        "Use the momentum on a challenging task",
        "Schedule a longer focus block",
        "Help someone with something they are stuck on",
        "Learn one new thing today",
        "Note what is working so you can repeat it",
    ],
    [
        "Tackle the task you have been putting off",
        "Share your good mood with someone",
        "Set a stretch goal for this week",
        "Celebrate a recent win",
        "Write down what made today great",
    ],
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MoodEntry {
    pub display_date: String,
    pub level: u8,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
    /// Fewer than two entries recorded.
    Neutral,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Improving => "improving",
            Self::Declining => "declining",
            Self::Stable => "stable",
            Self::Neutral => "neutral",
        };
        f.write_str(label)
    }
}

/// Fixed suggestion list for a level; empty for levels outside 1-5.
pub fn recommendations_for(level: u8) -> &'static [&'static str] {
    if (MIN_LEVEL..=MAX_LEVEL).contains(&level) {
        &RECOMMENDATIONS[usize::from(level - MIN_LEVEL)]
    } else {
        &[]
    }
}

pub fn validate_level(level: i64) -> Result<u8, ValidationError> {
    u8::try_from(level)
        .ok()
        .filter(|value| (MIN_LEVEL..=MAX_LEVEL).contains(value))
        .ok_or(ValidationError::MoodLevelOutOfRange { level })
}

/// Append-only mood log.
pub struct MoodManager {
    store: Rc<Store>,
    clock: Rc<dyn Clock>,
    calendar: Calendar,
    entries: Vec<MoodEntry>,
    hooks: Hooks,
}

impl MoodManager {
    #[instrument(skip_all)]
    pub fn load(store: Rc<Store>, clock: Rc<dyn Clock>, calendar: Calendar) -> Self {
        let mut entries: Vec<MoodEntry> = store.get_records(MOODS_KEY).unwrap_or_default();
        let before = entries.len();
        entries.retain(|entry| (MIN_LEVEL..=MAX_LEVEL).contains(&entry.level));
        if entries.len() != before {
            tracing::warn!(
                dropped = before - entries.len(),
                "dropped stored mood entries with out-of-range levels"
            );
        }
        info!(count = entries.len(), "loaded mood entries");
        Self {
            store,
            clock,
            calendar,
            entries,
            hooks: Hooks::new(),
        }
    }

    pub fn entries(&self) -> &[MoodEntry] {
        &self.entries
    }

    pub fn latest(&self) -> Option<&MoodEntry> {
        self.entries.last()
    }

    pub fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    /// Appends an entry for `level` and returns the suggestions for it.
    #[instrument(skip(self))]
    pub fn record(&mut self, level: i64) -> Result<&'static [&'static str], ValidationError> {
        let level = validate_level(level)?;
        let now = self.clock.now();
        self.entries.push(MoodEntry {
            display_date: self.calendar.display_date(now),
            level,
            timestamp: now,
        });
        info!(level, count = self.entries.len(), "recorded mood");

        self.store.set(MOODS_KEY, &self.entries);
        self.hooks.emit(Change::Moods);
        Ok(recommendations_for(level))
    }

    pub fn recent_history(&self, n: usize) -> &[MoodEntry] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }

    /// Mean level of the last `days` entries to one decimal; 0 with no
    /// entries.
    pub fn average_mood(&self, days: usize) -> f64 {
        let window = self.recent_history(days);
        if window.is_empty() {
            return 0.0;
        }
        let sum: u32 = window.iter().map(|entry| u32::from(entry.level)).sum();
        let mean = f64::from(sum) / window.len() as f64;
        (mean * 10.0).round() / 10.0
    }

    /// Last three entries against the last six.
    pub fn trend(&self) -> Trend {
        if self.entries.len() < 2 {
            return Trend::Neutral;
        }

        let recent = self.recent_history(TREND_RECENT);
        let baseline = self.recent_history(TREND_BASELINE);
        let sum = |window: &[MoodEntry]| -> u64 {
            window.iter().map(|entry| u64::from(entry.level)).sum()
        };

        // compare sum_r / n_r with sum_b / n_b without floats
        let lhs = sum(recent) * baseline.len() as u64;
        let rhs = sum(baseline) * recent.len() as u64;
        match lhs.cmp(&rhs) {
            Ordering::Greater => Trend::Improving,
            Ordering::Less => Trend::Declining,
            Ordering::Equal => Trend::Stable,
        }
    }
}

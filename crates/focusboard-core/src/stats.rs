use serde::{Deserialize, Serialize};

/// Lifetime focus statistics, one record per user.
///
/// Every field defaults, so a partial or older stored record merges
/// into zeros and unknown stored fields are ignored.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionStats {
    pub completed_session_count: u32,
    pub total_focus_minutes: u64,
    pub best_streak: u32,
    pub current_streak: u32,
}

impl SessionStats {
    /// Books one finished work period of `minutes`.
    pub fn record_work_period(&mut self, minutes: u64) {
        self.completed_session_count = self.completed_session_count.saturating_add(1);
        self.total_focus_minutes = self.total_focus_minutes.saturating_add(minutes);
        self.current_streak = self.current_streak.saturating_add(1);
        self.best_streak = self.best_streak.max(self.current_streak);
    }

    /// Repairs a stored record whose best streak trails the current one.
    pub fn normalized(mut self) -> Self {
        self.best_streak = self.best_streak.max(self.current_streak);
        self
    }

    pub fn total_focus_hours(&self) -> f64 {
        let hours = self.total_focus_minutes as f64 / 60.0;
        (hours * 10.0).round() / 10.0
    }
}

#[cfg(test)]
mod tests {
    use super::SessionStats;

    #[test]
    fn partial_record_merges_with_defaults() {
        let stats: SessionStats =
            serde_json::from_str(r#"{"completedSessionCount":3,"legacyField":true}"#)
                .expect("partial record");
        assert_eq!(
            stats,
            SessionStats {
                completed_session_count: 3,
                ..SessionStats::default()
            }
        );
    }

    #[test]
    fn work_period_moves_every_counter() {
        let mut stats = SessionStats::default();
        stats.record_work_period(25);
        stats.record_work_period(25);

        assert_eq!(stats.completed_session_count, 2);
        assert_eq!(stats.total_focus_minutes, 50);
        assert_eq!(stats.current_streak, 2);
        assert_eq!(stats.best_streak, 2);
        assert_eq!(stats.total_focus_hours(), 0.8);
    }

    #[test]
    fn best_streak_never_trails_current() {
        let stats = SessionStats {
            best_streak: 1,
            current_streak: 4,
            ..SessionStats::default()
        }
        .normalized();
        assert_eq!(stats.best_streak, 4);

        let mut stats = SessionStats {
            best_streak: 9,
            ..SessionStats::default()
        };
        stats.record_work_period(25);
        assert_eq!(stats.best_streak, 9);
        assert_eq!(stats.current_streak, 1);
    }
}

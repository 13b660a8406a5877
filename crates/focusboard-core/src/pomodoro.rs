use std::rc::Rc;

use tracing::{debug, info, instrument};

use crate::hooks::{Change, Hooks};
use crate::stats::SessionStats;
use crate::store::{STATS_KEY, Store};
use crate::timer::{Durations, Tick, TickSource, Timer, TimerMode};

pub const DEFAULT_LONG_BREAK_EVERY: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PomodoroSettings {
    pub durations: Durations,
    /// Every n-th completed work period is followed by a long break.
    pub long_break_every: u32,
}

impl Default for PomodoroSettings {
    fn default() -> Self {
        Self {
            durations: Durations::default(),
            long_break_every: DEFAULT_LONG_BREAK_EVERY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub finished: TimerMode,
    pub next: TimerMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Idle,
    Counting { remaining_seconds: u64 },
    Completed(Completion),
}

/// Focus timer plus the session statistics it feeds.
pub struct PomodoroManager {
    store: Rc<Store>,
    settings: PomodoroSettings,
    timer: Timer,
    stats: SessionStats,
    hooks: Hooks,
}

impl PomodoroManager {
    #[instrument(skip_all)]
    pub fn load(store: Rc<Store>, settings: PomodoroSettings) -> Self {
        let stats = store
            .get::<SessionStats>(STATS_KEY)
            .map(SessionStats::normalized)
            .unwrap_or_default();
        info!(
            sessions = stats.completed_session_count,
            focus_minutes = stats.total_focus_minutes,
            "loaded session stats"
        );
        Self {
            store,
            settings,
            timer: Timer::new(settings.durations),
            stats,
            hooks: Hooks::new(),
        }
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    pub fn settings(&self) -> PomodoroSettings {
        self.settings
    }

    pub fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    pub fn remaining_display(&self) -> String {
        self.timer.remaining_display()
    }

    #[instrument(skip(self))]
    pub fn set_mode(&mut self, mode: TimerMode, minutes: Option<i64>) {
        self.timer.set_mode(mode, minutes);
        debug!(%mode, seconds = self.timer.period_seconds(), "timer mode set");
        self.emit_timer();
    }

    #[instrument(skip(self))]
    pub fn set_mode_seconds(&mut self, mode: TimerMode, seconds: u64) {
        self.timer.set_mode_seconds(mode, seconds);
        debug!(%mode, seconds = self.timer.period_seconds(), "timer mode set");
        self.emit_timer();
    }

    pub fn start(&mut self) {
        if self.timer.start() {
            info!(mode = %self.timer.mode(), remaining = self.timer.remaining_seconds(), "timer started");
            self.emit_timer();
        }
    }

    pub fn pause(&mut self) {
        if self.timer.pause() {
            info!(remaining = self.timer.remaining_seconds(), "timer paused");
            self.emit_timer();
        }
    }

    /// Stops and rewinds the current period. Abandoning a work period
    /// that had already started ends the running streak.
    #[instrument(skip(self))]
    pub fn reset(&mut self) {
        let interrupted = !self.timer.mode().is_break() && self.timer.in_progress();
        self.timer.reset();

        if interrupted && self.stats.current_streak > 0 {
            info!(streak = self.stats.current_streak, "work period abandoned; streak cleared");
            self.stats.current_streak = 0;
            self.persist_stats();
        }
        self.emit_timer();
    }

    /// One second of countdown. Expiry books work periods and switches
    /// to the next mode, stopped.
    pub fn tick(&mut self) -> TickOutcome {
        match self.timer.tick() {
            Tick::Idle => TickOutcome::Idle,
            Tick::Counting { remaining_seconds } => {
                self.emit_timer();
                TickOutcome::Counting { remaining_seconds }
            }
            Tick::Expired { mode } => TickOutcome::Completed(self.on_expiry(mode)),
        }
    }

    /// Ticks until the current period completes, the timer is paused, or
    /// `ticks` runs dry.
    #[instrument(skip(self, ticks))]
    pub fn run(&mut self, ticks: &mut dyn TickSource) -> Option<Completion> {
        while self.timer.running() {
            if !ticks.wait() {
                debug!("tick source exhausted");
                break;
            }
            if let TickOutcome::Completed(done) = self.tick() {
                return Some(done);
            }
        }
        None
    }

    fn on_expiry(&mut self, finished: TimerMode) -> Completion {
        let next = if finished == TimerMode::Work {
            self.stats.record_work_period(self.timer.period_minutes());
            info!(
                sessions = self.stats.completed_session_count,
                streak = self.stats.current_streak,
                best = self.stats.best_streak,
                "work period completed"
            );
            self.persist_stats();

            let every = self.settings.long_break_every.max(1);
            if self.stats.completed_session_count % every == 0 {
                TimerMode::LongBreak
            } else {
                TimerMode::ShortBreak
            }
        } else {
            info!(mode = %finished, "break completed");
            TimerMode::Work
        };

        self.set_mode(next, None);
        Completion { finished, next }
    }

    fn persist_stats(&mut self) {
        self.store.set(STATS_KEY, &self.stats);
        self.hooks.emit(Change::Stats);
    }

    fn emit_timer(&mut self) {
        self.hooks.emit(Change::Timer {
            mode: self.timer.mode(),
            remaining_seconds: self.timer.remaining_seconds(),
            running: self.timer.running(),
        });
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::{Completion, PomodoroManager, PomodoroSettings, TickOutcome};
    use crate::hooks::Change;
    use crate::stats::SessionStats;
    use crate::store::{STATS_KEY, Store};
    use crate::timer::{TimerMode, VirtualTicks};

    fn pomodoro() -> PomodoroManager {
        PomodoroManager::load(Rc::new(Store::in_memory()), PomodoroSettings::default())
    }

    fn finish_work(p: &mut PomodoroManager) -> Completion {
        p.set_mode_seconds(TimerMode::Work, 1);
        p.start();
        p.run(&mut VirtualTicks::unlimited()).expect("period completes")
    }

    #[test]
    fn one_second_work_period_completes() {
        let mut p = pomodoro();
        let done = finish_work(&mut p);

        assert_eq!(
            done,
            Completion {
                finished: TimerMode::Work,
                next: TimerMode::ShortBreak
            }
        );
        assert_eq!(p.stats().completed_session_count, 1);
        assert_eq!(p.stats().current_streak, 1);
        assert_eq!(p.timer().mode(), TimerMode::ShortBreak);
        assert_eq!(p.timer().remaining_seconds(), 5 * 60);
        assert!(!p.timer().running());
    }

    #[test]
    fn fourth_work_period_earns_long_break() {
        let mut p = pomodoro();
        let nexts: Vec<TimerMode> = (0..4).map(|_| finish_work(&mut p).next).collect();
        assert_eq!(
            nexts,
            vec![
                TimerMode::ShortBreak,
                TimerMode::ShortBreak,
                TimerMode::ShortBreak,
                TimerMode::LongBreak
            ]
        );
        assert_eq!(p.timer().remaining_seconds(), 15 * 60);
    }

    #[test]
    fn break_completion_returns_to_work_without_touching_stats() {
        let mut p = pomodoro();
        finish_work(&mut p);
        let before = *p.stats();

        p.set_mode_seconds(TimerMode::ShortBreak, 2);
        p.start();
        let done = p.run(&mut VirtualTicks::unlimited()).expect("break completes");

        assert_eq!(done.next, TimerMode::Work);
        assert_eq!(*p.stats(), before);
        assert_eq!(p.timer().remaining_seconds(), 25 * 60);
    }

    #[test]
    fn focus_minutes_follow_period_length() {
        let mut p = pomodoro();
        p.set_mode(TimerMode::Work, Some(2));
        p.start();
        p.run(&mut VirtualTicks::unlimited());
        assert_eq!(p.stats().total_focus_minutes, 2);
    }

    #[test]
    fn pause_stops_the_run_loop() {
        let mut p = pomodoro();
        p.start();
        let mut ticks = VirtualTicks::limited(10);
        assert!(p.run(&mut ticks).is_none());
        assert_eq!(p.timer().remaining_seconds(), 25 * 60 - 10);

        p.pause();
        assert_eq!(p.tick(), TickOutcome::Idle);
        assert!(p.run(&mut VirtualTicks::unlimited()).is_none());
        assert_eq!(p.timer().remaining_seconds(), 25 * 60 - 10);
    }

    #[test]
    fn abandoned_work_period_clears_streak_only() {
        let mut p = pomodoro();
        finish_work(&mut p);
        finish_work(&mut p);
        assert_eq!(p.stats().best_streak, 2);

        p.set_mode(TimerMode::Work, None);
        p.start();
        p.tick();
        p.reset();

        assert_eq!(p.stats().current_streak, 0);
        assert_eq!(p.stats().best_streak, 2);
        assert_eq!(p.stats().completed_session_count, 2);
        assert_eq!(p.timer().remaining_seconds(), 25 * 60);

        finish_work(&mut p);
        assert_eq!(p.stats().current_streak, 1);
        assert!(p.stats().best_streak >= p.stats().current_streak);
    }

    #[test]
    fn stats_survive_reload_and_merge_partial_records() {
        let store = Rc::new(Store::in_memory());
        let mut p = PomodoroManager::load(Rc::clone(&store), PomodoroSettings::default());
        finish_work(&mut p);

        let reloaded = PomodoroManager::load(Rc::clone(&store), PomodoroSettings::default());
        assert_eq!(reloaded.stats(), p.stats());

        store.set(STATS_KEY, &serde_json::json!({ "currentStreak": 3, "bestStreak": 1 }));
        let merged = PomodoroManager::load(store, PomodoroSettings::default());
        assert_eq!(
            *merged.stats(),
            SessionStats {
                current_streak: 3,
                best_streak: 3,
                ..SessionStats::default()
            }
        );
    }

    #[test]
    fn ticks_are_reported_to_listeners() {
        let mut p = pomodoro();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        p.hooks_mut().subscribe(move |change| sink.borrow_mut().push(change.clone()));

        p.set_mode_seconds(TimerMode::Work, 2);
        p.start();
        p.run(&mut VirtualTicks::unlimited());

        let seen = seen.borrow();
        assert!(seen.contains(&Change::Timer {
            mode: TimerMode::Work,
            remaining_seconds: 1,
            running: true
        }));
        assert!(seen.contains(&Change::Stats));
        assert_eq!(
            seen.last(),
            Some(&Change::Timer {
                mode: TimerMode::ShortBreak,
                remaining_seconds: 300,
                running: false
            })
        );
    }
}

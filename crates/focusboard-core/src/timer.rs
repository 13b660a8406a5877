use std::fmt;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimerMode {
    Work,
    ShortBreak,
    LongBreak,
}

impl TimerMode {
    pub fn is_break(self) -> bool {
        !matches!(self, Self::Work)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::ShortBreak => "short-break",
            Self::LongBreak => "long-break",
        }
    }
}

impl fmt::Display for TimerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for TimerMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "work" | "focus" => Ok(Self::Work),
            "short-break" | "short" => Ok(Self::ShortBreak),
            "long-break" | "long" => Ok(Self::LongBreak),
            other => Err(anyhow!("unknown timer mode: {other}")),
        }
    }
}

/// Default length of each mode, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Durations {
    pub work_minutes: u32,
    pub short_break_minutes: u32,
    pub long_break_minutes: u32,
}

impl Default for Durations {
    fn default() -> Self {
        Self {
            work_minutes: 25,
            short_break_minutes: 5,
            long_break_minutes: 15,
        }
    }
}

impl Durations {
    pub fn minutes(&self, mode: TimerMode) -> u32 {
        match mode {
            TimerMode::Work => self.work_minutes,
            TimerMode::ShortBreak => self.short_break_minutes,
            TimerMode::LongBreak => self.long_break_minutes,
        }
    }

    /// Missing, zero or negative input falls back to the mode default.
    pub fn normalize(&self, mode: TimerMode, raw: Option<i64>) -> u32 {
        match raw {
            Some(minutes) if minutes > 0 => u32::try_from(minutes).unwrap_or(u32::MAX),
            _ => self.minutes(mode).max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Not running; nothing moved.
    Idle,
    Counting { remaining_seconds: u64 },
    /// Reached zero and stopped.
    Expired { mode: TimerMode },
}

/// Single countdown with a mode. Advances only through [`Timer::tick`],
/// so whoever owns the tick source owns time.
#[derive(Debug, Clone)]
pub struct Timer {
    durations: Durations,
    mode: TimerMode,
    period_seconds: u64,
    remaining_seconds: u64,
    running: bool,
}

impl Timer {
    pub fn new(durations: Durations) -> Self {
        let mut timer = Self {
            durations,
            mode: TimerMode::Work,
            period_seconds: 0,
            remaining_seconds: 0,
            running: false,
        };
        timer.set_mode(TimerMode::Work, None);
        timer
    }

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn remaining_seconds(&self) -> u64 {
        self.remaining_seconds
    }

    pub fn period_seconds(&self) -> u64 {
        self.period_seconds
    }

    pub fn running(&self) -> bool {
        self.running
    }

    /// Whole minutes in the current period.
    pub fn period_minutes(&self) -> u64 {
        self.period_seconds / 60
    }

    /// True once the current period has lost at least one second.
    pub fn in_progress(&self) -> bool {
        self.remaining_seconds < self.period_seconds
    }

    pub fn set_mode(&mut self, mode: TimerMode, minutes: Option<i64>) {
        let minutes = self.durations.normalize(mode, minutes);
        self.set_mode_seconds(mode, u64::from(minutes) * 60);
    }

    /// Like [`Timer::set_mode`] with second precision; zero seconds means
    /// the mode default.
    pub fn set_mode_seconds(&mut self, mode: TimerMode, seconds: u64) {
        let seconds = if seconds == 0 {
            u64::from(self.durations.normalize(mode, None)) * 60
        } else {
            seconds
        };
        self.running = false;
        self.mode = mode;
        self.period_seconds = seconds;
        self.remaining_seconds = seconds;
    }

    /// Returns false when already running.
    pub fn start(&mut self) -> bool {
        if self.running || self.remaining_seconds == 0 {
            return false;
        }
        self.running = true;
        true
    }

    /// Returns false when already paused.
    pub fn pause(&mut self) -> bool {
        let was_running = self.running;
        self.running = false;
        was_running
    }

    pub fn reset(&mut self) {
        self.pause();
        self.remaining_seconds = self.period_seconds;
    }

    pub fn tick(&mut self) -> Tick {
        if !self.running {
            return Tick::Idle;
        }

        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        trace!(mode = %self.mode, remaining = self.remaining_seconds, "timer tick");
        if self.remaining_seconds == 0 {
            self.running = false;
            return Tick::Expired { mode: self.mode };
        }
        Tick::Counting {
            remaining_seconds: self.remaining_seconds,
        }
    }

    /// `MM:SS`
    pub fn remaining_display(&self) -> String {
        format_clock(self.remaining_seconds)
    }
}

pub fn format_clock(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Drives a running timer. `wait` blocks until the next tick is due and
/// returns false once the source has no more ticks to give.
pub trait TickSource {
    fn wait(&mut self) -> bool;
}

/// Real time: one tick per `period`.
#[derive(Debug, Clone)]
pub struct IntervalTicks {
    period: Duration,
}

impl IntervalTicks {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    pub fn every_second() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl TickSource for IntervalTicks {
    fn wait(&mut self) -> bool {
        thread::sleep(self.period);
        true
    }
}

/// Virtual time for tests: ticks immediately, optionally only `n` times.
#[derive(Debug, Clone, Default)]
pub struct VirtualTicks {
    limit: Option<u64>,
    delivered: u64,
}

impl VirtualTicks {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn limited(n: u64) -> Self {
        Self {
            limit: Some(n),
            delivered: 0,
        }
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }
}

impl TickSource for VirtualTicks {
    fn wait(&mut self) -> bool {
        if self.limit.is_some_and(|limit| self.delivered >= limit) {
            return false;
        }
        self.delivered += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::{Durations, Tick, Timer, TimerMode, TickSource, VirtualTicks, format_clock};

    #[test]
    fn starts_in_work_mode_with_default_length() {
        let timer = Timer::new(Durations::default());
        assert_eq!(timer.mode(), TimerMode::Work);
        assert_eq!(timer.remaining_seconds(), 25 * 60);
        assert!(!timer.running());
        assert_eq!(timer.remaining_display(), "25:00");
    }

    #[test]
    fn malformed_minutes_fall_back_to_mode_default() {
        let mut timer = Timer::new(Durations::default());
        timer.set_mode(TimerMode::ShortBreak, Some(0));
        assert_eq!(timer.remaining_seconds(), 5 * 60);
        timer.set_mode(TimerMode::LongBreak, Some(-3));
        assert_eq!(timer.remaining_seconds(), 15 * 60);
        timer.set_mode(TimerMode::Work, Some(50));
        assert_eq!(timer.remaining_seconds(), 50 * 60);
    }

    #[test]
    fn start_is_idempotent_and_pause_keeps_remaining() {
        let mut timer = Timer::new(Durations::default());
        assert!(timer.start());
        assert!(!timer.start());

        timer.tick();
        timer.tick();
        assert!(timer.pause());
        assert!(!timer.pause());
        assert_eq!(timer.remaining_seconds(), 25 * 60 - 2);

        assert_eq!(timer.tick(), Tick::Idle);
        assert_eq!(timer.remaining_seconds(), 25 * 60 - 2);

        timer.start();
        timer.tick();
        assert_eq!(timer.remaining_seconds(), 25 * 60 - 3);
    }

    #[test]
    fn reset_restores_period_and_stops() {
        let mut timer = Timer::new(Durations::default());
        timer.set_mode(TimerMode::Work, Some(10));
        timer.start();
        timer.tick();
        assert!(timer.in_progress());

        timer.reset();
        assert!(!timer.running());
        assert!(!timer.in_progress());
        assert_eq!(timer.remaining_seconds(), 600);
    }

    #[test]
    fn set_mode_cancels_countdown() {
        let mut timer = Timer::new(Durations::default());
        timer.start();
        timer.set_mode(TimerMode::ShortBreak, None);
        assert!(!timer.running());
        assert_eq!(timer.tick(), Tick::Idle);
    }

    #[test]
    fn expires_at_zero() {
        let mut timer = Timer::new(Durations::default());
        timer.set_mode_seconds(TimerMode::Work, 2);
        timer.start();
        assert_eq!(timer.tick(), Tick::Counting { remaining_seconds: 1 });
        assert_eq!(timer.tick(), Tick::Expired { mode: TimerMode::Work });
        assert!(!timer.running());
        assert_eq!(timer.tick(), Tick::Idle);
        assert!(!timer.start());
    }

    #[test]
    fn virtual_ticks_respect_limit() {
        let mut ticks = VirtualTicks::limited(2);
        assert!(ticks.wait());
        assert!(ticks.wait());
        assert!(!ticks.wait());
        assert_eq!(ticks.delivered(), 2);
    }

    #[test]
    fn clock_format() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(61), "01:01");
        assert_eq!(format_clock(25 * 60), "25:00");
    }

    #[test]
    fn mode_names_round_trip() {
        for mode in [TimerMode::Work, TimerMode::ShortBreak, TimerMode::LongBreak] {
            assert_eq!(mode.as_str().parse::<TimerMode>().expect("known"), mode);
        }
        assert!("nap".parse::<TimerMode>().is_err());
    }
}

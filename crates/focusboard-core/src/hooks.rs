use std::fmt;

use tracing::{debug, instrument};

use crate::timer::TimerMode;

/// What changed, sent to listeners after the mutation has been applied
/// and persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Tasks,
    Flashcards,
    Moods,
    Profile,
    /// Session stats were updated by a completed work period.
    Stats,
    /// Timer mode, running flag or remaining time moved.
    Timer {
        mode: TimerMode,
        remaining_seconds: u64,
        running: bool,
    },
}

pub type Listener = Box<dyn FnMut(&Change)>;

/// Per-manager listener registry; the presentation layer subscribes a
/// render callback here instead of the manager calling into any UI.
#[derive(Default)]
pub struct Hooks {
    listeners: Vec<Listener>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("listeners", &self.len())
            .finish()
    }
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&Change) + 'static) {
        self.listeners.push(Box::new(listener));
        debug!(count = self.len(), "registered change listener");
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    #[instrument(skip(self), level = "trace")]
    pub fn emit(&mut self, change: Change) {
        for listener in &mut self.listeners {
            listener(&change);
        }
    }
}

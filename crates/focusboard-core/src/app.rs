use std::rc::Rc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{info, instrument};

use crate::config::Settings;
use crate::dashboard::{Dashboard, DashboardSummary};
use crate::datetime::{Clock, SystemClock};
use crate::flashcard::FlashcardManager;
use crate::mood::MoodManager;
use crate::pomodoro::PomodoroManager;
use crate::store::Store;
use crate::tasks::TaskManager;
use crate::user::ProfileManager;

/// Top-level context. Every manager is built here from one store and
/// one clock; nothing is global, so each `App` is isolated.
pub struct App {
    pub tasks: TaskManager,
    pub flashcards: FlashcardManager,
    pub moods: MoodManager,
    pub pomodoro: PomodoroManager,
    pub profile: ProfileManager,
    pub dashboard: Dashboard,
    clock: Rc<dyn Clock>,
    settings: Settings,
}

impl App {
    #[instrument(skip_all)]
    pub fn new(store: Store, clock: Rc<dyn Clock>, settings: Settings) -> Self {
        let store = Rc::new(store);
        let calendar = settings.calendar;

        let app = Self {
            tasks: TaskManager::load(Rc::clone(&store), Rc::clone(&clock), calendar),
            flashcards: FlashcardManager::load(Rc::clone(&store), Rc::clone(&clock)),
            moods: MoodManager::load(Rc::clone(&store), Rc::clone(&clock), calendar),
            pomodoro: PomodoroManager::load(Rc::clone(&store), settings.pomodoro),
            clock,
            profile: ProfileManager::load(store),
            dashboard: Dashboard::new(settings.weekly_target)
                .with_mood_window(settings.mood_history)
                .with_upcoming_limit(settings.upcoming_limit),
            settings,
        };
        info!(timezone = %app.settings.calendar.timezone(), "application context ready");
        app
    }

    pub fn with_system_clock(store: Store, settings: Settings) -> Self {
        Self::new(store, Rc::new(SystemClock), settings)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// The calendar date in the configured timezone.
    pub fn today(&self) -> NaiveDate {
        self.settings.calendar.today(self.now())
    }

    pub fn summary(&self) -> DashboardSummary {
        self.dashboard
            .summary(&self.tasks, &self.pomodoro, &self.moods)
    }
}

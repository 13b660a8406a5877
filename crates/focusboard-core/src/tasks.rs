use std::rc::Rc;

use chrono::NaiveDate;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::datetime::{Calendar, Clock};
use crate::error::ValidationError;
use crate::filter::TaskFilter;
use crate::hooks::{Change, Hooks};
use crate::store::{Store, TASKS_KEY};
use crate::task::{Task, TaskDraft};

/// Owns the task collection. Stored order is insertion order; every
/// query sorts or filters a borrowed view.
pub struct TaskManager {
    store: Rc<Store>,
    clock: Rc<dyn Clock>,
    calendar: Calendar,
    tasks: Vec<Task>,
    current_filter: TaskFilter,
    hooks: Hooks,
}

impl TaskManager {
    #[instrument(skip_all)]
    pub fn load(store: Rc<Store>, clock: Rc<dyn Clock>, calendar: Calendar) -> Self {
        let tasks: Vec<Task> = store.get_records(TASKS_KEY).unwrap_or_default();
        info!(count = tasks.len(), "loaded tasks");
        Self {
            store,
            clock,
            calendar,
            tasks,
            current_filter: TaskFilter::All,
            hooks: Hooks::new(),
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    #[instrument(skip(self, draft), fields(title_len = draft.title.len()))]
    pub fn add(&mut self, draft: TaskDraft) -> Result<Task, ValidationError> {
        let task = Task::from_draft(draft, self.clock.now())?;
        info!(id = %task.id, date = %task.date, priority = %task.priority, "added task");
        self.tasks.push(task.clone());
        self.persist();
        Ok(task)
    }

    /// Flips `completed`; unknown ids are ignored.
    #[instrument(skip(self))]
    pub fn toggle_completion(&mut self, id: Uuid) -> Option<&Task> {
        let Some(idx) = self.tasks.iter().position(|task| task.id == id) else {
            debug!(%id, "toggle for unknown task ignored");
            return None;
        };

        self.tasks[idx].completed = !self.tasks[idx].completed;
        info!(%id, completed = self.tasks[idx].completed, "toggled task");
        self.persist();
        self.tasks.get(idx)
    }

    #[instrument(skip(self))]
    pub fn delete(&mut self, id: Uuid) -> Option<Task> {
        let Some(idx) = self.tasks.iter().position(|task| task.id == id) else {
            debug!(%id, "delete for unknown task ignored");
            return None;
        };

        let removed = self.tasks.remove(idx);
        info!(%id, remaining = self.tasks.len(), "deleted task");
        self.persist();
        Some(removed)
    }

    pub fn filter(&self, criterion: TaskFilter) -> Vec<&Task> {
        criterion.apply(&self.tasks)
    }

    pub fn current_filter(&self) -> TaskFilter {
        self.current_filter
    }

    /// Remembers the list selection for the next render.
    pub fn set_filter(&mut self, criterion: TaskFilter) {
        debug!(filter = %criterion, "changed task filter");
        self.current_filter = criterion;
        self.hooks.emit(Change::Tasks);
    }

    pub fn visible(&self) -> Vec<&Task> {
        self.filter(self.current_filter)
    }

    pub fn tasks_for_date(&self, date: NaiveDate) -> Vec<&Task> {
        self.tasks.iter().filter(|task| task.date == date).collect()
    }

    /// Incomplete tasks dated after today, soonest first.
    pub fn upcoming(&self, limit: usize) -> Vec<&Task> {
        let today = self.calendar.today(self.clock.now());
        let mut out: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|task| !task.completed && task.date > today)
            .collect();
        out.sort_by_key(|task| task.date);
        out.truncate(limit);
        out
    }

    /// Completed tasks dated between the latest Sunday and today.
    pub fn completed_this_week(&self) -> Vec<&Task> {
        let now = self.clock.now();
        let start = self.calendar.week_start(now);
        let today = self.calendar.today(now);
        self.tasks
            .iter()
            .filter(|task| task.completed && task.date >= start && task.date <= today)
            .collect()
    }

    pub fn completed_today(&self) -> Vec<&Task> {
        let today = self.calendar.today(self.clock.now());
        self.tasks
            .iter()
            .filter(|task| task.completed && task.date == today)
            .collect()
    }

    fn persist(&mut self) {
        self.store.set(TASKS_KEY, &self.tasks);
        self.hooks.emit(Change::Tasks);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::TaskManager;
    use crate::datetime::{Calendar, FixedClock};
    use crate::error::ValidationError;
    use crate::filter::TaskFilter;
    use crate::store::{Backend, MemoryBackend, Store, TASKS_KEY};
    use crate::task::{Priority, TaskDraft};

    // Wednesday
    fn wednesday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 18, 15, 0, 0).unwrap()
    }

    fn manager() -> (TaskManager, Rc<FixedClock>) {
        let clock = Rc::new(FixedClock::new(wednesday()));
        let tasks = TaskManager::load(Rc::new(Store::in_memory()), clock.clone(), Calendar::utc());
        (tasks, clock)
    }

    #[test]
    fn add_toggle_delete_round_trip() {
        let (mut tasks, _) = manager();
        let before = tasks.tasks().len();

        let added = tasks
            .add(TaskDraft::new("Review notes", "2026-02-18"))
            .expect("add");
        assert_eq!(tasks.tasks().len(), before + 1);

        let toggled = tasks.toggle_completion(added.id).expect("known id");
        assert!(toggled.completed);

        let removed = tasks.delete(added.id).expect("known id");
        assert_eq!(removed.id, added.id);
        assert_eq!(tasks.tasks().len(), before);
    }

    #[test]
    fn rejected_add_leaves_collection_alone() {
        let (mut tasks, _) = manager();
        let err = tasks.add(TaskDraft::new("  ", "2026-02-18")).unwrap_err();
        assert_eq!(err, ValidationError::missing("title"));
        assert!(tasks.tasks().is_empty());
    }

    #[test]
    fn unknown_ids_are_no_ops() {
        let (mut tasks, _) = manager();
        tasks.add(TaskDraft::new("a", "2026-02-18")).expect("add");
        let stranger = uuid::Uuid::now_v7();

        assert!(tasks.toggle_completion(stranger).is_none());
        assert!(tasks.delete(stranger).is_none());
        assert_eq!(tasks.tasks().len(), 1);
    }

    #[test]
    fn mutations_notify_listeners() {
        let (mut tasks, _) = manager();
        let renders = Rc::new(Cell::new(0));
        let counter = Rc::clone(&renders);
        tasks.hooks_mut().subscribe(move |_| counter.set(counter.get() + 1));

        let task = tasks.add(TaskDraft::new("a", "2026-02-18")).expect("add");
        tasks.toggle_completion(task.id);
        tasks.toggle_completion(uuid::Uuid::now_v7());
        tasks.delete(task.id);

        assert_eq!(renders.get(), 3);
    }

    #[test]
    fn filters_and_current_selection() {
        let (mut tasks, _) = manager();
        let mut urgent = TaskDraft::new("urgent", "2026-02-18");
        urgent.priority = Some("high".to_string());
        let urgent = tasks.add(urgent).expect("add");
        tasks.add(TaskDraft::new("later", "2026-02-19")).expect("add");
        tasks.toggle_completion(urgent.id);

        assert_eq!(tasks.current_filter(), TaskFilter::All);
        assert_eq!(tasks.visible().len(), 2);

        tasks.set_filter(TaskFilter::Pending);
        let visible: Vec<&str> = tasks.visible().iter().map(|t| t.title.as_str()).collect();
        assert_eq!(visible, vec!["later"]);

        let high = tasks.filter(TaskFilter::High);
        assert_eq!(high.len(), 1);
        assert_eq!(high[0].priority, Priority::High);
    }

    #[test]
    fn date_bucketed_queries() {
        let (mut tasks, clock) = manager();
        let sunday = tasks.add(TaskDraft::new("sunday", "2026-02-15")).expect("add");
        let saturday_before = tasks.add(TaskDraft::new("old", "2026-02-14")).expect("add");
        let today = tasks.add(TaskDraft::new("today", "2026-02-18")).expect("add");
        tasks.add(TaskDraft::new("friday", "2026-02-20")).expect("add");
        tasks.add(TaskDraft::new("thursday", "2026-02-19")).expect("add");
        tasks.add(TaskDraft::new("next week", "2026-02-25")).expect("add");

        for id in [sunday.id, saturday_before.id, today.id] {
            tasks.toggle_completion(id);
        }

        let week: Vec<&str> = tasks
            .completed_this_week()
            .iter()
            .map(|t| t.title.as_str())
            .collect();
        assert_eq!(week, vec!["sunday", "today"]);

        assert_eq!(tasks.completed_today().len(), 1);
        assert_eq!(tasks.tasks_for_date(today.date).len(), 1);

        let upcoming: Vec<&str> = tasks.upcoming(2).iter().map(|t| t.title.as_str()).collect();
        assert_eq!(upcoming, vec!["thursday", "friday"]);

        // stored order untouched by the sorted query
        assert_eq!(tasks.tasks()[3].title, "friday");

        clock.advance(Duration::days(1));
        assert!(tasks.completed_today().is_empty());
    }

    #[test]
    fn reload_sees_persisted_collection() {
        let store = Rc::new(Store::in_memory());
        let clock = Rc::new(FixedClock::new(wednesday()));
        let mut tasks = TaskManager::load(Rc::clone(&store), clock.clone(), Calendar::utc());
        tasks.add(TaskDraft::new("a", "2026-02-18")).expect("add");
        tasks.add(TaskDraft::new("b", "2026-02-19")).expect("add");

        let reloaded = TaskManager::load(store, clock, Calendar::utc());
        assert_eq!(reloaded.tasks(), tasks.tasks());
    }

    #[test]
    fn bad_stored_fields_do_not_cost_the_collection() {
        let backend = MemoryBackend::new();
        backend
            .write(
                TASKS_KEY,
                r#"[
                  {"id":"01890a5d-ac96-774b-bcce-b302099a8057","title":"keep me",
                   "date":"2026-02-18","estimatedMinutes":40,"priority":"high",
                   "completed":false,"createdAt":"2026-02-16T09:00:00Z"},
                  {"id":"01890a5d-ac96-774b-bcce-b302099a8058","title":"odd fields",
                   "date":"2026-02-19","estimatedMinutes":-5,"priority":"urgent",
                   "completed":false,"createdAt":"2026-02-16T09:00:00Z"},
                  {"title":"no id or date"}
                ]"#,
            )
            .expect("seed raw tasks");
        let store = Rc::new(Store::new(backend));
        let clock = Rc::new(FixedClock::new(wednesday()));

        let mut tasks = TaskManager::load(Rc::clone(&store), clock.clone(), Calendar::utc());
        let titles: Vec<&str> = tasks.tasks().iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["keep me", "odd fields"]);
        assert_eq!(tasks.tasks()[0].priority, Priority::High);
        assert_eq!(tasks.tasks()[1].priority, Priority::Medium);
        assert_eq!(tasks.tasks()[1].estimated_minutes, 25);

        tasks.add(TaskDraft::new("new", "2026-02-20")).expect("add");

        let reloaded = TaskManager::load(store, clock, Calendar::utc());
        let titles: Vec<&str> = reloaded.tasks().iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["keep me", "odd fields", "new"]);
    }
}

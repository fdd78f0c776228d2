//! Task store: owns the mapping from timesheet id to its tasks.
//!
//! Every mutation runs validate -> persist -> commit -> recompute while
//! holding the owning timesheet's write slot, so two writes against the
//! same week queue up instead of interleaving. The backend call happens
//! before anything in memory changes; a failed call leaves the store as it
//! was.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{Local, NaiveDate, Utc};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::{Task, TaskInput, generate_id};
use crate::error::{AppError, AppResult};
use crate::events::{EventBus, StoreEvent, Subscription};
use crate::repository::TaskRepository;
use crate::timesheets::TimesheetStore;
use crate::validation::validate_task;

pub struct TaskStore<R> {
    repo: Arc<R>,
    timesheets: TimesheetStore,
    events: EventBus,
    cache: Mutex<HashMap<String, Vec<Task>>>,
    write_queue: WriteQueue,
    ids: IdAllocator,
    today: fn() -> NaiveDate,
}

impl<R: TaskRepository> TaskStore<R> {
    pub fn new(repo: Arc<R>, timesheets: TimesheetStore, events: EventBus) -> Self {
        Self {
            repo,
            timesheets,
            events,
            cache: Mutex::new(HashMap::new()),
            write_queue: WriteQueue::default(),
            ids: IdAllocator::default(),
            today: local_today,
        }
    }

    /// Overrides the day used for status recomputation.
    #[cfg(test)]
    pub fn with_today(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    pub fn timesheets(&self) -> &TimesheetStore {
        &self.timesheets
    }

    pub fn subscribe(&self) -> Subscription {
        self.events.subscribe()
    }

    /// All tasks of the timesheet, by date and then creation order.
    pub async fn list_by_timesheet(&self, timesheet_id: &str) -> AppResult<Vec<Task>> {
        self.ensure_loaded(timesheet_id).await?;
        let mut tasks = self
            .cache()
            .get(timesheet_id)
            .cloned()
            .unwrap_or_default();
        tasks.sort_by_key(|task| task.date);
        Ok(tasks)
    }

    pub fn get(&self, id: &str) -> AppResult<Task> {
        self.find_cached(id).ok_or_else(|| AppError::not_found("task", id))
    }

    /// Like [`TaskStore::get`], loading timesheets one by one until the task
    /// turns up.
    pub async fn locate(&self, id: &str) -> AppResult<Task> {
        if let Some(task) = self.find_cached(id) {
            return Ok(task);
        }
        for timesheet in self.timesheets.list(&Default::default(), (self.today)()) {
            self.ensure_loaded(&timesheet.id).await?;
            if let Some(task) = self.find_cached(id) {
                return Ok(task);
            }
        }
        Err(AppError::not_found("task", id))
    }

    pub async fn create(&self, input: TaskInput) -> AppResult<Task> {
        let _slot = self.write_queue.acquire(&input.timesheet_id).await;
        let timesheet = self.timesheets.find(&input.timesheet_id);
        let validated = validate_task(&input, timesheet.as_ref())?;
        self.ensure_loaded(&validated.timesheet_id).await?;

        let task = validated.into_task(self.ids.next());
        let stored = self.repo.insert_task(&task).await?;
        self.ids.reserve([stored.id.clone()]);
        self.commit(&stored.timesheet_id, |tasks| tasks.push(stored.clone()));

        tracing::debug!(
            task_id = %stored.id,
            timesheet_id = %stored.timesheet_id,
            hours = stored.hours,
            "Task created"
        );
        Ok(stored)
    }

    /// Replaces every field but `id` and `timesheet_id`.
    pub async fn update(&self, id: &str, input: TaskInput) -> AppResult<Task> {
        let existing = self.locate(id).await?;

        let _slot = self.write_queue.acquire(&existing.timesheet_id).await;
        // A queued delete may have removed it while we waited.
        let existing = self.get(id)?;
        let timesheet = self.timesheets.find(&existing.timesheet_id);
        let input = TaskInput {
            timesheet_id: existing.timesheet_id.clone(),
            ..input
        };
        let validated = validate_task(&input, timesheet.as_ref())?;

        let task = validated.into_task(existing.id.clone());
        let stored = self.repo.update_task(&task).await?;
        self.commit(&existing.timesheet_id, |tasks| {
            if let Some(slot) = tasks.iter_mut().find(|task| task.id == existing.id) {
                *slot = stored.clone();
            }
        });

        tracing::debug!(task_id = %stored.id, timesheet_id = %stored.timesheet_id, "Task updated");
        Ok(stored)
    }

    /// Unknown or already-deleted ids fail with `NotFound` and change nothing.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let existing = self.locate(id).await?;

        let _slot = self.write_queue.acquire(&existing.timesheet_id).await;
        let existing = self.get(id)?;
        self.repo.delete_task(id).await?;
        self.commit(&existing.timesheet_id, |tasks| tasks.retain(|task| task.id != id));

        tracing::debug!(task_id = %id, timesheet_id = %existing.timesheet_id, "Task deleted");
        Ok(())
    }

    /// Drops cached tasks so the next read goes back to the backend.
    pub fn invalidate_all(&self) {
        self.cache().clear();
    }

    async fn ensure_loaded(&self, timesheet_id: &str) -> AppResult<()> {
        if self.cache().contains_key(timesheet_id) {
            return Ok(());
        }

        self.timesheets.get(timesheet_id)?;
        let tasks = self.repo.fetch_tasks(timesheet_id).await?;
        self.ids.reserve(tasks.iter().map(|task| task.id.clone()));

        let tasks = {
            let mut cache = self.cache();
            cache
                .entry(timesheet_id.to_string())
                .or_insert(tasks)
                .clone()
        };
        tracing::debug!(timesheet_id = %timesheet_id, count = tasks.len(), "Tasks loaded");
        self.timesheets
            .apply_aggregate(timesheet_id, &tasks, (self.today)(), Utc::now());
        self.events.publish(StoreEvent::TasksChanged {
            timesheet_id: timesheet_id.to_string(),
        });
        Ok(())
    }

    fn commit(&self, timesheet_id: &str, change: impl FnOnce(&mut Vec<Task>)) {
        let tasks = {
            let mut cache = self.cache();
            let tasks = cache.entry(timesheet_id.to_string()).or_default();
            change(tasks);
            tasks.clone()
        };
        self.timesheets
            .apply_aggregate(timesheet_id, &tasks, (self.today)(), Utc::now());
        self.events.publish(StoreEvent::TasksChanged {
            timesheet_id: timesheet_id.to_string(),
        });
    }

    fn find_cached(&self, id: &str) -> Option<Task> {
        self.cache()
            .values()
            .flat_map(|tasks| tasks.iter())
            .find(|task| task.id == id)
            .cloned()
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<String, Vec<Task>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// One async lock per timesheet, created on first use.
#[derive(Debug, Default)]
struct WriteQueue {
    slots: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl WriteQueue {
    async fn acquire(&self, timesheet_id: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots
                .entry(timesheet_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        slot.lock_owned().await
    }
}

/// Hands out ids never seen before in this store's lifetime, deleted ones
/// included.
#[derive(Debug, Default)]
struct IdAllocator {
    issued: Mutex<HashSet<String>>,
}

impl IdAllocator {
    fn next(&self) -> String {
        let mut issued = self.issued.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            let id = generate_id();
            if issued.insert(id.clone()) {
                return id;
            }
        }
    }

    fn reserve(&self, ids: impl IntoIterator<Item = String>) {
        let mut issued = self.issued.lock().unwrap_or_else(PoisonError::into_inner);
        issued.extend(ids);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::{HashMap, HashSet};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use chrono::{NaiveDate, TimeZone, Utc};
    use tokio::sync::Mutex;

    use super::TaskStore;
    use crate::domain::{Task, TaskInput, Timesheet, TimesheetStatus, seed_timesheets};
    use crate::error::{AppError, AppResult};
    use crate::events::{EventBus, StoreEvent};
    use crate::filter::TimesheetFilter;
    use crate::repository::TaskRepository;
    use crate::timesheets::TimesheetStore;
    use crate::validation::TaskField;

    pub(crate) fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 24).expect("valid date")
    }

    /// In-memory backend with failure injection and write-overlap tracking.
    #[derive(Default)]
    pub(crate) struct MemoryRepository {
        timesheets: Vec<Timesheet>,
        tasks: Mutex<HashMap<String, Vec<Task>>>,
        fail_writes: AtomicBool,
        write_delay_ms: u64,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl MemoryRepository {
        pub(crate) fn new(timesheets: Vec<Timesheet>) -> Self {
            Self {
                timesheets,
                ..Self::default()
            }
        }

        fn with_write_delay(mut self, millis: u64) -> Self {
            self.write_delay_ms = millis;
            self
        }

        pub(crate) fn fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        async fn write<T>(&self, apply: impl FnOnce(&mut HashMap<String, Vec<Task>>) -> AppResult<T>) -> AppResult<T> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            if self.write_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.write_delay_ms)).await;
            }
            let result = if self.fail_writes.load(Ordering::SeqCst) {
                Err(AppError::Persistence("backend rejected the write".to_string()))
            } else {
                apply(&mut *self.tasks.lock().await)
            };
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    impl TaskRepository for MemoryRepository {
        async fn fetch_timesheets(&self, filter: &TimesheetFilter, today: NaiveDate) -> AppResult<Vec<Timesheet>> {
            Ok(self
                .timesheets
                .iter()
                .filter(|sheet| filter.matches(sheet, today))
                .cloned()
                .collect())
        }

        async fn fetch_tasks(&self, timesheet_id: &str) -> AppResult<Vec<Task>> {
            Ok(self
                .tasks
                .lock()
                .await
                .get(timesheet_id)
                .cloned()
                .unwrap_or_default())
        }

        async fn insert_task(&self, task: &Task) -> AppResult<Task> {
            self.write(|tasks| {
                tasks
                    .entry(task.timesheet_id.clone())
                    .or_default()
                    .push(task.clone());
                Ok(task.clone())
            })
            .await
        }

        async fn update_task(&self, task: &Task) -> AppResult<Task> {
            self.write(|tasks| {
                let slot = tasks
                    .values_mut()
                    .flat_map(|list| list.iter_mut())
                    .find(|existing| existing.id == task.id)
                    .ok_or_else(|| AppError::not_found("task", task.id.clone()))?;
                *slot = task.clone();
                Ok(task.clone())
            })
            .await
        }

        async fn delete_task(&self, id: &str) -> AppResult<()> {
            self.write(|tasks| {
                for list in tasks.values_mut() {
                    list.retain(|task| task.id != id);
                }
                Ok(())
            })
            .await
        }

        fn describe(&self) -> String {
            "memory".to_string()
        }
    }

    pub(crate) fn seeded_store(weeks: u32) -> (TaskStore<MemoryRepository>, Vec<Timesheet>) {
        seeded_store_with(weeks, |repo| repo)
    }

    fn seeded_store_with(
        weeks: u32,
        configure: impl FnOnce(MemoryRepository) -> MemoryRepository,
    ) -> (TaskStore<MemoryRepository>, Vec<Timesheet>) {
        let now = Utc.with_ymd_and_hms(2025, 9, 24, 9, 0, 0).unwrap();
        let sheets = seed_timesheets(today(), weeks, now);
        let events = EventBus::new();
        let timesheets = TimesheetStore::new(events.clone());
        timesheets.replace_all(sheets.clone());
        let repo = Arc::new(configure(MemoryRepository::new(sheets.clone())));
        let store = TaskStore::new(repo, timesheets, events).with_today(today);
        (store, sheets)
    }

    pub(crate) fn input_for(sheet: &Timesheet, date: NaiveDate, hours: i32) -> TaskInput {
        TaskInput {
            date: Some(date),
            project_name: "Homepage Development".to_string(),
            type_of_work: "Bug fixes".to_string(),
            description: "Fix navigation issues on mobile".to_string(),
            hours,
            timesheet_id: sheet.id.clone(),
        }
    }

    async fn assert_total_matches(store: &TaskStore<MemoryRepository>, sheet: &Timesheet) {
        let tasks = store.list_by_timesheet(&sheet.id).await.expect("tasks");
        let sum = tasks.iter().map(|task| u32::from(task.hours)).sum::<u32>();
        let summary = store.timesheets().get(&sheet.id).expect("timesheet");
        assert_eq!(summary.total_hours, sum);
    }

    #[tokio::test]
    async fn create_returns_what_was_asked_for() {
        let (store, sheets) = seeded_store(2);
        let sheet = &sheets[1];
        for hours in [1, 6, 12] {
            let input = input_for(sheet, sheet.start_date, hours);
            let task = store.create(input.clone()).await.expect("valid task");
            assert_eq!(i32::from(task.hours), hours);
            assert_eq!(task.description, input.description);
            assert_eq!(task.timesheet_id, sheet.id);
        }
    }

    #[tokio::test]
    async fn out_of_range_hours_leave_store_untouched() {
        let (store, sheets) = seeded_store(1);
        let sheet = &sheets[0];
        let kept = store
            .create(input_for(sheet, sheet.start_date, 3))
            .await
            .expect("valid task");

        for hours in [0, 13, -1] {
            let result = store.create(input_for(sheet, sheet.start_date, hours)).await;
            match result {
                Err(AppError::Validation(errors)) => assert!(errors.contains(TaskField::Hours)),
                other => panic!("hours {hours} accepted: {other:?}"),
            }

            let result = store.update(&kept.id, input_for(sheet, sheet.start_date, hours)).await;
            assert!(matches!(result, Err(AppError::Validation(_))));
        }

        let tasks = store.list_by_timesheet(&sheet.id).await.expect("tasks");
        assert_eq!(tasks, vec![kept]);
        assert_eq!(store.timesheets().get(&sheet.id).expect("sheet").total_hours, 3);
    }

    #[tokio::test]
    async fn deleting_twice_is_not_found_and_harmless() {
        let (store, sheets) = seeded_store(1);
        let sheet = &sheets[0];
        let first = store
            .create(input_for(sheet, sheet.start_date, 2))
            .await
            .expect("valid task");
        let second = store
            .create(input_for(sheet, sheet.end_date, 5))
            .await
            .expect("valid task");

        store.delete(&first.id).await.expect("first delete");
        let again = store.delete(&first.id).await;
        assert!(matches!(again, Err(AppError::NotFound { entity: "task", .. })));
        assert_eq!(
            store.list_by_timesheet(&sheet.id).await.expect("tasks"),
            vec![second]
        );
    }

    #[tokio::test]
    async fn totals_track_every_mutation() {
        let (store, sheets) = seeded_store(1);
        let sheet = &sheets[0];

        let a = store
            .create(input_for(sheet, sheet.start_date, 8))
            .await
            .expect("create");
        assert_total_matches(&store, sheet).await;
        let b = store
            .create(input_for(sheet, sheet.end_date, 4))
            .await
            .expect("create");
        assert_total_matches(&store, sheet).await;
        store
            .update(&a.id, input_for(sheet, sheet.start_date, 12))
            .await
            .expect("update");
        assert_total_matches(&store, sheet).await;
        store.delete(&b.id).await.expect("delete");
        assert_total_matches(&store, sheet).await;

        let summary = store.timesheets().get(&sheet.id).expect("sheet");
        assert_eq!(summary.total_hours, 12);
        assert_eq!(summary.status, TimesheetStatus::Incomplete);
    }

    #[tokio::test]
    async fn forty_hours_completes_the_week() {
        let (store, sheets) = seeded_store(1);
        let sheet = &sheets[0];
        for date in sheet.days() {
            store.create(input_for(sheet, date, 8)).await.expect("create");
        }
        let summary = store.timesheets().get(&sheet.id).expect("sheet");
        assert_eq!(summary.total_hours, 40);
        assert_eq!(summary.status, TimesheetStatus::Completed);
    }

    #[tokio::test]
    async fn failed_persistence_commits_nothing() {
        let (store, sheets) = seeded_store(1);
        let sheet = &sheets[0];
        let kept = store
            .create(input_for(sheet, sheet.start_date, 4))
            .await
            .expect("create");
        store.repository().fail_writes(true);

        let created = store.create(input_for(sheet, sheet.start_date, 6)).await;
        assert!(matches!(created, Err(AppError::Persistence(_))));
        let updated = store.update(&kept.id, input_for(sheet, sheet.start_date, 9)).await;
        assert!(matches!(updated, Err(AppError::Persistence(_))));
        let deleted = store.delete(&kept.id).await;
        assert!(matches!(deleted, Err(AppError::Persistence(_))));

        assert_eq!(
            store.list_by_timesheet(&sheet.id).await.expect("tasks"),
            vec![kept]
        );
        assert_eq!(store.timesheets().get(&sheet.id).expect("sheet").total_hours, 4);
    }

    #[tokio::test]
    async fn update_keeps_identity_and_owner() {
        let (store, sheets) = seeded_store(2);
        let sheet = &sheets[1];
        let created = store
            .create(input_for(sheet, sheet.start_date, 4))
            .await
            .expect("create");

        let mut moved = input_for(&sheets[0], sheet.end_date, 7);
        moved.description = "Pair on checkout redesign".to_string();
        let updated = store.update(&created.id, moved).await.expect("update");
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.timesheet_id, sheet.id);
        assert_eq!(updated.date, sheet.end_date);
        assert_eq!(updated.description, "Pair on checkout redesign");
    }

    #[tokio::test]
    async fn locate_loads_owning_timesheet() {
        let (store, sheets) = seeded_store(3);
        let sheet = &sheets[1];
        let created = store
            .create(input_for(sheet, sheet.start_date, 6))
            .await
            .expect("create");
        store.invalidate_all();

        assert_eq!(store.locate(&created.id).await.expect("found"), created);
        assert!(matches!(
            store.locate("missing").await,
            Err(AppError::NotFound { entity: "task", .. })
        ));
    }

    #[tokio::test]
    async fn writes_reach_tasks_of_unloaded_timesheets() {
        let (store, sheets) = seeded_store(2);
        let sheet = &sheets[1];
        let edited = store
            .create(input_for(sheet, sheet.start_date, 2))
            .await
            .expect("valid task");
        let removed = store
            .create(input_for(sheet, sheet.end_date, 3))
            .await
            .expect("valid task");

        store.invalidate_all();
        let updated = store
            .update(&edited.id, input_for(sheet, sheet.start_date, 6))
            .await
            .expect("update after invalidate");
        assert_eq!(updated.hours, 6);

        store.invalidate_all();
        store.delete(&removed.id).await.expect("delete after invalidate");

        store.invalidate_all();
        let tasks = store.list_by_timesheet(&sheet.id).await.expect("tasks");
        assert_eq!(tasks, vec![updated]);
        assert_eq!(store.timesheets().get(&sheet.id).expect("sheet").total_hours, 6);
    }

    #[tokio::test]
    async fn description_needs_ten_non_space_characters() {
        let (store, sheets) = seeded_store(1);
        let sheet = &sheets[0];
        let mut input = input_for(sheet, sheet.start_date, 2);
        input.description = "a b c d e f".to_string();

        match store.create(input).await {
            Err(AppError::Validation(errors)) => assert!(errors.contains(TaskField::Description)),
            other => panic!("spaced-out description accepted: {other:?}"),
        }
        assert!(store.list_by_timesheet(&sheet.id).await.expect("tasks").is_empty());
    }

    #[tokio::test]
    async fn update_of_unknown_task_is_not_found() {
        let (store, sheets) = seeded_store(1);
        let result = store
            .update("missing", input_for(&sheets[0], sheets[0].start_date, 4))
            .await;
        assert!(matches!(result, Err(AppError::NotFound { entity: "task", .. })));
    }

    #[tokio::test]
    async fn listing_orders_by_date_then_creation() {
        let (store, sheets) = seeded_store(1);
        let sheet = &sheets[0];
        let late = store.create(input_for(sheet, sheet.end_date, 1)).await.expect("create");
        let early_a = store.create(input_for(sheet, sheet.start_date, 2)).await.expect("create");
        let early_b = store.create(input_for(sheet, sheet.start_date, 3)).await.expect("create");

        let ids = store
            .list_by_timesheet(&sheet.id)
            .await
            .expect("tasks")
            .into_iter()
            .map(|task| task.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![early_a.id, early_b.id, late.id]);
    }

    #[tokio::test]
    async fn ids_are_never_reused() {
        let (store, sheets) = seeded_store(1);
        let sheet = &sheets[0];
        let mut seen = HashSet::new();
        for _ in 0..20 {
            let task = store.create(input_for(sheet, sheet.start_date, 1)).await.expect("create");
            assert!(seen.insert(task.id.clone()));
            store.delete(&task.id).await.expect("delete");
        }
    }

    #[tokio::test]
    async fn writes_to_one_timesheet_are_serialized() {
        let (store, sheets) = seeded_store_with(1, |repo| repo.with_write_delay(20));
        let sheet = &sheets[0];

        let (first, second) = tokio::join!(
            store.create(input_for(sheet, sheet.start_date, 5)),
            store.create(input_for(sheet, sheet.end_date, 7)),
        );
        first.expect("first create");
        second.expect("second create");

        assert_eq!(store.repository().max_in_flight.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(store.timesheets().get(&sheet.id).expect("sheet").total_hours, 12);
    }

    #[tokio::test]
    async fn mutations_publish_change_events() {
        let (store, sheets) = seeded_store(1);
        let sheet = &sheets[0];
        store.list_by_timesheet(&sheet.id).await.expect("load");

        let mut subscription = store.subscribe();
        store.create(input_for(sheet, sheet.start_date, 4)).await.expect("create");
        let events = subscription.drain();
        assert!(events.contains(&StoreEvent::TasksChanged {
            timesheet_id: sheet.id.clone()
        }));
        assert!(events.contains(&StoreEvent::TimesheetChanged {
            timesheet_id: sheet.id.clone()
        }));
    }
}

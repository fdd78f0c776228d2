//! Tasks of the selected timesheet, grouped by day, with weekly progress.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::domain::{FULL_WEEK_HOURS, Task, Timesheet};
use crate::error::{AppError, AppResult};
use crate::events::{StoreEvent, Subscription};
use crate::form::{FormRequest, TaskForm};
use crate::repository::TaskRepository;
use crate::session::Context;
use crate::tasks::TaskStore;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub total_hours: u32,
    pub percentage: f64,
}

impl Progress {
    pub fn for_hours(total_hours: u32) -> Self {
        let percentage = (f64::from(total_hours) * 100.0 / f64::from(FULL_WEEK_HOURS)).min(100.0);
        Self {
            total_hours,
            percentage,
        }
    }

    pub fn label(&self) -> String {
        format!("{}/{} hrs", self.total_hours, FULL_WEEK_HOURS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailIntent {
    Add { date: Option<NaiveDate> },
    Edit(Task),
    Delete { task_id: String },
}

/// Where an intent went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    FormOpened,
    /// Delete needs [`DetailView::confirm_delete`] before anything changes.
    AwaitingConfirmation { task_id: String },
    NoSelection,
}

/// Every day of `timesheet`'s range, with the tasks logged on it. Days with
/// no tasks are present and empty.
pub fn group_by_date(timesheet: &Timesheet, tasks: &[Task]) -> BTreeMap<NaiveDate, Vec<Task>> {
    let mut groups = timesheet
        .days()
        .into_iter()
        .map(|day| (day, Vec::new()))
        .collect::<BTreeMap<_, _>>();
    for task in tasks {
        groups.entry(task.date).or_default().push(task.clone());
    }
    groups
}

pub struct DetailView<R> {
    store: Arc<TaskStore<R>>,
    subscription: Subscription,
    today: NaiveDate,
    timesheet: Option<Timesheet>,
    tasks: Vec<Task>,
    pending_delete: Option<String>,
}

impl<R: TaskRepository> DetailView<R> {
    pub fn new(ctx: &Context, store: Arc<TaskStore<R>>, subscription: Subscription) -> Self {
        Self {
            store,
            subscription,
            today: ctx.today(),
            timesheet: None,
            tasks: Vec::new(),
            pending_delete: None,
        }
    }

    pub fn timesheet(&self) -> Option<&Timesheet> {
        self.timesheet.as_ref()
    }

    #[cfg(test)]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// `None` shows the empty state.
    pub async fn select(&mut self, timesheet: Option<Timesheet>) -> AppResult<()> {
        self.pending_delete = None;
        self.timesheet = timesheet;
        self.tasks.clear();
        self.reload().await
    }

    pub async fn reload(&mut self) -> AppResult<()> {
        let Some(current) = &self.timesheet else {
            return Ok(());
        };
        let id = current.id.clone();
        self.tasks = self.store.list_by_timesheet(&id).await?;
        self.timesheet = Some(self.store.timesheets().get(&id)?);
        Ok(())
    }

    /// Re-pulls when the selected timesheet or its tasks changed.
    pub async fn sync(&mut self) -> AppResult<bool> {
        let selected = self.timesheet.as_ref().map(|timesheet| timesheet.id.clone());
        let relevant = self.subscription.drain().into_iter().any(|event| match event {
            StoreEvent::TimesheetsLoaded => true,
            StoreEvent::TimesheetChanged { timesheet_id } | StoreEvent::TasksChanged { timesheet_id } => {
                selected.as_deref() == Some(timesheet_id.as_str())
            }
        });
        if relevant && selected.is_some() {
            self.reload().await?;
            return Ok(true);
        }
        Ok(false)
    }

    pub fn groups(&self) -> BTreeMap<NaiveDate, Vec<Task>> {
        match &self.timesheet {
            Some(timesheet) => group_by_date(timesheet, &self.tasks),
            None => BTreeMap::new(),
        }
    }

    pub fn progress(&self) -> Progress {
        Progress::for_hours(self.tasks.iter().map(|task| u32::from(task.hours)).sum())
    }

    pub fn route(&mut self, intent: DetailIntent, form: &mut TaskForm<R>) -> Routed {
        let Some(timesheet) = &self.timesheet else {
            return Routed::NoSelection;
        };

        match intent {
            DetailIntent::Add { date } => {
                // Today when it falls in the selected week, else its first day.
                let fallback = if timesheet.contains(self.today) {
                    self.today
                } else {
                    timesheet.start_date
                };
                form.open(FormRequest::Create {
                    timesheet_id: timesheet.id.clone(),
                    date: Some(date.unwrap_or(fallback)),
                });
                Routed::FormOpened
            }
            DetailIntent::Edit(task) => {
                form.open(FormRequest::Edit(task));
                Routed::FormOpened
            }
            DetailIntent::Delete { task_id } => {
                self.pending_delete = Some(task_id.clone());
                Routed::AwaitingConfirmation { task_id }
            }
        }
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    pub async fn confirm_delete(&mut self) -> AppResult<()> {
        let Some(task_id) = self.pending_delete.take() else {
            return Ok(());
        };
        match self.store.delete(&task_id).await {
            Ok(()) => self.reload().await,
            Err(err @ AppError::NotFound { .. }) => {
                tracing::info!(task_id = %task_id, "Task already gone, refreshing");
                self.reload().await?;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{NaiveDate, TimeZone, Utc};

    use super::{DetailIntent, DetailView, Progress, Routed, group_by_date};
    use crate::domain::{Task, Timesheet, TimesheetStatus};
    use crate::form::{SubmitOutcome, TaskForm};
    use crate::session::tests::context;
    use crate::tasks::tests::{seeded_store, today};
    use crate::validation::TaskField;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, day).expect("valid date")
    }

    fn task(id: &str, day: u32) -> Task {
        Task {
            id: id.to_string(),
            date: date(day),
            project_name: "Mobile App".to_string(),
            type_of_work: "Testing".to_string(),
            description: "Regression pass on login".to_string(),
            hours: 2,
            timesheet_id: "w".to_string(),
        }
    }

    #[test]
    fn every_day_of_the_week_is_present() {
        let now = Utc.with_ymd_and_hms(2025, 9, 21, 9, 0, 0).unwrap();
        let week = Timesheet {
            id: "w".to_string(),
            week_number: 39,
            start_date: date(21),
            end_date: date(25),
            status: TimesheetStatus::Incomplete,
            total_hours: 4,
            created_at: now,
            updated_at: now,
        };

        let groups = group_by_date(&week, &[task("a", 21), task("b", 23)]);
        assert_eq!(groups.len(), 5);
        assert_eq!(groups[&date(21)].len(), 1);
        assert_eq!(groups[&date(23)][0].id, "b");
        for empty in [22, 24, 25] {
            assert!(groups[&date(empty)].is_empty());
        }
    }

    #[test]
    fn progress_caps_at_full() {
        assert_eq!(Progress::for_hours(0).percentage, 0.0);
        assert_eq!(Progress::for_hours(10).percentage, 25.0);
        assert_eq!(Progress::for_hours(52).percentage, 100.0);
        assert_eq!(Progress::for_hours(8).label(), "8/40 hrs");
    }

    #[tokio::test]
    async fn nothing_selected_is_empty_state() {
        let (store, _) = seeded_store(1);
        let store = Arc::new(store);
        let mut form = TaskForm::new(&context(today(), 5), Arc::clone(&store));
        let mut view = DetailView::new(&context(today(), 5), Arc::clone(&store), store.subscribe());
        view.select(None).await.expect("empty");

        assert!(view.groups().is_empty());
        assert_eq!(view.progress().total_hours, 0);
        assert_eq!(
            view.route(DetailIntent::Add { date: None }, &mut form),
            Routed::NoSelection
        );
        assert!(!form.is_open());
    }

    #[tokio::test]
    async fn add_edit_delete_updates_progress() {
        let (store, sheets) = seeded_store(1);
        let store = Arc::new(store);
        let sheet = sheets[0].clone();
        let mut form = TaskForm::new(&context(today(), 5), Arc::clone(&store));
        let mut view = DetailView::new(&context(today(), 5), Arc::clone(&store), store.subscribe());

        view.select(Some(sheet.clone())).await.expect("select");
        assert_eq!(view.progress(), Progress::for_hours(0));
        assert_eq!(view.progress().percentage, 0.0);

        let routed = view.route(DetailIntent::Add { date: Some(sheet.start_date) }, &mut form);
        assert_eq!(routed, Routed::FormOpened);
        form.edit(TaskField::Description, |draft| {
            draft.description = "Implement search filters".to_string()
        });
        let created = match form.submit().await {
            SubmitOutcome::Saved(task) => task,
            other => panic!("unexpected outcome: {other:?}"),
        };
        assert!(view.sync().await.expect("sync"));
        assert_eq!(view.progress().label(), "4/40 hrs");
        assert_eq!(view.progress().percentage, 10.0);

        view.route(DetailIntent::Edit(created.clone()), &mut form);
        for _ in 0..4 {
            form.increment_hours();
        }
        assert!(matches!(form.submit().await, SubmitOutcome::Saved(_)));
        view.sync().await.expect("sync");
        assert_eq!(view.progress().label(), "8/40 hrs");
        assert_eq!(view.progress().percentage, 20.0);
        assert_eq!(view.timesheet().expect("selected").total_hours, 8);

        let routed = view.route(
            DetailIntent::Delete {
                task_id: created.id.clone(),
            },
            &mut form,
        );
        assert_eq!(
            routed,
            Routed::AwaitingConfirmation {
                task_id: created.id.clone()
            }
        );
        assert_eq!(view.tasks().len(), 1);
        view.confirm_delete().await.expect("delete");
        assert_eq!(view.progress().label(), "0/40 hrs");
        assert!(view.tasks().is_empty());
    }

    #[tokio::test]
    async fn add_defaults_to_today_inside_current_week() {
        let (store, sheets) = seeded_store(2);
        let store = Arc::new(store);
        let mut form = TaskForm::new(&context(today(), 5), Arc::clone(&store));
        let mut view = DetailView::new(&context(today(), 5), Arc::clone(&store), store.subscribe());

        view.select(Some(sheets[1].clone())).await.expect("select");
        view.route(DetailIntent::Add { date: None }, &mut form);
        assert_eq!(form.current().expect("open").draft.date, Some(today()));

        form.cancel();
        view.select(Some(sheets[0].clone())).await.expect("select");
        view.route(DetailIntent::Add { date: None }, &mut form);
        assert_eq!(form.current().expect("open").draft.date, Some(sheets[0].start_date));

        form.cancel();
        view.route(DetailIntent::Add { date: Some(sheets[0].end_date) }, &mut form);
        assert_eq!(form.current().expect("open").draft.date, Some(sheets[0].end_date));
    }

    #[tokio::test]
    async fn cancelled_delete_keeps_task() {
        let (store, sheets) = seeded_store(1);
        let store = Arc::new(store);
        let sheet = sheets[0].clone();
        let task = store
            .create(crate::tasks::tests::input_for(&sheet, sheet.start_date, 5))
            .await
            .expect("create");
        let mut form = TaskForm::new(&context(today(), 5), Arc::clone(&store));
        let mut view = DetailView::new(&context(today(), 5), Arc::clone(&store), store.subscribe());
        view.select(Some(sheet)).await.expect("select");

        view.route(DetailIntent::Delete { task_id: task.id }, &mut form);
        view.cancel_delete();
        view.confirm_delete().await.expect("nothing pending");
        assert_eq!(view.tasks().len(), 1);
    }
}

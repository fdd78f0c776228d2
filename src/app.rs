//! Dashboard state shared by the terminal UI: which view is showing, the
//! three controllers, background timesheet fetches and the notice line.

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::detail::{DetailIntent, DetailView, Routed};
use crate::domain::Timesheet;
use crate::error::{AppError, AppResult};
use crate::filter::TimesheetFilter;
use crate::form::{SubmitOutcome, TaskForm};
use crate::repository::TaskRepository;
use crate::session::Context;
use crate::table::{FetchTicket, TableView, ViewMode};
use crate::tasks::TaskStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
}

/// One dismissible line under the current view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

type FetchResult = (FetchTicket, AppResult<Vec<Timesheet>>);

pub struct Dashboard<R> {
    ctx: Context,
    store: Arc<TaskStore<R>>,
    table: TableView,
    detail: DetailView<R>,
    form: TaskForm<R>,
    mode: ViewMode,
    notice: Option<Notice>,
    fetch_tx: UnboundedSender<FetchResult>,
    fetch_rx: UnboundedReceiver<FetchResult>,
}

impl<R: TaskRepository> Dashboard<R> {
    pub fn new(ctx: Context, store: Arc<TaskStore<R>>) -> Self {
        let table = TableView::new(&ctx, store.timesheets().clone(), store.subscribe());
        let detail = DetailView::new(&ctx, Arc::clone(&store), store.subscribe());
        let form = TaskForm::new(&ctx, Arc::clone(&store));
        let (fetch_tx, fetch_rx) = mpsc::unbounded_channel();
        Self {
            ctx,
            store,
            table,
            detail,
            form,
            mode: ViewMode::Table,
            notice: None,
            fetch_tx,
            fetch_rx,
        }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn table(&self) -> &TableView {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut TableView {
        &mut self.table
    }

    pub fn detail(&self) -> &DetailView<R> {
        &self.detail
    }

    pub fn form(&self) -> &TaskForm<R> {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut TaskForm<R> {
        &mut self.form
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
        self.form.dismiss_failure();
    }

    pub fn backend(&self) -> String {
        self.store.repository().describe()
    }

    /// Loads every timesheet before the first frame.
    pub async fn hydrate(&mut self) -> AppResult<()> {
        let rows = self
            .store
            .repository()
            .fetch_timesheets(&TimesheetFilter::default(), self.ctx.today())
            .await?;
        tracing::info!(count = rows.len(), backend = %self.backend(), "Timesheets hydrated");
        self.store.timesheets().replace_all(rows);
        self.table.reload();
        Ok(())
    }

    pub fn apply_filter(&mut self, filter: TimesheetFilter) {
        let ticket = self.table.apply_filter(filter);
        self.spawn_fetch(ticket);
    }

    /// Drops cached tasks and refetches the current filter in the
    /// background.
    pub fn refresh(&mut self) {
        self.store.invalidate_all();
        let ticket = self.table.begin_fetch();
        self.spawn_fetch(ticket);
        self.info("Refreshing timesheets");
    }

    fn spawn_fetch(&self, ticket: FetchTicket) {
        let repo = Arc::clone(self.store.repository());
        let tx = self.fetch_tx.clone();
        let today = self.ctx.today();
        tokio::spawn(async move {
            let result = repo.fetch_timesheets(&ticket.filter, today).await;
            // Receiver gone means the dashboard closed.
            let _ = tx.send((ticket, result));
        });
    }

    /// Applies finished fetches and lets both views re-pull after store
    /// events. Call once per frame.
    pub async fn tick(&mut self) {
        while let Ok((ticket, result)) = self.fetch_rx.try_recv() {
            if let Err(err) = self.table.complete_fetch(ticket, result) {
                self.report(err);
            }
        }

        self.table.sync();
        if let Err(err) = self.detail.sync().await {
            self.report(err);
        }
    }

    pub async fn open_selected(&mut self) {
        let Some(id) = self.table.selected_row().map(|row| row.id.clone()) else {
            return;
        };
        let result = match self.table.select_timesheet(&id) {
            Ok(selection) => {
                self.mode = selection.switch_to;
                self.detail.select(Some(selection.timesheet)).await
            }
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            self.mode = ViewMode::Table;
            self.report(err);
        }
    }

    pub async fn back_to_table(&mut self) {
        self.mode = ViewMode::Table;
        if let Err(err) = self.detail.select(None).await {
            self.report(err);
        }
    }

    pub fn route(&mut self, intent: DetailIntent) -> Routed {
        let routed = self.detail.route(intent, &mut self.form);
        if routed == Routed::NoSelection {
            self.info("Select a timesheet first");
        }
        routed
    }

    pub fn cancel_delete(&mut self) {
        self.detail.cancel_delete();
    }

    pub async fn confirm_delete(&mut self) {
        match self.detail.confirm_delete().await {
            Ok(()) => self.info("Task deleted"),
            Err(err) => self.report(err),
        }
    }

    pub async fn submit_form(&mut self) -> SubmitOutcome {
        let outcome = self.form.submit().await;
        match &outcome {
            SubmitOutcome::Saved(task) => {
                self.info(format!("Saved {} ({} hrs)", task.short_description(), task.hours));
                if let Err(err) = self.detail.reload().await {
                    self.report(err);
                }
            }
            SubmitOutcome::Failed(message) => {
                self.notice = Some(Notice {
                    kind: NoticeKind::Error,
                    message: message.clone(),
                });
            }
            SubmitOutcome::Invalid | SubmitOutcome::Ignored => {}
        }
        outcome
    }

    fn info(&mut self, message: impl Into<String>) {
        self.notice = Some(Notice {
            kind: NoticeKind::Info,
            message: message.into(),
        });
    }

    fn report(&mut self, err: AppError) {
        if err.is_recoverable() {
            tracing::warn!(error = %err, "Dashboard action failed");
        } else {
            tracing::error!(error = %err, "Dashboard action failed");
        }
        let message = match &err {
            AppError::NotFound { entity, .. } => format!("That {entity} no longer exists; the view was refreshed"),
            _ => err.to_string(),
        };
        self.notice = Some(Notice {
            kind: NoticeKind::Error,
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::{Dashboard, NoticeKind};
    use crate::detail::{DetailIntent, Routed};
    use crate::domain::TimesheetStatus;
    use crate::filter::{StatusFilter, TimesheetFilter};
    use crate::form::SubmitOutcome;
    use crate::session::tests::context;
    use crate::table::ViewMode;
    use crate::tasks::tests::{MemoryRepository, seeded_store, today};
    use crate::validation::TaskField;

    async fn settle(dashboard: &mut Dashboard<MemoryRepository>) {
        for _ in 0..100 {
            dashboard.tick().await;
            if !dashboard.table().is_loading() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("fetch never settled");
    }

    #[tokio::test]
    async fn latest_filter_wins() {
        let (store, _) = seeded_store(6);
        let mut dashboard = Dashboard::new(context(today(), 5), Arc::new(store));
        dashboard.hydrate().await.expect("hydrate");
        assert_eq!(dashboard.table().total(), 6);

        dashboard.apply_filter(TimesheetFilter {
            date_range: None,
            status: StatusFilter::Only(TimesheetStatus::Incomplete),
        });
        dashboard.apply_filter(TimesheetFilter {
            date_range: None,
            status: StatusFilter::Only(TimesheetStatus::Missing),
        });
        settle(&mut dashboard).await;

        assert_eq!(
            dashboard.table().filter().status,
            StatusFilter::Only(TimesheetStatus::Missing)
        );
        assert_eq!(dashboard.table().total(), 5);
        assert!(
            dashboard
                .table()
                .page_rows()
                .iter()
                .all(|row| row.status == TimesheetStatus::Missing)
        );
    }

    #[tokio::test]
    async fn full_flow_from_table_to_saved_task() {
        let (store, sheets) = seeded_store(3);
        let mut dashboard = Dashboard::new(context(today(), 5), Arc::new(store));
        dashboard.hydrate().await.expect("hydrate");

        dashboard.table_mut().move_cursor(2);
        dashboard.open_selected().await;
        assert_eq!(dashboard.mode(), ViewMode::Detail);
        assert_eq!(dashboard.detail().timesheet().map(|sheet| sheet.id.clone()), Some(sheets[2].id.clone()));

        assert_eq!(dashboard.route(DetailIntent::Add { date: None }), Routed::FormOpened);
        dashboard.form_mut().edit(TaskField::Description, |draft| {
            draft.description = "Draft release notes".to_string()
        });
        let outcome = dashboard.submit_form().await;
        assert!(matches!(outcome, SubmitOutcome::Saved(_)));
        dashboard.tick().await;

        assert_eq!(dashboard.detail().progress().total_hours, 4);
        assert_eq!(dashboard.notice().map(|notice| notice.kind), Some(NoticeKind::Info));
        let row = dashboard
            .table()
            .page_rows()
            .iter()
            .find(|row| row.id == sheets[2].id)
            .cloned()
            .expect("row");
        assert_eq!(row.total_hours, 4);

        dashboard.back_to_table().await;
        assert_eq!(dashboard.mode(), ViewMode::Table);
        assert!(dashboard.detail().timesheet().is_none());
    }

    #[tokio::test]
    async fn failed_save_surfaces_notice() {
        let (store, _) = seeded_store(1);
        let store = Arc::new(store);
        let mut dashboard = Dashboard::new(context(today(), 5), Arc::clone(&store));
        dashboard.hydrate().await.expect("hydrate");
        dashboard.open_selected().await;
        dashboard.route(DetailIntent::Add { date: None });
        dashboard.form_mut().edit(TaskField::Description, |draft| {
            draft.description = "Sprint planning meeting".to_string()
        });

        store.repository().fail_writes(true);
        assert!(matches!(dashboard.submit_form().await, SubmitOutcome::Failed(_)));
        assert_eq!(dashboard.notice().map(|notice| notice.kind), Some(NoticeKind::Error));
        assert!(dashboard.form().is_open());

        dashboard.dismiss_notice();
        assert!(dashboard.notice().is_none());
        assert!(dashboard.form().current().expect("open").failure.is_none());
    }
}

//! Filterable, paginated projection of the timesheet store.

use chrono::NaiveDate;

use crate::config::PAGE_SIZES;
use crate::domain::{Timesheet, TimesheetStatus};
use crate::error::AppResult;
use crate::events::{StoreEvent, Subscription};
use crate::filter::TimesheetFilter;
use crate::session::Context;
use crate::timesheets::TimesheetStore;

/// Presentation-only label; every status routes to the same selection.
pub fn action_label(status: TimesheetStatus) -> &'static str {
    match status {
        TimesheetStatus::Incomplete => "Update",
        TimesheetStatus::Missing => "Create",
        TimesheetStatus::Completed => "View",
    }
}

/// Identifies one fetch issued for a filter. Only the most recent ticket is
/// honoured when results come back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
    pub filter: TimesheetFilter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Table,
    Detail,
}

/// What the table hands to the detail view when a row is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub timesheet: Timesheet,
    pub switch_to: ViewMode,
}

pub struct TableView {
    store: TimesheetStore,
    subscription: Subscription,
    today: NaiveDate,
    filter: TimesheetFilter,
    rows: Vec<Timesheet>,
    current_page: usize,
    page_size: usize,
    cursor: usize,
    generation: u64,
    loading: bool,
}

impl TableView {
    pub fn new(ctx: &Context, store: TimesheetStore, subscription: Subscription) -> Self {
        let mut view = Self {
            store,
            subscription,
            today: ctx.today(),
            filter: TimesheetFilter::default(),
            rows: Vec::new(),
            current_page: 1,
            page_size: ctx.page_size(),
            cursor: 0,
            generation: 0,
            loading: false,
        };
        view.reload();
        view
    }

    pub fn filter(&self) -> TimesheetFilter {
        self.filter
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Rows matching the current filter across all pages.
    pub fn total(&self) -> usize {
        self.rows.len()
    }

    pub fn total_pages(&self) -> usize {
        self.rows.len().div_ceil(self.page_size).max(1)
    }

    /// Replaces the filter, goes back to page 1 and supersedes any fetch
    /// still in flight.
    pub fn apply_filter(&mut self, filter: TimesheetFilter) -> FetchTicket {
        self.filter = filter;
        self.current_page = 1;
        self.cursor = 0;
        self.reload();
        self.begin_fetch()
    }

    /// Ticket for a refetch of the current filter.
    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.generation += 1;
        self.loading = true;
        FetchTicket {
            generation: self.generation,
            filter: self.filter,
        }
    }

    /// Merges fetched rows into the store unless a newer fetch has been
    /// issued since `ticket`. Returns whether the rows were applied.
    pub fn complete_fetch(&mut self, ticket: FetchTicket, result: AppResult<Vec<Timesheet>>) -> AppResult<bool> {
        if ticket.generation != self.generation {
            tracing::debug!(
                ticket = ticket.generation,
                current = self.generation,
                filter = %ticket.filter.describe(),
                "Discarding stale timesheet fetch"
            );
            return Ok(false);
        }

        self.loading = false;
        let rows = result?;
        self.store.merge(rows);
        self.reload();
        Ok(true)
    }

    /// Re-pulls rows if the store changed since the last call.
    pub fn sync(&mut self) -> bool {
        let relevant = self.subscription.drain().into_iter().any(|event| {
            matches!(
                event,
                StoreEvent::TimesheetsLoaded | StoreEvent::TimesheetChanged { .. }
            )
        });
        if relevant {
            self.reload();
        }
        relevant
    }

    pub fn reload(&mut self) {
        self.rows = self.store.list(&self.filter, self.today);
        self.current_page = self.current_page.clamp(1, self.total_pages());
        self.cursor = self.cursor.min(self.page_rows().len().saturating_sub(1));
    }

    pub fn page_rows(&self) -> &[Timesheet] {
        let start = (self.current_page - 1) * self.page_size;
        let end = (start + self.page_size).min(self.rows.len());
        self.rows.get(start..end).unwrap_or(&[])
    }

    /// Clamps `page` into `[1, total_pages]` and returns the page shown.
    pub fn select_page(&mut self, page: usize) -> usize {
        self.current_page = page.clamp(1, self.total_pages());
        self.cursor = 0;
        self.current_page
    }

    pub fn next_page(&mut self) -> usize {
        self.select_page(self.current_page + 1)
    }

    pub fn prev_page(&mut self) -> usize {
        self.select_page(self.current_page.saturating_sub(1))
    }

    pub fn cycle_page_size(&mut self) -> usize {
        let index = PAGE_SIZES
            .iter()
            .position(|size| *size == self.page_size)
            .map_or(0, |index| (index + 1) % PAGE_SIZES.len());
        self.page_size = PAGE_SIZES[index];
        self.select_page(1);
        self.page_size
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn move_cursor(&mut self, delta: isize) {
        let len = self.page_rows().len();
        if len == 0 {
            self.cursor = 0;
            return;
        }
        self.cursor = self.cursor.saturating_add_signed(delta).min(len - 1);
    }

    pub fn selected_row(&self) -> Option<&Timesheet> {
        self.page_rows().get(self.cursor)
    }

    /// Emits the chosen timesheet and asks for the detail view.
    pub fn select_timesheet(&self, id: &str) -> AppResult<Selection> {
        let timesheet = self.store.get(id)?;
        tracing::debug!(timesheet_id = %id, week = timesheet.week_number, "Timesheet selected");
        Ok(Selection {
            timesheet,
            switch_to: ViewMode::Detail,
        })
    }
}

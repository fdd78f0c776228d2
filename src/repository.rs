//! Persistence capability behind the stores.
//!
//! The task store and the dashboard only ever see this trait; the local
//! data file and the REST API are interchangeable implementations with the
//! same error kinds.

use std::future::Future;

use chrono::NaiveDate;

use crate::domain::{Task, Timesheet};
use crate::error::AppResult;
use crate::filter::TimesheetFilter;

pub trait TaskRepository: Send + Sync + 'static {
    /// Timesheets matching `filter`, with aggregates consistent with the
    /// backend's task set.
    fn fetch_timesheets(
        &self,
        filter: &TimesheetFilter,
        today: NaiveDate,
    ) -> impl Future<Output = AppResult<Vec<Timesheet>>> + Send;

    /// Tasks of one timesheet in creation order.
    fn fetch_tasks(&self, timesheet_id: &str) -> impl Future<Output = AppResult<Vec<Task>>> + Send;

    fn insert_task(&self, task: &Task) -> impl Future<Output = AppResult<Task>> + Send;

    fn update_task(&self, task: &Task) -> impl Future<Output = AppResult<Task>> + Send;

    fn delete_task(&self, id: &str) -> impl Future<Output = AppResult<()>> + Send;

    /// Human-readable location, for status lines and logs.
    fn describe(&self) -> String;
}

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;

use crate::domain::{Task, Timesheet};
use crate::error::{AppError, AppResult};
use crate::filter::TimesheetFilter;
use crate::repository::TaskRepository;
use crate::storage::{DataFile, load_data, save_data};

/// Durable-local backend: the whole data file is held in memory and
/// rewritten on every mutation before the call returns.
#[derive(Debug)]
pub struct LocalRepository {
    path: PathBuf,
    data: Mutex<DataFile>,
}

impl LocalRepository {
    pub fn open(path: &Path) -> AppResult<Self> {
        let data = load_data(path)?;
        tracing::info!(
            path = %path.display(),
            timesheets = data.header.timesheets.len(),
            tasks = data.tasks.len(),
            "Local data file loaded"
        );
        Ok(Self {
            path: path.to_path_buf(),
            data: Mutex::new(data),
        })
    }

    /// Applies `change` to a copy and only swaps it in once it is on disk.
    async fn commit<T>(&self, change: impl FnOnce(&mut DataFile) -> AppResult<T>) -> AppResult<T> {
        let mut data = self.data.lock().await;
        let mut next = data.clone();
        let value = change(&mut next)?;
        if let Err(err) = save_data(&self.path, &next) {
            tracing::warn!(path = %self.path.display(), error = %err, "Saving data file failed");
            return Err(err.into());
        }
        *data = next;
        Ok(value)
    }
}

impl TaskRepository for LocalRepository {
    async fn fetch_timesheets(&self, filter: &TimesheetFilter, today: NaiveDate) -> AppResult<Vec<Timesheet>> {
        let data = self.data.lock().await;
        let now = Utc::now();
        let timesheets = data
            .header
            .timesheets
            .iter()
            .map(|timesheet| {
                let tasks = data.tasks_for(&timesheet.id).cloned().collect::<Vec<_>>();
                let mut timesheet = timesheet.clone();
                timesheet.apply_aggregate(&tasks, today, now);
                timesheet
            })
            .filter(|timesheet| filter.matches(timesheet, today))
            .collect();
        Ok(timesheets)
    }

    async fn fetch_tasks(&self, timesheet_id: &str) -> AppResult<Vec<Task>> {
        let data = self.data.lock().await;
        if !data.header.timesheets.iter().any(|timesheet| timesheet.id == timesheet_id) {
            return Err(AppError::not_found("timesheet", timesheet_id));
        }
        Ok(data.tasks_for(timesheet_id).cloned().collect())
    }

    async fn insert_task(&self, task: &Task) -> AppResult<Task> {
        self.commit(|data| {
            if data.tasks.iter().any(|existing| existing.id == task.id) {
                return Err(AppError::Persistence(format!("duplicate task id {}", task.id)));
            }
            data.tasks.push(task.clone());
            Ok(task.clone())
        })
        .await
    }

    async fn update_task(&self, task: &Task) -> AppResult<Task> {
        self.commit(|data| {
            let existing = data
                .tasks
                .iter_mut()
                .find(|existing| existing.id == task.id)
                .ok_or_else(|| AppError::not_found("task", task.id.clone()))?;
            *existing = task.clone();
            Ok(task.clone())
        })
        .await
    }

    async fn delete_task(&self, id: &str) -> AppResult<()> {
        self.commit(|data| {
            let before = data.tasks.len();
            data.tasks.retain(|task| task.id != id);
            if data.tasks.len() == before {
                return Err(AppError::not_found("task", id));
            }
            Ok(())
        })
        .await
    }

    fn describe(&self) -> String {
        format!("local file {}", self.path.display())
    }
}

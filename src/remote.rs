use std::time::Duration;

use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::domain::{Task, Timesheet};
use crate::error::{AppError, AppResult};
use crate::filter::TimesheetFilter;
use crate::repository::TaskRepository;

/// Envelope every endpoint answers with.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    /// `success=false` becomes a recoverable persistence error carrying the
    /// backend's message.
    pub fn into_result(self) -> AppResult<Option<T>> {
        if self.success {
            return Ok(self.data);
        }

        let message = self
            .error
            .or(self.message)
            .unwrap_or_else(|| "request rejected by backend".to_string());
        Err(AppError::Persistence(message))
    }

    pub fn into_data(self) -> AppResult<T> {
        self.into_result()?
            .ok_or_else(|| AppError::Persistence("backend response carried no data".to_string()))
    }
}

/// REST backend: `GET timesheets`, `GET tasks`, `POST/PUT/DELETE task`.
#[derive(Debug, Clone)]
pub struct RemoteRepository {
    client: Client,
    base_url: String,
}

impl RemoteRepository {
    pub fn new(base_url: &str, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(5)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, task_id: Option<&str>) -> AppResult<ApiResponse<T>> {
        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            if let Some(id) = task_id {
                return Err(AppError::not_found("task", id));
            }
        }

        match response.json::<ApiResponse<T>>().await {
            Ok(body) => Ok(body),
            Err(err) if !status.is_success() => {
                tracing::warn!(%status, error = %err, "Backend returned an unreadable error body");
                Err(AppError::Persistence(format!("backend returned {status}")))
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl TaskRepository for RemoteRepository {
    async fn fetch_timesheets(&self, filter: &TimesheetFilter, _today: NaiveDate) -> AppResult<Vec<Timesheet>> {
        let request = self.client.get(self.url("timesheets")).query(&filter.query_pairs());
        let timesheets: Vec<Timesheet> = self.send(request, None).await?.into_data()?;
        tracing::debug!(count = timesheets.len(), "Timesheets fetched from backend");
        Ok(timesheets)
    }

    async fn fetch_tasks(&self, timesheet_id: &str) -> AppResult<Vec<Task>> {
        let request = self
            .client
            .get(self.url("tasks"))
            .query(&[("timesheetId", timesheet_id)]);
        Ok(self.send(request, None).await?.into_result()?.unwrap_or_default())
    }

    async fn insert_task(&self, task: &Task) -> AppResult<Task> {
        let request = self.client.post(self.url("task")).json(task);
        let stored = self.send::<Task>(request, None).await?.into_result()?;
        Ok(stored.unwrap_or_else(|| task.clone()))
    }

    async fn update_task(&self, task: &Task) -> AppResult<Task> {
        let request = self.client.put(self.url("task")).json(task);
        let stored = self.send::<Task>(request, Some(&task.id)).await?.into_result()?;
        Ok(stored.unwrap_or_else(|| task.clone()))
    }

    async fn delete_task(&self, id: &str) -> AppResult<()> {
        let request = self.client.delete(self.url("task")).query(&[("id", id)]);
        self.send::<serde_json::Value>(request, Some(id))
            .await?
            .into_result()?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("remote API {}", self.base_url)
    }
}

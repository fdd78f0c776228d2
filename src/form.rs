//! Task entry form.
//!
//! `Closed -> Open -> Submitting -> Closed` on success, back to `Open` with
//! the draft intact on any failure, `Closed` on cancel.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::domain::{
    DEFAULT_TASK_HOURS, MAX_TASK_HOURS, MIN_TASK_HOURS, PROJECT_OPTIONS, Task, TaskInput, WORK_TYPE_OPTIONS,
};
use crate::error::AppError;
use crate::repository::TaskRepository;
use crate::session::Context;
use crate::tasks::TaskStore;
use crate::validation::{TaskField, ValidationErrors, validate_draft};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit { task_id: String },
}

/// How the form is opened: a day of a timesheet for new tasks, or an
/// existing task to edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormRequest {
    Create {
        timesheet_id: String,
        date: Option<NaiveDate>,
    },
    Edit(Task),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenForm {
    pub mode: FormMode,
    pub draft: TaskInput,
    pub errors: ValidationErrors,
    /// Last store failure, shown until dismissed or the next submit.
    pub failure: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormState {
    Closed,
    Open(OpenForm),
    Submitting(OpenForm),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Saved(Task),
    Invalid,
    Failed(String),
    /// Nothing to submit, or a submit is already running.
    Ignored,
}

pub struct TaskForm<R> {
    store: Arc<TaskStore<R>>,
    today: NaiveDate,
    state: FormState,
}

impl<R: TaskRepository> TaskForm<R> {
    pub fn new(ctx: &Context, store: Arc<TaskStore<R>>) -> Self {
        Self {
            store,
            today: ctx.today(),
            state: FormState::Closed,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &FormState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        !matches!(self.state, FormState::Closed)
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self.state, FormState::Submitting(_))
    }

    pub fn current(&self) -> Option<&OpenForm> {
        match &self.state {
            FormState::Open(form) | FormState::Submitting(form) => Some(form),
            FormState::Closed => None,
        }
    }

    pub fn open(&mut self, request: FormRequest) {
        let (mode, draft) = match request {
            FormRequest::Create { timesheet_id, date } => (
                FormMode::Create,
                TaskInput {
                    date: Some(date.unwrap_or(self.today)),
                    project_name: PROJECT_OPTIONS[0].to_string(),
                    type_of_work: WORK_TYPE_OPTIONS[0].to_string(),
                    description: String::new(),
                    hours: DEFAULT_TASK_HOURS,
                    timesheet_id,
                },
            ),
            FormRequest::Edit(task) => (
                FormMode::Edit {
                    task_id: task.id.clone(),
                },
                TaskInput::from_task(&task),
            ),
        };

        tracing::debug!(mode = ?mode, timesheet_id = %draft.timesheet_id, "Task form opened");
        self.state = FormState::Open(OpenForm {
            mode,
            draft,
            errors: ValidationErrors::new(),
            failure: None,
        });
    }

    pub fn cancel(&mut self) {
        if matches!(self.state, FormState::Open(_)) {
            self.state = FormState::Closed;
        }
    }

    /// Applies `change` to the draft and clears the edited field's error.
    pub fn edit(&mut self, field: TaskField, change: impl FnOnce(&mut TaskInput)) {
        if let FormState::Open(form) = &mut self.state {
            change(&mut form.draft);
            form.errors.clear(field);
        }
    }

    pub fn increment_hours(&mut self) {
        self.edit(TaskField::Hours, |draft| {
            if draft.hours < MAX_TASK_HOURS {
                draft.hours = (draft.hours + 1).max(MIN_TASK_HOURS);
            }
        });
    }

    pub fn decrement_hours(&mut self) {
        self.edit(TaskField::Hours, |draft| {
            if draft.hours > MIN_TASK_HOURS {
                draft.hours = (draft.hours - 1).min(MAX_TASK_HOURS);
            }
        });
    }

    /// Moves the project or type of work to the next catalogue entry.
    pub fn cycle_option(&mut self, field: TaskField, delta: isize) {
        let options: &[&str] = match field {
            TaskField::ProjectName => &PROJECT_OPTIONS,
            TaskField::TypeOfWork => &WORK_TYPE_OPTIONS,
            _ => return,
        };
        self.edit(field, |draft| {
            let value = match field {
                TaskField::ProjectName => &mut draft.project_name,
                _ => &mut draft.type_of_work,
            };
            let current = options.iter().position(|option| *option == value.as_str()).unwrap_or(0);
            let next = (current as isize + delta).rem_euclid(options.len() as isize) as usize;
            *value = options[next].to_string();
        });
    }

    pub fn dismiss_failure(&mut self) {
        if let FormState::Open(form) = &mut self.state {
            form.failure = None;
        }
    }

    /// Runs the draft checks and records every violated field at once.
    pub fn validate(&mut self) -> bool {
        match &mut self.state {
            FormState::Open(form) => {
                form.errors = validate_draft(&form.draft);
                form.errors.is_empty()
            }
            _ => false,
        }
    }

    pub async fn submit(&mut self) -> SubmitOutcome {
        if !self.validate() {
            return match self.state {
                FormState::Open(_) => SubmitOutcome::Invalid,
                _ => SubmitOutcome::Ignored,
            };
        }

        let form = match std::mem::replace(&mut self.state, FormState::Closed) {
            FormState::Open(form) => form,
            other => {
                self.state = other;
                return SubmitOutcome::Ignored;
            }
        };
        self.state = FormState::Submitting(form.clone());

        let result = match &form.mode {
            FormMode::Create => self.store.create(form.draft.clone()).await,
            FormMode::Edit { task_id } => self.store.update(task_id, form.draft.clone()).await,
        };

        match result {
            Ok(task) => {
                tracing::info!(task_id = %task.id, mode = ?form.mode, "Task saved");
                self.state = FormState::Closed;
                SubmitOutcome::Saved(task)
            }
            Err(AppError::Validation(errors)) => {
                self.state = FormState::Open(OpenForm {
                    errors,
                    failure: None,
                    ..form
                });
                SubmitOutcome::Invalid
            }
            Err(err) => {
                tracing::warn!(error = %err, "Task save failed");
                let message = err.to_string();
                self.state = FormState::Open(OpenForm {
                    failure: Some(message.clone()),
                    ..form
                });
                SubmitOutcome::Failed(message)
            }
        }
    }
}

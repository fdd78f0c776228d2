//! Task field validation.
//!
//! All rules run on every call and every violated field is reported, so a
//! form can highlight everything that needs fixing at once.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use chrono::NaiveDate;

use crate::domain::{
    MAX_TASK_HOURS, MIN_DESCRIPTION_CHARS, MIN_TASK_HOURS, PROJECT_OPTIONS, Task, TaskInput, Timesheet,
    WORK_TYPE_OPTIONS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskField {
    Timesheet,
    Date,
    ProjectName,
    TypeOfWork,
    Description,
    Hours,
}

impl TaskField {
    pub fn label(self) -> &'static str {
        match self {
            TaskField::Timesheet => "timesheetId",
            TaskField::Date => "date",
            TaskField::ProjectName => "projectName",
            TaskField::TypeOfWork => "typeOfWork",
            TaskField::Description => "description",
            TaskField::Hours => "hours",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    fields: BTreeMap<TaskField, String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps the first message reported for a field.
    pub fn add(&mut self, field: TaskField, message: impl Into<String>) {
        self.fields.entry(field).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: TaskField) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    #[cfg(test)]
    pub fn contains(&self, field: TaskField) -> bool {
        self.fields.contains_key(&field)
    }

    pub fn clear(&mut self, field: TaskField) {
        self.fields.remove(&field);
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TaskField, &str)> {
        self.fields.iter().map(|(field, message)| (*field, message.as_str()))
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, message) in self.iter() {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {message}", field.label())?;
            first = false;
        }
        Ok(())
    }
}

/// A task request that satisfied every invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedTask {
    pub date: NaiveDate,
    pub project_name: String,
    pub type_of_work: String,
    pub description: String,
    pub hours: u8,
    pub timesheet_id: String,
}

impl ValidatedTask {
    pub fn into_task(self, id: String) -> Task {
        Task {
            id,
            date: self.date,
            project_name: self.project_name,
            type_of_work: self.type_of_work,
            description: self.description,
            hours: self.hours,
            timesheet_id: self.timesheet_id,
        }
    }
}

/// The checks the entry form runs before it submits anything.
pub fn validate_draft(input: &TaskInput) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    if input.project_name.trim().is_empty() {
        errors.add(TaskField::ProjectName, "Project name is required");
    }

    if input.type_of_work.trim().is_empty() {
        errors.add(TaskField::TypeOfWork, "Type of work is required");
    }

    let description = input.description.trim();
    if description.is_empty() {
        errors.add(TaskField::Description, "Task description is required");
    } else if description.chars().filter(|c| !c.is_whitespace()).count() < MIN_DESCRIPTION_CHARS {
        errors.add(
            TaskField::Description,
            format!("Description must have at least {MIN_DESCRIPTION_CHARS} non-space characters"),
        );
    }

    if input.hours < MIN_TASK_HOURS {
        errors.add(TaskField::Hours, "Hours must be greater than 0");
    } else if input.hours > MAX_TASK_HOURS {
        errors.add(
            TaskField::Hours,
            format!("Hours cannot exceed {MAX_TASK_HOURS} per task"),
        );
    }

    if input.date.is_none() {
        errors.add(TaskField::Date, "Date is required");
    }

    errors
}

/// Full invariant check used by the task store: the form rules, option
/// catalogue membership and the owning week's date range.
pub fn validate_task(input: &TaskInput, timesheet: Option<&Timesheet>) -> Result<ValidatedTask, ValidationErrors> {
    let mut errors = validate_draft(input);

    let project_name = input.project_name.trim();
    if !project_name.is_empty() && !PROJECT_OPTIONS.contains(&project_name) {
        errors.add(TaskField::ProjectName, format!("Unknown project: {project_name}"));
    }

    let type_of_work = input.type_of_work.trim();
    if !type_of_work.is_empty() && !WORK_TYPE_OPTIONS.contains(&type_of_work) {
        errors.add(TaskField::TypeOfWork, format!("Unknown type of work: {type_of_work}"));
    }

    match (timesheet, input.date) {
        (None, _) => errors.add(
            TaskField::Timesheet,
            format!("Timesheet not found: {}", input.timesheet_id),
        ),
        (Some(timesheet), Some(date)) if !timesheet.contains(date) => errors.add(
            TaskField::Date,
            format!("Date must fall within {}", timesheet.date_range()),
        ),
        _ => {}
    }

    let (Some(date), Ok(hours), Some(timesheet)) = (input.date, u8::try_from(input.hours), timesheet) else {
        return Err(errors);
    };
    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(ValidatedTask {
        date,
        project_name: project_name.to_string(),
        type_of_work: type_of_work.to_string(),
        description: input.description.trim().to_string(),
        hours,
        timesheet_id: timesheet.id.clone(),
    })
}

use std::fmt::{Display, Formatter};

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rand::{Rng, distributions::Alphanumeric, thread_rng};
use serde::{Deserialize, Serialize};

const ID_LEN: usize = 8;
const WORK_DAYS_PER_WEEK: i64 = 5;

pub const FULL_WEEK_HOURS: u32 = 40;
pub const MIN_TASK_HOURS: i32 = 1;
pub const MAX_TASK_HOURS: i32 = 12;
pub const DEFAULT_TASK_HOURS: i32 = 4;
pub const MIN_DESCRIPTION_CHARS: usize = 10;

pub const PROJECT_OPTIONS: [&str; 5] = [
    "Homepage Development",
    "Mobile App",
    "API Development",
    "Database Migration",
    "UI/UX Design",
];

pub const WORK_TYPE_OPTIONS: [&str; 6] = [
    "Bug fixes",
    "Feature Development",
    "Testing",
    "Documentation",
    "Code Review",
    "Meeting",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimesheetStatus {
    Completed,
    Incomplete,
    Missing,
}

impl TimesheetStatus {
    pub const ALL: [TimesheetStatus; 3] = [
        TimesheetStatus::Completed,
        TimesheetStatus::Incomplete,
        TimesheetStatus::Missing,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TimesheetStatus::Completed => "COMPLETED",
            TimesheetStatus::Incomplete => "INCOMPLETE",
            TimesheetStatus::Missing => "MISSING",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "COMPLETED" => Some(TimesheetStatus::Completed),
            "INCOMPLETE" => Some(TimesheetStatus::Incomplete),
            "MISSING" => Some(TimesheetStatus::Missing),
            _ => None,
        }
    }
}

impl Display for TimesheetStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Weekly summary. Task detail lives in the task store; only the
/// aggregate `total_hours`/`status` pair is kept here.
///
/// Serializes with the derived `dateRange` label alongside the stored
/// fields. Incoming `dateRange` and `tasks` keys are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", into = "TimesheetWire")]
pub struct Timesheet {
    pub id: String,
    pub week_number: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: TimesheetStatus,
    #[serde(default)]
    pub total_hours: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TimesheetWire {
    id: String,
    week_number: u32,
    start_date: NaiveDate,
    end_date: NaiveDate,
    date_range: String,
    status: TimesheetStatus,
    total_hours: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<Timesheet> for TimesheetWire {
    fn from(timesheet: Timesheet) -> Self {
        Self {
            date_range: timesheet.date_range(),
            id: timesheet.id,
            week_number: timesheet.week_number,
            start_date: timesheet.start_date,
            end_date: timesheet.end_date,
            status: timesheet.status,
            total_hours: timesheet.total_hours,
            created_at: timesheet.created_at,
            updated_at: timesheet.updated_at,
        }
    }
}

impl Timesheet {
    /// A Monday-to-Friday timesheet for the week containing `day`.
    pub fn for_week(week_number: u32, day: NaiveDate, today: NaiveDate, now: DateTime<Utc>) -> Self {
        let start_date = start_of_week(day);
        let end_date = start_date + Duration::days(WORK_DAYS_PER_WEEK - 1);
        Self {
            id: generate_id(),
            week_number,
            start_date,
            end_date,
            status: status_for(0, end_date, today),
            total_hours: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    pub fn days(&self) -> Vec<NaiveDate> {
        let mut days = Vec::new();
        let mut day = self.start_date;
        while day <= self.end_date {
            days.push(day);
            day = day.succ_opt().expect("next day should exist");
        }
        days
    }

    pub fn overlaps(&self, from: NaiveDate, to: NaiveDate) -> bool {
        self.start_date <= to && from <= self.end_date
    }

    pub fn date_range(&self) -> String {
        format_date_range(self.start_date, self.end_date)
    }

    /// Recomputes `total_hours` and `status` from the full task set of this
    /// week. Returns whether anything changed.
    pub fn apply_aggregate(&mut self, tasks: &[Task], today: NaiveDate, now: DateTime<Utc>) -> bool {
        let (total_hours, status) = aggregate(tasks, self.end_date, today);
        if total_hours == self.total_hours && status == self.status {
            return false;
        }

        self.total_hours = total_hours;
        self.status = status;
        self.updated_at = now;
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub date: NaiveDate,
    pub project_name: String,
    pub type_of_work: String,
    pub description: String,
    pub hours: u8,
    pub timesheet_id: String,
}

impl Task {
    pub fn short_description(&self) -> String {
        self.description
            .lines()
            .next()
            .unwrap_or("(no description)")
            .to_string()
    }
}

/// Raw create/update request, as collected by the form or the CLI.
/// Nothing here is trusted until it passes validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInput {
    pub date: Option<NaiveDate>,
    pub project_name: String,
    pub type_of_work: String,
    pub description: String,
    pub hours: i32,
    pub timesheet_id: String,
}

impl TaskInput {
    pub fn from_task(task: &Task) -> Self {
        Self {
            date: Some(task.date),
            project_name: task.project_name.clone(),
            type_of_work: task.type_of_work.clone(),
            description: task.description.clone(),
            hours: i32::from(task.hours),
            timesheet_id: task.timesheet_id.clone(),
        }
    }
}

pub fn aggregate(tasks: &[Task], end_date: NaiveDate, today: NaiveDate) -> (u32, TimesheetStatus) {
    let total_hours = tasks.iter().map(|task| u32::from(task.hours)).sum();
    (total_hours, status_for(total_hours, end_date, today))
}

/// Zero hours only counts as missing once the week is over; an open week
/// without entries is still incomplete.
pub fn status_for(total_hours: u32, end_date: NaiveDate, today: NaiveDate) -> TimesheetStatus {
    if total_hours >= FULL_WEEK_HOURS {
        TimesheetStatus::Completed
    } else if total_hours > 0 || end_date >= today {
        TimesheetStatus::Incomplete
    } else {
        TimesheetStatus::Missing
    }
}

/// Timesheets for the `weeks` most recent weeks, oldest first, the last one
/// covering `today`.
pub fn seed_timesheets(today: NaiveDate, weeks: u32, now: DateTime<Utc>) -> Vec<Timesheet> {
    let current_week = start_of_week(today);
    (0..weeks)
        .map(|index| {
            let weeks_back = i64::from(weeks - 1 - index);
            let week_start = current_week - Duration::weeks(weeks_back);
            Timesheet::for_week(index + 1, week_start, today, now)
        })
        .collect()
}

pub fn start_of_week(day: NaiveDate) -> NaiveDate {
    let days_from_monday = day.weekday().number_from_monday() as i64 - 1;
    day - Duration::days(days_from_monday)
}

pub fn first_day_of_month(day: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(day.year(), day.month(), 1).expect("first day of month must be valid")
}

pub fn last_day_of_month(day: NaiveDate) -> NaiveDate {
    let first_of_next = if day.month() == 12 {
        NaiveDate::from_ymd_opt(day.year() + 1, 1, 1).expect("next year date should be valid")
    } else {
        NaiveDate::from_ymd_opt(day.year(), day.month() + 1, 1).expect("next month date should be valid")
    };
    first_of_next - Duration::days(1)
}

pub fn format_date_range(start: NaiveDate, end: NaiveDate) -> String {
    if start.year() != end.year() {
        format!("{} - {}", start.format("%-d %B, %Y"), end.format("%-d %B, %Y"))
    } else if start.month() != end.month() {
        format!("{} - {}", start.format("%-d %B"), end.format("%-d %B, %Y"))
    } else {
        format!("{} - {}", start.format("%-d"), end.format("%-d %B, %Y"))
    }
}

pub fn format_hours(hours: u32) -> String {
    if hours == 1 {
        "1 hr".to_string()
    } else {
        format!("{hours} hrs")
    }
}

pub fn generate_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}

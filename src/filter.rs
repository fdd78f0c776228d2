use chrono::{Duration, NaiveDate};

use crate::domain::{Timesheet, TimesheetStatus, first_day_of_month, last_day_of_month, start_of_week};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(TimesheetStatus),
}

impl StatusFilter {
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.trim().eq_ignore_ascii_case("all") {
            return Some(StatusFilter::All);
        }
        TimesheetStatus::parse(raw).map(StatusFilter::Only)
    }

    pub fn matches(self, status: TimesheetStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(expected) => expected == status,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatusFilter::All => "ALL",
            StatusFilter::Only(status) => status.as_str(),
        }
    }

    pub fn next(self) -> Self {
        match self {
            StatusFilter::All => StatusFilter::Only(TimesheetStatus::Completed),
            StatusFilter::Only(TimesheetStatus::Completed) => StatusFilter::Only(TimesheetStatus::Incomplete),
            StatusFilter::Only(TimesheetStatus::Incomplete) => StatusFilter::Only(TimesheetStatus::Missing),
            StatusFilter::Only(TimesheetStatus::Missing) => StatusFilter::All,
        }
    }
}

/// Named date windows, resolved against the current day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRangePreset {
    ThisWeek,
    LastWeek,
    ThisMonth,
}

impl DateRangePreset {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "this-week" => Some(DateRangePreset::ThisWeek),
            "last-week" => Some(DateRangePreset::LastWeek),
            "this-month" => Some(DateRangePreset::ThisMonth),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DateRangePreset::ThisWeek => "this-week",
            DateRangePreset::LastWeek => "last-week",
            DateRangePreset::ThisMonth => "this-month",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DateRangePreset::ThisWeek => "This week",
            DateRangePreset::LastWeek => "Last week",
            DateRangePreset::ThisMonth => "This month",
        }
    }

    /// Inclusive bounds of the window.
    pub fn resolve(self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            DateRangePreset::ThisWeek => {
                let start = start_of_week(today);
                (start, start + Duration::days(6))
            }
            DateRangePreset::LastWeek => {
                let start = start_of_week(today) - Duration::weeks(1);
                (start, start + Duration::days(6))
            }
            DateRangePreset::ThisMonth => (first_day_of_month(today), last_day_of_month(today)),
        }
    }
}

/// Cycles "all dates" -> this week -> last week -> this month.
pub fn next_date_range(current: Option<DateRangePreset>) -> Option<DateRangePreset> {
    match current {
        None => Some(DateRangePreset::ThisWeek),
        Some(DateRangePreset::ThisWeek) => Some(DateRangePreset::LastWeek),
        Some(DateRangePreset::LastWeek) => Some(DateRangePreset::ThisMonth),
        Some(DateRangePreset::ThisMonth) => None,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimesheetFilter {
    pub date_range: Option<DateRangePreset>,
    pub status: StatusFilter,
}

impl TimesheetFilter {
    pub fn matches(&self, timesheet: &Timesheet, today: NaiveDate) -> bool {
        if !self.status.matches(timesheet.status) {
            return false;
        }

        match self.date_range {
            Some(preset) => {
                let (from, to) = preset.resolve(today);
                timesheet.overlaps(from, to)
            }
            None => true,
        }
    }

    /// Query-string pairs for `GET timesheets`; "all" values are omitted.
    pub fn query_pairs(&self) -> Vec<(&'static str, &'static str)> {
        let mut pairs = Vec::new();
        if let StatusFilter::Only(status) = self.status {
            pairs.push(("status", status.as_str()));
        }
        if let Some(preset) = self.date_range {
            pairs.push(("dateRange", preset.as_str()));
        }
        pairs
    }

    pub fn describe(&self) -> String {
        format!(
            "{} | {}",
            self.date_range.map(DateRangePreset::label).unwrap_or("All dates"),
            match self.status {
                StatusFilter::All => "All statuses",
                StatusFilter::Only(status) => status.as_str(),
            }
        )
    }
}

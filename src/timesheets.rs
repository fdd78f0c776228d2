use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::{Task, Timesheet};
use crate::error::{AppError, AppResult};
use crate::events::{EventBus, StoreEvent};
use crate::filter::TimesheetFilter;

/// Canonical list of weekly summaries, ordered by week number.
///
/// Cloning hands out another handle to the same list. Only the task store
/// changes aggregates, through [`TimesheetStore::apply_aggregate`].
#[derive(Debug, Clone)]
pub struct TimesheetStore {
    inner: Arc<RwLock<Vec<Timesheet>>>,
    events: EventBus,
}

impl TimesheetStore {
    pub fn new(events: EventBus) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Vec::new())),
            events,
        }
    }

    pub fn replace_all(&self, mut timesheets: Vec<Timesheet>) {
        timesheets.sort_by_key(|timesheet| timesheet.week_number);
        *self.write() = timesheets;
        self.events.publish(StoreEvent::TimesheetsLoaded);
    }

    /// Upserts by id, keeping existing entries for ids not in `incoming`.
    pub fn merge(&self, incoming: Vec<Timesheet>) {
        {
            let mut timesheets = self.write();
            for timesheet in incoming {
                match timesheets.iter_mut().find(|existing| existing.id == timesheet.id) {
                    Some(existing) => *existing = timesheet,
                    None => timesheets.push(timesheet),
                }
            }
            timesheets.sort_by_key(|timesheet| timesheet.week_number);
        }
        self.events.publish(StoreEvent::TimesheetsLoaded);
    }

    pub fn list(&self, filter: &TimesheetFilter, today: NaiveDate) -> Vec<Timesheet> {
        self.read()
            .iter()
            .filter(|timesheet| filter.matches(timesheet, today))
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &str) -> AppResult<Timesheet> {
        self.find(id).ok_or_else(|| AppError::not_found("timesheet", id))
    }

    pub fn find(&self, id: &str) -> Option<Timesheet> {
        self.read().iter().find(|timesheet| timesheet.id == id).cloned()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Recomputation hook for the task store. `tasks` must be the complete
    /// task set of the timesheet.
    pub(crate) fn apply_aggregate(&self, id: &str, tasks: &[Task], today: NaiveDate, now: DateTime<Utc>) -> bool {
        let changed = {
            let mut timesheets = self.write();
            match timesheets.iter_mut().find(|timesheet| timesheet.id == id) {
                Some(timesheet) => timesheet.apply_aggregate(tasks, today, now),
                None => false,
            }
        };

        if changed {
            tracing::debug!(timesheet_id = %id, "Timesheet aggregate recomputed");
            self.events.publish(StoreEvent::TimesheetChanged {
                timesheet_id: id.to_string(),
            });
        }
        changed
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Timesheet>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Timesheet>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    use super::TimesheetStore;
    use crate::domain::{Timesheet, TimesheetStatus};
    use crate::error::AppError;
    use crate::events::{EventBus, StoreEvent};
    use crate::filter::{StatusFilter, TimesheetFilter};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 24).expect("valid date")
    }

    fn sheets(statuses: &[TimesheetStatus]) -> Vec<Timesheet> {
        let now = Utc.with_ymd_and_hms(2025, 9, 24, 9, 0, 0).unwrap();
        statuses
            .iter()
            .enumerate()
            .map(|(index, status)| {
                let week = today() - Duration::weeks(statuses.len() as i64 - index as i64);
                let mut sheet = Timesheet::for_week(index as u32 + 1, week, today(), now);
                sheet.status = *status;
                sheet
            })
            .collect()
    }

    #[test]
    fn status_filter_returns_exact_matches() {
        let store = TimesheetStore::new(EventBus::new());
        store.replace_all(sheets(&[
            TimesheetStatus::Completed,
            TimesheetStatus::Incomplete,
            TimesheetStatus::Missing,
            TimesheetStatus::Completed,
        ]));

        let filter = TimesheetFilter {
            date_range: None,
            status: StatusFilter::Only(TimesheetStatus::Incomplete),
        };
        let rows = store.list(&filter, today());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].week_number, 2);
        assert_eq!(store.list(&TimesheetFilter::default(), today()).len(), 4);
    }

    #[test]
    fn keeps_week_number_order() {
        let store = TimesheetStore::new(EventBus::new());
        let mut rows = sheets(&[TimesheetStatus::Missing; 3]);
        rows.reverse();
        store.replace_all(rows);
        let weeks = store
            .list(&TimesheetFilter::default(), today())
            .iter()
            .map(|sheet| sheet.week_number)
            .collect::<Vec<_>>();
        assert_eq!(weeks, vec![1, 2, 3]);
    }

    #[test]
    fn merge_upserts_without_dropping_others() {
        let store = TimesheetStore::new(EventBus::new());
        let rows = sheets(&[TimesheetStatus::Missing, TimesheetStatus::Missing]);
        store.replace_all(rows.clone());

        let mut changed = rows[1].clone();
        changed.status = TimesheetStatus::Completed;
        changed.total_hours = 40;
        store.merge(vec![changed.clone()]);

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&changed.id).expect("present").total_hours, 40);
    }

    #[test]
    fn get_unknown_is_not_found() {
        let store = TimesheetStore::new(EventBus::new());
        assert!(matches!(store.get("nope"), Err(AppError::NotFound { .. })));
    }

    #[test]
    fn aggregate_changes_are_published() {
        let events = EventBus::new();
        let store = TimesheetStore::new(events.clone());
        let rows = sheets(&[TimesheetStatus::Missing]);
        let id = rows[0].id.clone();
        store.replace_all(rows);

        let mut subscription = events.subscribe();
        let now = Utc.with_ymd_and_hms(2025, 9, 24, 10, 0, 0).unwrap();
        assert!(!store.apply_aggregate(&id, &[], today(), now));
        assert!(subscription.drain().is_empty());

        let task = crate::domain::Task {
            id: "t1".to_string(),
            date: store.get(&id).expect("present").start_date,
            project_name: "Mobile App".to_string(),
            type_of_work: "Testing".to_string(),
            description: "Smoke test release build".to_string(),
            hours: 5,
            timesheet_id: id.clone(),
        };
        assert!(store.apply_aggregate(&id, &[task], today(), now));
        assert_eq!(
            subscription.drain(),
            vec![StoreEvent::TimesheetChanged { timesheet_id: id.clone() }]
        );
        let sheet = store.get(&id).expect("present");
        assert_eq!(sheet.total_hours, 5);
        assert_eq!(sheet.status, TimesheetStatus::Incomplete);
    }
}

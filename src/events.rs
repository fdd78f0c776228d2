//! Change notifications published by the stores.
//!
//! Views hold a [`Subscription`] and re-pull whatever they display when an
//! event arrives; they never read another component's fields directly.

use tokio::sync::broadcast::{self, error::TryRecvError};

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// The timesheet list was (re)hydrated from the backend.
    TimesheetsLoaded,
    /// A timesheet's aggregate `total_hours`/`status` changed.
    TimesheetChanged { timesheet_id: String },
    /// Tasks of a timesheet were created, updated, deleted or loaded.
    TasksChanged { timesheet_id: String },
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<StoreEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUFFER);
        Self { sender }
    }

    pub fn publish(&self, event: StoreEvent) {
        // No subscribers is fine: nothing is on screen yet.
        if self.sender.send(event).is_err() {
            tracing::trace!("store event dropped, no subscribers");
        }
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct Subscription {
    receiver: broadcast::Receiver<StoreEvent>,
}

impl Subscription {
    /// Everything published since the last call, without waiting. A lagging
    /// subscriber gets a single `TimesheetsLoaded` so it re-pulls everything.
    pub fn drain(&mut self) -> Vec<StoreEvent> {
        let mut events = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "store subscriber lagged, forcing full refresh");
                    events.push(StoreEvent::TimesheetsLoaded);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        events
    }
}

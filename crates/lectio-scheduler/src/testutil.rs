//! Mock source and sink for watcher/notifier tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use lectio_core::error::{LectioError, Result};
use lectio_core::traits::{Delivery, MessageSink, ScheduleSource};
use lectio_core::types::Event;

/// Scripted schedule source: fixed events per group, optional per-group
/// failure, and a probe-call counter.
pub(crate) struct MockSource {
    events: Mutex<HashMap<i64, Vec<Event>>>,
    failing: Mutex<Vec<i64>>,
    pub session_calls: AtomicUsize,
}

impl MockSource {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(HashMap::new()),
            failing: Mutex::new(Vec::new()),
            session_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_events(&self, group_id: i64, events: Vec<Event>) {
        self.events.lock().unwrap().insert(group_id, events);
    }

    pub fn fail_group(&self, group_id: i64) {
        self.failing.lock().unwrap().push(group_id);
    }

    fn lookup(&self, group_id: i64) -> Result<Vec<Event>> {
        if self.failing.lock().unwrap().contains(&group_id) {
            return Err(LectioError::Api(format!("group {group_id} unavailable")));
        }
        Ok(self
            .events
            .lock()
            .unwrap()
            .get(&group_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl ScheduleSource for MockSource {
    async fn regular_events(&self, group_id: i64) -> Result<Vec<Event>> {
        self.lookup(group_id)
    }

    async fn session_events(&self, group_id: i64) -> Result<Vec<Event>> {
        self.session_calls.fetch_add(1, Ordering::SeqCst);
        self.lookup(group_id)
    }
}

/// Recording sink with a switchable delivery outcome.
pub(crate) struct MockSink {
    sent: Mutex<Vec<(i64, String)>>,
    mode: Mutex<Delivery>,
}

impl MockSink {
    pub fn new(mode: Delivery) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            mode: Mutex::new(mode),
        }
    }

    pub fn set_mode(&self, mode: Delivery) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn deliveries(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageSink for MockSink {
    async fn deliver(&self, chat_id: i64, text: &str) -> Delivery {
        let mode = *self.mode.lock().unwrap();
        if mode == Delivery::Sent {
            self.sent.lock().unwrap().push((chat_id, text.to_string()));
        }
        mode
    }
}

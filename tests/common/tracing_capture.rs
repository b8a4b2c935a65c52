//! Records `tracing` events on the current thread for log assertions.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing::{dispatcher, Dispatch, Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;

#[derive(Debug, Clone)]
pub struct LogRecord {
    pub level: Level,
    pub message: String,
    pub fields: BTreeMap<String, String>,
}

pub type Records = Arc<Mutex<Vec<LogRecord>>>;

struct Recorder(Records);

impl Visit for LogRecord {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let value = format!("{value:?}");
        if field.name() == "message" {
            self.message = value;
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl<S: Subscriber> Layer<S> for Recorder {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut record = LogRecord {
            level: *event.metadata().level(),
            message: String::new(),
            fields: BTreeMap::new(),
        };
        event.record(&mut record);
        self.0.lock().unwrap().push(record);
    }
}

/// Capture every event until the guard drops.
pub fn capture_logs() -> (Records, dispatcher::DefaultGuard) {
    let records = Records::default();
    let subscriber = tracing_subscriber::registry().with(Recorder(records.clone()));
    let guard = dispatcher::set_default(&Dispatch::new(subscriber));
    (records, guard)
}

/// Records at `level` whose message contains `needle`.
pub fn matching(records: &Records, level: Level, needle: &str) -> Vec<LogRecord> {
    records
        .lock()
        .unwrap()
        .iter()
        .filter(|r| r.level == level && r.message.contains(needle))
        .cloned()
        .collect()
}

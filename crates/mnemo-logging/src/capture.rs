//! In-memory capture of tracing events for test assertions.
//!
//! Degraded paths in this workspace (an unreachable collaborator, a full
//! summarization queue) only show up as log events, so tests assert on them
//! through [`capture_logs`].

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

/// One captured event.
#[derive(Clone, Debug)]
pub struct CapturedEvent {
    /// Level.
    pub level: Level,
    /// Target module path.
    pub target: String,
    /// Formatted message.
    pub message: String,
    /// Structured fields other than the message.
    pub fields: BTreeMap<&'static str, String>,
}

impl CapturedEvent {
    /// Value of a structured field.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Shared handle to the events seen by a capturing subscriber.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<CapturedEvent>>>);

impl CapturedLogs {
    /// Snapshot of all events so far.
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.0.lock().clone()
    }

    /// Events at exactly `level`.
    pub fn at_level(&self, level: Level) -> Vec<CapturedEvent> {
        self.0.lock().iter().filter(|e| e.level == level).cloned().collect()
    }

    /// Whether an event at `level` has `needle` in its message.
    pub fn has_event(&self, level: Level, needle: &str) -> bool {
        self.0
            .lock()
            .iter()
            .any(|e| e.level == level && e.message.contains(needle))
    }
}

#[derive(Default)]
struct Fields {
    message: String,
    rest: BTreeMap<&'static str, String>,
}

impl Visit for Fields {
    // every other record_* method funnels into record_debug
    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        let rendered = format!("{value:?}");
        if field.name() == "message" {
            self.message = rendered;
        } else {
            let _ = self.rest.insert(field.name(), rendered);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            value.clone_into(&mut self.message);
        } else {
            let _ = self.rest.insert(field.name(), value.to_owned());
        }
    }
}

impl<S: Subscriber> Layer<S> for CapturedLogs {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = Fields::default();
        event.record(&mut fields);
        let meta = event.metadata();
        self.0.lock().push(CapturedEvent {
            level: *meta.level(),
            target: meta.target().to_owned(),
            message: fields.message,
            fields: fields.rest,
        });
    }
}

/// Capture every event emitted on the current thread until the guard drops.
///
/// Async tests need a current-thread runtime (the `#[tokio::test]` default)
/// so that spawned work reports to the same subscriber.
pub fn capture_logs() -> (CapturedLogs, DefaultGuard) {
    let logs = CapturedLogs::default();
    let guard = tracing_subscriber::registry().with(logs.clone()).set_default();
    (logs, guard)
}

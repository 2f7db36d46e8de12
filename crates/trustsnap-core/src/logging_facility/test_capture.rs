//! In-memory log capture for tests
//!
//! Every event is recorded with its fields flattened to strings. The
//! `op`, `event`, `version` and `err.code` fields are lifted out so tests can
//! assert on operation boundaries for one snapshot version without parsing
//! output.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::field::{Field, Visit};
use tracing::{Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use super::schema::{EVENT_END_ERROR, FIELD_ERR_CODE, FIELD_EVENT, FIELD_OP, FIELD_VERSION};

/// One recorded event.
#[derive(Clone, Debug)]
pub struct CapturedEvent {
    pub level: Level,
    pub op: Option<String>,
    pub event: Option<String>,
    pub version: Option<String>,
    pub err_code: Option<String>,
    pub fields: HashMap<String, String>,
}

impl CapturedEvent {
    fn from_fields(level: Level, fields: HashMap<String, String>) -> Self {
        let lift = |key: &str| fields.get(key).cloned();
        Self {
            level,
            op: lift(FIELD_OP),
            event: lift(FIELD_EVENT),
            version: lift(FIELD_VERSION),
            err_code: lift(FIELD_ERR_CODE),
            fields,
        }
    }

    fn is(&self, op: &str, event: &str) -> bool {
        self.op.as_deref() == Some(op) && self.event.as_deref() == Some(event)
    }
}

#[derive(Default)]
struct Fields(HashMap<String, String>);

impl Visit for Fields {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{:?}", value));
    }
}

struct CaptureLayer {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = Fields::default();
        event.record(&mut fields);
        let captured = CapturedEvent::from_fields(*event.metadata().level(), fields.0);
        if let Ok(mut events) = self.events.lock() {
            events.push(captured);
        }
    }
}

/// Shared handle onto the captured events.
///
/// The buffer is process-wide, so tests should filter on an op name or a
/// version no other test in the same binary uses.
#[derive(Clone)]
pub struct TestCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl TestCapture {
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn events_for_op(&self, op: &str) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.op.as_deref() == Some(op))
            .collect()
    }

    /// Boundary events of `op` tagged with `version`.
    pub fn events_for_version(&self, op: &str, version: &str) -> Vec<CapturedEvent> {
        self.events_for_op(op)
            .into_iter()
            .filter(|e| e.version.as_deref() == Some(version))
            .collect()
    }

    /// Error codes reported by `end_error` events of `op`, in emission order.
    pub fn error_codes(&self, op: &str) -> Vec<String> {
        self.events_for_op(op)
            .into_iter()
            .filter(|e| e.event.as_deref() == Some(EVENT_END_ERROR))
            .filter_map(|e| e.err_code)
            .collect()
    }

    /// # Panics
    ///
    /// Panics if no event with this op and event name was captured.
    pub fn assert_event_exists(&self, op: &str, event: &str) {
        let events = self.events();
        assert!(
            events.iter().any(|e| e.is(op, event)),
            "no {}/{} event among {} captured",
            op,
            event,
            events.len()
        );
    }
}

static GLOBAL_CAPTURE: OnceLock<TestCapture> = OnceLock::new();

/// Install the capture layer as the global subscriber (once per test binary)
/// and return a handle to its buffer.
///
/// # Example
///
/// ```
/// use trustsnap_core::logging_facility::test_capture::init_test_capture;
/// use trustsnap_core::log_op_start;
///
/// let capture = init_test_capture();
/// log_op_start!("doc_example_op", version = "v0.0.1");
/// assert_eq!(capture.events_for_version("doc_example_op", "v0.0.1").len(), 1);
/// ```
pub fn init_test_capture() -> TestCapture {
    GLOBAL_CAPTURE
        .get_or_init(|| {
            let events = Arc::new(Mutex::new(Vec::new()));
            let layer = CaptureLayer {
                events: events.clone(),
            };
            tracing_subscriber::registry().with(layer).init();
            TestCapture { events }
        })
        .clone()
}

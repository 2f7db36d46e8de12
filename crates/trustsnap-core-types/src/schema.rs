//! Field keys and event names shared by the logging macros, the capture
//! layer used in tests and anything else that reads structured log output.

pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_REQUEST_ID: &str = "request_id";

// Trust content
pub const FIELD_VERSION: &str = "version";
pub const FIELD_PREVIOUS_VERSION: &str = "previous_version";
pub const FIELD_ACTOR: &str = "actor";
pub const FIELD_SNAPSHOT_COUNT: &str = "snapshot_count";

pub const FIELD_ERR_KIND: &str = "err.kind";
pub const FIELD_ERR_CODE: &str = "err.code";

/// Operation boundary events. Every `start` is closed by exactly one of
/// `end` or `end_error`.
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";

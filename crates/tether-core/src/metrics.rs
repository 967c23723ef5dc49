//! Client metrics.
//!
//! Recorded through the `metrics` facade; they are no-ops until the
//! embedding application installs a recorder.

use metrics::counter;

/// Metric names.
pub mod names {
    pub const SESSIONS_TOTAL: &str = "tether_sessions_total";
    pub const DISCONNECTS_TOTAL: &str = "tether_disconnects_total";
    pub const FRAMES_TOTAL: &str = "tether_frames_total";
    pub const FRAMES_BYTES: &str = "tether_frames_bytes";
    pub const JOINS_TOTAL: &str = "tether_joins_total";
    pub const SEND_REJECTED_TOTAL: &str = "tether_send_rejected_total";
    pub const DECODE_ERRORS_TOTAL: &str = "tether_decode_errors_total";
}

/// Describe all client metrics.
pub fn describe() {
    metrics::describe_counter!(names::SESSIONS_TOTAL, "Transport sessions started");
    metrics::describe_counter!(names::DISCONNECTS_TOTAL, "Transport sessions lost");
    metrics::describe_counter!(names::FRAMES_TOTAL, "Frames sent and received");
    metrics::describe_counter!(names::FRAMES_BYTES, "Bytes sent and received");
    metrics::describe_counter!(names::JOINS_TOTAL, "Join outcomes by status");
    metrics::describe_counter!(
        names::SEND_REJECTED_TOTAL,
        "Sends rejected before reaching the transport"
    );
    metrics::describe_counter!(names::DECODE_ERRORS_TOTAL, "Inbound frames that failed to decode");
}

pub(crate) fn record_session() {
    counter!(names::SESSIONS_TOTAL).increment(1);
}

pub(crate) fn record_disconnect() {
    counter!(names::DISCONNECTS_TOTAL).increment(1);
}

pub(crate) fn record_frame(bytes: usize, direction: &'static str) {
    counter!(names::FRAMES_TOTAL, "direction" => direction).increment(1);
    counter!(names::FRAMES_BYTES, "direction" => direction).increment(bytes as u64);
}

pub(crate) fn record_join(status: &'static str) {
    counter!(names::JOINS_TOTAL, "status" => status).increment(1);
}

pub(crate) fn record_rejected(kind: &'static str) {
    counter!(names::SEND_REJECTED_TOTAL, "kind" => kind).increment(1);
}

pub(crate) fn record_decode_error() {
    counter!(names::DECODE_ERRORS_TOTAL).increment(1);
}

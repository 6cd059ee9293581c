use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("streamchat.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("streamchat.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("streamchat.client.request_duration_seconds");

pub(crate) static STREAM_BYTES: Counter = Counter::new("streamchat.stream.bytes");
pub(crate) static STREAM_DELTAS: Counter = Counter::new("streamchat.stream.deltas");
pub(crate) static STREAM_MALFORMED: Counter = Counter::new("streamchat.stream.malformed_records");
pub(crate) static STREAM_TTFB: Moments = Moments::new("streamchat.stream.ttfb_seconds");
pub(crate) static STREAM_DURATION: Moments = Moments::new("streamchat.stream.duration_seconds");

pub(crate) static SESSIONS_STARTED: Counter = Counter::new("streamchat.session.started");
pub(crate) static SESSIONS_COMPLETED: Counter = Counter::new("streamchat.session.completed");
pub(crate) static SESSIONS_FAILED: Counter = Counter::new("streamchat.session.failed");
pub(crate) static SESSIONS_CANCELLED: Counter = Counter::new("streamchat.session.cancelled");
pub(crate) static SESSIONS_REJECTED: Counter = Counter::new("streamchat.session.rejected");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_BYTES);
    collector.register_counter(&STREAM_DELTAS);
    collector.register_counter(&STREAM_MALFORMED);
    collector.register_moments(&STREAM_TTFB);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&SESSIONS_STARTED);
    collector.register_counter(&SESSIONS_COMPLETED);
    collector.register_counter(&SESSIONS_FAILED);
    collector.register_counter(&SESSIONS_CANCELLED);
    collector.register_counter(&SESSIONS_REJECTED);
}

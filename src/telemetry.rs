//! Tracing setup: a one-line `tracing_subscriber::fmt()` init reading the
//! filter from `RUST_LOG`, plus a `get_trace_id` helper for log correlation
//! across the two controllers.

use tracing_subscriber::EnvFilter;
use uuid_lite::new_trace_id;

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Generates a correlation id for one reconcile invocation. No OTEL exporter
/// is wired in this crate; this is a local stand-in so
/// `#[instrument(fields(trace_id))]` call sites have something to record,
/// the way `tembo-operator`'s `telemetry::get_trace_id` feeds its span.
pub fn get_trace_id() -> String {
    new_trace_id()
}

mod uuid_lite {
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    /// A process-local monotonic id, formatted like a short trace id.
    /// Deliberately not a real UUID/OTEL id: this crate has no tracing
    /// backend configured, only `tracing-subscriber`'s fmt layer.
    pub fn new_trace_id() -> String {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        format!("{n:016x}")
    }
}

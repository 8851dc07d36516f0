//! Structured NDJSON logging, grounded in the pageserver/safekeeper binaries'
//! `utils::logging::init()` call, reimplemented directly on
//! `tracing-subscriber` since the `utils` crate itself is not part of this
//! workspace.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

/// Initializes process-wide structured logging to stdout, one JSON object
/// per line (§6), and logs the resolved `component_type`/`component_name`
/// once at startup so this process's first line is attributable too.
///
/// `with_current_span(true)` is what makes the per-line contract hold: once
/// [`crate::runtime::WorkerRuntime::run`] enters its `component_type`/
/// `component_name`/`instance_uuid` span, every event logged underneath it —
/// pop/claim, quarantine, retry, heartbeat — has those fields merged in,
/// not just this function's one-shot startup event.
pub fn init(component_type: &'static str, component_name: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_target(true)
        .with_current_span(true)
        .with_span_list(false);

    Registry::default()
        .with(env_filter)
        .with(tracing_error::ErrorLayer::default())
        .with(json_layer)
        .init();

    tracing::info!(component_type, component_name, "logging initialized");
}

//! Prometheus metrics for the connection cache

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::Result;
use crate::error::Error;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static START_TIME: OnceLock<Instant> = OnceLock::new();

// Server metrics
const METRIC_UPTIME: &str = "mongodeck_uptime_seconds";
const METRIC_INFO: &str = "mongodeck_info";

// Client cache metrics
const METRIC_LOOKUPS: &str = "mongodeck_client_lookups_total";
const METRIC_BUILDS: &str = "mongodeck_client_builds_total";
const METRIC_BUILD_DURATION: &str = "mongodeck_client_build_duration_seconds";
const METRIC_CLOSES: &str = "mongodeck_client_closes_total";
const METRIC_RESIDENT: &str = "mongodeck_resident_clients";

/// Initialize Prometheus metrics recorder.
pub fn init_metrics() -> Result<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| Error::Config(format!("Failed to install metrics recorder: {e}")))?;

    PROMETHEUS_HANDLE.set(handle).ok();
    START_TIME.set(Instant::now()).ok();

    register_metrics();
    tracing::info!("Prometheus metrics initialized");
    Ok(())
}

fn register_metrics() {
    describe_gauge!(METRIC_UPTIME, "Server uptime in seconds");
    describe_gauge!(METRIC_INFO, "Server information (always 1)");

    describe_counter!(
        METRIC_LOOKUPS,
        "Client cache lookups by result (hit, miss, pending)"
    );
    describe_counter!(METRIC_BUILDS, "Client constructions by outcome");
    describe_histogram!(
        METRIC_BUILD_DURATION,
        "Client construction latency including the initial ping"
    );
    describe_counter!(METRIC_CLOSES, "Cached clients closed, by reason");
    describe_gauge!(METRIC_RESIDENT, "Clients currently resident in the cache");

    gauge!(
        METRIC_INFO,
        "version" => env!("CARGO_PKG_VERSION"),
    )
    .set(1.0);
}

/// Render metrics in Prometheus text format.
#[must_use]
pub fn render_metrics() -> String {
    if let Some(start) = START_TIME.get() {
        gauge!(METRIC_UPTIME).set(start.elapsed().as_secs_f64());
    }

    PROMETHEUS_HANDLE
        .get()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}

/// Record a cache lookup; `result` is `hit`, `miss` or `pending`.
pub fn record_client_lookup(result: &str) {
    counter!(METRIC_LOOKUPS, "result" => result.to_owned()).increment(1);
}

/// Record a finished client construction.
pub fn record_client_build(duration: Duration, status: &str) {
    histogram!(METRIC_BUILD_DURATION, "status" => status.to_owned())
        .record(duration.as_secs_f64());
    counter!(METRIC_BUILDS, "status" => status.to_owned()).increment(1);
}

/// Record a client leaving the cache.
pub fn record_client_close(reason: &str) {
    counter!(METRIC_CLOSES, "reason" => reason.to_owned()).increment(1);
}

/// Update the resident client gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_resident_clients(count: u64) {
    gauge!(METRIC_RESIDENT).set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_metrics_without_init() {
        let output = render_metrics();
        assert!(output.is_empty());
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_client_lookup("hit");
        record_client_build(Duration::from_millis(12), "ok");
        record_client_close("idle");
        set_resident_clients(3);
    }
}

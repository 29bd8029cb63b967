use std::net::SocketAddr;

use crate::scheduler::{DragOutcome, Gesture};

// ── Interaction ─────────────────────────────────────────────────

/// Counter: drag gestures released. Labels: gesture, outcome.
pub const DRAGS_TOTAL: &str = "roomline_drags_total";

/// Counter: mutations refused because they overlap an active reservation.
/// Labels: source (drag, form, store).
pub const CONFLICTS_TOTAL: &str = "roomline_conflicts_total";

/// Counter: create/edit forms rejected before any mutation. Labels: kind.
pub const VALIDATION_FAILURES_TOTAL: &str = "roomline_validation_failures_total";

// ── Optimistic writes ───────────────────────────────────────────

/// Counter: optimistic writes issued to the store.
pub const OPTIMISTIC_WRITES_TOTAL: &str = "roomline_optimistic_writes_total";

/// Counter: optimistic writes settled. Labels: result (confirmed, rolled_back, superseded).
pub const SETTLEMENTS_TOTAL: &str = "roomline_settlements_total";

/// Counter: optimistic writes rolled back. Labels: kind (error kind).
pub const ROLLBACKS_TOTAL: &str = "roomline_rollbacks_total";

/// Gauge: overlay entries awaiting the store.
pub const OVERLAY_PENDING: &str = "roomline_overlay_pending";

/// Histogram: store write latency in seconds.
pub const WRITE_DURATION_SECONDS: &str = "roomline_write_duration_seconds";

/// Gauge: active reservations in the last snapshot.
pub const SNAPSHOT_RESERVATIONS: &str = "roomline_snapshot_reservations";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

pub(crate) fn record_drag(gesture: Gesture, outcome: &DragOutcome) {
    metrics::counter!(
        DRAGS_TOTAL,
        "gesture" => gesture.as_str(),
        "outcome" => outcome.label()
    )
    .increment(1);
}

pub(crate) fn record_conflict(source: &'static str) {
    metrics::counter!(CONFLICTS_TOTAL, "source" => source).increment(1);
}

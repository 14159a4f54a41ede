//! Prometheus metrics definitions.

use once_cell::sync::Lazy;
use prometheus::{register_int_counter, register_int_gauge, IntCounter, IntGauge};

/// Identifiers in the latest registry.
pub static CLASSES_TOTAL: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "classwatch_classes_total",
        "Number of identifiers in the latest registry"
    )
    .unwrap()
});

/// Files in the latest registry.
pub static FILES_TOTAL: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "classwatch_files_total",
        "Number of indexed source files in the latest registry"
    )
    .unwrap()
});

/// Open consumer connections.
pub static CONNECTIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "classwatch_connections",
        "Number of open broadcast connections"
    )
    .unwrap()
});

/// Registry broadcasts sent.
pub static BROADCASTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "classwatch_broadcasts_total",
        "Number of registry rebuilds broadcast to consumers"
    )
    .unwrap()
});

/// Source files that failed to scan.
pub static SCAN_ERRORS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "classwatch_scan_errors_total",
        "Number of source file reads that failed"
    )
    .unwrap()
});

/// Initialize all metrics (call once at startup).
pub fn init_metrics() {
    // Access lazy statics to register them
    let _ = &*CLASSES_TOTAL;
    let _ = &*FILES_TOTAL;
    let _ = &*CONNECTIONS;
    let _ = &*BROADCASTS_TOTAL;
    let _ = &*SCAN_ERRORS_TOTAL;

    tracing::debug!("Prometheus metrics initialized");
}

use mqsink_telemetry::{BridgeMetrics, MetricsSnapshot};
use std::sync::Arc;

#[test]
fn new_metrics_start_at_zero() {
    let metrics = BridgeMetrics::new();
    assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
}

#[test]
fn record_stored_returns_running_total() {
    let metrics = BridgeMetrics::new();
    assert_eq!(metrics.record_stored(), 1);
    assert_eq!(metrics.record_stored(), 2);
    metrics.record_write_failure();
    assert_eq!(metrics.stored(), 2);
    assert_eq!(metrics.snapshot().write_failures, 1);
}

#[test]
fn concurrent_increments_are_not_lost() {
    let metrics = Arc::new(BridgeMetrics::new());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let metrics = metrics.clone();
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    metrics.record_stored();
                    metrics.record_received();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("join");
    }
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.messages_stored, 8000);
    assert_eq!(snapshot.messages_received, 8000);
}

//! Prometheus metrics for the kiosk.
//!
//! [`KioskMetrics`] owns a dedicated [`Registry`] that the daemon's
//! `/metrics` endpoint encodes into the Prometheus text exposition format.

use prometheus::{
    register_histogram_vec_with_registry, register_int_counter_with_registry, Encoder,
    HistogramOpts, HistogramVec, IntCounter, Opts, Registry, TextEncoder,
};

pub struct KioskMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Scans that started a credential check.
    pub scans_accepted: IntCounter,
    /// Scans dropped because the scanner was paused or a session was active.
    pub scans_dropped: IntCounter,
    pub credentials_granted: IntCounter,
    pub credentials_rejected: IntCounter,
    pub faces_granted: IntCounter,
    pub faces_denied: IntCounter,
    /// Capture attempts that failed (camera unavailable or stale capture).
    pub capture_failures: IntCounter,
    pub resets: IntCounter,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Remote verification latency in milliseconds, labelled by `check`.
    pub remote_call_ms: HistogramVec,
}

fn counter(registry: &Registry, name: &str, help: &str) -> IntCounter {
    register_int_counter_with_registry!(Opts::new(name, help), registry)
        .expect("failed to register kiosk counter")
}

impl KioskMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let scans_accepted = counter(
            &registry,
            "kiosk_scans_accepted_total",
            "Scans that started a credential check",
        );
        let scans_dropped = counter(
            &registry,
            "kiosk_scans_dropped_total",
            "Scans dropped while scanning was paused",
        );
        let credentials_granted = counter(
            &registry,
            "kiosk_credentials_granted_total",
            "Credential checks that identified a subject",
        );
        let credentials_rejected = counter(
            &registry,
            "kiosk_credentials_rejected_total",
            "Credential checks that failed",
        );
        let faces_granted = counter(
            &registry,
            "kiosk_faces_granted_total",
            "Face checks that granted access",
        );
        let faces_denied = counter(
            &registry,
            "kiosk_faces_denied_total",
            "Face checks that denied access or failed",
        );
        let capture_failures = counter(
            &registry,
            "kiosk_capture_failures_total",
            "Face capture attempts that failed",
        );
        let resets = counter(&registry, "kiosk_resets_total", "Session resets");

        // Exponential buckets covering 5 ms → ~20 s.
        let remote_call_ms = register_histogram_vec_with_registry!(
            HistogramOpts::new(
                "kiosk_remote_call_ms",
                "Remote verification latency in milliseconds"
            )
            .buckets(vec![
                5.0, 10.0, 20.0, 40.0, 80.0, 160.0, 320.0, 640.0, 1280.0, 2560.0, 5120.0, 10240.0,
                20480.0,
            ]),
            &["check"],
            registry
        )
        .expect("failed to register remote_call_ms histogram");

        Self {
            registry,
            scans_accepted,
            scans_dropped,
            credentials_granted,
            credentials_rejected,
            faces_granted,
            faces_denied,
            capture_failures,
            resets,
            remote_call_ms,
        }
    }

    pub fn observe_remote_call(&self, check: &str, elapsed: std::time::Duration) {
        self.remote_call_ms
            .with_label_values(&[check])
            .observe(elapsed.as_secs_f64() * 1000.0);
    }

    /// Encode every metric in the Prometheus text format.
    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buf) {
            tracing::warn!(error = %e, "failed to encode metrics");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

impl Default for KioskMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposition_lists_counters() {
        let metrics = KioskMetrics::new();
        metrics.scans_accepted.inc();
        metrics.observe_remote_call("credential", std::time::Duration::from_millis(12));

        let text = metrics.encode_text();
        assert!(text.contains("kiosk_scans_accepted_total 1"));
        assert!(text.contains("kiosk_remote_call_ms_count{check=\"credential\"} 1"));
    }

    #[test]
    fn registries_are_independent() {
        let a = KioskMetrics::new();
        let b = KioskMetrics::new();
        a.resets.inc();
        assert_eq!(b.resets.get(), 0);
    }
}

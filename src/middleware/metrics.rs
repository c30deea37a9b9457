//! Prometheus metrics for the access-control layer.
//!
//! Exposes a standard `/metrics` endpoint that Prometheus can scrape.
//! Each `Metrics` owns its own registry, so several app instances (tests)
//! can coexist in one process.

use prometheus::{opts, Encoder, IntCounter, IntCounterVec, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    admission_total: IntCounterVec,
    auth_failures_total: IntCounterVec,
    like_toggles_total: IntCounterVec,
    buckets_evicted_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let admission_total = IntCounterVec::new(
            opts!("partage_admission_total", "Admission decisions by outcome"),
            &["outcome"],
        )?;
        let auth_failures_total = IntCounterVec::new(
            opts!("partage_auth_failures_total", "Rejected bearer credentials by reason"),
            &["reason"],
        )?;
        let like_toggles_total = IntCounterVec::new(
            opts!("partage_like_toggles_total", "Like toggles by resulting state"),
            &["state"],
        )?;
        let buckets_evicted_total = IntCounter::with_opts(opts!(
            "partage_rate_buckets_evicted_total",
            "Idle rate buckets reclaimed by the sweeper"
        ))?;

        registry.register(Box::new(admission_total.clone()))?;
        registry.register(Box::new(auth_failures_total.clone()))?;
        registry.register(Box::new(like_toggles_total.clone()))?;
        registry.register(Box::new(buckets_evicted_total.clone()))?;

        Ok(Self {
            registry,
            admission_total,
            auth_failures_total,
            like_toggles_total,
            buckets_evicted_total,
        })
    }

    pub fn admission(&self, outcome: &str) {
        self.admission_total.with_label_values(&[outcome]).inc();
    }

    pub fn auth_failure(&self, reason: &str) {
        self.auth_failures_total.with_label_values(&[reason]).inc();
    }

    pub fn like_toggled(&self, state: &str) {
        self.like_toggles_total.with_label_values(&[state]).inc();
    }

    pub fn buckets_evicted(&self, n: usize) {
        self.buckets_evicted_total.inc_by(n as u64);
    }

    /// Encode all registered metrics as Prometheus text format.
    /// Called by the `/metrics` HTTP handler.
    pub fn encode(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap_or_default();
        String::from_utf8(buffer).unwrap_or_default()
    }
}

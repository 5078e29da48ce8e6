//! Prometheus metrics for fetch tiers, synthesis and delivery
//!
//! Everything registers into the default registry on first use.
//! [`render`] returns the text exposition format.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder, HistogramOpts, HistogramVec,
    IntCounter, IntCounterVec, TextEncoder,
};
use std::time::Instant;
use tracing::error;

pub const TIER_SOCIAL: &str = "social";
pub const TIER_FEED: &str = "feed";
pub const TIER_PAGE: &str = "page";

pub const OUTCOME_OK: &str = "ok";
pub const OUTCOME_EMPTY: &str = "empty";
pub const OUTCOME_FAILED: &str = "failed";
pub const OUTCOME_BLOCKED: &str = "blocked";

static FETCH_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "newsbhai_fetch_units_total",
        "Source units attempted, by tier and outcome",
        &["tier", "outcome"]
    )
    .expect("Failed to create fetch_units metric")
});

static ITEMS_FETCHED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "newsbhai_items_fetched_total",
        "News items produced by each tier",
        &["tier"]
    )
    .expect("Failed to create items_fetched metric")
});

static TIER_FALLBACKS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "newsbhai_tier_fallbacks_total",
        "Times a topic fell through to the syndication tier",
        &["topic"]
    )
    .expect("Failed to create tier_fallbacks metric")
});

static SUMMARIZER_FALLBACKS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "newsbhai_summarizer_fallbacks_total",
        "Group summaries that used the title fallback",
        &["reason"]
    )
    .expect("Failed to create summarizer_fallbacks metric")
});

static DIGEST_BUILD_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0];
    register_histogram_vec!(
        HistogramOpts::new("newsbhai_digest_build_seconds", "End-to-end digest build latency").buckets(buckets),
        &["kind"]
    )
    .expect("Failed to create digest_build metric")
});

static DELIVERIES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "newsbhai_deliveries_total",
        "Digest deliveries by update kind and status",
        &["kind", "status"]
    )
    .expect("Failed to create deliveries metric")
});

static DEDUP_HITS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("newsbhai_dedup_hits_total", "Duplicate items dropped").expect("Failed to create dedup_hits metric")
});

pub(crate) static CIRCUIT_TRIPS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "newsbhai_circuit_trips_total",
        "Circuit breaker trips per host",
        &["host"]
    )
    .expect("Failed to create circuit_trips metric")
});

pub fn record_fetch_outcome(tier: &str, outcome: &str) {
    FETCH_OUTCOMES.with_label_values(&[tier, outcome]).inc();
}

pub fn record_items_fetched(tier: &str, count: usize) {
    ITEMS_FETCHED.with_label_values(&[tier]).inc_by(count as u64);
}

pub fn record_tier_fallback(topic: &str) {
    TIER_FALLBACKS.with_label_values(&[topic]).inc();
}

pub fn record_summarizer_fallback(reason: &str) {
    SUMMARIZER_FALLBACKS.with_label_values(&[reason]).inc();
}

pub fn record_delivery(kind: &str, status: &str) {
    DELIVERIES.with_label_values(&[kind, status]).inc();
}

pub fn record_dedup_hits(count: usize) {
    DEDUP_HITS.inc_by(count as u64);
}

/// Observes digest build latency on drop
pub struct BuildTimer {
    kind: &'static str,
    start: Instant,
}

impl BuildTimer {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            start: Instant::now(),
        }
    }
}

impl Drop for BuildTimer {
    fn drop(&mut self) {
        DIGEST_BUILD_SECONDS
            .with_label_values(&[self.kind])
            .observe(self.start.elapsed().as_secs_f64());
    }
}

/// All metrics in Prometheus text format
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return String::new();
    }

    String::from_utf8(buffer).unwrap_or_default()
}

//! Prometheus metrics for the HTTP surface.

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};
use std::sync::{LazyLock, Once};

static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);
static REGISTER: Once = Once::new();

const DURATION_BUCKETS: [f64; 8] = [0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.5, 1.0];

pub static SECRET_GET_REQUESTS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "secret_get_requests_total",
        "The total number of GET /secret/{hash} requests",
    )
    .expect("Failed to create SECRET_GET_REQUESTS_TOTAL metric - this should never happen")
});

pub static SECRET_POST_REQUESTS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "secret_post_requests_total",
        "The total number of POST /secret requests",
    )
    .expect("Failed to create SECRET_POST_REQUESTS_TOTAL metric - this should never happen")
});

pub static SECRET_GET_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "secret_get_request_duration_seconds",
            "Response time of GET /secret/{hash} in seconds",
        )
        .buckets(DURATION_BUCKETS.to_vec()),
    )
    .expect("Failed to create SECRET_GET_DURATION metric - this should never happen")
});

pub static SECRET_POST_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "secret_post_request_duration_seconds",
            "Response time of POST /secret in seconds",
        )
        .buckets(DURATION_BUCKETS.to_vec()),
    )
    .expect("Failed to create SECRET_POST_DURATION metric - this should never happen")
});

/// Registers every metric once; later calls are no-ops.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        let collectors: [Box<dyn prometheus::core::Collector>; 4] = [
            Box::new(SECRET_GET_REQUESTS_TOTAL.clone()),
            Box::new(SECRET_POST_REQUESTS_TOTAL.clone()),
            Box::new(SECRET_GET_DURATION.clone()),
            Box::new(SECRET_POST_DURATION.clone()),
        ];
        for collector in collectors {
            if let Err(e) = REGISTRY.register(collector) {
                tracing::error!(error = %e, "failed to register metric");
            }
        }
    });
}

/// Renders the registry in the Prometheus text format.
pub fn render() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

pub const METRIC_PRIMARY_HIT: &str = "contentlink_cache_primary_hit_total";
pub const METRIC_PRIMARY_MISS: &str = "contentlink_cache_primary_miss_total";
pub const METRIC_FALLBACK_HIT: &str = "contentlink_cache_fallback_hit_total";
pub const METRIC_FETCH_FAILURE: &str = "contentlink_fetch_failure_total";
pub const METRIC_RATE_LIMIT_RETRY: &str = "contentlink_rate_limit_retry_total";
pub const METRIC_REQUEST_MS: &str = "contentlink_request_ms";

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_PRIMARY_HIT,
            Unit::Count,
            "Total number of primary cache hits."
        );
        describe_counter!(
            METRIC_PRIMARY_MISS,
            Unit::Count,
            "Total number of primary cache misses."
        );
        describe_counter!(
            METRIC_FALLBACK_HIT,
            Unit::Count,
            "Total number of responses served from the fallback cache."
        );
        describe_counter!(
            METRIC_FETCH_FAILURE,
            Unit::Count,
            "Total number of failed API fetches."
        );
        describe_counter!(
            METRIC_RATE_LIMIT_RETRY,
            Unit::Count,
            "Total number of retries after a rate-limited response."
        );
        describe_histogram!(
            METRIC_REQUEST_MS,
            Unit::Milliseconds,
            "End-to-end request latency in milliseconds, cache hits included."
        );
    });
}

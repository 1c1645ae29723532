use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

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

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "rasoio_edge_hit_total",
            Unit::Count,
            "Total number of edge store hits."
        );
        describe_counter!(
            "rasoio_edge_miss_total",
            Unit::Count,
            "Total number of edge store misses."
        );
        describe_counter!(
            "rasoio_edge_fallback_total",
            Unit::Count,
            "Total number of requests served from the landing-page fallback."
        );
        describe_counter!(
            "rasoio_edge_store_evicted_total",
            Unit::Count,
            "Total number of stale versioned stores evicted at activation."
        );
        describe_counter!(
            "rasoio_notify_sent_total",
            Unit::Count,
            "Total number of notifications accepted by the push provider."
        );
        describe_counter!(
            "rasoio_notify_failed_total",
            Unit::Count,
            "Total number of notification sends that failed."
        );
    });
}

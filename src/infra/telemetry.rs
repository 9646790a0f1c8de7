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

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Statement logging from sqlx is noise at `info`; `RUST_LOG` can still raise it.
const QUIET_DIRECTIVES: &[&str] = &["sqlx=warn"];

/// Install the global tracing subscriber and describe the process metrics.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let mut env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();
    for directive in QUIET_DIRECTIVES {
        let directive = directive
            .parse()
            .map_err(|err| InfraError::telemetry(format!("bad directive `{directive}`: {err}")))?;
        env_filter = env_filter.add_directive(directive);
    }

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_thread_ids(false)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| InfraError::telemetry(format!("subscriber already installed: {err}")))
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "chirp_query_cache_hit_total",
            Unit::Count,
            "Query reads served from the cache."
        );
        describe_counter!(
            "chirp_query_cache_miss_total",
            Unit::Count,
            "Query reads that ran the fetcher."
        );
        describe_counter!(
            "chirp_query_cache_invalidate_total",
            Unit::Count,
            "Explicit query invalidations."
        );
        describe_counter!(
            "chirp_posts_created_total",
            Unit::Count,
            "Posts accepted by posts.create."
        );
        describe_counter!(
            "chirp_posts_rejected_total",
            Unit::Count,
            "posts.create calls rejected, labelled by error code."
        );
        describe_histogram!(
            "chirp_http_request_duration_ms",
            Unit::Milliseconds,
            "Time to produce a response, labelled by status class."
        );
    });
}

//! Logging setup and request-scoped tracing helpers.
//!
//! The relay pipeline is synchronous, so per-stream context (request id,
//! upstream name) travels in a tracing span rather than task-local storage.

use crate::core::config::LoggingConfig;
use chrono::Local;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filters always appended so a bare `RUST_LOG=trace` does not flood the
/// output with HTTP client internals.
const NOISE_FILTERS: &str = "hyper=warn,hyper::proto=warn,h2=warn,reqwest=warn";

/// Custom time formatter that uses local timezone (respects TZ environment variable)
struct LocalTime;

impl tracing_subscriber::fmt::time::FormatTime for LocalTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%d %H:%M:%S"))
    }
}

/// Build the effective filter string for a configured base filter.
pub fn filter_directives(base_filter: &str) -> String {
    if base_filter.trim().is_empty() {
        NOISE_FILTERS.to_string()
    } else {
        format!("{},{}", base_filter, NOISE_FILTERS)
    }
}

/// Install the global tracing subscriber.
///
/// Returns `false` when a subscriber was already installed (tests, embedding
/// applications); the existing subscriber is left untouched.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::new(filter_directives(&config.filter));

    let result = if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_timer(LocalTime))
            .try_init()
    } else if config.no_color {
        // Disable ANSI colors for file logging
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_timer(LocalTime)
                    .with_ansi(false),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_timer(LocalTime))
            .try_init()
    };

    result.is_ok()
}

/// Generate a new unique request ID using UUID v4.
pub fn generate_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Create a tracing span carrying the request id and upstream name of a
/// relayed stream.
///
/// # Example
///
/// ```ignore
/// let span = relay_span!("concise", request_id);
/// let _guard = span.enter();
/// ```
#[macro_export]
macro_rules! relay_span {
    ($upstream:expr, $request_id:expr) => {
        tracing::info_span!("relay", upstream = %$upstream, request_id = %$request_id)
    };
}

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt::{self, format::FmtSpan}};

/// Filter used when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "ipa_core=info";

pub fn init() {
    init_with_filter(DEFAULT_FILTER);
}

/// Installs the global subscriber, `RUST_LOG` taking precedence over
/// `default_filter`. Span timings are printed at debug level, where the
/// per-frame spans of the IPA are enabled.
pub fn init_with_filter(default_filter: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let is_debug = env_filter.to_string().contains("debug") ||
                   env_filter.to_string().contains("trace");

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_timer(fmt::time::uptime())
        .with_span_events(if is_debug {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        });

    // A subscriber installed earlier, by a test harness for instance, wins.
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();
}

//! Tracing subscriber setup for the `tasklog` binary.
//!
//! The library only emits events; installing a subscriber is left to
//! whoever embeds it. Filter directives come from `TASKLOG_LOG`, then
//! the config file's `log` key, then [`DEFAULT_FILTER`].

use std::{env, io};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding tracing filter directives.
pub const LOG_ENV: &str = "TASKLOG_LOG";

/// Filter used when neither the environment nor config sets one.
pub const DEFAULT_FILTER: &str = "warn";

/// Install a compact stderr subscriber.
///
/// Safe to call more than once: later calls leave the first subscriber
/// in place.
pub fn init(configured: Option<&str>) {
    let directives = resolve_filter(env::var(LOG_ENV).ok(), configured);
    let filter = EnvFilter::try_new(&directives).unwrap_or_else(|e| {
        eprintln!("warning: ignoring invalid log filter '{directives}': {e}");
        EnvFilter::new(DEFAULT_FILTER)
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(false)
                .compact(),
        )
        .try_init();
}

fn resolve_filter(from_env: Option<String>, configured: Option<&str>) -> String {
    from_env
        .filter(|s| !s.is_empty())
        .or_else(|| configured.map(str::to_owned))
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

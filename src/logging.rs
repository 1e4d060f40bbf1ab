// Tracing subscriber setup

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default level for this crate: `debug` when `DEBUG` is set, `info` otherwise.
pub fn default_level(debug: bool) -> Level {
    if debug {
        Level::DEBUG
    } else {
        Level::INFO
    }
}

/// Install the global subscriber. `RUST_LOG` takes precedence over `debug`.
/// Calling this more than once is harmless.
pub fn init_logging(debug: bool) {
    let level = default_level(debug);
    let default_filter = format!("flight_dashboard={level},tower_http={level}");

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_filter));

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true));

    let _ = subscriber.try_init();
}

#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

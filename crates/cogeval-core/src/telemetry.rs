//! Tracing setup for the `cogeval` binary.
//!
//! Log lines go to stderr so the summary printed on stdout stays clean.

use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber.
///
/// Directives in `RUST_LOG` refine the default `level`. With `json`, events
/// are newline-delimited JSON. Returns `false` when a global subscriber was
/// already installed, in which case nothing changes.
pub fn init_tracing(json: bool, level: Level) -> bool {
    tracing_subscriber::registry()
        .with(output_layer(json))
        .with(log_filter(level))
        .try_init()
        .is_ok()
}

fn log_filter(level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy()
}

fn output_layer(json: bool) -> BoxedLayer {
    let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    if json {
        layer.json().boxed()
    } else {
        layer.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_rejected() {
        init_tracing(false, Level::INFO);
        assert!(!init_tracing(true, Level::DEBUG));
        tracing::info!("still logging");
    }

    #[test]
    fn test_filter_defaults_to_level() {
        if std::env::var_os("RUST_LOG").is_none() {
            assert_eq!(log_filter(Level::DEBUG).to_string(), "debug");
        }
    }
}

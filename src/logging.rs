use crate::config::{Config, LogFormat};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global subscriber. Output goes to stderr; stdout carries the
/// protocol. `RUST_LOG` wins over the configured level.
pub fn init_tracing(config: &Config) {
    let crate_name = env!("CARGO_CRATE_NAME");
    let level = &config.log_level;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{crate_name}={level}").into());

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.log_format {
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_ansi(false),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(false),
            )
            .try_init(),
    };
    if let Err(e) = result {
        eprintln!("classroomd: tracing already initialised: {e}");
    }
}

use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

use crate::config::TelemetryConfig;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("log filter '{directives}' is invalid: {source}")]
    Filter {
        directives: String,
        #[source]
        source: ParseError,
    },
    #[error("log subscriber could not be installed: {0}")]
    Subscriber(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Directives from `RUST_LOG` when it parses, otherwise the configured level.
fn log_filter(configured: &str) -> Result<EnvFilter, TelemetryError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(configured).map_err(|source| TelemetryError::Filter {
        directives: configured.to_string(),
        source,
    })
}

/// Install the process-wide subscriber on stderr, leaving stdout to command
/// output.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(&config.log_level)?)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unparseable_level_names_the_directives() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let err = log_filter("benefit_engine=loud").expect_err("unknown level");
        assert!(matches!(err, TelemetryError::Filter { .. }));
        assert!(err.to_string().contains("benefit_engine=loud"));

        assert!(log_filter("info,benefit_engine=debug").is_ok());
    }
}

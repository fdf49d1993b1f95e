use crate::config::TelemetryConfig;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fmt;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
pub enum TelemetryError {
    EnvFilter { value: String, source: ParseError },
    Subscriber(Box<dyn std::error::Error + Send + Sync>),
    Metrics(String),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::EnvFilter { value, .. } => {
                write!(
                    f,
                    "invalid log level/filter '{}': unable to build EnvFilter",
                    value
                )
            }
            TelemetryError::Subscriber(err) => write!(f, "telemetry error: {err}"),
            TelemetryError::Metrics(err) => write!(f, "metrics recorder error: {err}"),
        }
    }
}

impl std::error::Error for TelemetryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TelemetryError::EnvFilter { source, .. } => Some(source),
            TelemetryError::Subscriber(err) => Some(&**err),
            TelemetryError::Metrics(_) => None,
        }
    }
}

const VERBOSE_DIRECTIVE: &str = "info,rental_scout=debug,rental_scout_cli=debug";

/// Filter directive in effect: verbose wins, then `RUST_LOG`, then the configured level.
fn filter_directive(config: &TelemetryConfig, rust_log: Option<String>) -> String {
    if config.verbose {
        return VERBOSE_DIRECTIVE.to_string();
    }
    rust_log
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| config.log_level.clone())
}

/// Installs the global subscriber. Logs go to stderr; stdout carries listings.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let directive = filter_directive(config, std::env::var(EnvFilter::DEFAULT_ENV).ok());
    let env_filter =
        EnvFilter::try_new(&directive).map_err(|source| TelemetryError::EnvFilter {
            value: directive.clone(),
            source,
        })?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Subscriber)
}

/// Installs a Prometheus recorder for the pipeline counters.
pub fn install_metrics() -> Result<PrometheusHandle, TelemetryError> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|err| TelemetryError::Metrics(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(log_level: &str, verbose: bool) -> TelemetryConfig {
        TelemetryConfig {
            log_level: log_level.to_string(),
            verbose,
        }
    }

    #[test]
    fn verbose_overrides_rust_log_and_scopes_debug_to_workspace() {
        let directive = filter_directive(&config("warn", true), Some("error".to_string()));
        assert_eq!(directive, VERBOSE_DIRECTIVE);
        assert!(EnvFilter::try_new(&directive).is_ok());
    }

    #[test]
    fn rust_log_wins_over_configured_level() {
        assert_eq!(filter_directive(&config("info", false), Some("warn".to_string())), "warn");
        assert_eq!(filter_directive(&config("info", false), Some("  ".to_string())), "info");
        assert_eq!(filter_directive(&config("info", false), None), "info");
    }
}

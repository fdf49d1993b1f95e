mod search;

pub use search::{HistoryConfig, SearchConfig, SearchCriteria};

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level process settings, read from the environment once per run.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub search_config_path: PathBuf,
    pub http: HttpConfig,
    pub pacing: PacingConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let search_config_path =
            PathBuf::from(env::var("APP_SEARCH_CONFIG").unwrap_or_else(|_| "config.json".into()));
        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let http = HttpConfig {
            page_timeout: Duration::from_secs(env_number("APP_PAGE_TIMEOUT_SECS", 30)?),
            detail_timeout: Duration::from_secs(env_number("APP_DETAIL_TIMEOUT_SECS", 15)?),
            max_attempts: env_number("APP_FETCH_ATTEMPTS", 3)?.max(1) as u32,
            retry_delay: Duration::from_millis(env_number("APP_RETRY_DELAY_MS", 5_000)?),
            min_page_bytes: env_number("APP_MIN_PAGE_BYTES", 1_000)? as usize,
        };

        let pacing = PacingConfig {
            between_pages: env_window("APP_PAGE_PAUSE_MS", PauseWindow::millis(5_000, 8_000))?,
            between_neighborhoods: env_window(
                "APP_NEIGHBORHOOD_PAUSE_MS",
                PauseWindow::millis(10_000, 15_000),
            )?,
            between_details: env_window("APP_DETAIL_PAUSE_MS", PauseWindow::millis(2_000, 4_000))?,
        };

        Ok(Self {
            search_config_path,
            http,
            pacing,
            telemetry: TelemetryConfig {
                log_level,
                verbose: false,
            },
        })
    }
}

/// Outbound request behavior shared by result-page and detail-page fetches.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub page_timeout: Duration,
    pub detail_timeout: Duration,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub min_page_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            page_timeout: Duration::from_secs(30),
            detail_timeout: Duration::from_secs(15),
            max_attempts: 3,
            retry_delay: Duration::from_secs(5),
            min_page_bytes: 1_000,
        }
    }
}

/// Politeness pauses inserted between sequential requests.
#[derive(Debug, Clone, Default)]
pub struct PacingConfig {
    pub between_pages: PauseWindow,
    pub between_neighborhoods: PauseWindow,
    pub between_details: PauseWindow,
}

/// Inclusive range a pause duration is drawn from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PauseWindow {
    pub min: Duration,
    pub max: Duration,
}

impl PauseWindow {
    pub const fn millis(min: u64, max: u64) -> Self {
        Self {
            min: Duration::from_millis(min),
            max: Duration::from_millis(max),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.max.is_zero()
    }

    /// Parses `N` or `MIN-MAX` (milliseconds).
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (min, max) = match raw.split_once('-') {
            Some((min, max)) => (min.trim().parse().ok()?, max.trim().parse().ok()?),
            None => {
                let value = raw.parse().ok()?;
                (value, value)
            }
        };
        if min > max {
            return None;
        }
        Some(Self::millis(min, max))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    /// Debug output for this workspace's crates, taking priority over `RUST_LOG`.
    pub verbose: bool,
}

fn env_number(var: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidEnv { var, value }),
        Err(_) => Ok(default),
    }
}

fn env_window(var: &'static str, default: PauseWindow) -> Result<PauseWindow, ConfigError> {
    match env::var(var) {
        Ok(value) => PauseWindow::parse(&value).ok_or(ConfigError::InvalidEnv { var, value }),
        Err(_) => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    NotFound {
        path: PathBuf,
    },
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    InvalidValue {
        field: &'static str,
        value: String,
    },
    NoNeighborhoods,
    UnknownNeighborhood {
        name: String,
        known: Vec<String>,
    },
    InvalidEnv {
        var: &'static str,
        value: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NotFound { path } => {
                write!(f, "search configuration {} not found", path.display())
            }
            ConfigError::Read { path, .. } => {
                write!(f, "unable to read search configuration {}", path.display())
            }
            ConfigError::Parse { path, source } => {
                write!(f, "invalid JSON in {}: {}", path.display(), source)
            }
            ConfigError::InvalidValue { field, value } => {
                write!(f, "invalid value '{}' for {}", value, field)
            }
            ConfigError::NoNeighborhoods => write!(f, "no neighborhoods configured"),
            ConfigError::UnknownNeighborhood { name, known } => write!(
                f,
                "neighborhood '{}' is not configured (known: {})",
                name,
                known.join(", ")
            ),
            ConfigError::InvalidEnv { var, value } => {
                write!(f, "{} has an invalid value '{}'", var, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            _ => None,
        }
    }
}

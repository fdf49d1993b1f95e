use std::fmt::Debug;
use std::thread;
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use tokio::runtime::Runtime;
use tracing::warn;

use crate::config::{HttpConfig, PauseWindow};

const USER_AGENTS: [&str; 3] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 12_6) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },
    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("{url} returned only {bytes} bytes (likely a block page)")]
    Blocked { url: String, bytes: usize },
    #[error("unable to build HTTP client: {0}")]
    Client(String),
}

impl FetchError {
    /// Whether another attempt at the same URL could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout { .. } | FetchError::Transport { .. } => true,
            FetchError::Status { status, .. } => !matches!(status, 403 | 404),
            FetchError::Blocked { .. } | FetchError::Client(_) => false,
        }
    }
}

/// Blocking page source. One call is one outbound request.
pub trait PageFetcher: Debug {
    fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError>;
}

/// Bounded retry with a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &HttpConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            delay: config.retry_delay,
        }
    }

    pub fn run<T, Op>(&self, url: &str, mut op: Op) -> Result<T, FetchError>
    where
        Op: FnMut() -> Result<T, FetchError>,
    {
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    warn!(url, attempt, max_attempts = self.max_attempts, error = %err, "fetch failed, retrying");
                    if !self.delay.is_zero() {
                        thread::sleep(self.delay);
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&HttpConfig::default())
    }
}

/// Sleeps for a random duration inside `window`.
pub(crate) fn pause(window: PauseWindow) {
    if window.is_zero() {
        return;
    }
    let min = window.min.as_millis() as u64;
    let max = window.max.as_millis() as u64;
    let millis = rand::thread_rng().gen_range(min..=max);
    thread::sleep(Duration::from_millis(millis));
}

/// reqwest client driven by an owned runtime so the pipeline stays synchronous.
pub struct HttpFetcher {
    client: reqwest::Client,
    runtime: Runtime,
    min_body_bytes: usize,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("es-ES,es;q=0.9"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|err| FetchError::Client(err.to_string()))?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| FetchError::Client(err.to_string()))?;

        Ok(Self {
            client,
            runtime,
            min_body_bytes: config.min_page_bytes,
        })
    }

    fn classify(url: &str, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

impl Debug for HttpFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("min_body_bytes", &self.min_body_bytes)
            .finish_non_exhaustive()
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        let user_agent = USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(USER_AGENTS[0]);

        self.runtime.block_on(async {
            let response = self
                .client
                .get(url)
                .header(USER_AGENT, user_agent)
                .timeout(timeout)
                .send()
                .await
                .map_err(|err| Self::classify(url, err))?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }

            let body = response
                .text()
                .await
                .map_err(|err| Self::classify(url, err))?;
            if body.len() < self.min_body_bytes {
                return Err(FetchError::Blocked {
                    url: url.to_string(),
                    bytes: body.len(),
                });
            }
            Ok(body)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            delay: Duration::ZERO,
        }
    }

    fn status(code: u16) -> FetchError {
        FetchError::Status {
            url: "https://example.test".to_string(),
            status: code,
        }
    }

    #[test]
    fn classifies_retryable_errors() {
        assert!(status(429).is_retryable());
        assert!(status(503).is_retryable());
        assert!(!status(403).is_retryable());
        assert!(!status(404).is_retryable());
        assert!(FetchError::Timeout {
            url: "u".to_string()
        }
        .is_retryable());
        assert!(!FetchError::Blocked {
            url: "u".to_string(),
            bytes: 12
        }
        .is_retryable());
    }

    #[test]
    fn retry_succeeds_after_transient_failures() {
        let calls = Cell::new(0);
        let result = policy(3).run("u", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(status(503))
            } else {
                Ok("body")
            }
        });
        assert_eq!(result, Ok("body"));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn retry_gives_up_after_max_attempts() {
        let calls = Cell::new(0);
        let result: Result<(), _> = policy(3).run("u", || {
            calls.set(calls.get() + 1);
            Err(status(500))
        });
        assert_eq!(result, Err(status(500)));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn terminal_errors_are_not_retried() {
        let calls = Cell::new(0);
        let result: Result<(), _> = policy(3).run("u", || {
            calls.set(calls.get() + 1);
            Err(status(404))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn zero_window_does_not_sleep() {
        let started = std::time::Instant::now();
        pause(PauseWindow::default());
        assert!(started.elapsed() < Duration::from_millis(50));
    }
}

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_JUDGE0_URL: &str = "http://judge0-server:2358";
const DEFAULT_WORKER_CONCURRENCY: usize = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    MissingVar(&'static str),

    #[error("invalid PORT: {0}")]
    InvalidPort(String),

    #[error("invalid MODE: {0}")]
    InvalidMode(String),

    #[error("invalid WORKER_CONCURRENCY: {0}")]
    InvalidConcurrency(String),
}

/// Which parts of the process to run. `Both` embeds the worker pool in the
/// API server process; `Worker` and `Api` allow the two to scale separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Api,
    Worker,
    Both,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Mode::Api => write!(f, "api"),
            Mode::Worker => write!(f, "worker"),
            Mode::Both => write!(f, "both"),
        }
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "api" => Ok(Mode::Api),
            "worker" => Ok(Mode::Worker),
            "" | "both" => Ok(Mode::Both),
            other => Err(ConfigError::InvalidMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub root_encryption_key: String,
    /// Public base URL of this gateway, used to build OAuth callback URLs.
    pub base_url: String,
    pub port: u16,
    pub mode: Mode,
    /// Fallback Judge0 URL when a tenant has no code-provider override.
    pub judge0_url: String,
    pub worker_concurrency: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// | Variable              | Required | Default                      |
    /// |-----------------------|----------|------------------------------|
    /// | `DATABASE_URL`        | yes      | —                            |
    /// | `ROOT_ENCRYPTION_KEY` | yes      | — (64 hex chars)             |
    /// | `TUSKER_BASE_URL`     | no       | `http://localhost:<port>`    |
    /// | `PORT`                | no       | `8080`                       |
    /// | `MODE`                | no       | `both` (`api` / `worker`)    |
    /// | `JUDGE0_URL`          | no       | `http://judge0-server:2358`  |
    /// | `WORKER_CONCURRENCY`  | no       | `5`                          |
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingVar("DATABASE_URL"))?;
        let root_encryption_key = std::env::var("ROOT_ENCRYPTION_KEY")
            .map_err(|_| ConfigError::MissingVar("ROOT_ENCRYPTION_KEY"))?;

        let port = match std::env::var("PORT") {
            Ok(p) => p.parse().map_err(|_| ConfigError::InvalidPort(p))?,
            Err(_) => DEFAULT_PORT,
        };

        let base_url = std::env::var("TUSKER_BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}", port));

        let mode = std::env::var("MODE").unwrap_or_default().parse()?;

        let judge0_url =
            std::env::var("JUDGE0_URL").unwrap_or_else(|_| DEFAULT_JUDGE0_URL.to_string());

        let worker_concurrency = match std::env::var("WORKER_CONCURRENCY") {
            Ok(n) => n
                .parse()
                .map_err(|_| ConfigError::InvalidConcurrency(n))?,
            Err(_) => DEFAULT_WORKER_CONCURRENCY,
        };

        Ok(Config {
            database_url,
            root_encryption_key,
            base_url,
            port,
            mode,
            judge0_url,
            worker_concurrency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_known_values() {
        assert_eq!("api".parse::<Mode>().unwrap(), Mode::Api);
        assert_eq!("worker".parse::<Mode>().unwrap(), Mode::Worker);
        assert_eq!("both".parse::<Mode>().unwrap(), Mode::Both);
        assert_eq!("".parse::<Mode>().unwrap(), Mode::Both);
        assert!("debug".parse::<Mode>().is_err());
    }
}

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod judge0;

pub use judge0::{Judge0Config, Judge0Provider};

#[derive(Debug, Error)]
pub enum CodeError {
    #[error("code execution request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("code provider returned HTTP {0}")]
    UpstreamStatus(u16),
}

/// The result of a single code execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Submission {
    pub token: String,
    pub stdout: String,
    pub stderr: String,
    pub compile_output: String,
    pub status: String,
    pub time: String,
    pub memory: i32,
}

/// The serialized form of a `code.execute` job stored in the jobs table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPayload {
    pub provider: String,
    pub source_code: String,
    pub language_id: i32,
    #[serde(default)]
    pub stdin: String,
}

/// The interface each code execution provider must implement.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn execute(
        &self,
        source_code: &str,
        language_id: i32,
        stdin: &str,
    ) -> Result<Submission, CodeError>;
}

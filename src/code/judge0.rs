use crate::code::{CodeError, Provider, Submission};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for a Judge0 CE instance. `url` is the base URL of the
/// server (e.g. `http://judge0-server:2358`); `auth_token` is sent as
/// X-Auth-Token when the instance has AUTHN_TOKEN configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Judge0Config {
    pub url: String,
    #[serde(default)]
    pub auth_token: String,
}

/// Calls the Judge0 CE REST API to execute source code.
pub struct Judge0Provider {
    url: String,
    auth_token: String,
    client: reqwest::Client,
}

impl Judge0Provider {
    pub fn new(config: Judge0Config) -> Self {
        Judge0Provider {
            url: config.url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Provider for Judge0Provider {
    /// Submits source code and waits synchronously for the result. Source and
    /// stdin are base64-encoded in the request; Judge0 returns stdout/stderr
    /// as base64 which is decoded before returning.
    async fn execute(
        &self,
        source_code: &str,
        language_id: i32,
        stdin: &str,
    ) -> Result<Submission, CodeError> {
        #[derive(Deserialize)]
        struct RawStatus {
            #[serde(default)]
            description: String,
        }

        #[derive(Deserialize)]
        struct RawSubmission {
            #[serde(default)]
            token: String,
            stdout: Option<String>,
            stderr: Option<String>,
            compile_output: Option<String>,
            time: Option<String>,
            memory: Option<i32>,
            #[serde(default = "default_status")]
            status: RawStatus,
        }

        fn default_status() -> RawStatus {
            RawStatus {
                description: String::new(),
            }
        }

        let mut body = json!({
            "source_code": STANDARD.encode(source_code),
            "language_id": language_id,
        });
        if !stdin.is_empty() {
            body["stdin"] = json!(STANDARD.encode(stdin));
        }

        let mut request = self
            .client
            .post(format!(
                "{}/submissions?base64_encoded=true&wait=true",
                self.url
            ))
            .timeout(REQUEST_TIMEOUT)
            .json(&body);
        if !self.auth_token.is_empty() {
            request = request.header("X-Auth-Token", self.auth_token.as_str());
        }

        let resp = request.send().await?;
        if resp.status().as_u16() >= 400 {
            return Err(CodeError::UpstreamStatus(resp.status().as_u16()));
        }

        let raw: RawSubmission = resp.json().await?;

        let mut submission = Submission {
            token: raw.token,
            status: raw.status.description,
            ..Submission::default()
        };
        submission.stdout = decode_output(raw.stdout);
        submission.stderr = decode_output(raw.stderr);
        submission.compile_output = decode_output(raw.compile_output);
        if let Some(time) = raw.time {
            submission.time = time;
        }
        if let Some(memory) = raw.memory {
            submission.memory = memory;
        }

        Ok(submission)
    }
}

fn decode_output(field: Option<String>) -> String {
    field
        .and_then(|encoded| STANDARD.decode(encoded.trim()).ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let provider = Judge0Provider::new(Judge0Config {
            url: "http://judge0:2358/".to_string(),
            auth_token: String::new(),
        });
        assert_eq!(provider.url, "http://judge0:2358");
    }

    #[test]
    fn decode_output_handles_missing_and_invalid_fields() {
        assert_eq!(decode_output(None), "");
        assert_eq!(decode_output(Some("aGVsbG8=".to_string())), "hello");
        assert_eq!(decode_output(Some("!!not base64!!".to_string())), "");
    }
}

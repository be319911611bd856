use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

// Caps the exponential curve: attempts beyond the sixth all wait ~a minute.
const MAX_BACKOFF_SECS: u64 = 64;

#[derive(Debug, Error, Clone)]
pub enum NetworkError {
    #[error("upstream returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("malformed response body: {0}")]
    Decode(String),
}

impl NetworkError {
    /// 429 and 5xx are transient upstream conditions, as is getting no
    /// response at all. Every other 4xx is a client error and retrying it
    /// would only repeat the mistake.
    fn is_retryable(&self) -> bool {
        match self {
            NetworkError::Status { status, .. } => *status == 429 || *status >= 500,
            NetworkError::Transport(_) => true,
            NetworkError::Decode(_) => false,
        }
    }
}

/// One raw HTTP attempt: status plus whatever JSON body came back. Error
/// bodies that are not JSON decode to `Null`, mirroring how the upstream
/// services report failures.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Value,
}

/// Transport seam under the retry loop, so the loop is testable with a
/// scripted sequence of outcomes.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    async fn post_json(
        &self,
        url: &str,
        body: &Value,
        bearer: Option<&str>,
    ) -> Result<RawResponse, NetworkError>;
}

pub struct ReqwestExecutor {
    http: reqwest::Client,
}

impl ReqwestExecutor {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for ReqwestExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RequestExecutor for ReqwestExecutor {
    async fn post_json(
        &self,
        url: &str,
        body: &Value,
        bearer: Option<&str>,
    ) -> Result<RawResponse, NetworkError> {
        let mut request = self.http.post(url).json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NetworkError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        Ok(RawResponse { status, body })
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            max_jitter: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// `2^attempt` seconds plus up to one second of jitter, the same curve
    /// every upstream caller of this service family uses.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let backoff_secs = 2u64.saturating_pow(attempt).min(MAX_BACKOFF_SECS);
        let jitter_ms = rand::thread_rng().gen_range(0..=self.max_jitter.as_millis() as u64);
        Duration::from_secs(backoff_secs) + Duration::from_millis(jitter_ms)
    }
}

/// Retry-with-exponential-backoff wrapper shared by every network call that
/// feeds the reminder pipeline. Transient upstream failures are retried up
/// to `max_attempts`; non-transient client errors fail immediately; after
/// exhaustion the last observed error is returned.
pub struct ResilientClient {
    executor: Box<dyn RequestExecutor>,
    policy: RetryPolicy,
}

impl ResilientClient {
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_executor(Box::new(ReqwestExecutor::new()), policy)
    }

    pub fn with_executor(executor: Box<dyn RequestExecutor>, policy: RetryPolicy) -> Self {
        Self { executor, policy }
    }

    pub async fn post_json<T: DeserializeOwned>(
        &self,
        url: &str,
        body: &Value,
        bearer: Option<&str>,
    ) -> Result<T, NetworkError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            let error = match self.executor.post_json(url, body, bearer).await {
                Ok(response) if (200..300).contains(&response.status) => {
                    return serde_json::from_value(response.body)
                        .map_err(|e| NetworkError::Decode(e.to_string()));
                }
                Ok(response) => NetworkError::Status {
                    message: error_message(&response.body, response.status),
                    status: response.status,
                },
                Err(error) => error,
            };

            if !error.is_retryable() {
                return Err(error);
            }

            if attempt + 1 < attempts {
                let delay = self.policy.backoff_delay(attempt);
                log::warn!(
                    "Request attempt {} failed, retrying in {:?}. [url = {}, error = {}]",
                    attempt + 1,
                    delay,
                    url,
                    error
                );
                tokio::time::sleep(delay).await;
            }
            last_error = Some(error);
        }

        Err(last_error.expect("At least one attempt was made."))
    }
}

/// FastAPI puts human-readable failures under `detail`, the node services
/// under `message`; fall back to the bare status line.
fn error_message(body: &Value, status: u16) -> String {
    body.get("detail")
        .or_else(|| body.get("message"))
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| format!("HTTP error! status: {status}"))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Executor that replays a prepared sequence of outcomes, one per
    /// attempt.
    #[derive(Clone)]
    pub(crate) struct ScriptedExecutor {
        outcomes: Arc<Mutex<VecDeque<Result<RawResponse, NetworkError>>>>,
        calls: Arc<Mutex<u32>>,
    }

    impl ScriptedExecutor {
        pub(crate) fn new(outcomes: Vec<Result<RawResponse, NetworkError>>) -> Self {
            Self {
                outcomes: Arc::new(Mutex::new(outcomes.into())),
                calls: Arc::new(Mutex::new(0)),
            }
        }

        pub(crate) fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl RequestExecutor for ScriptedExecutor {
        async fn post_json(
            &self,
            _url: &str,
            _body: &Value,
            _bearer: Option<&str>,
        ) -> Result<RawResponse, NetworkError> {
            *self.calls.lock().unwrap() += 1;
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(NetworkError::Transport(
                    "scripted executor ran out of outcomes".to_owned(),
                )))
        }
    }
}

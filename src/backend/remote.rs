//! Remote OpenAI-compatible chat-completions backend.

use crate::backend::errors::BackendError;
use crate::backend::models::{error_message, ChatCompletionRequest, ChatCompletionResponse, ChatMessage};
use crate::backend::{Backend, BackendKind};
use crate::config::RemoteConfig;
use reqwest::blocking::Client;
use reqwest::header::RETRY_AFTER;
use std::time::Duration;
use tracing::debug;

const NAME: &str = "remote";

pub struct RemoteBackend {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    referer: String,
    title: String,
    timeout: Duration,
}

impl RemoteBackend {
    pub fn new(config: &RemoteConfig, api_key: impl Into<String>) -> Result<Self, BackendError> {
        let timeout = config.timeout();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| BackendError::NotConfigured {
                backend: NAME.to_string(),
                message: err.to_string(),
            })?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: api_key.into(),
            referer: config.referer.clone(),
            title: config.title.clone(),
            timeout,
        })
    }

    /// Build from config, reading the API key from the configured variable.
    pub fn from_config(config: &RemoteConfig) -> Result<Self, BackendError> {
        let api_key = config.api_key().ok_or_else(|| BackendError::NotConfigured {
            backend: NAME.to_string(),
            message: format!("{} is not set", config.api_key_env),
        })?;
        Self::new(config, api_key)
    }

    fn transport_error(&self, err: reqwest::Error) -> BackendError {
        if err.is_timeout() {
            BackendError::Timeout {
                backend: NAME.to_string(),
                timeout: self.timeout,
            }
        } else if err.is_decode() || err.is_body() {
            BackendError::InvalidResponse {
                backend: NAME.to_string(),
                message: err.to_string(),
            }
        } else {
            BackendError::Connection {
                backend: NAME.to_string(),
                message: err.to_string(),
            }
        }
    }
}

impl Backend for RemoteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    fn name(&self) -> &str {
        NAME
    }

    fn invoke(
        &self,
        system: &str,
        user: &str,
        model_override: Option<&str>,
    ) -> Result<String, BackendError> {
        let model = model_override.unwrap_or(&self.model);
        let request = ChatCompletionRequest {
            model,
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            temperature: None,
            max_tokens: None,
        };
        debug!(backend = NAME, model, endpoint = %self.endpoint, "sending chat completion");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(&request)
            .send()
            .map_err(|err| self.transport_error(err))?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_retry_after);
        let body = response.text().map_err(|err| self.transport_error(err))?;
        classify_response(NAME, status, retry_after, &body)
    }

    fn test_connection(&self) -> bool {
        self.invoke("You are a connectivity check.", "Respond with: OK", None)
            .is_ok()
    }
}

/// Map an HTTP status and body to generated text or a classified error.
pub fn classify_response(
    backend: &str,
    status: u16,
    retry_after: Option<Duration>,
    body: &str,
) -> Result<String, BackendError> {
    match status {
        200..=299 => {
            let parsed: ChatCompletionResponse =
                serde_json::from_str(body).map_err(|err| BackendError::InvalidResponse {
                    backend: backend.to_string(),
                    message: err.to_string(),
                })?;
            parsed
                .into_content()
                .filter(|content| !content.trim().is_empty())
                .ok_or_else(|| BackendError::EmptyResponse {
                    backend: backend.to_string(),
                })
        }
        429 => {
            let message = error_message(body);
            let lowered = message.to_lowercase();
            Err(BackendError::RateLimited {
                backend: backend.to_string(),
                retry_after,
                quota_exhausted: lowered.contains("daily") || lowered.contains("quota"),
                message,
            })
        }
        400..=499 => Err(BackendError::Rejected {
            backend: backend.to_string(),
            status,
            message: error_message(body),
        }),
        500..=599 => Err(BackendError::Server {
            backend: backend.to_string(),
            status,
            message: error_message(body),
        }),
        _ => Err(BackendError::InvalidResponse {
            backend: backend.to_string(),
            message: format!("unexpected HTTP status {status}"),
        }),
    }
}

/// `Retry-After` in delta-seconds form. HTTP dates are ignored.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    value
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

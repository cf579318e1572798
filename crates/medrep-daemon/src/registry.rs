//! National registry client.
//!
//! The push orchestrator talks to the registry through the
//! [`RegistryClient`] trait so tests can swap in [`MockRegistry`] and drive
//! failure and concurrency scenarios without a network.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from a registry submission.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The registry answered with a non-success status.
    #[error("registry rejected the submission with status {status}: {message}")]
    Api {
        /// HTTP status code returned by the registry.
        status: u16,
        /// Response body, or a placeholder when it could not be read.
        message: String,
    },

    /// The request never completed (connect, timeout, TLS, DNS).
    #[error("registry transport error: {0}")]
    Transport(String),

    /// The registry answered 2xx but the body was not usable.
    #[error("registry response could not be parsed: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for RegistryError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

/// Submits finalized reports to the national registry.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Sends one report and returns the national id the registry assigned.
    async fn submit(&self, patient_name: &str, diagnosis: &str) -> Result<String, RegistryError>;

    /// Short label for logs.
    fn name(&self) -> &'static str;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitRequest<'a> {
    patient_name: &'a str,
    diagnosis: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    national_id: Option<String>,
}

/// Registry client backed by the real HTTP endpoint.
pub struct HttpRegistryClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRegistryClient {
    /// Creates a client for the registry at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Transport`] when the underlying HTTP client
    /// cannot be constructed.
    pub fn new(
        base_url: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, RegistryError> {
        let client = reqwest::Client::builder()
            .user_agent("medrep-daemon/registry-client")
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn submit(&self, patient_name: &str, diagnosis: &str) -> Result<String, RegistryError> {
        let url = format!("{}/submit", self.base_url);
        let payload = SubmitRequest {
            patient_name,
            diagnosis,
        };

        let response = self.client.post(&url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".to_string());
            return Err(RegistryError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: SubmitResponse = response
            .json()
            .await
            .map_err(|e| RegistryError::Parse(e.to_string()))?;
        match body.national_id {
            Some(id) if !id.is_empty() => Ok(id),
            _ => Err(RegistryError::Parse(
                "reply is missing nationalId".to_string(),
            )),
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[derive(Debug, Default)]
struct MockState {
    fail_with: Option<RegistryError>,
    calls: u32,
    issued: Vec<String>,
}

/// In-process registry that fabricates national ids.
///
/// Intended for tests and local development, so it is compiled
/// unconditionally.
#[derive(Debug, Default)]
pub struct MockRegistry {
    state: Mutex<MockState>,
}

impl MockRegistry {
    /// Creates a registry that accepts every submission.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent submission fail with `error`.
    pub fn fail_with(&self, error: RegistryError) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_with = Some(error);
        }
    }

    /// Clears a previously configured failure.
    pub fn succeed(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_with = None;
        }
    }

    /// Number of submissions attempted so far, including failed ones.
    #[must_use]
    pub fn calls(&self) -> u32 {
        self.state.lock().map(|s| s.calls).unwrap_or(0)
    }

    /// National ids handed out so far, in order.
    #[must_use]
    pub fn issued(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.issued.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RegistryClient for MockRegistry {
    async fn submit(&self, _patient_name: &str, _diagnosis: &str) -> Result<String, RegistryError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| RegistryError::Transport("mock registry lock poisoned".to_string()))?;
        state.calls += 1;
        if let Some(error) = &state.fail_with {
            return Err(error.clone());
        }
        let id = format!("NAT-{:06}", rand::thread_rng().gen_range(0..1_000_000));
        state.issued.push(id.clone());
        Ok(id)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

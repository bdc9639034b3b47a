use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::{Backoff, OllamaConfig};
use crate::inference::{InferenceError, InferenceRequest, OllamaBackend, VisionBackend};

/// How many times a request is attempted and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub attempts: u32,
    pub delay: Duration,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn from_config(config: &OllamaConfig) -> Self {
        Self {
            attempts: config.retry_attempts.max(1),
            delay: config.retry_delay(),
            backoff: config.backoff,
        }
    }

    /// Delay after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Linear => self.delay.saturating_mul(attempt.max(1)),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(1),
            backoff: Backoff::Fixed,
        }
    }
}

/// A successful inference and the number of attempts it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inference {
    pub description: String,
    pub attempts: u32,
}

#[derive(Clone)]
pub struct InferenceClient {
    backend: Arc<dyn VisionBackend>,
    policy: RetryPolicy,
    model: String,
    timeout: Duration,
}

impl InferenceClient {
    pub fn new(
        backend: Arc<dyn VisionBackend>,
        policy: RetryPolicy,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            backend,
            policy,
            model: model.into(),
            timeout,
        }
    }

    /// Builds a client talking to the Ollama endpoint described by `config`.
    pub fn from_config(config: &OllamaConfig) -> Result<Self, InferenceError> {
        let backend = OllamaBackend::new(config)?;
        Ok(Self::new(
            Arc::new(backend),
            RetryPolicy::from_config(config),
            config.model.clone(),
            config.timeout(),
        ))
    }

    pub fn backend(&self) -> &Arc<dyn VisionBackend> {
        &self.backend
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Describes one image with the configured model and timeout.
    pub fn describe(&self, image_bytes: &[u8], prompt: &str) -> Result<Inference, InferenceError> {
        self.infer(image_bytes, prompt, &self.model, self.timeout)
    }

    pub fn infer(
        &self,
        image_bytes: &[u8],
        prompt: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Inference, InferenceError> {
        let request = InferenceRequest::new(image_bytes, prompt, model, timeout);
        self.send(&request)
    }

    /// Sends the request, retrying transient failures. Returns the last failure
    /// once the attempt budget is spent.
    pub fn send(&self, request: &InferenceRequest) -> Result<Inference, InferenceError> {
        let attempts = self.policy.attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.backend.generate(request) {
                Ok(description) => {
                    if attempt > 1 {
                        debug!(attempt, "Inference succeeded after retry");
                    }
                    return Ok(Inference {
                        description,
                        attempts: attempt,
                    });
                }
                Err(e) if e.is_retryable() && attempt < attempts => {
                    let delay = self.policy.delay_after(attempt);
                    warn!(
                        attempt,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Inference attempt failed, retrying: {}",
                        e
                    );
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                    attempt += 1;
                }
                Err(e) => {
                    debug!(attempt, "Inference failed: {}", e);
                    return Err(e);
                }
            }
        }
    }

    pub fn check_connection(&self) -> bool {
        self.backend.check_connection()
    }

    pub fn list_models(&self) -> Result<Vec<String>, InferenceError> {
        self.backend.list_models()
    }
}

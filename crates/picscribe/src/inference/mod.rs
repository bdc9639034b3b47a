//! Vision-model inference: request types, the backend seam and the retrying client.

pub mod client;
pub mod error;
pub mod ollama;

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

pub use client::{Inference, InferenceClient, RetryPolicy};
pub use error::InferenceError;
pub use ollama::{ApiFlavor, OllamaBackend};

/// One request to the vision endpoint. The image is already base64-encoded.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub image_base64: String,
    pub prompt: String,
    pub model: String,
    pub timeout: Duration,
}

impl InferenceRequest {
    pub fn new(
        image_bytes: &[u8],
        prompt: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            image_base64: STANDARD.encode(image_bytes),
            prompt: prompt.into(),
            model: model.into(),
            timeout,
        }
    }
}

/// A service that turns an image and a prompt into text.
///
/// One call to [`VisionBackend::generate`] is exactly one attempt; retries live in
/// [`InferenceClient`].
pub trait VisionBackend: Send + Sync {
    fn generate(&self, request: &InferenceRequest) -> Result<String, InferenceError>;

    /// Lightweight reachability probe.
    fn check_connection(&self) -> bool;

    fn list_models(&self) -> Result<Vec<String>, InferenceError>;

    /// Endpoint shown in logs and error messages.
    fn endpoint(&self) -> &str;
}

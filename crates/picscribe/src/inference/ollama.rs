//! Blocking HTTP backend for an Ollama server.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::OllamaConfig;
use crate::inference::{InferenceError, InferenceRequest, VisionBackend};

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_BODY_IN_ERROR: usize = 200;

/// Request/response shape expected by the configured endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFlavor {
    /// `/api/generate`: `{prompt, images}` in, `{response}` out.
    Generate,
    /// `/api/chat`: `{messages: [...]}` in, `{message: {content}}` out.
    Chat,
}

impl ApiFlavor {
    pub fn from_endpoint(endpoint: &str) -> Self {
        if endpoint.trim_end_matches('/').ends_with("/api/chat") {
            ApiFlavor::Chat
        } else {
            ApiFlavor::Generate
        }
    }
}

pub struct OllamaBackend {
    client: Client,
    endpoint: String,
    base_url: String,
    flavor: ApiFlavor,
}

impl OllamaBackend {
    pub fn new(config: &OllamaConfig) -> Result<Self, InferenceError> {
        let endpoint = config.endpoint.trim().to_string();
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.timeout())
            .build()
            .map_err(|e| InferenceError::Unreachable {
                endpoint: endpoint.clone(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url(&endpoint),
            flavor: ApiFlavor::from_endpoint(&endpoint),
            endpoint,
        })
    }

    pub fn flavor(&self) -> ApiFlavor {
        self.flavor
    }

    fn tags_url(&self) -> String {
        format!("{}/api/tags", self.base_url)
    }

    fn map_send_error(&self, error: reqwest::Error, timeout: Duration) -> InferenceError {
        if error.is_timeout() {
            InferenceError::Timeout { timeout }
        } else {
            InferenceError::Unreachable {
                endpoint: self.endpoint.clone(),
                reason: error.to_string(),
            }
        }
    }
}

impl VisionBackend for OllamaBackend {
    fn generate(&self, request: &InferenceRequest) -> Result<String, InferenceError> {
        let body = build_body(self.flavor, request);

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(request.timeout)
            .json(&body)
            .send()
            .map_err(|e| self.map_send_error(e, request.timeout))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| self.map_send_error(e, request.timeout))?;

        parse_response(&self.endpoint, status, &text, self.flavor)
    }

    fn check_connection(&self) -> bool {
        match self.client.get(self.tags_url()).timeout(PROBE_TIMEOUT).send() {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("Connection check failed: {}", e);
                false
            }
        }
    }

    fn list_models(&self) -> Result<Vec<String>, InferenceError> {
        let response = self
            .client
            .get(self.tags_url())
            .timeout(PROBE_TIMEOUT)
            .send()
            .map_err(|e| self.map_send_error(e, PROBE_TIMEOUT))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| self.map_send_error(e, PROBE_TIMEOUT))?;
        if !status.is_success() {
            return Err(classify_status(&self.endpoint, status, &text));
        }

        parse_models(&text)
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Strips the `/api/...` path so sibling routes like `/api/tags` can be addressed.
fn base_url(endpoint: &str) -> String {
    let trimmed = endpoint.trim_end_matches('/');
    match trimmed.find("/api/") {
        Some(index) => trimmed[..index].to_string(),
        None => trimmed.to_string(),
    }
}

fn build_body(flavor: ApiFlavor, request: &InferenceRequest) -> Value {
    match flavor {
        ApiFlavor::Generate => json!({
            "model": request.model,
            "prompt": request.prompt,
            "images": [request.image_base64],
            "stream": false,
        }),
        ApiFlavor::Chat => json!({
            "model": request.model,
            "messages": [{
                "role": "user",
                "content": request.prompt,
                "images": [request.image_base64],
            }],
            "stream": false,
        }),
    }
}

fn classify_status(endpoint: &str, status: StatusCode, body: &str) -> InferenceError {
    if status == StatusCode::NOT_FOUND {
        InferenceError::Unreachable {
            endpoint: endpoint.to_string(),
            reason: "endpoint returned 404 Not Found".to_string(),
        }
    } else if status.is_server_error() {
        InferenceError::ServerError {
            status: status.as_u16(),
            body: truncate(body),
        }
    } else {
        InferenceError::MalformedResponse(format!(
            "unexpected status {}: {}",
            status.as_u16(),
            truncate(body)
        ))
    }
}

/// Turns a raw HTTP reply into a description or a classified error.
pub(crate) fn parse_response(
    endpoint: &str,
    status: StatusCode,
    body: &str,
    flavor: ApiFlavor,
) -> Result<String, InferenceError> {
    if !status.is_success() {
        return Err(classify_status(endpoint, status, body));
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|e| InferenceError::MalformedResponse(format!("invalid JSON: {}", e)))?;

    if let Some(error) = value.get("error").and_then(Value::as_str) {
        return Err(InferenceError::MalformedResponse(error.to_string()));
    }

    let text = match flavor {
        ApiFlavor::Generate => value.get("response"),
        ApiFlavor::Chat => value.get("message").and_then(|m| m.get("content")),
    }
    .and_then(Value::as_str)
    .map(str::trim)
    .unwrap_or_default();

    if text.is_empty() {
        return Err(InferenceError::MalformedResponse(
            "response carried no description".to_string(),
        ));
    }

    Ok(text.to_string())
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

fn parse_models(body: &str) -> Result<Vec<String>, InferenceError> {
    let tags: TagsResponse = serde_json::from_str(body)
        .map_err(|e| InferenceError::MalformedResponse(format!("invalid tags JSON: {}", e)))?;
    Ok(tags.models.into_iter().map(|m| m.name).collect())
}

fn truncate(body: &str) -> String {
    if body.len() <= MAX_BODY_IN_ERROR {
        return body.to_string();
    }
    let mut end = MAX_BODY_IN_ERROR;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

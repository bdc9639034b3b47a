#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use picscribe::inference::{InferenceError, InferenceRequest, VisionBackend};

/// Vision backend that replays scripted replies, then falls back to a fixed
/// description.
pub struct FakeBackend {
    script: Mutex<VecDeque<Result<String, InferenceError>>>,
    fallback: Option<String>,
    calls: AtomicU32,
    prompts: Mutex<Vec<String>>,
}

impl FakeBackend {
    /// Always answers with `description`.
    pub fn describing(description: &str) -> Self {
        Self::scripted(vec![], Some(description))
    }

    pub fn scripted(script: Vec<Result<String, InferenceError>>, fallback: Option<&str>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: fallback.map(str::to_string),
            calls: AtomicU32::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl VisionBackend for FakeBackend {
    fn generate(&self, request: &InferenceRequest) -> Result<String, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt.clone());
        assert!(!request.image_base64.is_empty(), "empty image payload");

        if let Some(reply) = self.script.lock().unwrap().pop_front() {
            return reply;
        }
        match &self.fallback {
            Some(text) => Ok(text.clone()),
            None => Err(InferenceError::MalformedResponse("script exhausted".to_string())),
        }
    }

    fn check_connection(&self) -> bool {
        true
    }

    fn list_models(&self) -> Result<Vec<String>, InferenceError> {
        Ok(vec!["llava:latest".to_string()])
    }

    fn endpoint(&self) -> &str {
        "fake://vision"
    }
}

pub fn unreachable() -> InferenceError {
    InferenceError::Unreachable {
        endpoint: "fake://vision".to_string(),
        reason: "connection refused".to_string(),
    }
}

pub fn timeout() -> InferenceError {
    InferenceError::Timeout {
        timeout: Duration::from_secs(30),
    }
}

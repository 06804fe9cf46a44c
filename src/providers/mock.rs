/*!
 * Mock provider implementations for testing.
 *
 * This module provides mock providers that simulate different behaviors:
 * - `MockProvider::working()` - Echoes the text back, or applies a custom translation
 * - `MockProvider::intermittent(n)` - Fails every n-th request with a 503
 * - `MockProvider::failing()` - Always fails with a transient error
 * - `MockProvider::rejecting()` - Always fails with an authentication error
 *
 * The mock reads the text to translate out of the user prompt, so whatever it
 * returns goes through the same sanitising and validation as a real answer.
 */

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{CompletionRequest, CompletionResponse, Provider};
use crate::errors::ProviderError;
use crate::translation::placeholders;
use crate::translation::prompts::text_to_translate;

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds; echoes the text unless a custom response is set
    Working,
    /// Fails every Nth request with a transient error
    Intermittent { fail_every: usize },
    /// Always fails with a transient server error
    Failing,
    /// Always fails with an authentication error
    Rejecting,
    /// Returns an empty response
    Empty,
    /// Returns the text with every tag removed
    DropTags,
    /// Simulates a slow response (for timeout testing)
    Slow { delay_ms: u64 },
}

/// Mock provider for testing translation behavior
#[derive(Debug)]
pub struct MockProvider {
    /// Behavior mode
    behavior: MockBehavior,
    /// Requests received, shared between clones
    request_count: Arc<AtomicUsize>,
    /// Requests currently being answered
    active: Arc<AtomicUsize>,
    /// Highest number of simultaneous requests seen
    peak_active: Arc<AtomicUsize>,
    /// Texts currently being answered
    active_texts: Arc<Mutex<HashSet<String>>>,
    /// Requests whose text was already being answered
    overlapping: Arc<AtomicUsize>,
    /// Custom translation of the source text (optional)
    custom_response: Option<fn(&str) -> String>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            active: Arc::new(AtomicUsize::new(0)),
            peak_active: Arc::new(AtomicUsize::new(0)),
            active_texts: Arc::new(Mutex::new(HashSet::new())),
            overlapping: Arc::new(AtomicUsize::new(0)),
            custom_response: None,
        }
    }

    /// Create a working mock provider that echoes its input
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create an intermittently failing mock provider
    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every })
    }

    /// Create a failing mock provider that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create a mock whose every request is refused
    pub fn rejecting() -> Self {
        Self::new(MockBehavior::Rejecting)
    }

    /// Create a mock that returns empty responses
    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    /// Create a mock that loses all tags
    pub fn drop_tags() -> Self {
        Self::new(MockBehavior::DropTags)
    }

    /// Create a mock that waits before echoing
    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Set a custom translation of the source text
    pub fn with_custom_response(mut self, generator: fn(&str) -> String) -> Self {
        self.custom_response = Some(generator);
        self
    }

    /// Number of requests received so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Highest number of requests answered at the same time
    pub fn peak_concurrency(&self) -> usize {
        self.peak_active.load(Ordering::SeqCst)
    }

    /// Number of requests that arrived while the same text was already being answered
    pub fn overlapping_requests(&self) -> usize {
        self.overlapping.load(Ordering::SeqCst)
    }

    fn translate(&self, text: &str) -> String {
        match self.custom_response {
            Some(generator) => generator(text),
            None => text.to_string(),
        }
    }

    async fn respond(&self, count: usize, text: &str) -> Result<String, ProviderError> {
        match self.behavior {
            MockBehavior::Working => Ok(self.translate(text)),

            MockBehavior::Intermittent { fail_every } => {
                if fail_every > 0 && count % fail_every == fail_every - 1 {
                    Err(ProviderError::ApiError {
                        message: format!("Simulated intermittent failure (request #{})", count + 1),
                        status_code: 503,
                    })
                } else {
                    Ok(self.translate(text))
                }
            }

            MockBehavior::Failing => Err(ProviderError::ApiError {
                message: "Simulated provider failure".to_string(),
                status_code: 500,
            }),

            MockBehavior::Rejecting => Err(ProviderError::AuthenticationError(
                "Simulated invalid API key".to_string(),
            )),

            MockBehavior::Empty => Ok(String::new()),

            MockBehavior::DropTags => Ok(placeholders::strip_tokens(&self.translate(text))),

            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                Ok(self.translate(text))
            }
        }
    }
}

impl Clone for MockProvider {
    fn clone(&self) -> Self {
        Self {
            behavior: self.behavior,
            request_count: Arc::clone(&self.request_count),
            active: Arc::clone(&self.active),
            peak_active: Arc::clone(&self.peak_active),
            active_texts: Arc::clone(&self.active_texts),
            overlapping: Arc::clone(&self.overlapping),
            custom_response: self.custom_response,
        }
    }
}

// Releases the request's slot even when the caller times out and drops the call
struct ActiveRequest<'a> {
    provider: &'a MockProvider,
    text: String,
}

impl Drop for ActiveRequest<'_> {
    fn drop(&mut self) {
        self.provider.active_texts.lock().remove(&self.text);
        self.provider.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        let text = text_to_translate(&request.prompt).to_string();

        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_active.fetch_max(now_active, Ordering::SeqCst);
        if !self.active_texts.lock().insert(text.clone()) {
            self.overlapping.fetch_add(1, Ordering::SeqCst);
        }

        let _active = ActiveRequest {
            provider: self,
            text: text.clone(),
        };
        let result = self.respond(count, &text).await;

        result.map(|translated| CompletionResponse {
            input_tokens: request.prompt.len() as u64,
            output_tokens: translated.len() as u64,
            text: translated,
        })
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        match self.behavior {
            MockBehavior::Rejecting => Err(ProviderError::AuthenticationError(
                "Simulated invalid API key".to_string(),
            )),
            _ => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock"
    }
}

/*!
 * Provider implementations for different translation services.
 *
 * This module contains client implementations for the LLM providers:
 * - Ollama: Local LLM server
 * - Anthropic: Anthropic Messages API
 * - Mock: scripted provider for tests and dry runs
 */

use async_trait::async_trait;
use std::fmt::Debug;

use crate::errors::ProviderError;

pub mod anthropic;
pub mod mock;
pub mod ollama;

/// A single completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// System prompt
    pub system: String,
    /// User message
    pub prompt: String,
    /// Maximum number of tokens to generate
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

/// Text returned by a provider
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionResponse {
    /// Generated text
    pub text: String,
    /// Prompt tokens, when reported
    pub input_tokens: u64,
    /// Generated tokens, when reported
    pub output_tokens: u64,
}

/// Common trait for all LLM providers
///
/// This trait defines the interface that all provider implementations must follow,
/// allowing them to be used interchangeably behind a `dyn Provider`.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Complete a request using this provider
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError>;

    /// Test the connection to the provider
    async fn test_connection(&self) -> Result<(), ProviderError>;

    /// Provider name for logs and job records
    fn name(&self) -> &str;

    /// Model used for completions
    fn model(&self) -> &str;
}

/// Classify a transport error
pub(crate) fn map_request_error(error: reqwest::Error, timeout_ms: u64) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout(timeout_ms)
    } else if error.is_connect() {
        ProviderError::ConnectionError(error.to_string())
    } else if error.is_decode() {
        ProviderError::ParseError(error.to_string())
    } else {
        ProviderError::RequestFailed(error.to_string())
    }
}

/// Classify an unsuccessful HTTP status
pub(crate) fn map_status_error(status_code: u16, message: String) -> ProviderError {
    match status_code {
        401 | 403 => ProviderError::AuthenticationError(message),
        429 => ProviderError::RateLimitExceeded(message),
        _ => ProviderError::ApiError {
            status_code,
            message,
        },
    }
}

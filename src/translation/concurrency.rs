/*!
 * Provider-specific concurrency tuning.
 *
 * Local servers take many parallel requests and never rate limit; hosted APIs
 * want fewer parallel requests and longer timeouts.
 */

use crate::app_config::TranslationProvider;

/// Provider-specific concurrency profile with tuned defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    /// Maximum concurrent requests
    pub max_concurrent_requests: usize,
    /// Seconds allowed for one translation call
    pub call_timeout_secs: u64,
}

impl ProviderProfile {
    /// Get the profile for a given provider
    pub fn for_provider(provider: TranslationProvider) -> Self {
        match provider {
            TranslationProvider::Ollama => Self {
                max_concurrent_requests: 8,
                // Local models are slow on long fragments
                call_timeout_secs: 300,
            },
            TranslationProvider::Anthropic => Self {
                max_concurrent_requests: 5,
                call_timeout_secs: 120,
            },
            TranslationProvider::Mock => Self {
                max_concurrent_requests: 16,
                call_timeout_secs: 10,
            },
        }
    }

    /// Get effective concurrent requests, respecting any user override
    pub fn effective_concurrent_requests(&self, user_override: Option<usize>) -> usize {
        user_override
            .filter(|n| *n > 0)
            .unwrap_or(self.max_concurrent_requests)
    }
}

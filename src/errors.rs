/*!
 * Error types for the yahtwai application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions. Plumbing code uses
 * `anyhow` and converts into these at the job and CLI boundaries.
 */

use thiserror::Error;

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The provider refused the content
    #[error("Content rejected: {0}")]
    ContentRejected(String),

    /// The call did not complete in time
    #[error("Request timed out after {0} ms")]
    Timeout(u64),
}

impl ProviderError {
    /// Whether retrying the same call may succeed.
    ///
    /// Rate limits, network trouble, timeouts, server-side errors and malformed
    /// responses are transient. Authentication failures, content rejections and
    /// any other client error are permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::RequestFailed(_)
            | ProviderError::ParseError(_)
            | ProviderError::ConnectionError(_)
            | ProviderError::RateLimitExceeded(_)
            | ProviderError::Timeout(_) => true,
            ProviderError::ApiError { status_code, .. } => {
                *status_code == 408 || *status_code == 429 || *status_code >= 500
            }
            ProviderError::AuthenticationError(_) | ProviderError::ContentRejected(_) => false,
        }
    }
}

/// Why a single translation attempt did not produce an accepted translation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AttemptFailure {
    /// Another attempt may succeed
    #[error("{0}")]
    Transient(String),

    /// Retrying is pointless
    #[error("{0}")]
    Permanent(String),
}

impl AttemptFailure {
    /// Classify a provider error
    pub fn from_provider(error: &ProviderError) -> Self {
        let reason = format!("provider-error: {}", error);
        if error.is_transient() {
            AttemptFailure::Transient(reason)
        } else {
            AttemptFailure::Permanent(reason)
        }
    }

    /// Failure reason as recorded in the ledger
    pub fn reason(&self) -> &str {
        match self {
            AttemptFailure::Transient(reason) | AttemptFailure::Permanent(reason) => reason,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, AttemptFailure::Transient(_))
    }
}

/// Errors raised while parsing HTML input
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// The input contains no markup at all
    #[error("Document is empty")]
    Empty,

    /// A tag was opened with `<` but never closed with `>`
    #[error("Unterminated tag starting on line {line}")]
    UnterminatedTag {
        /// 1-based line number
        line: usize,
    },

    /// A comment was opened but never closed
    #[error("Unterminated comment starting on line {line}")]
    UnterminatedComment {
        /// 1-based line number
        line: usize,
    },

    /// A close tag does not match the innermost open element
    #[error("Mismatched close tag </{found}> on line {line}, expected </{expected}>")]
    MismatchedTag {
        /// Name of the element that is open
        expected: String,
        /// Name found in the close tag
        found: String,
        /// 1-based line number
        line: usize,
    },

    /// A close tag appeared with no matching open element
    #[error("Unexpected close tag </{name}> on line {line}")]
    UnexpectedCloseTag {
        /// Tag name
        name: String,
        /// 1-based line number
        line: usize,
    },

    /// An element was still open at end of input
    #[error("Element <{name}> opened on line {line} is never closed")]
    UnclosedElement {
        /// Tag name
        name: String,
        /// 1-based line number where it was opened
        line: usize,
    },

    /// The root element carries no `lang` attribute
    #[error("Document does not declare a language (<html lang=\"...\"> is required)")]
    MissingLanguage,
}

/// Errors raised while rebuilding the output document
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReassembleError {
    /// Some units are neither validated nor permanently failed
    #[error("Job is incomplete: {remaining} unit(s) not terminal (first: {first_unit})")]
    IncompleteJob {
        /// Number of non-terminal units
        remaining: usize,
        /// Id of the first non-terminal unit
        first_unit: String,
    },

    /// A rebuilt run could not be parsed back into nodes
    #[error("Rebuilt content for {path} is not well-formed: {source}")]
    Fragment {
        /// Structural path of the run
        path: String,
        /// Underlying parse failure
        source: ParseError,
    },
}

/// Job-level errors. Only parse and storage failures abort a job.
#[derive(Error, Debug)]
pub enum JobError {
    /// The source document is malformed
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// The ledger could not be read or written
    #[error("Ledger storage error: {0}")]
    Storage(String),

    /// Output was requested before every unit became terminal
    #[error("Reassembly error: {0}")]
    Reassemble(#[from] ReassembleError),
}

impl JobError {
    /// Wrap a storage failure
    pub fn storage(error: anyhow::Error) -> Self {
        JobError::Storage(format!("{:#}", error))
    }
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from HTML parsing
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Error from a translation job
    #[error("Job error: {0}")]
    Job(#[from] JobError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}

/*!
 * # YAHTwAI - Yet Another HTML Translator with AI
 *
 * A Rust library for translating long HTML documents with LLMs while keeping
 * their structure byte-for-byte intact.
 *
 * ## Features
 *
 * - Split documents into translation units at block and sentence boundaries
 * - Replace inline markup with placeholders and restore the exact source tags
 * - Translate using various AI providers:
 *   - Ollama (local LLM)
 *   - Anthropic API
 * - Validate every answer and retry with bounded backoff
 * - Resume interrupted jobs from a SQLite ledger
 * - ISO 639-1 and ISO 639-2 language code support
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `document`: HTML parsing and the node tree
 * - `translation`: chunking, context, invocation, scheduling and reassembly:
 *   - `translation::chunker`: document to units
 *   - `translation::scheduler`: bounded parallel retry loop
 *   - `translation::reassembler`: units back to a document
 *   - `translation::job`: one document in one target language
 * - `validation`: answer checks (placeholders, length, repetition, script)
 * - `ledger`: durable per-unit status for resume
 * - `database`: SQLite connection, schema and repository behind the ledger
 * - `providers`: Client implementations for various LLM providers
 * - `app_config`: Configuration management
 * - `app_controller`: Main application controller
 * - `file_utils`: File system operations
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 */

// Global lints configuration
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod database;
pub mod document;
pub mod errors;
pub mod file_utils;
pub mod language_utils;
pub mod ledger;
pub mod providers;
pub mod translation;
pub mod validation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use document::{parse_document, Document};
pub use errors::{AppError, AttemptFailure, JobError, ParseError, ProviderError, ReassembleError};
pub use language_utils::{get_language_name, language_codes_match};
pub use ledger::{LedgerStore, SqliteLedger};
pub use translation::{chunk, reassemble, Job, JobConfig, JobReport, Unit, UnitStatus};
pub use validation::{Validation, Validator};

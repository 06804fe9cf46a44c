/*!
 * Chunked HTML translation pipeline.
 *
 * - `placeholders`: attribute-free stand-ins for inline markup
 * - `unit`: translation units and their stable ids
 * - `chunker`: splits a document into units without cutting through markup
 * - `context`: surrounding text sent along with each unit
 * - `prompts`: system and user prompts
 * - `invoker`: one validated, recorded attempt per call
 * - `scheduler`: bounded parallel retry loop
 * - `reassembler`: rebuilds the output document
 * - `job`: ties a document, its units and the ledger together
 * - `concurrency`: per-provider defaults
 */

pub mod chunker;
pub mod concurrency;
pub mod context;
pub mod invoker;
pub mod job;
pub mod placeholders;
pub mod prompts;
pub mod reassembler;
pub mod scheduler;
pub mod unit;

pub use chunker::{chunk, ChunkPlan, Chunker, ChunkerConfig, DocumentSkeleton};
pub use context::{ContextConfig, ContextWindow, TranslationSnapshot, UnitContext};
pub use invoker::{AttemptOutcome, Invoker, ProviderTranslator, RetryConfig, RetryPolicy, Translator};
pub use job::{Job, JobConfig, JobInput, JobReport, UnitFailure};
pub use prompts::PromptTemplate;
pub use reassembler::{reassemble, Reassembler};
pub use scheduler::{CancellationFlag, Scheduler, SchedulerConfig};
pub use unit::{Unit, UnitKind, UnitStatus};

/*!
 * Common test utilities for the yahtwai test suite
 */

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;

use yahtwai::ledger::{LedgerStore, SqliteLedger};
use yahtwai::providers::mock::MockProvider;
use yahtwai::translation::{
    CancellationFlag, Job, JobConfig, JobInput, JobReport, PromptTemplate, ProviderTranslator, RetryConfig,
};

/// A small book chapter with inline markup, a comment, a script, a widget and
/// a foreign-language quote
pub const SAMPLE_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Chapter One</title>
<style>p { margin: 0 }</style>
</head>
<body>
<!-- generated from chapter-1.md -->
<h1 id="top">The Lighthouse</h1>
<p class="lead">Hello, <b>world</b>.</p>
<p>The keeper climbed <em>two hundred</em> steps every evening.<br>He never counted them aloud.</p>
<blockquote lang="la"><p>Lux in tenebris.</p></blockquote>
<div class="choice"><button type="button">Continue reading</button></div>
<script>var pages = 12;</script>
<p>See <a href="/notes#n1" title="Note one">the notes</a> for details.</p>
</body>
</html>
"#;

/// Build a document whose body holds one paragraph of `sentences` distinct sentences
pub fn long_document(sentences: usize) -> String {
    let words = [
        "harbor", "lantern", "storm", "gull", "rope", "anchor", "tide", "signal", "cliff", "keeper",
        "window", "boat", "mist", "stair", "bell", "shore",
    ];
    let mut paragraph = String::new();
    for i in 0..sentences {
        let a = words[i % words.len()];
        let b = words[(i * 7 + 3) % words.len()];
        paragraph.push_str(&format!(
            "Sentence {} tells how the {} met the {} near <i>page {}</i> of the log. ",
            i, a, b, i
        ));
    }
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head><title>Long</title></head>\n<body>\n<p>{}</p>\n</body>\n</html>\n",
        paragraph.trim_end()
    )
}

/// Route library logs to the test output; `RUST_LOG=debug` shows scheduling
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Job configuration with short retry delays
pub fn fast_config() -> JobConfig {
    let mut config = JobConfig::default();
    config.retry = RetryConfig {
        max_attempts: 3,
        base_delay_ms: 1,
        max_delay_ms: 5,
        jitter_ms: 0,
        call_timeout_secs: 5,
        call_timeout_ms: None,
    };
    config.scheduler.max_concurrent_requests = 4;
    config
}

/// Fresh in-memory ledger
pub fn memory_ledger() -> Arc<dyn LedgerStore> {
    Arc::new(SqliteLedger::in_memory().expect("in-memory ledger"))
}

/// Prepare and run one job against a mock provider
pub async fn run_job(
    html: &str,
    provider: &MockProvider,
    ledger: Arc<dyn LedgerStore>,
    config: JobConfig,
) -> Result<(Job, JobReport)> {
    run_job_with_cancel(html, provider, ledger, config, CancellationFlag::new()).await
}

/// Same as `run_job` with an explicit cancellation flag
pub async fn run_job_with_cancel(
    html: &str,
    provider: &MockProvider,
    ledger: Arc<dyn LedgerStore>,
    config: JobConfig,
    cancel: CancellationFlag,
) -> Result<(Job, JobReport)> {
    init_test_logging();
    let input = JobInput {
        document_key: "book/chapter1.html",
        html,
        target_language: "fr",
        provider: "mock",
        model: "mock",
    };
    let mut job = Job::prepare(input, config, ledger).await?;
    let translator = Arc::new(ProviderTranslator::new(
        Arc::new(provider.clone()),
        PromptTemplate::html_translator(),
    ));
    let report = job.run(translator, cancel, None).await?;
    Ok((job, report))
}

/// French stand-in for the sample's sentences
pub fn to_french(text: &str) -> String {
    text.replace("Hello", "Bonjour")
        .replace("world", "monde")
        .replace("The keeper climbed", "Le gardien montait")
        .replace("Continue reading", "Continuer la lecture")
        .replace("the notes", "les notes")
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&file_path, content)?;
    Ok(file_path)
}

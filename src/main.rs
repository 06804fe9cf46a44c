// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{anyhow, Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{error, info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::PathBuf;

use yahtwai::app_config::{self, Config, TranslationProvider};
use yahtwai::app_controller::Controller;

/// Exit status when some document was left partially translated
const EXIT_PARTIAL: i32 = 2;

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    Ollama,
    Anthropic,
    Mock,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::Ollama => TranslationProvider::Ollama,
            CliTranslationProvider::Anthropic => TranslationProvider::Anthropic,
            CliTranslationProvider::Mock => TranslationProvider::Mock,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate HTML documents (default command)
    Translate(TranslateArgs),

    /// List translation jobs recorded in the ledger
    Status(StatusArgs),

    /// Generate shell completions for yahtwai
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug)]
struct TranslateArgs {
    /// Input HTML file or directory to process
    #[arg(value_name = "INPUT_PATH")]
    input_path: Option<PathBuf>,

    /// Directory receiving <target language>/<relative path> outputs
    #[arg(short, long, default_value = "translated")]
    output_dir: PathBuf,

    /// Force re-translation of documents already completed
    #[arg(short, long)]
    force_overwrite: bool,

    /// Translation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// API key for hosted providers
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Expected source language code; other documents are skipped
    #[arg(short, long)]
    source_language: Option<String>,

    /// Target language code (e.g., 'en', 'es', 'fr')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Maximum concurrent translation requests
    #[arg(long)]
    concurrency: Option<usize>,

    /// Set <html lang> and dir of the output to the target language
    #[arg(long)]
    rewrite_lang: bool,

    /// Skip the provider connection check
    #[arg(long)]
    no_check: bool,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args, Debug)]
struct StatusArgs {
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: PathBuf,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

/// YAHTwAI - Yet Another HTML Translator with AI
///
/// Translates long HTML documents with an LLM while keeping every tag,
/// attribute and comment of the source in place.
#[derive(Parser, Debug)]
#[command(name = "yahtwai")]
#[command(version)]
#[command(about = "AI-powered HTML document translation tool")]
#[command(args_conflicts_with_subcommands = true)]
#[command(long_about = "YAHTwAI splits HTML documents into translation units, translates them with an LLM, \
validates every answer and rebuilds the document with its structure untouched.

EXAMPLES:
    yahtwai book/chapter1.html                  # Translate using default config
    yahtwai -t fr -o out book/                  # Translate a directory into French
    yahtwai -p anthropic -m claude-3-5-haiku-latest page.html
    yahtwai status                              # Show jobs recorded in the ledger
    yahtwai completions bash > yahtwai.bash     # Generate bash completions

RESUMING:
    Every unit is recorded in a ledger. Running the same command again after an
    interruption translates only the units that were not validated yet.

CONFIGURATION:
    Configuration is stored in conf.json by default. If the file doesn't exist,
    a default one is created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    translate: TranslateArgs,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger::new(LevelFilter::Trace)))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color and marker for a level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("\x1B[1;31m", "ERROR"),
            Level::Warn => ("\x1B[1;33m", "WARN "),
            Level::Info => ("\x1B[1;32m", "INFO "),
            Level::Debug => ("\x1B[1;36m", "DEBUG"),
            Level::Trace => ("\x1B[1;35m", "TRACE"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (color, marker) = Self::style_for_level(record.level());
            let _ = writeln!(
                std::io::stderr(),
                "{}{} {} {}\x1B[0m",
                color,
                now,
                marker,
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "yahtwai", &mut std::io::stdout());
            Ok(())
        }
        Some(Commands::Status(args)) => run_status(args).await,
        Some(Commands::Translate(args)) => run_translate(args).await,
        None => run_translate(cli.translate).await,
    }
}

/// Load the config file (creating it when missing) and apply the log level
fn load_config(common: &CommonArgs) -> Result<Config> {
    if let Some(level) = &common.log_level {
        let level: app_config::LogLevel = level.clone().into();
        log::set_max_level(level.into());
    }

    let (mut config, created) = Config::load_or_create(&common.config_path)?;
    if created {
        warn!(
            "Config file not found at '{}', created default config.",
            common.config_path.display()
        );
    }

    match &common.log_level {
        Some(level) => config.log_level = level.clone().into(),
        None => log::set_max_level(config.log_level.into()),
    }
    Ok(config)
}

async fn run_translate(options: TranslateArgs) -> Result<()> {
    let input_path = options
        .input_path
        .clone()
        .ok_or_else(|| anyhow!("INPUT_PATH is required when no subcommand is specified"))?;

    let mut config = load_config(&options.common)?;

    // Override config with CLI options if provided
    if let Some(provider) = &options.provider {
        config.translation.provider = provider.clone().into();
    }
    if let Some(model) = &options.model {
        config.translation.active_provider_config_mut().model = model.clone();
    }
    if let Some(api_key) = &options.api_key {
        if config.translation.provider.requires_api_key() {
            config.translation.active_provider_config_mut().api_key = api_key.clone();
        }
    }
    if let Some(concurrency) = options.concurrency {
        config.translation.active_provider_config_mut().concurrent_requests = Some(concurrency);
    }
    if let Some(source_lang) = &options.source_language {
        config.source_language = Some(source_lang.clone());
    }
    if let Some(target_lang) = &options.target_language {
        config.target_language = target_lang.clone();
    }
    if options.rewrite_lang {
        config.pipeline.rewrite_language_attributes = true;
    }

    config.validate().context("Configuration validation failed")?;

    let controller = Controller::with_config(config)?;
    if !options.no_check {
        controller.test_connection().await?;
    }

    let cancel = controller.cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing in-flight requests; run again to resume");
            cancel.cancel();
        }
    });

    let summary = controller
        .run(input_path, options.output_dir.clone(), options.force_overwrite)
        .await?;

    if summary.has_problems() {
        error!("Some documents were not fully translated: {}", summary);
        log::logger().flush();
        std::process::exit(EXIT_PARTIAL);
    }
    Ok(())
}

async fn run_status(options: StatusArgs) -> Result<()> {
    let config = load_config(&options.common)?;
    let controller = Controller::with_config(config)?;

    let jobs = controller.status().await?;
    if jobs.is_empty() {
        info!("No translation jobs recorded");
        return Ok(());
    }

    println!(
        "{:<16}  {:<6}  {:<11}  {:>6}  {:>6}  {:>6}  {:>6}  {:<25}  DOCUMENT",
        "JOB", "LANG", "STATUS", "DONE", "FAILED", "TOTAL", "%", "UPDATED"
    );
    let resumable = jobs.iter().filter(|job| job.resumable).count();
    for job in jobs {
        println!(
            "{:<16}  {:<6}  {:<11}  {:>6}  {:>6}  {:>6}  {:>6.1}  {:<25}  {}",
            job.job_id,
            job.target_language,
            job.status.to_string(),
            job.counts.validated,
            job.counts.failed_permanent,
            job.counts.total(),
            job.counts.completion_percentage(),
            job.updated_at,
            job.document_key
        );
    }
    if resumable > 0 {
        info!("{} job(s) can be resumed by running translate again", resumable);
    }
    Ok(())
}

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::{num::NonZeroUsize, path::PathBuf, process, sync::Arc, time::Duration};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use wordscout::{
    config::{EncodingMode, SearchConfig, SnapshotPolicy},
    export,
    filters::DEFAULT_EXTENSION_FILTER,
    results::SearchReport,
    RunStatus, ScanSearchEngine, SearchEvent, StopOutcome,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser)]
struct CliSearchConfig {
    /// Word to count (exact, case-sensitive)
    #[arg(short = 't', long)]
    token: Option<String>,

    /// Root directory to search in
    #[arg(short = 'd', long, default_value = ".")]
    root: PathBuf,

    /// File name filter (e.g. *.txt, txt, *.md)
    #[arg(short = 'e', long = "extension", default_value = DEFAULT_EXTENSION_FILTER)]
    extension_filter: String,

    /// Number of files processed concurrently
    #[arg(short = 'j', long)]
    threads: Option<NonZeroUsize>,

    /// Cancel the search after this long (e.g. 30s, 2m)
    #[arg(long)]
    timeout: Option<String>,

    /// Always enumerate the directory instead of reusing a previous scan
    #[arg(long)]
    rescan: bool,

    /// How to handle invalid UTF-8 sequences (lossy|failfast)
    #[arg(long)]
    encoding: Option<String>,

    /// Save a plain-text report to this file
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Show only statistics, not matches
    #[arg(short, long)]
    stats: bool,

    /// Configuration file (YAML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,

    /// Print the effective configuration as YAML and exit
    #[arg(long)]
    print_config: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Count occurrences of a word in the files of a directory
    Search(Box<CliSearchConfig>),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Search(args) => run_search(*args),
    }
}

impl CliSearchConfig {
    fn to_search_config(&self) -> Result<SearchConfig> {
        let encoding_mode = match self.encoding.as_deref().map(str::to_lowercase).as_deref() {
            None | Some("lossy") => EncodingMode::Lossy,
            Some("failfast") => EncodingMode::FailFast,
            Some(other) => bail!("Unknown encoding mode '{}' (expected lossy or failfast)", other),
        };

        let defaults = SearchConfig::default();
        Ok(SearchConfig {
            root_path: self.root.clone(),
            token: self.token.clone().unwrap_or_default(),
            extension_filter: self.extension_filter.clone(),
            thread_count: self.threads.unwrap_or(defaults.thread_count),
            log_level: self.log_level.clone().unwrap_or(defaults.log_level),
            encoding_mode,
            snapshot_policy: if self.rescan {
                SnapshotPolicy::Rescan
            } else {
                SnapshotPolicy::Reuse
            },
            timeout: self.timeout.clone(),
        })
    }
}

fn run_search(args: CliSearchConfig) -> Result<()> {
    let config = SearchConfig::load_from(args.config.as_deref())
        .context("Failed to load configuration")?
        .merge_with_cli(args.to_search_config()?);

    if args.print_config {
        print!("{}", config.to_yaml()?);
        return Ok(());
    }

    init_logging(args.log_level.as_deref(), &config.log_level);
    config.validate()?;

    let bar = ProgressBar::new_spinner();
    let sink = {
        let bar = bar.clone();
        move |event: SearchEvent| render_event(&bar, event)
    };

    let mut engine = ScanSearchEngine::with_sink(config.engine_options()?, Arc::new(sink))?;
    let handle = engine.stop_handle();
    ctrlc::set_handler(move || match handle.request_stop() {
        StopOutcome::Cancelling => {}
        // A second Ctrl+C, or one arriving between runs, exits immediately
        StopOutcome::AlreadyCancelling | StopOutcome::Shutdown => process::exit(130),
    })
    .context("Failed to install Ctrl+C handler")?;

    let report = engine.search(&config.target()?, &config.query()?)?;
    bar.finish_and_clear();
    debug!("Engine settled in state {}", engine.status());

    print_report(&report, args.stats);

    if let Some(path) = &args.output {
        export::save_report(path, &report.token, &report.results)?;
        println!("Report saved to {}", path.display().to_string().blue());
    }

    Ok(())
}

/// Logs go to stderr so stdout only carries results.
///
/// Priority: RUST_LOG > --log-level > config file > default.
fn init_logging(flag_level: Option<&str>, config_level: &str) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if let Some(level) = flag_level {
        EnvFilter::new(level)
    } else {
        EnvFilter::new(config_level)
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn render_event(bar: &ProgressBar, event: SearchEvent) {
    match event {
        SearchEvent::StatusChanged(status @ RunStatus::Scanning) => {
            bar.set_message(status.describe(0));
            bar.enable_steady_tick(Duration::from_millis(100));
        }
        SearchEvent::StatusChanged(status @ RunStatus::Searching) => {
            bar.disable_steady_tick();
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>3}% {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar.set_length(100);
            bar.set_position(0);
            bar.set_message(status.describe(0));
        }
        SearchEvent::StatusChanged(status @ RunStatus::Cancelling) => {
            bar.set_message(status.describe(0));
        }
        SearchEvent::Progress(percent) => bar.set_position(u64::from(percent)),
        SearchEvent::Match(result) => {
            debug!("{} contains {} matches", result.path().display(), result.count);
        }
        SearchEvent::StatusChanged(_) | SearchEvent::Finished(_) => {}
    }
}

fn print_report(report: &SearchReport, stats_only: bool) {
    if !stats_only {
        for result in &report.results {
            println!(
                "{}: {}",
                result.path().display().to_string().blue(),
                result.count.to_string().green()
            );
        }
    }

    if let Some(message) = report.outcome.message() {
        println!("{}", message.yellow());
    }

    println!(
        "\nFound {} matches in {} of {} files",
        report.total_matches,
        report.files_with_matches(),
        report.files_searched
    );

    if stats_only {
        let stats = &report.stats;
        println!(
            "Read {} files ({} bytes, {} memory mapped), skipped {}, scanned {} tokens",
            stats.files_read,
            stats.bytes_read,
            stats.mmap_files,
            stats.files_skipped,
            stats.tokens_scanned
        );
    }
}

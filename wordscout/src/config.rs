use config::{Config as ConfigBuilder, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::enumerator::validate_root;
use crate::errors::{SearchError, SearchResult};
use crate::filters::{ExtensionFilter, DEFAULT_EXTENSION_FILTER};
use crate::search::engine::EngineOptions;
use crate::search::{ScanTarget, SearchQuery};

/// How file contents that are not valid UTF-8 are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingMode {
    /// Replace invalid sequences and keep counting
    #[default]
    Lossy,
    /// Treat invalid UTF-8 as a read failure and skip the file
    FailFast,
}

/// Whether a search started from `Ready` reuses the previously enumerated files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotPolicy {
    /// Search the cached file list again; files added or removed on disk since
    /// the scan are not noticed
    #[default]
    Reuse,
    /// Enumerate the directory again before every search
    Rescan,
}

/// Configuration for a search.
///
/// # Configuration Locations
///
/// Sources are layered, later ones overriding earlier ones:
/// 1. Global `$CONFIG_DIR/wordscout/config.yaml`
/// 2. Local `.wordscout.yaml` in the current directory
/// 3. Custom config file specified via `--config`
///
/// Command-line arguments take precedence over all of them, see
/// [`merge_with_cli`](SearchConfig::merge_with_cli).
///
/// # Configuration Format
///
/// ```yaml
/// # Directory to search
/// root_path: "./notes"
///
/// # Token to count (exact, case-sensitive)
/// token: "cat"
///
/// # File name filter
/// extension_filter: "*.txt"
///
/// # Worker threads (default: CPU cores)
/// thread_count: 4
///
/// # lossy | failfast
/// encoding_mode: lossy
///
/// # reuse | rescan
/// snapshot_policy: reuse
///
/// # Abort the run after this long
/// timeout: "2m"
///
/// # Log level (trace, debug, info, warn, error)
/// log_level: "info"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Root directory to search in
    #[serde(default = "default_root_path")]
    pub root_path: PathBuf,

    /// Token to count
    #[serde(default)]
    pub token: String,

    /// File name filter, e.g. "*.txt"
    #[serde(default = "default_extension_filter")]
    pub extension_filter: String,

    /// Number of worker threads for the search phase
    #[serde(default = "default_thread_count")]
    pub thread_count: NonZeroUsize,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub encoding_mode: EncodingMode,

    #[serde(default)]
    pub snapshot_policy: SnapshotPolicy,

    /// Optional run timeout in humantime notation ("30s", "5m")
    #[serde(default)]
    pub timeout: Option<String>,
}

fn default_root_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_extension_filter() -> String {
    DEFAULT_EXTENSION_FILTER.to_string()
}

pub(crate) fn default_thread_count() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN)
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            root_path: default_root_path(),
            token: String::new(),
            extension_filter: default_extension_filter(),
            thread_count: default_thread_count(),
            log_level: default_log_level(),
            encoding_mode: EncodingMode::default(),
            snapshot_policy: SnapshotPolicy::default(),
            timeout: None,
        }
    }
}

impl SearchConfig {
    /// Loads configuration from the default locations
    pub fn load() -> SearchResult<Self> {
        Self::load_from(None)
    }

    /// Loads configuration, layering `config_path` over the default locations
    pub fn load_from(config_path: Option<&Path>) -> SearchResult<Self> {
        if let Some(path) = config_path {
            if !path.exists() {
                return Err(SearchError::config_error(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
        }

        let mut builder = ConfigBuilder::builder();

        let config_files = [
            dirs::config_dir().map(|p| p.join("wordscout/config.yaml")),
            Some(PathBuf::from(".wordscout.yaml")),
            config_path.map(PathBuf::from),
        ];

        for path in config_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Merges CLI arguments with configuration file values
    pub fn merge_with_cli(mut self, cli_config: SearchConfig) -> Self {
        // CLI values take precedence wherever they differ from the defaults
        if !cli_config.token.is_empty() {
            self.token = cli_config.token;
        }
        if cli_config.root_path != default_root_path() {
            self.root_path = cli_config.root_path;
        }
        if cli_config.extension_filter != default_extension_filter() {
            self.extension_filter = cli_config.extension_filter;
        }
        if cli_config.thread_count != default_thread_count() {
            self.thread_count = cli_config.thread_count;
        }
        if cli_config.log_level != default_log_level() {
            self.log_level = cli_config.log_level;
        }
        if cli_config.encoding_mode != EncodingMode::default() {
            self.encoding_mode = cli_config.encoding_mode;
        }
        if cli_config.snapshot_policy != SnapshotPolicy::default() {
            self.snapshot_policy = cli_config.snapshot_policy;
        }
        if cli_config.timeout.is_some() {
            self.timeout = cli_config.timeout;
        }
        self
    }

    /// Parses the configured timeout
    pub fn timeout(&self) -> SearchResult<Option<Duration>> {
        self.timeout
            .as_deref()
            .map(|t| {
                humantime::parse_duration(t)
                    .map_err(|e| SearchError::invalid_timeout(format!("{}: {}", t, e)))
            })
            .transpose()
    }

    pub fn filter(&self) -> SearchResult<ExtensionFilter> {
        ExtensionFilter::new(&self.extension_filter)
    }

    /// Checks every precondition a run depends on
    pub fn validate(&self) -> SearchResult<()> {
        validate_root(&self.root_path)?;
        if self.token.is_empty() {
            return Err(SearchError::EmptyToken);
        }
        self.filter()?;
        self.timeout()?;
        Ok(())
    }

    pub fn target(&self) -> SearchResult<ScanTarget> {
        Ok(ScanTarget::new(self.root_path.clone(), self.filter()?))
    }

    pub fn query(&self) -> SearchResult<SearchQuery> {
        SearchQuery::new(self.token.clone())
    }

    /// Renders the configuration as YAML, in the format `load_from` reads
    pub fn to_yaml(&self) -> SearchResult<String> {
        serde_yaml::to_string(self)
            .map_err(|e| SearchError::config_error(format!("failed to serialize config: {}", e)))
    }

    pub fn engine_options(&self) -> SearchResult<EngineOptions> {
        Ok(EngineOptions {
            thread_count: self.thread_count,
            encoding_mode: self.encoding_mode,
            snapshot_policy: self.snapshot_policy,
            timeout: self.timeout()?,
        })
    }
}

//! Two-phase, cancellable search.
//!
//! A run first enumerates the files under a root directory that match an
//! extension filter, then counts whole-token occurrences of the search word
//! in every enumerated file on a bounded worker pool.
//!
//! # Phases
//!
//! 1. **Scanning**: a recursive walk collects candidate files. Unreadable
//!    subtrees are skipped, and nothing is reported until the walk finishes.
//! 2. **Searching**: each file is read, tokenized on a fixed delimiter set and
//!    compared against the token with case-sensitive equality. Files with at
//!    least one match produce a [`MatchResult`](crate::results::MatchResult).
//!
//! Progress counts completed files; the displayed percentage is rounded and
//! only ever increases by one step at a time.
//!
//! # Cancellation
//!
//! A [`StopHandle`] can be cloned into other threads. Stopping a running
//! search lets files already being processed finish while no new file is
//! started. The engine settles back to `Ready` (or `Idle` if the scan was
//! interrupted) before `search` returns.
//!
//! ```rust,no_run
//! use wordscout::search::{EngineOptions, ScanSearchEngine, ScanTarget, SearchQuery};
//!
//! # fn main() -> wordscout::SearchResult<()> {
//! let mut engine = ScanSearchEngine::new(EngineOptions::default())?;
//! let target = ScanTarget::with_filter("notes", "*.txt")?;
//! let report = engine.search(&target, &SearchQuery::new("cat")?)?;
//! for result in &report.results {
//!     println!("{}: {}", result.path().display(), result.count);
//! }
//! # Ok(())
//! # }
//! ```
pub mod cancel;
pub mod counter;
pub mod engine;
pub mod events;
pub mod status;

use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use cancel::CancellationToken;
pub use counter::ParallelWordCounter;
pub use engine::{EngineOptions, ScanSearchEngine, StopHandle};
pub use events::{EventSink, NullSink, SearchEvent};
pub use status::{RunStatus, StopOutcome};

use crate::config::SearchConfig;
use crate::errors::{SearchError, SearchResult};
use crate::filters::ExtensionFilter;
use crate::results::SearchReport;

/// Where to look: a root directory and the file name filter applied beneath it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTarget {
    root: PathBuf,
    filter: ExtensionFilter,
}

impl ScanTarget {
    pub fn new(root: impl Into<PathBuf>, filter: ExtensionFilter) -> Self {
        Self {
            root: root.into(),
            filter,
        }
    }

    /// Builds a target from a filter expression such as `*.txt`
    pub fn with_filter(root: impl Into<PathBuf>, filter: &str) -> SearchResult<Self> {
        Ok(Self::new(root, ExtensionFilter::new(filter)?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn filter(&self) -> &ExtensionFilter {
        &self.filter
    }
}

/// The word to count. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    token: String,
}

impl SearchQuery {
    pub fn new(token: impl Into<String>) -> SearchResult<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(SearchError::EmptyToken);
        }
        Ok(Self { token })
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

/// Runs a single search described by `config` on a fresh engine
pub fn search(config: &SearchConfig) -> SearchResult<SearchReport> {
    search_with_sink(config, Arc::new(NullSink))
}

/// Like [`search`], delivering engine events to `sink`
pub fn search_with_sink(
    config: &SearchConfig,
    sink: Arc<dyn EventSink>,
) -> SearchResult<SearchReport> {
    config.validate()?;
    let mut engine = ScanSearchEngine::with_sink(config.engine_options()?, sink)?;
    engine.search(&config.target()?, &config.query()?)
}

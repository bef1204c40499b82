//! Cancellable two-phase word search over a directory tree.
//!
//! The crate enumerates files under a root directory, then counts exact,
//! case-sensitive occurrences of a token in each file on a bounded worker
//! pool, reporting progress, per-file matches and a terminal outcome.
pub mod config;
pub mod enumerator;
pub mod errors;
pub mod export;
pub mod filters;
pub mod metrics;
pub mod progress;
pub mod results;
pub mod search;
pub mod tokenizer;

pub use config::{EncodingMode, SearchConfig, SnapshotPolicy};
pub use errors::{SearchError, SearchResult};
pub use filters::ExtensionFilter;
pub use progress::{ProgressAggregator, ProgressState};
pub use results::{MatchResult, SearchOutcome, SearchReport};
pub use search::{
    search, CancellationToken, EngineOptions, EventSink, RunStatus, ScanSearchEngine, ScanTarget,
    SearchEvent, SearchQuery, StopHandle, StopOutcome,
};

use dashmap::DashMap;
use std::path::{Path, PathBuf};

use crate::metrics::ScanStats;

/// A file containing at least one occurrence of the search token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// File name without its directory
    pub file_name: String,
    /// Directory containing the file
    pub directory_path: PathBuf,
    /// Number of matching tokens, always at least 1
    pub count: usize,
}

impl MatchResult {
    /// Builds a result for `path`, or `None` when `count` is zero
    pub fn for_path(path: &Path, count: usize) -> Option<Self> {
        if count == 0 {
            return None;
        }
        Some(Self {
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            directory_path: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            count,
        })
    }

    /// Full path of the matching file
    pub fn path(&self) -> PathBuf {
        self.directory_path.join(&self.file_name)
    }
}

/// Thread-safe sink for per-file results.
///
/// Results are keyed by full path, so a file can only ever contribute one
/// entry to a run.
#[derive(Debug, Default)]
pub struct ResultCollector {
    results: DashMap<PathBuf, MatchResult>,
}

impl ResultCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a result; returns false if one for the same file already existed
    pub fn add(&self, result: MatchResult) -> bool {
        self.results.insert(result.path(), result).is_none()
    }

    pub fn clear(&self) {
        self.results.clear();
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Sum of all stored counts
    pub fn total_matches(&self) -> usize {
        self.results.iter().map(|r| r.count).sum()
    }

    /// Read-only copy of the stored results, ordered by path
    pub fn snapshot(&self) -> Vec<MatchResult> {
        let mut results: Vec<_> = self.results.iter().map(|r| r.value().clone()).collect();
        results.sort_by(|a, b| {
            a.directory_path
                .cmp(&b.directory_path)
                .then_with(|| a.file_name.cmp(&b.file_name))
        });
        results
    }
}

/// How a search run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Phase 2 finished and at least one file matched
    CompletedWithResults,
    /// Phase 2 finished without a single match
    CompletedNoMatches,
    /// Phase 1 found nothing to search
    NoFilesFound,
    /// The run was cancelled or timed out
    Cancelled,
}

impl SearchOutcome {
    /// Message shown to the user for outcomes that need attention
    pub fn message(&self) -> Option<&'static str> {
        match self {
            SearchOutcome::CompletedWithResults => None,
            SearchOutcome::CompletedNoMatches => Some("Word not found in these files"),
            SearchOutcome::NoFilesFound => Some("No files found in this directory"),
            SearchOutcome::Cancelled => Some("Search cancelled"),
        }
    }
}

/// Final report handed to the caller when a run ends
#[derive(Debug, Clone)]
pub struct SearchReport {
    pub outcome: SearchOutcome,
    /// The token that was searched for
    pub token: String,
    /// Matching files ordered by path
    pub results: Vec<MatchResult>,
    /// Number of files in the snapshot that was searched
    pub files_searched: usize,
    /// Sum of all per-file counts
    pub total_matches: usize,
    /// True when the file list came from an earlier run
    pub reused_snapshot: bool,
    /// Reader counters for this run
    pub stats: ScanStats,
}

impl SearchReport {
    pub(crate) fn new(outcome: SearchOutcome, token: &str) -> Self {
        Self {
            outcome,
            token: token.to_string(),
            results: Vec::new(),
            files_searched: 0,
            total_matches: 0,
            reused_snapshot: false,
            stats: ScanStats::default(),
        }
    }

    pub fn files_with_matches(&self) -> usize {
        self.results.len()
    }
}

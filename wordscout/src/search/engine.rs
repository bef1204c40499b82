use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::cancel::CancellationToken;
use super::counter::ParallelWordCounter;
use super::events::{EventSink, NullSink, RunEmitter, SearchEvent};
use super::status::{RunStatus, StopOutcome};
use super::{ScanTarget, SearchQuery};
use crate::config::{default_thread_count, EncodingMode, SnapshotPolicy};
use crate::enumerator::{enumerate, validate_root};
use crate::errors::{SearchError, SearchResult};
use crate::metrics::ScanStats;
use crate::progress::{ProgressAggregator, ProgressState};
use crate::results::{MatchResult, ResultCollector, SearchOutcome, SearchReport};

/// Tuning knobs fixed for the lifetime of an engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Maximum number of files processed at once
    pub thread_count: NonZeroUsize,
    pub encoding_mode: EncodingMode,
    pub snapshot_policy: SnapshotPolicy,
    /// Cancel runs automatically after this long
    pub timeout: Option<Duration>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            thread_count: default_thread_count(),
            encoding_mode: EncodingMode::default(),
            snapshot_policy: SnapshotPolicy::default(),
            timeout: None,
        }
    }
}

/// State reachable from both the engine and its stop handles
struct Shared {
    status: Mutex<RunStatus>,
    cancel: Mutex<Option<CancellationToken>>,
    generation: Arc<AtomicU64>,
    sink: Arc<dyn EventSink>,
}

impl Shared {
    fn lock_status(&self) -> MutexGuard<'_, RunStatus> {
        self.status.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn lock_cancel(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.cancel.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Handle for requesting a stop from another thread (a UI thread, a signal handler)
#[derive(Clone)]
pub struct StopHandle {
    shared: Arc<Shared>,
}

impl StopHandle {
    /// The exit/stop action.
    ///
    /// When nothing is running this tells the host to shut down. Otherwise the
    /// current run is cancelled and the engine moves to `Cancelling` until
    /// in-flight work has drained.
    pub fn request_stop(&self) -> StopOutcome {
        let mut status = self.shared.lock_status();
        match *status {
            RunStatus::Idle | RunStatus::Ready => StopOutcome::Shutdown,
            RunStatus::Cancelling => StopOutcome::AlreadyCancelling,
            RunStatus::Scanning | RunStatus::Searching => {
                if let Some(cancel) = self.shared.lock_cancel().as_ref() {
                    cancel.cancel();
                }
                info!("Cancellation requested while {}", *status);
                *status = RunStatus::Cancelling;
                drop(status);
                self.shared
                    .sink
                    .emit(SearchEvent::StatusChanged(RunStatus::Cancelling));
                StopOutcome::Cancelling
            }
        }
    }

    pub fn status(&self) -> RunStatus {
        *self.shared.lock_status()
    }
}

/// The enumerated file list of the last completed scan
#[derive(Debug)]
struct FileSnapshot {
    root: PathBuf,
    filter: String,
    files: Arc<Vec<PathBuf>>,
}

/// Orchestrates the two-phase scan-then-search lifecycle.
///
/// A search from `Idle` enumerates the target directory (Phase 1) and then
/// counts the token in every enumerated file (Phase 2). The enumerated list
/// is kept, and with [`SnapshotPolicy::Reuse`] a later search from `Ready`
/// against the same target skips Phase 1.
///
/// `search` borrows the engine mutably, so a new run cannot begin until the
/// previous one has fully drained. Events are delivered to the sink given at
/// construction and carry a run generation; events from a superseded run are
/// dropped.
pub struct ScanSearchEngine {
    shared: Arc<Shared>,
    options: EngineOptions,
    counter: ParallelWordCounter,
    progress: ProgressAggregator,
    results: ResultCollector,
    snapshot: Option<FileSnapshot>,
}

impl ScanSearchEngine {
    /// Creates an engine that emits no events
    pub fn new(options: EngineOptions) -> SearchResult<Self> {
        Self::with_sink(options, Arc::new(NullSink))
    }

    /// Creates an engine delivering events to `sink`
    pub fn with_sink(options: EngineOptions, sink: Arc<dyn EventSink>) -> SearchResult<Self> {
        let counter = ParallelWordCounter::new(options.thread_count, options.encoding_mode)?;
        Ok(Self {
            shared: Arc::new(Shared {
                status: Mutex::new(RunStatus::Idle),
                cancel: Mutex::new(None),
                generation: Arc::new(AtomicU64::new(0)),
                sink,
            }),
            options,
            counter,
            progress: ProgressAggregator::new(),
            results: ResultCollector::new(),
            snapshot: None,
        })
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn status(&self) -> RunStatus {
        *self.shared.lock_status()
    }

    /// Status line for the current state
    pub fn status_text(&self) -> String {
        self.status().describe(self.cached_file_count())
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Files enumerated by the last completed scan, if still cached
    pub fn cached_files(&self) -> Option<&[PathBuf]> {
        self.snapshot.as_ref().map(|s| s.files.as_slice())
    }

    pub fn cached_file_count(&self) -> usize {
        self.cached_files().map_or(0, <[PathBuf]>::len)
    }

    pub fn progress(&self) -> ProgressState {
        self.progress.snapshot()
    }

    /// Results of the current or last run, ordered by path
    pub fn results(&self) -> Vec<MatchResult> {
        self.results.snapshot()
    }

    pub fn metrics(&self) -> ScanStats {
        self.counter.metrics().get_stats()
    }

    /// Switches to a new directory: the cached file list and results are
    /// dropped and the engine returns to `Idle`. Refused while a run is active.
    pub fn open_directory(&mut self, root: &Path) -> SearchResult<()> {
        validate_root(root)?;
        self.reset()?;
        debug!("Opened directory {}", root.display());
        Ok(())
    }

    /// Drops the cached file list and results, returning to `Idle`
    pub fn reset(&mut self) -> SearchResult<()> {
        let mut status = self.shared.lock_status();
        if !status.accepts_search() {
            return Err(SearchError::busy(status.to_string()));
        }

        self.snapshot = None;
        self.results.clear();
        self.progress.configure(0);
        *status = RunStatus::Idle;
        drop(status);
        self.shared
            .sink
            .emit(SearchEvent::StatusChanged(RunStatus::Idle));
        debug!("Engine reset");
        Ok(())
    }

    /// Runs a search and blocks until it has completed or drained after cancellation.
    ///
    /// Returns `Err` only when a precondition fails (engine busy, missing root
    /// directory); every other ending is described by the report's outcome.
    pub fn search(
        &mut self,
        target: &ScanTarget,
        query: &SearchQuery,
    ) -> SearchResult<SearchReport> {
        let status = self.status();
        if !status.accepts_search() {
            return Err(SearchError::busy(status.to_string()));
        }
        validate_root(target.root())?;

        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let emitter = RunEmitter::new(
            Arc::clone(&self.shared.sink),
            Arc::clone(&self.shared.generation),
            generation,
        );
        let cancel = match self.options.timeout {
            Some(timeout) => CancellationToken::with_timeout(timeout),
            None => CancellationToken::new(),
        };
        *self.shared.lock_cancel() = Some(cancel.clone());

        info!(
            "Starting search for '{}' in {} (run {})",
            query.token(),
            target.root().display(),
            generation
        );

        self.results.clear();
        self.progress.configure(0);
        self.counter.metrics().reset();

        let mut report = SearchReport::new(SearchOutcome::Cancelled, query.token());

        let (files, scanned) = match self.reusable_snapshot(target) {
            Some(files) => {
                debug!("Reusing {} previously enumerated files", files.len());
                report.reused_snapshot = true;
                (files, None)
            }
            None => {
                self.snapshot = None;
                if !self.enter_phase(RunStatus::Scanning, &emitter) {
                    return Ok(self.finish(report, RunStatus::Idle, &cancel, &emitter));
                }

                let enumeration = enumerate(target.root(), target.filter(), &cancel);
                if enumeration.cancelled || cancel.is_cancelled() {
                    debug!("Scan cancelled, discarding {} files", enumeration.files.len());
                    return Ok(self.finish(report, RunStatus::Idle, &cancel, &emitter));
                }
                if enumeration.files.is_empty() {
                    report.outcome = SearchOutcome::NoFilesFound;
                    return Ok(self.finish(report, RunStatus::Idle, &cancel, &emitter));
                }

                let files = Arc::new(enumeration.files);
                let scanned = FileSnapshot {
                    root: target.root().to_path_buf(),
                    filter: target.filter().as_str().to_string(),
                    files: Arc::clone(&files),
                };
                (files, Some(scanned))
            }
        };

        let fresh_scan = scanned.is_some();
        if !self.commit_scan(scanned, &emitter) {
            // A stop that landed during the scan discards it entirely
            let next = if fresh_scan {
                RunStatus::Idle
            } else {
                RunStatus::Ready
            };
            return Ok(self.finish(report, next, &cancel, &emitter));
        }
        report.files_searched = files.len();

        let results = &self.results;
        let cancelled = self.counter.run(
            &files,
            query,
            &self.progress,
            &cancel,
            |result| {
                results.add(result.clone());
                emitter.emit(SearchEvent::Match(result));
            },
            |percent| emitter.emit(SearchEvent::Progress(percent)),
        );

        // A stop after the last file was picked up still ends the run as cancelled
        report.outcome = if cancelled || cancel.is_cancelled() {
            SearchOutcome::Cancelled
        } else if self.results.is_empty() {
            SearchOutcome::CompletedNoMatches
        } else {
            SearchOutcome::CompletedWithResults
        };
        report.results = self.results.snapshot();
        report.total_matches = report.results.iter().map(|r| r.count).sum();

        Ok(self.finish(report, RunStatus::Ready, &cancel, &emitter))
    }

    /// Cached files usable for a search of `target`, per the snapshot policy
    fn reusable_snapshot(&self, target: &ScanTarget) -> Option<Arc<Vec<PathBuf>>> {
        if self.options.snapshot_policy == SnapshotPolicy::Rescan
            || self.status() != RunStatus::Ready
        {
            return None;
        }

        let snapshot = self.snapshot.as_ref()?;
        if !same_target(snapshot, target.root(), target.filter().as_str()) {
            debug!("Search target changed, enumerating again");
            return None;
        }
        Some(Arc::clone(&snapshot.files))
    }

    /// Enters Phase 2, caching a freshly enumerated file list on the way.
    ///
    /// Returns false, and caches nothing, when a stop request arrived after
    /// the walk finished but before the engine left `Scanning`.
    fn commit_scan(&mut self, scanned: Option<FileSnapshot>, emitter: &RunEmitter) -> bool {
        if !self.enter_phase(RunStatus::Searching, emitter) {
            if let Some(scanned) = scanned {
                debug!("Stop requested after scan, discarding {} files", scanned.files.len());
            }
            return false;
        }
        if scanned.is_some() {
            self.snapshot = scanned;
        }
        true
    }

    /// Moves to `next` unless a stop request got there first
    fn enter_phase(&self, next: RunStatus, emitter: &RunEmitter) -> bool {
        {
            let mut status = self.shared.lock_status();
            if *status == RunStatus::Cancelling {
                return false;
            }
            *status = next;
        }
        // Sinks may call back into a stop handle
        emitter.emit(SearchEvent::StatusChanged(next));
        true
    }

    fn finish(
        &self,
        report: SearchReport,
        next: RunStatus,
        cancel: &CancellationToken,
        emitter: &RunEmitter,
    ) -> SearchReport {
        if report.outcome == SearchOutcome::Cancelled && cancel.deadline_elapsed() {
            warn!("Search timed out after {:?}", self.options.timeout);
        }

        *self.shared.lock_status() = next;
        *self.shared.lock_cancel() = None;
        emitter.emit(SearchEvent::StatusChanged(next));
        emitter.emit(SearchEvent::Finished(report.outcome));

        let mut report = report;
        report.stats = self.counter.metrics().get_stats();
        self.counter.metrics().log_stats();
        info!(
            "Search finished: {:?}. Found {} matches in {} of {} files",
            report.outcome,
            report.total_matches,
            report.files_with_matches(),
            report.files_searched
        );
        report
    }
}

fn same_target(snapshot: &FileSnapshot, root: &Path, filter: &str) -> bool {
    snapshot.root == root && snapshot.filter == filter
}

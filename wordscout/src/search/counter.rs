use memmap2::Mmap;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::borrow::Cow;
use std::fs::{self, File};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, trace, warn};

use super::cancel::CancellationToken;
use super::SearchQuery;
use crate::config::EncodingMode;
use crate::errors::{SearchError, SearchResult};
use crate::metrics::ScanMetrics;
use crate::progress::ProgressAggregator;
use crate::results::MatchResult;
use crate::tokenizer::{chunk_on_delimiters, tokens};

/// Files at least this large are memory mapped and counted in parallel chunks
pub(crate) const LARGE_FILE_THRESHOLD: u64 = 10 * 1024 * 1024; // 10MB

// Approximate size of one chunk of a large file
const CHUNK_TARGET_LEN: usize = 1024 * 1024;

// Tokens examined between two cancellation checks
const CANCEL_CHECK_INTERVAL: usize = 4096;

/// Decodes file bytes according to the encoding mode, dropping a UTF-8 BOM
fn decode_bytes<'a>(
    bytes: &'a [u8],
    path: &Path,
    encoding_mode: EncodingMode,
) -> SearchResult<Cow<'a, str>> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match encoding_mode {
        EncodingMode::FailFast => std::str::from_utf8(bytes)
            .map(Cow::Borrowed)
            .map_err(|e| SearchError::encoding_error(path, e)),
        EncodingMode::Lossy => {
            let text = String::from_utf8_lossy(bytes);
            if let Cow::Owned(_) = text {
                debug!("Invalid UTF-8 replaced in file: {}", path.display());
            }
            Ok(text)
        }
    }
}

/// Token tally of a fully scanned text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Tally {
    matches: usize,
    tokens: usize,
}

/// Counts `token` in `text`, giving up with `None` once `cancel` fires
fn count_sequential(text: &str, token: &str, cancel: &CancellationToken) -> Option<Tally> {
    let mut tally = Tally::default();
    for t in tokens(text) {
        tally.tokens += 1;
        if tally.tokens % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
            return None;
        }
        if t == token {
            tally.matches += 1;
        }
    }
    Some(tally)
}

/// Splits `text` on delimiter boundaries and counts the pieces in parallel
fn count_chunked(text: &str, token: &str, cancel: &CancellationToken) -> Option<Tally> {
    chunk_on_delimiters(text, CHUNK_TARGET_LEN)
        .par_iter()
        .map(|chunk| {
            if cancel.is_cancelled() {
                None
            } else {
                count_sequential(chunk, token, cancel)
            }
        })
        .try_fold(Tally::default, |acc, tally| {
            tally.map(|t| Tally {
                matches: acc.matches + t.matches,
                tokens: acc.tokens + t.tokens,
            })
        })
        .try_reduce(Tally::default, |a, b| {
            Some(Tally {
                matches: a.matches + b.matches,
                tokens: a.tokens + b.tokens,
            })
        })
}

/// Result of processing one unit of work
#[derive(Debug)]
enum UnitOutcome {
    Counted(usize),
    Interrupted,
}

/// Counts token occurrences across a file list on a bounded worker pool.
///
/// Each file is read in full, tokenized and counted by exactly one worker.
/// Read and decode failures skip the file; it still counts as processed for
/// progress purposes. Once cancellation is observed no further file is
/// started, and files mid-tokenization stop at the next check.
#[derive(Debug)]
pub struct ParallelWordCounter {
    pool: ThreadPool,
    concurrency_limit: NonZeroUsize,
    encoding_mode: EncodingMode,
    metrics: ScanMetrics,
}

impl ParallelWordCounter {
    /// Creates a counter running at most `concurrency_limit` files at a time
    pub fn new(concurrency_limit: NonZeroUsize, encoding_mode: EncodingMode) -> SearchResult<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(concurrency_limit.get())
            .thread_name(|i| format!("wordscout-worker-{}", i))
            .build()
            .map_err(|e| SearchError::config_error(format!("failed to start worker pool: {}", e)))?;

        Ok(Self {
            pool,
            concurrency_limit,
            encoding_mode,
            metrics: ScanMetrics::new(),
        })
    }

    pub fn concurrency_limit(&self) -> NonZeroUsize {
        self.concurrency_limit
    }

    pub fn metrics(&self) -> &ScanMetrics {
        &self.metrics
    }

    /// Processes every file in `files`, returning true if the run was cancelled.
    ///
    /// A cancellation observed at any point before this returns counts, even
    /// when every file had already been picked up and ran to completion.
    ///
    /// `progress` is reconfigured for `files.len()` units. `on_result` fires
    /// once for each file with at least one match; `on_progress` fires for each
    /// percentage threshold crossed, in increasing order. Both may be called
    /// from any worker thread. When this returns, no further callbacks occur.
    pub fn run<R, P>(
        &self,
        files: &[PathBuf],
        query: &SearchQuery,
        progress: &ProgressAggregator,
        cancel: &CancellationToken,
        on_result: R,
        on_progress: P,
    ) -> bool
    where
        R: Fn(MatchResult) + Sync,
        P: Fn(u8) + Sync,
    {
        progress.configure(files.len());
        let abandoned = AtomicBool::new(false);

        debug!(
            "Counting '{}' in {} files on {} workers",
            query.token(),
            files.len(),
            self.concurrency_limit
        );

        self.pool.install(|| {
            files.par_iter().for_each(|path| {
                if cancel.is_cancelled() {
                    abandoned.store(true, Ordering::Relaxed);
                    return;
                }

                match self.process_file(path, query.token(), cancel) {
                    Ok(UnitOutcome::Counted(count)) => {
                        if let Some(result) = MatchResult::for_path(path, count) {
                            trace!("{} matches in {}", count, path.display());
                            on_result(result);
                        }
                    }
                    Ok(UnitOutcome::Interrupted) => {
                        abandoned.store(true, Ordering::Relaxed);
                        return;
                    }
                    Err(e) => {
                        warn!("Skipping {}: {}", path.display(), e);
                        self.metrics.record_file_skipped();
                    }
                }

                progress.record_completion_with(&on_progress);
            });
        });

        // Units already in flight may all have finished after the signal
        abandoned.load(Ordering::Relaxed) || cancel.is_cancelled()
    }

    /// Reads, decodes and counts one file
    fn process_file(
        &self,
        path: &Path,
        token: &str,
        cancel: &CancellationToken,
    ) -> SearchResult<UnitOutcome> {
        let size = match fs::metadata(path) {
            Ok(metadata) => metadata.len(),
            Err(e) => return Err(SearchError::from_io(path, e)),
        };

        let tally = if size >= LARGE_FILE_THRESHOLD {
            trace!("Memory mapping {}", path.display());
            let file = File::open(path).map_err(|e| SearchError::from_io(path, e))?;
            // SAFETY: read-only map, dropped before returning
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| SearchError::from_io(path, e))?;
            let text = decode_bytes(&mmap, path, self.encoding_mode)?;
            self.metrics.record_file_read(mmap.len() as u64, true);
            count_chunked(&text, token, cancel)
        } else {
            let bytes = fs::read(path).map_err(|e| SearchError::from_io(path, e))?;
            let text = decode_bytes(&bytes, path, self.encoding_mode)?;
            self.metrics.record_file_read(bytes.len() as u64, false);
            count_sequential(&text, token, cancel)
        };

        Ok(match tally {
            Some(tally) => {
                self.metrics.record_tokens(tally.tokens as u64);
                UnitOutcome::Counted(tally.matches)
            }
            None => UnitOutcome::Interrupted,
        })
    }
}

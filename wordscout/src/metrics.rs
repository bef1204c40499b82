use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// Per-run counters updated by the search workers
#[derive(Debug, Clone)]
pub struct ScanMetrics {
    files_read: Arc<AtomicU64>,
    files_skipped: Arc<AtomicU64>,
    mmap_files: Arc<AtomicU64>,
    bytes_read: Arc<AtomicU64>,
    tokens_scanned: Arc<AtomicU64>,
}

impl ScanMetrics {
    pub fn new() -> Self {
        Self {
            files_read: Arc::new(AtomicU64::new(0)),
            files_skipped: Arc::new(AtomicU64::new(0)),
            mmap_files: Arc::new(AtomicU64::new(0)),
            bytes_read: Arc::new(AtomicU64::new(0)),
            tokens_scanned: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Records a file whose content was read successfully
    pub fn record_file_read(&self, bytes: u64, memory_mapped: bool) {
        self.files_read.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
        if memory_mapped {
            self.mmap_files.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records a file that could not be read or decoded
    pub fn record_file_skipped(&self) {
        self.files_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tokens(&self, tokens: u64) {
        self.tokens_scanned.fetch_add(tokens, Ordering::Relaxed);
    }

    /// Zeroes every counter
    pub fn reset(&self) {
        for counter in [
            &self.files_read,
            &self.files_skipped,
            &self.mmap_files,
            &self.bytes_read,
            &self.tokens_scanned,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    pub fn get_stats(&self) -> ScanStats {
        ScanStats {
            files_read: self.files_read.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
            mmap_files: self.mmap_files.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            tokens_scanned: self.tokens_scanned.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Scan stats:\n\
             Files read/skipped: {}/{}\n\
             Memory mapped files: {}\n\
             Bytes read: {}\n\
             Tokens scanned: {}",
            stats.files_read,
            stats.files_skipped,
            stats.mmap_files,
            stats.bytes_read,
            stats.tokens_scanned
        );
    }
}

impl Default for ScanMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`ScanMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub files_read: u64,
    pub files_skipped: u64,
    pub mmap_files: u64,
    pub bytes_read: u64,
    pub tokens_scanned: u64,
}

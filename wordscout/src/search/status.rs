use std::fmt;

/// Engine-wide lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RunStatus {
    /// No file list cached; the next search enumerates first
    #[default]
    Idle,
    /// Phase 1 (directory walk) in progress
    Scanning,
    /// A run finished; the file list is cached for the next search
    Ready,
    /// Phase 2 (token counting) in progress
    Searching,
    /// Cancellation requested, waiting for in-flight work to drain
    Cancelling,
}

impl RunStatus {
    /// True while a run is executing or draining
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            RunStatus::Scanning | RunStatus::Searching | RunStatus::Cancelling
        )
    }

    /// Whether a new search (or a directory change) may start from this state
    pub fn accepts_search(&self) -> bool {
        matches!(self, RunStatus::Idle | RunStatus::Ready)
    }

    /// Status line for a host UI. `cached_files` is the size of the file list
    /// available for the next search.
    pub fn describe(&self, cached_files: usize) -> String {
        match self {
            RunStatus::Idle => "Ready to scan directory...".to_string(),
            RunStatus::Scanning => "Scanning directory...".to_string(),
            RunStatus::Ready => format!(
                "Ready to search ... {} files were found in the directory",
                cached_files
            ),
            RunStatus::Searching => "Searching...".to_string(),
            RunStatus::Cancelling => "Cancelling...".to_string(),
        }
    }

    /// Label of the combined exit/stop control
    pub fn stop_label(&self) -> &'static str {
        match self {
            RunStatus::Idle | RunStatus::Ready => "Exit",
            RunStatus::Cancelling => "Cancelling...",
            RunStatus::Scanning | RunStatus::Searching => "Stop",
        }
    }

    /// Whether a progress indicator should be indeterminate (no total known yet)
    pub fn progress_indeterminate(&self) -> bool {
        *self == RunStatus::Scanning
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStatus::Idle => "Idle",
            RunStatus::Scanning => "Scanning",
            RunStatus::Ready => "Ready",
            RunStatus::Searching => "Searching",
            RunStatus::Cancelling => "Cancelling",
        };
        f.write_str(name)
    }
}

/// What a stop request resulted in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Nothing was running; the host should shut down
    Shutdown,
    /// A running scan or search was asked to cancel
    Cancelling,
    /// Cancellation had already been requested
    AlreadyCancelling,
}

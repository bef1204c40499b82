use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::status::RunStatus;
use crate::results::{MatchResult, SearchOutcome};

/// Notifications emitted by the engine while a run is in progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
    StatusChanged(RunStatus),
    /// Completion percentage of the search phase; strictly increasing per run
    Progress(u8),
    Match(MatchResult),
    Finished(SearchOutcome),
}

/// Receiver of [`SearchEvent`]s.
///
/// Events arrive on whichever thread produced them, including pool workers,
/// so implementations should be cheap. No engine lock is held while a sink
/// runs, so a sink may call back into a stop handle. `Progress` events are
/// delivered one at a time in increasing order; a slow sink delays only the
/// workers waiting to report the next percentage. Any
/// `Fn(SearchEvent) + Send + Sync` closure is a sink.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SearchEvent);
}

impl<F> EventSink for F
where
    F: Fn(SearchEvent) + Send + Sync,
{
    fn emit(&self, event: SearchEvent) {
        self(event)
    }
}

/// Sink that drops everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: SearchEvent) {}
}

/// Forwards events for one run generation, going silent once a newer run has started
#[derive(Clone)]
pub(crate) struct RunEmitter {
    sink: Arc<dyn EventSink>,
    current: Arc<AtomicU64>,
    generation: u64,
}

impl RunEmitter {
    pub(crate) fn new(sink: Arc<dyn EventSink>, current: Arc<AtomicU64>, generation: u64) -> Self {
        Self {
            sink,
            current,
            generation,
        }
    }

    pub(crate) fn emit(&self, event: SearchEvent) {
        if self.current.load(Ordering::SeqCst) == self.generation {
            self.sink.emit(event);
        }
    }
}

use std::sync::{Condvar, Mutex, MutexGuard};

/// Snapshot of the progress counters for one phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressState {
    pub total_units: usize,
    pub completed_units: usize,
    /// Last percentage handed out; never decreases within a run
    pub percent_displayed: u8,
}

impl ProgressState {
    /// Human readable percentage, `None` until something has been reported
    pub fn display(&self) -> Option<String> {
        if self.percent_displayed == 0 {
            None
        } else {
            Some(format!("{} %", self.percent_displayed))
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    state: ProgressState,
    // Tickets handed to crossed thresholds, in percentage order
    issued: u64,
}

/// Lets ticket holders through one at a time, lowest ticket first
#[derive(Debug, Default)]
struct Turnstile {
    served: Mutex<u64>,
    turn: Condvar,
}

impl Turnstile {
    fn wait_for(&self, ticket: u64) -> Turn<'_> {
        let mut served = self.lock();
        while *served != ticket {
            served = self
                .turn
                .wait(served)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        Turn { turnstile: self }
    }

    fn reset(&self) {
        *self.lock() = 0;
    }

    fn lock(&self) -> MutexGuard<'_, u64> {
        self.served.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Passes the turn on when dropped, including on unwind
struct Turn<'a> {
    turnstile: &'a Turnstile,
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        *self.turnstile.lock() += 1;
        self.turnstile.turn.notify_all();
    }
}

/// Thread-safe completion counter expressed on a 0-100 scale.
///
/// The increment and the threshold comparison happen under a single lock, so
/// concurrent workers can never both observe the same stale displayed value:
/// each integer percentage that is crossed is handed out exactly once, and
/// in increasing order.
#[derive(Debug, Default)]
pub struct ProgressAggregator {
    counters: Mutex<Counters>,
    turnstile: Turnstile,
}

impl ProgressAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new phase of `total_units` units, resetting all counters.
    ///
    /// Must not race with completions of the previous phase.
    pub fn configure(&self, total_units: usize) {
        let mut counters = self.lock();
        *counters = Counters {
            state: ProgressState {
                total_units,
                ..ProgressState::default()
            },
            issued: 0,
        };
        self.turnstile.reset();
    }

    /// Records one finished unit, returning the new percentage if it crossed a threshold
    pub fn record_completion(&self) -> Option<u8> {
        let mut counters = self.lock();
        Self::advance(&mut counters.state)
    }

    /// Like [`record_completion`](Self::record_completion) but also hands a
    /// crossed percentage to `notify`.
    ///
    /// `notify` runs after the counter lock is released, so workers that do
    /// not cross a threshold never wait on it. Calls for successive
    /// percentages still happen one at a time and in increasing order.
    pub fn record_completion_with<F>(&self, notify: F) -> Option<u8>
    where
        F: FnOnce(u8),
    {
        let (percent, ticket) = {
            let mut counters = self.lock();
            let percent = Self::advance(&mut counters.state)?;
            let ticket = counters.issued;
            counters.issued += 1;
            (percent, ticket)
        };

        let _turn = self.turnstile.wait_for(ticket);
        notify(percent);
        Some(percent)
    }

    /// Current counters
    pub fn snapshot(&self) -> ProgressState {
        self.lock().state
    }

    fn advance(state: &mut ProgressState) -> Option<u8> {
        if state.total_units == 0 || state.completed_units >= state.total_units {
            return None;
        }

        state.completed_units += 1;
        let percent = rounded_percent(state.completed_units, state.total_units);
        if percent > state.percent_displayed {
            state.percent_displayed = percent;
            Some(percent)
        } else {
            None
        }
    }

    fn lock(&self) -> MutexGuard<'_, Counters> {
        // The state is plain counters; a panic elsewhere cannot leave it torn
        self.counters.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// `round(100 * completed / total)` with halves rounded up, in integer arithmetic
pub fn rounded_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total) as u128;
    let total = total as u128;
    ((200 * completed + total) / (2 * total)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_rounded_percent() {
        assert_eq!(rounded_percent(0, 10), 0);
        assert_eq!(rounded_percent(1, 3), 33);
        assert_eq!(rounded_percent(2, 3), 67);
        assert_eq!(rounded_percent(1, 200), 1); // 0.5 rounds up
        assert_eq!(rounded_percent(1, 201), 0);
        assert_eq!(rounded_percent(7, 7), 100);
        assert_eq!(rounded_percent(9, 7), 100);
        assert_eq!(rounded_percent(1, 0), 0);
    }

    #[test]
    fn test_sequential_emissions_for_small_total() {
        let progress = ProgressAggregator::new();
        progress.configure(4);

        let emitted: Vec<_> = (0..4).filter_map(|_| progress.record_completion()).collect();
        assert_eq!(emitted, vec![25, 50, 75, 100]);
        assert_eq!(progress.snapshot().display(), Some("100 %".to_string()));
    }

    #[test]
    fn test_same_bucket_is_suppressed() {
        let progress = ProgressAggregator::new();
        progress.configure(1000);

        let emitted: Vec<_> = (0..1000)
            .filter_map(|_| progress.record_completion())
            .collect();
        assert_eq!(emitted, (1..=100).collect::<Vec<u8>>());
    }

    #[test]
    fn test_extra_completions_are_ignored() {
        let progress = ProgressAggregator::new();
        progress.configure(1);
        assert_eq!(progress.record_completion(), Some(100));
        assert_eq!(progress.record_completion(), None);
        assert_eq!(progress.snapshot().completed_units, 1);
    }

    #[test]
    fn test_configure_resets() {
        let progress = ProgressAggregator::new();
        progress.configure(2);
        progress.record_completion();
        assert_eq!(progress.snapshot().percent_displayed, 50);

        progress.configure(3);
        let state = progress.snapshot();
        assert_eq!(state.total_units, 3);
        assert_eq!(state.completed_units, 0);
        assert_eq!(state.percent_displayed, 0);
        assert_eq!(state.display(), None);
    }

    #[test]
    fn test_unconfigured_never_emits() {
        let progress = ProgressAggregator::new();
        assert_eq!(progress.record_completion(), None);
    }

    #[test]
    fn test_notify_runs_without_counter_lock() {
        let progress = ProgressAggregator::new();
        progress.configure(2);

        let mut seen = Vec::new();
        progress.record_completion_with(|p| seen.push((p, progress.snapshot().completed_units)));
        progress.record_completion_with(|p| seen.push((p, progress.snapshot().completed_units)));
        assert_eq!(seen, vec![(50, 1), (100, 2)]);
    }

    #[test]
    fn test_reconfigure_after_notifications_resets_turns() {
        let progress = ProgressAggregator::new();
        progress.configure(2);
        progress.record_completion_with(|_| {});
        progress.record_completion_with(|_| {});

        progress.configure(1);
        let mut seen = None;
        progress.record_completion_with(|p| seen = Some(p));
        assert_eq!(seen, Some(100));
    }

    #[test]
    fn test_concurrent_completions_emit_each_threshold_once_in_order() {
        const UNITS: usize = 5_000;
        const THREADS: usize = 8;

        let progress = Arc::new(ProgressAggregator::new());
        progress.configure(UNITS);
        let emitted = Arc::new(std::sync::Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let progress = Arc::clone(&progress);
                let emitted = Arc::clone(&emitted);
                let share = UNITS / THREADS + usize::from(t < UNITS % THREADS);
                thread::spawn(move || {
                    for _ in 0..share {
                        progress.record_completion_with(|p| emitted.lock().unwrap().push(p));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let emitted = emitted.lock().unwrap();
        assert_eq!(*emitted, (1..=100).collect::<Vec<u8>>());
        assert_eq!(progress.snapshot().completed_units, UNITS);
    }
}

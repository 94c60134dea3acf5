//! Opt-in evaluation telemetry.
//!
//! The composer never logs on its own. Callers that want visibility hand an
//! [`EvalObserver`] to an [`Evaluator`](crate::Evaluator); [`TracingObserver`]
//! forwards outcomes to `tracing`, [`CountingObserver`] tallies them.
//!
//! ## Conventions
//!
//! - All events use target `predicate_composer`
//! - `event`: snake_case event name (required)
//! - No global subscriber is installed; applications configure `tracing`

use crate::predicate::Predicate;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Target for all composer log events.
pub(crate) const COMPOSER_TARGET: &str = "predicate_composer";

macro_rules! log_debug {
    ($($field:tt)*) => {
        ::tracing::debug!(target: $crate::observer::COMPOSER_TARGET, $($field)*)
    };
}

macro_rules! log_trace {
    ($($field:tt)*) => {
        ::tracing::trace!(target: $crate::observer::COMPOSER_TARGET, $($field)*)
    };
}

/// Receives evaluation outcomes. Shared across threads with the evaluator.
pub trait EvalObserver: Send + Sync {
    /// Called after each evaluated predicate
    fn on_predicate(&self, _predicate: &Predicate, _matched: bool) {}

    /// Called after each record a filter has tested
    fn on_record(&self, _matched: bool) {}
}

/// Emits a `tracing` event per predicate (trace) and per record (debug)
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl EvalObserver for TracingObserver {
    fn on_predicate(&self, predicate: &Predicate, matched: bool) {
        log_trace!(
            event = "predicate_evaluated",
            field = %predicate.field(),
            operator = %predicate.operator(),
            matched,
        );
    }

    fn on_record(&self, matched: bool) {
        log_debug!(event = "record_filtered", matched);
    }
}

/// Snapshot of [`CountingObserver`] totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalCounts {
    pub predicates: usize,
    pub records: usize,
    pub matched: usize,
}

/// Counts evaluated predicates, tested records and matches
#[derive(Debug, Default)]
pub struct CountingObserver {
    predicates: AtomicUsize,
    records: AtomicUsize,
    matched: AtomicUsize,
}

impl CountingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counts(&self) -> EvalCounts {
        EvalCounts {
            predicates: self.predicates.load(Ordering::Relaxed),
            records: self.records.load(Ordering::Relaxed),
            matched: self.matched.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.predicates.store(0, Ordering::Relaxed);
        self.records.store(0, Ordering::Relaxed);
        self.matched.store(0, Ordering::Relaxed);
    }
}

impl EvalObserver for CountingObserver {
    fn on_predicate(&self, _predicate: &Predicate, _matched: bool) {
        self.predicates.fetch_add(1, Ordering::Relaxed);
    }

    fn on_record(&self, matched: bool) {
        self.records.fetch_add(1, Ordering::Relaxed);
        if matched {
            self.matched.fetch_add(1, Ordering::Relaxed);
        }
    }
}

//! Timing wrapper installed in place of a watched registration.
//!
//! A [`TimedHandler`] dispatches through the very executor of the registration
//! it replaces and keeps count, total and maximum duration of every
//! synchronous invocation. When reporting is enabled, any single invocation
//! slower than the threshold is handed to a [`DurationReportSink`].

use crate::clock::{Clock, MonotonicClock};
use crate::dispatch::{
    call_through, Aggregates, EventExecutor, HandlerTimings, Listener, Owner, Priority,
    RegisteredHandler, TimingSnapshot,
};
use crate::error::{HandlerError, WatchError};
use crate::event::{Event, EventClass};
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Receives invocations that took longer than a wrapper's report threshold.
///
/// Called synchronously from inside dispatch, after the wrapper's aggregates
/// already include the slow invocation.
pub trait DurationReportSink: Send + Sync {
    fn report_duration(&self, handler: &TimedHandler, elapsed_nanos: u64);
}

pub struct TimedHandler {
    listener: Arc<dyn Listener>,
    executor: Arc<dyn EventExecutor>,
    priority: Priority,
    owner: Owner,
    ignore_cancelled: bool,
    report: bool,
    report_threshold_nanos: u64,
    sink: Arc<dyn DurationReportSink>,
    clock: Arc<dyn Clock>,
    aggregates: Mutex<Aggregates>,
}

impl TimedHandler {
    /// Builds a wrapper that takes over `original`'s listener, executor,
    /// priority, owner and cancellation filter.
    ///
    /// Fails with [`WatchError::ExecutorUnavailable`] when `original` does not
    /// expose its executor. Wrapping another `TimedHandler` yields a fresh
    /// wrapper around the same executor with zeroed aggregates.
    pub fn new(
        original: &dyn RegisteredHandler,
        report: bool,
        report_threshold_nanos: u64,
        sink: Arc<dyn DurationReportSink>,
    ) -> Result<Self, WatchError> {
        let executor = original
            .executor()
            .cloned()
            .ok_or_else(|| WatchError::ExecutorUnavailable {
                owner: original.owner().name().to_string(),
                listener: original.listener().name().to_string(),
            })?;

        Ok(Self {
            listener: original.listener().clone(),
            executor,
            priority: original.priority(),
            owner: original.owner().clone(),
            ignore_cancelled: original.ignores_cancelled(),
            report,
            report_threshold_nanos,
            sink,
            clock: Arc::new(MonotonicClock::new()),
            aggregates: Mutex::new(Aggregates::default()),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn event_executor(&self) -> &Arc<dyn EventExecutor> {
        &self.executor
    }

    pub fn is_reporting(&self) -> bool {
        self.report
    }

    pub fn report_threshold_nanos(&self) -> u64 {
        self.report_threshold_nanos
    }

    pub fn count(&self) -> u64 {
        self.aggregates.lock().snapshot().count
    }

    pub fn total_nanos(&self) -> u64 {
        self.aggregates.lock().snapshot().total_nanos
    }

    pub fn max_nanos(&self) -> u64 {
        self.aggregates.lock().snapshot().max_nanos
    }

    /// Lowest common ancestor of every event class timed so far.
    pub fn event_class(&self) -> Option<&'static EventClass> {
        self.aggregates.lock().snapshot().event_class
    }

    pub fn has_multiple(&self) -> bool {
        self.aggregates.lock().snapshot().multiple
    }

    pub fn snapshot(&self) -> TimingSnapshot {
        self.aggregates.lock().snapshot()
    }

    /// Zeroes count, total and max. The tracked event class and the multiple
    /// flag are kept.
    pub fn reset(&self) {
        self.aggregates.lock().reset();
    }
}

impl RegisteredHandler for TimedHandler {
    fn listener(&self) -> &Arc<dyn Listener> {
        &self.listener
    }

    fn executor(&self) -> Option<&Arc<dyn EventExecutor>> {
        Some(&self.executor)
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn owner(&self) -> &Owner {
        &self.owner
    }

    fn ignores_cancelled(&self) -> bool {
        self.ignore_cancelled
    }

    fn call_event(&self, event: &dyn Event) -> Result<(), HandlerError> {
        if event.is_asynchronous() {
            return call_through(&self.executor, &self.listener, self.ignore_cancelled, event);
        }

        let start = self.clock.now_nanos();
        let result = call_through(&self.executor, &self.listener, self.ignore_cancelled, event);
        let elapsed = self.clock.now_nanos().saturating_sub(start);

        self.aggregates.lock().record(event.class(), elapsed);

        if self.report && elapsed > self.report_threshold_nanos {
            self.sink.report_duration(self, elapsed);
        }
        result
    }

    fn timings(&self) -> Option<&dyn HandlerTimings> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl HandlerTimings for TimedHandler {
    fn snapshot(&self) -> TimingSnapshot {
        TimedHandler::snapshot(self)
    }

    fn tracks_max(&self) -> bool {
        true
    }

    fn reset(&self) {
        TimedHandler::reset(self);
    }
}

impl fmt::Debug for TimedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimedHandler")
            .field("listener", &self.listener.name())
            .field("owner", &self.owner)
            .field("priority", &self.priority)
            .field("report", &self.report)
            .field("report_threshold_nanos", &self.report_threshold_nanos)
            .field("aggregates", &self.snapshot())
            .finish()
    }
}

//! Timing capability shared by the host's timed registrations and watch wrappers.

use crate::clock::Clock;
use crate::dispatch::priority::Priority;
use crate::dispatch::registration::{
    call_through, EventExecutor, Listener, Owner, RegisteredHandler,
};
use crate::error::HandlerError;
use crate::event::{Event, EventClass};
use parking_lot::Mutex;
use std::any::Any;
use std::sync::Arc;

/// Read and reset access to a registration's accumulated timings.
pub trait HandlerTimings {
    /// Every aggregate, read under one lock.
    fn snapshot(&self) -> TimingSnapshot;

    /// Whether `snapshot().max_nanos` is meaningful for this registration.
    fn tracks_max(&self) -> bool {
        false
    }

    fn reset(&self);

    fn count(&self) -> u64 {
        self.snapshot().count
    }

    fn total_nanos(&self) -> u64 {
        self.snapshot().total_nanos
    }

    /// Only registrations that track a per-call maximum return `Some`.
    fn max_nanos(&self) -> Option<u64> {
        self.tracks_max().then(|| self.snapshot().max_nanos)
    }

    fn event_class(&self) -> Option<&'static EventClass> {
        self.snapshot().event_class
    }

    fn has_multiple(&self) -> bool {
        self.snapshot().multiple
    }
}

/// A consistent copy of every aggregate, taken under one lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimingSnapshot {
    pub count: u64,
    pub total_nanos: u64,
    pub max_nanos: u64,
    pub event_class: Option<&'static EventClass>,
    pub multiple: bool,
}

#[derive(Debug, Default)]
pub(crate) struct Aggregates {
    count: u64,
    total_nanos: u64,
    max_nanos: u64,
    event_class: Option<&'static EventClass>,
    multiple: bool,
}

impl Aggregates {
    /// Folds one timed invocation of an event of `class` into the aggregates.
    pub(crate) fn record(&mut self, class: &'static EventClass, elapsed_nanos: u64) {
        self.count = self.count.saturating_add(1);
        match self.event_class {
            None => self.event_class = Some(class),
            Some(tracked) if tracked != class => {
                self.multiple = true;
                self.event_class = Some(class.common_ancestor(tracked));
            }
            Some(_) => {}
        }
        self.max_nanos = self.max_nanos.max(elapsed_nanos);
        self.total_nanos = self.total_nanos.saturating_add(elapsed_nanos);
    }

    /// Clears the measurements. Class tracking survives a reset.
    pub(crate) fn reset(&mut self) {
        self.count = 0;
        self.total_nanos = 0;
        self.max_nanos = 0;
    }

    pub(crate) fn snapshot(&self) -> TimingSnapshot {
        TimingSnapshot {
            count: self.count,
            total_nanos: self.total_nanos,
            max_nanos: self.max_nanos,
            event_class: self.event_class,
            multiple: self.multiple,
        }
    }
}

/// The host's own minimally timed registration: count, total and class tracking.
pub struct TimedRegistration {
    listener: Arc<dyn Listener>,
    executor: Arc<dyn EventExecutor>,
    priority: Priority,
    owner: Owner,
    ignore_cancelled: bool,
    clock: Arc<dyn Clock>,
    aggregates: Mutex<Aggregates>,
}

impl TimedRegistration {
    pub fn new(
        listener: Arc<dyn Listener>,
        executor: Arc<dyn EventExecutor>,
        priority: Priority,
        owner: Owner,
        ignore_cancelled: bool,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            listener,
            executor,
            priority,
            owner,
            ignore_cancelled,
            clock,
            aggregates: Mutex::new(Aggregates::default()),
        }
    }
}

impl RegisteredHandler for TimedRegistration {
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
        result
    }

    fn timings(&self) -> Option<&dyn HandlerTimings> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl HandlerTimings for TimedRegistration {
    fn snapshot(&self) -> TimingSnapshot {
        self.aggregates.lock().snapshot()
    }

    fn reset(&self) {
        self.aggregates.lock().reset();
    }
}

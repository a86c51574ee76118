//! Swapping timing wrappers in and out of a live dispatch table.

use crate::clock::{Clock, MonotonicClock};
use crate::dispatch::{DispatchTable, Owner, RegisteredHandler, Registration, TimedRegistration};
use crate::error::WatchError;
use crate::timed::{DurationReportSink, TimedHandler};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// Owner specifier that selects every loaded owner.
pub const ALL_OWNERS: &str = "all";

#[derive(Debug, Default)]
pub struct WatchReport {
    /// Registrations swapped in this call.
    pub affected: usize,
    /// Registrations left as they were because they could not be wrapped.
    pub skipped: Vec<WatchError>,
    /// Handler lists whose dispatch snapshot was rebuilt.
    pub lists_rebaked: usize,
}

pub struct WatchController {
    table: Arc<DispatchTable>,
    clock: Arc<dyn Clock>,
    serial: Mutex<()>,
}

impl WatchController {
    pub fn new(table: Arc<DispatchTable>) -> Self {
        Self {
            table,
            clock: Arc::new(MonotonicClock::new()),
            serial: Mutex::new(()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn table(&self) -> &Arc<DispatchTable> {
        &self.table
    }

    /// `"all"` selects every loaded owner; anything else must match an owner
    /// name exactly.
    pub fn resolve_owners(&self, specifier: &str) -> HashSet<Owner> {
        if specifier == ALL_OWNERS {
            return self.table.owners().into_iter().collect();
        }
        self.table.owner(specifier).into_iter().collect()
    }

    pub fn watch(
        &self,
        owners: &HashSet<Owner>,
        report: bool,
        report_threshold_nanos: u64,
        sink: Arc<dyn DurationReportSink>,
    ) -> WatchReport {
        let _serial = self.serial.lock();
        let mut outcome = WatchReport::default();

        for list in self.table.handler_lists() {
            let mut replaced = 0;
            for old in list.registered_handlers() {
                if !owners.contains(old.owner()) {
                    continue;
                }
                let built =
                    TimedHandler::new(old.as_ref(), report, report_threshold_nanos, sink.clone());
                let wrapper = match built {
                    Ok(wrapper) => wrapper.with_clock(self.clock.clone()),
                    Err(error) => {
                        tracing::warn!(
                            event = list.event_class().simple_name(),
                            "watch skipped a registration: {}",
                            error
                        );
                        outcome.skipped.push(error);
                        continue;
                    }
                };
                if list.replace(&old, Arc::new(wrapper)) {
                    replaced += 1;
                }
            }
            if replaced > 0 {
                list.bake();
                outcome.affected += replaced;
                outcome.lists_rebaked += 1;
            }
        }

        tracing::debug!(
            affected = outcome.affected,
            skipped = outcome.skipped.len(),
            report,
            report_threshold_nanos,
            "watch complete"
        );
        outcome
    }

    /// Restores the plain registration behind every installed wrapper owned
    /// by `owners`. Unwrapped registrations are left alone.
    pub fn unwatch(&self, owners: &HashSet<Owner>) -> WatchReport {
        let _serial = self.serial.lock();
        let mut outcome = WatchReport::default();
        let use_timings = self.table.use_timings();

        for list in self.table.handler_lists() {
            let mut replaced = 0;
            for old in list.registered_handlers() {
                if !owners.contains(old.owner()) {
                    continue;
                }
                let Some(wrapper) = old.as_any().downcast_ref::<TimedHandler>() else {
                    continue;
                };
                let restored: Arc<dyn RegisteredHandler> = if use_timings {
                    Arc::new(TimedRegistration::new(
                        wrapper.listener().clone(),
                        wrapper.event_executor().clone(),
                        wrapper.priority(),
                        wrapper.owner().clone(),
                        wrapper.ignores_cancelled(),
                        self.clock.clone(),
                    ))
                } else {
                    Arc::new(Registration::new(
                        wrapper.listener().clone(),
                        wrapper.event_executor().clone(),
                        wrapper.priority(),
                        wrapper.owner().clone(),
                        wrapper.ignores_cancelled(),
                    ))
                };
                if list.replace(&old, restored) {
                    replaced += 1;
                }
            }
            if replaced > 0 {
                list.bake();
                outcome.affected += replaced;
                outcome.lists_rebaked += 1;
            }
        }

        tracing::debug!(affected = outcome.affected, "unwatch complete");
        outcome
    }

    /// Wrappers currently installed, in handler-list then dispatch order.
    pub fn watched(&self) -> Vec<Arc<dyn RegisteredHandler>> {
        self.table
            .handler_lists()
            .iter()
            .flat_map(|list| list.registered_handlers())
            .filter(|handler| handler.as_any().is::<TimedHandler>())
            .collect()
    }
}

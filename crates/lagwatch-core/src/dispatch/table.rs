use crate::dispatch::handler_list::HandlerList;
use crate::dispatch::priority::Priority;
use crate::dispatch::registration::{Owner, RegisteredHandler};
use crate::error::HandlerError;
use crate::event::{Event, EventClass};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug)]
pub struct DispatchFailure {
    pub owner: Owner,
    pub listener: String,
    pub error: HandlerError,
}

#[derive(Debug, Default)]
pub struct DispatchOutcome {
    pub invoked: usize,
    pub failures: Vec<DispatchFailure>,
}

impl DispatchOutcome {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// One row of the host's timing report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingsRow {
    pub owner: Owner,
    pub listener: String,
    pub priority: Priority,
    pub count: u64,
    pub total_nanos: u64,
    pub max_nanos: Option<u64>,
    pub event_class: Option<&'static EventClass>,
    pub multiple: bool,
}

/// Process-wide table of handler lists plus the set of loaded owners.
pub struct DispatchTable {
    lists: RwLock<Vec<Arc<HandlerList>>>,
    owners: RwLock<BTreeMap<String, Owner>>,
    use_timings: AtomicBool,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self {
            lists: RwLock::new(Vec::new()),
            owners: RwLock::new(BTreeMap::new()),
            use_timings: AtomicBool::new(false),
        }
    }

    /// Returns the list for exactly `class`, creating it if needed.
    pub fn handler_list(&self, class: &'static EventClass) -> Arc<HandlerList> {
        if let Some(list) = self.find_handler_list(class) {
            return list;
        }
        let mut lists = self.lists.write();
        if let Some(list) = lists.iter().find(|l| l.event_class() == class) {
            return list.clone();
        }
        let list = Arc::new(HandlerList::new(class));
        lists.push(list.clone());
        list
    }

    pub fn find_handler_list(&self, class: &'static EventClass) -> Option<Arc<HandlerList>> {
        self.lists
            .read()
            .iter()
            .find(|l| l.event_class() == class)
            .cloned()
    }

    /// The list an event of `class` is dispatched through: its own, or the
    /// nearest ancestor's.
    pub fn resolve_handler_list(&self, class: &'static EventClass) -> Option<Arc<HandlerList>> {
        let lists = self.lists.read();
        class
            .ancestors()
            .find_map(|ancestor| lists.iter().find(|l| l.event_class() == ancestor))
            .cloned()
    }

    pub fn handler_lists(&self) -> Vec<Arc<HandlerList>> {
        self.lists.read().clone()
    }

    pub fn register(&self, class: &'static EventClass, handler: Arc<dyn RegisteredHandler>) {
        self.handler_list(class).register(handler);
    }

    pub fn load_owner(&self, name: &str) -> Owner {
        self.owners
            .write()
            .entry(name.to_string())
            .or_insert_with(|| Owner::new(name))
            .clone()
    }

    /// Forgets `owner` and drops every registration it holds.
    pub fn unload_owner(&self, owner: &Owner) -> usize {
        self.owners.write().remove(owner.name());
        self.handler_lists()
            .iter()
            .map(|list| list.unregister_owner(owner))
            .sum()
    }

    pub fn owners(&self) -> Vec<Owner> {
        self.owners.read().values().cloned().collect()
    }

    pub fn owner(&self, name: &str) -> Option<Owner> {
        self.owners.read().get(name).cloned()
    }

    pub fn use_timings(&self) -> bool {
        self.use_timings.load(Ordering::Relaxed)
    }

    pub fn set_use_timings(&self, enabled: bool) {
        self.use_timings.store(enabled, Ordering::Relaxed);
    }

    /// Calls every handler for `event` in priority order. A failing handler is
    /// logged and recorded; the remaining handlers still run.
    pub fn call_event(&self, event: &dyn Event) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        let Some(list) = self.resolve_handler_list(event.class()) else {
            return outcome;
        };

        for handler in list.handlers().iter() {
            outcome.invoked += 1;
            if let Err(error) = handler.call_event(event) {
                tracing::warn!(
                    owner = %handler.owner(),
                    listener = handler.listener().name(),
                    event = event.class().simple_name(),
                    "Could not pass event: {}",
                    error
                );
                outcome.failures.push(DispatchFailure {
                    owner: handler.owner().clone(),
                    listener: handler.listener().name().to_string(),
                    error,
                });
            }
        }

        outcome
    }

    /// One row per timing-capable registration. Each row comes from a single
    /// snapshot, so its fields always belong to the same set of calls.
    pub fn timings(&self) -> Vec<TimingsRow> {
        let mut rows = Vec::new();
        for list in self.handler_lists() {
            for handler in list.registered_handlers() {
                let Some(timings) = handler.timings() else {
                    continue;
                };
                let snapshot = timings.snapshot();
                rows.push(TimingsRow {
                    owner: handler.owner().clone(),
                    listener: handler.listener().name().to_string(),
                    priority: handler.priority(),
                    count: snapshot.count,
                    total_nanos: snapshot.total_nanos,
                    max_nanos: timings.tracks_max().then_some(snapshot.max_nanos),
                    event_class: snapshot.event_class,
                    multiple: snapshot.multiple,
                });
            }
        }
        rows
    }

    pub fn reset_timings(&self) {
        for list in self.handler_lists() {
            for handler in list.registered_handlers() {
                if let Some(timings) = handler.timings() {
                    timings.reset();
                }
            }
        }
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::new()
    }
}

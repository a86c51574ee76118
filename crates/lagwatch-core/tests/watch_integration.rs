use lagwatch_core::{
    executor_fn, BasicEvent, DispatchTable, DurationReportSink, Event, EventClass, EventExecutor,
    HandlerError, Listener, ManualClock, NamedListener, Owner, Priority, RegisteredHandler,
    Registration, TimedHandler, TimedRegistration, WatchController, EVENT,
};
use parking_lot::Mutex;
use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

static E: EventClass = EventClass::new("E", &EVENT);
static BLOCK_EVENT: EventClass = EventClass::new("BlockEvent", &EVENT);
static BLOCK_BREAK: EventClass = EventClass::new("BlockBreak", &BLOCK_EVENT);

/// Sink that records every report it receives.
#[derive(Default)]
struct CollectingSink {
    reports: Mutex<Vec<(String, u64, u64)>>,
}

impl DurationReportSink for CollectingSink {
    fn report_duration(&self, handler: &TimedHandler, elapsed_nanos: u64) {
        self.reports.lock().push((
            handler.owner().name().to_string(),
            elapsed_nanos,
            handler.max_nanos(),
        ));
    }
}

fn logging_registration(
    log: &Arc<Mutex<Vec<String>>>,
    name: &str,
    owner: &Owner,
    priority: Priority,
    ignore_cancelled: bool,
) -> Arc<dyn RegisteredHandler> {
    let log = log.clone();
    let entry = name.to_string();
    Arc::new(Registration::new(
        Arc::new(NamedListener::new(name)),
        executor_fn(move |_, _| {
            log.lock().push(entry.clone());
            Ok(())
        }),
        priority,
        owner.clone(),
        ignore_cancelled,
    ))
}

fn timed(handler: &Arc<dyn RegisteredHandler>) -> &TimedHandler {
    handler
        .as_any()
        .downcast_ref::<TimedHandler>()
        .expect("registration should be wrapped")
}

#[test]
fn test_alpha_low_and_high_are_wrapped_and_restored() {
    let table = Arc::new(DispatchTable::new());
    let alpha = table.load_owner("Alpha");
    let beta = table.load_owner("Beta");
    let log = Arc::new(Mutex::new(Vec::new()));
    table.register(&E, logging_registration(&log, "alpha-high", &alpha, Priority::High, false));
    table.register(&E, logging_registration(&log, "beta-normal", &beta, Priority::Normal, false));
    table.register(&E, logging_registration(&log, "alpha-low", &alpha, Priority::Low, false));

    let controller = WatchController::new(table.clone());
    let sink = Arc::new(CollectingSink::default());
    let report = controller.watch(&controller.resolve_owners("Alpha"), false, 0, sink);
    assert_eq!(report.affected, 2);
    assert_eq!(report.lists_rebaked, 1);

    let wrappers = controller.watched();
    assert_eq!(wrappers.len(), 2);

    table.call_event(&BasicEvent::new(&E));
    assert_eq!(*log.lock(), vec!["alpha-low", "beta-normal", "alpha-high"]);
    assert_eq!(timed(&wrappers[0]).count(), 1);
    assert_eq!(timed(&wrappers[1]).count(), 1);
    assert_eq!(timed(&wrappers[0]).priority(), Priority::Low);
    assert_eq!(timed(&wrappers[1]).priority(), Priority::High);

    controller.unwatch(&controller.resolve_owners("Alpha"));
    assert!(controller.watched().is_empty());

    log.lock().clear();
    table.call_event(&BasicEvent::new(&E));
    assert_eq!(*log.lock(), vec!["alpha-low", "beta-normal", "alpha-high"]);
    assert_eq!(timed(&wrappers[0]).count(), 1);
    assert_eq!(timed(&wrappers[1]).count(), 1);
}

#[test]
fn test_watch_then_unwatch_is_invisible_to_dispatch() {
    let table = Arc::new(DispatchTable::new());
    let alpha = table.load_owner("Alpha");
    let beta = table.load_owner("Beta");
    let log = Arc::new(Mutex::new(Vec::new()));
    table.register(&E, logging_registration(&log, "a1", &alpha, Priority::Normal, true));
    table.register(&E, logging_registration(&log, "b1", &beta, Priority::Normal, false));
    table.register(&E, logging_registration(&log, "a2", &alpha, Priority::Normal, false));
    table.register(&E, logging_registration(&log, "a3", &alpha, Priority::Monitor, true));

    let fire = |cancelled: bool| {
        log.lock().clear();
        let event = BasicEvent::new(&E);
        event.set_cancelled(cancelled);
        table.call_event(&event);
        log.lock().clone()
    };
    let before = (fire(false), fire(true));
    let listeners_before: Vec<_> = table
        .handler_list(&E)
        .registered_handlers()
        .iter()
        .map(|h| (h.listener().name().to_string(), h.priority(), h.ignores_cancelled()))
        .collect();

    let controller = WatchController::new(table.clone());
    let alpha_only = controller.resolve_owners("Alpha");
    controller.watch(&alpha_only, false, 0, Arc::new(CollectingSink::default()));
    let during = (fire(false), fire(true));
    controller.unwatch(&alpha_only);
    let after = (fire(false), fire(true));

    assert_eq!(before.0, vec!["a1", "b1", "a2", "a3"]);
    assert_eq!(before.1, vec!["b1", "a2"]);
    assert_eq!(during, before);
    assert_eq!(after, before);

    let listeners_after: Vec<_> = table
        .handler_list(&E)
        .registered_handlers()
        .iter()
        .map(|h| (h.listener().name().to_string(), h.priority(), h.ignores_cancelled()))
        .collect();
    assert_eq!(listeners_after, listeners_before);
}

#[test]
fn test_unwatch_restores_the_original_executor() {
    let table = Arc::new(DispatchTable::new());
    let alpha = table.load_owner("Alpha");
    let executor = executor_fn(|_, _| Ok(()));
    let original: Arc<dyn RegisteredHandler> = Arc::new(Registration::new(
        Arc::new(NamedListener::new("keeper")),
        executor.clone(),
        Priority::Normal,
        alpha,
        false,
    ));
    table.register(&E, original);

    let controller = WatchController::new(table.clone());
    let owners = controller.resolve_owners("all");
    controller.watch(&owners, true, 0, Arc::new(CollectingSink::default()));
    controller.unwatch(&owners);

    let restored = table.handler_list(&E).registered_handlers();
    assert_eq!(restored.len(), 1);
    assert!(restored[0].as_any().is::<Registration>());
    assert!(std::ptr::addr_eq(
        Arc::as_ptr(restored[0].executor().unwrap()),
        Arc::as_ptr(&executor)
    ));
}

#[test]
fn test_unwatch_restores_timed_registration_when_host_times() {
    let table = Arc::new(DispatchTable::new());
    let alpha = table.load_owner("Alpha");
    let log = Arc::new(Mutex::new(Vec::new()));
    table.register(&E, logging_registration(&log, "a", &alpha, Priority::Normal, false));
    table.set_use_timings(true);

    let controller = WatchController::new(table.clone());
    let owners = controller.resolve_owners("Alpha");
    controller.watch(&owners, false, 0, Arc::new(CollectingSink::default()));
    controller.unwatch(&owners);

    let restored = table.handler_list(&E).registered_handlers();
    assert!(restored[0].as_any().is::<TimedRegistration>());
    table.call_event(&BasicEvent::new(&E));
    let rows = table.timings();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].count, 1);
    assert_eq!(rows[0].max_nanos, None);
}

#[test]
fn test_rewatch_replaces_wrapper_and_resets_aggregates() {
    let table = Arc::new(DispatchTable::new());
    let alpha = table.load_owner("Alpha");
    let log = Arc::new(Mutex::new(Vec::new()));
    table.register(&E, logging_registration(&log, "a", &alpha, Priority::Normal, false));

    let controller = WatchController::new(table.clone());
    let owners = controller.resolve_owners("Alpha");
    let sink = Arc::new(CollectingSink::default());
    controller.watch(&owners, false, 0, sink.clone());
    table.call_event(&BasicEvent::new(&E));
    let first = controller.watched().remove(0);
    assert_eq!(timed(&first).count(), 1);

    controller.watch(&owners, true, 7_000, sink);
    let second = controller.watched().remove(0);
    assert!(!std::ptr::addr_eq(Arc::as_ptr(&first), Arc::as_ptr(&second)));
    assert_eq!(timed(&second).count(), 0);
    assert!(timed(&second).is_reporting());
    assert_eq!(timed(&second).report_threshold_nanos(), 7_000);
    assert_eq!(table.handler_list(&E).registered_handlers().len(), 1);

    table.call_event(&BasicEvent::new(&E));
    assert_eq!(*log.lock(), vec!["a", "a"]);
    assert_eq!(timed(&first).count(), 1);
    assert_eq!(timed(&second).count(), 1);
}

/// A host registration that keeps its executor to itself.
struct SealedRegistration {
    listener: Arc<dyn Listener>,
    owner: Owner,
}

impl RegisteredHandler for SealedRegistration {
    fn listener(&self) -> &Arc<dyn Listener> {
        &self.listener
    }

    fn executor(&self) -> Option<&Arc<dyn EventExecutor>> {
        None
    }

    fn priority(&self) -> Priority {
        Priority::Normal
    }

    fn owner(&self) -> &Owner {
        &self.owner
    }

    fn ignores_cancelled(&self) -> bool {
        false
    }

    fn call_event(&self, _event: &dyn Event) -> Result<(), HandlerError> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn test_bad_registration_is_skipped_without_aborting_batch() {
    let table = Arc::new(DispatchTable::new());
    let alpha = table.load_owner("Alpha");
    let log = Arc::new(Mutex::new(Vec::new()));
    table.register(&E, logging_registration(&log, "first", &alpha, Priority::Low, false));
    table.register(
        &E,
        Arc::new(SealedRegistration {
            listener: Arc::new(NamedListener::new("sealed")),
            owner: alpha.clone(),
        }),
    );
    table.register(&BLOCK_EVENT, logging_registration(&log, "other", &alpha, Priority::Low, false));

    let controller = WatchController::new(table.clone());
    let report = controller.watch(
        &controller.resolve_owners("Alpha"),
        false,
        0,
        Arc::new(CollectingSink::default()),
    );

    assert_eq!(report.affected, 2);
    assert_eq!(report.lists_rebaked, 2);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].owner(), "Alpha");
    let names: Vec<_> = table
        .handler_list(&E)
        .handlers()
        .iter()
        .map(|h| (h.listener().name().to_string(), h.as_any().is::<TimedHandler>()))
        .collect();
    assert_eq!(
        names,
        vec![("first".to_string(), true), ("sealed".to_string(), false)]
    );
}

#[test]
fn test_unknown_and_unwatched_owners_are_no_ops() {
    let table = Arc::new(DispatchTable::new());
    let alpha = table.load_owner("Alpha");
    let log = Arc::new(Mutex::new(Vec::new()));
    table.register(&E, logging_registration(&log, "a", &alpha, Priority::Normal, false));
    let bakes = table.handler_list(&E).bake_count();

    let controller = WatchController::new(table.clone());
    assert!(controller.resolve_owners("Nobody").is_empty());
    let report = controller.unwatch(&controller.resolve_owners("Alpha"));
    assert_eq!(report.affected, 0);
    let report = controller.watch(
        &controller.resolve_owners("Nobody"),
        true,
        0,
        Arc::new(CollectingSink::default()),
    );
    assert_eq!(report.affected, 0);
    assert_eq!(table.handler_list(&E).bake_count(), bakes);
}

#[test]
fn test_subclass_events_through_parent_list_widen_tracked_class() {
    let table = Arc::new(DispatchTable::new());
    let alpha = table.load_owner("Alpha");
    let log = Arc::new(Mutex::new(Vec::new()));
    table.register(&BLOCK_EVENT, logging_registration(&log, "blocks", &alpha, Priority::Normal, false));

    let controller = WatchController::new(table.clone());
    controller.watch(
        &controller.resolve_owners("all"),
        false,
        0,
        Arc::new(CollectingSink::default()),
    );
    table.call_event(&BasicEvent::new(&BLOCK_BREAK));
    let wrapper = controller.watched().remove(0);
    assert_eq!(timed(&wrapper).event_class(), Some(&BLOCK_BREAK));
    assert!(!timed(&wrapper).has_multiple());

    table.call_event(&BasicEvent::new(&BLOCK_EVENT));
    assert_eq!(timed(&wrapper).event_class(), Some(&BLOCK_EVENT));
    assert!(timed(&wrapper).has_multiple());
}

#[test]
fn test_slow_handler_above_threshold_is_reported_once() {
    let table = Arc::new(DispatchTable::new());
    let alpha = table.load_owner("Alpha");
    let sleeps = Arc::new(Mutex::new(vec![Duration::from_millis(1), Duration::from_millis(6)]));
    let queued = sleeps.clone();
    table.register(
        &E,
        Arc::new(Registration::new(
            Arc::new(NamedListener::new("sleeper")),
            executor_fn(move |_, _| {
                if let Some(pause) = queued.lock().pop() {
                    thread::sleep(pause);
                }
                Ok(())
            }),
            Priority::Normal,
            alpha,
            false,
        )),
    );

    let controller = WatchController::new(table.clone());
    let sink = Arc::new(CollectingSink::default());
    controller.watch(&controller.resolve_owners("all"), true, 5_000 * 1_000, sink.clone());

    table.call_event(&BasicEvent::new(&E));
    {
        let reports = sink.reports.lock();
        assert_eq!(reports.len(), 1);
        let (owner, elapsed, max) = &reports[0];
        assert_eq!(owner, "Alpha");
        assert!(*elapsed >= 6_000_000);
        assert_eq!(max, elapsed);
    }

    table.call_event(&BasicEvent::new(&E));
    let wrapper = controller.watched().remove(0);
    let snapshot = timed(&wrapper).snapshot();
    assert_eq!(sink.reports.lock().len(), 1);
    assert_eq!(snapshot.count, 2);
    assert_eq!(snapshot.max_nanos, sink.reports.lock()[0].1);
    assert!(snapshot.total_nanos >= snapshot.max_nanos + 1_000_000);
}

#[test]
fn test_toggling_during_dispatch_never_drops_or_doubles_a_handler() {
    const HANDLERS: usize = 8;
    const EVENTS: u64 = 2_000;

    let table = Arc::new(DispatchTable::new());
    let owners = [table.load_owner("Alpha"), table.load_owner("Beta")];
    let counters: Vec<Arc<AtomicU64>> = (0..HANDLERS).map(|_| Arc::new(AtomicU64::new(0))).collect();
    for (i, counter) in counters.iter().enumerate() {
        let counter = counter.clone();
        table.register(
            &E,
            Arc::new(Registration::new(
                Arc::new(NamedListener::new(format!("h{i}"))),
                executor_fn(move |_, _| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
                Priority::ALL[i % Priority::ALL.len()],
                owners[i % owners.len()].clone(),
                false,
            )),
        );
    }

    let controller = Arc::new(WatchController::new(table.clone()));
    let done = Arc::new(AtomicBool::new(false));
    let toggler = {
        let controller = controller.clone();
        let done = done.clone();
        thread::spawn(move || {
            let all = controller.resolve_owners("all");
            let sink: Arc<dyn DurationReportSink> = Arc::new(CollectingSink::default());
            while !done.load(Ordering::SeqCst) {
                controller.watch(&all, true, u64::MAX, sink.clone());
                controller.unwatch(&all);
            }
        })
    };

    for _ in 0..EVENTS {
        let outcome = table.call_event(&BasicEvent::new(&E));
        assert_eq!(outcome.invoked, HANDLERS);
    }
    done.store(true, Ordering::SeqCst);
    toggler.join().unwrap();

    for counter in &counters {
        assert_eq!(counter.load(Ordering::SeqCst), EVENTS);
    }
}

#[test]
fn test_timings_rows_are_consistent_during_dispatch() {
    const COST: u64 = 1_000;

    let clock = Arc::new(ManualClock::new());
    let table = Arc::new(DispatchTable::new());
    let alpha = table.load_owner("Alpha");
    let ticking = clock.clone();
    table.register(
        &E,
        Arc::new(Registration::new(
            Arc::new(NamedListener::new("fixed-cost")),
            executor_fn(move |_, _| {
                ticking.advance(COST);
                Ok(())
            }),
            Priority::Normal,
            alpha,
            false,
        )),
    );

    let controller = WatchController::new(table.clone()).with_clock(clock);
    controller.watch(
        &controller.resolve_owners("all"),
        false,
        0,
        Arc::new(CollectingSink::default()),
    );

    let done = Arc::new(AtomicBool::new(false));
    let dispatcher = {
        let table = table.clone();
        let done = done.clone();
        thread::spawn(move || {
            while !done.load(Ordering::SeqCst) {
                table.call_event(&BasicEvent::new(&E));
            }
        })
    };

    let mut last_count = 0;
    for _ in 0..20_000 {
        let rows = table.timings();
        let row = &rows[0];
        assert_eq!(row.total_nanos, row.count * COST);
        assert_eq!(row.max_nanos, Some(if row.count == 0 { 0 } else { COST }));
        assert!(row.count >= last_count);
        last_count = row.count;
    }
    done.store(true, Ordering::SeqCst);
    dispatcher.join().unwrap();
}

//! A small simulated host: a fixed event catalogue, handlers built from
//! configuration that burn time, and a thread that fires the catalogue on a
//! fixed tick.

use anyhow::{anyhow, Context, Result};
use lagwatch_config::{HandlerConfig, HostConfig};
use lagwatch_core::{
    BasicEvent, DispatchTable, Event, EventClass, EventExecutor, HandlerError, Listener,
    MonotonicClock, Priority, RegisteredHandler, Registration, TimedRegistration, EVENT,
};
use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub static SERVER_TICK: EventClass = EventClass::new("ServerTick", &EVENT);
pub static PLAYER_EVENT: EventClass = EventClass::new("PlayerEvent", &EVENT);
pub static PLAYER_MOVE: EventClass = EventClass::new("PlayerMove", &PLAYER_EVENT);
pub static PLAYER_CHAT: EventClass = EventClass::new("PlayerChat", &PLAYER_EVENT);
pub static BLOCK_EVENT: EventClass = EventClass::new("BlockEvent", &EVENT);
pub static BLOCK_BREAK: EventClass = EventClass::new("BlockBreak", &BLOCK_EVENT);

pub static CATALOGUE: [&EventClass; 7] = [
    &EVENT,
    &SERVER_TICK,
    &PLAYER_EVENT,
    &PLAYER_MOVE,
    &PLAYER_CHAT,
    &BLOCK_EVENT,
    &BLOCK_BREAK,
];

pub fn find_class(name: &str) -> Option<&'static EventClass> {
    CATALOGUE
        .iter()
        .copied()
        .find(|class| class.simple_name() == name)
}

/// Listener whose handler sleeps for a configured time, with an optional
/// periodic spike.
pub struct BusyListener {
    name: String,
    work: Duration,
    spike: Duration,
    spike_every: u64,
    calls: AtomicU64,
}

impl BusyListener {
    pub fn from_config(config: &HandlerConfig) -> Self {
        Self {
            name: config.listener.clone(),
            work: Duration::from_micros(config.work_micros),
            spike: Duration::from_micros(config.spike_micros),
            spike_every: config.spike_every,
            calls: AtomicU64::new(0),
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    fn burn(&self) {
        let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        let mut pause = self.work;
        if self.spike_every > 0 && call % self.spike_every == 0 {
            pause += self.spike;
        }
        if !pause.is_zero() {
            thread::sleep(pause);
        }
    }
}

impl Listener for BusyListener {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The one executor every demo registration shares.
struct BusyExecutor;

impl EventExecutor for BusyExecutor {
    fn execute(&self, listener: &dyn Listener, _event: &dyn Event) -> Result<(), HandlerError> {
        let busy = listener
            .as_any()
            .downcast_ref::<BusyListener>()
            .ok_or_else(|| anyhow!("{} is not a demo listener", listener.name()))?;
        busy.burn();
        Ok(())
    }
}

/// Builds a dispatch table from the host configuration.
pub fn build_host(config: &HostConfig) -> Result<Arc<DispatchTable>> {
    let table = Arc::new(DispatchTable::new());
    table.set_use_timings(config.use_timings);
    let executor: Arc<dyn EventExecutor> = Arc::new(BusyExecutor);
    let clock = Arc::new(MonotonicClock::new());

    for owner_config in &config.owners {
        let owner = table.load_owner(&owner_config.name);
        for handler in &owner_config.handlers {
            let class = find_class(&handler.event).ok_or_else(|| {
                anyhow!(
                    "unknown event class '{}' for {}/{}",
                    handler.event,
                    owner_config.name,
                    handler.listener
                )
            })?;
            let priority: Priority = handler
                .priority
                .parse()
                .with_context(|| format!("{}/{}", owner_config.name, handler.listener))?;
            let listener: Arc<dyn Listener> = Arc::new(BusyListener::from_config(handler));

            let registration: Arc<dyn RegisteredHandler> = if config.use_timings {
                Arc::new(TimedRegistration::new(
                    listener,
                    executor.clone(),
                    priority,
                    owner.clone(),
                    handler.ignore_cancelled,
                    clock.clone(),
                ))
            } else {
                Arc::new(Registration::new(
                    listener,
                    executor.clone(),
                    priority,
                    owner.clone(),
                    handler.ignore_cancelled,
                ))
            };
            table.register(class, registration);
        }
    }

    tracing::debug!(
        owners = config.owners.len(),
        lists = table.handler_lists().len(),
        "host built"
    );
    Ok(table)
}

/// Fires one round of the catalogue. Every fourth block break arrives
/// already cancelled. Returns the number of handler invocations.
pub fn fire_round(table: &DispatchTable, round: u64) -> usize {
    let block_break = BasicEvent::new(&BLOCK_BREAK);
    block_break.set_cancelled(round % 4 == 3);

    let events = [
        BasicEvent::new(&SERVER_TICK),
        BasicEvent::new(&PLAYER_MOVE),
        BasicEvent::asynchronous(&PLAYER_CHAT),
        block_break,
    ];
    events
        .iter()
        .map(|event| table.call_event(event).invoked)
        .sum()
}

/// Background thread driving `fire_round` until stopped.
pub struct HostTicker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl HostTicker {
    pub fn spawn(table: Arc<DispatchTable>, tick: Duration) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let handle = thread::Builder::new()
            .name("lagwatch-host".to_string())
            .spawn(move || {
                let mut round = 0u64;
                while !flag.load(Ordering::Relaxed) {
                    fire_round(&table, round);
                    round = round.wrapping_add(1);
                    thread::sleep(tick);
                }
                tracing::debug!(rounds = round, "host ticker stopped");
            })
            .context("Failed to spawn host thread")?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    pub fn stop(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("host thread panicked");
            }
        }
    }
}

impl Drop for HostTicker {
    fn drop(&mut self) {
        self.halt();
    }
}

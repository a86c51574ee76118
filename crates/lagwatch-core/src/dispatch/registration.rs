use crate::dispatch::priority::Priority;
use crate::dispatch::timings::HandlerTimings;
use crate::error::HandlerError;
use crate::event::Event;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// The module (plugin) that owns a set of registrations.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Owner(Arc<str>);

impl Owner {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Owner({})", self.0)
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Object an executor is invoked on.
pub trait Listener: Send + Sync {
    fn name(&self) -> &str;

    fn as_any(&self) -> &dyn Any;
}

/// A listener that carries nothing but its name; executors capture their own state.
#[derive(Debug, Clone)]
pub struct NamedListener {
    name: String,
}

impl NamedListener {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Listener for NamedListener {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Raw dispatch function bound to a registration.
pub trait EventExecutor: Send + Sync {
    fn execute(&self, listener: &dyn Listener, event: &dyn Event) -> Result<(), HandlerError>;
}

impl<F> EventExecutor for F
where
    F: Fn(&dyn Listener, &dyn Event) -> Result<(), HandlerError> + Send + Sync,
{
    fn execute(&self, listener: &dyn Listener, event: &dyn Event) -> Result<(), HandlerError> {
        self(listener, event)
    }
}

pub fn executor_fn<F>(f: F) -> Arc<dyn EventExecutor>
where
    F: Fn(&dyn Listener, &dyn Event) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Everything a handler list, and any host tooling, may rely on about an entry.
pub trait RegisteredHandler: Send + Sync {
    fn listener(&self) -> &Arc<dyn Listener>;

    /// `None` when the registration does not expose its executor.
    fn executor(&self) -> Option<&Arc<dyn EventExecutor>>;

    fn priority(&self) -> Priority;

    fn owner(&self) -> &Owner;

    fn ignores_cancelled(&self) -> bool;

    fn call_event(&self, event: &dyn Event) -> Result<(), HandlerError>;

    fn timings(&self) -> Option<&dyn HandlerTimings> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

pub(crate) fn call_through(
    executor: &Arc<dyn EventExecutor>,
    listener: &Arc<dyn Listener>,
    ignore_cancelled: bool,
    event: &dyn Event,
) -> Result<(), HandlerError> {
    if ignore_cancelled && event.is_cancelled() {
        return Ok(());
    }
    executor.execute(listener.as_ref(), event)
}

pub(crate) fn same_handler(a: &Arc<dyn RegisteredHandler>, b: &Arc<dyn RegisteredHandler>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

pub struct Registration {
    listener: Arc<dyn Listener>,
    executor: Arc<dyn EventExecutor>,
    priority: Priority,
    owner: Owner,
    ignore_cancelled: bool,
}

impl Registration {
    pub fn new(
        listener: Arc<dyn Listener>,
        executor: Arc<dyn EventExecutor>,
        priority: Priority,
        owner: Owner,
        ignore_cancelled: bool,
    ) -> Self {
        Self {
            listener,
            executor,
            priority,
            owner,
            ignore_cancelled,
        }
    }
}

impl RegisteredHandler for Registration {
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
        call_through(&self.executor, &self.listener, self.ignore_cancelled, event)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("listener", &self.listener.name())
            .field("priority", &self.priority)
            .field("owner", &self.owner)
            .field("ignore_cancelled", &self.ignore_cancelled)
            .finish()
    }
}

//! The host-side dispatch table that watch wrappers are swapped into.

mod handler_list;
mod priority;
mod registration;
mod table;
mod timings;

pub use handler_list::{HandlerList, HandlerSnapshot};
pub use priority::{ParsePriorityError, Priority};
pub use registration::{
    executor_fn, EventExecutor, Listener, NamedListener, Owner, RegisteredHandler, Registration,
};
pub use table::{DispatchFailure, DispatchOutcome, DispatchTable, TimingsRow};
pub use timings::{HandlerTimings, TimedRegistration, TimingSnapshot};

pub(crate) use registration::call_through;
pub(crate) use timings::Aggregates;

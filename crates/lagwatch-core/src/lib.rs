//! Handler latency accounting for a live event dispatch table.
//!
//! [`WatchController`] swaps every registration of the selected owners for a
//! [`TimedHandler`] that times each call and reports slow ones to a
//! [`DurationReportSink`], and swaps the originals back on `unwatch`.

pub mod clock;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod timed;
pub mod watch;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use dispatch::{
    executor_fn, DispatchFailure, DispatchOutcome, DispatchTable, EventExecutor, HandlerList,
    HandlerTimings, Listener, NamedListener, Owner, Priority, RegisteredHandler, Registration,
    TimedRegistration, TimingSnapshot, TimingsRow,
};
pub use error::{HandlerError, WatchError};
pub use event::{BasicEvent, Event, EventClass, EVENT};
pub use timed::{DurationReportSink, TimedHandler};
pub use watch::{WatchController, WatchReport, ALL_OWNERS};

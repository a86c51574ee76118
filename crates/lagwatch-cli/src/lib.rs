//! lagwatch console
//!
//! Operator-facing layer over `lagwatch-core`: command parsing, the
//! duration report fan-out to subscribed observers, and a simulated host
//! whose handlers can be watched live.

pub mod commands;
pub mod demo;
pub mod monitor;
pub mod observer;
pub mod operator;

pub use commands::Cli;
pub use monitor::{format_report, nanos_to_micros, LagMonitor, Notifier};
pub use observer::{ChannelObserver, CommandSender, DeliveryError, Observer, ObserverDirectory};
pub use operator::{CommandError, OperatorCommand, Threshold};

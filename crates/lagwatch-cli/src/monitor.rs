use crate::observer::{CommandSender, ObserverDirectory};
use crate::operator::{CommandError, OperatorCommand, Threshold, HELP};
use lagwatch_core::{
    DurationReportSink, RegisteredHandler, TimedHandler, TimingsRow, WatchController, ALL_OWNERS,
};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashSet};
use std::fmt::Write as _;
use std::sync::Arc;
use uuid::Uuid;

/// Rounds to the nearest microsecond.
pub fn nanos_to_micros(nanos: u64) -> u64 {
    nanos.saturating_add(500) / 1_000
}

pub fn format_report(owner: &str, event_class: &str, elapsed_nanos: u64, max_nanos: u64) -> String {
    format!(
        "{} - {} {} µs (max {} µs)",
        owner,
        event_class,
        nanos_to_micros(elapsed_nanos),
        nanos_to_micros(max_nanos)
    )
}

/// Fans duration reports out to the log and to subscribed observers.
pub struct Notifier {
    subscribers: RwLock<HashSet<Uuid>>,
    observers: Arc<ObserverDirectory>,
}

impl Notifier {
    pub fn new(observers: Arc<ObserverDirectory>) -> Self {
        Self {
            subscribers: RwLock::new(HashSet::new()),
            observers,
        }
    }

    /// Returns `false` if `id` was already subscribed.
    pub fn subscribe(&self, id: Uuid) -> bool {
        self.subscribers.write().insert(id)
    }

    pub fn unsubscribe(&self, id: Uuid) -> bool {
        self.subscribers.write().remove(&id)
    }

    pub fn is_subscribed(&self, id: Uuid) -> bool {
        self.subscribers.read().contains(&id)
    }

    pub fn clear(&self) {
        self.subscribers.write().clear();
    }

    pub fn broadcast(&self, message: &str) {
        let subscribers: Vec<Uuid> = self.subscribers.read().iter().copied().collect();
        for id in subscribers {
            let Some(observer) = self.observers.get(id) else {
                continue;
            };
            if let Err(error) = observer.send_message(message) {
                tracing::debug!(observer = %id, "dropped duration notification: {}", error);
            }
        }
    }
}

impl DurationReportSink for Notifier {
    fn report_duration(&self, handler: &TimedHandler, elapsed_nanos: u64) {
        let snapshot = handler.snapshot();
        let class = snapshot
            .event_class
            .map_or("Event", |class| class.simple_name());
        let message = format_report(
            handler.owner().name(),
            class,
            elapsed_nanos,
            snapshot.max_nanos,
        );
        tracing::info!("{}", message);
        self.broadcast(&message);
    }
}

/// Operator entry point: wraps owners on request and routes slow-call
/// reports to subscribers.
pub struct LagMonitor {
    controller: WatchController,
    notifier: Arc<Notifier>,
}

impl LagMonitor {
    pub fn new(controller: WatchController, observers: Arc<ObserverDirectory>) -> Self {
        Self {
            controller,
            notifier: Arc::new(Notifier::new(observers)),
        }
    }

    pub fn controller(&self) -> &WatchController {
        &self.controller
    }

    pub fn notifier(&self) -> &Arc<Notifier> {
        &self.notifier
    }

    pub fn execute(
        &self,
        sender: &CommandSender,
        command: OperatorCommand,
    ) -> Result<String, CommandError> {
        match command {
            OperatorCommand::Watch { owners, threshold } => {
                let matched = self.controller.resolve_owners(&owners);
                if matched.is_empty() {
                    return Err(CommandError::NoMatchingOwners);
                }
                let threshold = threshold.as_deref().map(Threshold::parse).transpose()?;
                let sink: Arc<dyn DurationReportSink> = self.notifier.clone();
                self.controller.watch(
                    &matched,
                    threshold.is_some(),
                    threshold.map_or(0, |t| t.nanos),
                    sink,
                );
                Ok(match threshold {
                    Some(t) => format!("Watching {owners} with threshold {} µs", t.micros),
                    None => format!("Watching {owners}"),
                })
            }
            OperatorCommand::Unwatch { owners } => {
                let matched = self.controller.resolve_owners(&owners);
                if matched.is_empty() {
                    return Err(CommandError::NoMatchingOwners);
                }
                self.controller.unwatch(&matched);
                Ok(format!("No longer watching {owners}"))
            }
            OperatorCommand::Subscribe => {
                let id = sender
                    .observer_id()
                    .ok_or(CommandError::NotAnObserver("receive event duration notifications"))?;
                self.notifier.subscribe(id);
                Ok("You will receive event duration notifications.".to_string())
            }
            OperatorCommand::Unsubscribe => {
                let id = sender.observer_id().ok_or(CommandError::NotAnObserver(
                    "unsubscribe from duration notifications",
                ))?;
                self.notifier.unsubscribe(id);
                Ok("You will no longer receive event duration notifications.".to_string())
            }
            OperatorCommand::Timings => Ok(self.render_timings()),
            OperatorCommand::TimingsReset => {
                self.controller.table().reset_timings();
                Ok("Timings reset.".to_string())
            }
            OperatorCommand::Owners => Ok(self.render_owners()),
            OperatorCommand::Help => Ok(HELP.to_string()),
        }
    }

    /// Restores every owner's original registrations and forgets all
    /// subscribers.
    pub fn shutdown(&self) {
        let owners = self.controller.resolve_owners(ALL_OWNERS);
        let report = self.controller.unwatch(&owners);
        self.notifier.clear();
        tracing::debug!(restored = report.affected, "monitor shut down");
    }

    fn render_timings(&self) -> String {
        let rows = self.controller.table().timings();
        if rows.is_empty() {
            return "No timed registrations.".to_string();
        }
        let mut out = String::new();
        for (i, row) in rows.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            write_row(&mut out, row);
        }
        out
    }

    fn render_owners(&self) -> String {
        let owners = self.controller.table().owners();
        if owners.is_empty() {
            return "No owners loaded.".to_string();
        }
        let watched: BTreeSet<String> = self
            .controller
            .watched()
            .iter()
            .map(|handler| handler.owner().name().to_string())
            .collect();
        owners
            .iter()
            .map(|owner| {
                if watched.contains(owner.name()) {
                    format!("{owner} (watched)")
                } else {
                    owner.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn write_row(out: &mut String, row: &TimingsRow) {
    let class = row.event_class.map_or("-", |class| class.simple_name());
    let _ = write!(
        out,
        "{} {} [{}] {}{} count={} total={} µs",
        row.owner,
        row.listener,
        row.priority,
        class,
        if row.multiple { "*" } else { "" },
        row.count,
        nanos_to_micros(row.total_nanos),
    );
    if let Some(max) = row.max_nanos {
        let _ = write!(out, " max={} µs", nanos_to_micros(max));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nanos_to_micros_rounds_half_up() {
        assert_eq!(nanos_to_micros(0), 0);
        assert_eq!(nanos_to_micros(499), 0);
        assert_eq!(nanos_to_micros(500), 1);
        assert_eq!(nanos_to_micros(1_499), 1);
        assert_eq!(nanos_to_micros(1_500), 2);
        assert_eq!(nanos_to_micros(6_000_000), 6_000);
        assert_eq!(nanos_to_micros(u64::MAX), u64::MAX / 1_000);
    }

    #[test]
    fn test_format_report() {
        assert_eq!(
            format_report("Alpha", "PlayerMove", 6_000_400, 7_250_000),
            "Alpha - PlayerMove 6000 µs (max 7250 µs)"
        );
    }

    #[test]
    fn test_subscription_set() {
        let notifier = Notifier::new(Arc::new(ObserverDirectory::new()));
        let id = Uuid::new_v4();
        assert!(notifier.subscribe(id));
        assert!(!notifier.subscribe(id));
        assert!(notifier.is_subscribed(id));
        assert!(notifier.unsubscribe(id));
        assert!(!notifier.unsubscribe(id));
        notifier.subscribe(id);
        notifier.clear();
        assert!(!notifier.is_subscribed(id));
    }
}

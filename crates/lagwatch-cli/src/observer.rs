use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("observer {0} is disconnected")]
    Disconnected(Uuid),

    #[error("delivery to observer {id} failed: {reason}")]
    Failed { id: Uuid, reason: String },
}

/// A connected party that can receive notifications.
pub trait Observer: Send + Sync {
    fn id(&self) -> Uuid;

    fn is_connected(&self) -> bool;

    fn send_message(&self, message: &str) -> Result<(), DeliveryError>;
}

/// Who issued an operator command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandSender {
    Console,
    Observer(Uuid),
}

impl CommandSender {
    pub fn observer_id(&self) -> Option<Uuid> {
        match self {
            Self::Console => None,
            Self::Observer(id) => Some(*id),
        }
    }
}

/// Observers currently known to the process, looked up by id on every
/// delivery.
#[derive(Default)]
pub struct ObserverDirectory {
    observers: RwLock<HashMap<Uuid, Arc<dyn Observer>>>,
}

impl ObserverDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, observer: Arc<dyn Observer>) {
        self.observers.write().insert(observer.id(), observer);
    }

    pub fn disconnect(&self, id: Uuid) -> Option<Arc<dyn Observer>> {
        self.observers.write().remove(&id)
    }

    /// Returns the observer only while it is still connected.
    pub fn get(&self, id: Uuid) -> Option<Arc<dyn Observer>> {
        self.observers
            .read()
            .get(&id)
            .filter(|observer| observer.is_connected())
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }
}

/// Observer that forwards messages into a channel, typically drained by the
/// console's output loop.
pub struct ChannelObserver {
    id: Uuid,
    tx: UnboundedSender<String>,
}

impl ChannelObserver {
    pub fn new(tx: UnboundedSender<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tx,
        }
    }
}

impl Observer for ChannelObserver {
    fn id(&self) -> Uuid {
        self.id
    }

    fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }

    fn send_message(&self, message: &str) -> Result<(), DeliveryError> {
        self.tx
            .send(message.to_string())
            .map_err(|_| DeliveryError::Disconnected(self.id))
    }
}

use crate::dispatch::priority::SLOT_COUNT;
use crate::dispatch::registration::{same_handler, Owner, RegisteredHandler};
use crate::event::EventClass;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub type HandlerSnapshot = Arc<[Arc<dyn RegisteredHandler>]>;

type Slots = [Vec<Arc<dyn RegisteredHandler>>; SLOT_COUNT];

/// Registrations for one event class, grouped into priority slots.
///
/// Dispatch reads a baked snapshot of the slots. `register` and `unregister`
/// drop the snapshot so the next reader rebuilds it; `replace` leaves it in
/// place so a batch of swaps becomes visible together on the next `bake`.
pub struct HandlerList {
    event_class: &'static EventClass,
    slots: Mutex<Slots>,
    baked: RwLock<Option<HandlerSnapshot>>,
    bakes: AtomicU64,
}

impl HandlerList {
    pub fn new(event_class: &'static EventClass) -> Self {
        Self {
            event_class,
            slots: Mutex::new(Default::default()),
            baked: RwLock::new(None),
            bakes: AtomicU64::new(0),
        }
    }

    pub fn event_class(&self) -> &'static EventClass {
        self.event_class
    }

    pub fn register(&self, handler: Arc<dyn RegisteredHandler>) {
        let mut slots = self.slots.lock();
        slots[handler.priority().slot()].push(handler);
        *self.baked.write() = None;
    }

    pub fn unregister(&self, handler: &Arc<dyn RegisteredHandler>) -> bool {
        let mut slots = self.slots.lock();
        let slot = &mut slots[handler.priority().slot()];
        let Some(index) = slot.iter().position(|h| same_handler(h, handler)) else {
            return false;
        };
        slot.remove(index);
        *self.baked.write() = None;
        true
    }

    pub fn unregister_owner(&self, owner: &Owner) -> usize {
        let mut slots = self.slots.lock();
        let mut removed = 0;
        for slot in slots.iter_mut() {
            let before = slot.len();
            slot.retain(|h| h.owner() != owner);
            removed += before - slot.len();
        }
        if removed > 0 {
            *self.baked.write() = None;
        }
        removed
    }

    /// Swaps `old` for `new` at the same position. Returns `false` if `old` is
    /// not registered here.
    pub fn replace(
        &self,
        old: &Arc<dyn RegisteredHandler>,
        new: Arc<dyn RegisteredHandler>,
    ) -> bool {
        let mut slots = self.slots.lock();
        let old_slot = old.priority().slot();
        let Some(index) = slots[old_slot].iter().position(|h| same_handler(h, old)) else {
            return false;
        };
        let new_slot = new.priority().slot();
        if new_slot == old_slot {
            slots[old_slot][index] = new;
        } else {
            slots[old_slot].remove(index);
            slots[new_slot].push(new);
        }
        true
    }

    /// Current registrations in dispatch order, read from the slots rather
    /// than the baked snapshot.
    pub fn registered_handlers(&self) -> Vec<Arc<dyn RegisteredHandler>> {
        let slots = self.slots.lock();
        slots.iter().flatten().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().iter().all(Vec::is_empty)
    }

    /// The snapshot dispatch iterates, baking one if none is current.
    pub fn handlers(&self) -> HandlerSnapshot {
        if let Some(snapshot) = self.baked.read().as_ref() {
            return snapshot.clone();
        }
        self.bake()
    }

    pub fn bake(&self) -> HandlerSnapshot {
        let slots = self.slots.lock();
        let snapshot: HandlerSnapshot = slots.iter().flatten().cloned().collect();
        *self.baked.write() = Some(snapshot.clone());
        self.bakes.fetch_add(1, Ordering::Relaxed);
        snapshot
    }

    pub fn bake_count(&self) -> u64 {
        self.bakes.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for HandlerList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerList")
            .field("event_class", &self.event_class.simple_name())
            .field("handlers", &self.registered_handlers().len())
            .finish()
    }
}

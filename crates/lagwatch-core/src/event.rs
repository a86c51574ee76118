//! Event classes and the events that flow through handler lists.
//!
//! Event classes form a single-rooted hierarchy. Every class is declared as a
//! `static` descending from [`EVENT`], and identity is the identity of that
//! static, never its name:
//!
//! ```
//! use lagwatch_core::event::{EventClass, EVENT};
//!
//! static PLAYER_EVENT: EventClass = EventClass::new("PlayerEvent", &EVENT);
//! static PLAYER_MOVE: EventClass = EventClass::new("PlayerMove", &PLAYER_EVENT);
//!
//! assert!(PLAYER_EVENT.is_assignable_from(&PLAYER_MOVE));
//! assert_eq!(PLAYER_MOVE.common_ancestor(&EVENT), &EVENT);
//! ```

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};

/// Root of every event class hierarchy.
pub static EVENT: EventClass = EventClass {
    simple_name: "Event",
    parent: None,
};

pub struct EventClass {
    simple_name: &'static str,
    parent: Option<&'static EventClass>,
}

impl EventClass {
    pub const fn new(simple_name: &'static str, parent: &'static EventClass) -> Self {
        Self {
            simple_name,
            parent: Some(parent),
        }
    }

    pub fn simple_name(&self) -> &'static str {
        self.simple_name
    }

    pub fn parent(&self) -> Option<&'static EventClass> {
        self.parent
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Iterates from this class up to the root, starting with `self`.
    pub fn ancestors(&'static self) -> impl Iterator<Item = &'static EventClass> {
        std::iter::successors(Some(self), |class| class.parent)
    }

    /// True when `other` is this class or one of its descendants.
    pub fn is_assignable_from(&self, other: &EventClass) -> bool {
        std::iter::successors(Some(other), |class| class.parent)
            .any(|class| std::ptr::eq(class, self))
    }

    /// Lowest class that both `self` and `other` descend from (or are).
    pub fn common_ancestor(&'static self, other: &'static EventClass) -> &'static EventClass {
        self.ancestors()
            .find(|candidate| candidate.is_assignable_from(other))
            .unwrap_or(&EVENT)
    }
}

impl PartialEq for EventClass {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for EventClass {}

impl Hash for EventClass {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self, state);
    }
}

impl fmt::Debug for EventClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = vec![self.simple_name];
        let mut current = self.parent;
        while let Some(class) = current {
            names.push(class.simple_name);
            current = class.parent;
        }
        write!(f, "EventClass({})", names.join(" < "))
    }
}

impl fmt::Display for EventClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.simple_name)
    }
}

pub trait Event: Send + Sync {
    fn class(&self) -> &'static EventClass;

    /// Events fired off the dispatcher's main thread. These bypass timing.
    fn is_asynchronous(&self) -> bool {
        false
    }

    fn is_cancelled(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;
}

/// An event with no payload beyond its class and flags.
#[derive(Debug)]
pub struct BasicEvent {
    class: &'static EventClass,
    asynchronous: bool,
    cancelled: AtomicBool,
}

impl BasicEvent {
    pub fn new(class: &'static EventClass) -> Self {
        Self {
            class,
            asynchronous: false,
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn asynchronous(class: &'static EventClass) -> Self {
        Self {
            asynchronous: true,
            ..Self::new(class)
        }
    }

    pub fn set_cancelled(&self, cancelled: bool) {
        self.cancelled.store(cancelled, Ordering::Release);
    }
}

impl Event for BasicEvent {
    fn class(&self) -> &'static EventClass {
        self.class
    }

    fn is_asynchronous(&self) -> bool {
        self.asynchronous
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

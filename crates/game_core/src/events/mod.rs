//! Typed event bus following Game Engine Architecture Ch 16.8
//!
//! Key principles:
//! - Events are plain value types, routed by their Rust type
//! - Registration system (only listeners of that type are notified)
//! - Synchronous fan-out in subscription order on the publishing thread
//! - Publishing, subscribing or unsubscribing from inside a listener is
//!   deferred until the outer dispatch finishes, then applied in FIFO order
//! - A panicking listener is logged and the remaining listeners still run
//! - `queue` holds events until the next `flush_queued`, for publishers that
//!   must not dispatch synchronously

pub mod catalog;

pub use catalog::*;

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::{Rc, Weak};

use crate::foundation::recovery::catch_recoverable;

/// Shared listener callback for events of type `E`
pub type Listener<E> = Rc<dyn Fn(&E)>;

/// Identifier handed out by every subscribe call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

struct Entry {
    id: ListenerId,
    identity: usize,
    // Always an `Rc<dyn Fn(&E)>` for the list's event type
    callback: Box<dyn Any>,
}

enum PendingOp {
    Add(TypeId, Entry),
    Remove(ListenerId),
    Publish(Box<dyn FnOnce(&EventBus)>),
}

/// Type-indexed publish/subscribe bus, shared on the foreground thread via `Rc`
#[derive(Default)]
pub struct EventBus {
    listeners: RefCell<HashMap<TypeId, Vec<Entry>>>,
    pending: RefCell<VecDeque<PendingOp>>,
    queued: RefCell<VecDeque<Box<dyn FnOnce(&EventBus)>>>,
    dispatching: Cell<bool>,
    next_id: Cell<u64>,
}

impl EventBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a closure; every call creates a distinct listener
    pub fn subscribe<E: 'static>(&self, listener: impl Fn(&E) + 'static) -> ListenerId {
        self.subscribe_shared(Rc::new(listener) as Listener<E>)
    }

    /// Subscribe a shared callback.
    ///
    /// Idempotent per `(event type, callback identity)`: subscribing the same
    /// `Rc` twice returns the first id and adds nothing.
    pub fn subscribe_shared<E: 'static>(&self, listener: Listener<E>) -> ListenerId {
        let key = TypeId::of::<E>();
        let identity = Rc::as_ptr(&listener).cast::<()>() as usize;

        if let Some(id) = self.find_identity(key, identity) {
            return id;
        }

        let id = ListenerId(self.next_id.get());
        self.next_id.set(self.next_id.get() + 1);
        let entry = Entry {
            id,
            identity,
            callback: Box::new(listener),
        };

        if self.dispatching.get() {
            self.pending
                .borrow_mut()
                .push_back(PendingOp::Add(key, entry));
        } else {
            self.listeners
                .borrow_mut()
                .entry(key)
                .or_default()
                .push(entry);
        }
        id
    }

    /// Subscribe and get a guard that unsubscribes when dropped
    pub fn subscribe_scoped<E: 'static>(
        self: &Rc<Self>,
        listener: impl Fn(&E) + 'static,
    ) -> Subscription {
        let id = self.subscribe(listener);
        Subscription {
            bus: Rc::downgrade(self),
            id: Some(id),
        }
    }

    /// Remove a listener. Returns false if the id is unknown.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        if self.dispatching.get() {
            let mut pending = self.pending.borrow_mut();
            let before = pending.len();
            pending.retain(|op| !matches!(op, PendingOp::Add(_, entry) if entry.id == id));
            if pending.len() != before {
                return true;
            }
            let known = self.contains(id);
            if known {
                pending.push_back(PendingOp::Remove(id));
            }
            return known;
        }
        self.remove_now(id)
    }

    /// Publish an event to every listener of its type.
    ///
    /// From inside a listener the event is queued and delivered once the
    /// current dispatch completes.
    pub fn publish<E: Clone + 'static>(&self, event: &E) {
        if self.dispatching.get() {
            let event = event.clone();
            self.pending
                .borrow_mut()
                .push_back(PendingOp::Publish(Box::new(move |bus| bus.dispatch(&event))));
            return;
        }
        self.dispatch(event);
        self.drain_pending();
    }

    /// Hold an event until the next [`flush_queued`](Self::flush_queued)
    pub fn queue<E: Clone + 'static>(&self, event: E) {
        self.queued
            .borrow_mut()
            .push_back(Box::new(move |bus| bus.publish(&event)));
    }

    /// Publish every queued event in queue order; returns how many were sent.
    ///
    /// Events queued by listeners during the flush wait for the next call.
    pub fn flush_queued(&self) -> usize {
        let batch: Vec<_> = self.queued.borrow_mut().drain(..).collect();
        let count = batch.len();
        for deliver in batch {
            deliver(self);
        }
        count
    }

    /// Events waiting for [`flush_queued`](Self::flush_queued)
    pub fn queued_len(&self) -> usize {
        self.queued.borrow().len()
    }

    /// Number of listeners registered for `E`
    pub fn listener_count<E: 'static>(&self) -> usize {
        self.listeners
            .borrow()
            .get(&TypeId::of::<E>())
            .map_or(0, Vec::len)
    }

    /// Total listeners across all event types
    pub fn total_listeners(&self) -> usize {
        self.listeners.borrow().values().map(Vec::len).sum()
    }

    /// Drop every listener and pending operation
    pub fn clear(&self) {
        self.listeners.borrow_mut().clear();
        self.pending.borrow_mut().clear();
        self.queued.borrow_mut().clear();
        log::debug!("event bus cleared");
    }

    fn dispatch<E: 'static>(&self, event: &E) {
        let snapshot: Vec<Listener<E>> = self
            .listeners
            .borrow()
            .get(&TypeId::of::<E>())
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| e.callback.downcast_ref::<Listener<E>>().cloned())
                    .collect()
            })
            .unwrap_or_default();

        let was_dispatching = self.dispatching.replace(true);
        for listener in snapshot {
            if let Err(message) = catch_recoverable(|| listener(event)) {
                log::error!(
                    "Event listener for {} panicked: {}",
                    std::any::type_name::<E>(),
                    message
                );
            }
        }
        self.dispatching.set(was_dispatching);
    }

    fn drain_pending(&self) {
        loop {
            let op = self.pending.borrow_mut().pop_front();
            match op {
                None => break,
                Some(PendingOp::Add(key, entry)) => {
                    self.listeners
                        .borrow_mut()
                        .entry(key)
                        .or_default()
                        .push(entry);
                }
                Some(PendingOp::Remove(id)) => {
                    self.remove_now(id);
                }
                Some(PendingOp::Publish(deliver)) => deliver(self),
            }
        }
    }

    fn remove_now(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        for entries in listeners.values_mut() {
            if let Some(pos) = entries.iter().position(|e| e.id == id) {
                entries.remove(pos);
                return true;
            }
        }
        false
    }

    fn contains(&self, id: ListenerId) -> bool {
        self.listeners
            .borrow()
            .values()
            .any(|entries| entries.iter().any(|e| e.id == id))
    }

    fn find_identity(&self, key: TypeId, identity: usize) -> Option<ListenerId> {
        let live = self
            .listeners
            .borrow()
            .get(&key)
            .and_then(|entries| entries.iter().find(|e| e.identity == identity).map(|e| e.id));
        live.or_else(|| {
            self.pending.borrow().iter().find_map(|op| match op {
                PendingOp::Add(k, entry) if *k == key && entry.identity == identity => {
                    Some(entry.id)
                }
                _ => None,
            })
        })
    }
}

/// Scoped subscription; unsubscribes on drop unless released
pub struct Subscription {
    bus: Weak<EventBus>,
    id: Option<ListenerId>,
}

impl Subscription {
    /// Keep the listener registered after this guard is dropped
    pub fn release(mut self) -> Option<ListenerId> {
        self.id.take()
    }

    /// Whether the guard still owns a registration
    pub fn active(&self) -> bool {
        self.id.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let (Some(id), Some(bus)) = (self.id.take(), self.bus.upgrade()) {
            bus.unsubscribe(id);
        }
    }
}

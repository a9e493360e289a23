//! Observer registry and event fan-out.
//!
//! Registration and dispatch are serialized through one background task so
//! the guarantees fall out of message ordering alone: a `remove` that has
//! been acknowledged can never be followed by a delivery to that observer,
//! and an observer added after an event was queued never sees it. Because
//! dispatch runs on its own task, a slow observer back-pressures the
//! fan-out queue, not the transport read loop.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::events::{deliver, VisionEvent, VisionObserver};

/// Handle returned by `add_observer`, used to remove the observer again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

enum FanoutMsg {
    Dispatch(VisionEvent),
    Add(Arc<dyn VisionObserver>, oneshot::Sender<ObserverId>),
    Remove(ObserverId, oneshot::Sender<bool>),
}

/// Insertion-ordered observer set. Only touched by the fan-out task.
struct ObserverRegistry {
    next_id: u64,
    observers: Vec<(ObserverId, Arc<dyn VisionObserver>)>,
}

impl ObserverRegistry {
    fn new() -> Self {
        Self {
            next_id: 1,
            observers: Vec::new(),
        }
    }

    /// Adds an observer, ignoring duplicates of the same instance.
    fn add(&mut self, observer: Arc<dyn VisionObserver>) -> ObserverId {
        if let Some((id, _)) = self
            .observers
            .iter()
            .find(|(_, existing)| Arc::ptr_eq(existing, &observer))
        {
            return *id;
        }
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, observer));
        id
    }

    fn remove(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    /// The observer set frozen for one dispatch cycle, in insertion order.
    fn snapshot(&self) -> Vec<Arc<dyn VisionObserver>> {
        self.observers.iter().map(|(_, o)| Arc::clone(o)).collect()
    }

    fn len(&self) -> usize {
        self.observers.len()
    }
}

/// Clonable handle to the fan-out task.
#[derive(Clone)]
pub(crate) struct FanoutHandle {
    tx: mpsc::Sender<FanoutMsg>,
}

impl FanoutHandle {
    /// Spawns the fan-out task and returns its handle.
    pub(crate) fn spawn(capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel(capacity);
        let task = tokio::spawn(async move {
            let mut registry = ObserverRegistry::new();
            while let Some(msg) = rx.recv().await {
                match msg {
                    FanoutMsg::Dispatch(event) => {
                        for observer in registry.snapshot() {
                            deliver(observer.as_ref(), &event);
                        }
                    }
                    FanoutMsg::Add(observer, ack) => {
                        let id = registry.add(observer);
                        debug!(?id, observers = registry.len(), "observer added");
                        let _ = ack.send(id);
                    }
                    FanoutMsg::Remove(id, ack) => {
                        let removed = registry.remove(id);
                        debug!(?id, removed, "observer removed");
                        let _ = ack.send(removed);
                    }
                }
            }
        });
        (Self { tx }, task)
    }

    /// Queues an event for delivery to the current observer set.
    pub(crate) async fn dispatch(&self, event: VisionEvent) {
        let _ = self.tx.send(FanoutMsg::Dispatch(event)).await;
    }

    /// Registers an observer; resolves once registration has taken effect.
    pub(crate) async fn add(&self, observer: Arc<dyn VisionObserver>) -> Option<ObserverId> {
        let (ack, done) = oneshot::channel();
        self.tx.send(FanoutMsg::Add(observer, ack)).await.ok()?;
        done.await.ok()
    }

    /// Unregisters an observer; once this resolves, no further event
    /// reaches it.
    pub(crate) async fn remove(&self, id: ObserverId) -> Option<bool> {
        let (ack, done) = oneshot::channel();
        self.tx.send(FanoutMsg::Remove(id, ack)).await.ok()?;
        done.await.ok()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

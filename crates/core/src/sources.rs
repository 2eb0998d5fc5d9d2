// Event Sources
//
// This module provides the subscription traits the bridge consumes and an
// in-process bus that implements them.
//
// The host delivers diagnostic events and log records through callbacks, one
// item at a time. Subscribing hands back a `Subscription`; releasing it stops
// further deliveries and is safe to repeat.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::events::DiagnosticEvent;
use crate::log_record::LogRecord;

// ============================================================================
// Source Traits
// ============================================================================

/// Callback invoked for each diagnostic event
pub type DiagnosticHandler = Arc<dyn Fn(&DiagnosticEvent) + Send + Sync>;

/// Callback invoked for each log record
pub type LogHandler = Arc<dyn Fn(&LogRecord) + Send + Sync>;

/// Handle returned by a subscription.
pub trait Subscription: Send {
    /// Stop delivery to this subscriber. Calling it again is a no-op.
    fn unsubscribe(&mut self);
}

/// Source of diagnostic events (the host's diagnostic bus).
pub trait DiagnosticSource: Send + Sync {
    /// Register a handler for every diagnostic event.
    fn on_diagnostic_event(&self, handler: DiagnosticHandler) -> Box<dyn Subscription>;
}

/// Source of log records (the host's log transport registry).
pub trait LogSource: Send + Sync {
    /// Register a transport that receives every log record.
    fn register_log_transport(&self, handler: LogHandler) -> Box<dyn Subscription>;
}

// ============================================================================
// EventBus
// ============================================================================

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct BusState<T> {
    next_id: u64,
    subscribers: Vec<(u64, Handler<T>)>,
}

/// Synchronous in-process publish/subscribe bus.
///
/// `emit` delivers to subscribers in subscription order on the caller's
/// thread. The subscriber list is snapshotted before delivery, so a handler
/// may unsubscribe (itself or others) while an item is being delivered.
pub struct EventBus<T> {
    state: Arc<Mutex<BusState<T>>>,
}

impl<T> Clone for EventBus<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: 'static> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> EventBus<T> {
    /// Create a new bus with no subscribers
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState {
                next_id: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Add a subscriber
    pub fn subscribe(&self, handler: Handler<T>) -> BusSubscription<T> {
        let mut state = lock(&self.state);
        let id = state.next_id;
        state.next_id += 1;
        state.subscribers.push((id, handler));

        BusSubscription {
            state: Arc::downgrade(&self.state),
            id: Some(id),
        }
    }

    /// Deliver an item to every current subscriber
    pub fn emit(&self, item: &T) {
        let handlers: Vec<Handler<T>> = lock(&self.state)
            .subscribers
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        for handler in handlers {
            handler(item);
        }
    }

    /// Get the number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        lock(&self.state).subscribers.len()
    }
}

// A handler that panicked while the list was locked must not disable the bus.
fn lock<T>(state: &Mutex<BusState<T>>) -> MutexGuard<'_, BusState<T>> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Subscription to an [`EventBus`]; also released on drop.
pub struct BusSubscription<T> {
    state: Weak<Mutex<BusState<T>>>,
    id: Option<u64>,
}

impl<T> BusSubscription<T> {
    /// Whether this subscription still receives items
    pub fn is_active(&self) -> bool {
        self.id.is_some() && self.state.strong_count() > 0
    }

    fn release(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        if let Some(state) = self.state.upgrade() {
            lock(&state).subscribers.retain(|(sub_id, _)| *sub_id != id);
        }
    }
}

impl<T: 'static> Subscription for BusSubscription<T> {
    fn unsubscribe(&mut self) {
        self.release();
    }
}

impl<T> Drop for BusSubscription<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl DiagnosticSource for EventBus<DiagnosticEvent> {
    fn on_diagnostic_event(&self, handler: DiagnosticHandler) -> Box<dyn Subscription> {
        Box::new(self.subscribe(handler))
    }
}

impl LogSource for EventBus<LogRecord> {
    fn register_log_transport(&self, handler: LogHandler) -> Box<dyn Subscription> {
        Box::new(self.subscribe(handler))
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Typed pub/sub event bus with bounded, evicting history.
//!
//! All inter-component notifications in the core flow through this bus.
//! Publishing is synchronous: `publish` returns only after every handler
//! registered at the start of the call has been invoked. Handler faults are
//! isolated and converted into [`EventType::AgentError`] events published by
//! the bus itself; they never propagate to the publisher.

use std::collections::{HashMap, VecDeque};

use serde_json::{json, Value};
use uuid::Uuid;

use crate::domain::{Event, EventType};
use crate::error::OrchestrationResult;

/// Source id the bus uses for events it publishes on its own behalf
pub const BUS_SOURCE: &str = "event-bus";

/// Bus configuration
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Maximum number of events retained in history; oldest evicted first
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self { capacity: 1000 }
    }
}

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Callback invoked for every matching published event
///
/// Handlers report faults as error values; the bus isolates them.
pub type EventHandler = Box<dyn FnMut(&Event) -> OrchestrationResult<()> + Send>;

struct Subscription {
    id: SubscriptionId,
    handler: EventHandler,
}

/// In-memory pub/sub channel with bounded FIFO history
///
/// Single-writer by construction: every mutating method takes `&mut self`,
/// so callers serialize access through ownership. There is no internal
/// locking; sharing a bus across truly parallel callers requires external
/// synchronization.
pub struct EventBus {
    config: BusConfig,
    history: VecDeque<Event>,
    subscribers: HashMap<EventType, Vec<Subscription>>,
    wildcard: Vec<Subscription>,
    next_subscription: u64,
}

impl EventBus {
    /// Creates a bus with the given configuration
    pub fn new(config: BusConfig) -> Self {
        Self {
            config,
            history: VecDeque::new(),
            subscribers: HashMap::new(),
            wildcard: Vec::new(),
            next_subscription: 0,
        }
    }

    /// Validates, stores and dispatches an event
    ///
    /// Appends the event to the bounded history (evicting the oldest entry
    /// once capacity is exceeded), then synchronously notifies handlers
    /// registered for the exact type, in subscription order, followed by
    /// wildcard handlers.
    ///
    /// # Returns
    /// * `Ok(Uuid)` - Id of the published event, after all handlers ran
    /// * `Err(OrchestrationError::Validation)` - If the event is malformed
    ///
    /// Handler faults never surface here: each one is converted into a
    /// single `AgentError` event referencing the original. That conversion
    /// does not recurse — faults raised while handling the `AgentError`
    /// event itself are logged and dropped.
    pub fn publish(
        &mut self,
        event_type: EventType,
        source: impl Into<String>,
        payload: Value,
        task_id: Option<Uuid>,
    ) -> OrchestrationResult<Uuid> {
        let event = Event::new(event_type, source, payload, task_id)?;
        let event_id = event.id();

        self.append(event.clone());
        let faults = self.dispatch(&event);

        for message in faults {
            tracing::warn!(event = %event.event_type(), error = %message, "event handler fault");
            self.publish_handler_fault(&event, &message);
        }

        Ok(event_id)
    }

    /// Publishes the bus-originated fault event for a failed handler,
    /// without applying fault conversion a second time.
    fn publish_handler_fault(&mut self, original: &Event, message: &str) {
        let payload = json!({
            "message": message,
            "original_event_id": original.id(),
            "original_event_type": original.event_type(),
        });

        let fault_event =
            match Event::new(EventType::AgentError, BUS_SOURCE, payload, original.task_id()) {
                Ok(event) => event,
                Err(err) => {
                    tracing::warn!(error = %err, "could not build handler fault event");
                    return;
                }
            };

        self.append(fault_event.clone());
        for nested in self.dispatch(&fault_event) {
            tracing::warn!(error = %nested, "handler fault while dispatching agent_error, dropped");
        }
    }

    fn append(&mut self, event: Event) {
        self.history.push_back(event);
        while self.history.len() > self.config.capacity {
            self.history.pop_front();
        }
    }

    /// Invokes exact-type handlers then wildcard handlers, collecting fault
    /// messages. The handler set is the one registered when the pass
    /// starts; `&mut self` exclusivity means it cannot change mid-pass.
    fn dispatch(&mut self, event: &Event) -> Vec<String> {
        let mut faults = Vec::new();

        if let Some(subs) = self.subscribers.get_mut(&event.event_type()) {
            for sub in subs.iter_mut() {
                if let Err(err) = (sub.handler)(event) {
                    faults.push(err.to_string());
                }
            }
        }
        for sub in self.wildcard.iter_mut() {
            if let Err(err) = (sub.handler)(event) {
                faults.push(err.to_string());
            }
        }

        faults
    }

    /// Registers a handler for one event type
    ///
    /// Multiple handlers may register for the same type; all are invoked on
    /// every matching publish, in subscription order.
    pub fn subscribe(&mut self, event_type: EventType, handler: EventHandler) -> SubscriptionId {
        let id = self.next_id();
        self.subscribers
            .entry(event_type)
            .or_default()
            .push(Subscription { id, handler });
        id
    }

    /// Registers a handler for every event, invoked after exact-type
    /// handlers
    pub fn subscribe_all(&mut self, handler: EventHandler) -> SubscriptionId {
        let id = self.next_id();
        self.wildcard.push(Subscription { id, handler });
        id
    }

    /// Removes a subscription; returns whether it existed
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        for subs in self.subscribers.values_mut() {
            if let Some(pos) = subs.iter().position(|sub| sub.id == id) {
                subs.remove(pos);
                return true;
            }
        }
        if let Some(pos) = self.wildcard.iter().position(|sub| sub.id == id) {
            self.wildcard.remove(pos);
            return true;
        }
        false
    }

    /// Returns the subset of history relating to one task, in insertion
    /// order. Pure filter, no side effects.
    pub fn task_events(&self, task_id: Uuid) -> Vec<Event> {
        self.history
            .iter()
            .filter(|event| event.task_id() == Some(task_id))
            .cloned()
            .collect()
    }

    /// Returns the most recent `limit` events (the whole bounded history if
    /// `None`), in insertion order
    pub fn history(&self, limit: Option<usize>) -> Vec<Event> {
        let skip = match limit {
            Some(n) => self.history.len().saturating_sub(n),
            None => 0,
        };
        self.history.iter().skip(skip).cloned().collect()
    }

    /// Number of events currently retained
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// True when no events are retained
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Drops all history and subscriptions (shutdown path)
    pub fn clear(&mut self) {
        self.history.clear();
        self.subscribers.clear();
        self.wildcard.clear();
    }

    fn next_id(&mut self) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        id
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}

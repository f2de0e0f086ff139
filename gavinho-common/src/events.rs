//! Event types for the GAVINHO event system
//!
//! Events are broadcast via [`EventBus`] and serialized for SSE transmission.
//! Delivery is lossy: a receiver that lags behind the channel capacity misses
//! the oldest events, and nothing is replayed to late subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// MQT service events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GavinhoEvent {
    /// An import batch finished (possibly with row failures)
    ImportCompleted {
        import_id: i64,
        construction_id: i64,
        imported: usize,
        failed: usize,
        timestamp: DateTime<Utc>,
    },

    /// An import batch was reverted and its items deleted
    ImportReverted {
        import_id: i64,
        construction_id: i64,
        deleted_items: usize,
        timestamp: DateTime<Utc>,
    },

    /// A validation rule was created, changed, toggled or deleted.
    /// `rule_id` is `None` when several rules changed at once.
    ValidationRulesChanged {
        construction_id: i64,
        rule_id: Option<i64>,
        timestamp: DateTime<Utc>,
    },
}

impl GavinhoEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &str {
        match self {
            GavinhoEvent::ImportCompleted { .. } => "ImportCompleted",
            GavinhoEvent::ImportReverted { .. } => "ImportReverted",
            GavinhoEvent::ValidationRulesChanged { .. } => "ValidationRulesChanged",
        }
    }

    /// Construction the event belongs to
    pub fn construction_id(&self) -> i64 {
        match self {
            GavinhoEvent::ImportCompleted { construction_id, .. }
            | GavinhoEvent::ImportReverted { construction_id, .. }
            | GavinhoEvent::ValidationRulesChanged { construction_id, .. } => *construction_id,
        }
    }
}

/// Broadcast channel shared by all handlers of a service
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<GavinhoEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use gavinho_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<GavinhoEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: GavinhoEvent,
    ) -> Result<usize, broadcast::error::SendError<GavinhoEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: GavinhoEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_emitted_event() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();

        let sent = bus
            .emit(GavinhoEvent::ImportReverted {
                import_id: 7,
                construction_id: 3,
                deleted_items: 12,
                timestamp: Utc::now(),
            })
            .expect("one subscriber is listening");
        assert_eq!(sent, 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type(), "ImportReverted");
        assert_eq!(received.construction_id(), 3);
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(10);
        let event = GavinhoEvent::ValidationRulesChanged {
            construction_id: 1,
            rule_id: None,
            timestamp: Utc::now(),
        };

        assert!(bus.emit(event.clone()).is_err());
        // Lossy emit must not panic
        bus.emit_lossy(event);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = GavinhoEvent::ImportCompleted {
            import_id: 1,
            construction_id: 2,
            imported: 5,
            failed: 1,
            timestamp: Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ImportCompleted");
        assert_eq!(json["imported"], 5);
    }
}

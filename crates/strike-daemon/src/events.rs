//! Event emission.
//!
//! Oracle events are wrapped with a type name and timestamp and broadcast
//! to every subscriber. Each subscriber has an independent buffer; a slow
//! subscriber lags and loses the oldest events rather than blocking the
//! watcher.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strike_types::events::OracleEvent;
use strike_types::{Address, Timestamp};
use tokio::sync::broadcast;

/// An event emitted by the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Event type name (e.g. "ExpiryPriceFinalized", "DaemonStarted").
    pub event_type: String,
    /// Unix timestamp.
    pub timestamp: Timestamp,
    /// Type-specific payload.
    pub payload: serde_json::Value,
}

impl Event {
    /// Wrap an oracle event. The payload is the variant's fields.
    pub fn from_oracle(event: &OracleEvent, timestamp: Timestamp) -> serde_json::Result<Self> {
        let payload = match serde_json::to_value(event)? {
            serde_json::Value::Object(tagged) if tagged.len() == 1 => tagged
                .into_iter()
                .next()
                .map(|(_, fields)| fields)
                .unwrap_or_default(),
            other => other,
        };

        Ok(Self {
            event_type: event.name().to_string(),
            timestamp,
            payload,
        })
    }
}

/// Filter for event subscriptions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// Only these event type names.
    pub event_types: Option<Vec<String>>,
    /// Only events concerning these assets. Events without an asset pass.
    pub assets: Option<Vec<Address>>,
}

impl EventFilter {
    /// Check if an event matches this filter.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(ref types) = self.event_types {
            if !types.iter().any(|t| *t == event.event_type) {
                return false;
            }
        }

        if let Some(ref assets) = self.assets {
            let asset = event
                .payload
                .get("asset")
                .and_then(|v| serde_json::from_value::<Address>(v.clone()).ok());
            if let Some(asset) = asset {
                if !assets.contains(&asset) {
                    return false;
                }
            }
        }

        true
    }
}

/// Event bus for broadcasting events to subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    sequence: Arc<AtomicU64>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: Event) {
        self.sequence.fetch_add(1, Ordering::SeqCst);
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    /// Subscribe to events. Returns a receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Number of events emitted so far.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finalized(asset: Address) -> OracleEvent {
        OracleEvent::ExpiryPriceFinalized {
            asset,
            expiry: 1_706_256_000,
            price: 100_000_000,
            finalized_at: 1_706_256_061,
        }
    }

    #[test]
    fn test_event_bus_emit_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(Event {
            event_type: "DaemonStarted".to_string(),
            timestamp: 1000,
            payload: serde_json::json!({"version": "0.1.0"}),
        });

        let event = rx.try_recv().expect("receive event");
        assert_eq!(event.event_type, "DaemonStarted");
        assert_eq!(bus.sequence(), 1);
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(16);
        bus.emit(Event {
            event_type: "DaemonStarted".to_string(),
            timestamp: 1000,
            payload: serde_json::json!({}),
        });
        assert_eq!(bus.sequence(), 1);
    }

    #[test]
    fn test_from_oracle_unwraps_variant() {
        let asset = Address::repeat_byte(0xa1);
        let event = Event::from_oracle(&finalized(asset), 1_706_256_065).expect("wrap");

        assert_eq!(event.event_type, "ExpiryPriceFinalized");
        assert_eq!(event.timestamp, 1_706_256_065);
        assert_eq!(event.payload["expiry"], 1_706_256_000u64);
        assert_eq!(event.payload["price"], "100000000");
        assert_eq!(event.payload["finalized_at"], 1_706_256_061u64);
    }

    #[test]
    fn test_filter_by_type_and_asset() {
        let wanted = Address::repeat_byte(0xa1);
        let other = Address::repeat_byte(0xb1);
        let filter = EventFilter {
            event_types: Some(vec!["ExpiryPriceFinalized".to_string()]),
            assets: Some(vec![wanted]),
        };

        let hit = Event::from_oracle(&finalized(wanted), 0).expect("wrap");
        let miss = Event::from_oracle(&finalized(other), 0).expect("wrap");
        let wrong_type = Event::from_oracle(
            &OracleEvent::PricerUpdated {
                asset: wanted,
                pricer: Address::repeat_byte(0x50),
            },
            0,
        )
        .expect("wrap");

        assert!(filter.matches(&hit));
        assert!(!filter.matches(&miss));
        assert!(!filter.matches(&wrong_type));
    }

    #[test]
    fn test_filter_passes_assetless_events() {
        let filter = EventFilter {
            event_types: None,
            assets: Some(vec![Address::repeat_byte(0xa1)]),
        };
        let event = Event::from_oracle(
            &OracleEvent::WriterUpdated {
                writer: Address::repeat_byte(0x60),
                enabled: true,
            },
            0,
        )
        .expect("wrap");
        assert!(filter.matches(&event));
        assert!(EventFilter::default().matches(&event));
    }
}

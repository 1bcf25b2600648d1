//! Change notifications for rendering and UI observers
//!
//! A thin wrapper over tokio's broadcast channel. Every successful store
//! mutation, history step and mirror failure is published here; observers
//! subscribe and refresh from the session's read API.
//!
//! # Example
//!
//! ```rust
//! use placemark_store::{EventBus, StoreEvent};
//!
//! # tokio_test::block_on(async {
//! let bus = EventBus::new();
//! let mut subscriber = bus.subscribe();
//!
//! bus.publish(StoreEvent::MomentRecorded { note: "Draw".to_string() });
//!
//! let event = subscriber.recv().await.unwrap();
//! assert_eq!(event, StoreEvent::MomentRecorded { note: "Draw".to_string() });
//! # });
//! ```

use tokio::sync::broadcast;

use crate::feature::FeatureId;
use crate::history::Direction;

/// Default channel capacity for broadcast events
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Events published by the store and the session
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// A batch was applied to the feature map
    FeaturesChanged { ids: Vec<FeatureId> },
    /// A new moment was recorded
    MomentRecorded { note: String },
    /// A history step completed
    HistoryTraversed { direction: Direction, note: String },
    /// State was loaded from the durable mirror
    DocumentHydrated { feature_count: usize },
    /// The durable mirror rejected a snapshot; in-memory state is unaffected
    MirrorFailed { reason: String },
}

/// Event bus shared by the store and the session
///
/// Clones share the same underlying channel.
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: broadcast::Sender<StoreEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with custom capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: StoreEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    /// Subscribe to events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

//! Event types for the DAM tagger event system
//!
//! Provides the shared `TaggingEvent` enum and an `EventBus` for broadcasting
//! session, taxonomy and assignment progress to any interested listener.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Phase of a single tag-assignment call
///
/// `Unauthenticated → Authenticating → Resolving(i/n) → Assigning → Done | Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum AssignmentPhase {
    Unauthenticated,
    Authenticating,
    /// Resolving tag `index` (1-based) of `total`
    Resolving { index: usize, total: usize },
    Assigning,
    Done,
    Failed,
}

impl AssignmentPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AssignmentPhase::Done | AssignmentPhase::Failed)
    }
}

impl fmt::Display for AssignmentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignmentPhase::Unauthenticated => write!(f, "unauthenticated"),
            AssignmentPhase::Authenticating => write!(f, "authenticating"),
            AssignmentPhase::Resolving { index, total } => write!(f, "resolving({}/{})", index, total),
            AssignmentPhase::Assigning => write!(f, "assigning"),
            AssignmentPhase::Done => write!(f, "done"),
            AssignmentPhase::Failed => write!(f, "failed"),
        }
    }
}

/// Tagging event types
///
/// Events are broadcast via EventBus and can be serialized for transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TaggingEvent {
    /// Login succeeded and a session credential is held
    SessionEstablished {
        identity: String,
        timestamp: DateTime<Utc>,
    },

    /// Session credential dropped (expired or explicitly invalidated)
    SessionInvalidated {
        timestamp: DateTime<Utc>,
    },

    /// A new taxonomy snapshot was published
    TaxonomyRefreshed {
        tag_count: usize,
        epoch: u64,
        timestamp: DateTime<Utc>,
    },

    /// A tag was created remotely
    TagCreated {
        name: String,
        timestamp: DateTime<Utc>,
    },

    /// A tag value was created remotely
    TagValueCreated {
        tag_name: String,
        value: String,
        timestamp: DateTime<Utc>,
    },

    /// An assignment call moved to a new phase
    AssignmentPhaseChanged {
        run_id: Uuid,
        media_id: String,
        old_phase: AssignmentPhase,
        new_phase: AssignmentPhase,
        timestamp: DateTime<Utc>,
    },

    /// A tag was skipped during resolution
    TagSkipped {
        run_id: Uuid,
        media_id: String,
        tag_name: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Assignment call finished
    AssignmentCompleted {
        run_id: Uuid,
        media_id: String,
        assigned_count: usize,
        skipped_names: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// Assignment call failed
    AssignmentFailed {
        run_id: Uuid,
        media_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast bus for `TaggingEvent`s
///
/// Cloning shares the underlying channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TaggingEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    ///
    /// # Examples
    ///
    /// ```
    /// use dam_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<TaggingEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: TaggingEvent,
    ) -> Result<usize, broadcast::error::SendError<TaggingEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: TaggingEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

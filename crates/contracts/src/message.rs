//! Message and batch data model
//!
//! Wire shape of a batch set:
//! `{"batches":[{"destination":..,"messages":[{"text":..,"timestamp":..}]}]}`

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Destination routing key
pub type Destination = String;

/// One ingested event
///
/// Immutable once created. `timestamp` is caller-supplied and never parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Validate)]
pub struct Message {
    /// Logical channel the message is addressed to
    #[validate(length(min = 1, message = "destination must not be empty"))]
    pub destination: Destination,

    /// Arbitrary payload
    pub text: String,

    /// String-encoded instant
    pub timestamp: String,
}

impl Message {
    /// Create a new message
    pub fn new(
        destination: impl Into<String>,
        text: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            destination: destination.into(),
            text: text.into(),
            timestamp: timestamp.into(),
        }
    }

    /// Split into destination and the destination-less projection
    pub fn into_parts(self) -> (Destination, BatchMessage) {
        (
            self.destination,
            BatchMessage {
                text: self.text,
                timestamp: self.timestamp,
            },
        )
    }
}

/// A message stripped of its destination, scoped to one `Batch`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchMessage {
    pub text: String,
    pub timestamp: String,
}

impl BatchMessage {
    pub fn new(text: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            timestamp: timestamp.into(),
        }
    }
}

/// All messages for one destination within one cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Batch {
    /// Destination shared by every message in the batch
    #[validate(length(min = 1, message = "destination must not be empty"))]
    pub destination: Destination,

    /// Messages in arrival order
    pub messages: Vec<BatchMessage>,
}

impl Batch {
    /// Create an empty batch for a destination
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            messages: Vec::new(),
        }
    }

    /// Number of messages in the batch
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the batch holds no messages
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Every batch produced by one flush cycle (or one direct submission)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct BatchSet {
    #[validate(nested)]
    pub batches: Vec<Batch>,
}

impl BatchSet {
    pub fn new(batches: Vec<Batch>) -> Self {
        Self { batches }
    }

    /// Number of batches
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// Whether the set holds no batches
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Total number of messages across all batches
    pub fn message_count(&self) -> usize {
        self.batches.iter().map(Batch::len).sum()
    }

    /// Find the batch for a destination
    pub fn get(&self, destination: &str) -> Option<&Batch> {
        self.batches.iter().find(|b| b.destination == destination)
    }
}

/// A batch set together with its encoded wire body
///
/// Built once per dispatch and shared by every sink.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Dispatch sequence number (monotonically increasing per dispatcher)
    pub dispatch_id: u64,

    /// Structured batch set
    pub batch_set: BatchSet,

    /// JSON encoding of `batch_set`
    pub body: Bytes,
}

impl Envelope {
    pub fn message_count(&self) -> usize {
        self.batch_set.message_count()
    }
}

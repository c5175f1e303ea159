//! # Notification Records
//!
//! Every successful state-changing operation produces one or more
//! [`Notification`] records `{operation, entity_id, timestamp, actor}`. The
//! engine hands them to a [`NotificationSink`] in the same order the
//! operations were serialized.
//!
//! Delivery beyond the sink is an external concern. Sinks are infallible
//! from the engine's point of view: a sink that cannot deliver must log and
//! retry on its own, never fail the operation that already committed.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::identity::{CaseId, EntryId, Principal};
use crate::temporal::Timestamp;

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// The state change a notification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// A payer deposited value into a new escrow entry.
    Deposited,
    /// The attestor confirmed delivery.
    DeliveryConfirmed,
    /// The payer confirmed receipt.
    ReceiptConfirmed,
    /// The beneficiary requested release of the entry's value.
    ReleaseRequested,
    /// The authority opened an arbitration case for a release request.
    CaseOpened,
    /// A guarantor signed a case.
    Signed,
    /// The payer disputed a case.
    DisputeRaised,
    /// The ledger paid an entry's value out of custody.
    Disbursed,
    /// The authority executed a release to the beneficiary.
    ReleaseExecuted,
    /// The authority refunded the payer.
    CaseRefunded,
}

impl Operation {
    /// Return the string value for serialization.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposited => "deposited",
            Self::DeliveryConfirmed => "delivery_confirmed",
            Self::ReceiptConfirmed => "receipt_confirmed",
            Self::ReleaseRequested => "release_requested",
            Self::CaseOpened => "case_opened",
            Self::Signed => "signed",
            Self::DisputeRaised => "dispute_raised",
            Self::Disbursed => "disbursed",
            Self::ReleaseExecuted => "release_executed",
            Self::CaseRefunded => "case_refunded",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// The entity a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EntityRef {
    /// An escrow entry.
    Entry(EntryId),
    /// An arbitration case.
    Case(CaseId),
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Entry(id) => write!(f, "{id}"),
            Self::Case(id) => write!(f, "{id}"),
        }
    }
}

/// A record of one committed state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// What happened.
    pub operation: Operation,
    /// Which entry or case it happened to.
    pub entity_id: EntityRef,
    /// When the operation observed the clock.
    pub timestamp: Timestamp,
    /// The caller that performed the operation.
    pub actor: Principal,
}

impl Notification {
    /// Build a notification about an escrow entry.
    pub fn entry(operation: Operation, id: EntryId, timestamp: Timestamp, actor: Principal) -> Self {
        Self {
            operation,
            entity_id: EntityRef::Entry(id),
            timestamp,
            actor,
        }
    }

    /// Build a notification about an arbitration case.
    pub fn case(operation: Operation, id: CaseId, timestamp: Timestamp, actor: Principal) -> Self {
        Self {
            operation,
            entity_id: EntityRef::Case(id),
            timestamp,
            actor,
        }
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Receiver of committed notifications, called in serialized order.
pub trait NotificationSink: Send + Sync {
    /// Accept one notification.
    fn publish(&self, notification: &Notification);
}

impl<S: NotificationSink + ?Sized> NotificationSink for Arc<S> {
    fn publish(&self, notification: &Notification) {
        (**self).publish(notification)
    }
}

impl<S: NotificationSink + ?Sized> NotificationSink for Box<S> {
    fn publish(&self, notification: &Notification) {
        (**self).publish(notification)
    }
}

/// Fan out to two sinks, first then second.
impl<A: NotificationSink, B: NotificationSink> NotificationSink for (A, B) {
    fn publish(&self, notification: &Notification) {
        self.0.publish(notification);
        self.1.publish(notification);
    }
}

/// Emits each notification as a structured `tracing` event at `info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn publish(&self, n: &Notification) {
        tracing::info!(
            operation = %n.operation,
            entity = %n.entity_id,
            timestamp = %n.timestamp,
            actor = %n.actor,
            "custody notification"
        );
    }
}

/// Keeps every notification in memory.
///
/// Clones share the same buffer, so a test can give one clone to the engine
/// and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<Notification>>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of every notification received so far, in order.
    pub fn records(&self) -> Vec<Notification> {
        self.records.lock().clone()
    }

    /// The operations received so far, in order.
    pub fn operations(&self) -> Vec<Operation> {
        self.records.lock().iter().map(|n| n.operation).collect()
    }

    /// Number of notifications received.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether nothing has been received.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Remove and return everything received so far.
    pub fn drain(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.records.lock())
    }
}

impl NotificationSink for MemorySink {
    fn publish(&self, notification: &Notification) {
        self.records.lock().push(notification.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor() -> Principal {
        Principal::new("buyer").unwrap()
    }

    fn sample() -> Notification {
        Notification::entry(
            Operation::Deposited,
            EntryId::new(1),
            Timestamp::from_unix_secs(0).unwrap(),
            actor(),
        )
    }

    #[test]
    fn memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.publish(&sample());
        sink.publish(&Notification::case(
            Operation::CaseOpened,
            CaseId::new(1),
            Timestamp::from_unix_secs(5).unwrap(),
            actor(),
        ));
        assert_eq!(
            sink.operations(),
            vec![Operation::Deposited, Operation::CaseOpened]
        );
    }

    #[test]
    fn memory_sink_clones_share_buffer() {
        let sink = MemorySink::new();
        let handle = sink.clone();
        sink.publish(&sample());
        assert_eq!(handle.len(), 1);
        assert_eq!(handle.drain().len(), 1);
        assert!(sink.is_empty());
    }

    #[test]
    fn tuple_sink_fans_out() {
        let a = MemorySink::new();
        let b = MemorySink::new();
        let both = (a.clone(), b.clone());
        both.publish(&sample());
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn notification_json_shape() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["operation"], "deposited");
        assert_eq!(value["entity_id"]["kind"], "entry");
        assert_eq!(value["entity_id"]["id"], 1);
        assert_eq!(value["actor"], "buyer");
        assert_eq!(value["timestamp"], "1970-01-01T00:00:00Z");
    }

    #[test]
    fn operation_display_matches_serde() {
        for op in [
            Operation::Deposited,
            Operation::DeliveryConfirmed,
            Operation::ReceiptConfirmed,
            Operation::ReleaseRequested,
            Operation::CaseOpened,
            Operation::Signed,
            Operation::DisputeRaised,
            Operation::Disbursed,
            Operation::ReleaseExecuted,
            Operation::CaseRefunded,
        ] {
            let json = serde_json::to_string(&op).unwrap();
            assert_eq!(json, format!("\"{op}\""));
        }
    }

    #[test]
    fn entity_ref_display() {
        assert_eq!(format!("{}", EntityRef::Entry(EntryId::new(2))), "entry:2");
        assert_eq!(format!("{}", EntityRef::Case(CaseId::new(9))), "case:9");
    }
}

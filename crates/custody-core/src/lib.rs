#![deny(missing_docs)]

//! # custody-core: Foundational Types for the Custody Engine
//!
//! This crate defines the types that the escrow ledger and the arbitration
//! authority share. It has no internal crate dependencies, only `serde`,
//! `serde_json`, `thiserror`, `chrono`, `uuid`, `parking_lot`, and `tracing`
//! from the external ecosystem.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** A [`CaseId`] cannot be passed
//!    where an [`EntryId`] is expected, and a [`Principal`] is never a bare
//!    string.
//!
//! 2. **Time is injected.** Every time-gate reads a [`Clock`]. Production code
//!    uses [`SystemClock`]; tests and scripted replays drive a [`ManualClock`].
//!
//! 3. **Notifications are records, not side channels.** Every successful state
//!    change produces a [`Notification`] handed to a [`NotificationSink`].

pub mod amount;
pub mod error;
pub mod identity;
pub mod notify;
pub mod temporal;

// Re-export primary types at crate root for ergonomic imports.
pub use amount::Amount;
pub use error::ValidationError;
pub use identity::{AuthorityId, CaseId, EntryId, IdSequence, LedgerId, Principal};
pub use notify::{EntityRef, MemorySink, Notification, NotificationSink, Operation, TracingSink};
pub use temporal::{Clock, ManualClock, SystemClock, Timestamp};

//! # custody-arbitration: Escrow Custody and Arbitration
//!
//! The only paths by which custodied value leaves the system:
//!
//! - **Ledger** ([`ledger`]): Escrow entries moving through deposit,
//!   attested delivery, payer receipt, and beneficiary release request.
//!   Owns custody and is the only component that disburses.
//!
//! - **Authority** ([`authority`]): Arbitration cases opened from release
//!   requests. Guarantors sign; the payer may dispute. Release needs every
//!   signature, no dispute, and Δ_exec; refund needs a dispute and
//!   Δ_dispute.
//!
//! - **Engine** ([`engine`]): The caller-facing facade. Serializes
//!   operations, reads the clock once per operation, and publishes
//!   notifications.
//!
//! - **Config** ([`config`]): Roles and time-gates loaded from YAML or JSON.
//!
//! ## Capabilities
//!
//! The ledger mints a [`ReleaseGrant`] exactly once per entry and moves it
//! straight into the authority's case. [`EscrowLedger::disburse`] accepts
//! nothing else, and an authority accepts case requests only from the ledger
//! it was bound to at construction.

#![deny(missing_docs)]

pub mod authority;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;

// Re-export primary types.
pub use authority::{
    ArbitrationAuthority, ArbitrationCase, CaseResolution, DisputeRecord, GuarantorSet, TimeGates,
};
pub use config::{EngineConfig, EXAMPLE_CONFIG_YAML};
pub use engine::{CustodyEngine, EngineSnapshot};
pub use error::{ConfigError, CustodyError, ErrorKind};
pub use ledger::{
    CaseRequest, CaseTerms, Disbursement, EntryRef, EntryStatus, EscrowEntry, EscrowLedger,
    Outcome, ReleaseGrant,
};

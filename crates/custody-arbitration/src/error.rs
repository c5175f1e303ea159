//! # Custody Error Types
//!
//! Structured error hierarchy for the ledger, the authority, and the engine.
//! Every rejection names the entity it concerns and the state that caused it,
//! and every rejection leaves state unchanged.
//!
//! Callers branch on [`CustodyError::kind`], which maps each variant to a
//! fieldless [`ErrorKind`] that also serializes cleanly (scripted sessions
//! use it to assert expected failures).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use custody_core::{Amount, CaseId, EntryId, Principal, Timestamp, ValidationError};

/// Errors arising from custody operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CustodyError {
    /// The caller does not hold the role the operation requires.
    #[error("{caller} is not authorized to {operation} (requires {required})")]
    NotAuthorized {
        /// The operation that was attempted.
        operation: &'static str,
        /// The rejected caller.
        caller: Principal,
        /// The role that would have been accepted.
        required: &'static str,
    },

    /// Deposits must carry a positive amount.
    #[error("invalid amount {0}: deposits must be greater than zero")]
    InvalidAmount(Amount),

    /// No escrow entry with this id exists.
    #[error("{0} not found")]
    EntryNotFound(EntryId),

    /// No arbitration case with this id exists.
    #[error("{0} not found")]
    CaseNotFound(CaseId),

    /// The lifecycle stage has already been confirmed.
    #[error("{stage} already confirmed for {entry_id}")]
    AlreadyConfirmed {
        /// The escrow entry.
        entry_id: EntryId,
        /// Which confirmation ("delivery" or "receipt").
        stage: &'static str,
    },

    /// A release has already been requested for this entry.
    #[error("release already requested for {0}")]
    AlreadyRequested(EntryId),

    /// The case has already been disputed.
    #[error("{case_id} already disputed at {disputed_at}")]
    AlreadyDisputed {
        /// The arbitration case.
        case_id: CaseId,
        /// When the existing dispute was raised.
        disputed_at: Timestamp,
    },

    /// The case is no longer pending.
    #[error("{case_id} already resolved as {resolution}")]
    AlreadyResolved {
        /// The arbitration case.
        case_id: CaseId,
        /// The terminal resolution name.
        resolution: &'static str,
    },

    /// Receipt cannot be confirmed before delivery.
    #[error("delivery not yet confirmed for {0}")]
    DeliveryNotConfirmed(EntryId),

    /// Release cannot be requested before receipt.
    #[error("receipt not yet confirmed for {0}")]
    ReceiptNotConfirmed(EntryId),

    /// Refund requires a prior dispute.
    #[error("{0} has not been disputed")]
    NotDisputed(CaseId),

    /// Release requires every guarantor's signature.
    #[error("{case_id} has {signed} of {required} guarantor signatures")]
    InsufficientSignatures {
        /// The arbitration case.
        case_id: CaseId,
        /// Signatures collected so far.
        signed: usize,
        /// Signatures required.
        required: usize,
    },

    /// A time-gate has not elapsed yet.
    #[error("{case_id} cannot {operation} before {ready_at} (now {now})")]
    TooEarly {
        /// The arbitration case.
        case_id: CaseId,
        /// The gated operation.
        operation: &'static str,
        /// Earliest instant the operation is permitted.
        ready_at: Timestamp,
        /// The instant the operation observed.
        now: Timestamp,
    },

    /// A dispute blocks normal release; the only path forward is refund.
    #[error("{case_id} is disputed; release is blocked")]
    Disputed {
        /// The arbitration case.
        case_id: CaseId,
    },

    /// The entry has already been finalized.
    #[error("{entry_id} is terminal ({status})")]
    Terminal {
        /// The escrow entry.
        entry_id: EntryId,
        /// The terminal status name.
        status: &'static str,
    },

    /// Disbursement requires a prior release request.
    #[error("no release has been requested for {0}")]
    NotRequested(EntryId),

    /// Accepting the deposit would overflow the custody total.
    #[error("custody total {held} cannot absorb deposit of {amount}")]
    CustodyOverflow {
        /// Value currently held.
        held: u128,
        /// The rejected deposit.
        amount: Amount,
    },
}

impl CustodyError {
    /// The fieldless kind of this error, for branching on cause.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotAuthorized { .. } => ErrorKind::NotAuthorized,
            Self::InvalidAmount(_) => ErrorKind::InvalidAmount,
            Self::EntryNotFound(_) | Self::CaseNotFound(_) => ErrorKind::NotFound,
            Self::AlreadyConfirmed { .. } => ErrorKind::AlreadyConfirmed,
            Self::AlreadyRequested(_) => ErrorKind::AlreadyRequested,
            Self::AlreadyDisputed { .. } => ErrorKind::AlreadyDisputed,
            Self::AlreadyResolved { .. } => ErrorKind::AlreadyResolved,
            Self::DeliveryNotConfirmed(_) => ErrorKind::DeliveryNotConfirmed,
            Self::ReceiptNotConfirmed(_) => ErrorKind::ReceiptNotConfirmed,
            Self::NotDisputed(_) => ErrorKind::NotDisputed,
            Self::InsufficientSignatures { .. } => ErrorKind::InsufficientSignatures,
            Self::TooEarly { .. } => ErrorKind::TooEarly,
            Self::Disputed { .. } => ErrorKind::Disputed,
            Self::Terminal { .. } => ErrorKind::Terminal,
            Self::NotRequested(_) => ErrorKind::NotRequested,
            Self::CustodyOverflow { .. } => ErrorKind::CustodyOverflow,
        }
    }
}

/// Fieldless classification of [`CustodyError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Wrong caller role.
    NotAuthorized,
    /// Zero deposit.
    InvalidAmount,
    /// Unknown entry or case.
    NotFound,
    /// Confirmation repeated.
    AlreadyConfirmed,
    /// Release request repeated.
    AlreadyRequested,
    /// Dispute repeated.
    AlreadyDisputed,
    /// Case no longer pending.
    AlreadyResolved,
    /// Receipt before delivery.
    DeliveryNotConfirmed,
    /// Release request before receipt.
    ReceiptNotConfirmed,
    /// Refund without dispute.
    NotDisputed,
    /// Release without every guarantor signature.
    InsufficientSignatures,
    /// Time-gate not yet elapsed.
    TooEarly,
    /// Release attempted on a disputed case.
    Disputed,
    /// Entry already finalized.
    Terminal,
    /// Disbursement without release request.
    NotRequested,
    /// Custody total overflow.
    CustodyOverflow,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Errors building an engine from configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The two guarantors must be different principals.
    #[error("guarantors must be distinct, got {0} twice")]
    DuplicateGuarantor(Principal),

    /// A delay must be strictly positive.
    #[error("{name} must be positive, got {secs}s")]
    NonPositiveDelay {
        /// Which delay.
        name: &'static str,
        /// The configured value in seconds.
        secs: i64,
    },

    /// A delay is too large to represent as a duration.
    #[error("{name} of {secs}s is out of range")]
    DelayOutOfRange {
        /// Which delay.
        name: &'static str,
        /// The configured value in seconds.
        secs: i64,
    },

    /// The dispute window must outlast the execution delay.
    #[error("dispute delay ({dispute_secs}s) must exceed execution delay ({execution_secs}s)")]
    DisputeDelayTooShort {
        /// Configured execution delay.
        execution_secs: i64,
        /// Configured dispute delay.
        dispute_secs: i64,
    },

    /// A principal in the configuration is malformed.
    #[error("invalid principal in configuration: {0}")]
    Principal(#[from] ValidationError),

    /// The configuration file could not be read.
    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid YAML for this schema.
    #[error("cannot parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The configuration file is not valid JSON for this schema.
    #[error("cannot parse configuration: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(s: &str) -> Principal {
        Principal::new(s).unwrap()
    }

    #[test]
    fn not_authorized_display() {
        let err = CustodyError::NotAuthorized {
            operation: "confirm delivery",
            caller: principal("mallory"),
            required: "attestor",
        };
        let msg = format!("{err}");
        assert!(msg.contains("mallory"));
        assert!(msg.contains("confirm delivery"));
        assert!(msg.contains("attestor"));
    }

    #[test]
    fn too_early_display() {
        let err = CustodyError::TooEarly {
            case_id: CaseId::new(1),
            operation: "execute release",
            ready_at: Timestamp::from_unix_secs(36_000).unwrap(),
            now: Timestamp::from_unix_secs(10).unwrap(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("case:1"));
        assert!(msg.contains("1970-01-01T10:00:00Z"));
    }

    #[test]
    fn insufficient_signatures_display() {
        let err = CustodyError::InsufficientSignatures {
            case_id: CaseId::new(4),
            signed: 1,
            required: 2,
        };
        assert!(format!("{err}").contains("1 of 2"));
    }

    #[test]
    fn not_found_variants_share_kind() {
        assert_eq!(
            CustodyError::EntryNotFound(EntryId::new(1)).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            CustodyError::CaseNotFound(CaseId::new(1)).kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn kind_serializes_as_variant_name() {
        assert_eq!(
            serde_json::to_string(&ErrorKind::TooEarly).unwrap(),
            "\"TooEarly\""
        );
        let kind: ErrorKind = serde_yaml::from_str("Disputed").unwrap();
        assert_eq!(kind, ErrorKind::Disputed);
        assert_eq!(format!("{}", ErrorKind::AlreadyResolved), "AlreadyResolved");
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::DisputeDelayTooShort {
            execution_secs: 100,
            dispute_secs: 50,
        };
        let msg = format!("{err}");
        assert!(msg.contains("100"));
        assert!(msg.contains("50"));
    }
}

//! Scripted sessions.
//!
//! A script is a YAML document with an optional start time and a list of
//! steps. Each step is one engine operation performed as a named caller, or
//! an `advance` of the manual clock. A step may carry `expect: <ErrorKind>`,
//! in which case it must fail with exactly that kind.
//!
//! ```yaml
//! start: 2026-01-01T00:00:00Z
//! steps:
//!   - deposit: { as: buyer, product_ref: "1", amount: 100 }
//!   - confirm_delivery: { as: courier, entry: 1 }
//!   - confirm_receipt: { as: buyer, entry: 1 }
//!   - request_release: { as: seller, entry: 1 }
//!   - sign: { as: seller, case: 1 }
//!   - sign: { as: executor, case: 1 }
//!   - execute: { as: executor, case: 1, expect: TooEarly }
//!   - advance: 36000
//!   - execute: { as: executor, case: 1 }
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use custody_arbitration::ErrorKind;
use custody_core::{Amount, Principal, Timestamp};

/// A parsed session script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    /// Initial manual-clock reading. Defaults to the Unix epoch.
    #[serde(default)]
    pub start: Option<Timestamp>,
    /// Steps in execution order, each a single-key map naming the step.
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    pub steps: Vec<Step>,
}

impl Script {
    /// Parse a YAML script.
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        serde_yaml::from_str(s).context("failed to parse session script")
    }

    /// Load a YAML script from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_yaml_str(&content).with_context(|| format!("in {}", path.display()))
    }
}

/// One scripted step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Step {
    /// Deposit as the payer.
    Deposit {
        /// Caller.
        #[serde(rename = "as")]
        caller: Principal,
        /// Opaque product reference.
        #[serde(default)]
        product_ref: String,
        /// Amount to hold.
        amount: Amount,
        /// Expected rejection, if any.
        #[serde(default)]
        expect: Option<ErrorKind>,
    },
    /// Confirm delivery as the attestor.
    ConfirmDelivery(EntryStep),
    /// Confirm receipt as the payer.
    ConfirmReceipt(EntryStep),
    /// Request release as the beneficiary.
    RequestRelease(EntryStep),
    /// Sign as a guarantor.
    Sign(CaseStep),
    /// Dispute as the payer.
    Dispute {
        /// Caller.
        #[serde(rename = "as")]
        caller: Principal,
        /// Case id.
        case: u64,
        /// Free-form reason.
        #[serde(default)]
        reason: String,
        /// Expected rejection, if any.
        #[serde(default)]
        expect: Option<ErrorKind>,
    },
    /// Execute release as a guarantor.
    Execute(CaseStep),
    /// Refund as a guarantor.
    Refund(CaseStep),
    /// Move the manual clock forward by whole seconds.
    Advance(i64),
    /// Assert whether `who` has signed `case`.
    HasSigned {
        /// Case id.
        case: u64,
        /// Identity to look up.
        who: Principal,
        /// Expected answer.
        signed: bool,
    },
}

impl Step {
    /// Operation name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Deposit { .. } => "deposit",
            Self::ConfirmDelivery(_) => "confirm_delivery",
            Self::ConfirmReceipt(_) => "confirm_receipt",
            Self::RequestRelease(_) => "request_release",
            Self::Sign(_) => "sign",
            Self::Dispute { .. } => "dispute",
            Self::Execute(_) => "execute",
            Self::Refund(_) => "refund",
            Self::Advance(_) => "advance",
            Self::HasSigned { .. } => "has_signed",
        }
    }

    /// The rejection this step is expected to produce.
    pub fn expected(&self) -> Option<ErrorKind> {
        match self {
            Self::Deposit { expect, .. } | Self::Dispute { expect, .. } => *expect,
            Self::ConfirmDelivery(s) | Self::ConfirmReceipt(s) | Self::RequestRelease(s) => s.expect,
            Self::Sign(s) | Self::Execute(s) | Self::Refund(s) => s.expect,
            Self::Advance(_) | Self::HasSigned { .. } => None,
        }
    }
}

/// A step addressed to an escrow entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntryStep {
    /// Caller.
    #[serde(rename = "as")]
    pub caller: Principal,
    /// Entry id.
    pub entry: u64,
    /// Expected rejection, if any.
    #[serde(default)]
    pub expect: Option<ErrorKind>,
}

/// A step addressed to an arbitration case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaseStep {
    /// Caller.
    #[serde(rename = "as")]
    pub caller: Principal,
    /// Case id.
    pub case: u64,
    /// Expected rejection, if any.
    #[serde(default)]
    pub expect: Option<ErrorKind>,
}

//! # Escrow Ledger
//!
//! Custodies deposited value against a four-step workflow:
//!
//! ```text
//! deposit → confirm_delivery (attestor) → confirm_receipt (payer)
//!         → request_fund_release (beneficiary) → [authority decides]
//!         → disburse → Released | Refunded
//! ```
//!
//! ## Security Invariant
//!
//! [`EscrowLedger::disburse`] is the only path by which value leaves
//! custody. It requires a [`ReleaseGrant`], which only this module can mint
//! and which it mints exactly once per entry, inside
//! [`EscrowLedger::request_fund_release`], directly into the authority's
//! case. A grant cannot be cloned, deserialized, or constructed elsewhere.
//! Once an entry is terminal, every mutating operation on it is rejected,
//! so each entry's amount is paid out at most once.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use custody_core::{
    Amount, AuthorityId, CaseId, EntryId, IdSequence, LedgerId, Principal, Timestamp,
};

use crate::authority::ArbitrationAuthority;
use crate::error::CustodyError;

// ── Entry status ────────────────────────────────────────────────────────

/// Whether an entry still holds value.
///
/// Status machine: `Open → [Released | Refunded]`. Both outcomes are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryStatus {
    /// Value is held.
    Open,
    /// Value was paid to the beneficiary. Terminal.
    Released,
    /// Value was returned to the payer. Terminal.
    Refunded,
}

impl EntryStatus {
    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Open)
    }

    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Released => "RELEASED",
            Self::Refunded => "REFUNDED",
        }
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which way a disbursement pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// Pay the beneficiary.
    Released,
    /// Pay the payer back.
    Refunded,
}

impl Outcome {
    fn terminal_status(self) -> EntryStatus {
        match self {
            Self::Released => EntryStatus::Released,
            Self::Refunded => EntryStatus::Refunded,
        }
    }
}

// ── Escrow entry ────────────────────────────────────────────────────────

/// One custodied deposit and its delivery workflow.
///
/// The three confirmation flags only ever move from `false` to `true`; there
/// is no operation that resets them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowEntry {
    /// Sequential identifier within the ledger.
    pub id: EntryId,
    /// Depositor.
    pub payer: Principal,
    /// Counterparty paid on release, fixed at ledger creation.
    pub beneficiary: Principal,
    /// Identity authorized to confirm delivery, fixed at ledger creation.
    pub attestor: Principal,
    /// Caller-supplied reference, informational only.
    pub product_ref: String,
    /// Value held. Immutable after deposit.
    pub amount: Amount,
    /// Attestor has confirmed delivery.
    pub delivery_confirmed: bool,
    /// Payer has confirmed receipt.
    pub receipt_confirmed: bool,
    /// Beneficiary has requested release.
    pub release_requested: bool,
    /// Whether the value is still held.
    pub status: EntryStatus,
    /// When the deposit was made.
    pub deposited_at: Timestamp,
    /// The authority that received the release request, if any.
    pub release_authority: Option<AuthorityId>,
}

/// A reference to an entry in a specific ledger. Not ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryRef {
    /// The owning ledger.
    pub ledger: LedgerId,
    /// The entry within it.
    pub entry: EntryId,
}

impl std::fmt::Display for EntryRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.ledger, self.entry)
    }
}

// ── Capabilities ────────────────────────────────────────────────────────

/// The right to disburse one entry, held by the authority that received the
/// release request for it.
///
/// Minted only by [`EscrowLedger::request_fund_release`]. Not `Clone`, not
/// `Deserialize`, no public constructor.
#[derive(Debug, PartialEq, Eq)]
pub struct ReleaseGrant {
    target: EntryRef,
    authority: AuthorityId,
}

impl ReleaseGrant {
    /// The entry this grant can disburse.
    pub fn target(&self) -> EntryRef {
        self.target
    }

    /// The authority the grant was issued to.
    pub fn authority(&self) -> AuthorityId {
        self.authority
    }
}

/// The ledger's instruction to an authority to open a case.
///
/// Carries the [`ReleaseGrant`] plus the terms copied from the entry.
#[derive(Debug)]
pub struct CaseRequest {
    grant: ReleaseGrant,
    payer: Principal,
    beneficiary: Principal,
    amount: Amount,
    requested_by: Principal,
}

impl CaseRequest {
    /// The entry the case will be about.
    pub fn target(&self) -> EntryRef {
        self.grant.target
    }

    /// The entry's payer.
    pub fn payer(&self) -> &Principal {
        &self.payer
    }

    /// The entry's beneficiary.
    pub fn beneficiary(&self) -> &Principal {
        &self.beneficiary
    }

    /// The entry's amount.
    pub fn amount(&self) -> Amount {
        self.amount
    }

    /// Who requested the release.
    pub fn requested_by(&self) -> &Principal {
        &self.requested_by
    }

    /// Split into the grant and the copied terms.
    pub fn into_parts(self) -> (ReleaseGrant, CaseTerms) {
        (
            self.grant,
            CaseTerms {
                payer: self.payer,
                beneficiary: self.beneficiary,
                amount: self.amount,
            },
        )
    }
}

/// Entry terms copied into a case at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseTerms {
    /// The entry's payer.
    pub payer: Principal,
    /// The entry's beneficiary.
    pub beneficiary: Principal,
    /// The entry's amount.
    pub amount: Amount,
}

// ── Disbursement journal ────────────────────────────────────────────────

/// A completed payout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disbursement {
    /// The entry paid out.
    pub entry_id: EntryId,
    /// Who received the value.
    pub destination: Principal,
    /// Value paid.
    pub amount: Amount,
    /// Release or refund.
    pub outcome: Outcome,
    /// The authority that instructed the payout.
    pub authority: AuthorityId,
    /// When the payout happened.
    pub at: Timestamp,
}

// ── Ledger ──────────────────────────────────────────────────────────────

/// Owns every escrow entry and the value they hold.
///
/// The beneficiary and attestor are fixed at creation.
#[derive(Debug, Clone, Serialize)]
pub struct EscrowLedger {
    id: LedgerId,
    beneficiary: Principal,
    attestor: Principal,
    entries: BTreeMap<EntryId, EscrowEntry>,
    sequence: IdSequence,
    custody: u128,
    disbursements: Vec<Disbursement>,
}

impl EscrowLedger {
    /// Create an empty ledger.
    pub fn new(beneficiary: Principal, attestor: Principal) -> Self {
        Self {
            id: LedgerId::new(),
            beneficiary,
            attestor,
            entries: BTreeMap::new(),
            sequence: IdSequence::new(),
            custody: 0,
            disbursements: Vec::new(),
        }
    }

    /// This ledger's identity.
    pub fn id(&self) -> LedgerId {
        self.id
    }

    /// The beneficiary of every entry.
    pub fn beneficiary(&self) -> &Principal {
        &self.beneficiary
    }

    /// The delivery attestor.
    pub fn attestor(&self) -> &Principal {
        &self.attestor
    }

    /// Look up an entry.
    pub fn entry(&self, id: EntryId) -> Option<&EscrowEntry> {
        self.entries.get(&id)
    }

    /// All entries in id order.
    pub fn entries(&self) -> impl Iterator<Item = &EscrowEntry> {
        self.entries.values()
    }

    /// Number of entries ever created.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entry has been created.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Value currently held.
    pub fn total_custody(&self) -> u128 {
        self.custody
    }

    /// Every payout so far, in order.
    pub fn disbursements(&self) -> &[Disbursement] {
        &self.disbursements
    }

    /// Accept a deposit from `caller`, who becomes the entry's payer.
    ///
    /// # Errors
    ///
    /// - [`CustodyError::InvalidAmount`] if `amount` is zero.
    /// - [`CustodyError::CustodyOverflow`] if the total would overflow.
    pub fn deposit(
        &mut self,
        product_ref: impl Into<String>,
        amount: Amount,
        caller: &Principal,
        now: Timestamp,
    ) -> Result<EntryId, CustodyError> {
        if amount.is_zero() {
            return Err(CustodyError::InvalidAmount(amount));
        }
        let custody = self
            .custody
            .checked_add(u128::from(amount.value()))
            .ok_or(CustodyError::CustodyOverflow {
                held: self.custody,
                amount,
            })?;

        let id = EntryId::new(self.sequence.allocate());
        self.entries.insert(
            id,
            EscrowEntry {
                id,
                payer: caller.clone(),
                beneficiary: self.beneficiary.clone(),
                attestor: self.attestor.clone(),
                product_ref: product_ref.into(),
                amount,
                delivery_confirmed: false,
                receipt_confirmed: false,
                release_requested: false,
                status: EntryStatus::Open,
                deposited_at: now,
                release_authority: None,
            },
        );
        self.custody = custody;
        tracing::info!(entry_id = %id, payer = %caller, %amount, "deposit accepted");
        Ok(id)
    }

    /// Record that the attestor has confirmed delivery.
    ///
    /// # Errors
    ///
    /// [`CustodyError::NotAuthorized`] unless `caller` is the attestor, then
    /// not-found, [`CustodyError::Terminal`], and
    /// [`CustodyError::AlreadyConfirmed`].
    pub fn confirm_delivery(&mut self, id: EntryId, caller: &Principal) -> Result<(), CustodyError> {
        if caller != &self.attestor {
            return Err(CustodyError::NotAuthorized {
                operation: "confirm delivery",
                caller: caller.clone(),
                required: "attestor",
            });
        }
        let entry = self.open_entry_mut(id)?;
        if entry.delivery_confirmed {
            return Err(CustodyError::AlreadyConfirmed {
                entry_id: id,
                stage: "delivery",
            });
        }
        entry.delivery_confirmed = true;
        tracing::info!(entry_id = %id, attestor = %caller, "delivery confirmed");
        Ok(())
    }

    /// Record that the payer has received the goods or service.
    ///
    /// # Errors
    ///
    /// Not-found and [`CustodyError::Terminal`], then
    /// [`CustodyError::NotAuthorized`] unless `caller` is the entry's payer,
    /// [`CustodyError::DeliveryNotConfirmed`], and
    /// [`CustodyError::AlreadyConfirmed`].
    pub fn confirm_receipt(&mut self, id: EntryId, caller: &Principal) -> Result<(), CustodyError> {
        let entry = self.open_entry_mut(id)?;
        if caller != &entry.payer {
            return Err(CustodyError::NotAuthorized {
                operation: "confirm receipt",
                caller: caller.clone(),
                required: "payer of the entry",
            });
        }
        if !entry.delivery_confirmed {
            return Err(CustodyError::DeliveryNotConfirmed(id));
        }
        if entry.receipt_confirmed {
            return Err(CustodyError::AlreadyConfirmed {
                entry_id: id,
                stage: "receipt",
            });
        }
        entry.receipt_confirmed = true;
        tracing::info!(entry_id = %id, payer = %caller, "receipt confirmed");
        Ok(())
    }

    /// Ask `authority` to arbitrate release of the entry's value.
    ///
    /// The authority opens a case holding this entry's [`ReleaseGrant`]. The
    /// entry is marked requested only if the case was opened, so either both
    /// components advance or neither does.
    ///
    /// # Errors
    ///
    /// Not-found and [`CustodyError::Terminal`], then
    /// [`CustodyError::NotAuthorized`] unless `caller` is the beneficiary,
    /// [`CustodyError::ReceiptNotConfirmed`],
    /// [`CustodyError::AlreadyRequested`], and whatever the authority returns
    /// when it refuses the case.
    pub fn request_fund_release(
        &mut self,
        id: EntryId,
        caller: &Principal,
        authority: &mut ArbitrationAuthority,
        now: Timestamp,
    ) -> Result<CaseId, CustodyError> {
        let ledger_id = self.id;
        let entry = self.open_entry_mut(id)?;
        if caller != &entry.beneficiary {
            return Err(CustodyError::NotAuthorized {
                operation: "request fund release",
                caller: caller.clone(),
                required: "beneficiary of the entry",
            });
        }
        if !entry.receipt_confirmed {
            return Err(CustodyError::ReceiptNotConfirmed(id));
        }
        if entry.release_requested {
            return Err(CustodyError::AlreadyRequested(id));
        }

        let request = CaseRequest {
            grant: ReleaseGrant {
                target: EntryRef {
                    ledger: ledger_id,
                    entry: id,
                },
                authority: authority.id(),
            },
            payer: entry.payer.clone(),
            beneficiary: entry.beneficiary.clone(),
            amount: entry.amount,
            requested_by: caller.clone(),
        };
        let case_id = authority.open_case(request, now)?;

        entry.release_requested = true;
        entry.release_authority = Some(authority.id());
        tracing::info!(entry_id = %id, %case_id, authority = %authority.id(), "release requested");
        Ok(case_id)
    }

    /// Pay an entry's value out of custody.
    ///
    /// Only the holder of the entry's [`ReleaseGrant`] can call this, and the
    /// destination must be the party the outcome names: the beneficiary for
    /// [`Outcome::Released`], the payer for [`Outcome::Refunded`].
    ///
    /// # Errors
    ///
    /// - [`CustodyError::NotAuthorized`] if the grant belongs to another
    ///   ledger or authority, or the destination does not match the outcome.
    /// - Not-found, [`CustodyError::Terminal`], [`CustodyError::NotRequested`].
    pub fn disburse(
        &mut self,
        grant: &ReleaseGrant,
        destination: &Principal,
        outcome: Outcome,
        actor: &Principal,
        now: Timestamp,
    ) -> Result<Disbursement, CustodyError> {
        if grant.target.ledger != self.id {
            return Err(CustodyError::NotAuthorized {
                operation: "disburse",
                caller: actor.clone(),
                required: "grant issued by this ledger",
            });
        }
        let id = grant.target.entry;
        let entry = self.open_entry_mut(id)?;
        if !entry.release_requested {
            return Err(CustodyError::NotRequested(id));
        }
        if entry.release_authority != Some(grant.authority) {
            return Err(CustodyError::NotAuthorized {
                operation: "disburse",
                caller: actor.clone(),
                required: "authority that received the release request",
            });
        }
        let (expected, role) = match outcome {
            Outcome::Released => (&entry.beneficiary, "beneficiary as release destination"),
            Outcome::Refunded => (&entry.payer, "payer as refund destination"),
        };
        if destination != expected {
            return Err(CustodyError::NotAuthorized {
                operation: "disburse",
                caller: actor.clone(),
                required: role,
            });
        }

        entry.status = outcome.terminal_status();
        let record = Disbursement {
            entry_id: id,
            destination: destination.clone(),
            amount: entry.amount,
            outcome,
            authority: grant.authority,
            at: now,
        };
        // Deposits added this amount, so the subtraction cannot underflow.
        self.custody -= u128::from(record.amount.value());
        self.disbursements.push(record.clone());
        tracing::info!(
            entry_id = %id,
            destination = %destination,
            amount = %record.amount,
            ?outcome,
            "disbursed"
        );
        Ok(record)
    }

    /// Resolve an entry that must exist and still be open.
    fn open_entry_mut(&mut self, id: EntryId) -> Result<&mut EscrowEntry, CustodyError> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(CustodyError::EntryNotFound(id))?;
        if entry.status.is_terminal() {
            return Err(CustodyError::Terminal {
                entry_id: id,
                status: entry.status.as_str(),
            });
        }
        Ok(entry)
    }
}

//! # Arbitration Authority
//!
//! Turns a release request into a time-gated decision. Each
//! [`ArbitrationCase`] references exactly one escrow entry and holds that
//! entry's [`ReleaseGrant`].
//!
//! ```text
//!            sign / raise_dispute (side transitions)
//!                 ┌──────────┐
//!                 ▼          │
//! open_case → Pending ───────┘
//!                 ├── execute_release → Executed   (all signed, Δ_exec, not disputed)
//!                 └── refund          → Refunded   (disputed, Δ_dispute since dispute)
//! ```
//!
//! ## Security Invariant
//!
//! A case leaves `Pending` only after the ledger has accepted the
//! disbursement, and the resolution is written in the same call. A raised
//! dispute blocks release unconditionally; disputes are settled by timeout,
//! never by guarantor override.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Duration;
use serde::{Deserialize, Serialize};

use custody_core::{Amount, AuthorityId, CaseId, IdSequence, LedgerId, Principal, Timestamp};

use crate::error::{ConfigError, CustodyError};
use crate::ledger::{CaseRequest, Disbursement, EntryRef, EscrowLedger, Outcome, ReleaseGrant};

// ── Guarantors ──────────────────────────────────────────────────────────

/// The fixed pair of identities allowed to sign and resolve cases: the
/// beneficiary's side and a neutral executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuarantorSet([Principal; 2]);

impl GuarantorSet {
    /// Number of signatures a release needs.
    pub const SIZE: usize = 2;

    /// Build the set.
    ///
    /// # Errors
    ///
    /// [`ConfigError::DuplicateGuarantor`] if both identities are equal.
    pub fn new(first: Principal, second: Principal) -> Result<Self, ConfigError> {
        if first == second {
            return Err(ConfigError::DuplicateGuarantor(first));
        }
        Ok(Self([first, second]))
    }

    /// Whether `who` is a guarantor.
    pub fn contains(&self, who: &Principal) -> bool {
        self.0.iter().any(|g| g == who)
    }

    /// Both guarantors.
    pub fn members(&self) -> &[Principal; 2] {
        &self.0
    }
}

// ── Time-gates ──────────────────────────────────────────────────────────

/// Minimum delays before a case can be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeGates {
    execution_delay_secs: i64,
    dispute_delay_secs: i64,
    #[serde(skip)]
    execution_delay: Duration,
    #[serde(skip)]
    dispute_delay: Duration,
}

impl TimeGates {
    /// Build the gates from whole seconds.
    ///
    /// # Errors
    ///
    /// [`ConfigError::NonPositiveDelay`] for a delay ≤ 0,
    /// [`ConfigError::DelayOutOfRange`] for a delay too large to represent
    /// as a duration, and [`ConfigError::DisputeDelayTooShort`] unless the
    /// dispute delay is strictly longer than the execution delay.
    pub fn new(execution_delay_secs: i64, dispute_delay_secs: i64) -> Result<Self, ConfigError> {
        let execution_delay = delay("execution delay", execution_delay_secs)?;
        let dispute_delay = delay("dispute delay", dispute_delay_secs)?;
        if dispute_delay_secs <= execution_delay_secs {
            return Err(ConfigError::DisputeDelayTooShort {
                execution_secs: execution_delay_secs,
                dispute_secs: dispute_delay_secs,
            });
        }
        Ok(Self {
            execution_delay_secs,
            dispute_delay_secs,
            execution_delay,
            dispute_delay,
        })
    }

    /// Δ_exec: time after case creation before release may execute.
    pub fn execution_delay(&self) -> Duration {
        self.execution_delay
    }

    /// Δ_dispute: time after a dispute before refund may execute.
    pub fn dispute_delay(&self) -> Duration {
        self.dispute_delay
    }
}

fn delay(name: &'static str, secs: i64) -> Result<Duration, ConfigError> {
    if secs <= 0 {
        return Err(ConfigError::NonPositiveDelay { name, secs });
    }
    Duration::try_seconds(secs).ok_or(ConfigError::DelayOutOfRange { name, secs })
}

// ── Case ────────────────────────────────────────────────────────────────

/// Whether a case has been decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaseResolution {
    /// Awaiting signatures, a dispute, or a time-gate.
    Pending,
    /// Value released to the beneficiary. Terminal.
    Executed,
    /// Value refunded to the payer. Terminal.
    Refunded,
}

impl CaseResolution {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Executed => "EXECUTED",
            Self::Refunded => "REFUNDED",
        }
    }
}

impl std::fmt::Display for CaseResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The payer's objection to a case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeRecord {
    /// Free-form reason supplied by the payer.
    pub reason: String,
    /// When the dispute was raised.
    pub raised_at: Timestamp,
}

/// A pending or decided release of one escrow entry.
#[derive(Debug, Serialize)]
pub struct ArbitrationCase {
    /// Sequential identifier within the authority.
    pub id: CaseId,
    /// The escrow entry under arbitration.
    pub entry_ref: EntryRef,
    /// The entry's payer, copied at creation; only they may dispute.
    pub payer: Principal,
    /// The entry's beneficiary, copied at creation.
    pub beneficiary: Principal,
    /// The entry's amount, copied at creation.
    pub amount: Amount,
    /// When the case was opened.
    pub created_at: Timestamp,
    /// Guarantors who have signed.
    pub signatures: BTreeSet<Principal>,
    /// The payer's dispute, if raised. Never withdrawn.
    pub dispute: Option<DisputeRecord>,
    /// Current decision.
    pub resolution: CaseResolution,
    /// When the case left `Pending`.
    pub resolved_at: Option<Timestamp>,
    #[serde(skip)]
    grant: ReleaseGrant,
}

impl ArbitrationCase {
    /// Whether the payer has disputed this case.
    pub fn is_disputed(&self) -> bool {
        self.dispute.is_some()
    }

    /// When the dispute was raised, if any.
    pub fn disputed_at(&self) -> Option<Timestamp> {
        self.dispute.as_ref().map(|d| d.raised_at)
    }

    /// Whether `who` has signed.
    pub fn has_signed(&self, who: &Principal) -> bool {
        self.signatures.contains(who)
    }

    fn require_pending(&self) -> Result<(), CustodyError> {
        if self.resolution != CaseResolution::Pending {
            return Err(CustodyError::AlreadyResolved {
                case_id: self.id,
                resolution: self.resolution.as_str(),
            });
        }
        Ok(())
    }
}

// ── Authority ───────────────────────────────────────────────────────────

/// Owns every arbitration case opened against one escrow ledger.
///
/// The ledger binding, guarantor set, and time-gates are fixed at creation.
#[derive(Debug, Serialize)]
pub struct ArbitrationAuthority {
    id: AuthorityId,
    ledger: LedgerId,
    guarantors: GuarantorSet,
    gates: TimeGates,
    cases: BTreeMap<CaseId, ArbitrationCase>,
    sequence: IdSequence,
}

impl ArbitrationAuthority {
    /// Create an authority that accepts cases only from `ledger`.
    pub fn new(ledger: LedgerId, guarantors: GuarantorSet, gates: TimeGates) -> Self {
        Self {
            id: AuthorityId::new(),
            ledger,
            guarantors,
            gates,
            cases: BTreeMap::new(),
            sequence: IdSequence::new(),
        }
    }

    /// This authority's identity.
    pub fn id(&self) -> AuthorityId {
        self.id
    }

    /// The only ledger this authority accepts cases from.
    pub fn ledger_id(&self) -> LedgerId {
        self.ledger
    }

    /// The fixed guarantor pair.
    pub fn guarantors(&self) -> &GuarantorSet {
        &self.guarantors
    }

    /// The fixed time-gates.
    pub fn gates(&self) -> TimeGates {
        self.gates
    }

    /// Whether `who` is a guarantor.
    pub fn is_guarantor(&self, who: &Principal) -> bool {
        self.guarantors.contains(who)
    }

    /// Look up a case.
    pub fn case(&self, id: CaseId) -> Option<&ArbitrationCase> {
        self.cases.get(&id)
    }

    /// All cases in id order.
    pub fn cases(&self) -> impl Iterator<Item = &ArbitrationCase> {
        self.cases.values()
    }

    /// Whether `who` has signed case `id`. `false` for an unknown case.
    pub fn has_signed(&self, id: CaseId, who: &Principal) -> bool {
        self.cases.get(&id).is_some_and(|c| c.has_signed(who))
    }

    /// Number of guarantors who have signed case `id`. `0` for an unknown case.
    pub fn signature_count(&self, id: CaseId) -> usize {
        self.cases.get(&id).map_or(0, |c| c.signatures.len())
    }

    /// Earliest instant `execute_release` can pass its time-gate.
    pub fn release_ready_at(&self, id: CaseId) -> Option<Timestamp> {
        self.cases
            .get(&id)
            .map(|c| c.created_at.plus(self.gates.execution_delay()))
    }

    /// Earliest instant `refund` can pass its time-gate; `None` until disputed.
    pub fn refund_ready_at(&self, id: CaseId) -> Option<Timestamp> {
        self.cases
            .get(&id)
            .and_then(ArbitrationCase::disputed_at)
            .map(|at| at.plus(self.gates.dispute_delay()))
    }

    /// Open a case for a release request minted by the bound ledger.
    ///
    /// # Errors
    ///
    /// [`CustodyError::NotAuthorized`] if the request comes from any other
    /// ledger or carries a grant issued to another authority.
    pub fn open_case(&mut self, request: CaseRequest, now: Timestamp) -> Result<CaseId, CustodyError> {
        let target = request.target();
        if target.ledger != self.ledger {
            return Err(CustodyError::NotAuthorized {
                operation: "open case",
                caller: request.requested_by().clone(),
                required: "request from the bound escrow ledger",
            });
        }
        let (grant, terms) = request.into_parts();
        if grant.authority() != self.id {
            return Err(CustodyError::NotAuthorized {
                operation: "open case",
                caller: terms.beneficiary,
                required: "grant issued to this authority",
            });
        }

        let id = CaseId::new(self.sequence.allocate());
        self.cases.insert(
            id,
            ArbitrationCase {
                id,
                entry_ref: target,
                payer: terms.payer,
                beneficiary: terms.beneficiary,
                amount: terms.amount,
                created_at: now,
                signatures: BTreeSet::new(),
                dispute: None,
                resolution: CaseResolution::Pending,
                resolved_at: None,
                grant,
            },
        );
        tracing::info!(case_id = %id, entry = %target.entry, "case opened");
        Ok(id)
    }

    /// Record `caller`'s signature. Re-signing is a no-op.
    ///
    /// Returns `true` if the signature is new.
    ///
    /// # Errors
    ///
    /// [`CustodyError::NotAuthorized`] unless `caller` is a guarantor, then
    /// not-found and [`CustodyError::AlreadyResolved`].
    pub fn sign(&mut self, id: CaseId, caller: &Principal) -> Result<bool, CustodyError> {
        self.require_guarantor("sign", caller)?;
        let case = self.case_mut(id)?;
        case.require_pending()?;
        let added = case.signatures.insert(caller.clone());
        if added {
            tracing::info!(case_id = %id, guarantor = %caller, "case signed");
        }
        Ok(added)
    }

    /// Record the payer's dispute.
    ///
    /// Existing signatures are kept and signing stays open, but release is
    /// blocked for good; the case can only end in a refund.
    ///
    /// # Errors
    ///
    /// Not-found, then [`CustodyError::NotAuthorized`] unless `caller` is the
    /// payer of the referenced entry, [`CustodyError::AlreadyDisputed`], and
    /// [`CustodyError::AlreadyResolved`].
    pub fn raise_dispute(
        &mut self,
        id: CaseId,
        reason: impl Into<String>,
        caller: &Principal,
        now: Timestamp,
    ) -> Result<(), CustodyError> {
        let case = self.case_mut(id)?;
        if caller != &case.payer {
            return Err(CustodyError::NotAuthorized {
                operation: "raise dispute",
                caller: caller.clone(),
                required: "payer of the referenced entry",
            });
        }
        if let Some(existing) = &case.dispute {
            return Err(CustodyError::AlreadyDisputed {
                case_id: id,
                disputed_at: existing.raised_at,
            });
        }
        case.require_pending()?;
        case.dispute = Some(DisputeRecord {
            reason: reason.into(),
            raised_at: now,
        });
        tracing::info!(case_id = %id, payer = %caller, "dispute raised");
        Ok(())
    }

    /// Release the entry's value to the beneficiary.
    ///
    /// # Errors
    ///
    /// In order: [`CustodyError::NotAuthorized`] unless `caller` is a
    /// guarantor, not-found, [`CustodyError::AlreadyResolved`],
    /// [`CustodyError::Disputed`] if the payer has disputed (regardless of
    /// signatures or time), [`CustodyError::InsufficientSignatures`],
    /// [`CustodyError::TooEarly`] before `created_at + Δ_exec`, and any
    /// rejection from the ledger.
    pub fn execute_release(
        &mut self,
        id: CaseId,
        caller: &Principal,
        ledger: &mut EscrowLedger,
        now: Timestamp,
    ) -> Result<Disbursement, CustodyError> {
        self.require_guarantor("execute release", caller)?;
        let delay = self.gates.execution_delay();
        let case = self.case_mut(id)?;
        case.require_pending()?;
        if case.is_disputed() {
            return Err(CustodyError::Disputed { case_id: id });
        }
        if case.signatures.len() < GuarantorSet::SIZE {
            return Err(CustodyError::InsufficientSignatures {
                case_id: id,
                signed: case.signatures.len(),
                required: GuarantorSet::SIZE,
            });
        }
        let ready_at = case.created_at.plus(delay);
        if now < ready_at {
            return Err(CustodyError::TooEarly {
                case_id: id,
                operation: "execute release",
                ready_at,
                now,
            });
        }

        let payout = ledger.disburse(&case.grant, &case.beneficiary, Outcome::Released, caller, now)?;
        case.resolution = CaseResolution::Executed;
        case.resolved_at = Some(now);
        tracing::info!(case_id = %id, executor = %caller, "release executed");
        Ok(payout)
    }

    /// Return the entry's value to the payer after a dispute has aged.
    ///
    /// # Errors
    ///
    /// In order: [`CustodyError::NotAuthorized`] unless `caller` is a
    /// guarantor, not-found, [`CustodyError::AlreadyResolved`],
    /// [`CustodyError::NotDisputed`], [`CustodyError::TooEarly`] before
    /// `disputed_at + Δ_dispute`, and any rejection from the ledger.
    pub fn refund(
        &mut self,
        id: CaseId,
        caller: &Principal,
        ledger: &mut EscrowLedger,
        now: Timestamp,
    ) -> Result<Disbursement, CustodyError> {
        self.require_guarantor("refund", caller)?;
        let delay = self.gates.dispute_delay();
        let case = self.case_mut(id)?;
        case.require_pending()?;
        let disputed_at = case.disputed_at().ok_or(CustodyError::NotDisputed(id))?;
        let ready_at = disputed_at.plus(delay);
        if now < ready_at {
            return Err(CustodyError::TooEarly {
                case_id: id,
                operation: "refund",
                ready_at,
                now,
            });
        }

        let payout = ledger.disburse(&case.grant, &case.payer, Outcome::Refunded, caller, now)?;
        case.resolution = CaseResolution::Refunded;
        case.resolved_at = Some(now);
        tracing::info!(case_id = %id, executor = %caller, "case refunded");
        Ok(payout)
    }

    fn require_guarantor(&self, operation: &'static str, caller: &Principal) -> Result<(), CustodyError> {
        if !self.guarantors.contains(caller) {
            return Err(CustodyError::NotAuthorized {
                operation,
                caller: caller.clone(),
                required: "guarantor",
            });
        }
        Ok(())
    }

    fn case_mut(&mut self, id: CaseId) -> Result<&mut ArbitrationCase, CustodyError> {
        self.cases.get_mut(&id).ok_or(CustodyError::CaseNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::ledger::EntryStatus;

    const EXEC: i64 = 36_000;
    const DISPUTE: i64 = 864_000;

    fn p(name: &str) -> Principal {
        Principal::new(name).unwrap()
    }

    fn t(secs: i64) -> Timestamp {
        Timestamp::from_unix_secs(secs).unwrap()
    }

    /// A ledger and authority with case 1 opened at t=100 for a 50-unit entry.
    fn opened_case() -> (EscrowLedger, ArbitrationAuthority, CaseId) {
        let mut ledger = EscrowLedger::new(p("seller"), p("courier"));
        let mut authority = ArbitrationAuthority::new(
            ledger.id(),
            GuarantorSet::new(p("seller"), p("executor")).unwrap(),
            TimeGates::new(EXEC, DISPUTE).unwrap(),
        );
        let entry = ledger.deposit("1", Amount::new(50), &p("buyer"), t(0)).unwrap();
        ledger.confirm_delivery(entry, &p("courier")).unwrap();
        ledger.confirm_receipt(entry, &p("buyer")).unwrap();
        let case = ledger
            .request_fund_release(entry, &p("seller"), &mut authority, t(100))
            .unwrap();
        (ledger, authority, case)
    }

    fn sign_both(authority: &mut ArbitrationAuthority, case: CaseId) {
        authority.sign(case, &p("seller")).unwrap();
        authority.sign(case, &p("executor")).unwrap();
    }

    #[test]
    fn guarantor_set_rejects_duplicates() {
        assert!(matches!(
            GuarantorSet::new(p("a"), p("a")),
            Err(ConfigError::DuplicateGuarantor(_))
        ));
    }

    #[test]
    fn time_gates_validation() {
        assert!(TimeGates::new(0, 10).is_err());
        assert!(TimeGates::new(10, -1).is_err());
        assert!(TimeGates::new(10, 10).is_err());
        let gates = TimeGates::new(10, 11).unwrap();
        assert_eq!(gates.execution_delay(), Duration::seconds(10));
        assert_eq!(gates.dispute_delay(), Duration::seconds(11));
    }

    #[test]
    fn time_gates_reject_unrepresentable_delays() {
        assert!(matches!(
            TimeGates::new(i64::MAX, i64::MAX),
            Err(ConfigError::DelayOutOfRange { name: "execution delay", .. })
        ));
        assert!(matches!(
            TimeGates::new(100, i64::MAX / 1000 + 1),
            Err(ConfigError::DelayOutOfRange { name: "dispute delay", .. })
        ));
        let largest = TimeGates::new(100, i64::MAX / 1000).unwrap();
        assert_eq!(largest.dispute_delay().num_seconds(), i64::MAX / 1000);
    }

    #[test]
    fn new_case_is_pending_and_unsigned() {
        let (_, authority, case) = opened_case();
        let c = authority.case(case).unwrap();
        assert_eq!(c.resolution, CaseResolution::Pending);
        assert!(c.signatures.is_empty());
        assert!(!c.is_disputed());
        assert!(!authority.has_signed(case, &p("seller")));
        assert!(!authority.has_signed(case, &p("executor")));
        assert_eq!(authority.release_ready_at(case), Some(t(100 + EXEC)));
        assert_eq!(authority.refund_ready_at(case), None);
    }

    #[test]
    fn only_guarantors_sign() {
        let (_, mut authority, case) = opened_case();
        let err = authority.sign(case, &p("buyer")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotAuthorized);
    }

    #[test]
    fn signing_is_idempotent() {
        let (_, mut authority, case) = opened_case();
        assert!(authority.sign(case, &p("executor")).unwrap());
        assert!(!authority.sign(case, &p("executor")).unwrap());
        let c = authority.case(case).unwrap();
        assert_eq!(c.signatures.len(), 1);
        assert!(authority.has_signed(case, &p("executor")));
    }

    #[test]
    fn has_signed_unknown_case_is_false() {
        let (_, authority, _) = opened_case();
        assert!(!authority.has_signed(CaseId::new(99), &p("seller")));
    }

    #[test]
    fn sign_unknown_case() {
        let (_, mut authority, _) = opened_case();
        let err = authority.sign(CaseId::new(2), &p("seller")).unwrap_err();
        assert_eq!(err, CustodyError::CaseNotFound(CaseId::new(2)));
    }

    #[test]
    fn release_needs_both_signatures() {
        let (mut ledger, mut authority, case) = opened_case();
        authority.sign(case, &p("seller")).unwrap();
        let err = authority
            .execute_release(case, &p("executor"), &mut ledger, t(100 + EXEC))
            .unwrap_err();
        assert_eq!(
            err,
            CustodyError::InsufficientSignatures {
                case_id: case,
                signed: 1,
                required: 2
            }
        );
    }

    #[test]
    fn release_waits_for_execution_delay() {
        let (mut ledger, mut authority, case) = opened_case();
        sign_both(&mut authority, case);
        let err = authority
            .execute_release(case, &p("executor"), &mut ledger, t(100 + EXEC - 1))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TooEarly);
        assert_eq!(ledger.total_custody(), 50);
    }

    #[test]
    fn release_at_gate_pays_beneficiary() {
        let (mut ledger, mut authority, case) = opened_case();
        sign_both(&mut authority, case);
        let payout = authority
            .execute_release(case, &p("executor"), &mut ledger, t(100 + EXEC))
            .unwrap();
        assert_eq!(payout.destination, p("seller"));
        assert_eq!(payout.amount, Amount::new(50));
        assert_eq!(payout.outcome, Outcome::Released);

        let c = authority.case(case).unwrap();
        assert_eq!(c.resolution, CaseResolution::Executed);
        assert_eq!(c.resolved_at, Some(t(100 + EXEC)));
        let entry = ledger.entry(c.entry_ref.entry).unwrap();
        assert_eq!(entry.status, EntryStatus::Released);
        assert_eq!(ledger.total_custody(), 0);
    }

    #[test]
    fn non_guarantor_cannot_execute() {
        let (mut ledger, mut authority, case) = opened_case();
        sign_both(&mut authority, case);
        let err = authority
            .execute_release(case, &p("buyer"), &mut ledger, t(100 + EXEC))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotAuthorized);
    }

    #[test]
    fn resolved_case_rejects_everything() {
        let (mut ledger, mut authority, case) = opened_case();
        sign_both(&mut authority, case);
        authority
            .execute_release(case, &p("seller"), &mut ledger, t(100 + EXEC))
            .unwrap();

        let now = t(100 + EXEC + DISPUTE);
        for err in [
            authority.sign(case, &p("seller")).unwrap_err(),
            authority
                .raise_dispute(case, "late", &p("buyer"), now)
                .unwrap_err(),
            authority
                .execute_release(case, &p("seller"), &mut ledger, now)
                .unwrap_err(),
            authority
                .refund(case, &p("seller"), &mut ledger, now)
                .unwrap_err(),
        ] {
            assert_eq!(err.kind(), ErrorKind::AlreadyResolved);
        }
        assert_eq!(ledger.disbursements().len(), 1);
    }

    #[test]
    fn only_payer_disputes() {
        let (_, mut authority, case) = opened_case();
        let err = authority
            .raise_dispute(case, "not me", &p("seller"), t(200))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotAuthorized);
        assert!(!authority.case(case).unwrap().is_disputed());
    }

    #[test]
    fn dispute_is_one_shot() {
        let (_, mut authority, case) = opened_case();
        authority
            .raise_dispute(case, "damaged", &p("buyer"), t(200))
            .unwrap();
        let err = authority
            .raise_dispute(case, "again", &p("buyer"), t(300))
            .unwrap_err();
        assert_eq!(
            err,
            CustodyError::AlreadyDisputed {
                case_id: case,
                disputed_at: t(200)
            }
        );
        let c = authority.case(case).unwrap();
        assert_eq!(c.dispute.as_ref().unwrap().reason, "damaged");
        assert_eq!(authority.refund_ready_at(case), Some(t(200 + DISPUTE)));
    }

    #[test]
    fn dispute_keeps_signatures_and_allows_signing() {
        let (_, mut authority, case) = opened_case();
        authority.sign(case, &p("seller")).unwrap();
        authority
            .raise_dispute(case, "damaged", &p("buyer"), t(200))
            .unwrap();
        assert!(authority.sign(case, &p("executor")).unwrap());
        assert_eq!(authority.case(case).unwrap().signatures.len(), 2);
    }

    #[test]
    fn dispute_blocks_release_even_when_signed_and_late() {
        let (mut ledger, mut authority, case) = opened_case();
        authority
            .raise_dispute(case, "damaged", &p("buyer"), t(150))
            .unwrap();
        sign_both(&mut authority, case);
        let err = authority
            .execute_release(case, &p("executor"), &mut ledger, t(10_000_000))
            .unwrap_err();
        assert_eq!(err, CustodyError::Disputed { case_id: case });
    }

    #[test]
    fn dispute_outranks_missing_signatures_and_early_time() {
        let (mut ledger, mut authority, case) = opened_case();
        authority
            .raise_dispute(case, "damaged", &p("buyer"), t(150))
            .unwrap();
        let err = authority
            .execute_release(case, &p("executor"), &mut ledger, t(151))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Disputed);
    }

    #[test]
    fn refund_requires_dispute() {
        let (mut ledger, mut authority, case) = opened_case();
        let err = authority
            .refund(case, &p("executor"), &mut ledger, t(100 + DISPUTE))
            .unwrap_err();
        assert_eq!(err, CustodyError::NotDisputed(case));
    }

    #[test]
    fn refund_waits_for_dispute_delay() {
        let (mut ledger, mut authority, case) = opened_case();
        authority
            .raise_dispute(case, "damaged", &p("buyer"), t(500))
            .unwrap();
        let err = authority
            .refund(case, &p("executor"), &mut ledger, t(500 + DISPUTE - 1))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TooEarly);

        let payout = authority
            .refund(case, &p("executor"), &mut ledger, t(500 + DISPUTE))
            .unwrap();
        assert_eq!(payout.destination, p("buyer"));
        assert_eq!(payout.outcome, Outcome::Refunded);
        let c = authority.case(case).unwrap();
        assert_eq!(c.resolution, CaseResolution::Refunded);
        assert_eq!(
            ledger.entry(c.entry_ref.entry).unwrap().status,
            EntryStatus::Refunded
        );
        assert_eq!(ledger.total_custody(), 0);
    }

    #[test]
    fn dispute_after_refund_reports_already_disputed() {
        let (mut ledger, mut authority, case) = opened_case();
        authority
            .raise_dispute(case, "damaged", &p("buyer"), t(100))
            .unwrap();
        authority
            .refund(case, &p("seller"), &mut ledger, t(100 + DISPUTE))
            .unwrap();
        let err = authority
            .raise_dispute(case, "again", &p("buyer"), t(200 + DISPUTE))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyDisputed);
        assert_eq!(
            authority.case(case).unwrap().dispute.as_ref().map(|d| d.raised_at),
            Some(t(100))
        );
    }

    #[test]
    fn refund_without_signatures_is_fine() {
        let (mut ledger, mut authority, case) = opened_case();
        authority
            .raise_dispute(case, "never arrived", &p("buyer"), t(100))
            .unwrap();
        assert!(authority
            .refund(case, &p("seller"), &mut ledger, t(100 + DISPUTE))
            .is_ok());
    }

    #[test]
    fn wrong_ledger_rejects_disbursement_and_case_stays_pending() {
        let (_, mut authority, case) = opened_case();
        let mut impostor = EscrowLedger::new(p("seller"), p("courier"));
        sign_both(&mut authority, case);
        let err = authority
            .execute_release(case, &p("seller"), &mut impostor, t(100 + EXEC))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotAuthorized);
        assert_eq!(
            authority.case(case).unwrap().resolution,
            CaseResolution::Pending
        );
    }

    #[test]
    fn case_serialization_omits_grant() {
        let (_, authority, case) = opened_case();
        let value = serde_json::to_value(authority.case(case).unwrap()).unwrap();
        assert!(value.get("grant").is_none());
        assert_eq!(value["resolution"], "Pending");
        assert_eq!(value["amount"], 50);
    }
}

//! # Custody Engine
//!
//! The boundary every caller goes through. [`CustodyEngine`] owns one
//! [`EscrowLedger`] and the [`ArbitrationAuthority`] bound to it, reads the
//! injected [`Clock`] once per operation, and publishes a [`Notification`]
//! for every committed state change.
//!
//! Every mutating method takes `&mut self`, so operations are serialized by
//! the borrow checker. A host that shares an engine across threads wraps it
//! in a mutex; the engine itself never blocks.
//!
//! ## Clock guard
//!
//! The engine remembers the latest reading it has observed. A reading
//! earlier than that is clamped to it and logged at `warn`, so a time-gate
//! that has opened never closes again.

use serde::Serialize;

use custody_core::{
    Amount, CaseId, Clock, EntryId, Notification, NotificationSink, Operation, Principal,
    SystemClock, Timestamp, TracingSink,
};

use crate::authority::{ArbitrationAuthority, ArbitrationCase, GuarantorSet, TimeGates};
use crate::config::EngineConfig;
use crate::error::{ConfigError, CustodyError};
use crate::ledger::{Disbursement, EscrowEntry, EscrowLedger};

/// Serializable view of the whole engine state.
#[derive(Debug, Serialize)]
pub struct EngineSnapshot<'a> {
    /// The latest clock reading the engine has used.
    pub observed_at: Option<Timestamp>,
    /// Ledger state, including the disbursement journal.
    pub ledger: &'a EscrowLedger,
    /// Authority state, including every case.
    pub authority: &'a ArbitrationAuthority,
}

/// One escrow ledger, its arbitration authority, a clock, and a sink.
#[derive(Debug)]
pub struct CustodyEngine<C: Clock = SystemClock, S: NotificationSink = TracingSink> {
    ledger: EscrowLedger,
    authority: ArbitrationAuthority,
    clock: C,
    sink: S,
    last_seen: Option<Timestamp>,
}

impl<C: Clock, S: NotificationSink> CustodyEngine<C, S> {
    /// Build a fresh ledger and an authority bound to it.
    pub fn new(
        beneficiary: Principal,
        attestor: Principal,
        guarantors: GuarantorSet,
        gates: TimeGates,
        clock: C,
        sink: S,
    ) -> Self {
        let ledger = EscrowLedger::new(beneficiary, attestor);
        let authority = ArbitrationAuthority::new(ledger.id(), guarantors, gates);
        tracing::info!(
            ledger = %ledger.id(),
            authority = %authority.id(),
            exec_delay_secs = gates.execution_delay().num_seconds(),
            dispute_delay_secs = gates.dispute_delay().num_seconds(),
            "custody engine created"
        );
        Self {
            ledger,
            authority,
            clock,
            sink,
            last_seen: None,
        }
    }

    /// Build from validated configuration.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] from [`EngineConfig::validate`].
    pub fn from_config(config: &EngineConfig, clock: C, sink: S) -> Result<Self, ConfigError> {
        Ok(Self::new(
            config.beneficiary.clone(),
            config.attestor.clone(),
            config.guarantor_set()?,
            config.time_gates()?,
            clock,
            sink,
        ))
    }

    // ── Ledger operations ───────────────────────────────────────────────

    /// Deposit `amount` as `caller`, who becomes the payer.
    pub fn deposit(
        &mut self,
        product_ref: impl Into<String>,
        amount: Amount,
        caller: &Principal,
    ) -> Result<EntryId, CustodyError> {
        let now = self.observe_now();
        let id = self
            .ledger
            .deposit(product_ref, amount, caller, now)
            .map_err(|e| rejected("deposit", caller, e))?;
        self.emit(Notification::entry(Operation::Deposited, id, now, caller.clone()));
        Ok(id)
    }

    /// Confirm delivery as the attestor.
    pub fn confirm_delivery(&mut self, id: EntryId, caller: &Principal) -> Result<(), CustodyError> {
        let now = self.observe_now();
        self.ledger
            .confirm_delivery(id, caller)
            .map_err(|e| rejected("confirm_delivery", caller, e))?;
        self.emit(Notification::entry(Operation::DeliveryConfirmed, id, now, caller.clone()));
        Ok(())
    }

    /// Confirm receipt as the entry's payer.
    pub fn confirm_receipt(&mut self, id: EntryId, caller: &Principal) -> Result<(), CustodyError> {
        let now = self.observe_now();
        self.ledger
            .confirm_receipt(id, caller)
            .map_err(|e| rejected("confirm_receipt", caller, e))?;
        self.emit(Notification::entry(Operation::ReceiptConfirmed, id, now, caller.clone()));
        Ok(())
    }

    /// Request release as the beneficiary. Opens a case and returns its id.
    pub fn request_fund_release(&mut self, id: EntryId, caller: &Principal) -> Result<CaseId, CustodyError> {
        let now = self.observe_now();
        let case_id = self
            .ledger
            .request_fund_release(id, caller, &mut self.authority, now)
            .map_err(|e| rejected("request_fund_release", caller, e))?;
        self.emit(Notification::entry(Operation::ReleaseRequested, id, now, caller.clone()));
        self.emit(Notification::case(Operation::CaseOpened, case_id, now, caller.clone()));
        Ok(case_id)
    }

    // ── Authority operations ────────────────────────────────────────────

    /// Sign a case as a guarantor. Returns `true` if the signature is new;
    /// a repeated signature changes nothing and emits nothing.
    pub fn sign(&mut self, case_id: CaseId, caller: &Principal) -> Result<bool, CustodyError> {
        let now = self.observe_now();
        let added = self
            .authority
            .sign(case_id, caller)
            .map_err(|e| rejected("sign", caller, e))?;
        if added {
            self.emit(Notification::case(Operation::Signed, case_id, now, caller.clone()));
        }
        Ok(added)
    }

    /// Dispute a case as the payer of its entry.
    pub fn raise_dispute(
        &mut self,
        case_id: CaseId,
        reason: impl Into<String>,
        caller: &Principal,
    ) -> Result<(), CustodyError> {
        let now = self.observe_now();
        self.authority
            .raise_dispute(case_id, reason, caller, now)
            .map_err(|e| rejected("raise_dispute", caller, e))?;
        self.emit(Notification::case(Operation::DisputeRaised, case_id, now, caller.clone()));
        Ok(())
    }

    /// Execute a fully signed, undisputed release as a guarantor.
    pub fn execute_release(&mut self, case_id: CaseId, caller: &Principal) -> Result<Disbursement, CustodyError> {
        let now = self.observe_now();
        let payout = self
            .authority
            .execute_release(case_id, caller, &mut self.ledger, now)
            .map_err(|e| rejected("execute_release", caller, e))?;
        self.emit(Notification::entry(Operation::Disbursed, payout.entry_id, now, caller.clone()));
        self.emit(Notification::case(Operation::ReleaseExecuted, case_id, now, caller.clone()));
        Ok(payout)
    }

    /// Refund a disputed case as a guarantor once the dispute window closes.
    pub fn refund(&mut self, case_id: CaseId, caller: &Principal) -> Result<Disbursement, CustodyError> {
        let now = self.observe_now();
        let payout = self
            .authority
            .refund(case_id, caller, &mut self.ledger, now)
            .map_err(|e| rejected("refund", caller, e))?;
        self.emit(Notification::entry(Operation::Disbursed, payout.entry_id, now, caller.clone()));
        self.emit(Notification::case(Operation::CaseRefunded, case_id, now, caller.clone()));
        Ok(payout)
    }

    // ── Queries ─────────────────────────────────────────────────────────

    /// Whether `who` has signed `case_id`.
    pub fn has_signed(&self, case_id: CaseId, who: &Principal) -> bool {
        self.authority.has_signed(case_id, who)
    }

    /// Signatures collected on `case_id`.
    pub fn signature_count(&self, case_id: CaseId) -> usize {
        self.authority.signature_count(case_id)
    }

    /// Whether `who` is a guarantor.
    pub fn is_guarantor(&self, who: &Principal) -> bool {
        self.authority.is_guarantor(who)
    }

    /// Look up an escrow entry.
    pub fn entry(&self, id: EntryId) -> Option<&EscrowEntry> {
        self.ledger.entry(id)
    }

    /// Look up an arbitration case.
    pub fn case(&self, id: CaseId) -> Option<&ArbitrationCase> {
        self.authority.case(id)
    }

    /// Earliest instant release can execute.
    pub fn release_ready_at(&self, id: CaseId) -> Option<Timestamp> {
        self.authority.release_ready_at(id)
    }

    /// Earliest instant refund can execute, once disputed.
    pub fn refund_ready_at(&self, id: CaseId) -> Option<Timestamp> {
        self.authority.refund_ready_at(id)
    }

    /// Value currently held.
    pub fn total_custody(&self) -> u128 {
        self.ledger.total_custody()
    }

    /// Every payout so far.
    pub fn disbursements(&self) -> &[Disbursement] {
        self.ledger.disbursements()
    }

    /// The ledger.
    pub fn ledger(&self) -> &EscrowLedger {
        &self.ledger
    }

    /// The authority.
    pub fn authority(&self) -> &ArbitrationAuthority {
        &self.authority
    }

    /// The injected clock.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// The notification sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Serializable view of the current state.
    pub fn snapshot(&self) -> EngineSnapshot<'_> {
        EngineSnapshot {
            observed_at: self.last_seen,
            ledger: &self.ledger,
            authority: &self.authority,
        }
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn observe_now(&mut self) -> Timestamp {
        let reading = self.clock.now();
        match self.last_seen {
            Some(last) if reading < last => {
                tracing::warn!(%reading, %last, "clock moved backwards; using last observed time");
                last
            }
            _ => {
                self.last_seen = Some(reading);
                reading
            }
        }
    }

    fn emit(&self, notification: Notification) {
        self.sink.publish(&notification);
    }
}

fn rejected(operation: &'static str, caller: &Principal, err: CustodyError) -> CustodyError {
    tracing::debug!(operation, %caller, kind = %err.kind(), error = %err, "operation rejected");
    err
}

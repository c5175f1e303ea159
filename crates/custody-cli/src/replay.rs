//! # Run Subcommand
//!
//! Replays a [`Script`] against a fresh [`CustodyEngine`] driven by a
//! [`ManualClock`]. Every notification is written to the output as one JSON
//! line, in the order the engine published it, followed by one summary line.
//!
//! A step that fails without a matching `expect`, or that succeeds when a
//! rejection was expected, aborts the replay with the step number.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Duration;
use clap::Args;
use serde::Serialize;

use custody_arbitration::{CustodyEngine, CustodyError, Disbursement, EngineConfig};
use custody_core::{
    CaseId, Clock, EntryId, ManualClock, MemorySink, Notification, Timestamp, TracingSink,
};

use crate::script::{Script, Step};

/// Arguments for the `custody run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Engine configuration (YAML or JSON).
    #[arg(long)]
    pub config: PathBuf,
    /// Session script (YAML).
    #[arg(long)]
    pub script: PathBuf,
    /// Also print the final engine state as pretty JSON.
    #[arg(long)]
    pub snapshot: bool,
}

/// Totals reported after a successful replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    /// Steps executed.
    pub steps: usize,
    /// Notifications published.
    pub notifications: usize,
    /// Steps that failed with their expected error kind.
    pub expected_rejections: usize,
    /// Value still in custody.
    pub total_custody: u128,
    /// Every payout, in order.
    pub disbursements: Vec<Disbursement>,
    /// Manual-clock reading at the end of the script.
    pub finished_at: Timestamp,
}

/// The engine a replay runs on.
pub type ReplayEngine = CustodyEngine<ManualClock, (MemorySink, TracingSink)>;

/// Execute the run subcommand, writing to stdout.
pub fn run_replay(args: &RunArgs) -> Result<u8> {
    let config = EngineConfig::load(&args.config)
        .with_context(|| format!("invalid configuration: {}", args.config.display()))?;
    let script = Script::load(&args.script)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let engine = replay(&config, &script, &mut out)?;
    if args.snapshot {
        serde_json::to_writer_pretty(&mut out, &engine.snapshot())?;
        writeln!(out)?;
    }
    Ok(0)
}

/// Replay `script` against a fresh engine built from `config`.
///
/// Returns the engine in its final state so callers can inspect it.
pub fn replay(config: &EngineConfig, script: &Script, out: &mut dyn Write) -> Result<ReplayEngine> {
    let clock = match script.start {
        Some(start) => ManualClock::new(start),
        None => ManualClock::at_epoch(),
    };
    let sink = MemorySink::new();
    let mut engine = CustodyEngine::from_config(config, clock.clone(), (sink.clone(), TracingSink))?;

    let mut notifications = 0;
    let mut expected_rejections = 0;
    for (index, step) in script.steps.iter().enumerate() {
        let number = index + 1;
        let outcome = apply(&mut engine, &clock, step)
            .with_context(|| format!("step {number} ({})", step.name()))?;

        match (outcome, step.expected()) {
            (Ok(()), None) => {}
            (Err(err), Some(kind)) if err.kind() == kind => {
                tracing::info!(step = number, %kind, "expected rejection");
                expected_rejections += 1;
            }
            (Ok(()), Some(kind)) => {
                bail!("step {number} ({}): expected {kind}, but it succeeded", step.name())
            }
            (Err(err), _) => bail!("step {number} ({}): {err} [{}]", step.name(), err.kind()),
        }

        for record in sink.drain() {
            write_line(out, &record)?;
            notifications += 1;
        }
    }

    let summary = ReplaySummary {
        steps: script.steps.len(),
        notifications,
        expected_rejections,
        total_custody: engine.total_custody(),
        disbursements: engine.disbursements().to_vec(),
        finished_at: clock.now(),
    };
    serde_json::to_writer(&mut *out, &serde_json::json!({ "summary": summary }))?;
    writeln!(out)?;
    Ok(engine)
}

/// Perform one step. The outer `Result` is a script error; the inner one is
/// the engine's verdict.
fn apply(
    engine: &mut ReplayEngine,
    clock: &ManualClock,
    step: &Step,
) -> Result<Result<(), CustodyError>> {
    let verdict = match step {
        Step::Deposit {
            caller,
            product_ref,
            amount,
            ..
        } => engine
            .deposit(product_ref.clone(), *amount, caller)
            .map(drop),
        Step::ConfirmDelivery(s) => engine.confirm_delivery(EntryId::new(s.entry), &s.caller),
        Step::ConfirmReceipt(s) => engine.confirm_receipt(EntryId::new(s.entry), &s.caller),
        Step::RequestRelease(s) => engine
            .request_fund_release(EntryId::new(s.entry), &s.caller)
            .map(drop),
        Step::Sign(s) => engine.sign(CaseId::new(s.case), &s.caller).map(drop),
        Step::Dispute {
            caller,
            case,
            reason,
            ..
        } => engine.raise_dispute(CaseId::new(*case), reason.clone(), caller),
        Step::Execute(s) => engine
            .execute_release(CaseId::new(s.case), &s.caller)
            .map(drop),
        Step::Refund(s) => engine.refund(CaseId::new(s.case), &s.caller).map(drop),
        Step::Advance(secs) => {
            let delta = match Duration::try_seconds(*secs) {
                Some(delta) if *secs >= 0 => delta,
                _ => bail!("cannot advance the clock by {secs}s"),
            };
            if clock.now().as_datetime().checked_add_signed(delta).is_none() {
                bail!("advancing the clock by {secs}s leaves the representable range");
            }
            clock.advance(delta);
            Ok(())
        }
        Step::HasSigned { case, who, signed } => {
            let actual = engine.has_signed(CaseId::new(*case), who);
            if actual != *signed {
                bail!("has_signed({case}, {who}) is {actual}, expected {signed}");
            }
            Ok(())
        }
    };
    Ok(verdict)
}

fn write_line(out: &mut dyn Write, record: &Notification) -> Result<()> {
    serde_json::to_writer(&mut *out, record)?;
    writeln!(out)?;
    Ok(())
}

//! `bacstop check`: the hook entry point.
//!
//! Loads the repository's policy, runs one breath test, decides, applies the
//! decision to the working tree, and maps the result to an exit code:
//! 0 allow, 1 blocked (including a completed destroy), 2 error or a destroy
//! that could not complete.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use bacstop_actuator::{ActionResult, RepositoryActuator};
use bacstop_policy::{decide, Decision, HookKind, PolicyConfig};
use bacstop_protocol::{Bac, Outcome, TestEvent};

use super::device::DeviceOptions;
use super::{EXIT_BLOCKED, EXIT_ERROR, EXIT_OK};

/// Everything a check did.
#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub config: PolicyConfig,
    pub outcome: Outcome,
    pub decision: Decision,
    pub action: ActionResult,
}

impl CheckReport {
    pub fn exit_code(&self) -> i32 {
        match self.decision {
            decision if !decision.rejects() => EXIT_OK,
            Decision::Destroy if !self.action.succeeded => EXIT_ERROR,
            _ => EXIT_BLOCKED,
        }
    }
}

/// `.bacstop` plus environment, then command-line overrides.
pub fn load_config(
    repo: &Path,
    threshold: Option<Bac>,
    hook: Option<HookKind>,
) -> Result<PolicyConfig> {
    let mut config = PolicyConfig::resolve(repo)
        .with_context(|| format!("loading BACstop config for {}", repo.display()))?;
    if let Some(threshold) = threshold {
        config.threshold = threshold;
    }
    if let Some(hook) = hook {
        config.hook = hook;
    }
    Ok(config)
}

/// Run the test and act on it.
pub async fn evaluate(
    repo: &Path,
    config: PolicyConfig,
    device: &DeviceOptions,
    on_event: impl FnMut(&TestEvent),
) -> Result<CheckReport> {
    let outcome = device.breath_test(on_event).await?;
    let decision = decide(&outcome, &config);
    let action = RepositoryActuator::new(repo).apply(decision, &config);
    Ok(CheckReport {
        config,
        outcome,
        decision,
        action,
    })
}

pub async fn run(
    repo: &Path,
    threshold: Option<Bac>,
    hook: Option<HookKind>,
    quiet: bool,
    json: bool,
    device: &DeviceOptions,
) -> Result<i32> {
    let config = load_config(repo, threshold, hook)?;
    let chatty = !quiet && !json;

    if chatty {
        println!("Checking BAC (threshold: {}, spice: {})...", config.threshold, config.spice);
    }
    let report = evaluate(repo, config, device, |event| {
        if chatty {
            println!("  {event}");
        }
    })
    .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !quiet {
        print_summary(&report);
    }
    Ok(report.exit_code())
}

fn print_summary(report: &CheckReport) {
    println!();
    match report.outcome {
        Outcome::Completed { bac } => println!("BAC: {bac}"),
        Outcome::Failed { reason } => println!("Test failed: {reason}"),
    }
    let verdict = match (report.decision, report.outcome) {
        (Decision::Allow, Outcome::Completed { bac }) if bac >= report.config.threshold => {
            "Above threshold - ALLOWED".to_string()
        }
        (Decision::Allow, _) => "Below threshold - allowed (verde)".to_string(),
        (Decision::Block, Outcome::Failed { .. }) => "No measurement - BLOCKED".to_string(),
        (Decision::Block, _) => "Below threshold - BLOCKED".to_string(),
        (Decision::Destroy, _) if report.action.succeeded => {
            format!("Below threshold - DESTROYED ({})", report.action.detail)
        }
        (Decision::Destroy, _) => {
            format!("Below threshold - DESTROY FAILED: {}", report.action.detail)
        }
    };
    println!("{verdict}");
}

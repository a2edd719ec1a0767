//! The decision table.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use bacstop_protocol::Outcome;

use crate::config::{PolicyConfig, Spice};

/// What the hook should do with the pending git operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Let the operation proceed.
    Allow,
    /// Reject the operation.
    Block,
    /// Reject the operation and discard the pending change set.
    Destroy,
}

impl Decision {
    /// Whether the git operation must not proceed.
    pub fn rejects(&self) -> bool {
        !matches!(self, Decision::Allow)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Decision::Allow => "allow",
            Decision::Block => "block",
            Decision::Destroy => "destroy",
        })
    }
}

/// Map a test outcome to a decision.
///
/// A failed test always blocks, whatever the spice: no measurement is not a
/// passing measurement, and nothing is destroyed without one. A completed
/// test passes when its BAC is at or above the threshold.
pub fn decide(outcome: &Outcome, config: &PolicyConfig) -> Decision {
    let decision = match outcome {
        Outcome::Failed { .. } => Decision::Block,
        Outcome::Completed { bac } if *bac >= config.threshold => Decision::Allow,
        Outcome::Completed { .. } => match config.spice {
            Spice::Verde => Decision::Allow,
            Spice::Hot => Decision::Block,
            Spice::Diablo => Decision::Destroy,
        },
    };
    debug!(
        %outcome,
        threshold = %config.threshold,
        spice = %config.spice,
        %decision,
        "policy decision"
    );
    decision
}

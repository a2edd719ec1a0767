//! Breath-test state machine.
//!
//! Sequences decoded events into test phases and produces exactly one
//! terminal [`Outcome`] per attempt. The machine never rejects input: anything
//! arriving after the terminal state is discarded and logged, and every
//! failure path (device cancel, blow error, malformed frame, inactivity,
//! lost link) lands in a terminal state.
//!
//! ```text
//! Idle → Countdown → AwaitBlow → Blowing → Analyzing → Finalizing → WrappingUp
//!                                                                        │
//!                         Complete | Cancelled | Errored  ◄──────────────┘
//! ```

use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use crate::bac::Bac;
use crate::event::TestEvent;
use crate::frame::DecodeError;

/// Phases of a breath test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Phase {
    Idle,
    Countdown,
    AwaitBlow,
    Blowing,
    Analyzing,
    Finalizing,
    WrappingUp,
    Complete,
    Cancelled,
    Errored,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Complete | Phase::Cancelled | Phase::Errored)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Countdown => "countdown",
            Phase::AwaitBlow => "await-blow",
            Phase::Blowing => "blowing",
            Phase::Analyzing => "analyzing",
            Phase::Finalizing => "finalizing",
            Phase::WrappingUp => "wrapping-up",
            Phase::Complete => "complete",
            Phase::Cancelled => "cancelled",
            Phase::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// Why a test attempt produced no measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The device reported the test as cancelled.
    Cancelled,
    /// The device reported insufficient breath.
    BlowError,
    /// No notification arrived within the inactivity window.
    Timeout,
    /// The link could not be established or dropped mid-test.
    ConnectionLost,
    /// A notification could not be decoded.
    MalformedFrame,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FailureReason::Cancelled => "test cancelled by device",
            FailureReason::BlowError => "blow error (insufficient breath)",
            FailureReason::Timeout => "timed out waiting for device",
            FailureReason::ConnectionLost => "connection to device lost",
            FailureReason::MalformedFrame => "malformed frame from device",
        };
        f.write_str(text)
    }
}

/// Terminal result of one test attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Completed { bac: Bac },
    Failed { reason: FailureReason },
}

impl Outcome {
    pub fn failed(reason: FailureReason) -> Self {
        Outcome::Failed { reason }
    }

    /// The measured value, if the test completed.
    pub fn bac(&self) -> Option<Bac> {
        match self {
            Outcome::Completed { bac } => Some(*bac),
            Outcome::Failed { .. } => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Completed { bac } => write!(f, "BAC {bac}"),
            Outcome::Failed { reason } => write!(f, "test failed: {reason}"),
        }
    }
}

/// Anything the session can feed into the machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Event(TestEvent),
    Malformed(DecodeError),
    InactivityTimeout,
    LinkLost,
}

impl From<TestEvent> for Input {
    fn from(event: TestEvent) -> Self {
        Input::Event(event)
    }
}

impl From<Result<TestEvent, DecodeError>> for Input {
    fn from(decoded: Result<TestEvent, DecodeError>) -> Self {
        match decoded {
            Ok(event) => Input::Event(event),
            Err(err) => Input::Malformed(err),
        }
    }
}

/// Effect of feeding one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Still running; `from` may equal `to` for repeated counters.
    Advanced { from: Phase, to: Phase },
    /// This input ended the attempt.
    Finished(Outcome),
    /// The attempt had already ended; input ignored.
    Discarded,
}

/// State machine for a single breath-test attempt.
#[derive(Debug, Clone)]
pub struct TestStateMachine {
    phase: Phase,
    outcome: Option<Outcome>,
    inputs: usize,
}

impl Default for TestStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl TestStateMachine {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            outcome: None,
            inputs: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The terminal outcome, once reached.
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Number of inputs fed so far, discarded ones included.
    pub fn inputs_seen(&self) -> usize {
        self.inputs
    }

    /// Feed one input and report what it did.
    pub fn feed(&mut self, input: impl Into<Input>) -> Step {
        let input = input.into();
        self.inputs += 1;

        if self.phase.is_terminal() {
            warn!(phase = %self.phase, ?input, "discarding input after test ended");
            return Step::Discarded;
        }

        match input {
            Input::Event(TestEvent::Result(bac)) => {
                self.finish(Phase::Complete, Outcome::Completed { bac })
            }
            Input::Event(TestEvent::Cancelled) => {
                self.finish(Phase::Cancelled, Outcome::failed(FailureReason::Cancelled))
            }
            Input::Event(TestEvent::BlowError) => {
                self.finish(Phase::Errored, Outcome::failed(FailureReason::BlowError))
            }
            Input::Malformed(err) => {
                warn!(error = %err, "malformed frame ends the test");
                self.finish(Phase::Errored, Outcome::failed(FailureReason::MalformedFrame))
            }
            Input::InactivityTimeout => {
                warn!(phase = %self.phase, "no notification within inactivity window");
                self.finish(Phase::Errored, Outcome::failed(FailureReason::Timeout))
            }
            Input::LinkLost => {
                warn!(phase = %self.phase, "link lost during test");
                self.finish(Phase::Errored, Outcome::failed(FailureReason::ConnectionLost))
            }
            Input::Event(event @ TestEvent::Countdown(_)) => {
                self.advance(event, Phase::Countdown, &[Phase::Idle, Phase::Countdown])
            }
            Input::Event(event @ TestEvent::StartBlow) => {
                self.advance(event, Phase::AwaitBlow, &[Phase::Idle, Phase::Countdown])
            }
            Input::Event(event @ TestEvent::KeepBlowing(_)) => {
                self.advance(event, Phase::Blowing, &[Phase::AwaitBlow, Phase::Blowing])
            }
            Input::Event(event @ TestEvent::Analyzing) => {
                self.advance(event, Phase::Analyzing, &[])
            }
            Input::Event(event @ TestEvent::Finalizing) => {
                self.advance(event, Phase::Finalizing, &[])
            }
            Input::Event(event @ TestEvent::WrappingUp) => {
                self.advance(event, Phase::WrappingUp, &[])
            }
        }
    }

    /// Move to `to`. An empty `expected_from` accepts any running phase.
    fn advance(&mut self, event: TestEvent, to: Phase, expected_from: &[Phase]) -> Step {
        let from = self.phase;
        if !expected_from.is_empty() && !expected_from.contains(&from) {
            debug!(%from, %to, ?event, "out-of-order event, following device");
        } else {
            debug!(%from, %to, ?event, "phase transition");
        }
        self.phase = to;
        Step::Advanced { from, to }
    }

    fn finish(&mut self, phase: Phase, outcome: Outcome) -> Step {
        debug!(from = %self.phase, to = %phase, %outcome, "test finished");
        self.phase = phase;
        self.outcome = Some(outcome);
        Step::Finished(outcome)
    }
}

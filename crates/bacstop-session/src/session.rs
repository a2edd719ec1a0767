//! Device session: drives one breath test over a [`Transport`].
//!
//! An attempt runs as a single task: connect, subscribe, write the start
//! command, then await notifications, decode each one, and feed it to the
//! state machine until it reaches a terminal state. Subscribing always
//! happens before the start command is written so the first notifications
//! cannot be missed.
//!
//! Every failure on the way (no device, handshake error, dropped link,
//! malformed frame, silence past the inactivity window) ends as an
//! [`Outcome`], never as an error. Each handshake step (connect, subscribe,
//! start command) and the final disconnect is bounded by
//! [`SessionParams::connect_timeout`], so a transport call that never returns
//! still ends the attempt.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use bacstop_protocol::{decode, FailureReason, Input, Outcome, Step, TestEvent, TestStateMachine};

use crate::error::{Result as TransportResult, SessionError, TransportError};
use crate::transport::{Transport, START_TEST_COMMAND};

/// Default window without any notification before the attempt times out.
pub const DEFAULT_INACTIVITY_WINDOW: Duration = Duration::from_secs(30);

/// Parameters for a session.
#[derive(Debug, Clone)]
pub struct SessionParams {
    /// Connect to this address instead of scanning by name.
    pub device_address: Option<String>,
    /// How long a scan listens for advertisements.
    pub scan_window: Duration,
    /// Budget for finding the device and establishing the link. Subscribing,
    /// writing the start command and disconnecting each get the same budget.
    pub connect_timeout: Duration,
    /// Longest silence tolerated between notifications.
    pub inactivity_window: Duration,
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            device_address: None,
            scan_window: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(20),
            inactivity_window: DEFAULT_INACTIVITY_WINDOW,
        }
    }
}

/// A session bound to one device transport.
///
/// At most one attempt runs at a time; [`DeviceSession::start`] rejects a
/// second one instead of queueing it.
pub struct DeviceSession<T: Transport> {
    transport: Arc<Mutex<T>>,
    params: SessionParams,
    active: Arc<AtomicBool>,
}

impl<T: Transport> DeviceSession<T> {
    pub fn new(transport: T, params: SessionParams) -> Self {
        Self {
            transport: Arc::new(Mutex::new(transport)),
            params,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether an attempt is currently running.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Start a breath test on a new task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<Attempt, SessionError> {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SessionError::AttemptInProgress);
        }

        let guard = ActiveGuard(Arc::clone(&self.active));
        let transport = Arc::clone(&self.transport);
        let params = self.params.clone();
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = oneshot::channel();

        tokio::spawn(async move {
            let mut transport = transport.lock().await;
            let outcome = drive(&mut *transport, &params, Some(&progress_tx)).await;
            release(&mut *transport, params.connect_timeout).await;
            drop(transport);
            drop(progress_tx);
            drop(guard);
            if outcome_tx.send(outcome).is_err() {
                debug!(%outcome, "attempt handle dropped before outcome");
            }
        });

        Ok(Attempt {
            progress: Some(ProgressStream { rx: progress_rx }),
            outcome: outcome_rx,
        })
    }
}

/// Clears the session's active flag, also when the attempt task panics.
struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Handle to a running attempt.
#[derive(Debug)]
pub struct Attempt {
    progress: Option<ProgressStream>,
    outcome: oneshot::Receiver<Outcome>,
}

impl Attempt {
    /// Take the progress stream. Only the first call returns it.
    pub fn progress(&mut self) -> Option<ProgressStream> {
        self.progress.take()
    }

    /// Wait for the terminal outcome.
    pub async fn outcome(self) -> Outcome {
        match self.outcome.await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!("attempt task ended without an outcome");
                Outcome::failed(FailureReason::ConnectionLost)
            }
        }
    }
}

/// Decoded events of one attempt, in arrival order.
///
/// Ends when the attempt reaches its terminal state. Malformed frames are not
/// forwarded; they show up in the outcome instead.
#[derive(Debug)]
pub struct ProgressStream {
    rx: mpsc::UnboundedReceiver<TestEvent>,
}

impl Stream for ProgressStream {
    type Item = TestEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<TestEvent>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

/// Run one attempt to completion on the current task, without progress.
pub async fn run_attempt<T: Transport>(mut transport: T, params: SessionParams) -> Outcome {
    let outcome = drive(&mut transport, &params, None).await;
    release(&mut transport, params.connect_timeout).await;
    outcome
}

async fn drive<T: Transport>(
    transport: &mut T,
    params: &SessionParams,
    progress: Option<&mpsc::UnboundedSender<TestEvent>>,
) -> Outcome {
    let lost = Outcome::failed(FailureReason::ConnectionLost);
    let limit = params.connect_timeout;

    if handshake(limit, "connect", transport.connect()).await.is_none() {
        return lost;
    }
    info!(peer = ?transport.peer(), "connected to device");

    let Some(mut notifications) = handshake(limit, "subscribe", transport.subscribe()).await else {
        return lost;
    };

    let start = transport.write_command(&START_TEST_COMMAND);
    if handshake(limit, "start command", start).await.is_none() {
        return lost;
    }
    info!("breath test started");

    let mut machine = TestStateMachine::new();
    loop {
        let input = match timeout(params.inactivity_window, notifications.next()).await {
            Err(_) => Input::InactivityTimeout,
            Ok(None) => Input::LinkLost,
            Ok(Some(bytes)) => {
                let decoded = decode(&bytes);
                if let (Ok(event), Some(tx)) = (&decoded, progress) {
                    // Receiver may already be gone.
                    let _ = tx.send(*event);
                }
                Input::from(decoded)
            }
        };

        if let Step::Finished(outcome) = machine.feed(input) {
            info!(%outcome, inputs = machine.inputs_seen(), "breath test finished");
            return outcome;
        }
    }
}

/// Await one transport call for at most `limit`. Failures are logged and
/// come back as `None`.
async fn handshake<T>(
    limit: Duration,
    step: &'static str,
    call: impl Future<Output = TransportResult<T>>,
) -> Option<T> {
    let err = match timeout(limit, call).await {
        Ok(Ok(value)) => return Some(value),
        Ok(Err(err)) => err,
        Err(_) => TransportError::TimedOut(limit),
    };
    warn!(step, error = %err, "device handshake failed");
    None
}

async fn release<T: Transport>(transport: &mut T, limit: Duration) {
    handshake(limit, "disconnect", transport.disconnect()).await;
}

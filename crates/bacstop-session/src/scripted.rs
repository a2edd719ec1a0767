//! In-memory transport that replays a scripted notification sequence.
//!
//! Used for development without hardware and throughout the tests. Every
//! call is recorded so call order (subscribe before write) can be checked
//! after the transport has been moved into a session.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use bacstop_protocol::{Bac, Frame, TestEvent};

use crate::error::{Result, TransportError};
use crate::transport::{Notifications, Transport};

/// A recorded transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect,
    Subscribe,
    Write(Vec<u8>),
    Disconnect,
}

/// Shared view of the calls a [`ScriptedTransport`] received.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    fn push(&self, call: Call) {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(call);
    }

    /// Snapshot of the calls so far.
    pub fn calls(&self) -> Vec<Call> {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// What the notification stream does once the script is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AfterScript {
    /// Stay silent forever, as a device that stopped talking.
    Hang,
    /// End the stream, as a dropped link.
    Close,
}

/// A transport that plays back a fixed list of notifications.
#[derive(Debug)]
pub struct ScriptedTransport {
    script: Vec<(Duration, Vec<u8>)>,
    after: AfterScript,
    fail_connect: bool,
    stall_write: bool,
    connected: bool,
    peer: String,
    log: CallLog,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            script: Vec::new(),
            after: AfterScript::Hang,
            fail_connect: false,
            stall_write: false,
            connected: false,
            peer: "00:00:00:00:00:00".to_string(),
            log: CallLog::default(),
        }
    }

    /// A complete breath test ending in `bac`, one notification per `pace`:
    /// a five second countdown, the blow prompt, five seconds of blowing,
    /// analysis, and the result.
    pub fn simulated(bac: Bac, pace: Duration) -> Self {
        let mut events: Vec<TestEvent> = (1..=5).rev().map(TestEvent::Countdown).collect();
        events.push(TestEvent::StartBlow);
        events.extend((1..=5).rev().map(TestEvent::KeepBlowing));
        events.extend([TestEvent::Analyzing, TestEvent::Finalizing, TestEvent::Result(bac)]);
        events
            .into_iter()
            .fold(Self::new().with_peer("simulated"), |t, e| t.event_after(pace, e))
    }

    /// Queue raw notification bytes, delivered immediately.
    pub fn frame(self, bytes: impl Into<Vec<u8>>) -> Self {
        self.frame_after(Duration::ZERO, bytes)
    }

    /// Queue raw notification bytes, delivered `delay` after the previous one.
    pub fn frame_after(mut self, delay: Duration, bytes: impl Into<Vec<u8>>) -> Self {
        self.script.push((delay, bytes.into()));
        self
    }

    /// Queue the wire encoding of an event.
    pub fn event(self, event: TestEvent) -> Self {
        self.event_after(Duration::ZERO, event)
    }

    /// Queue the wire encoding of an event after a delay.
    pub fn event_after(self, delay: Duration, event: TestEvent) -> Self {
        self.frame_after(delay, Frame::encode(event).as_bytes().to_vec())
    }

    /// Queue a sequence of events with no delay.
    pub fn events(self, events: impl IntoIterator<Item = TestEvent>) -> Self {
        events.into_iter().fold(self, |t, e| t.event(e))
    }

    /// End the notification stream after the script instead of going silent.
    pub fn then_close(mut self) -> Self {
        self.after = AfterScript::Close;
        self
    }

    /// Make `connect` fail.
    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// Make `write_command` never complete, as a write-with-response the
    /// device never acknowledges.
    pub fn stalling_write(mut self) -> Self {
        self.stall_write = true;
        self
    }

    pub fn with_peer(mut self, peer: impl Into<String>) -> Self {
        self.peer = peer.into();
        self
    }

    /// Handle to the call log, valid after the transport is moved.
    pub fn call_log(&self) -> CallLog {
        self.log.clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn connect(&mut self) -> Result<()> {
        self.log.push(Call::Connect);
        if self.fail_connect {
            return Err(TransportError::DeviceNotFound);
        }
        self.connected = true;
        Ok(())
    }

    async fn subscribe(&mut self) -> Result<Notifications> {
        self.log.push(Call::Subscribe);
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        let script = std::mem::take(&mut self.script);
        let played = stream::iter(script).then(|(delay, bytes)| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            bytes
        });
        let notifications: Notifications = match self.after {
            AfterScript::Hang => Box::pin(played.chain(stream::pending())),
            AfterScript::Close => Box::pin(played),
        };
        Ok(notifications)
    }

    async fn write_command(&mut self, payload: &[u8]) -> Result<()> {
        self.log.push(Call::Write(payload.to_vec()));
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        if self.stall_write {
            futures::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.log.push(Call::Disconnect);
        self.connected = false;
        Ok(())
    }

    fn peer(&self) -> Option<String> {
        self.connected.then(|| self.peer.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_script_in_order() {
        let mut t = ScriptedTransport::new()
            .events([TestEvent::Countdown(1), TestEvent::StartBlow])
            .then_close();
        t.connect().await.unwrap();
        let frames: Vec<Vec<u8>> = t.subscribe().await.unwrap().collect().await;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], vec![0x80, 0x01, 0x01, 0x00, 0x15, 0xE7]);
        assert_eq!(frames[1], vec![0x80, 0x02, 0x00, 0x00, 0x15, 0xE7]);
    }

    #[tokio::test(start_paused = true)]
    async fn simulated_test_is_paced() {
        let mut t =
            ScriptedTransport::simulated(Bac::from_raw(208), Duration::from_secs(1)).then_close();
        t.connect().await.unwrap();
        assert_eq!(t.peer().as_deref(), Some("simulated"));

        let start = tokio::time::Instant::now();
        let frames: Vec<Vec<u8>> = t.subscribe().await.unwrap().collect().await;
        assert_eq!(frames.len(), 14);
        assert!(start.elapsed() >= Duration::from_secs(14));
        assert_eq!(
            bacstop_protocol::decode(&frames[13]).unwrap(),
            TestEvent::Result(Bac::from_raw(208))
        );
    }

    #[tokio::test]
    async fn subscribe_requires_connection() {
        let mut t = ScriptedTransport::new();
        assert!(matches!(
            t.subscribe().await,
            Err(TransportError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn peer_only_while_connected() {
        let mut t = ScriptedTransport::new().with_peer("AA:BB:CC:DD:EE:FF");
        assert_eq!(t.peer(), None);
        t.connect().await.unwrap();
        assert_eq!(t.peer().as_deref(), Some("AA:BB:CC:DD:EE:FF"));
        t.disconnect().await.unwrap();
        assert_eq!(t.peer(), None);
        assert_eq!(
            t.call_log().calls(),
            vec![Call::Connect, Call::Disconnect]
        );
    }
}

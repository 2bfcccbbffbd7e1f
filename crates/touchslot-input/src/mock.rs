//! Mock backends for testing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;
use touchslot_types::{EventBatch, PassthroughEvent, TouchFrame, TouchOp};

use crate::error::InputError;
use crate::{InputCapture, InputEmulation, TouchSink};

// ---------------------------------------------------------------------------
// MockCapture
// ---------------------------------------------------------------------------

/// Mock input capture.
///
/// Returns a sender that tests use to inject batches. `start()` spawns a
/// task that forwards them to the daemon's capture channel.
pub struct MockCapture {
    feed_rx: Option<mpsc::Receiver<EventBatch>>,
    shutdown: Arc<AtomicBool>,
}

impl MockCapture {
    pub fn new() -> (Self, mpsc::Sender<EventBatch>) {
        let (feed_tx, feed_rx) = mpsc::channel(1024);
        let capture = Self {
            feed_rx: Some(feed_rx),
            shutdown: Arc::new(AtomicBool::new(false)),
        };
        (capture, feed_tx)
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InputCapture for MockCapture {
    async fn start(&mut self, tx: mpsc::Sender<EventBatch>) -> Result<(), InputError> {
        let mut feed_rx = self
            .feed_rx
            .take()
            .ok_or_else(|| InputError::Other(anyhow::anyhow!("MockCapture already started")))?;
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            while let Some(batch) = feed_rx.recv().await {
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                if tx.send(batch).await.is_err() {
                    break;
                }
            }
        });
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), InputError> {
        self.shutdown.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockSink
// ---------------------------------------------------------------------------

/// A touch frame as the mock sink saw it.
#[derive(Debug, Clone, Copy)]
pub struct RecordedFrame {
    pub at: Instant,
    pub frame: TouchFrame,
}

#[derive(Debug, Default)]
struct MockSinkState {
    frames: Vec<RecordedFrame>,
    fail_writes: bool,
    shutdown: bool,
}

/// Touch sink that records every frame with the (virtual) time it arrived.
pub struct MockSink {
    state: Arc<Mutex<MockSinkState>>,
}

impl Default for MockSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSink {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockSinkState::default())),
        }
    }

    pub fn handle(&self) -> MockSinkHandle {
        MockSinkHandle {
            state: Arc::clone(&self.state),
        }
    }
}

/// Clonable observer handle for [`MockSink`].
#[derive(Clone)]
pub struct MockSinkHandle {
    state: Arc<Mutex<MockSinkState>>,
}

impl MockSinkHandle {
    pub fn frames(&self) -> Vec<RecordedFrame> {
        self.state.lock().unwrap().frames.clone()
    }

    /// Just the ops, in arrival order.
    pub fn ops(&self) -> Vec<TouchOp> {
        self.state
            .lock()
            .unwrap()
            .frames
            .iter()
            .map(|r| r.frame.op)
            .collect()
    }

    pub fn clear(&self) {
        self.state.lock().unwrap().frames.clear();
    }

    /// Make every subsequent write fail.
    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }

    pub fn is_shutdown(&self) -> bool {
        self.state.lock().unwrap().shutdown
    }
}

#[async_trait]
impl TouchSink for MockSink {
    async fn apply(&mut self, frame: &TouchFrame) -> Result<(), InputError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(InputError::Write("mock write failure".to_string()));
        }
        state.frames.push(RecordedFrame {
            at: Instant::now(),
            frame: *frame,
        });
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), InputError> {
        self.state.lock().unwrap().shutdown = true;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockEmulation
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MockEmulationState {
    emitted: Vec<PassthroughEvent>,
    shutdown: bool,
}

/// Mock passthrough emulation.
pub struct MockEmulation {
    state: Arc<Mutex<MockEmulationState>>,
}

impl Default for MockEmulation {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEmulation {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockEmulationState::default())),
        }
    }

    pub fn handle(&self) -> MockEmulationHandle {
        MockEmulationHandle {
            state: Arc::clone(&self.state),
        }
    }
}

/// Clonable observer handle for [`MockEmulation`].
#[derive(Clone)]
pub struct MockEmulationHandle {
    state: Arc<Mutex<MockEmulationState>>,
}

impl MockEmulationHandle {
    pub fn emitted(&self) -> Vec<PassthroughEvent> {
        self.state.lock().unwrap().emitted.clone()
    }

    pub fn is_shutdown(&self) -> bool {
        self.state.lock().unwrap().shutdown
    }
}

#[async_trait]
impl InputEmulation for MockEmulation {
    async fn emit(&mut self, event: PassthroughEvent) -> Result<(), InputError> {
        self.state.lock().unwrap().emitted.push(event);
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), InputError> {
        self.state.lock().unwrap().shutdown = true;
        Ok(())
    }
}

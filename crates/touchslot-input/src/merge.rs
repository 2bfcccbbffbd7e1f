//! Fan-in of several captures into one channel.

use async_trait::async_trait;
use tokio::sync::mpsc;
use touchslot_types::EventBatch;
use tracing::warn;

use crate::error::InputError;
use crate::InputCapture;

/// Runs every inner capture against the same batch channel.
#[derive(Default)]
pub struct MergedCapture {
    captures: Vec<Box<dyn InputCapture>>,
}

impl MergedCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, capture: Box<dyn InputCapture>) {
        self.captures.push(capture);
    }

    pub fn len(&self) -> usize {
        self.captures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captures.is_empty()
    }
}

#[async_trait]
impl InputCapture for MergedCapture {
    async fn start(&mut self, tx: mpsc::Sender<EventBatch>) -> Result<(), InputError> {
        for capture in &mut self.captures {
            capture.start(tx.clone()).await?;
        }
        Ok(())
    }

    /// Every inner capture is shut down even if an earlier one fails; the
    /// first error is returned.
    async fn shutdown(&mut self) -> Result<(), InputError> {
        let mut first = None;
        for capture in &mut self.captures {
            if let Err(e) = capture.shutdown().await {
                warn!(error = %e, "capture shutdown failed");
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }
}

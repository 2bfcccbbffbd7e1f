//! Accessibility-bridge output.
//!
//! A helper process running inside the Android framework connects to an
//! abstract unix socket and injects the touches it reads through the
//! system input manager. Each op is one fixed [`bridge_record`].

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use touchslot_types::{OrientationCell, TouchFrame};
use tracing::debug;

use crate::error::InputError;
use crate::frame::bridge_record;
use crate::TouchSink;

/// Abstract socket name the helper connects to.
pub const BRIDGE_SOCKET_NAME: &str = "uds_input_manager";

pub struct BridgeSink<W> {
    stream: W,
    orientation: OrientationCell,
}

impl<W: AsyncWrite + Unpin + Send + 'static> BridgeSink<W> {
    pub fn new(stream: W, orientation: OrientationCell) -> Self {
        Self {
            stream,
            orientation,
        }
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
impl BridgeSink<tokio::net::UnixStream> {
    /// Bind the abstract socket `name` and wait for the helper to connect.
    pub async fn listen_abstract(
        name: &str,
        orientation: OrientationCell,
    ) -> Result<Self, InputError> {
        #[cfg(target_os = "android")]
        use std::os::android::net::SocketAddrExt;
        #[cfg(target_os = "linux")]
        use std::os::linux::net::SocketAddrExt;

        let addr = std::os::unix::net::SocketAddr::from_abstract_name(name.as_bytes())
            .map_err(|e| InputError::Socket(e.to_string()))?;
        let std_listener = std::os::unix::net::UnixListener::bind_addr(&addr)
            .map_err(|e| InputError::Socket(format!("@{name}: {e}")))?;
        std_listener
            .set_nonblocking(true)
            .map_err(|e| InputError::Socket(e.to_string()))?;
        let listener = tokio::net::UnixListener::from_std(std_listener)
            .map_err(|e| InputError::Socket(e.to_string()))?;

        tracing::info!(socket = %format!("@{name}"), "waiting for bridge helper");
        let (stream, _) = listener
            .accept()
            .await
            .map_err(|e| InputError::Socket(e.to_string()))?;
        tracing::info!("bridge helper connected");
        Ok(Self::new(stream, orientation))
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send + 'static> TouchSink for BridgeSink<W> {
    async fn apply(&mut self, frame: &TouchFrame) -> Result<(), InputError> {
        let Some(record) = bridge_record(frame, self.orientation.get()) else {
            return Ok(());
        };
        self.stream
            .write_all(&record)
            .await
            .map_err(|e| InputError::Write(e.to_string()))?;
        debug!(op = ?frame.op, "wrote bridge record");
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), InputError> {
        self.stream
            .shutdown()
            .await
            .map_err(|e| InputError::Write(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use touchslot_types::{CanonicalPoint, Orientation, ScreenSize, SlotId, TouchOp};

    #[tokio::test]
    async fn records_arrive_on_the_socket() {
        let (client, mut helper) = tokio::io::duplex(64);
        let mut sink = BridgeSink::new(client, OrientationCell::new(Orientation::Natural));
        let screen = ScreenSize::new(1920, 1080);

        sink.apply(&TouchFrame::new(
            TouchOp::Require {
                slot: SlotId(2),
                at: CanonicalPoint::new(0, 0),
            },
            screen,
        ))
        .await
        .unwrap();
        sink.apply(&TouchFrame::new(
            TouchOp::ResetResolution {
                width: 1920,
                height: 1080,
            },
            screen,
        ))
        .await
        .unwrap();
        sink.apply(&TouchFrame::new(TouchOp::Release { slot: SlotId(2) }, screen))
            .await
            .unwrap();
        sink.shutdown().await.unwrap();

        let mut buf = Vec::new();
        helper.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf.len(), 20);
        assert_eq!(&buf[..2], &[0, 2]);
        assert_eq!(&buf[10..12], &[1, 2]);
    }
}

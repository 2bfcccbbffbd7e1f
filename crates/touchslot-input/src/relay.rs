//! UDP relay of raw input batches from another machine.
//!
//! The sender captures its local devices and forwards each SYN-delimited
//! batch as one datagram. The receiver is an ordinary [`InputCapture`], so
//! relayed devices reach the router exactly like local ones.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use touchslot_types::relay::{decode_datagram, encode_datagram, relayed_name};
use touchslot_types::EventBatch;
use tracing::{debug, info, warn};

use crate::error::InputError;
use crate::InputCapture;

const RECV_BUFFER: usize = 1024;

/// Receives relayed batches on a UDP port.
pub struct RelayCapture {
    socket: Option<UdpSocket>,
    local_addr: SocketAddr,
    task: Option<JoinHandle<()>>,
    shutdown_tx: Option<watch::Sender<bool>>,
}

impl RelayCapture {
    pub async fn bind(addr: SocketAddr) -> Result<Self, InputError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| InputError::Socket(format!("{addr}: {e}")))?;
        let local_addr = socket
            .local_addr()
            .map_err(|e| InputError::Socket(e.to_string()))?;
        Ok(Self {
            socket: Some(socket),
            local_addr,
            task: None,
            shutdown_tx: None,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[async_trait]
impl InputCapture for RelayCapture {
    async fn start(&mut self, tx: mpsc::Sender<EventBatch>) -> Result<(), InputError> {
        let socket = self
            .socket
            .take()
            .ok_or_else(|| InputError::Other(anyhow::anyhow!("relay capture already started")))?;
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        self.shutdown_tx = Some(shutdown_tx);

        info!(addr = %self.local_addr, "listening for relayed input");
        self.task = Some(tokio::spawn(async move {
            let mut buf = [0u8; RECV_BUFFER];
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    result = socket.recv_from(&mut buf) => {
                        let (len, peer) = match result {
                            Ok(r) => r,
                            Err(e) => {
                                warn!(error = %e, "relay receive failed");
                                continue;
                            }
                        };
                        match decode_datagram(&buf[..len]) {
                            Ok(batch) => {
                                if tx.send(batch).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => debug!(%peer, error = %e, "dropping malformed relay datagram"),
                        }
                    }
                }
            }
        }));
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), InputError> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        info!("relay capture shut down");
        Ok(())
    }
}

/// Forwards local batches to a remote receiver.
pub struct RelaySender {
    socket: UdpSocket,
    packets: u64,
    bytes: u64,
    window_start: Instant,
}

impl RelaySender {
    pub async fn connect(target: SocketAddr) -> Result<Self, InputError> {
        let bind: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind)
            .await
            .map_err(|e| InputError::Socket(e.to_string()))?;
        socket
            .connect(target)
            .await
            .map_err(|e| InputError::Socket(format!("{target}: {e}")))?;
        info!(%target, "relaying input");
        Ok(Self {
            socket,
            packets: 0,
            bytes: 0,
            window_start: Instant::now(),
        })
    }

    /// Send one batch, renaming keyboards and mice to the shared relay name.
    pub async fn send_batch(&mut self, batch: &EventBatch) -> Result<(), InputError> {
        let renamed = EventBatch::new(
            relayed_name(batch.kind, &batch.device),
            batch.kind,
            batch.events.clone(),
        );
        let datagram = encode_datagram(&renamed).map_err(|e| InputError::Other(e.into()))?;
        let sent = self
            .socket
            .send(&datagram)
            .await
            .map_err(|e| InputError::Socket(e.to_string()))?;

        self.packets += 1;
        self.bytes += sent as u64;
        let elapsed = self.window_start.elapsed();
        if elapsed >= Duration::from_secs(1) {
            debug!(
                packets_per_sec = self.packets,
                bytes_per_sec = self.bytes,
                "relay send rate"
            );
            self.packets = 0;
            self.bytes = 0;
            self.window_start = Instant::now();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use touchslot_types::relay::RELAYED_KEYBOARD_MOUSE;
    use touchslot_types::{codes, DeviceKind, RawEvent};

    #[tokio::test]
    async fn batches_cross_the_socket_renamed() {
        let mut capture = RelayCapture::bind(([127, 0, 0, 1], 0).into())
            .await
            .unwrap();
        let (tx, mut rx) = mpsc::channel(8);
        let target = capture.local_addr();
        capture.start(tx).await.unwrap();

        let mut sender = RelaySender::connect(target).await.unwrap();
        let batch = EventBatch::new(
            "Logitech USB Receiver",
            DeviceKind::Mouse,
            vec![RawEvent::rel(codes::REL_X, 5), RawEvent::rel(codes::REL_Y, -3)],
        );
        sender.send_batch(&batch).await.unwrap();

        let got = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.device, RELAYED_KEYBOARD_MOUSE);
        assert_eq!(got.kind, DeviceKind::Mouse);
        assert_eq!(got.events, batch.events);

        capture.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn second_start_is_rejected() {
        let mut capture = RelayCapture::bind(([127, 0, 0, 1], 0).into())
            .await
            .unwrap();
        let (tx, _rx) = mpsc::channel(1);
        capture.start(tx.clone()).await.unwrap();
        assert!(capture.start(tx).await.is_err());
        capture.shutdown().await.unwrap();
    }
}

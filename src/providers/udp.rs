//! UDP provider for the live downlink

use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{info, trace};

use crate::provider::Provider;
use crate::types::RawDatagram;
use crate::{Result, TelemetryError};

/// Receives one datagram per call from a bound UDP socket.
///
/// Datagrams longer than the receive buffer are truncated by the socket.
pub struct UdpProvider {
    socket: UdpSocket,
    buffer: Vec<u8>,
    sequence: u64,
}

impl UdpProvider {
    /// Bind a socket at `addr` with a `recv_buffer`-byte receive buffer.
    pub async fn bind(addr: SocketAddr, recv_buffer: usize) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await.map_err(|e| {
            TelemetryError::transport_failed_with_source(
                format!("failed to bind UDP socket at {addr}"),
                Box::new(e),
            )
        })?;
        Self::from_socket(socket, recv_buffer)
    }

    /// Use an already bound socket.
    pub fn from_socket(socket: UdpSocket, recv_buffer: usize) -> Result<Self> {
        if recv_buffer == 0 {
            return Err(TelemetryError::config_error("recv_buffer", "must be greater than zero"));
        }
        let local = socket.local_addr()?;
        info!(%local, recv_buffer, "Listening for telemetry datagrams");
        Ok(Self { socket, buffer: vec![0u8; recv_buffer], sequence: 0 })
    }

    /// Address the socket is actually bound to (useful after binding port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

#[async_trait::async_trait]
impl Provider for UdpProvider {
    async fn next_datagram(&mut self) -> Result<Option<RawDatagram>> {
        let (len, source) = self.socket.recv_from(&mut self.buffer).await?;
        let sequence = self.sequence;
        self.sequence += 1;

        trace!(sequence, len, %source, "Received datagram");
        Ok(Some(RawDatagram::new(&self.buffer[..len], sequence, Some(source))))
    }

    fn describe(&self) -> String {
        match self.socket.local_addr() {
            Ok(addr) => format!("udp://{addr}"),
            Err(_) => "udp://<unbound>".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn loopback() -> (UdpProvider, UdpSocket) {
        let provider = UdpProvider::bind("127.0.0.1:0".parse().unwrap(), 64).await.unwrap();
        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.connect(provider.local_addr().unwrap()).await.unwrap();
        (provider, sender)
    }

    #[tokio::test]
    async fn receives_datagrams_in_sequence() {
        let (mut provider, sender) = loopback().await;
        sender.send(b"one").await.unwrap();
        sender.send(b"two").await.unwrap();

        let first = provider.next_datagram().await.unwrap().unwrap();
        let second = provider.next_datagram().await.unwrap().unwrap();

        assert_eq!(first.bytes(), b"one");
        assert_eq!(first.sequence, 0);
        assert_eq!(second.bytes(), b"two");
        assert_eq!(second.sequence, 1);
        assert_eq!(first.source, Some(sender.local_addr().unwrap()));
        assert!(provider.describe().starts_with("udp://127.0.0.1:"));
    }

    #[tokio::test]
    async fn zero_buffer_is_rejected() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let err = UdpProvider::from_socket(socket, 0).err().unwrap();
        assert!(matches!(err, TelemetryError::Config { .. }));
    }

    #[tokio::test]
    async fn bind_conflict_is_a_transport_error() {
        let (provider, _sender) = loopback().await;
        let taken = provider.local_addr().unwrap();
        let err = UdpProvider::bind(taken, 64).await.err().unwrap();
        assert!(matches!(err, TelemetryError::Transport { .. }));
        assert!(err.is_retryable());
    }
}

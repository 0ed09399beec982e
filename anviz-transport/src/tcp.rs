//! TCP transport

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use anviz_core::DeviceId;

use crate::{connection::Connection, error::*};

/// TCP connector for Anviz devices
pub struct TcpTransport {
    addr: String,
    port: u16,
    connect_timeout: Duration,
}

impl TcpTransport {
    /// Create new TCP transport
    pub fn new(addr: impl Into<String>, port: u16) -> Self {
        Self {
            addr: addr.into(),
            port,
            connect_timeout: Duration::from_secs(anviz_core::constants::DEFAULT_TIMEOUT),
        }
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Resolve address to SocketAddr
    async fn resolve_addr(&self) -> Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.addr, self.port);

        let mut addrs = tokio::net::lookup_host(&addr_str)
            .await
            .map_err(|e| Error::InvalidAddress(format!("{}: {}", addr_str, e)))?;

        addrs
            .next()
            .ok_or_else(|| Error::InvalidAddress(format!("No addresses found for {}", addr_str)))
    }

    /// Connect and hand the stream to a new [`Connection`]
    pub async fn open(&self, device_id: DeviceId) -> Result<Connection> {
        let addr = self.resolve_addr().await?;

        debug!("Connecting to {}...", addr);

        let stream = timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::ConnectionTimeout)?
            .map_err(Error::Io)?;

        // Requests are small and latency bound
        stream.set_nodelay(true)?;

        Ok(Connection::open(stream, device_id, addr.to_string()))
    }

    pub fn remote_addr(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Transport;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn device() -> DeviceId {
        DeviceId::new(1).unwrap()
    }

    #[tokio::test]
    async fn test_tcp_transport_invalid_address() {
        let transport = TcpTransport::new("invalid..address", 5010)
            .with_connect_timeout(Duration::from_millis(100));

        let result = transport.open(device()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_tcp_open_and_send() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let transport = TcpTransport::new("127.0.0.1", port);
        let (connection, accepted) = tokio::join!(transport.open(device()), listener.accept());
        let connection = connection.unwrap();
        let (mut peer, _) = accepted.unwrap();

        assert!(connection.is_connected());
        assert_eq!(connection.remote_addr(), format!("127.0.0.1:{}", port));

        connection.send(&[0xA5, 0x00]).await.unwrap();
        let mut buf = [0u8; 2];
        peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0xA5, 0x00]);

        connection.disconnect().await.unwrap();
        assert!(!connection.is_connected());
    }

    #[tokio::test]
    async fn test_tcp_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let transport = TcpTransport::new("127.0.0.1", port);
        assert!(transport.open(device()).await.is_err());
    }
}

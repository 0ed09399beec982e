//! Transport layer for the Anviz protocol
//!
//! Owns the byte stream to one device, slices it into frames and publishes
//! every decoded frame to the subscribers of the connection.

pub mod connection;
pub mod error;
pub mod tcp;

pub use connection::{Connection, ConnectionEvent, Subscriber};
pub use error::{Error, Result};
pub use tcp::TcpTransport;

use async_trait::async_trait;

/// Outbound side of a device link
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send raw bytes
    async fn send(&self, data: &[u8]) -> Result<()>;

    /// Disconnect from device
    async fn disconnect(&self) -> Result<()>;

    /// Check if connected
    fn is_connected(&self) -> bool;

    /// Get remote address
    fn remote_addr(&self) -> String;
}

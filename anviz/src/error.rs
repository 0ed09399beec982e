//! High-level error types

use anviz_core::{Command, Frame, Status};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(#[from] anviz_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] anviz_transport::Error),

    #[error("Type error: {0}")]
    Types(#[from] anviz_types::Error),

    #[error("Device not connected")]
    NotConnected,

    /// Another operation already waits on this command code
    #[error("{0} already has an operation in flight")]
    BusyCommand(Command),

    /// Device answered with a non-success status
    #[error("Device answered {command} with {status}", command = .frame.command)]
    DeviceStatus { status: Status, frame: Box<Frame> },

    /// A window stayed unanswered past its deadline
    #[error("{command} window {window} timed out after {attempts} attempt(s)")]
    TransferTimeout {
        command: Command,
        window: usize,
        attempts: u32,
    },

    #[error("Invalid response from device: {0}")]
    InvalidResponse(String),

    #[error("Invalid finger slot: {0}")]
    InvalidFingerSlot(u8),
}

impl Error {
    /// Check if the same call may succeed when simply retried
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::BusyCommand(_)
                | Self::TransferTimeout { .. }
                | Self::DeviceStatus {
                    status: Status::TimeOut,
                    ..
                }
        )
    }

    /// Check if the connection is gone and must be re-established
    pub fn requires_reconnect(&self) -> bool {
        match self {
            Self::NotConnected => true,
            Self::Transport(e) => e.is_fatal(),
            _ => false,
        }
    }

    /// Device status carried by the error, if any
    pub fn status(&self) -> Option<Status> {
        match self {
            Self::DeviceStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

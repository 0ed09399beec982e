//! Request correlator
//!
//! Responses carry no request id. They are matched to requests by command
//! code alone: a caller first leases the command code, then registers one
//! waiter per request it sends. Each incoming frame goes to the oldest
//! waiter registered for its command.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use anviz_core::{Command, Frame};
use anviz_transport::{ConnectionEvent, Subscriber};

use crate::error::{Error, Result};

struct Waiter {
    id: u64,
    tx: oneshot::Sender<Frame>,
}

#[derive(Default)]
struct Registry {
    closed: bool,
    next_id: u64,
    leased: HashSet<Command>,
    waiters: HashMap<Command, VecDeque<Waiter>>,
}

/// Pending operations of one connection
#[derive(Default)]
pub struct Correlator {
    registry: Mutex<Registry>,
}

impl Correlator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claim a command code for one operation
    ///
    /// Fails with [`Error::BusyCommand`] while another lease on the same code
    /// is alive.
    pub fn lease(self: &Arc<Self>, command: Command) -> Result<CommandLease> {
        let mut registry = self.registry.lock();
        if registry.closed {
            return Err(anviz_transport::Error::ConnectionClosed.into());
        }
        if !registry.leased.insert(command) {
            return Err(Error::BusyCommand(command));
        }

        Ok(CommandLease {
            correlator: Arc::clone(self),
            command,
        })
    }

    /// Number of registered waiters for `command`
    pub fn pending(&self, command: Command) -> usize {
        self.registry
            .lock()
            .waiters
            .get(&command)
            .map_or(0, VecDeque::len)
    }

    pub fn is_closed(&self) -> bool {
        self.registry.lock().closed
    }

    fn register(&self, command: Command) -> Result<(u64, oneshot::Receiver<Frame>)> {
        let mut registry = self.registry.lock();
        if registry.closed {
            return Err(anviz_transport::Error::ConnectionClosed.into());
        }

        let id = registry.next_id;
        registry.next_id += 1;

        let (tx, rx) = oneshot::channel();
        registry
            .waiters
            .entry(command)
            .or_default()
            .push_back(Waiter { id, tx });
        Ok((id, rx))
    }

    fn deregister(&self, command: Command, id: u64) {
        let mut registry = self.registry.lock();
        if let Some(queue) = registry.waiters.get_mut(&command) {
            queue.retain(|waiter| waiter.id != id);
            if queue.is_empty() {
                registry.waiters.remove(&command);
            }
        }
    }

    fn release(&self, command: Command) {
        self.registry.lock().leased.remove(&command);
    }
}

impl Subscriber for Correlator {
    fn on_frame(&self, frame: &Frame) {
        let mut registry = self.registry.lock();
        let Some(queue) = registry.waiters.get_mut(&frame.command) else {
            warn!("Dropping unsolicited {}", frame);
            return;
        };

        let mut outgoing = frame.clone();
        let mut delivered = false;
        while let Some(waiter) = queue.pop_front() {
            match waiter.tx.send(outgoing) {
                Ok(()) => {
                    delivered = true;
                    break;
                }
                // Receiver went away without deregistering yet
                Err(returned) => outgoing = returned,
            }
        }
        if queue.is_empty() {
            registry.waiters.remove(&frame.command);
        }

        if !delivered {
            warn!("Dropping unsolicited {}", frame);
        }
    }

    fn on_event(&self, event: &ConnectionEvent) {
        match event {
            ConnectionEvent::Connected { .. } => {}
            ConnectionEvent::Closed | ConnectionEvent::Failed { .. } => {
                let mut registry = self.registry.lock();
                registry.closed = true;

                let dropped: usize = registry.waiters.values().map(VecDeque::len).sum();
                // Dropping the senders fails every receiver
                registry.waiters.clear();

                if dropped > 0 {
                    debug!("Connection went down with {} pending response(s)", dropped);
                }
            }
        }
    }
}

/// Exclusive claim on a command code, released on drop
pub struct CommandLease {
    correlator: Arc<Correlator>,
    command: Command,
}

impl CommandLease {
    pub fn command(&self) -> Command {
        self.command
    }

    /// Register interest in the next response to this command
    ///
    /// Register before sending the request so a fast response cannot slip
    /// past.
    pub fn expect_response(&self) -> Result<PendingResponse> {
        let (id, rx) = self.correlator.register(self.command)?;
        Ok(PendingResponse {
            correlator: Arc::clone(&self.correlator),
            command: self.command,
            id,
            rx,
        })
    }
}

impl Drop for CommandLease {
    fn drop(&mut self) {
        self.correlator.release(self.command);
    }
}

/// One awaited response
///
/// Dropping it deregisters the waiter, so a response arriving later goes to
/// the next waiter or is dropped as unsolicited.
pub struct PendingResponse {
    correlator: Arc<Correlator>,
    command: Command,
    id: u64,
    rx: oneshot::Receiver<Frame>,
}

impl PendingResponse {
    /// Wait for the response
    ///
    /// Fails with `ConnectionClosed` when the connection goes down first.
    pub async fn recv(&mut self) -> Result<Frame> {
        (&mut self.rx)
            .await
            .map_err(|_| anviz_transport::Error::ConnectionClosed.into())
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        self.correlator.deregister(self.command, self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anviz_core::{DeviceId, Status};

    fn frame(command: Command, payload: Vec<u8>) -> Frame {
        Frame::new(DeviceId::new(1).unwrap(), command, Status::Success, payload)
    }

    #[test]
    fn test_lease_is_exclusive() {
        let correlator = Correlator::new();

        let lease = correlator.lease(Command::BasicInfo).unwrap();
        assert!(matches!(
            correlator.lease(Command::BasicInfo),
            Err(Error::BusyCommand(Command::BasicInfo))
        ));
        assert!(correlator.lease(Command::ExtendedInfo).is_ok());

        drop(lease);
        assert!(correlator.lease(Command::BasicInfo).is_ok());
    }

    #[tokio::test]
    async fn test_frames_go_to_oldest_waiter() {
        let correlator = Correlator::new();
        let lease = correlator.lease(Command::DownloadStaff).unwrap();

        let mut first = lease.expect_response().unwrap();
        let mut second = lease.expect_response().unwrap();

        correlator.on_frame(&frame(Command::DownloadStaff, vec![1]));
        correlator.on_frame(&frame(Command::DownloadStaff, vec![2]));

        assert_eq!(&first.recv().await.unwrap().payload[..], &[1]);
        assert_eq!(&second.recv().await.unwrap().payload[..], &[2]);
        assert_eq!(correlator.pending(Command::DownloadStaff), 0);
    }

    #[tokio::test]
    async fn test_dropped_waiter_is_skipped() {
        let correlator = Correlator::new();
        let lease = correlator.lease(Command::GetDateTime).unwrap();

        let stale = lease.expect_response().unwrap();
        let mut live = lease.expect_response().unwrap();
        drop(stale);
        assert_eq!(correlator.pending(Command::GetDateTime), 1);

        correlator.on_frame(&frame(Command::GetDateTime, vec![7]));
        assert_eq!(&live.recv().await.unwrap().payload[..], &[7]);
    }

    #[test]
    fn test_unsolicited_frame_is_dropped() {
        let correlator = Correlator::new();
        correlator.on_frame(&frame(Command::RecordCounts, vec![]));
        assert_eq!(correlator.pending(Command::RecordCounts), 0);
    }

    #[tokio::test]
    async fn test_close_fails_waiters_and_new_leases() {
        let correlator = Correlator::new();
        let lease = correlator.lease(Command::ClearAllRecords).unwrap();
        let mut pending = lease.expect_response().unwrap();

        correlator.on_event(&ConnectionEvent::Closed);

        assert!(matches!(
            pending.recv().await,
            Err(Error::Transport(anviz_transport::Error::ConnectionClosed))
        ));
        assert!(lease.expect_response().is_err());
        assert!(correlator.lease(Command::BasicInfo).is_err());
        assert!(correlator.is_closed());
    }
}

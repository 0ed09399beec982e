//! Connection manager
//!
//! One [`Connection`] per device. A reader task accumulates incoming bytes,
//! slices them into frames and hands each frame to the subscribers. Writes
//! from any task are serialized through a single write half.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::BytesMut;
use parking_lot::{Mutex, RwLock};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use anviz_core::{DeviceId, Frame, FrameBuffer};

use crate::{error::*, Transport};

/// Read chunk size
const READ_CHUNK: usize = 1024;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Lifecycle notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Link is up
    Connected { remote: String },

    /// Link closed by either side
    Closed,

    /// Link broke on an I/O error
    Failed { reason: String },
}

/// Receiver of decoded frames
///
/// Callbacks run on the reader task while the subscriber list is locked:
/// they must not block and must not call back into the connection.
pub trait Subscriber: Send + Sync {
    /// A frame passed validation and carries this connection's device id
    fn on_frame(&self, frame: &Frame);

    /// Connection state changed
    fn on_event(&self, _event: &ConnectionEvent) {}
}

#[derive(Default)]
struct Subscribers {
    closed: bool,
    list: Vec<Arc<dyn Subscriber>>,
}

struct Shared {
    device_id: DeviceId,
    remote: String,
    subscribers: RwLock<Subscribers>,
    writer: tokio::sync::Mutex<Option<BoxedWriter>>,
    /// Flips to `true` once the link is closed; wakes stalled writes
    closed: watch::Sender<bool>,
}

impl Shared {
    fn is_closed(&self) -> bool {
        self.subscribers.read().closed
    }

    fn publish(&self, frame: &Frame) {
        let subscribers = self.subscribers.read();
        if subscribers.closed {
            return;
        }
        for subscriber in &subscribers.list {
            subscriber.on_frame(frame);
        }
    }

    /// Mark the link dead and notify everyone exactly once
    fn close(&self, event: ConnectionEvent) -> bool {
        let mut subscribers = self.subscribers.write();
        if subscribers.closed {
            return false;
        }
        subscribers.closed = true;
        self.closed.send_replace(true);

        for subscriber in subscribers.list.drain(..) {
            subscriber.on_event(&event);
        }
        true
    }
}

/// Live link to one device
///
/// # Examples
///
/// ```no_run
/// use anviz_core::DeviceId;
/// use anviz_transport::TcpTransport;
///
/// # async fn run() -> anviz_transport::Result<()> {
/// let device_id = DeviceId::new(1).unwrap();
/// let connection = TcpTransport::new("192.168.1.218", 5010).open(device_id).await?;
/// # Ok(())
/// # }
/// ```
pub struct Connection {
    shared: Arc<Shared>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl Connection {
    /// Start managing an established byte stream
    ///
    /// Frames are only published for `device_id`; frames from any other id
    /// are dropped.
    pub fn open<S>(stream: S, device_id: DeviceId, remote: impl Into<String>) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let shared = Arc::new(Shared {
            device_id,
            remote: remote.into(),
            subscribers: RwLock::new(Subscribers::default()),
            writer: tokio::sync::Mutex::new(Some(Box::new(writer))),
            closed: watch::channel(false).0,
        });

        info!(remote = %shared.remote, device_id = %device_id, "Connection established");

        let task = tokio::spawn(read_loop(reader, Arc::clone(&shared)));

        Self {
            shared,
            reader: Mutex::new(Some(task)),
        }
    }

    /// Register a subscriber
    ///
    /// The subscriber immediately receives `Connected`, or `Closed` when the
    /// link is already down, in which case it is not retained.
    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber>) {
        let mut subscribers = self.shared.subscribers.write();
        if subscribers.closed {
            subscriber.on_event(&ConnectionEvent::Closed);
            return;
        }

        subscriber.on_event(&ConnectionEvent::Connected {
            remote: self.shared.remote.clone(),
        });
        subscribers.list.push(subscriber);
    }

    pub fn device_id(&self) -> DeviceId {
        self.shared.device_id
    }
}

#[async_trait]
impl Transport for Connection {
    async fn send(&self, data: &[u8]) -> Result<()> {
        let mut closed = self.shared.closed.subscribe();
        let link_closed = async move {
            let _ = closed.wait_for(|closed| *closed).await;
        };
        tokio::pin!(link_closed);

        let mut writer = tokio::select! {
            biased;
            _ = &mut link_closed => return Err(Error::ConnectionClosed),
            writer = self.shared.writer.lock() => writer,
        };

        let written = {
            let stream = writer.as_mut().ok_or(Error::NotConnected)?;
            trace!("Sending {} bytes: {}", data.len(), hex::encode(data));

            let write = async {
                stream.write_all(data).await?;
                stream.flush().await
            };
            tokio::select! {
                biased;
                _ = &mut link_closed => None,
                written = write => Some(written),
            }
        };

        match written {
            Some(Ok(())) => Ok(()),
            Some(Err(e)) => {
                warn!("Write to {} failed: {}", self.shared.remote, e);
                self.shared.close(ConnectionEvent::Failed {
                    reason: e.to_string(),
                });
                Err(Error::Io(e))
            }
            None => {
                // Closed mid-write; the write half is unusable now
                debug!("Write to {} abandoned, link closed", self.shared.remote);
                writer.take();
                Err(Error::ConnectionClosed)
            }
        }
    }

    async fn disconnect(&self) -> Result<()> {
        let was_open = self.shared.close(ConnectionEvent::Closed);

        if let Some(task) = self.reader.lock().take() {
            task.abort();
        }

        // A send holding the writer gives it up as soon as it sees the close
        let writer = match self.shared.writer.try_lock() {
            Ok(mut writer) => writer.take(),
            Err(_) => None,
        };
        if let Some(mut stream) = writer {
            let _ = stream.shutdown().await;
        }

        if was_open {
            info!("Disconnected from {}", self.shared.remote);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.shared.is_closed()
    }

    fn remote_addr(&self) -> String {
        self.shared.remote.clone()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(task) = self.reader.get_mut().take() {
            task.abort();
        }
        if self.shared.close(ConnectionEvent::Closed) {
            warn!("Connection to {} dropped while still connected", self.shared.remote);
        }
    }
}

async fn read_loop<R>(mut reader: R, shared: Arc<Shared>)
where
    R: AsyncRead + Unpin,
{
    let mut frames = FrameBuffer::new();
    let mut chunk = BytesMut::with_capacity(READ_CHUNK);

    let event = loop {
        chunk.clear();
        match reader.read_buf(&mut chunk).await {
            Ok(0) => {
                debug!("Connection closed by {}", shared.remote);
                break ConnectionEvent::Closed;
            }
            Ok(n) => {
                trace!("Received {} bytes: {}", n, hex::encode(&chunk[..n]));
                frames.push(&chunk[..n]);

                while let Some(result) = frames.next_frame() {
                    match result {
                        Ok(frame) if frame.device_id != shared.device_id => {
                            warn!(
                                expected = %shared.device_id,
                                received = %frame.device_id,
                                "Dropping frame for another device"
                            );
                        }
                        Ok(frame) => {
                            trace!("Received: {:?}", frame);
                            shared.publish(&frame);
                        }
                        Err(e) => warn!("Dropping malformed frame: {}", e),
                    }
                }
            }
            Err(e) => {
                warn!("Read from {} failed: {}", shared.remote, e);
                break ConnectionEvent::Failed {
                    reason: e.to_string(),
                };
            }
        }
    };

    shared.close(event);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use anviz_core::{Command, Status};
    use tokio::io::{duplex, DuplexStream};
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    enum Seen {
        Frame(Frame),
        Event(ConnectionEvent),
    }

    struct Probe(mpsc::UnboundedSender<Seen>);

    impl Subscriber for Probe {
        fn on_frame(&self, frame: &Frame) {
            let _ = self.0.send(Seen::Frame(frame.clone()));
        }

        fn on_event(&self, event: &ConnectionEvent) {
            let _ = self.0.send(Seen::Event(event.clone()));
        }
    }

    fn device(id: i64) -> DeviceId {
        DeviceId::new(id).unwrap()
    }

    fn open() -> (Connection, DuplexStream, mpsc::UnboundedReceiver<Seen>) {
        let (host, peer) = duplex(4096);
        let connection = Connection::open(host, device(1), "test");
        let (tx, rx) = mpsc::unbounded_channel();
        connection.subscribe(Arc::new(Probe(tx)));
        (connection, peer, rx)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<Seen>) -> Seen {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("subscriber notified in time")
            .expect("channel open")
    }

    async fn next_frame(rx: &mut mpsc::UnboundedReceiver<Seen>) -> Frame {
        match next(rx).await {
            Seen::Frame(frame) => frame,
            Seen::Event(event) => panic!("expected frame, got {:?}", event),
        }
    }

    fn response(id: i64, command: Command, payload: Vec<u8>) -> Vec<u8> {
        Frame::new(device(id), command, Status::Success, payload)
            .encode()
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn test_subscriber_sees_connected() {
        let (_connection, _peer, mut rx) = open();
        assert!(matches!(
            next(&mut rx).await,
            Seen::Event(ConnectionEvent::Connected { .. })
        ));
    }

    #[tokio::test]
    async fn test_publishes_fragmented_frames() {
        let (_connection, mut peer, mut rx) = open();
        next(&mut rx).await;

        let first = response(1, Command::BasicInfo, vec![1, 2, 3]);
        let second = response(1, Command::RecordCounts, vec![0; 18]);

        peer.write_all(&first[..6]).await.unwrap();
        peer.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let mut rest = first[6..].to_vec();
        rest.extend_from_slice(&second);
        peer.write_all(&rest).await.unwrap();

        assert_eq!(next_frame(&mut rx).await.command, Command::BasicInfo);
        assert_eq!(next_frame(&mut rx).await.command, Command::RecordCounts);
    }

    #[tokio::test]
    async fn test_drops_foreign_and_malformed_frames() {
        let (connection, mut peer, mut rx) = open();
        next(&mut rx).await;

        let foreign = response(2, Command::BasicInfo, vec![]);
        let mut corrupt = response(1, Command::ExtendedInfo, vec![5]);
        let last = corrupt.len() - 1;
        corrupt[last] ^= 0xFF;
        let good = response(1, Command::GetDateTime, vec![0x0E, 7, 15, 12, 16, 28]);

        peer.write_all(&foreign).await.unwrap();
        peer.write_all(&corrupt).await.unwrap();
        peer.write_all(&good).await.unwrap();

        assert_eq!(next_frame(&mut rx).await.command, Command::GetDateTime);
        assert!(connection.is_connected());
    }

    #[tokio::test]
    async fn test_send_reaches_peer() {
        let (connection, mut peer, _rx) = open();

        connection.send(&[0xA5, 0x01]).await.unwrap();

        let mut buf = [0u8; 2];
        peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0xA5, 0x01]);
    }

    #[tokio::test]
    async fn test_peer_close_is_reported() {
        let (connection, peer, mut rx) = open();
        next(&mut rx).await;

        drop(peer);

        assert!(matches!(next(&mut rx).await, Seen::Event(ConnectionEvent::Closed)));
        assert!(!connection.is_connected());
        assert!(matches!(
            connection.send(&[0xA5]).await,
            Err(Error::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_nothing_published_after_disconnect() {
        let (connection, mut peer, mut rx) = open();
        next(&mut rx).await;

        connection.disconnect().await.unwrap();
        assert!(matches!(next(&mut rx).await, Seen::Event(ConnectionEvent::Closed)));

        let _ = peer
            .write_all(&response(1, Command::BasicInfo, vec![]))
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Subscriber list was dropped on disconnect, so the channel closes
        assert!(rx.recv().await.is_none());
        assert!(!connection.is_connected());
    }

    #[tokio::test]
    async fn test_disconnect_unblocks_stalled_send() {
        let (host, _peer) = duplex(8);
        let connection = Connection::open(host, device(1), "stalled");

        let (sent, disconnected) = timeout(Duration::from_secs(1), async {
            tokio::join!(connection.send(&[0xA5; 64]), async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                connection.disconnect().await
            })
        })
        .await
        .expect("disconnect does not wait for the stalled write");

        assert!(matches!(sent, Err(Error::ConnectionClosed)));
        assert!(disconnected.is_ok());
        assert!(!connection.is_connected());
    }

    #[tokio::test]
    async fn test_subscribe_after_close() {
        let (connection, _peer, _rx) = open();
        connection.disconnect().await.unwrap();

        let (tx, mut late) = mpsc::unbounded_channel();
        connection.subscribe(Arc::new(Probe(tx)));

        assert!(matches!(next(&mut late).await, Seen::Event(ConnectionEvent::Closed)));
        assert!(late.recv().await.is_none());
    }
}

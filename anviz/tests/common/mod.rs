//! In-memory terminal for scenario tests

#![allow(dead_code)]

use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::time::{timeout, Instant};

use anviz::{Command, Device, DeviceId, Frame, Status};
use anviz_core::{frame::CHECKSUM_SIZE, Request};
use anviz_types::{encode_records, WireRecord};

pub const DEVICE_ID: i64 = 1;

/// Device side of a duplex link
pub struct Terminal {
    stream: DuplexStream,
    buffer: BytesMut,
}

/// A received request and when it arrived
pub struct Received {
    pub request: Request,
    pub at: Instant,
}

impl Terminal {
    /// Next complete request written by the client
    pub async fn next_request(&mut self) -> Received {
        loop {
            if let Some(request) = self.take_request() {
                return Received {
                    request,
                    at: Instant::now(),
                };
            }

            let n = self
                .stream
                .read_buf(&mut self.buffer)
                .await
                .expect("terminal read");
            assert!(n > 0, "client closed the link");
        }
    }

    /// Next request, or `None` when the client stays silent for `wait`
    pub async fn request_within(&mut self, wait: Duration) -> Option<Received> {
        timeout(wait, self.next_request()).await.ok()
    }

    fn take_request(&mut self) -> Option<Request> {
        if self.buffer.len() < Request::HEADER_SIZE {
            return None;
        }
        let len = usize::from(u16::from_be_bytes([self.buffer[6], self.buffer[7]]));
        let total = Request::HEADER_SIZE + len + CHECKSUM_SIZE;
        if self.buffer.len() < total {
            return None;
        }

        let raw = self.buffer.split_to(total);
        Some(Request::decode(&raw).expect("client sent a valid request"))
    }

    /// Encoded response to `command`
    pub fn response(command: Command, status: Status, payload: impl Into<bytes::Bytes>) -> Vec<u8> {
        Self::response_from(DEVICE_ID, command, status, payload)
    }

    pub fn response_from(
        device_id: i64,
        command: Command,
        status: Status,
        payload: impl Into<bytes::Bytes>,
    ) -> Vec<u8> {
        Frame::new(DeviceId::new(device_id).unwrap(), command, status, payload)
            .encode()
            .unwrap()
            .to_vec()
    }

    /// Answer with a success frame
    pub async fn reply(&mut self, command: Command, payload: impl Into<bytes::Bytes>) {
        self.reply_status(command, Status::Success, payload).await;
    }

    pub async fn reply_status(
        &mut self,
        command: Command,
        status: Status,
        payload: impl Into<bytes::Bytes>,
    ) {
        let bytes = Self::response(command, status, payload);
        self.write(&bytes).await;
    }

    /// Answer with a window of records
    pub async fn reply_records<R: WireRecord>(&mut self, command: Command, records: &[R]) {
        let payload = encode_records(records).unwrap();
        self.reply(command, payload).await;
    }

    pub async fn write(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.expect("terminal write");
        self.stream.flush().await.expect("terminal flush");
    }

    /// Write without caring whether the client still listens
    pub async fn try_write(&mut self, bytes: &[u8]) -> bool {
        self.stream.write_all(bytes).await.is_ok()
    }
}

/// Device wired to an in-memory terminal
pub fn connected(device: Device) -> (Device, Terminal) {
    connected_with_capacity(device, 64 * 1024)
}

/// Same, with `capacity` bytes of buffering in each direction
pub fn connected_with_capacity(device: Device, capacity: usize) -> (Device, Terminal) {
    let (client, server) = duplex(capacity);
    let mut device = device;
    device.connect_stream(client).unwrap();

    (
        device,
        Terminal {
            stream: server,
            buffer: BytesMut::new(),
        },
    )
}

pub fn device() -> Device {
    Device::new("terminal", DeviceId::new(DEVICE_ID).unwrap())
}

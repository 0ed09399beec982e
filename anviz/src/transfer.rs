//! Chunked transfer engine
//!
//! Every exchange with the device is a sequence of windows: one request,
//! one response. Single-shot commands are a one-window transfer, bulk
//! downloads and uploads split their records over several windows.
//!
//! Each in-flight window owns exactly one retry schedule. It is
//! retransmitted every `retry_interval` until `max_retries` is used up, and
//! no retransmission is scheduled at or past its deadline. Reaching the
//! deadline fails the whole transfer, even while a write is still stuck on
//! a peer that stopped reading.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::{debug, trace, warn};

use anviz_core::{
    constants::{self, transfer_flags},
    Command, DeviceId, Frame, Request,
};
use anviz_transport::Transport;
use anviz_types::{decode_records, encode_records, WireRecord};

use crate::correlator::{CommandLease, Correlator, PendingResponse};
use crate::error::{Error, Result};

/// Retransmission schedule of a window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay between transmissions of an unanswered window
    pub retry_interval: Duration,

    /// Retransmissions after the first send
    pub max_retries: u32,

    /// Time from first send until the window fails
    pub window_deadline: Duration,
}

impl RetryPolicy {
    pub fn new(retry_interval: Duration, max_retries: u32, window_deadline: Duration) -> Self {
        Self {
            retry_interval,
            max_retries,
            window_deadline,
        }
    }

    /// Policy for one-window commands
    pub fn single_shot() -> Self {
        Self {
            retry_interval: Duration::from_millis(constants::DEFAULT_RETRY_INTERVAL_MS),
            max_retries: 2,
            window_deadline: Duration::from_secs(constants::DEFAULT_TIMEOUT),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_millis(constants::DEFAULT_RETRY_INTERVAL_MS),
            max_retries: constants::MAX_RETRIES,
            window_deadline: Duration::from_secs(constants::DEFAULT_WINDOW_DEADLINE),
        }
    }
}

/// One request of a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    /// Position in the transfer, starting at 0
    pub index: usize,

    /// Request payload
    pub payload: Bytes,

    /// Records asked for or carried
    pub records: usize,
}

/// What the transfer does after a window is satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Done,
}

/// Outcome of a bulk upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UploadSummary {
    pub records: usize,
    pub windows: usize,
}

/// Windows of a bulk download of `total` records
///
/// The first window carries `start_flag`, every later one the continue flag.
/// Returns no windows when `total` is 0.
pub fn download_windows(total: usize, window_size: usize, start_flag: u8) -> Vec<Window> {
    let window_size = window_size.clamp(1, usize::from(u8::MAX));

    (0..total.div_ceil(window_size))
        .map(|index| {
            let records = (total - index * window_size).min(window_size);
            let flag = if index == 0 {
                start_flag
            } else {
                transfer_flags::CONTINUE
            };
            Window {
                index,
                // window_size is clamped to fit a byte
                payload: Bytes::from(vec![flag, records as u8]),
                records,
            }
        })
        .collect()
}

/// Windows of a bulk upload: count byte followed by the packed records
pub fn upload_windows<R: WireRecord>(records: &[R], window_size: usize) -> Result<Vec<Window>> {
    records
        .chunks(window_size.max(1))
        .enumerate()
        .map(|(index, chunk)| {
            Ok(Window {
                index,
                payload: encode_records(chunk)?,
                records: chunk.len(),
            })
        })
        .collect()
}

/// Lifecycle of an in-flight window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    /// Sent once, waiting for the response
    Issued,
    /// Retransmitted at least once
    Retrying,
    Satisfied,
    Failed,
}

struct PendingWindow {
    window: Window,
    state: WindowState,
    request: Bytes,
    response: PendingResponse,
    attempts: u32,
    next_retry: Option<Instant>,
    deadline: Instant,
}

impl PendingWindow {
    fn transition(&mut self, command: Command, next: WindowState) {
        trace!(
            "{} window {}: {:?} -> {:?}",
            command, self.window.index, self.state, next
        );
        self.state = next;
    }

    fn wake_at(&self) -> Instant {
        self.next_retry
            .map_or(self.deadline, |at| at.min(self.deadline))
    }

    fn schedule_retry(&mut self, now: Instant, policy: &RetryPolicy) {
        let retries_used = self.attempts.saturating_sub(1);
        self.next_retry = if retries_used < policy.max_retries {
            Some(now + policy.retry_interval).filter(|at| *at < self.deadline)
        } else {
            None
        };
    }
}

enum Wake {
    Response(Result<Frame>),
    Timer,
}

/// Transfer of one command over one connection
pub struct Transfer<'a> {
    transport: &'a dyn Transport,
    correlator: &'a Arc<Correlator>,
    device_id: DeviceId,
    command: Command,
    policy: RetryPolicy,
    pipeline_depth: usize,
}

impl<'a> Transfer<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        correlator: &'a Arc<Correlator>,
        device_id: DeviceId,
        command: Command,
    ) -> Self {
        Self {
            transport,
            correlator,
            device_id,
            command,
            policy: RetryPolicy::default(),
            pipeline_depth: 1,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Windows allowed in flight at once (at least 1)
    pub fn with_pipeline_depth(mut self, depth: usize) -> Self {
        self.pipeline_depth = depth.max(1);
        self
    }

    /// Send one request and return its response
    pub async fn request(self, payload: Bytes) -> Result<Frame> {
        let window = Window {
            index: 0,
            payload,
            records: 0,
        };

        let mut response = None;
        self.run(vec![window], |_, frame| {
            response = Some(frame);
            Ok(Flow::Done)
        })
        .await?;

        response.ok_or_else(|| Error::InvalidResponse("transfer ended without a response".into()))
    }

    /// Download up to `total` records, `window_size` per window
    ///
    /// A window answered with fewer than `window_size` records ends the
    /// transfer early.
    ///
    /// Responses carry no sequence number. When the device answers both a
    /// window and its retransmission, the second answer is taken as the next
    /// window's records, so a download that needed retransmissions may
    /// contain duplicates.
    pub async fn download<R: WireRecord>(
        self,
        total: usize,
        window_size: usize,
        start_flag: u8,
    ) -> Result<Vec<R>> {
        let command = self.command;
        let windows = download_windows(total, window_size, start_flag);
        let mut records = Vec::with_capacity(total);

        self.run(windows, |window, frame| {
            let mut decoded: Vec<R> = decode_records(&frame.payload);
            let received = decoded.len();

            if received > window.records {
                debug!(
                    "{} window {} returned {} records, {} requested",
                    command, window.index, received, window.records
                );
                decoded.truncate(window.records);
            }
            records.extend(decoded);

            if received < window_size {
                debug!(
                    "{} finished after window {} ({} records)",
                    command,
                    window.index,
                    records.len()
                );
                Ok(Flow::Done)
            } else {
                Ok(Flow::Continue)
            }
        })
        .await?;

        Ok(records)
    }

    /// Upload `records`, `window_size` per window, one acknowledgement each
    pub async fn upload<R: WireRecord>(
        self,
        records: &[R],
        window_size: usize,
    ) -> Result<UploadSummary> {
        let windows = upload_windows(records, window_size)?;
        let mut summary = UploadSummary::default();

        self.run(windows, |window, _ack| {
            summary.records += window.records;
            summary.windows += 1;
            Ok(Flow::Continue)
        })
        .await?;

        Ok(summary)
    }

    /// Drive `windows` to completion
    ///
    /// Windows are issued in order, at most `pipeline_depth` at a time, and
    /// responses are matched to the oldest outstanding window. Each
    /// successful response is passed to `on_response`; a non-success status
    /// fails the transfer.
    pub async fn run<F>(self, windows: Vec<Window>, mut on_response: F) -> Result<()>
    where
        F: FnMut(&Window, Frame) -> Result<Flow>,
    {
        if windows.is_empty() {
            return Ok(());
        }

        let lease = self.correlator.lease(self.command)?;
        let mut queued = windows.into_iter();
        let mut in_flight: VecDeque<PendingWindow> = VecDeque::new();

        loop {
            while in_flight.len() < self.pipeline_depth {
                let Some(window) = queued.next() else { break };
                in_flight.push_back(self.issue(&lease, window).await?);
            }

            let Some(wake_at) = in_flight.iter().map(PendingWindow::wake_at).min() else {
                return Ok(());
            };
            let Some(front) = in_flight.front_mut() else {
                return Ok(());
            };

            let wake = tokio::select! {
                biased;
                frame = front.response.recv() => Wake::Response(frame),
                _ = sleep_until(wake_at) => Wake::Timer,
            };

            match wake {
                Wake::Response(frame) => {
                    let frame = frame?;
                    let Some(mut done) = in_flight.pop_front() else {
                        continue;
                    };

                    debug!(
                        "{} window {} satisfied after {} attempt(s)",
                        self.command, done.window.index, done.attempts
                    );

                    if !frame.is_success() {
                        done.transition(self.command, WindowState::Failed);
                        warn!(
                            "{} window {} answered with {}",
                            self.command, done.window.index, frame.status
                        );
                        return Err(Error::DeviceStatus {
                            status: frame.status,
                            frame: Box::new(frame),
                        });
                    }

                    done.transition(self.command, WindowState::Satisfied);
                    if on_response(&done.window, frame)? == Flow::Done {
                        return Ok(());
                    }
                }
                Wake::Timer => self.on_timer(&mut in_flight).await?,
            }
        }
    }

    async fn issue(&self, lease: &CommandLease, window: Window) -> Result<PendingWindow> {
        let request = Request::with_payload(self.device_id, self.command, window.payload.clone())
            .encode()?
            .freeze();

        // Register before sending so the response cannot race the waiter
        let response = lease.expect_response()?;

        debug!(
            "Sending {} window {} ({} bytes)",
            self.command,
            window.index,
            request.len()
        );
        let deadline = Instant::now() + self.policy.window_deadline;
        self.send_before(&request, deadline, window.index, 1).await?;

        let now = Instant::now();
        let mut pending = PendingWindow {
            window,
            state: WindowState::Issued,
            request,
            response,
            attempts: 1,
            next_retry: None,
            deadline,
        };
        pending.schedule_retry(now, &self.policy);
        Ok(pending)
    }

    /// Write `request`, giving up when `deadline` passes first
    async fn send_before(
        &self,
        request: &[u8],
        deadline: Instant,
        window: usize,
        attempts: u32,
    ) -> Result<()> {
        match timeout_at(deadline, self.transport.send(request)).await {
            Ok(sent) => Ok(sent?),
            Err(_) => {
                warn!(
                    "{} window {} timed out writing attempt {}",
                    self.command, window, attempts
                );
                Err(Error::TransferTimeout {
                    command: self.command,
                    window,
                    attempts,
                })
            }
        }
    }

    async fn on_timer(&self, in_flight: &mut VecDeque<PendingWindow>) -> Result<()> {
        let now = Instant::now();

        for pending in in_flight.iter_mut() {
            if now >= pending.deadline {
                pending.transition(self.command, WindowState::Failed);
                warn!(
                    "{} window {} timed out after {} attempt(s)",
                    self.command, pending.window.index, pending.attempts
                );
                return Err(Error::TransferTimeout {
                    command: self.command,
                    window: pending.window.index,
                    attempts: pending.attempts,
                });
            }

            if pending.next_retry.is_some_and(|at| now >= at) {
                pending.attempts += 1;
                if pending.state == WindowState::Issued {
                    pending.transition(self.command, WindowState::Retrying);
                }
                debug!(
                    "Retransmitting {} window {} (attempt {})",
                    self.command, pending.window.index, pending.attempts
                );
                self.send_before(
                    &pending.request,
                    pending.deadline,
                    pending.window.index,
                    pending.attempts,
                )
                .await?;
                pending.schedule_retry(now, &self.policy);
            }
        }

        Ok(())
    }
}

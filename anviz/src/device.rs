//! High-level device interface

use std::sync::Arc;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use chrono::NaiveDateTime;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

use anviz_core::{
    constants::{self, transfer_flags, windows},
    ClearKind, Command, DeviceId, Frame, DEFAULT_PORT,
};
use anviz_transport::{Connection, TcpTransport, Transport};
use anviz_types::{
    clock, AttendanceRecord, DeviceInfo, DeviceInfoBlock, FingerSlot, FingerprintTemplate,
    InfoKind, RecordCounts, StaffRecord,
};

use crate::correlator::Correlator;
use crate::error::{Error, Result};
use crate::transfer::{RetryPolicy, Transfer, UploadSummary};

/// Largest count the clear-new-records command carries (3 bytes)
const MAX_CLEAR_COUNT: u32 = 0xFF_FFFF;

struct Link {
    connection: Connection,
    correlator: Arc<Correlator>,
}

/// Anviz device
///
/// High-level interface for communicating with Anviz time and attendance
/// terminals. Operations take `&self`, so different commands may run
/// concurrently on one connection; two overlapping operations on the same
/// command fail with [`Error::BusyCommand`].
///
/// # Examples
///
/// ```no_run
/// use anviz::{Device, DeviceId};
///
/// #[tokio::main]
/// async fn main() -> anviz::Result<()> {
///     let mut device = Device::new("192.168.1.218", DeviceId::new(1)?);
///
///     device.connect().await?;
///     println!("Connected!");
///
///     let counts = device.query_record_counts().await?;
///     println!("{}", counts);
///
///     let records = device.download_attendance(counts.all_records as usize).await?;
///     println!("{} punches", records.len());
///
///     device.disconnect().await?;
///     Ok(())
/// }
/// ```
pub struct Device {
    host: String,
    port: u16,
    device_id: DeviceId,
    connect_timeout: Duration,
    retry_policy: RetryPolicy,
    single_shot_policy: RetryPolicy,
    pipeline_depth: usize,
    link: Option<Link>,
}

impl Device {
    /// Create a new device instance (TCP, port 5010)
    pub fn new(host: impl Into<String>, device_id: DeviceId) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            device_id,
            connect_timeout: Duration::from_secs(constants::DEFAULT_TIMEOUT),
            retry_policy: RetryPolicy::default(),
            single_shot_policy: RetryPolicy::single_shot(),
            pipeline_depth: 1,
            link: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Retry schedule for bulk transfer windows
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Retry schedule for one-window commands
    pub fn with_single_shot_policy(mut self, policy: RetryPolicy) -> Self {
        self.single_shot_policy = policy;
        self
    }

    /// Windows a bulk transfer keeps in flight (default 1)
    pub fn with_pipeline_depth(mut self, depth: usize) -> Self {
        self.pipeline_depth = depth.max(1);
        self
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    pub fn remote_addr(&self) -> String {
        match &self.link {
            Some(link) => link.connection.remote_addr(),
            None => format!("{}:{}", self.host, self.port),
        }
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.link
            .as_ref()
            .is_some_and(|link| link.connection.is_connected())
    }

    /// Connect to device
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Already connected
    /// - The address does not resolve
    /// - Network connection fails or times out
    pub async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Err(anviz_transport::Error::AlreadyConnected.into());
        }

        info!("Connecting to {}:{}...", self.host, self.port);

        let connection = TcpTransport::new(self.host.clone(), self.port)
            .with_connect_timeout(self.connect_timeout)
            .open(self.device_id)
            .await?;

        self.attach(connection);
        Ok(())
    }

    /// Use an already established byte stream as the device link
    pub fn connect_stream<S>(&mut self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        if self.is_connected() {
            return Err(anviz_transport::Error::AlreadyConnected.into());
        }

        let remote = format!("{}:{}", self.host, self.port);
        self.attach(Connection::open(stream, self.device_id, remote));
        Ok(())
    }

    fn attach(&mut self, connection: Connection) {
        let correlator = Correlator::new();
        connection.subscribe(correlator.clone());
        self.link = Some(Link {
            connection,
            correlator,
        });
    }

    /// Disconnect from device
    ///
    /// Every operation still waiting for a response fails.
    pub async fn disconnect(&self) -> Result<()> {
        let Some(link) = &self.link else {
            return Ok(());
        };

        link.connection.disconnect().await?;
        Ok(())
    }

    /// Read the basic (`0x30`) and extended (`0x32`) information blocks
    pub async fn query_device_info(&self) -> Result<DeviceInfo> {
        debug!("Getting device info...");

        let basic = self.request(Command::BasicInfo, Bytes::new()).await?;
        let extended = self.request(Command::ExtendedInfo, Bytes::new()).await?;

        let info = DeviceInfo {
            basic: DeviceInfoBlock::new(InfoKind::Basic, basic.payload),
            extended: DeviceInfoBlock::new(InfoKind::Extended, extended.payload),
        };

        debug!("Device info: {}", info);
        Ok(info)
    }

    /// Read user, fingerprint and record totals
    pub async fn query_record_counts(&self) -> Result<RecordCounts> {
        let frame = self.request(Command::RecordCounts, Bytes::new()).await?;
        let counts = RecordCounts::decode(&frame.payload)?;

        debug!("Record counts: {}", counts);
        Ok(counts)
    }

    /// Read the device clock
    pub async fn get_datetime(&self) -> Result<NaiveDateTime> {
        let frame = self.request(Command::GetDateTime, Bytes::new()).await?;
        Ok(clock::decode_datetime(&frame.payload)?)
    }

    /// Download up to `count` staff records, 12 per window
    pub async fn download_staff(&self, count: usize) -> Result<Vec<StaffRecord>> {
        debug!("Downloading {} staff records...", count);

        self.transfer(Command::DownloadStaff)?
            .download(count, windows::STAFF, transfer_flags::STAFF_START)
            .await
    }

    /// Download up to `count` attendance records, 25 per window
    pub async fn download_attendance(&self, count: usize) -> Result<Vec<AttendanceRecord>> {
        debug!("Downloading {} attendance records...", count);

        self.transfer(Command::DownloadAttendance)?
            .download(count, windows::ATTENDANCE, transfer_flags::ATTENDANCE_START)
            .await
    }

    /// Upload staff records, 12 per window
    pub async fn upload_staff(&self, records: &[StaffRecord]) -> Result<UploadSummary> {
        debug!("Uploading {} staff records...", records.len());

        let summary = self
            .transfer(Command::UploadStaff)?
            .upload(records, windows::STAFF)
            .await?;

        info!(
            "Uploaded {} staff records in {} window(s)",
            summary.records, summary.windows
        );
        Ok(summary)
    }

    /// Download the template enrolled in `slot` (1 or 2) for `user_code`
    pub async fn download_fingerprint_template(
        &self,
        user_code: u64,
        slot: u8,
    ) -> Result<FingerprintTemplate> {
        let finger = FingerSlot::try_from(slot).map_err(|_| Error::InvalidFingerSlot(slot))?;
        if user_code > StaffRecord::MAX_USER_CODE {
            return Err(anviz_types::Error::UserCodeRange {
                code: user_code,
                max: StaffRecord::MAX_USER_CODE,
            }
            .into());
        }

        // Same 5-byte code as the staff record
        let mut payload = BytesMut::with_capacity(6);
        payload.put_uint(user_code, 5);
        payload.put_u8(finger.number());

        let frame = self
            .request(Command::FingerprintTemplate, payload.freeze())
            .await?;

        Ok(FingerprintTemplate {
            user_code,
            slot: finger,
            data: frame.payload,
        })
    }

    /// Delete every attendance record on the device
    pub async fn clear_all_records(&self) -> Result<()> {
        self.request(Command::ClearAllRecords, Bytes::new()).await?;
        info!("Cleared all records");
        Ok(())
    }

    /// Clear the "new" flag on attendance records
    pub async fn clear_new_records(&self, count: u32, kind: ClearKind) -> Result<()> {
        if count > MAX_CLEAR_COUNT {
            return Err(anviz_types::Error::Validation(format!(
                "clear count {} does not fit 3 bytes",
                count
            ))
            .into());
        }

        let mut payload = BytesMut::with_capacity(4);
        payload.put_u8(kind as u8);
        payload.put_uint(u64::from(count), 3);

        self.request(Command::ClearNewRecords, payload.freeze())
            .await?;
        debug!("Cleared new-record flag ({:?}, count {})", kind, count);
        Ok(())
    }

    /// Number of stored photos
    pub async fn query_photo_count(&self) -> Result<u64> {
        let frame = self.request(Command::PhotoCount, Bytes::new()).await?;
        be_integer(&frame)
    }

    /// Raw photo head listing, `count` entries from `start`
    pub async fn query_photo_heads(&self, start: u8, count: u8) -> Result<Bytes> {
        let frame = self
            .request(Command::PhotoHeads, Bytes::from(vec![start, count]))
            .await?;
        Ok(frame.payload)
    }

    // Helper methods

    fn link(&self) -> Result<&Link> {
        self.link.as_ref().ok_or(Error::NotConnected)
    }

    fn transfer(&self, command: Command) -> Result<Transfer<'_>> {
        let link = self.link()?;
        Ok(Transfer::new(
            &link.connection,
            &link.correlator,
            self.device_id,
            command,
        )
        .with_policy(self.retry_policy)
        .with_pipeline_depth(self.pipeline_depth))
    }

    /// Send a one-window command and return the response frame
    async fn request(&self, command: Command, payload: Bytes) -> Result<Frame> {
        let link = self.link()?;
        Transfer::new(&link.connection, &link.correlator, self.device_id, command)
            .with_policy(self.single_shot_policy)
            .request(payload)
            .await
    }
}

/// Big-endian integer payload
fn be_integer(frame: &Frame) -> Result<u64> {
    if frame.payload.len() > 8 {
        return Err(Error::InvalidResponse(format!(
            "{} carries {} bytes, expected an integer",
            frame.command,
            frame.payload.len()
        )));
    }

    Ok(frame
        .payload
        .iter()
        .fold(0u64, |value, byte| (value << 8) | u64::from(*byte)))
}

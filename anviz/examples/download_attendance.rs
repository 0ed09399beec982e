//! Attendance download example

use std::time::Duration;

use anviz::{ClearKind, Device, DeviceId, RetryPolicy};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let host = std::env::var("ANVIZ_HOST").unwrap_or_else(|_| "192.168.1.218".to_string());
    let device_id: i64 = std::env::var("ANVIZ_DEVICE_ID")
        .unwrap_or_else(|_| "1".to_string())
        .parse()?;
    // Pass --clear to reset the new-record flag afterwards
    let clear = std::env::args().any(|arg| arg == "--clear");

    // Slow links: wait longer before retransmitting a window
    let policy = RetryPolicy::new(Duration::from_secs(3), 3, Duration::from_secs(15));

    let mut device = Device::new(host, DeviceId::new(device_id)?).with_retry_policy(policy);
    device.connect().await?;

    let counts = device.query_record_counts().await?;
    println!("Device holds {} records ({} new)", counts.all_records, counts.new_records);

    let staff = device.download_staff(counts.users as usize).await?;
    for person in &staff {
        println!("{}", person);
    }

    let records = device
        .download_attendance(counts.all_records as usize)
        .await?;
    for record in &records {
        println!("{} at {}", record, record.recorded_at());
    }
    println!("Downloaded {} records", records.len());

    if clear && counts.new_records > 0 {
        device
            .clear_new_records(counts.new_records, ClearKind::AllNew)
            .await?;
        println!("Cleared new-record flag");
    }

    device.disconnect().await?;
    Ok(())
}

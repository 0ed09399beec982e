//! Device information example

use anviz::{Device, DeviceId};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging, RUST_LOG=anviz=trace shows raw frames
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Change to your device address and id
    let host = std::env::var("ANVIZ_HOST").unwrap_or_else(|_| "192.168.1.218".to_string());
    let device_id: i64 = std::env::var("ANVIZ_DEVICE_ID")
        .unwrap_or_else(|_| "1".to_string())
        .parse()?;

    println!("Connecting to {} (device {})...", host, device_id);

    let mut device = Device::new(host, DeviceId::new(device_id)?);
    device.connect().await?;
    println!("✓ Connected!");

    let info = device.query_device_info().await?;
    println!("✓ {}", info);

    let clock = device.get_datetime().await?;
    println!("✓ Device clock: {}", clock);

    let counts = device.query_record_counts().await?;
    println!("✓ {}", counts);

    device.disconnect().await?;
    println!("✓ Disconnected");

    Ok(())
}

//! Vision client CLI harness.
//!
//! Connects to the dashcam, prints device and SD-card info, walks the
//! first page of the file listing, then stays connected and logs every
//! event until Ctrl-C. Intended for bench testing against real hardware;
//! UI applications embed [`VisionClient`] directly instead.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vision_client::{load_config, ClientConfig, VisionClient, VisionObserver};
use vision_core::domain::{DeviceFile, DeviceInfo, FileFilter, SdCardInfo};

/// Observer that logs every event it receives.
struct LoggingObserver;

impl VisionObserver for LoggingObserver {
    fn on_connected(&self) {
        info!("event: connected");
    }
    fn on_connection_failed(&self, reason: &str) {
        warn!("event: connection failed: {reason}");
    }
    fn on_connection_lost(&self, reason: &str) {
        warn!("event: connection lost: {reason}");
    }
    fn on_session_started(&self) {
        info!("event: session started");
    }
    fn on_device_info(&self, device: &DeviceInfo) {
        info!(
            "event: device {} fw {} serial {}",
            device.camera_type, device.firmware_version, device.serial_number
        );
    }
    fn on_sd_card_info(&self, card: &SdCardInfo) {
        info!(
            "event: sd card {:?}, {} MiB free of {} MiB",
            card.status,
            card.free_bytes / (1024 * 1024),
            card.total_bytes / (1024 * 1024)
        );
    }
    fn on_file_list(&self, files: &[DeviceFile], total: u32) {
        info!("event: file list chunk of {} (total {total})", files.len());
    }
    fn on_sd_card_removed(&self) {
        warn!("event: sd card removed");
    }
    fn on_sd_card_inserted(&self) {
        info!("event: sd card inserted");
    }
    fn on_message(&self, msg_id: u32, result: i32, content: &str) {
        info!("event: message {msg_id} result {result}: {content}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "vision.toml".to_string());
    let config: ClientConfig = load_config(Path::new(&config_path))?;
    info!(device_addr = %config.device_addr, "vision client starting");

    let client = VisionClient::new(config)?;
    client.add_observer(Arc::new(LoggingObserver)).await?;

    client.connect().await?;
    info!("connected; querying device");

    if let Err(e) = client.device_info().await {
        warn!("device info failed: {e}");
    }
    if let Err(e) = client.sd_card_info().await {
        warn!("sd card info failed: {e}");
    }
    match client.list_files(FileFilter::All, 0, 20).await {
        Ok(chunk) => {
            for file in &chunk.files {
                info!("  {:?} {} ({} bytes)", file.kind, file.name, file.size_bytes);
            }
        }
        Err(e) => warn!("file listing failed: {e}"),
    }

    info!("running until Ctrl-C");
    tokio::signal::ctrl_c().await?;

    client.shutdown().await;
    info!("vision client stopped");
    Ok(())
}

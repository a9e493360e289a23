//! Immutable device and SD-card info snapshots.

use serde::{Deserialize, Serialize};

use crate::protocol::messages::{DeviceInfoBody, SdInfoBody};

const BYTES_PER_MEGABYTE: i64 = 1024 * 1024;

/// Static device identity, returned once per GetDeviceInfo request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub camera_type: String,
    pub firmware_version: String,
    pub firmware_date: String,
    pub param_version: Option<String>,
    pub serial_number: String,
    pub verify_code: Option<String>,
}

impl From<DeviceInfoBody> for DeviceInfo {
    fn from(body: DeviceInfoBody) -> Self {
        Self {
            camera_type: body.camera_type,
            firmware_version: body.firm_ver,
            firmware_date: body.firm_date,
            param_version: body.param_version,
            serial_number: body.serial_num,
            verify_code: body.verify_code,
        }
    }
}

/// Whether an SD card is present in the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SdCardStatus {
    Present,
    Missing,
}

/// SD-card capacity snapshot, returned once per GetSdInfo request.
///
/// The wire reports space in megabytes with `-1` meaning no card; this
/// type carries bytes and a parsed status instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdCardInfo {
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub status: SdCardStatus,
    pub health_status: Option<String>,
    pub residual_life: Option<String>,
}

impl From<SdInfoBody> for SdCardInfo {
    fn from(body: SdInfoBody) -> Self {
        let status = if body.total_space < 0 || body.free_space < 0 {
            SdCardStatus::Missing
        } else {
            SdCardStatus::Present
        };
        Self {
            total_bytes: (body.total_space.max(0) * BYTES_PER_MEGABYTE) as u64,
            free_bytes: (body.free_space.max(0) * BYTES_PER_MEGABYTE) as u64,
            status,
            health_status: body.health_status,
            residual_life: body.residual_life,
        }
    }
}

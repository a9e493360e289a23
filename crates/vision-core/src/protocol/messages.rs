//! All Vision device protocol message types.
//!
//! The device speaks JSON objects over a single TCP connection. Every
//! request carries an operation code (`msg_id`), a correlation identifier
//! (`seq`) echoed back in the matching response, and — for everything but
//! StartSession — the session `token` obtained during the handshake.
//! Responses carry `rval` (0 = success, nonzero = device rejection) plus
//! operation-specific payload fields. Unsolicited notifications carry no
//! `seq` and are routed to observers rather than to a pending request.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::protocol::codec::ProtocolError;

// ── Protocol constants ────────────────────────────────────────────────────────

/// `rval` value the device sends on success.
pub const RESULT_OK: i32 = 0;

/// Default control-channel address of the device's access-point gateway.
pub const DEFAULT_DEVICE_ADDR: &str = "192.168.42.1:8080";

/// RTSP endpoint the device serves its live stream on when the StartStream
/// response omits an explicit URL.
pub const DEFAULT_STREAM_URL: &str = "rtsp://192.168.42.1/ch1/sub/av_stream";

// ── Operation codes ───────────────────────────────────────────────────────────

/// All operation codes (`msg_id` values) defined by the device protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum OpCode {
    /// Heartbeat / application status report. Request carries `type:"app_status"`.
    AppStatus = 1,
    /// Device-originated notification channel (inbound only).
    Notification = 7,
    /// Camera type, firmware version, serial number, verify code.
    GetDeviceInfo = 11,
    /// SD card capacity and health. `-1` in either space field means no card.
    GetSdInfo = 100,
    /// Format the SD card. Request carries `sd_status:"1"`, `format:"1"`.
    FormatSd = 102,
    /// Session handshake; response `param` is the session token.
    StartSession = 257,
    /// Graceful session teardown.
    EndSession = 258,
    /// Begin the live RTSP stream; response may carry the stream `url`.
    StartStream = 259,
    /// Stop the live stream.
    StopStream = 260,
    /// Mark an emergency recording. rval `-1` = card full, `-2` = write-protected.
    EventRecord = 513,
    /// Capture a still photo to the SD card; response carries `url`.
    TakePhoto = 769,
    /// Paged file listing; request carries `param`/`offset`/`count`.
    GetFileList = 1281,
    /// Delete one file by name (`param`).
    DeleteFile = 1282,
    /// Resolve the HTTP download URL for one file by name (`param`).
    GetDownloadUrl = 1283,
}

impl TryFrom<u32> for OpCode {
    type Error = ();

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(OpCode::AppStatus),
            7 => Ok(OpCode::Notification),
            11 => Ok(OpCode::GetDeviceInfo),
            100 => Ok(OpCode::GetSdInfo),
            102 => Ok(OpCode::FormatSd),
            257 => Ok(OpCode::StartSession),
            258 => Ok(OpCode::EndSession),
            259 => Ok(OpCode::StartStream),
            260 => Ok(OpCode::StopStream),
            513 => Ok(OpCode::EventRecord),
            769 => Ok(OpCode::TakePhoto),
            1281 => Ok(OpCode::GetFileList),
            1282 => Ok(OpCode::DeleteFile),
            1283 => Ok(OpCode::GetDownloadUrl),
            _ => Err(()),
        }
    }
}

impl OpCode {
    /// The wire `msg_id` value for this operation.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Operations whose device-side work is dominated by SD-card I/O and
    /// therefore get the longer request timeout.
    pub fn is_slow(self) -> bool {
        matches!(
            self,
            OpCode::GetFileList | OpCode::DeleteFile | OpCode::FormatSd
        )
    }

    /// Stream-control operations: at most one may be in flight at a time.
    pub fn is_stream_control(self) -> bool {
        matches!(self, OpCode::StartStream | OpCode::StopStream)
    }
}

// ── Outbound request ──────────────────────────────────────────────────────────

/// One outbound request, serialized as a flat JSON object.
///
/// `seq` and `token` are placeholders until the submission path fills them
/// in; optional fields are omitted from the wire entirely when unset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    pub msg_id: u32,
    pub seq: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sd_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl Request {
    /// Creates a bare request for `op` with no parameters.
    pub fn new(op: OpCode) -> Self {
        Self {
            msg_id: op.code(),
            seq: 0,
            token: None,
            param: None,
            kind: None,
            offset: None,
            count: None,
            sd_status: None,
            format: None,
        }
    }

    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.param = Some(param.into());
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_page(mut self, offset: u32, count: u32) -> Self {
        self.offset = Some(offset);
        self.count = Some(count);
        self
    }

    /// The SD-format request the device expects (`sd_status`/`format` flags).
    pub fn format_sd() -> Self {
        let mut req = Request::new(OpCode::FormatSd);
        req.sd_status = Some("1".to_string());
        req.format = Some("1".to_string());
        req
    }
}

// ── Inbound frames ────────────────────────────────────────────────────────────

/// One decoded inbound JSON object.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Reply to a request; `seq` echoes the request's correlation id.
    Response(Response),
    /// Device-originated message with no correlation id.
    Notification(Notification),
}

/// A correlated reply from the device.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Response {
    pub msg_id: u32,
    pub seq: u64,
    #[serde(default)]
    pub rval: i32,
    /// All remaining payload fields, untouched.
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        self.rval == RESULT_OK
    }

    /// The operation this response answers, when the code is known.
    pub fn op(&self) -> Option<OpCode> {
        OpCode::try_from(self.msg_id).ok()
    }

    /// Deserializes the payload fields into a typed body.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Payload`] when required fields are missing
    /// or of the wrong type.
    pub fn decode_body<T: serde::de::DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        serde_json::from_value(Value::Object(self.body.clone()))
            .map_err(|e| ProtocolError::Payload(e.to_string()))
    }
}

/// An unsolicited device message (no `seq`).
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub msg_id: u32,
    pub kind: NotificationKind,
    pub param: Option<String>,
}

/// Known notification `type` strings, with unknown ones preserved verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationKind {
    /// The device is shutting down or dropping the connection.
    DisconnectShutdown,
    SdRemoved,
    SdInserted,
    SdError,
    /// Loop recording reclaimed an old file.
    AutoFileDelete,
    Other(String),
}

impl NotificationKind {
    pub fn parse(kind: &str) -> Self {
        match kind {
            "disconnect_shutdown" => NotificationKind::DisconnectShutdown,
            "SD_rm" => NotificationKind::SdRemoved,
            "SD_insert" => NotificationKind::SdInserted,
            "SD_err" => NotificationKind::SdError,
            "auto_file_delete" => NotificationKind::AutoFileDelete,
            other => NotificationKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            NotificationKind::DisconnectShutdown => "disconnect_shutdown",
            NotificationKind::SdRemoved => "SD_rm",
            NotificationKind::SdInserted => "SD_insert",
            NotificationKind::SdError => "SD_err",
            NotificationKind::AutoFileDelete => "auto_file_delete",
            NotificationKind::Other(s) => s,
        }
    }
}

// ── Typed response bodies ─────────────────────────────────────────────────────

/// StartSession response payload; `param` is the session token.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionStartBody {
    pub param: i64,
}

/// GetDeviceInfo response payload, field names as on the wire.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeviceInfoBody {
    pub camera_type: String,
    pub firm_ver: String,
    pub firm_date: String,
    #[serde(default)]
    pub param_version: Option<String>,
    pub serial_num: String,
    #[serde(default)]
    pub verify_code: Option<String>,
}

/// GetSdInfo response payload. Space fields are megabytes; `-1` means the
/// card is not inserted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SdInfoBody {
    pub total_space: i64,
    pub free_space: i64,
    #[serde(default)]
    pub health_status: Option<String>,
    #[serde(default)]
    pub residual_life: Option<String>,
}

/// TakePhoto response payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PhotoBody {
    pub url: String,
    #[serde(rename = "thumbnailUrl", default)]
    pub thumbnail_url: Option<String>,
}

/// StartStream response payload; the URL is optional on the wire.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StreamStartBody {
    #[serde(default)]
    pub url: Option<String>,
}

/// GetFileList response payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FileListBody {
    pub total: u32,
    #[serde(default)]
    pub files: Vec<FileEntry>,
}

/// One entry of a file-listing chunk, field names as on the wire.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FileEntry {
    pub name: String,
    #[serde(default)]
    pub path: String,
    pub size: u64,
    #[serde(default)]
    pub time: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub thumb_url: Option<String>,
}

/// GetDownloadUrl response payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DownloadUrlBody {
    pub url: String,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

//! Event taxonomy and the observer capability interface.
//!
//! Observers implement [`VisionObserver`] and override only the handlers
//! they care about; every method defaults to a no-op. [`deliver`] is the
//! single exhaustive routing point from a [`VisionEvent`] to the matching
//! handler, so adding an event variant forces the router to be updated.

use vision_core::domain::{CapturedPhoto, DeviceFile, DeviceInfo, SdCardInfo};

/// Everything the client can report to its observers.
#[derive(Debug, Clone, PartialEq)]
pub enum VisionEvent {
    // Connection lifecycle
    Connected,
    ConnectionFailed { reason: String },
    ConnectionLost { reason: String },
    // Session lifecycle
    SessionStarted,
    SessionFailed { reason: String },
    // Device / SD-card info
    DeviceInfo(DeviceInfo),
    SdCardInfo(SdCardInfo),
    // Stream lifecycle
    StreamStarted { url: String },
    StreamStopped,
    StreamError { reason: String },
    // Capture outcomes
    PhotoTaken(CapturedPhoto),
    PhotoFailed { reason: String },
    SnapshotTaken { path: String },
    EventRecorded,
    EventRecordFailed { reason: String },
    // SD-card maintenance
    SdCardFormatted,
    SdCardFormatFailed { reason: String },
    SdCardRemoved,
    SdCardInserted,
    SdCardError,
    // File operations
    FileList { files: Vec<DeviceFile>, total: u32 },
    FileListFailed { reason: String },
    FileDeleted { name: String },
    FileDeleteFailed { reason: String },
    FileDownloadUrl { url: String },
    FileDownloadFailed { reason: String },
    // Anything without a dedicated handler
    Message {
        msg_id: u32,
        result: i32,
        content: String,
    },
}

/// Observer capability set. All handlers default to no-ops; implement only
/// the subset you need.
pub trait VisionObserver: Send + Sync {
    fn on_connected(&self) {}
    fn on_connection_failed(&self, _reason: &str) {}
    fn on_connection_lost(&self, _reason: &str) {}
    fn on_session_started(&self) {}
    fn on_session_failed(&self, _reason: &str) {}
    fn on_device_info(&self, _info: &DeviceInfo) {}
    fn on_sd_card_info(&self, _info: &SdCardInfo) {}
    fn on_stream_started(&self, _url: &str) {}
    fn on_stream_stopped(&self) {}
    fn on_stream_error(&self, _reason: &str) {}
    fn on_photo_taken(&self, _photo: &CapturedPhoto) {}
    fn on_photo_failed(&self, _reason: &str) {}
    fn on_snapshot_taken(&self, _path: &str) {}
    fn on_event_recorded(&self) {}
    fn on_event_record_failed(&self, _reason: &str) {}
    fn on_sd_card_formatted(&self) {}
    fn on_sd_card_format_failed(&self, _reason: &str) {}
    fn on_sd_card_removed(&self) {}
    fn on_sd_card_inserted(&self) {}
    fn on_sd_card_error(&self) {}
    fn on_file_list(&self, _files: &[DeviceFile], _total: u32) {}
    fn on_file_list_failed(&self, _reason: &str) {}
    fn on_file_deleted(&self, _name: &str) {}
    fn on_file_delete_failed(&self, _reason: &str) {}
    fn on_file_download_url(&self, _url: &str) {}
    fn on_file_download_failed(&self, _reason: &str) {}
    fn on_message(&self, _msg_id: u32, _result: i32, _content: &str) {}
}

/// Routes one event to the matching observer handler.
pub fn deliver(observer: &dyn VisionObserver, event: &VisionEvent) {
    match event {
        VisionEvent::Connected => observer.on_connected(),
        VisionEvent::ConnectionFailed { reason } => observer.on_connection_failed(reason),
        VisionEvent::ConnectionLost { reason } => observer.on_connection_lost(reason),
        VisionEvent::SessionStarted => observer.on_session_started(),
        VisionEvent::SessionFailed { reason } => observer.on_session_failed(reason),
        VisionEvent::DeviceInfo(info) => observer.on_device_info(info),
        VisionEvent::SdCardInfo(info) => observer.on_sd_card_info(info),
        VisionEvent::StreamStarted { url } => observer.on_stream_started(url),
        VisionEvent::StreamStopped => observer.on_stream_stopped(),
        VisionEvent::StreamError { reason } => observer.on_stream_error(reason),
        VisionEvent::PhotoTaken(photo) => observer.on_photo_taken(photo),
        VisionEvent::PhotoFailed { reason } => observer.on_photo_failed(reason),
        VisionEvent::SnapshotTaken { path } => observer.on_snapshot_taken(path),
        VisionEvent::EventRecorded => observer.on_event_recorded(),
        VisionEvent::EventRecordFailed { reason } => observer.on_event_record_failed(reason),
        VisionEvent::SdCardFormatted => observer.on_sd_card_formatted(),
        VisionEvent::SdCardFormatFailed { reason } => observer.on_sd_card_format_failed(reason),
        VisionEvent::SdCardRemoved => observer.on_sd_card_removed(),
        VisionEvent::SdCardInserted => observer.on_sd_card_inserted(),
        VisionEvent::SdCardError => observer.on_sd_card_error(),
        VisionEvent::FileList { files, total } => observer.on_file_list(files, *total),
        VisionEvent::FileListFailed { reason } => observer.on_file_list_failed(reason),
        VisionEvent::FileDeleted { name } => observer.on_file_deleted(name),
        VisionEvent::FileDeleteFailed { reason } => observer.on_file_delete_failed(reason),
        VisionEvent::FileDownloadUrl { url } => observer.on_file_download_url(url),
        VisionEvent::FileDownloadFailed { reason } => observer.on_file_download_failed(reason),
        VisionEvent::Message {
            msg_id,
            result,
            content,
        } => observer.on_message(*msg_id, *result, content),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

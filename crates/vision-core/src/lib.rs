//! # vision-core
//!
//! Shared library for the Vision dashcam client containing the JSON wire
//! protocol, the streaming frame codec, correlation-id allocation, and
//! domain entities decoded from device responses.
//!
//! This crate has zero dependencies on sockets, timers, or OS APIs; the
//! networked client lives in `vision-client`.

pub mod domain;
pub mod protocol;

pub use domain::{
    CapturedPhoto, DeviceFile, DeviceInfo, FileFilter, FileKind, FileListChunk, SdCardInfo,
    SdCardStatus,
};
pub use protocol::codec::{decode_frame, encode_request, ProtocolError};
pub use protocol::messages::{InboundFrame, Notification, NotificationKind, OpCode, Request, Response};
pub use protocol::sequence::MessageIdCounter;

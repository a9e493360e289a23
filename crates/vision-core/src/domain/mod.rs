//! Pure domain value objects decoded from device responses. No I/O.

pub mod device;
pub mod files;

pub use device::{DeviceInfo, SdCardInfo, SdCardStatus};
pub use files::{CapturedPhoto, DeviceFile, FileFilter, FileKind, FileListChunk};

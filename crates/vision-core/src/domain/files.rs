//! Device file entries and the listing chunk shape.

use serde::{Deserialize, Serialize};

use crate::protocol::messages::{FileEntry, FileListBody, PhotoBody};

/// File kind as reported by the device (`type`: 1 = video, 2 = photo).
///
/// Unknown codes are preserved rather than rejected so one odd entry never
/// fails an entire listing chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    Video,
    Photo,
    Other(u8),
}

impl FileKind {
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => FileKind::Video,
            2 => FileKind::Photo,
            other => FileKind::Other(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            FileKind::Video => 1,
            FileKind::Photo => 2,
            FileKind::Other(code) => code,
        }
    }
}

/// Advisory kind filter for listing requests, as wire `param` strings.
///
/// The filter is best-effort on the device side: a filtered listing may
/// still contain mixed entries and callers must not assume purity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFilter {
    All,
    Video,
    Photo,
}

impl FileFilter {
    pub fn as_wire(self) -> &'static str {
        match self {
            FileFilter::All => "all",
            FileFilter::Video => "video",
            FileFilter::Photo => "photo",
        }
    }
}

/// One file stored on the device's SD card. Immutable snapshot produced by
/// decoding a listing response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFile {
    pub name: String,
    pub path: String,
    pub kind: FileKind,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub size_bytes: u64,
    pub created_at: String,
}

impl From<FileEntry> for DeviceFile {
    fn from(entry: FileEntry) -> Self {
        Self {
            name: entry.name,
            path: entry.path,
            kind: FileKind::from_code(entry.kind),
            url: entry.url,
            thumbnail_url: entry.thumb_url,
            size_bytes: entry.size,
            created_at: entry.time,
        }
    }
}

/// One page of a file listing: the entries of this chunk plus the running
/// total the device reports for the whole (filtered) listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileListChunk {
    pub files: Vec<DeviceFile>,
    pub total: u32,
}

impl From<FileListBody> for FileListChunk {
    fn from(body: FileListBody) -> Self {
        Self {
            total: body.total,
            files: body.files.into_iter().map(DeviceFile::from).collect(),
        }
    }
}

/// Outcome of a successful photo capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPhoto {
    pub url: String,
    pub thumbnail_url: Option<String>,
}

impl From<PhotoBody> for CapturedPhoto {
    fn from(body: PhotoBody) -> Self {
        Self {
            url: body.url,
            thumbnail_url: body.thumbnail_url,
        }
    }
}

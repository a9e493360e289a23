//! File-listing pagination support.
//!
//! Each `list_files` call issues exactly one request and yields one chunk;
//! accumulating chunks and deciding when to fetch the next page is the
//! caller's policy, not the protocol core's. The kind filter travels on
//! the wire but is advisory only — chunks are passed through without
//! client-side re-filtering, so mixed entries reach the caller as-is.

use vision_core::domain::FileListChunk;
use vision_core::protocol::messages::{FileListBody, Response};

use crate::error::ClientError;

/// Decodes one listing response into a chunk.
pub(crate) fn chunk_from_response(response: &Response) -> Result<FileListChunk, ClientError> {
    let body: FileListBody = response.decode_body()?;
    Ok(FileListChunk::from(body))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

//! JSON codec for encoding requests and decoding inbound device frames.
//!
//! The device sends bare JSON objects back-to-back on the TCP stream with
//! no length prefix, so a single read may deliver a partial object or
//! several coalesced ones. [`decode_frame`] extracts exactly one complete
//! top-level object from the front of a buffer and reports how many bytes
//! it consumed so the caller can advance its cursor.

use serde_json::Value;
use thiserror::Error;

use crate::protocol::messages::{
    InboundFrame, Notification, NotificationKind, Request, Response,
};

/// Errors that can occur during frame encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The buffer ends before the object does; wait for more bytes.
    #[error("incomplete frame: need more bytes")]
    Incomplete,

    /// The leading bytes cannot form a valid frame. `consumed` is how many
    /// bytes the caller must discard to resynchronize.
    #[error("malformed frame ({consumed} bytes skipped): {reason}")]
    Malformed { consumed: usize, reason: String },

    /// A structurally valid frame whose payload fields do not match the
    /// expected shape.
    #[error("malformed payload: {0}")]
    Payload(String),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes one [`Request`] as its JSON wire bytes.
///
/// # Errors
///
/// Returns [`ProtocolError::Payload`] if serialization fails.
pub fn encode_request(request: &Request) -> Result<Vec<u8>, ProtocolError> {
    serde_json::to_vec(request).map_err(|e| ProtocolError::Payload(e.to_string()))
}

/// Decodes one [`InboundFrame`] from the beginning of `bytes`.
///
/// Returns the decoded frame and the total number of bytes consumed
/// (including any leading whitespace), so the caller can advance its
/// read cursor. Frames carrying a `seq` field are responses; everything
/// else is a notification.
///
/// # Errors
///
/// - [`ProtocolError::Incomplete`] when the buffer holds only a prefix of
///   an object (or nothing but whitespace) — read more and retry.
/// - [`ProtocolError::Malformed`] when the leading bytes can never form a
///   valid frame; `consumed` bytes must be discarded before retrying.
pub fn decode_frame(bytes: &[u8]) -> Result<(InboundFrame, usize), ProtocolError> {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .ok_or(ProtocolError::Incomplete)?;

    if bytes[start] != b'{' {
        return Err(ProtocolError::Malformed {
            consumed: start + 1,
            reason: format!("expected '{{', found 0x{:02X}", bytes[start]),
        });
    }

    let end = scan_object(&bytes[start..])?;
    let consumed = start + end;
    let frame = parse_object(&bytes[start..consumed]).map_err(|reason| {
        ProtocolError::Malformed { consumed, reason }
    })?;
    Ok((frame, consumed))
}

// ── Frame boundary scanner ────────────────────────────────────────────────────

/// Finds the end of the JSON object starting at `bytes[0]` (which must be
/// `{`). Tracks brace depth while honouring string literals and escapes.
/// Returns the index one past the closing brace.
fn scan_object(bytes: &[u8]) -> Result<usize, ProtocolError> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i + 1);
                }
            }
            _ => {}
        }
    }
    Err(ProtocolError::Incomplete)
}

// ── Frame classification ──────────────────────────────────────────────────────

fn parse_object(bytes: &[u8]) -> Result<InboundFrame, String> {
    let value: Value = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
    let object = value.as_object().ok_or("frame is not a JSON object")?;

    let msg_id = object
        .get("msg_id")
        .and_then(Value::as_u64)
        .ok_or("missing msg_id")? as u32;

    if object.contains_key("seq") {
        let response: Response =
            serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;
        return Ok(InboundFrame::Response(response));
    }

    let kind = object
        .get("type")
        .and_then(Value::as_str)
        .map(NotificationKind::parse)
        .unwrap_or_else(|| NotificationKind::Other(String::new()));
    let param = object
        .get("param")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(InboundFrame::Notification(Notification {
        msg_id,
        kind,
        param,
    }))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

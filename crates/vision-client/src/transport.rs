//! TCP transport to the device.
//!
//! TCP is a stream: a single read may deliver part of one JSON frame or
//! several coalesced ones. The read loop accumulates bytes and drains
//! complete frames with [`decode_frame`], forwarding each on an `mpsc`
//! channel tagged with the connection attempt it belongs to, so the actor
//! can discard events from a superseded attempt. Malformed frames are
//! logged and skipped; they never terminate the loop.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use vision_core::protocol::codec::{decode_frame, encode_request, ProtocolError};
use vision_core::protocol::messages::{InboundFrame, Request};

use crate::error::ClientError;

/// What the read loop reports to the owning actor.
#[derive(Debug)]
pub(crate) enum TransportEvent {
    Frame(InboundFrame),
    /// The connection ended; the loop exits after sending this.
    Closed { reason: String },
}

/// Spawns the read loop for one connection attempt.
pub(crate) fn spawn_read_loop(
    read_half: OwnedReadHalf,
    attempt: u64,
    tx: mpsc::Sender<(u64, TransportEvent)>,
) -> JoinHandle<()> {
    tokio::spawn(read_loop(read_half, attempt, tx))
}

async fn read_loop(
    mut read_half: OwnedReadHalf,
    attempt: u64,
    tx: mpsc::Sender<(u64, TransportEvent)>,
) {
    let mut recv_buf: Vec<u8> = Vec::with_capacity(4096);
    let mut read_tmp = vec![0u8; 4096];

    let reason = loop {
        let n = match read_half.read(&mut read_tmp).await {
            Ok(0) => break "connection closed by device".to_string(),
            Ok(n) => n,
            Err(e) => break format!("read failed: {e}"),
        };
        recv_buf.extend_from_slice(&read_tmp[..n]);

        // Drain every complete frame the buffer now holds.
        loop {
            match decode_frame(&recv_buf) {
                Ok((frame, consumed)) => {
                    recv_buf.drain(..consumed);
                    debug!(attempt, "decoded inbound frame: {frame:?}");
                    if tx.send((attempt, TransportEvent::Frame(frame))).await.is_err() {
                        return;
                    }
                }
                Err(ProtocolError::Incomplete) => break,
                Err(ProtocolError::Malformed { consumed, reason }) => {
                    warn!(attempt, consumed, "dropping malformed frame: {reason}");
                    recv_buf.drain(..consumed.max(1).min(recv_buf.len()));
                }
                Err(e) => {
                    warn!(attempt, "unrecoverable decode state, clearing buffer: {e}");
                    recv_buf.clear();
                    break;
                }
            }
        }
    };

    let _ = tx.send((attempt, TransportEvent::Closed { reason })).await;
}

/// Encodes and writes one request to the device.
///
/// # Errors
///
/// Returns [`ClientError::Protocol`] if encoding fails and
/// [`ClientError::Transport`] if the write does.
pub(crate) async fn send_request(
    writer: &mut OwnedWriteHalf,
    request: &Request,
) -> Result<(), ClientError> {
    let bytes = encode_request(request)?;
    writer.write_all(&bytes).await?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::{TcpListener, TcpStream};

    use vision_core::protocol::messages::{NotificationKind, OpCode};

    async fn connected_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (client, server)
    }

    #[tokio::test]
    async fn test_read_loop_splits_coalesced_frames() {
        let (client, mut server) = connected_pair().await;
        let (read_half, _write_half) = client.into_split();
        let (tx, mut rx) = mpsc::channel(16);
        let _task = spawn_read_loop(read_half, 1, tx);

        // Two frames in one write, the second partially delayed.
        let combined = br#"{"msg_id":257,"seq":1,"rval":0,"param":12345}{"msg_id":7,"type":"SD_rm"#;
        server.write_all(combined).await.unwrap();
        server.write_all(br#""}"#).await.unwrap();

        let (attempt, event) = rx.recv().await.unwrap();
        assert_eq!(attempt, 1);
        match event {
            TransportEvent::Frame(InboundFrame::Response(resp)) => {
                assert_eq!(resp.seq, 1);
                assert_eq!(resp.op(), Some(OpCode::StartSession));
            }
            other => panic!("expected response frame, got {other:?}"),
        }

        let (_, event) = rx.recv().await.unwrap();
        match event {
            TransportEvent::Frame(InboundFrame::Notification(n)) => {
                assert_eq!(n.kind, NotificationKind::SdRemoved);
            }
            other => panic!("expected notification frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_read_loop_skips_malformed_bytes_and_continues() {
        let (client, mut server) = connected_pair().await;
        let (read_half, _write_half) = client.into_split();
        let (tx, mut rx) = mpsc::channel(16);
        let _task = spawn_read_loop(read_half, 1, tx);

        server.write_all(b"garbage").await.unwrap();
        server
            .write_all(br#"{"msg_id":258,"seq":2,"rval":0}"#)
            .await
            .unwrap();

        let (_, event) = rx.recv().await.unwrap();
        match event {
            TransportEvent::Frame(InboundFrame::Response(resp)) => assert_eq!(resp.seq, 2),
            other => panic!("garbage must be skipped, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_read_loop_reports_closure() {
        let (client, server) = connected_pair().await;
        let (read_half, _write_half) = client.into_split();
        let (tx, mut rx) = mpsc::channel(16);
        let _task = spawn_read_loop(read_half, 3, tx);

        drop(server);

        let (attempt, event) = rx.recv().await.unwrap();
        assert_eq!(attempt, 3);
        assert!(matches!(event, TransportEvent::Closed { .. }));
    }

    #[tokio::test]
    async fn test_send_request_writes_one_json_object() {
        let (client, mut server) = connected_pair().await;
        let (_read_half, mut write_half) = client.into_split();

        let mut request = Request::new(OpCode::TakePhoto);
        request.seq = 9;
        request.token = Some(1);
        send_request(&mut write_half, &request).await.unwrap();
        drop(write_half);

        let mut received = Vec::new();
        server.read_to_end(&mut received).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&received).unwrap();
        assert_eq!(value["msg_id"], 769);
        assert_eq!(value["seq"], 9);
    }
}

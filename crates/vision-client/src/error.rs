//! Error taxonomy for client operations.

use thiserror::Error;

use vision_core::protocol::codec::ProtocolError;
use vision_core::protocol::messages::OpCode;

/// Errors surfaced by [`VisionClient`](crate::client::VisionClient)
/// operations.
///
/// Transport- and session-level failures resolve into every pending
/// request; single-operation failures never escalate to tearing down the
/// connection, and nothing here triggers an automatic retry.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The connect attempt received no handshake within the deadline.
    #[error("connection attempt timed out")]
    ConnectionTimeout,

    /// An established connection dropped involuntarily.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// `connect()` called while an attempt is already in progress.
    #[error("a connection attempt is already in progress")]
    AlreadyConnecting,

    /// `connect()` called on an established connection.
    #[error("already connected")]
    AlreadyConnected,

    /// A duplicate concurrent command of a single-in-flight kind.
    #[error("{0:?} is already in flight")]
    OperationInProgress(OpCode),

    /// The device did not answer this request within its deadline.
    #[error("{0:?} timed out waiting for the device")]
    RequestTimeout(OpCode),

    /// The operation requires a connected session.
    #[error("not connected to the device")]
    Disconnected,

    /// The device answered with a nonzero result code.
    #[error("device rejected {op:?} with code {code}")]
    DeviceRejected { op: OpCode, code: i32 },

    /// The device is not reachable on the current network association.
    #[error("device unreachable on the current network")]
    Unreachable,

    /// An I/O error on the transport.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// A frame or payload could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The streaming-playback collaborator reported a failure.
    #[error("stream renderer error: {0}")]
    Renderer(String),

    /// The client's background task is no longer running.
    #[error("client task is no longer running")]
    ClientGone,

    /// The supplied configuration cannot be used.
    #[error("invalid configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_the_operation() {
        let err = ClientError::RequestTimeout(OpCode::TakePhoto);
        assert!(err.to_string().contains("TakePhoto"));

        let err = ClientError::DeviceRejected {
            op: OpCode::FormatSd,
            code: -2,
        };
        assert!(err.to_string().contains("FormatSd"));
        assert!(err.to_string().contains("-2"));
    }

    #[test]
    fn test_protocol_error_converts() {
        let err: ClientError = ProtocolError::Payload("missing url".to_string()).into();
        assert!(matches!(err, ClientError::Protocol(_)));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: ClientError = io.into();
        assert!(matches!(err, ClientError::Transport(_)));
    }
}

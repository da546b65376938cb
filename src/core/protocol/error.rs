use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Debug, Error, Clone)]
pub enum ProtocolError {
    #[error("Crypto operation failed: {source}")]
    Crypto {
        #[from]
        source: CryptoError,
    },

    #[error("Codec error: {source}")]
    Codec {
        #[from]
        source: CodecError,
    },

    #[error("IO error: {0}")]
    Io(String),

    #[error("Handshake failed: {reason}")]
    HandshakeFailed { reason: String },

    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Configuration error: {details}")]
    ConfigError { details: String },

    #[error("Transport error: {details}")]
    Transport { details: String },

    #[error("Internal error: {details}")]
    InternalError { details: String },

    #[error("Connection closed")]
    ConnectionClosed,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Encryption is not armed")]
    NotArmed,

    #[error("Invalid key: {reason}")]
    InvalidKey { reason: String },

    #[error("Key curve mismatch: expected {expected}, got {actual}")]
    CurveMismatch { expected: String, actual: String },

    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("Checksum mismatch on batch #{counter}")]
    ChecksumMismatch { counter: u64 },

    #[error("Batch too short to carry a checksum: {len} bytes")]
    TruncatedBatch { len: usize },

    #[error("Token signing failed: {reason}")]
    SigningFailed { reason: String },

    #[error("Token rejected: {reason}")]
    InvalidToken { reason: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Unexpected end of buffer: needed {needed} more bytes")]
    UnexpectedEof { needed: usize },

    #[error("VarInt is longer than {max_bytes} bytes")]
    VarIntTooLong { max_bytes: usize },

    #[error("Frame length {length} exceeds remaining {remaining} bytes")]
    FrameOverrun { length: usize, remaining: usize },

    #[error("Invalid UTF-8 string field")]
    InvalidString,

    #[error("Unsupported compression method 0x{0:02X}")]
    UnsupportedCompression(u8),

    #[error("Decompression failed: {reason}")]
    Decompression { reason: String },

    #[error("Compression failed: {reason}")]
    Compression { reason: String },

    #[error("Packet id {expected} expected, got {actual}")]
    UnexpectedPacketId { expected: u32, actual: u32 },

    #[error("Malformed packet {id}: {details}")]
    MalformedPacket { id: u32, details: String },
}

impl ProtocolError {
    pub fn log(self) -> Self {
        match &self {
            ProtocolError::HandshakeFailed { reason } => {
                warn!("Handshake failed: {}", reason);
            }
            ProtocolError::Crypto { source } => {
                error!("Crypto error: {}", source);
            }
            ProtocolError::ConnectionClosed => {
                debug!("Connection closed");
            }
            _ => {
                error!("Protocol error: {}", self);
            }
        }
        self
    }

    /// Errors that leave no way to continue the session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProtocolError::HandshakeFailed { .. }
                | ProtocolError::AuthenticationFailed { .. }
                | ProtocolError::Transport { .. }
                | ProtocolError::ConnectionClosed
                | ProtocolError::Crypto {
                    source: CryptoError::InvalidKey { .. }
                        | CryptoError::CurveMismatch { .. }
                        | CryptoError::InvalidToken { .. }
                }
        )
    }
}

impl From<std::io::Error> for ProtocolError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::BrokenPipe => ProtocolError::ConnectionClosed,
            _ => ProtocolError::Io(err.to_string()),
        }
    }
}

impl From<anyhow::Error> for ProtocolError {
    fn from(err: anyhow::Error) -> Self {
        ProtocolError::InternalError {
            details: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CryptoError {
    fn from(err: serde_json::Error) -> Self {
        CryptoError::InvalidToken {
            reason: format!("json: {}", err),
        }
    }
}

impl From<base64::DecodeError> for CryptoError {
    fn from(err: base64::DecodeError) -> Self {
        CryptoError::InvalidToken {
            reason: format!("base64: {}", err),
        }
    }
}

impl From<p384::elliptic_curve::Error> for CryptoError {
    fn from(_: p384::elliptic_curve::Error) -> Self {
        CryptoError::InvalidKey {
            reason: "not a valid secp384r1 key".to_string(),
        }
    }
}

impl From<p384::pkcs8::spki::Error> for CryptoError {
    fn from(err: p384::pkcs8::spki::Error) -> Self {
        CryptoError::InvalidKey {
            reason: format!("SPKI: {}", err),
        }
    }
}

impl From<p384::ecdsa::Error> for CryptoError {
    fn from(err: p384::ecdsa::Error) -> Self {
        CryptoError::InvalidToken {
            reason: format!("signature: {}", err),
        }
    }
}

impl From<ctr::cipher::InvalidLength> for CryptoError {
    fn from(_: ctr::cipher::InvalidLength) -> Self {
        CryptoError::InvalidKeyLength {
            expected: 32,
            actual: 0,
        }
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for ProtocolError {
    fn from(err: tokio::sync::mpsc::error::SendError<T>) -> Self {
        ProtocolError::InternalError {
            details: format!("Channel send error: {}", err),
        }
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for ProtocolError {
    fn from(err: tokio::sync::oneshot::error::RecvError) -> Self {
        ProtocolError::InternalError {
            details: format!("Oneshot receive error: {}", err),
        }
    }
}

impl From<tokio::task::JoinError> for ProtocolError {
    fn from(err: tokio::task::JoinError) -> Self {
        ProtocolError::InternalError {
            details: format!("Task failed: {}", err),
        }
    }
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;

use std::io;

/// Malformed datagrams and requests that cannot be put on the wire.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Datagram truncated: needed {needed} bytes but only {remaining} remain")]
    Truncated { needed: usize, remaining: usize },
    #[error("Unknown status byte {0}")]
    UnknownStatus(u8),
    #[error("Unknown operation tag {0}")]
    UnknownOperation(u8),
    #[error("Field of {0} bytes does not fit a 32-bit length prefix")]
    FieldTooLong(usize),
    #[error("Encoded request is {len} bytes, the datagram limit is {max}")]
    DatagramTooLarge { len: usize, max: usize },
    #[error("File path is not valid UTF-8")]
    InvalidPath,
    #[error("{0} trailing bytes after the last field")]
    TrailingBytes(usize),
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Operation failed. Reached max retries ({attempts})")]
    RetriesExhausted { attempts: u32 },
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Error type for session operations
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Could not resolve host: {0}")]
    Resolve(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("Handshake rejected by server: {0}")]
    HandshakeRejected(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;

use std::io;
use thiserror::Error;

/// Errors raised while encoding, decoding or moving records across a channel.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Serialization error occurred: {0}")]
    SerializationError(String),
    #[error("Not enough bytes for record: expected {expected}, got {actual}")]
    NotEnoughBytes { expected: usize, actual: usize },
    #[error("Cursor error encountered")]
    CursorError,
    #[error("Channel closed by peer")]
    ChannelClosed,
    #[error("Channel I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ProtocolError {
    /// True when a read gave up because of the channel's read timeout, not a failure.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ProtocolError::Io(e)
                if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut
        )
    }
}

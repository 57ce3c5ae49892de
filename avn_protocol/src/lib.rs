use errors::ProtocolError;

pub mod channel;
pub mod errors;
pub mod messages;
pub mod types;

pub trait Serializable {
    fn to_bytes(&self) -> std::result::Result<Vec<u8>, ProtocolError>;

    fn from_bytes(bytes: &[u8]) -> std::result::Result<Self, ProtocolError>
    where
        Self: Sized;
}

/// A message with a fixed wire size.
///
/// Records are written whole in a single write, so `SIZE` must stay well
/// below the channel's atomic write guarantee (`PIPE_BUF`, 4096 bytes on Linux).
pub trait Record: Serializable {
    const SIZE: usize;
}

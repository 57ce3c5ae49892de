use std::io::{self, Read, Write};
use std::marker::PhantomData;
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::time::Duration;

use crate::{errors::ProtocolError, Record};

/// Sending half of a unidirectional record channel.
///
/// Every record goes out in a single `write_all` of exactly `T::SIZE` bytes.
pub struct RecordWriter<T: Record, W: Write = UnixStream> {
    inner: W,
    _record: PhantomData<fn(T)>,
}

impl<T: Record, W: Write> RecordWriter<T, W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            _record: PhantomData,
        }
    }

    pub fn send(&mut self, record: &T) -> Result<(), ProtocolError> {
        let bytes = record.to_bytes()?;
        if bytes.len() != T::SIZE {
            return Err(ProtocolError::SerializationError(format!(
                "record encoded to {} bytes, expected {}",
                bytes.len(),
                T::SIZE
            )));
        }

        self.inner.write_all(&bytes).map_err(|e| match e.kind() {
            io::ErrorKind::BrokenPipe => ProtocolError::ChannelClosed,
            _ => ProtocolError::Io(e),
        })?;
        self.inner.flush()?;

        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Receiving half of a unidirectional record channel.
///
/// Partial reads (for example when a read timeout fires mid-record) are kept
/// and completed by the next call, so the stream never loses alignment.
pub struct RecordReader<T: Record, R: Read = UnixStream> {
    inner: R,
    pending: Vec<u8>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record, R: Read> RecordReader<T, R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pending: Vec::with_capacity(T::SIZE),
            _record: PhantomData,
        }
    }

    pub fn recv(&mut self) -> Result<T, ProtocolError> {
        while self.pending.len() < T::SIZE {
            let mut chunk = vec![0u8; T::SIZE - self.pending.len()];
            match self.inner.read(&mut chunk) {
                Ok(0) => return Err(ProtocolError::ChannelClosed),
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ProtocolError::Io(e)),
            }
        }

        let record = T::from_bytes(&self.pending);
        self.pending.clear();
        record
    }
}

impl<T: Record> RecordReader<T, UnixStream> {
    /// Bounds every `recv` so polling loops can recheck their running flag.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.inner.set_read_timeout(timeout)
    }
}

/// Creates a connected, one-way channel carrying records of type `T`.
pub fn channel<T: Record>() -> io::Result<(RecordWriter<T>, RecordReader<T>)> {
    let (tx, rx) = UnixStream::pair()?;
    tx.shutdown(Shutdown::Read)?;
    rx.shutdown(Shutdown::Write)?;

    Ok((RecordWriter::new(tx), RecordReader::new(rx)))
}

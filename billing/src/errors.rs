use avn_protocol::errors::ProtocolError;
use logger::LoggerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StageError {
    #[error("Channel error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("Logger error: {0}")]
    Logger(#[from] LoggerError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Stage {0} panicked")]
    Panicked(&'static str),
    #[error("Lock poisoned: {0}")]
    LockError(String),
}

/// Outcome of one `recv` inside a stage loop.
pub(crate) enum Received<T> {
    Record(T),
    /// The record could not be decoded and was skipped.
    Skipped,
    Closed,
}

/// Folds a `recv` result into what a stage loop should do next.
///
/// Decode failures are logged and skipped; read failures end the stage.
pub(crate) fn classify<T>(
    result: Result<T, ProtocolError>,
    stage: &str,
    logger: &logger::Logger,
) -> Result<Received<T>, StageError> {
    match result {
        Ok(record) => Ok(Received::Record(record)),
        Err(ProtocolError::ChannelClosed) => Ok(Received::Closed),
        Err(e @ ProtocolError::Io(_)) => Err(e.into()),
        Err(e) => {
            let _ = logger.error(&format!("{}: unreadable record skipped: {}", stage, e));
            Ok(Received::Skipped)
        }
    }
}

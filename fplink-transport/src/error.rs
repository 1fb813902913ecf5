//! Transport errors

use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not connected")]
    NotConnected,

    #[error("Already connected")]
    AlreadyConnected,

    #[error("Read timeout")]
    ReadTimeout,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Check whether the connection itself failed, as opposed to a
    /// timed-out or unusable read
    ///
    /// I/O-level failures warrant a reconnect before the operation is
    /// retried; a bare read timeout does not.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Serial(_) | Self::ConnectionClosed)
    }
}

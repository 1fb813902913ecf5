//! Transport layer for fingerprint sensor modules
//!
//! Both modules correlate requests and replies purely by temporal
//! ordering, so a transport instance must be driven by exactly one
//! operation at a time; serialization is enforced one layer up.

pub mod error;
pub mod mem;
pub mod serial;

pub use error::{Error, Result};
pub use mem::ScriptedTransport;
pub use serial::SerialTransport;

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;

/// Byte transport to a sensor module
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the connection
    async fn connect(&mut self) -> Result<()>;

    /// Close the connection
    async fn disconnect(&mut self) -> Result<()>;

    /// Check if connected
    fn is_connected(&self) -> bool;

    /// Send raw bytes
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Read exactly `len` bytes, waiting at most `timeout`
    ///
    /// An incomplete read within the timeout yields
    /// [`Error::ReadTimeout`]; callers that expect transient underruns
    /// retry under their own operation deadline.
    async fn read_exact(&mut self, len: usize, timeout: Duration) -> Result<BytesMut>;

    /// Discard any buffered input
    async fn flush_input(&mut self) -> Result<()>;

    /// Close and reopen the connection after a short fixed backoff
    async fn reconnect(&mut self) -> Result<()>;

    /// Human-readable endpoint description
    fn descriptor(&self) -> String;
}

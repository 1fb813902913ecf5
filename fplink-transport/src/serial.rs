//! Serial transport
//!
//! Wraps a blocking `serialport` handle. Port operations run on the
//! blocking thread pool so they never stall the async runtime; the
//! port lives behind a mutex because `spawn_blocking` closures must
//! own their captures.

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use parking_lot::Mutex;
use tokio::task;
use tokio::time::sleep;
use tracing::{debug, trace, warn};

use crate::{error::*, Transport};

type Port = Arc<Mutex<Box<dyn serialport::SerialPort>>>;

/// Serial transport for sensor modules
pub struct SerialTransport {
    path: String,
    baud: u32,
    port: Option<Port>,
    reconnect_backoff: Duration,
}

impl SerialTransport {
    /// Create a new serial transport
    pub fn new(path: impl Into<String>, baud: u32) -> Self {
        Self {
            path: path.into(),
            baud,
            port: None,
            reconnect_backoff: Duration::from_secs(1),
        }
    }

    /// Set the pause between closing and reopening on reconnect
    pub fn with_reconnect_backoff(mut self, backoff: Duration) -> Self {
        self.reconnect_backoff = backoff;
        self
    }

    fn port(&self) -> Result<Port> {
        self.port.clone().ok_or(Error::NotConnected)
    }
}

fn join_err(e: task::JoinError) -> Error {
    Error::Io(io::Error::other(e))
}

#[async_trait]
impl Transport for SerialTransport {
    async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Err(Error::AlreadyConnected);
        }

        let path = self.path.clone();
        let baud = self.baud;

        debug!("Opening {} at {} baud...", path, baud);

        let port = task::spawn_blocking(move || {
            serialport::new(path, baud)
                .data_bits(serialport::DataBits::Eight)
                .stop_bits(serialport::StopBits::One)
                .parity(serialport::Parity::None)
                .flow_control(serialport::FlowControl::None)
                .timeout(Duration::from_millis(100))
                .open()
        })
        .await
        .map_err(join_err)??;

        debug!("Opened {}", self.path);

        self.port = Some(Arc::new(Mutex::new(port)));
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if self.port.take().is_some() {
            debug!("Closed {}", self.path);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let port = self.port()?;
        let data = data.to_vec();

        trace!("Sending {} bytes: {}", data.len(), hex::encode(&data[..data.len().min(16)]));

        task::spawn_blocking(move || -> Result<()> {
            let mut guard = port.lock();
            guard.write_all(&data)?;
            guard.flush()?;
            Ok(())
        })
        .await
        .map_err(join_err)?
    }

    async fn read_exact(&mut self, len: usize, timeout: Duration) -> Result<BytesMut> {
        let port = self.port()?;

        let buf = task::spawn_blocking(move || -> Result<Vec<u8>> {
            let mut guard = port.lock();
            guard.set_timeout(timeout)?;

            let mut buf = vec![0u8; len];
            match guard.read_exact(&mut buf) {
                Ok(()) => Ok(buf),
                Err(e) if e.kind() == io::ErrorKind::TimedOut => Err(Error::ReadTimeout),
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    Err(Error::ConnectionClosed)
                }
                Err(e) => Err(Error::Io(e)),
            }
        })
        .await
        .map_err(join_err)??;

        trace!("Received {} bytes: {}", buf.len(), hex::encode(&buf[..buf.len().min(16)]));

        Ok(BytesMut::from(&buf[..]))
    }

    async fn flush_input(&mut self) -> Result<()> {
        let port = self.port()?;

        task::spawn_blocking(move || -> Result<()> {
            port.lock().clear(serialport::ClearBuffer::Input)?;
            Ok(())
        })
        .await
        .map_err(join_err)?
    }

    async fn reconnect(&mut self) -> Result<()> {
        warn!(
            "Reconnecting {} after {:?} backoff",
            self.path, self.reconnect_backoff
        );

        self.disconnect().await?;
        sleep(self.reconnect_backoff).await;
        self.connect().await
    }

    fn descriptor(&self) -> String {
        format!("{}@{}", self.path, self.baud)
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if self.is_connected() {
            warn!("Serial transport dropped while still open");
        }
    }
}

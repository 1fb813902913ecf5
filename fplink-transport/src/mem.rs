//! In-memory transport for driver and coordinator tests
//!
//! Not a mock framework: tests script the exact byte chunks the module
//! would emit, interleaved with fault markers, and afterwards inspect
//! what the host wrote.

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;

use crate::{error::*, Transport};

#[derive(Debug)]
enum Step {
    Data(VecDeque<u8>),
    Timeout,
    IoError,
}

/// Scripted transport
///
/// Reads drain the queued data in order; a queued fault fires once and
/// is consumed. An exhausted script reads as a timeout, which keeps
/// misbehaving tests terminating instead of hanging.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    steps: VecDeque<Step>,
    writes: Vec<Vec<u8>>,
    connected: bool,
    reconnects: usize,
    input_flushes: usize,
}

impl ScriptedTransport {
    /// Create a connected, empty-script transport
    pub fn new() -> Self {
        Self {
            connected: true,
            ..Self::default()
        }
    }

    /// Queue bytes for the host to read
    pub fn push_read(&mut self, data: &[u8]) {
        self.steps.push_back(Step::Data(data.iter().copied().collect()));
    }

    /// Queue a one-shot read timeout
    pub fn push_timeout(&mut self) {
        self.steps.push_back(Step::Timeout);
    }

    /// Queue a one-shot I/O failure
    pub fn push_io_error(&mut self) {
        self.steps.push_back(Step::IoError);
    }

    /// Everything the host has written, one entry per send call
    pub fn writes(&self) -> &[Vec<u8>] {
        &self.writes
    }

    /// Number of reconnect calls observed
    pub fn reconnects(&self) -> usize {
        self.reconnects
    }

    /// Number of input flushes observed
    pub fn input_flushes(&self) -> usize {
        self.input_flushes
    }

    /// Unread bytes remaining in the script
    pub fn remaining(&self) -> usize {
        self.steps
            .iter()
            .map(|step| match step {
                Step::Data(data) => data.len(),
                _ => 0,
            })
            .sum()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn connect(&mut self) -> Result<()> {
        if self.connected {
            return Err(Error::AlreadyConnected);
        }
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        self.writes.push(data.to_vec());
        Ok(())
    }

    async fn read_exact(&mut self, len: usize, _timeout: Duration) -> Result<BytesMut> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        let mut out = BytesMut::with_capacity(len);

        while out.len() < len {
            let is_fault = match self.steps.front_mut() {
                Some(Step::Data(data)) => {
                    let take = (len - out.len()).min(data.len());
                    out.extend(data.drain(..take));
                    false
                }
                Some(Step::Timeout) | Some(Step::IoError) => true,
                None => return Err(Error::ReadTimeout),
            };

            if is_fault {
                return match self.steps.pop_front() {
                    Some(Step::IoError) => Err(Error::Io(io::Error::other("scripted fault"))),
                    _ => Err(Error::ReadTimeout),
                };
            }

            // Drop exhausted chunks so the next step becomes visible
            if matches!(self.steps.front(), Some(Step::Data(data)) if data.is_empty()) {
                self.steps.pop_front();
            }
        }

        Ok(out)
    }

    async fn flush_input(&mut self) -> Result<()> {
        self.input_flushes += 1;
        Ok(())
    }

    async fn reconnect(&mut self) -> Result<()> {
        self.reconnects += 1;
        self.connected = true;
        Ok(())
    }

    fn descriptor(&self) -> String {
        "scripted".to_string()
    }
}

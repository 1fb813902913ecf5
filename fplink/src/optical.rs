//! Optical sensor driver (packet protocol)

use std::time::Duration;

use async_trait::async_trait;
use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;
use tracing::{debug, info, trace, warn};

use fplink_core::{
    opcode::instruction,
    packet::{self, PacketHeader, PacketKind},
    raster, Bitmap, DeviceStatus, ImageAssembler, OPTICAL_HEIGHT, OPTICAL_IMAGE_BYTES,
    OPTICAL_WIDTH,
};
use fplink_transport::{SerialTransport, Transport};

use crate::error::{Error, Result};
use crate::sensor::{EnrollmentMode, Sensor, SlotRange};

/// Library capacity assumed for ranged search
///
/// The optical module assigns pages itself and does not report its
/// capacity over this command set; treat as a configuration constant.
pub const OPTICAL_SLOT_CAPACITY: u16 = 1000;

/// Optical fingerprint sensor
///
/// Speaks the variable-length packet protocol. The template library is
/// page-addressed and device-managed: enrollment captures two samples
/// into the module's char buffers, compares them, combines them into a
/// template and stores it at the next free page.
pub struct OpticalSensor<T: Transport> {
    transport: T,
    read_timeout: Duration,
    image_timeout: Duration,
}

impl OpticalSensor<SerialTransport> {
    /// Default line speed of the optical module
    pub const DEFAULT_BAUD: u32 = 115_200;

    /// Create a sensor on a serial port at the module's default baud
    pub fn on_port(path: impl Into<String>) -> Self {
        Self::new(SerialTransport::new(path, Self::DEFAULT_BAUD))
    }
}

impl<T: Transport> OpticalSensor<T> {
    /// Create a sensor over an arbitrary transport
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            read_timeout: Duration::from_secs(1),
            image_timeout: Duration::from_secs(20),
        }
    }

    /// Set the per-packet reply timeout
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the image transfer timeout
    pub fn with_image_timeout(mut self, timeout: Duration) -> Self {
        self.image_timeout = timeout;
        self
    }

    /// Underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// One instruction/ack exchange, with a single reconnect-and-retry
    /// on transport-level I/O failure
    async fn command(&mut self, op: &'static str, payload: &[u8]) -> Result<(DeviceStatus, Bytes)> {
        match self.try_command(op, payload).await {
            Err(e) if e.requires_reconnect() => {
                warn!(op, error = %e, "transport failure, reconnecting");
                self.transport.reconnect().await?;
                self.try_command(op, payload).await
            }
            other => other,
        }
    }

    async fn try_command(&mut self, op: &'static str, payload: &[u8]) -> Result<(DeviceStatus, Bytes)> {
        self.transport.send(&packet::build_command(payload)).await?;

        let (kind, body) = self.read_packet().await?;

        if kind != PacketKind::Ack {
            return Err(Error::UnexpectedReply(format!(
                "expected ack, got {kind:?} packet"
            )));
        }
        if body.is_empty() {
            return Err(Error::UnexpectedReply("empty ack".into()));
        }

        let status = DeviceStatus::from_confirm_code(body[0]);
        trace!(op, ?status, "ack received");

        Ok((status, body.slice(1..)))
    }

    /// Exchange and require a success status
    async fn command_ok(&mut self, op: &'static str, payload: &[u8]) -> Result<Bytes> {
        match self.command(op, payload).await? {
            (DeviceStatus::Ok, body) => Ok(body),
            (status, _) => Err(Error::Device { op, status }),
        }
    }

    /// Read one packet: header, payload, discarded checksum
    async fn read_packet(&mut self) -> Result<(PacketKind, Bytes)> {
        let header_buf = self
            .transport
            .read_exact(packet::HEADER_LEN, self.read_timeout)
            .await?;
        let header = PacketHeader::parse(&header_buf)?;

        let payload = self
            .transport
            .read_exact(header.payload_len(), self.read_timeout)
            .await?;

        // Checksum algorithm is sensor-internal; consume and discard
        self.transport
            .read_exact(packet::CHECKSUM_LEN, self.read_timeout)
            .await?;

        Ok((header.kind, payload.freeze()))
    }

    /// Accumulate a streamed image
    ///
    /// Header underruns are transient and retried; the loop is bounded
    /// by the caller's transfer timeout, not an internal counter.
    async fn read_image(&mut self, total: usize) -> Result<Bytes> {
        let mut assembler = ImageAssembler::new(total);

        loop {
            let header_buf = match self
                .transport
                .read_exact(packet::HEADER_LEN, self.read_timeout)
                .await
            {
                Ok(buf) => buf,
                Err(fplink_transport::Error::ReadTimeout) => {
                    trace!("header underrun, retrying");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let header = PacketHeader::parse(&header_buf)?;

            let payload = self
                .transport
                .read_exact(header.payload_len(), self.read_timeout)
                .await?;
            self.transport
                .read_exact(packet::CHECKSUM_LEN, self.read_timeout)
                .await?;

            if assembler.accept(header.kind, &payload) {
                break;
            }
        }

        Ok(assembler.finish())
    }

    /// Next free library page, resolved from the stored template count
    async fn next_free_page(&mut self) -> Result<u16> {
        let body = self.command_ok("template_count", &[instruction::TEMPLATE_COUNT]).await?;

        if body.len() < 2 {
            return Err(Error::UnexpectedReply("short template count".into()));
        }

        Ok(BigEndian::read_u16(&body[..2]))
    }
}

#[async_trait]
impl<T: Transport> Sensor for OpticalSensor<T> {
    async fn connect(&mut self) -> Result<()> {
        self.transport.connect().await?;
        info!("Connected to optical sensor on {}", self.transport.descriptor());
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.transport.disconnect().await?;
        Ok(())
    }

    fn enrollment_mode(&self) -> EnrollmentMode {
        EnrollmentMode::CompareTwo
    }

    fn slot_range(&self) -> SlotRange {
        SlotRange::new(0, OPTICAL_SLOT_CAPACITY - 1)
    }

    async fn detect_presence(&mut self) -> Result<bool> {
        // The capture instruction doubles as the presence poll: it
        // fails distinctly when no finger is on the window
        let (status, _) = self.command("gen_img", &[instruction::GEN_IMG]).await?;

        match status {
            DeviceStatus::Ok => Ok(true),
            DeviceStatus::NotDetected => Ok(false),
            status => Err(Error::Device { op: "gen_img", status }),
        }
    }

    async fn capture_image(&mut self) -> Result<Option<Bitmap>> {
        let (status, _) = self.command("gen_img", &[instruction::GEN_IMG]).await?;

        match status {
            DeviceStatus::Ok => {}
            DeviceStatus::NotDetected => return Ok(None),
            status => return Err(Error::Device { op: "gen_img", status }),
        }

        self.command_ok("up_image", &[instruction::UP_IMAGE]).await?;

        debug!("receiving image stream");

        let data = tokio::time::timeout(self.image_timeout, self.read_image(OPTICAL_IMAGE_BYTES))
            .await
            .map_err(|_| Error::Transport(fplink_transport::Error::ReadTimeout))??;

        debug!(bytes = data.len(), "image transfer complete");

        Ok(Some(raster::decode_packed(
            &data,
            OPTICAL_WIDTH,
            OPTICAL_HEIGHT,
        )))
    }

    async fn extract_features(&mut self, sample: u8) -> Result<()> {
        // Char buffers are one-based
        self.command_ok("img_2_tz", &[instruction::IMG_2_TZ, sample + 1])
            .await?;
        Ok(())
    }

    async fn compare_features(&mut self) -> Result<bool> {
        let (status, body) = self.command("match", &[instruction::MATCH]).await?;

        match status {
            DeviceStatus::Ok => {
                let score = if body.len() >= 2 {
                    BigEndian::read_u16(&body[..2])
                } else {
                    0
                };
                debug!(score, "buffers compared");
                Ok(score > 0)
            }
            DeviceStatus::NoMatch => Ok(false),
            status => Err(Error::Device { op: "match", status }),
        }
    }

    async fn store_template(&mut self, slot: Option<u16>) -> Result<u16> {
        self.command_ok("reg_model", &[instruction::REG_MODEL]).await?;

        let page = match slot {
            Some(page) => page,
            None => self.next_free_page().await?,
        };

        let mut payload = vec![instruction::STORE, 0x01];
        payload.extend_from_slice(&page.to_be_bytes());
        self.command_ok("store", &payload).await?;

        info!(page, "template stored");
        Ok(page)
    }

    async fn search_template(&mut self, range: SlotRange) -> Result<Option<u16>> {
        let mut payload = vec![instruction::SEARCH, 0x01];
        payload.extend_from_slice(&range.start.to_be_bytes());
        payload.extend_from_slice(&range.len().to_be_bytes());

        let (status, body) = self.command("search", &payload).await?;

        match status {
            DeviceStatus::Ok => {
                if body.len() < 2 {
                    return Err(Error::UnexpectedReply("short search reply".into()));
                }
                let page = BigEndian::read_u16(&body[..2]);
                info!(page, "search matched");
                Ok(Some(page))
            }
            DeviceStatus::NoMatch => {
                debug!("search found no match");
                Ok(None)
            }
            status => Err(Error::Device { op: "search", status }),
        }
    }

    async fn delete_template(&mut self, slot: u16) -> Result<()> {
        let mut payload = vec![instruction::DELETE_CHAR];
        payload.extend_from_slice(&slot.to_be_bytes());
        payload.extend_from_slice(&1u16.to_be_bytes());

        self.command_ok("delete_char", &payload).await?;

        info!(slot, "template deleted");
        Ok(())
    }

    async fn resync(&mut self) -> Result<()> {
        self.transport.flush_input().await?;
        Ok(())
    }
}

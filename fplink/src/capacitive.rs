//! Capacitive sensor driver (frame protocol)

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, trace, warn};

use fplink_core::{
    chunk,
    frame::{CommandFrame, Reply, ResponseFrame},
    raster, Bitmap, DeviceStatus, Opcode, CAPACITIVE_HEIGHT, CAPACITIVE_WIDTH, MAX_SLOT, MIN_SLOT,
};
use fplink_transport::{SerialTransport, Transport};

use crate::error::{Error, Result};
use crate::sensor::{EnrollmentMode, Sensor, SlotRange};

/// Bytes of header preceding the occupancy bitmap in the enumeration
/// data block
const ID_LIST_HEADER: usize = 10;

/// Occupancy bitmap length: one bit per slot through [`MAX_SLOT`]
const ID_BITMAP_LEN: usize = MAX_SLOT as usize / 8 + 1;

/// Capacitive fingerprint sensor
///
/// Speaks the fixed 26-byte frame protocol. Templates live in an
/// explicitly managed slot space (1..=3000): enrollment allocates a
/// free slot up front, merges three samples on-device and stores the
/// canonical template at that slot.
pub struct CapacitiveSensor<T: Transport> {
    transport: T,
    read_timeout: Duration,
    image_timeout: Duration,
}

impl CapacitiveSensor<SerialTransport> {
    /// Default line speed of the capacitive module
    pub const DEFAULT_BAUD: u32 = 460_800;

    /// Create a sensor on a serial port at the module's default baud
    pub fn on_port(path: impl Into<String>) -> Self {
        Self::new(SerialTransport::new(path, Self::DEFAULT_BAUD))
    }
}

impl<T: Transport> CapacitiveSensor<T> {
    /// Create a sensor over an arbitrary transport
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            read_timeout: Duration::from_secs(2),
            image_timeout: Duration::from_secs(15),
        }
    }

    /// Set the per-frame reply timeout
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the bulk image transfer timeout
    pub fn with_image_timeout(mut self, timeout: Duration) -> Self {
        self.image_timeout = timeout;
        self
    }

    /// Underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// One command/reply exchange, with a single reconnect-and-retry on
    /// transport-level I/O failure
    async fn exchange(&mut self, op: &'static str, command: CommandFrame) -> Result<ResponseFrame> {
        match self.try_exchange(op, &command).await {
            Err(e) if e.requires_reconnect() => {
                warn!(op, error = %e, "transport failure, reconnecting");
                self.transport.reconnect().await?;
                self.try_exchange(op, &command).await
            }
            other => other,
        }
    }

    async fn try_exchange(&mut self, op: &'static str, command: &CommandFrame) -> Result<ResponseFrame> {
        trace!(op, "sending {:?}", command);

        self.transport.send(&command.encode()).await?;

        let buf = self
            .transport
            .read_exact(fplink_core::frame::FRAME_LEN, self.read_timeout)
            .await?;

        match ResponseFrame::decode(&buf)? {
            Reply::NoDevice => Err(Error::NoDevice),
            Reply::Frame(response) => {
                trace!(op, "received {:?}", response);

                if response.opcode != command.opcode {
                    return Err(Error::UnexpectedReply(format!(
                        "sent {}, got reply for {}",
                        command.opcode, response.opcode
                    )));
                }

                Ok(response)
            }
        }
    }

    /// Exchange and require a success status
    async fn exchange_ok(&mut self, op: &'static str, command: CommandFrame) -> Result<ResponseFrame> {
        let response = self.exchange(op, command).await?;

        match response.status() {
            DeviceStatus::Ok => Ok(response),
            status => Err(Error::Device { op, status }),
        }
    }
}

/// Little-endian slot range payload: start, end
fn range_payload(range: SlotRange) -> Vec<u8> {
    let mut payload = Vec::with_capacity(4);
    payload.extend_from_slice(&range.start.to_le_bytes());
    payload.extend_from_slice(&range.end.to_le_bytes());
    payload
}

#[async_trait]
impl<T: Transport> Sensor for CapacitiveSensor<T> {
    async fn connect(&mut self) -> Result<()> {
        self.transport.connect().await?;
        info!("Connected to capacitive sensor on {}", self.transport.descriptor());
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.transport.disconnect().await?;
        Ok(())
    }

    fn enrollment_mode(&self) -> EnrollmentMode {
        EnrollmentMode::MergeThree
    }

    fn slot_range(&self) -> SlotRange {
        SlotRange::new(MIN_SLOT, MAX_SLOT)
    }

    async fn detect_presence(&mut self) -> Result<bool> {
        let response = self
            .exchange_ok("finger_detect", CommandFrame::new(Opcode::FingerDetect))
            .await?;

        // First payload byte is the raw presence bit. The firmware
        // reports the pad clear once a finger is seated well enough to
        // image; the debounce loop is written against that behavior.
        Ok(response.payload()[0] != 0)
    }

    async fn capture_image(&mut self) -> Result<Option<Bitmap>> {
        let response = self
            .exchange("get_image", CommandFrame::new(Opcode::GetImage))
            .await?;

        match response.status() {
            DeviceStatus::Ok => {}
            DeviceStatus::NotDetected => return Ok(None),
            status => return Err(Error::Device { op: "get_image", status }),
        }

        debug!("requesting image upload");

        // The upload reply is not a frame: the module streams a fixed
        // number of bytes with pixel data interleaved with framing.
        let command = CommandFrame::with_payload(Opcode::UploadImage, vec![0x00])?;
        self.transport.send(&command.encode()).await?;

        let stream = self
            .transport
            .read_exact(chunk::STREAM_LEN, self.image_timeout)
            .await?;

        let pixels = chunk::extract_pixels(&stream)?;

        debug!(bytes = pixels.len(), "image upload complete");

        Ok(Some(raster::decode_direct(
            &pixels,
            CAPACITIVE_WIDTH,
            CAPACITIVE_HEIGHT,
        )))
    }

    async fn extract_features(&mut self, sample: u8) -> Result<()> {
        let command =
            CommandFrame::with_payload(Opcode::Generate, (sample as u16).to_le_bytes().to_vec())?;
        self.exchange_ok("generate", command).await?;
        Ok(())
    }

    async fn merge_features(&mut self) -> Result<()> {
        // Merge RAM buffers 0..3 into buffer 0
        let command = CommandFrame::with_payload(Opcode::Merge, vec![0x00, 0x00, 0x03])?;
        self.exchange_ok("merge", command).await?;
        Ok(())
    }

    async fn allocate_slot(&mut self) -> Result<u16> {
        let command =
            CommandFrame::with_payload(Opcode::GetEmptyId, range_payload(self.slot_range()))?;
        let response = self.exchange_ok("get_empty_id", command).await?;

        let slot = response.payload_u16();
        debug!(slot, "allocated empty slot");
        Ok(slot)
    }

    async fn store_template(&mut self, slot: Option<u16>) -> Result<u16> {
        let slot = slot.ok_or(Error::NotSupported("store without an explicit slot"))?;

        // Slot followed by source RAM buffer 0
        let mut payload = Vec::with_capacity(4);
        payload.extend_from_slice(&slot.to_le_bytes());
        payload.extend_from_slice(&0u16.to_le_bytes());

        let command = CommandFrame::with_payload(Opcode::StoreChar, payload)?;
        self.exchange_ok("store_char", command).await?;

        info!(slot, "template stored");
        Ok(slot)
    }

    async fn search_template(&mut self, range: SlotRange) -> Result<Option<u16>> {
        // RAM buffer 0, then the slot range
        let mut payload = Vec::with_capacity(6);
        payload.extend_from_slice(&0u16.to_le_bytes());
        payload.extend_from_slice(&range_payload(range));

        let command = CommandFrame::with_payload(Opcode::Search, payload)?;
        let response = self.exchange("search", command).await?;

        match response.status() {
            DeviceStatus::Ok => {
                let slot = response.payload_u16();
                info!(slot, "search matched");
                Ok(Some(slot))
            }
            // The module reports an unmatched search as a generic
            // failure; there is no dedicated no-match code
            DeviceStatus::Failure | DeviceStatus::NoMatch => {
                debug!("search found no match");
                Ok(None)
            }
            status => Err(Error::Device { op: "search", status }),
        }
    }

    async fn delete_template(&mut self, slot: u16) -> Result<()> {
        // Start and end of the deletion range are the same slot
        let mut payload = Vec::with_capacity(4);
        payload.extend_from_slice(&slot.to_le_bytes());
        payload.extend_from_slice(&slot.to_le_bytes());

        let command = CommandFrame::with_payload(Opcode::DeleteChar, payload)?;
        self.exchange_ok("del_char", command).await?;

        info!(slot, "template deleted");
        Ok(())
    }

    async fn enumerate_slots(&mut self) -> Result<Vec<u16>> {
        self.exchange_ok("enrolled_id_list", CommandFrame::new(Opcode::EnrolledIdList))
            .await?;

        // The bitmap follows the ack in a separate data block
        let block = self
            .transport
            .read_exact(ID_LIST_HEADER + ID_BITMAP_LEN, self.read_timeout)
            .await?;

        let range = self.slot_range();
        let mut slots = Vec::new();

        for (index, &byte) in block[ID_LIST_HEADER..].iter().enumerate() {
            for bit in 0..8 {
                if byte & (1 << bit) != 0 {
                    let slot = (index * 8 + bit) as u16;
                    if range.contains(slot) {
                        slots.push(slot);
                    }
                }
            }
        }

        debug!(count = slots.len(), "enumerated occupied slots");
        Ok(slots)
    }

    async fn enrolled_count(&mut self) -> Result<u16> {
        let command =
            CommandFrame::with_payload(Opcode::EnrolledCount, range_payload(self.slot_range()))?;
        let response = self.exchange_ok("enrolled_count", command).await?;

        Ok(response.payload_u16())
    }

    async fn resync(&mut self) -> Result<()> {
        self.transport.flush_input().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fplink_transport::ScriptedTransport;

    fn sensor_with(script: impl FnOnce(&mut ScriptedTransport)) -> CapacitiveSensor<ScriptedTransport> {
        let mut transport = ScriptedTransport::new();
        script(&mut transport);
        CapacitiveSensor::new(transport)
    }

    fn reply(opcode: Opcode, code: u16, payload: &[u8]) -> Vec<u8> {
        ResponseFrame::encode(opcode, code, payload).unwrap().to_vec()
    }

    fn sent_command(sensor: &CapacitiveSensor<ScriptedTransport>, index: usize) -> CommandFrame {
        CommandFrame::decode(&sensor.transport().writes()[index]).unwrap()
    }

    #[tokio::test]
    async fn test_detect_presence() {
        let mut sensor = sensor_with(|t| {
            t.push_read(&reply(Opcode::FingerDetect, 0x00, &[0x01]));
            t.push_read(&reply(Opcode::FingerDetect, 0x00, &[0x00]));
        });

        assert!(sensor.detect_presence().await.unwrap());
        assert!(!sensor.detect_presence().await.unwrap());

        let command = sent_command(&sensor, 0);
        assert_eq!(command.opcode, Opcode::FingerDetect);
        assert!(command.payload().is_empty());
    }

    #[tokio::test]
    async fn test_detect_presence_device_failure() {
        let mut sensor = sensor_with(|t| {
            t.push_read(&reply(Opcode::FingerDetect, 0x01, &[]));
        });

        let result = sensor.detect_presence().await;
        assert!(matches!(
            result,
            Err(Error::Device { op: "finger_detect", status: DeviceStatus::Failure })
        ));
    }

    #[tokio::test]
    async fn test_no_device_sentinel() {
        let mut frame = vec![0u8; fplink_core::frame::FRAME_LEN];
        frame[0] = 0xAA;
        frame[1] = 0x55;
        frame[4] = fplink_core::frame::NO_DEVICE_OPCODE;

        let mut sensor = sensor_with(|t| t.push_read(&frame));

        assert!(matches!(sensor.detect_presence().await, Err(Error::NoDevice)));
    }

    #[tokio::test]
    async fn test_corrupt_reply_is_corrupt_frame() {
        let mut corrupted = reply(Opcode::FingerDetect, 0x00, &[0x01]);
        corrupted[25] ^= 0xFF;

        let mut sensor = sensor_with(|t| t.push_read(&corrupted));

        let error = sensor.detect_presence().await.unwrap_err();
        assert!(error.is_corrupt_frame());
    }

    #[tokio::test]
    async fn test_store_template_wire_format() {
        let mut sensor = sensor_with(|t| {
            t.push_read(&reply(Opcode::StoreChar, 0x00, &[]));
        });

        let slot = sensor.store_template(Some(0x0102)).await.unwrap();
        assert_eq!(slot, 0x0102);

        let command = sent_command(&sensor, 0);
        assert_eq!(command.opcode, Opcode::StoreChar);
        assert_eq!(command.payload(), &[0x02, 0x01, 0x00, 0x00]);
    }

    #[tokio::test]
    async fn test_store_template_requires_slot() {
        let mut sensor = sensor_with(|_| {});
        assert!(matches!(
            sensor.store_template(None).await,
            Err(Error::NotSupported(_))
        ));
    }

    #[tokio::test]
    async fn test_search_found() {
        let mut sensor = sensor_with(|t| {
            t.push_read(&reply(Opcode::Search, 0x00, &[0x2A, 0x00]));
        });

        let hit = sensor.search_template(SlotRange::new(1, 3000)).await.unwrap();
        assert_eq!(hit, Some(42));

        let command = sent_command(&sensor, 0);
        assert_eq!(command.opcode, Opcode::Search);
        assert_eq!(command.payload(), &[0x00, 0x00, 0x01, 0x00, 0xB8, 0x0B]);
    }

    #[tokio::test]
    async fn test_search_not_found() {
        let mut sensor = sensor_with(|t| {
            t.push_read(&reply(Opcode::Search, 0x01, &[]));
        });

        let hit = sensor.search_template(SlotRange::new(1, 3000)).await.unwrap();
        assert_eq!(hit, None);
    }

    #[tokio::test]
    async fn test_delete_wire_format() {
        let mut sensor = sensor_with(|t| {
            t.push_read(&reply(Opcode::DeleteChar, 0x00, &[]));
        });

        sensor.delete_template(7).await.unwrap();

        let command = sent_command(&sensor, 0);
        assert_eq!(command.payload(), &[0x07, 0x00, 0x07, 0x00]);
    }

    #[tokio::test]
    async fn test_delete_empty_slot() {
        let mut sensor = sensor_with(|t| {
            t.push_read(&reply(Opcode::DeleteChar, 0x12, &[]));
        });

        assert!(matches!(
            sensor.delete_template(7).await,
            Err(Error::Device { status: DeviceStatus::TemplateEmpty, .. })
        ));
    }

    #[tokio::test]
    async fn test_allocate_slot() {
        let mut sensor = sensor_with(|t| {
            t.push_read(&reply(Opcode::GetEmptyId, 0x00, &[0x11, 0x00]));
        });

        assert_eq!(sensor.allocate_slot().await.unwrap(), 17);

        let command = sent_command(&sensor, 0);
        assert_eq!(command.payload(), &[0x01, 0x00, 0xB8, 0x0B]);
    }

    #[tokio::test]
    async fn test_enrolled_count() {
        let mut sensor = sensor_with(|t| {
            t.push_read(&reply(Opcode::EnrolledCount, 0x00, &[0x05, 0x00]));
        });

        assert_eq!(sensor.enrolled_count().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_enumerate_slots() {
        let mut block = vec![0u8; ID_LIST_HEADER + ID_BITMAP_LEN];
        block[ID_LIST_HEADER] = 0b0000_0011; // slots 0 and 1; slot 0 is out of range
        block[ID_LIST_HEADER + 1] = 0b0000_0010; // slot 9
        block[ID_LIST_HEADER + 375] = 0b0000_0001; // slot 3000

        let mut sensor = sensor_with(|t| {
            t.push_read(&reply(Opcode::EnrolledIdList, 0x00, &[]));
            t.push_read(&block);
        });

        let slots = sensor.enumerate_slots().await.unwrap();
        assert_eq!(slots, vec![1, 9, 3000]);
    }

    #[tokio::test]
    async fn test_capture_image_absent() {
        let mut sensor = sensor_with(|t| {
            t.push_read(&reply(Opcode::GetImage, 0x28, &[]));
        });

        assert_eq!(sensor.capture_image().await.unwrap(), None);
        // No upload command after a failed acquire
        assert_eq!(sensor.transport().writes().len(), 1);
    }

    #[tokio::test]
    async fn test_capture_image_full_stream() {
        let mut sensor = sensor_with(|t| {
            t.push_read(&reply(Opcode::GetImage, 0x00, &[]));
            t.push_read(&vec![0x55u8; chunk::STREAM_LEN]);
        });

        let bitmap = sensor.capture_image().await.unwrap().unwrap();
        assert_eq!(bitmap.width(), CAPACITIVE_WIDTH);
        assert_eq!(bitmap.height(), CAPACITIVE_HEIGHT);
        assert_eq!(bitmap.pixels()[0], 0x55);
        // The stream yields slightly fewer bytes than pixels; the tail
        // is zero-filled
        assert_eq!(*bitmap.pixels().last().unwrap(), 0x00);

        let upload = sent_command(&sensor, 1);
        assert_eq!(upload.opcode, Opcode::UploadImage);
        assert_eq!(upload.payload(), &[0x00]);
    }

    #[tokio::test]
    async fn test_io_error_reconnects_and_retries() {
        let mut sensor = sensor_with(|t| {
            t.push_io_error();
            t.push_read(&reply(Opcode::FingerDetect, 0x00, &[0x01]));
        });

        assert!(sensor.detect_presence().await.unwrap());
        assert_eq!(sensor.transport().reconnects(), 1);
        // The command went out twice
        assert_eq!(sensor.transport().writes().len(), 2);
    }

    #[tokio::test]
    async fn test_read_timeout_does_not_reconnect() {
        let mut sensor = sensor_with(|t| t.push_timeout());

        let result = sensor.detect_presence().await;
        assert!(matches!(
            result,
            Err(Error::Transport(fplink_transport::Error::ReadTimeout))
        ));
        assert_eq!(sensor.transport().reconnects(), 0);
    }
}

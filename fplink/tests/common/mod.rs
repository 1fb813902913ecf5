//! Scripted fakes shared by the coordinator tests
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use fplink::{
    Bitmap, DeviceStatus, EnrollmentMode, Error, IdentityStore, Result, Sensor, SlotRange,
    StoreError, TemplateRecord, WorkflowEvents,
};

pub fn test_bitmap() -> Bitmap {
    fplink_core::raster::decode_direct(&[0x10, 0x20, 0x30, 0x40], 2, 2)
}

/// Shared scripted state; tests keep a clone of the `Arc` so they can
/// inspect the call log after a workflow consumed the sensor
#[derive(Default)]
pub struct FakeState {
    pub polls: VecDeque<bool>,
    pub constant_poll: Option<bool>,
    pub captures: VecDeque<Option<Bitmap>>,
    pub compare_result: bool,
    pub search_result: Option<u16>,
    pub empty_slot: u16,
    pub assigned_slot: u16,
    pub fail_delete: bool,
    pub calls: Vec<String>,
}

impl FakeState {
    /// Queue one clean press cycle: clear pad, press, settle
    pub fn push_press_cycle(&mut self) {
        self.polls.extend([false, true, false]);
    }

    pub fn push_capture(&mut self) {
        self.captures.push_back(Some(test_bitmap()));
    }

    pub fn count_calls(&self, name: &str) -> usize {
        self.calls.iter().filter(|call| call.as_str() == name).count()
    }
}

pub struct FakeSensor {
    mode: EnrollmentMode,
    pub state: Arc<Mutex<FakeState>>,
}

impl FakeSensor {
    pub fn new(mode: EnrollmentMode) -> (Self, Arc<Mutex<FakeState>>) {
        let state = Arc::new(Mutex::new(FakeState {
            compare_result: true,
            empty_slot: 17,
            assigned_slot: 5,
            ..FakeState::default()
        }));

        (
            Self {
                mode,
                state: Arc::clone(&state),
            },
            state,
        )
    }

    pub fn merge_variant() -> (Self, Arc<Mutex<FakeState>>) {
        Self::new(EnrollmentMode::MergeThree)
    }

    pub fn compare_variant() -> (Self, Arc<Mutex<FakeState>>) {
        Self::new(EnrollmentMode::CompareTwo)
    }
}

#[async_trait]
impl Sensor for FakeSensor {
    async fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        Ok(())
    }

    fn enrollment_mode(&self) -> EnrollmentMode {
        self.mode
    }

    fn slot_range(&self) -> SlotRange {
        SlotRange::new(1, 3000)
    }

    async fn detect_presence(&mut self) -> Result<bool> {
        let mut state = self.state.lock();
        state.calls.push("detect".into());

        if let Some(constant) = state.constant_poll {
            return Ok(constant);
        }

        // An exhausted script fails loudly instead of spinning forever
        state.polls.pop_front().ok_or(Error::Device {
            op: "finger_detect",
            status: DeviceStatus::Failure,
        })
    }

    async fn capture_image(&mut self) -> Result<Option<Bitmap>> {
        let mut state = self.state.lock();
        state.calls.push("capture".into());
        Ok(state.captures.pop_front().flatten())
    }

    async fn extract_features(&mut self, sample: u8) -> Result<()> {
        self.state.lock().calls.push(format!("extract:{sample}"));
        Ok(())
    }

    async fn merge_features(&mut self) -> Result<()> {
        self.state.lock().calls.push("merge".into());
        Ok(())
    }

    async fn compare_features(&mut self) -> Result<bool> {
        let mut state = self.state.lock();
        state.calls.push("compare".into());
        Ok(state.compare_result)
    }

    async fn allocate_slot(&mut self) -> Result<u16> {
        let mut state = self.state.lock();
        state.calls.push("allocate".into());
        Ok(state.empty_slot)
    }

    async fn store_template(&mut self, slot: Option<u16>) -> Result<u16> {
        let mut state = self.state.lock();
        let used = slot.unwrap_or(state.assigned_slot);
        state.calls.push(format!("store:{used}"));
        Ok(used)
    }

    async fn search_template(&mut self, _range: SlotRange) -> Result<Option<u16>> {
        let mut state = self.state.lock();
        state.calls.push("search".into());
        Ok(state.search_result)
    }

    async fn delete_template(&mut self, slot: u16) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(format!("delete:{slot}"));

        if state.fail_delete {
            return Err(Error::Device {
                op: "del_char",
                status: DeviceStatus::Failure,
            });
        }
        Ok(())
    }

    async fn resync(&mut self) -> Result<()> {
        self.state.lock().calls.push("resync".into());
        Ok(())
    }
}

/// Progress collector
#[derive(Default)]
pub struct CollectingEvents {
    pub messages: Mutex<Vec<String>>,
}

impl WorkflowEvents for CollectingEvents {
    fn progress(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}

/// Store whose inserts always fail
pub struct FailingStore;

#[async_trait]
impl IdentityStore for FailingStore {
    async fn insert(&self, _record: TemplateRecord) -> std::result::Result<(), StoreError> {
        Err(StoreError::Backend("write refused".into()))
    }

    async fn remove_by_slot(&self, slot: u16) -> std::result::Result<(), StoreError> {
        Err(StoreError::NotFound(format!("slot {slot}")))
    }

    async fn remove_by_label(&self, label: &str) -> std::result::Result<(), StoreError> {
        Err(StoreError::NotFound(format!("label {label}")))
    }

    async fn get(&self, _slot: u16) -> std::result::Result<Option<TemplateRecord>, StoreError> {
        Ok(None)
    }

    async fn list(&self) -> std::result::Result<Vec<TemplateRecord>, StoreError> {
        Ok(Vec::new())
    }
}

//! Identity store collaborator
//!
//! The persistent identity index lives outside this crate; workflows
//! talk to it through [`IdentityStore`]. [`MemoryStore`] is the
//! reference implementation used by tests and demos.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use fplink_types::TemplateRecord;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Identity store failures
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Slot uniqueness violated
    #[error("slot {0} already has a record")]
    DuplicateSlot(u16),

    /// No record matched the key
    #[error("no record for {0}")]
    NotFound(String),

    /// Backend-specific failure
    #[error("backend failure: {0}")]
    Backend(String),
}

/// Mapping from template slot to identity label
///
/// Implementations must enforce slot uniqueness: inserting a record for
/// an occupied slot is rejected, not overwritten.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Insert a record; fails on a duplicate slot
    async fn insert(&self, record: TemplateRecord) -> StoreResult<()>;

    /// Remove the record for a slot
    async fn remove_by_slot(&self, slot: u16) -> StoreResult<()>;

    /// Remove every record carrying a label
    async fn remove_by_label(&self, label: &str) -> StoreResult<()>;

    /// Look up the record for a slot
    async fn get(&self, slot: u16) -> StoreResult<Option<TemplateRecord>>;

    /// All records, ordered by slot
    async fn list(&self) -> StoreResult<Vec<TemplateRecord>>;
}

/// In-memory identity store
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<u16, TemplateRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn insert(&self, record: TemplateRecord) -> StoreResult<()> {
        let mut records = self.records.lock();

        if records.contains_key(&record.slot) {
            return Err(StoreError::DuplicateSlot(record.slot));
        }

        records.insert(record.slot, record);
        Ok(())
    }

    async fn remove_by_slot(&self, slot: u16) -> StoreResult<()> {
        self.records
            .lock()
            .remove(&slot)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("slot {slot}")))
    }

    async fn remove_by_label(&self, label: &str) -> StoreResult<()> {
        let mut records = self.records.lock();

        let slots: Vec<u16> = records
            .iter()
            .filter(|(_, record)| record.label == label)
            .map(|(&slot, _)| slot)
            .collect();

        if slots.is_empty() {
            return Err(StoreError::NotFound(format!("label {label}")));
        }

        for slot in slots {
            records.remove(&slot);
        }
        Ok(())
    }

    async fn get(&self, slot: u16) -> StoreResult<Option<TemplateRecord>> {
        Ok(self.records.lock().get(&slot).cloned())
    }

    async fn list(&self) -> StoreResult<Vec<TemplateRecord>> {
        Ok(self.records.lock().values().cloned().collect())
    }
}

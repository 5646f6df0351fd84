//! In-memory store for tests and embedded use.

use crate::counter::UsageCounter;
use crate::error::{StoreError, StoreResult};
use crate::record::InstalledLicenseRecord;
use crate::store::{LicenseStore, UsageStore};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// A thread-safe in-memory implementation of both store traits.
///
/// Each license's counter sits behind its own mutex, so concurrent
/// metered actions for different licenses proceed in parallel while
/// check-and-increment for one license is serialized. The counter map
/// lock is held only long enough to clone the per-license handle.
#[derive(Default)]
pub struct MemoryStore {
    licenses: Mutex<Vec<InstalledLicenseRecord>>,
    counters: Mutex<HashMap<Uuid, Arc<Mutex<UsageCounter>>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn counter_handle(
        &self,
        license_id: Uuid,
        today: NaiveDate,
    ) -> StoreResult<Arc<Mutex<UsageCounter>>> {
        let mut counters = self
            .counters
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?;
        Ok(counters
            .entry(license_id)
            .or_insert_with(|| Arc::new(Mutex::new(UsageCounter::new(today))))
            .clone())
    }
}

impl LicenseStore for MemoryStore {
    fn active(&self) -> StoreResult<Option<InstalledLicenseRecord>> {
        let licenses = self
            .licenses
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?;
        Ok(licenses.iter().find(|r| r.is_active).cloned())
    }

    fn install(&self, record: InstalledLicenseRecord) -> StoreResult<()> {
        let mut licenses = self
            .licenses
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?;
        for existing in licenses.iter_mut() {
            existing.is_active = false;
        }
        licenses.push(record);
        Ok(())
    }

    fn sync_display_fields(&self, record: &InstalledLicenseRecord) -> StoreResult<()> {
        let mut licenses = self
            .licenses
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?;
        let Some(existing) = licenses.iter_mut().find(|r| r.id == record.id) else {
            return Err(StoreError::NoActiveRecord);
        };
        *existing = record.clone();
        Ok(())
    }

    fn delete(&self, id: Uuid) -> StoreResult<()> {
        let mut licenses = self
            .licenses
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?;
        licenses.retain(|r| r.id != id);
        drop(licenses);

        let mut counters = self
            .counters
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?;
        counters.remove(&id);
        Ok(())
    }
}

impl UsageStore for MemoryStore {
    fn with_counter<R>(
        &self,
        license_id: Uuid,
        today: NaiveDate,
        f: impl FnOnce(&mut UsageCounter) -> R,
    ) -> StoreResult<R> {
        let handle = self.counter_handle(license_id, today)?;
        let mut counter = handle.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(f(&mut counter))
    }

    fn counter(&self, license_id: Uuid) -> StoreResult<Option<UsageCounter>> {
        let counters = self
            .counters
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?;
        match counters.get(&license_id) {
            None => Ok(None),
            Some(handle) => {
                let counter = handle.lock().map_err(|_| StoreError::LockPoisoned)?;
                Ok(Some(*counter))
            }
        }
    }
}

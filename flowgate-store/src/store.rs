//! Store traits: the seams between the enforcement core and persistence.

use crate::counter::UsageCounter;
use crate::error::StoreResult;
use crate::record::InstalledLicenseRecord;
use chrono::NaiveDate;
use uuid::Uuid;

/// Persistence for the installed license record.
pub trait LicenseStore: Send + Sync {
    /// Returns the currently active record, if any.
    fn active(&self) -> StoreResult<Option<InstalledLicenseRecord>>;

    /// Installs `record` as the active license.
    ///
    /// Deactivating the previous active record and activating the new one
    /// must be a single atomic step; a concurrent reader never observes
    /// zero or two active records.
    fn install(&self, record: InstalledLicenseRecord) -> StoreResult<()>;

    /// Overwrites the denormalized display fields of the record with the
    /// given id from a re-validation.
    fn sync_display_fields(&self, record: &InstalledLicenseRecord) -> StoreResult<()>;

    /// Deletes a record, cascading to its usage counter.
    fn delete(&self, id: Uuid) -> StoreResult<()>;
}

/// Persistence for per-license usage counters.
pub trait UsageStore: Send + Sync {
    /// Runs `f` with exclusive access to the counter for `license_id` and
    /// persists whatever state `f` leaves behind.
    ///
    /// The counter is created lazily (zero counts, markers for `today`)
    /// on first use. Calls for the same license are serialized; calls for
    /// different licenses must not block each other. This is the
    /// single-writer discipline the usage enforcer's check-and-increment
    /// relies on.
    fn with_counter<R>(
        &self,
        license_id: Uuid,
        today: NaiveDate,
        f: impl FnOnce(&mut UsageCounter) -> R,
    ) -> StoreResult<R>
    where
        Self: Sized;

    /// Reads the current counter without mutating it, if one exists.
    fn counter(&self, license_id: Uuid) -> StoreResult<Option<UsageCounter>>;
}

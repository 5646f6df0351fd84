//! SQLite-backed store.
//!
//! A single connection behind a mutex. The exactly-one-active flip and
//! the counter read-modify-write both run inside `IMMEDIATE` transactions,
//! so a concurrent reader never observes an intermediate state and two
//! counter updates for the same license cannot interleave.

use crate::counter::UsageCounter;
use crate::error::{StoreError, StoreResult};
use crate::record::InstalledLicenseRecord;
use crate::store::{LicenseStore, UsageStore};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS installed_license (
    id                TEXT PRIMARY KEY,
    raw_document      TEXT NOT NULL,
    payload           TEXT NOT NULL,
    signature         TEXT NOT NULL,
    algorithm         TEXT NOT NULL,
    key_id            TEXT NOT NULL,
    license_id        TEXT NOT NULL DEFAULT '',
    license_type      TEXT NOT NULL DEFAULT '',
    customer_name     TEXT NOT NULL DEFAULT '',
    edition_code      TEXT NOT NULL DEFAULT '',
    edition_name      TEXT NOT NULL DEFAULT '',
    valid_from        TEXT,
    valid_until       TEXT,
    status            TEXT NOT NULL,
    status_message    TEXT NOT NULL DEFAULT '',
    installed_at      TEXT NOT NULL,
    last_validated_at TEXT,
    is_active         INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS license_usage (
    license_id         TEXT PRIMARY KEY
                       REFERENCES installed_license(id) ON DELETE CASCADE,
    daily_count        INTEGER NOT NULL DEFAULT 0,
    monthly_count      INTEGER NOT NULL DEFAULT 0,
    last_reset_daily   TEXT NOT NULL,
    last_reset_monthly TEXT NOT NULL
);
";

/// Durable store over a single SQLite database file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

impl LicenseStore for SqliteStore {
    fn active(&self) -> StoreResult<Option<InstalledLicenseRecord>> {
        let conn = self.lock()?;
        let row: Option<RecordRow> = conn
            .query_row(
                "SELECT id, raw_document, payload, signature, algorithm, key_id,
                        license_id, license_type, customer_name, edition_code, edition_name,
                        valid_from, valid_until, status, status_message,
                        installed_at, last_validated_at, is_active
                 FROM installed_license WHERE is_active = 1
                 ORDER BY installed_at DESC LIMIT 1",
                [],
                RecordRow::from_row,
            )
            .optional()?;
        row.map(RecordRow::into_record).transpose()
    }

    fn install(&self, record: InstalledLicenseRecord) -> StoreResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            "UPDATE installed_license SET is_active = 0 WHERE is_active = 1",
            [],
        )?;
        tx.execute(
            "INSERT INTO installed_license (
                id, raw_document, payload, signature, algorithm, key_id,
                license_id, license_type, customer_name, edition_code, edition_name,
                valid_from, valid_until, status, status_message,
                installed_at, last_validated_at, is_active
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                record.id.to_string(),
                serde_json::to_string(&record.raw_document)?,
                serde_json::to_string(&record.payload)?,
                record.signature,
                record.algorithm,
                record.key_id,
                record.license_id,
                record.license_type,
                record.customer_name,
                record.edition_code,
                record.edition_name,
                record.valid_from.map(|t| t.to_rfc3339()),
                record.valid_until.map(|t| t.to_rfc3339()),
                record.status.as_str(),
                record.status_message,
                record.installed_at.to_rfc3339(),
                record.last_validated_at.map(|t| t.to_rfc3339()),
                i32::from(record.is_active),
            ],
        )?;
        tx.commit()?;
        debug!(license_id = %record.license_id, "installed license record");
        Ok(())
    }

    fn sync_display_fields(&self, record: &InstalledLicenseRecord) -> StoreResult<()> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE installed_license SET
                license_id = ?2, license_type = ?3, customer_name = ?4,
                edition_code = ?5, edition_name = ?6,
                valid_from = ?7, valid_until = ?8,
                status = ?9, status_message = ?10, last_validated_at = ?11
             WHERE id = ?1",
            params![
                record.id.to_string(),
                record.license_id,
                record.license_type,
                record.customer_name,
                record.edition_code,
                record.edition_name,
                record.valid_from.map(|t| t.to_rfc3339()),
                record.valid_until.map(|t| t.to_rfc3339()),
                record.status.as_str(),
                record.status_message,
                record.last_validated_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::NoActiveRecord);
        }
        Ok(())
    }

    fn delete(&self, id: Uuid) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM installed_license WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(())
    }
}

impl UsageStore for SqliteStore {
    fn with_counter<R>(
        &self,
        license_id: Uuid,
        today: NaiveDate,
        f: impl FnOnce(&mut UsageCounter) -> R,
    ) -> StoreResult<R> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing: Option<(u32, u32, String, String)> = tx
            .query_row(
                "SELECT daily_count, monthly_count, last_reset_daily, last_reset_monthly
                 FROM license_usage WHERE license_id = ?1",
                params![license_id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        let mut counter = match existing {
            None => UsageCounter::new(today),
            Some((daily, monthly, reset_daily, reset_monthly)) => UsageCounter {
                daily_count: daily,
                monthly_count: monthly,
                last_reset_daily: parse_date(&reset_daily)?,
                last_reset_monthly: parse_date(&reset_monthly)?,
            },
        };

        let result = f(&mut counter);

        tx.execute(
            "INSERT INTO license_usage
                (license_id, daily_count, monthly_count, last_reset_daily, last_reset_monthly)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(license_id) DO UPDATE SET
                daily_count = excluded.daily_count,
                monthly_count = excluded.monthly_count,
                last_reset_daily = excluded.last_reset_daily,
                last_reset_monthly = excluded.last_reset_monthly",
            params![
                license_id.to_string(),
                counter.daily_count,
                counter.monthly_count,
                counter.last_reset_daily.to_string(),
                counter.last_reset_monthly.to_string(),
            ],
        )?;
        tx.commit()?;
        Ok(result)
    }

    fn counter(&self, license_id: Uuid) -> StoreResult<Option<UsageCounter>> {
        let conn = self.lock()?;
        let row: Option<(u32, u32, String, String)> = conn
            .query_row(
                "SELECT daily_count, monthly_count, last_reset_daily, last_reset_monthly
                 FROM license_usage WHERE license_id = ?1",
                params![license_id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        row.map(|(daily, monthly, reset_daily, reset_monthly)| {
            Ok(UsageCounter {
                daily_count: daily,
                monthly_count: monthly,
                last_reset_daily: parse_date(&reset_daily)?,
                last_reset_monthly: parse_date(&reset_monthly)?,
            })
        })
        .transpose()
    }
}

/// Raw column values for one installed_license row; conversion into the
/// typed record happens outside the rusqlite row callback so parse
/// failures surface as [`StoreError::Corrupt`].
struct RecordRow {
    id: String,
    raw_document: String,
    payload: String,
    signature: String,
    algorithm: String,
    key_id: String,
    license_id: String,
    license_type: String,
    customer_name: String,
    edition_code: String,
    edition_name: String,
    valid_from: Option<String>,
    valid_until: Option<String>,
    status: String,
    status_message: String,
    installed_at: String,
    last_validated_at: Option<String>,
    is_active: bool,
}

impl RecordRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            raw_document: row.get(1)?,
            payload: row.get(2)?,
            signature: row.get(3)?,
            algorithm: row.get(4)?,
            key_id: row.get(5)?,
            license_id: row.get(6)?,
            license_type: row.get(7)?,
            customer_name: row.get(8)?,
            edition_code: row.get(9)?,
            edition_name: row.get(10)?,
            valid_from: row.get(11)?,
            valid_until: row.get(12)?,
            status: row.get(13)?,
            status_message: row.get(14)?,
            installed_at: row.get(15)?,
            last_validated_at: row.get(16)?,
            is_active: row.get(17)?,
        })
    }

    fn into_record(self) -> StoreResult<InstalledLicenseRecord> {
        Ok(InstalledLicenseRecord {
            id: Uuid::parse_str(&self.id)
                .map_err(|err| StoreError::Corrupt(format!("record id: {err}")))?,
            raw_document: serde_json::from_str(&self.raw_document)?,
            payload: serde_json::from_str(&self.payload)?,
            signature: self.signature,
            algorithm: self.algorithm,
            key_id: self.key_id,
            license_id: self.license_id,
            license_type: self.license_type,
            customer_name: self.customer_name,
            edition_code: self.edition_code,
            edition_name: self.edition_name,
            valid_from: self.valid_from.as_deref().map(parse_datetime).transpose()?,
            valid_until: self.valid_until.as_deref().map(parse_datetime).transpose()?,
            status: self
                .status
                .parse()
                .map_err(|_| StoreError::Corrupt(format!("status '{}'", self.status)))?,
            status_message: self.status_message,
            installed_at: parse_datetime(&self.installed_at)?,
            last_validated_at: self
                .last_validated_at
                .as_deref()
                .map(parse_datetime)
                .transpose()?,
            is_active: self.is_active,
        })
    }
}

fn parse_datetime(value: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| StoreError::Corrupt(format!("timestamp '{value}': {err}")))
}

fn parse_date(value: &str) -> StoreResult<NaiveDate> {
    value
        .parse()
        .map_err(|err| StoreError::Corrupt(format!("date '{value}': {err}")))
}

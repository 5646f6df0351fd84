//! Persistence for Flowgate licensing.
//!
//! Two small pieces of state back the enforcement core:
//! - the installed license record (exactly one active at a time, holding
//!   the raw document verbatim plus a denormalized display cache)
//! - one usage counter per license (daily/monthly counts + reset markers)
//!
//! Both are exposed through traits so the enforcement pipeline never
//! depends on a concrete backend:
//! - [`MemoryStore`] for tests and embedded use
//! - [`SqliteStore`] for durable single-node deployments
//!
//! The usage counter's concurrency contract lives in
//! [`UsageStore::with_counter`]: the read-modify-write of a counter is
//! serialized per license, and counters of different licenses do not
//! block each other.

mod counter;
mod error;
mod memory;
mod record;
mod sqlite;
mod store;

pub use counter::{first_of_month, UsageCounter};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use record::InstalledLicenseRecord;
pub use sqlite::SqliteStore;
pub use store::{LicenseStore, UsageStore};

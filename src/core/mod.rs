//! Core ledger logic, independent of any transport layer.

/// Snapshot files on disk and the periodic backup task
pub mod backup;
/// Employee accounts and authentication
pub mod employee;
/// Recharge and consume as atomic balance changes
pub mod ledger;
/// Member registration and profile management
pub mod member;
/// Two-decimal amount validation and conversion
pub mod money;
/// Pagination and listing filters
pub mod query;
/// Recharge/consume history and ledger statistics
pub mod records;
/// `{success, message, data}` response envelope
pub mod response;
/// Full-ledger replacement from the newest snapshot
pub mod restore;
/// Versioned JSON ledger image
pub mod snapshot;
/// Connection ownership and write serialization
pub mod store;

pub use backup::{BackupFile, BackupResult, BackupScheduler};
pub use ledger::{BalanceReceipt, consume, recharge};
pub use restore::{RestoreExecutor, RestoreResult};
pub use store::LedgerStore;

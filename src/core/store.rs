//! Ledger store - Owns the database connection and the write-serialization locks.
//!
//! Balance mutations take a per-member lock while holding a shared "gate"
//! lock; a restore takes the gate exclusively. This gives:
//! - one writer per member at a time, so no stale-balance double spend
//! - independent members mutate in parallel
//! - a restore never overlaps a balance mutation
//!
//! Snapshot reads take neither lock.

use crate::config::database;
use crate::config::settings::DEFAULT_OPERATOR;
use crate::errors::Result;
use dashmap::DashMap;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tracing::{info, instrument, warn};

type MemberLocks = DashMap<String, Arc<Mutex<()>>>;

/// Handle to the ledger database. Cheap to clone; clones share locks and the connection pool.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    db: Arc<DatabaseConnection>,
    gate: Arc<RwLock<()>>,
    member_locks: Arc<MemberLocks>,
    default_operator: Arc<str>,
}

impl LedgerStore {
    /// Connects to `database_url` and creates any missing tables.
    #[instrument]
    pub async fn open(database_url: &str) -> Result<Self> {
        let db = database::create_connection(database_url).await?;
        database::create_tables(&db).await?;
        info!("Ledger store opened");
        Ok(Self::from_connection(db))
    }

    /// Wraps an existing connection without touching the schema.
    #[must_use]
    pub fn from_connection(db: DatabaseConnection) -> Self {
        Self {
            db: Arc::new(db),
            gate: Arc::new(RwLock::new(())),
            member_locks: Arc::new(DashMap::new()),
            default_operator: Arc::from(DEFAULT_OPERATOR),
        }
    }

    /// Replaces the operator label used when callers do not supply one.
    #[must_use]
    pub fn with_default_operator(mut self, operator: &str) -> Self {
        let operator = operator.trim();
        if !operator.is_empty() {
            self.default_operator = Arc::from(operator);
        }
        self
    }

    /// The underlying connection, for reads and for starting transactions
    #[must_use]
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Resolves an optional operator to the recorded label
    pub(crate) fn operator_or_default(&self, operator: Option<&str>) -> String {
        operator
            .map(str::trim)
            .filter(|op| !op.is_empty())
            .unwrap_or(&self.default_operator)
            .to_string()
    }

    /// Closes the connection pool once this is the last handle.
    ///
    /// While other clones are alive the pool stays open for them and only
    /// this handle is dropped.
    pub async fn close(self) -> Result<()> {
        match Arc::try_unwrap(self.db) {
            Ok(db) => {
                db.close().await?;
                info!("Ledger store closed");
            }
            Err(shared) => {
                warn!(
                    handles = Arc::strong_count(&shared) - 1,
                    "Ledger store still shared; connection left open"
                );
            }
        }
        Ok(())
    }

    /// Serializes writers of one member and excludes concurrent restores.
    pub(crate) async fn lock_member(&self, member_id: &str) -> MemberGuard {
        let gate = Arc::clone(&self.gate).read_owned().await;
        let lock = Arc::clone(&self.member_locks.entry(member_id.to_string()).or_default());
        let guard = lock.lock_owned().await;
        MemberGuard {
            member_id: member_id.to_string(),
            locks: Arc::clone(&self.member_locks),
            guard: Some(guard),
            _gate: gate,
        }
    }

    /// Store-wide exclusive window; waits for in-flight mutations to finish.
    pub(crate) async fn lock_exclusive(&self) -> OwnedRwLockWriteGuard<()> {
        Arc::clone(&self.gate).write_owned().await
    }

    #[cfg(test)]
    pub(crate) fn tracked_member_locks(&self) -> usize {
        self.member_locks.len()
    }
}

/// Held for the duration of one balance mutation
pub(crate) struct MemberGuard {
    member_id: String,
    locks: Arc<MemberLocks>,
    guard: Option<OwnedMutexGuard<()>>,
    _gate: OwnedRwLockReadGuard<()>,
}

impl Drop for MemberGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Forget the lock once nobody else holds or waits on it
        self.locks
            .remove_if(&self.member_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

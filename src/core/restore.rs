//! Restore executor - Replaces the whole ledger with the latest snapshot file.
//!
//! The snapshot is fully read and validated before the store is touched.
//! The replacement runs in one transaction while the store's exclusive gate
//! is held, so no balance mutation can interleave with it.

use crate::{
    core::{
        backup,
        money,
        snapshot::{self, SnapshotData, SnapshotMember, SnapshotRecord},
        store::LedgerStore,
    },
    entities::{ConsumeRecord, Member, RechargeRecord, consume_record, member, recharge_record},
    errors::{Error, Result},
};
use sea_orm::{DatabaseTransaction, EntityTrait, Set, TransactionTrait};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Rows per INSERT statement; keeps bound parameters under SQLite's limit
const INSERT_CHUNK: usize = 100;

/// Outcome of a successful restore
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreResult {
    /// Snapshot file that was applied
    pub filename: String,
    /// Members restored
    pub count: usize,
    /// Recharge plus consume records restored
    pub record_count: usize,
}

/// Restores the ledger from a backup directory
#[derive(Debug, Clone)]
pub struct RestoreExecutor {
    store: LedgerStore,
    dir: PathBuf,
}

impl RestoreExecutor {
    /// Executor reading snapshots from `dir`
    pub fn new(store: LedgerStore, dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            dir: dir.into(),
        }
    }

    /// Directory snapshots are read from
    #[must_use]
    pub fn backup_dir(&self) -> &Path {
        &self.dir
    }

    /// Replaces all members and records with the newest snapshot.
    ///
    /// # Errors
    /// - [`Error::NoBackupAvailable`] when the directory has no backup files
    /// - [`Error::InvalidFormat`] when the newest file cannot be read or decoded; the store is untouched
    /// - [`Error::StorageFailure`] when the replacement fails; it is rolled back entirely
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    pub async fn restore_latest(&self) -> Result<RestoreResult> {
        let latest = backup::latest(backup::list_backups(&self.dir).await?, &self.dir)
            .inspect_err(|e| warn!(error = %e, "Restore aborted"))?;

        let bytes = tokio::fs::read(self.dir.join(&latest.filename))
            .await
            .map_err(|e| Error::invalid_format(format!("cannot read {}: {e}", latest.filename)))?;
        let snapshot = snapshot::decode(&bytes)
            .inspect_err(|e| warn!(file = %latest.filename, error = %e, "Rejected snapshot"))?;

        let _exclusive = self.store.lock_exclusive().await;
        let txn = self.store.connection().begin().await?;
        if let Err(e) = replace_all(&txn, &snapshot.data).await {
            warn!(file = %latest.filename, error = %e, "Restore rolled back");
            txn.rollback().await?;
            return Err(e);
        }
        txn.commit().await?;

        let result = RestoreResult {
            filename: latest.filename,
            count: snapshot.data.members.len(),
            record_count: snapshot.data.record_count(),
        };
        info!(
            file = %result.filename,
            members = result.count,
            records = result.record_count,
            "Ledger restored"
        );
        Ok(result)
    }
}

/// Deletes every consume record, recharge record and member (in that order),
/// then inserts the snapshot's members and records inside `txn`.
pub async fn replace_all(txn: &DatabaseTransaction, data: &SnapshotData) -> Result<()> {
    ConsumeRecord::delete_many().exec(txn).await?;
    RechargeRecord::delete_many().exec(txn).await?;
    Member::delete_many().exec(txn).await?;

    let members = data
        .members
        .iter()
        .map(member_row)
        .collect::<Result<Vec<_>>>()?;
    for chunk in members.chunks(INSERT_CHUNK) {
        Member::insert_many(chunk.to_vec())
            .exec_without_returning(txn)
            .await?;
    }

    let recharges = data
        .recharge_records
        .iter()
        .map(recharge_row)
        .collect::<Result<Vec<_>>>()?;
    for chunk in recharges.chunks(INSERT_CHUNK) {
        RechargeRecord::insert_many(chunk.to_vec())
            .exec_without_returning(txn)
            .await?;
    }

    let consumes = data
        .consume_records
        .iter()
        .map(consume_row)
        .collect::<Result<Vec<_>>>()?;
    for chunk in consumes.chunks(INSERT_CHUNK) {
        ConsumeRecord::insert_many(chunk.to_vec())
            .exec_without_returning(txn)
            .await?;
    }
    Ok(())
}

fn member_row(m: &SnapshotMember) -> Result<member::ActiveModel> {
    Ok(member::ActiveModel {
        member_id: Set(m.member_id.clone()),
        name: Set(m.name.clone()),
        phone: Set(m.phone.clone()),
        gender: Set(m.gender.clone()),
        balance_cents: Set(money::to_cents(m.balance)?),
        created_at: Set(m.created_at),
        updated_at: Set(m.updated_at),
    })
}

fn recharge_row(r: &SnapshotRecord) -> Result<recharge_record::ActiveModel> {
    Ok(recharge_record::ActiveModel {
        id: Set(r.id),
        member_id: Set(r.member_id.clone()),
        member_name: Set(r.member_name.clone()),
        amount_cents: Set(money::to_cents(r.amount)?),
        operator: Set(r.operator.clone()),
        created_at: Set(r.created_at),
    })
}

fn consume_row(r: &SnapshotRecord) -> Result<consume_record::ActiveModel> {
    Ok(consume_record::ActiveModel {
        id: Set(r.id),
        member_id: Set(r.member_id.clone()),
        member_name: Set(r.member_name.clone()),
        amount_cents: Set(money::to_cents(r.amount)?),
        operator: Set(r.operator.clone()),
        created_at: Set(r.created_at),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::config::BackupConfig;
    use crate::core::{
        backup::BackupScheduler,
        ledger, member as members,
        query::{MemberQuery, RecordQuery},
        records::{self, RecordKind},
        snapshot::Snapshot,
    };
    use crate::test_utils::*;
    use rust_decimal_macros::dec;

    fn scheduler(store: &LedgerStore, dir: &Path) -> BackupScheduler {
        BackupScheduler::new(
            store.clone(),
            &BackupConfig {
                dir: dir.to_path_buf(),
                interval_secs: 3600,
                max_files: 0,
            },
        )
    }

    #[tokio::test]
    async fn test_no_backup_available() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let store = setup_test_store().await?;
        let executor = RestoreExecutor::new(store, tmp.path());

        let result = executor.restore_latest().await;
        assert!(matches!(result, Err(Error::NoBackupAvailable { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_restore_replaces_rather_than_merges() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let store = setup_test_store().await?;
        funded_member(&store, "M001", "Alice", "500.00").await?;
        ledger::consume(&store, "M001", dec!(120.50), None).await?;
        let before = Snapshot::capture(store.connection()).await?;

        let backup = scheduler(&store, tmp.path()).trigger_manual_backup().await?;

        // Diverge after the backup
        funded_member(&store, "M002", "Bob", "10.00").await?;
        ledger::consume(&store, "M001", dec!(79.50), None).await?;

        let result = RestoreExecutor::new(store.clone(), tmp.path())
            .restore_latest()
            .await?;
        assert_eq!(result.filename, backup.filename);
        assert_eq!(result.count, 1);
        assert_eq!(result.record_count, 2);

        let listed = members::list_members(store.connection(), &MemberQuery::default()).await?;
        assert_eq!(listed.total, 1);
        assert!(members::get_member(store.connection(), "M002").await?.is_none());
        let alice = members::require_member(store.connection(), "M001").await?;
        assert_eq!(alice.balance(), dec!(379.50));

        let after = Snapshot::capture(store.connection()).await?;
        assert_eq!(after.data, before.data);
        Ok(())
    }

    #[tokio::test]
    async fn test_newest_file_wins() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let store = setup_test_store().await?;
        let backups = scheduler(&store, tmp.path());

        funded_member(&store, "M001", "Alice", "1.00").await?;
        backups.trigger_manual_backup().await?;
        funded_member(&store, "M002", "Bob", "2.00").await?;
        let newest = backups.trigger_manual_backup().await?;

        let result = RestoreExecutor::new(store.clone(), tmp.path())
            .restore_latest()
            .await?;
        assert_eq!(result.filename, newest.filename);
        assert_eq!(result.count, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_latest_file_leaves_store_untouched() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let store = setup_test_store().await?;
        funded_member(&store, "M001", "Alice", "30.00").await?;
        scheduler(&store, tmp.path()).trigger_manual_backup().await?;

        let newer = backup::BackupStamp::new(chrono::Utc::now() + chrono::TimeDelta::hours(1));
        tokio::fs::write(tmp.path().join(newer.file_name()), b"{\"data\": {}}").await?;

        let result = RestoreExecutor::new(store.clone(), tmp.path())
            .restore_latest()
            .await;
        assert!(matches!(result, Err(Error::InvalidFormat { .. })));

        let alice = members::require_member(store.connection(), "M001").await?;
        assert_eq!(alice.balance(), dec!(30.00));
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_replace_rolls_back_to_pre_restore_state() -> Result<()> {
        use sea_orm::ConnectionTrait;

        let tmp = tempfile::tempdir()?;
        let store = setup_test_store().await?;
        funded_member(&store, "M001", "Alice", "40.00").await?;
        scheduler(&store, tmp.path()).trigger_manual_backup().await?;

        funded_member(&store, "M002", "Bob", "15.00").await?;
        let before = Snapshot::capture(store.connection()).await?;

        // Inserting the restored recharge rows fails after members were replaced
        store
            .connection()
            .execute_unprepared(
                "CREATE TRIGGER reject_recharge_insert BEFORE INSERT ON recharge_records \
                 BEGIN SELECT RAISE(ABORT, 'recharge inserts disabled'); END",
            )
            .await?;

        let result = RestoreExecutor::new(store.clone(), tmp.path())
            .restore_latest()
            .await;
        assert!(matches!(result, Err(Error::StorageFailure(_))));

        let bob = members::require_member(store.connection(), "M002").await?;
        assert_eq!(bob.balance(), dec!(15.00));
        let after = Snapshot::capture(store.connection()).await?;
        assert_eq!(after.data, before.data);
        Ok(())
    }

    #[tokio::test]
    async fn test_ids_keep_increasing_after_restore() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let store = setup_test_store().await?;
        funded_member(&store, "M001", "Alice", "30.00").await?;
        ledger::consume(&store, "M001", dec!(1), None).await?;
        scheduler(&store, tmp.path()).trigger_manual_backup().await?;

        RestoreExecutor::new(store.clone(), tmp.path())
            .restore_latest()
            .await?;
        let receipt = ledger::consume(&store, "M001", dec!(1), None).await?;

        let consumes =
            records::list_records(store.connection(), RecordKind::Consume, &RecordQuery::default())
                .await?;
        assert_eq!(consumes.total, 2);
        assert!(consumes.records.iter().all(|r| r.id <= receipt.record.id));
        assert_eq!(receipt.new_balance, dec!(28.00));
        Ok(())
    }
}

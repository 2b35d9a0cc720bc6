//! Snapshot codec - Versioned JSON image of the whole ledger.
//!
//! A snapshot holds every member and every recharge/consume record with all
//! fields preserved, under a `version`/`timestamp` header:
//!
//! ```json
//! {
//!   "version": "1.0.0",
//!   "timestamp": "2026-10-17T10:15:00.123456Z",
//!   "data": { "members": [], "rechargeRecords": [], "consumeRecords": [] }
//! }
//! ```
//!
//! Amounts are written as decimal strings. [`decode`] checks structure and
//! ledger invariants but never touches the store.

use crate::{
    core::money,
    entities::{
        ConsumeRecord, ConsumeRecordColumn, Member, MemberColumn, RechargeRecord,
        RechargeRecordColumn, consume_record, member, recharge_record,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Version written into new snapshots
pub const SNAPSHOT_VERSION: &str = "1.0.0";

/// Major version this build can read
const SUPPORTED_MAJOR: &str = "1";

/// A complete ledger image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Format version, `major.minor.patch`
    pub version: String,
    /// When the snapshot was taken
    pub timestamp: DateTime<Utc>,
    /// The ledger tables
    pub data: SnapshotData,
}

/// The three ledger tables, each ordered by primary key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotData {
    /// Member rows
    pub members: Vec<SnapshotMember>,
    /// Recharge audit rows
    pub recharge_records: Vec<SnapshotRecord>,
    /// Consume audit rows
    pub consume_records: Vec<SnapshotRecord>,
}

/// Flattened member row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMember {
    /// Primary key
    pub member_id: String,
    /// Display name
    pub name: String,
    /// Contact phone, if any
    #[serde(default)]
    pub phone: Option<String>,
    /// Free-text gender, if any
    #[serde(default)]
    pub gender: Option<String>,
    /// Non-negative two-decimal balance
    pub balance: Decimal,
    /// When the member registered
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    /// When the member row was last written
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// Flattened recharge or consume row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Surrogate key within its table
    pub id: i64,
    /// Member the amount applied to
    pub member_id: String,
    /// Member name when the operation ran
    pub member_name: String,
    /// Strictly positive amount
    pub amount: Decimal,
    /// Who performed the operation
    pub operator: String,
    /// Operation time
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl From<member::Model> for SnapshotMember {
    fn from(model: member::Model) -> Self {
        Self {
            balance: model.balance(),
            member_id: model.member_id,
            name: model.name,
            phone: model.phone,
            gender: model.gender,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl From<recharge_record::Model> for SnapshotRecord {
    fn from(model: recharge_record::Model) -> Self {
        Self {
            id: model.id,
            member_id: model.member_id,
            member_name: model.member_name,
            amount: money::from_cents(model.amount_cents),
            operator: model.operator,
            created_at: model.created_at,
        }
    }
}

impl From<consume_record::Model> for SnapshotRecord {
    fn from(model: consume_record::Model) -> Self {
        Self {
            id: model.id,
            member_id: model.member_id,
            member_name: model.member_name,
            amount: money::from_cents(model.amount_cents),
            operator: model.operator,
            created_at: model.created_at,
        }
    }
}

impl SnapshotData {
    /// Total recharge and consume rows
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.recharge_records.len() + self.consume_records.len()
    }
}

impl Snapshot {
    /// Reads every ledger table inside one read transaction.
    ///
    /// Takes no store lock; concurrent mutators are only excluded by the
    /// database's own transaction isolation.
    pub async fn capture<C>(db: &C) -> Result<Self>
    where
        C: TransactionTrait,
    {
        let txn = db.begin().await?;
        let members = Member::find()
            .order_by_asc(MemberColumn::MemberId)
            .all(&txn)
            .await?;
        let recharge_records = RechargeRecord::find()
            .order_by_asc(RechargeRecordColumn::Id)
            .all(&txn)
            .await?;
        let consume_records = ConsumeRecord::find()
            .order_by_asc(ConsumeRecordColumn::Id)
            .all(&txn)
            .await?;
        txn.commit().await?;

        let snapshot = Self {
            version: SNAPSHOT_VERSION.to_string(),
            timestamp: Utc::now(),
            data: SnapshotData {
                members: members.into_iter().map(Into::into).collect(),
                recharge_records: recharge_records.into_iter().map(Into::into).collect(),
                consume_records: consume_records.into_iter().map(Into::into).collect(),
            },
        };
        debug!(
            members = snapshot.data.members.len(),
            records = snapshot.data.record_count(),
            "Captured ledger snapshot"
        );
        Ok(snapshot)
    }

    /// Serializes to pretty-printed JSON
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(Into::into)
    }
}

/// Parses and validates a snapshot blob.
///
/// # Errors
/// [`Error::InvalidFormat`] when the JSON is malformed, a required field is
/// missing, the major version is not supported, or the data breaks a ledger
/// invariant (negative balance, non-positive amount, duplicate key).
pub fn decode(bytes: &[u8]) -> Result<Snapshot> {
    let snapshot: Snapshot = serde_json::from_slice(bytes)
        .map_err(|e| Error::invalid_format(format!("unreadable snapshot: {e}")))?;

    let major = snapshot.version.split('.').next().unwrap_or_default();
    if major != SUPPORTED_MAJOR {
        return Err(Error::invalid_format(format!(
            "unsupported snapshot version '{}'",
            snapshot.version
        )));
    }

    validate(&snapshot.data)?;
    Ok(snapshot)
}

fn validate(data: &SnapshotData) -> Result<()> {
    let mut member_ids = HashSet::new();
    for member in &data.members {
        if member.member_id.trim().is_empty() || member.name.trim().is_empty() {
            return Err(Error::invalid_format("member with blank id or name"));
        }
        if !member_ids.insert(member.member_id.as_str()) {
            return Err(Error::invalid_format(format!(
                "duplicate member id '{}'",
                member.member_id
            )));
        }
        if member.balance < Decimal::ZERO {
            return Err(Error::invalid_format(format!(
                "negative balance for member '{}'",
                member.member_id
            )));
        }
        if member.balance.normalize().scale() > money::SCALE || money::to_cents(member.balance).is_err() {
            return Err(Error::invalid_format(format!(
                "balance {} for member '{}' is not a two-decimal amount",
                member.balance, member.member_id
            )));
        }
    }

    validate_records("recharge", &data.recharge_records)?;
    validate_records("consume", &data.consume_records)
}

fn validate_records(kind: &str, records: &[SnapshotRecord]) -> Result<()> {
    let mut ids = HashSet::new();
    for record in records {
        if !ids.insert(record.id) {
            return Err(Error::invalid_format(format!(
                "duplicate {kind} record id {}",
                record.id
            )));
        }
        if money::validate_amount(record.amount).is_err() {
            return Err(Error::invalid_format(format!(
                "{kind} record {} has invalid amount {}",
                record.id, record.amount
            )));
        }
    }
    Ok(())
}

//! Audit record queries - Paged listings of recharge and consume history.
//!
//! Both record tables share one shape, so listings are exposed through a
//! single [`AuditRecord`] view tagged with its [`RecordKind`].

use crate::{
    core::{
        money,
        query::{Page, RecordQuery, contains_literal, search_term},
    },
    entities::{
        ConsumeRecord, ConsumeRecordColumn, Member, MemberColumn, RechargeRecord,
        RechargeRecordColumn, consume_record, recharge_record,
    },
    errors::Result,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{Condition, PaginatorTrait, QueryOrder, QuerySelect, prelude::*};
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Which audit table a record lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// Credit to a member balance
    Recharge,
    /// Debit from a member balance
    Consume,
}

impl RecordKind {
    /// Lowercase label used in logs and responses
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Recharge => "recharge",
            Self::Consume => "consume",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recharge or consume, with the amount as a two-decimal value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    /// Source table
    pub kind: RecordKind,
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

impl From<recharge_record::Model> for AuditRecord {
    fn from(model: recharge_record::Model) -> Self {
        Self {
            kind: RecordKind::Recharge,
            id: model.id,
            member_id: model.member_id,
            member_name: model.member_name,
            amount: money::from_cents(model.amount_cents),
            operator: model.operator,
            created_at: model.created_at,
        }
    }
}

impl From<consume_record::Model> for AuditRecord {
    fn from(model: consume_record::Model) -> Self {
        Self {
            kind: RecordKind::Consume,
            id: model.id,
            member_id: model.member_id,
            member_name: model.member_name,
            amount: money::from_cents(model.amount_cents),
            operator: model.operator,
            created_at: model.created_at,
        }
    }
}

/// Columns a record listing filters and sorts on
struct RecordColumns<Col> {
    id: Col,
    member_id: Col,
    member_name: Col,
    created_at: Col,
}

/// Lists one kind of record, newest first.
///
/// `member_id` restricts to one member. `search` matches the frozen
/// `member_name` on the record, or the current name/phone of the member.
pub async fn list_records<C>(db: &C, kind: RecordKind, query: &RecordQuery) -> Result<Page<AuditRecord>>
where
    C: ConnectionTrait,
{
    match kind {
        RecordKind::Recharge => {
            list_page::<RechargeRecord, C>(
                db,
                &RecordColumns {
                    id: RechargeRecordColumn::Id,
                    member_id: RechargeRecordColumn::MemberId,
                    member_name: RechargeRecordColumn::MemberName,
                    created_at: RechargeRecordColumn::CreatedAt,
                },
                query,
            )
            .await
        }
        RecordKind::Consume => {
            list_page::<ConsumeRecord, C>(
                db,
                &RecordColumns {
                    id: ConsumeRecordColumn::Id,
                    member_id: ConsumeRecordColumn::MemberId,
                    member_name: ConsumeRecordColumn::MemberName,
                    created_at: ConsumeRecordColumn::CreatedAt,
                },
                query,
            )
            .await
        }
    }
}

async fn list_page<E, C>(
    db: &C,
    columns: &RecordColumns<E::Column>,
    query: &RecordQuery,
) -> Result<Page<AuditRecord>>
where
    E: EntityTrait,
    E::Model: Into<AuditRecord> + Sync,
    C: ConnectionTrait,
{
    let mut select = E::find();

    if let Some(member_id) = search_term(query.member_id.as_ref()) {
        select = select.filter(columns.member_id.eq(member_id));
    }

    if let Some(term) = search_term(query.search.as_ref()) {
        let matching_members = members_matching(db, term).await?;
        let mut condition = Condition::any().add(contains_literal(columns.member_name, term));
        if !matching_members.is_empty() {
            condition = condition.add(columns.member_id.is_in(matching_members));
        }
        select = select.filter(condition);
    }

    let total = select.clone().count(db).await?;
    let pagination = query.pagination;
    let records = select
        .order_by_desc(columns.created_at)
        .order_by_desc(columns.id)
        .offset(pagination.offset())
        .limit(pagination.page_size)
        .all(db)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    debug!(total, page = pagination.page, "Listed audit records");
    Ok(Page::new(records, total, pagination))
}

/// Ids of members whose current name or phone contains `term`
async fn members_matching<C>(db: &C, term: &str) -> Result<Vec<String>>
where
    C: ConnectionTrait,
{
    Member::find()
        .select_only()
        .column(MemberColumn::MemberId)
        .filter(
            Condition::any()
                .add(contains_literal(MemberColumn::Name, term))
                .add(contains_literal(MemberColumn::Phone, term)),
        )
        .into_tuple::<String>()
        .all(db)
        .await
        .map_err(Into::into)
}

/// Table counts and most recent activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerStats {
    /// Registered members
    pub member_count: u64,
    /// Recharge records
    pub recharge_count: u64,
    /// Consume records
    pub consume_count: u64,
    /// Time of the newest recharge
    pub latest_recharge_at: Option<DateTime<Utc>>,
    /// Time of the newest consume
    pub latest_consume_at: Option<DateTime<Utc>>,
}

/// Summarizes the ledger tables
pub async fn ledger_stats<C>(db: &C) -> Result<LedgerStats>
where
    C: ConnectionTrait,
{
    let latest_recharge_at = RechargeRecord::find()
        .order_by_desc(RechargeRecordColumn::CreatedAt)
        .one(db)
        .await?
        .map(|r| r.created_at);
    let latest_consume_at = ConsumeRecord::find()
        .order_by_desc(ConsumeRecordColumn::CreatedAt)
        .one(db)
        .await?
        .map(|r| r.created_at);

    Ok(LedgerStats {
        member_count: Member::find().count(db).await?,
        recharge_count: RechargeRecord::find().count(db).await?,
        consume_count: ConsumeRecord::find().count(db).await?,
        latest_recharge_at,
        latest_consume_at,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::{ledger, member, query::Pagination};
    use crate::test_utils::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_list_records_newest_first() -> Result<()> {
        let store = setup_test_store().await?;
        funded_member(&store, "M001", "Alice", "100.00").await?;
        ledger::consume(&store, "M001", dec!(10), None).await?;
        ledger::consume(&store, "M001", dec!(20), Some("bob")).await?;

        let page = list_records(store.connection(), RecordKind::Consume, &RecordQuery::default()).await?;
        assert_eq!(page.total, 2);
        assert_eq!(page.records[0].amount, dec!(20));
        assert_eq!(page.records[0].operator, "bob");
        assert_eq!(page.records[0].kind, RecordKind::Consume);
        assert_eq!(page.records[1].amount, dec!(10));

        let recharges =
            list_records(store.connection(), RecordKind::Recharge, &RecordQuery::default()).await?;
        assert_eq!(recharges.total, 1);
        assert_eq!(recharges.records[0].amount.to_string(), "100.00");
        Ok(())
    }

    #[tokio::test]
    async fn test_list_records_filters() -> Result<()> {
        let store = setup_test_store().await?;
        funded_member(&store, "M001", "Alice", "50.00").await?;
        funded_member(&store, "M002", "Bob", "60.00").await?;
        member::update_member(
            store.connection(),
            "M002",
            member::MemberUpdate {
                phone: Some("13912345678".to_string()),
                ..Default::default()
            },
        )
        .await?;

        let by_member = list_records(
            store.connection(),
            RecordKind::Recharge,
            &RecordQuery {
                member_id: Some("M001".to_string()),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(by_member.total, 1);
        assert_eq!(by_member.records[0].member_name, "Alice");

        let by_phone = list_records(
            store.connection(),
            RecordKind::Recharge,
            &RecordQuery {
                search: Some("139123".to_string()),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(by_phone.total, 1);
        assert_eq!(by_phone.records[0].member_id, "M002");

        let none = list_records(
            store.connection(),
            RecordKind::Recharge,
            &RecordQuery {
                search: Some("nobody".to_string()),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(none.total, 0);
        assert!(none.records.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_search_matches_frozen_name_after_delete() -> Result<()> {
        let store = setup_test_store().await?;
        funded_member(&store, "M001", "Alice", "10.00").await?;
        member::delete_member(store.connection(), "M001").await?;

        let page = list_records(
            store.connection(),
            RecordKind::Recharge,
            &RecordQuery {
                search: Some("Ali".to_string()),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(page.total, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_search_percent_is_not_a_wildcard() -> Result<()> {
        let store = setup_test_store().await?;
        funded_member(&store, "M001", "Alice", "10.00").await?;
        funded_member(&store, "M002", "50% Club", "20.00").await?;

        let page = list_records(
            store.connection(),
            RecordKind::Recharge,
            &RecordQuery {
                search: Some("%".to_string()),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(page.total, 1);
        assert_eq!(page.records[0].member_id, "M002");
        Ok(())
    }

    #[tokio::test]
    async fn test_list_records_pagination() -> Result<()> {
        let store = setup_test_store().await?;
        funded_member(&store, "M001", "Alice", "100.00").await?;
        for _ in 0..4 {
            ledger::consume(&store, "M001", dec!(1), None).await?;
        }

        let query = RecordQuery {
            pagination: Pagination::new(2, 3),
            ..Default::default()
        };
        let page = list_records(store.connection(), RecordKind::Consume, &query).await?;
        assert_eq!(page.total, 4);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.records.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_ledger_stats() -> Result<()> {
        let store = setup_test_store().await?;
        let empty = ledger_stats(store.connection()).await?;
        assert_eq!(empty.member_count, 0);
        assert!(empty.latest_recharge_at.is_none());

        funded_member(&store, "M001", "Alice", "100.00").await?;
        let receipt = ledger::consume(&store, "M001", dec!(5), None).await?;

        let stats = ledger_stats(store.connection()).await?;
        assert_eq!(stats.member_count, 1);
        assert_eq!(stats.recharge_count, 1);
        assert_eq!(stats.consume_count, 1);
        assert_eq!(stats.latest_consume_at, Some(receipt.record.created_at));
        Ok(())
    }
}

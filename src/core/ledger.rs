//! Balance mutator - Recharge and consume as single atomic units.
//!
//! Each call validates its amount, takes the member's write lock, then inside
//! one database transaction reads the balance, checks it, writes the new
//! balance and appends the audit record. Any failure after the transaction
//! starts rolls the whole unit back.

use crate::{
    core::{
        money,
        records::{AuditRecord, RecordKind},
        store::LedgerStore,
    },
    entities::{Member, MemberColumn, consume_record, recharge_record},
    errors::{Error, Result},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{DatabaseTransaction, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::Serialize;
use tracing::{info, instrument, warn};

/// Outcome of a committed recharge or consume
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceReceipt {
    /// Member balance after the operation
    pub new_balance: Decimal,
    /// The appended audit record
    pub record: AuditRecord,
}

/// Credits `amount` to a member.
///
/// `operator` falls back to the store's default label when absent or blank.
///
/// # Errors
/// - [`Error::InvalidAmount`] before any transaction starts
/// - [`Error::MemberNotFound`] if the member does not exist
/// - [`Error::StorageFailure`] if the transaction fails; nothing is applied
#[instrument(skip(store))]
pub async fn recharge(
    store: &LedgerStore,
    member_id: &str,
    amount: Decimal,
    operator: Option<&str>,
) -> Result<BalanceReceipt> {
    mutate(store, RecordKind::Recharge, member_id, amount, operator).await
}

/// Debits `amount` from a member.
///
/// # Errors
/// As [`recharge`], plus [`Error::InsufficientBalance`] when the balance is below `amount`.
#[instrument(skip(store))]
pub async fn consume(
    store: &LedgerStore,
    member_id: &str,
    amount: Decimal,
    operator: Option<&str>,
) -> Result<BalanceReceipt> {
    mutate(store, RecordKind::Consume, member_id, amount, operator).await
}

async fn mutate(
    store: &LedgerStore,
    kind: RecordKind,
    member_id: &str,
    amount: Decimal,
    operator: Option<&str>,
) -> Result<BalanceReceipt> {
    let amount = money::validate_amount(amount).inspect_err(|e| {
        warn!(%kind, member_id, error = %e, "Rejected balance change");
    })?;
    let operator = store.operator_or_default(operator);

    let _guard = store.lock_member(member_id).await;
    let txn = store.connection().begin().await?;

    let receipt = match apply_in_txn(&txn, kind, member_id, amount, &operator).await {
        Ok(receipt) => receipt,
        Err(e) => {
            warn!(%kind, member_id, %amount, error = %e, "Balance change rolled back");
            txn.rollback().await?;
            return Err(e);
        }
    };

    txn.commit().await?;

    info!(
        %kind,
        member_id,
        %amount,
        new_balance = %receipt.new_balance,
        operator = %receipt.record.operator,
        "Balance change committed"
    );
    Ok(receipt)
}

/// Applies one validated balance change inside `txn`.
///
/// The caller owns the transaction and the member lock. The balance write is
/// conditional on the value just read, so exactly one row is updated or the
/// unit fails with [`Error::StorageFailure`].
pub async fn apply_in_txn(
    txn: &DatabaseTransaction,
    kind: RecordKind,
    member_id: &str,
    amount: Decimal,
    operator: &str,
) -> Result<BalanceReceipt> {
    let member = Member::find_by_id(member_id.to_string())
        .one(txn)
        .await?
        .ok_or_else(|| Error::MemberNotFound {
            member_id: member_id.to_string(),
        })?;

    let amount_cents = money::to_cents(amount)?;
    let new_cents = match kind {
        RecordKind::Recharge => member
            .balance_cents
            .checked_add(amount_cents)
            .ok_or_else(|| Error::InvalidAmount {
                amount: amount.to_string(),
            })?,
        RecordKind::Consume => {
            if member.balance_cents < amount_cents {
                return Err(Error::InsufficientBalance {
                    current: member.balance(),
                    required: money::from_cents(amount_cents),
                });
            }
            member.balance_cents - amount_cents
        }
    };

    let now = Utc::now();
    let updated = Member::update_many()
        .col_expr(MemberColumn::BalanceCents, Expr::value(new_cents))
        .col_expr(MemberColumn::UpdatedAt, Expr::value(now))
        .filter(MemberColumn::MemberId.eq(member_id))
        .filter(MemberColumn::BalanceCents.eq(member.balance_cents))
        .exec(txn)
        .await?;
    if updated.rows_affected != 1 {
        return Err(Error::StorageFailure(DbErr::RecordNotUpdated));
    }

    let record: AuditRecord = match kind {
        RecordKind::Recharge => recharge_record::ActiveModel {
            member_id: Set(member.member_id.clone()),
            member_name: Set(member.name.clone()),
            amount_cents: Set(amount_cents),
            operator: Set(operator.to_string()),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(txn)
        .await?
        .into(),
        RecordKind::Consume => consume_record::ActiveModel {
            member_id: Set(member.member_id.clone()),
            member_name: Set(member.name.clone()),
            amount_cents: Set(amount_cents),
            operator: Set(operator.to_string()),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(txn)
        .await?
        .into(),
    };

    Ok(BalanceReceipt {
        new_balance: money::from_cents(new_cents),
        record,
    })
}

//! Consume record entity - One debit taken from a member balance.
//!
//! Same shape as [`super::recharge_record`], kept in its own table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Consume record database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "consume_records")]
pub struct Model {
    /// Monotonically increasing surrogate key
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Member the debit was taken from
    pub member_id: String,
    /// Member name at the time of the consume
    pub member_name: String,
    /// Debited amount in cents, strictly positive
    pub amount_cents: i64,
    /// Who performed the consume
    pub operator: String,
    /// Logical time of the consume
    pub created_at: DateTimeUtc,
}

/// Audit and staff tables carry no enforced relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

//! Recharge record entity - One credit applied to a member balance.
//!
//! Rows are append-only. `member_id` is not a foreign key so that history
//! survives member deletion, and `member_name` is frozen at operation time.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Recharge record database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "recharge_records")]
pub struct Model {
    /// Monotonically increasing surrogate key
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Member the credit was applied to
    pub member_id: String,
    /// Member name at the time of the recharge
    pub member_name: String,
    /// Credited amount in cents, strictly positive
    pub amount_cents: i64,
    /// Who performed the recharge
    pub operator: String,
    /// Logical time of the recharge
    pub created_at: DateTimeUtc,
}

/// Audit and staff tables carry no enforced relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

//! Member entity - A billiard-hall member holding a prepaid balance.
//!
//! The balance is stored as integer cents so that SQLite never sees a float.
//! Use [`Model::balance`] to read it as a two-decimal amount.

use crate::core::money;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Member database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "members")]
pub struct Model {
    /// Business identity chosen at registration, immutable afterwards
    #[sea_orm(primary_key, auto_increment = false)]
    pub member_id: String,
    /// Display name, copied onto every audit record at operation time
    pub name: String,
    /// Contact phone
    pub phone: Option<String>,
    /// Gender label, `"male"` unless specified
    pub gender: Option<String>,
    /// Current balance in cents, never negative
    pub balance_cents: i64,
    /// When the member was registered
    pub created_at: DateTimeUtc,
    /// When the member row was last written
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// Current balance as a two-decimal amount
    #[must_use]
    pub fn balance(&self) -> Decimal {
        money::from_cents(self.balance_cents)
    }
}

/// Members have no enforced relations; audit records keep a plain copy of the id
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

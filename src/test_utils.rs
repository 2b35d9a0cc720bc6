//! Shared test utilities for `CueLedger`.
//!
//! This module provides common helper functions for setting up test stores
//! and creating test entities with sensible defaults.

use crate::{
    core::{
        employee::{self, EmployeeView, NewEmployee},
        ledger, member, money,
        store::LedgerStore,
    },
    entities::{self, employee::EmployeeRole},
    errors::Result,
};
use sea_orm::DatabaseConnection;

/// Password given to every employee created by [`create_test_employee`]
pub const TEST_PASSWORD: &str = "correct horse battery staple";

/// Creates an in-memory `SQLite` store with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_store() -> Result<LedgerStore> {
    LedgerStore::open("sqlite::memory:").await
}

/// Registers a member with a zero balance.
///
/// # Defaults
/// * `phone`: None
/// * `gender`: "male"
pub async fn create_test_member(
    store: &LedgerStore,
    member_id: &str,
    name: &str,
) -> Result<entities::member::Model> {
    member::create_member(
        store.connection(),
        member::NewMember {
            member_id: member_id.to_string(),
            name: name.to_string(),
            ..Default::default()
        },
    )
    .await
}

/// Registers a member and recharges `amount` (e.g. `"500.00"`), leaving one recharge record.
pub async fn funded_member(
    store: &LedgerStore,
    member_id: &str,
    name: &str,
    amount: &str,
) -> Result<entities::member::Model> {
    create_test_member(store, member_id, name).await?;
    ledger::recharge(store, member_id, money::parse_amount(amount)?, None).await?;
    member::require_member(store.connection(), member_id).await
}

/// Creates an active employee with [`TEST_PASSWORD`].
///
/// # Defaults
/// * `role`: employee
pub async fn create_test_employee(
    db: &DatabaseConnection,
    name: &str,
    phone: &str,
) -> Result<EmployeeView> {
    employee::create_employee(
        db,
        NewEmployee {
            name: name.to_string(),
            phone: phone.to_string(),
            password: TEST_PASSWORD.to_string(),
            role: EmployeeRole::Employee,
        },
    )
    .await
}

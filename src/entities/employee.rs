//! Employee entity - Staff accounts that operate the front desk.
//!
//! Passwords are stored as Argon2 PHC strings and are never serialized.

use crate::errors::Error;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Access level of an employee
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum EmployeeRole {
    /// Can manage employees and run restores
    #[sea_orm(string_value = "admin")]
    Admin,
    /// Front-desk staff
    #[sea_orm(string_value = "employee")]
    Employee,
}

impl FromStr for EmployeeRole {
    type Err = Error;

    fn from_str(s: &str) -> crate::errors::Result<Self> {
        match s.trim() {
            "admin" => Ok(Self::Admin),
            "employee" => Ok(Self::Employee),
            other => Err(Error::validation(format!(
                "Unknown role '{other}', expected 'admin' or 'employee'"
            ))),
        }
    }
}

/// Whether the account may log in
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum EmployeeStatus {
    /// Allowed to authenticate
    #[sea_orm(string_value = "active")]
    Active,
    /// Soft-disabled
    #[sea_orm(string_value = "inactive")]
    Inactive,
}

impl FromStr for EmployeeStatus {
    type Err = Error;

    fn from_str(s: &str) -> crate::errors::Result<Self> {
        match s.trim() {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other => Err(Error::validation(format!(
                "Unknown status '{other}', expected 'active' or 'inactive'"
            ))),
        }
    }
}

/// Employee database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "employees")]
pub struct Model {
    /// Numeric string id, allocated as `max + 1` starting at `"0"`
    #[sea_orm(primary_key, auto_increment = false)]
    pub employee_id: String,
    /// Display name
    pub name: String,
    /// Login phone number
    #[sea_orm(unique)]
    pub phone: String,
    /// Argon2 PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Access level
    pub role: EmployeeRole,
    /// Login permission
    pub status: EmployeeStatus,
    /// When the employee was created
    pub created_at: DateTimeUtc,
    /// When the employee row was last written
    pub updated_at: DateTimeUtc,
}

/// Audit and staff tables carry no enforced relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

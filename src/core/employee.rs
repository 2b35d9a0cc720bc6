//! Employee directory - Staff accounts, password management and login checks.
//!
//! Passwords are hashed with Argon2 and only ever compared through the
//! hasher; there is no plaintext fallback.

use crate::{
    entities::{
        Employee, EmployeeColumn, employee,
        employee::{EmployeeRole, EmployeeStatus},
    },
    errors::{Error, Result},
};
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, QuerySelect, Set, SqlErr, prelude::*};
use serde::Serialize;
use tracing::{info, warn};

/// Employee as returned to callers; never carries the password hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeView {
    /// Numeric string id
    pub employee_id: String,
    /// Display name
    pub name: String,
    /// Login phone
    pub phone: String,
    /// Access level
    pub role: EmployeeRole,
    /// Login permission
    pub status: EmployeeStatus,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last write time
    pub updated_at: DateTime<Utc>,
}

impl From<employee::Model> for EmployeeView {
    fn from(model: employee::Model) -> Self {
        Self {
            employee_id: model.employee_id,
            name: model.name,
            phone: model.phone,
            role: model.role,
            status: model.status,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Details for a new employee account
#[derive(Debug, Clone)]
pub struct NewEmployee {
    /// Display name
    pub name: String,
    /// Login phone, unique across employees
    pub phone: String,
    /// Plaintext password, hashed before storage
    pub password: String,
    /// Access level
    pub role: EmployeeRole,
}

/// Editable fields. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct EmployeeUpdate {
    /// New display name
    pub name: Option<String>,
    /// New login phone
    pub phone: Option<String>,
    /// New access level
    pub role: Option<EmployeeRole>,
    /// New login permission
    pub status: Option<EmployeeStatus>,
}

/// Hashes a password into an Argon2 PHC string
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| Error::PasswordHash {
            message: e.to_string(),
        })?;
    Ok(hash.to_string())
}

/// Checks a password against a stored PHC string. Unparseable hashes never match.
#[must_use]
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

fn required(value: &str, field: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::validation(format!("Employee {field} cannot be empty")));
    }
    Ok(value.to_string())
}

/// Inserts retried when a concurrent create claims the same id
const ID_ALLOCATION_ATTEMPTS: u32 = 10;

/// Next id: numeric maximum of existing ids plus one, starting at "0"
async fn next_employee_id<C>(db: &C) -> Result<String>
where
    C: ConnectionTrait,
{
    let ids: Vec<String> = Employee::find()
        .select_only()
        .column(EmployeeColumn::EmployeeId)
        .into_tuple()
        .all(db)
        .await?;

    let next = ids
        .iter()
        .filter_map(|id| id.parse::<u64>().ok())
        .max()
        .map_or(0, |max| max + 1);
    Ok(next.to_string())
}

async fn ensure_phone_free<C>(db: &C, phone: &str, except: Option<&str>) -> Result<()>
where
    C: ConnectionTrait,
{
    let mut select = Employee::find().filter(EmployeeColumn::Phone.eq(phone));
    if let Some(employee_id) = except {
        select = select.filter(EmployeeColumn::EmployeeId.ne(employee_id));
    }
    if select.one(db).await?.is_some() {
        return Err(Error::DuplicateKey {
            entity: "employee phone",
            key: phone.to_string(),
        });
    }
    Ok(())
}

async fn require_employee<C>(db: &C, employee_id: &str) -> Result<employee::Model>
where
    C: ConnectionTrait,
{
    Employee::find_by_id(employee_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| Error::EmployeeNotFound {
            employee_id: employee_id.to_string(),
        })
}

/// Creates an active employee account.
///
/// # Errors
/// [`Error::Validation`] for blank fields, [`Error::DuplicateKey`] when the phone is taken
/// (`employee phone`) or no free id was found after retrying (`employee id`).
pub async fn create_employee<C>(db: &C, new: NewEmployee) -> Result<EmployeeView>
where
    C: ConnectionTrait,
{
    let name = required(&new.name, "name")?;
    let phone = required(&new.phone, "phone")?;
    if new.password.is_empty() {
        return Err(Error::validation("Employee password cannot be empty"));
    }

    ensure_phone_free(db, &phone, None).await?;
    let password_hash = hash_password(&new.password)?;

    let mut attempt = 0;
    let model = loop {
        attempt += 1;
        let employee_id = next_employee_id(db).await?;
        let now = Utc::now();
        let inserted = employee::ActiveModel {
            employee_id: Set(employee_id.clone()),
            name: Set(name.clone()),
            phone: Set(phone.clone()),
            password_hash: Set(password_hash.clone()),
            role: Set(new.role),
            status: Set(EmployeeStatus::Active),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await;

        match inserted {
            Ok(model) => break model,
            Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                // Either the phone was registered meanwhile or another
                // create took this id; only the latter is retried
                ensure_phone_free(db, &phone, None).await?;
                if attempt >= ID_ALLOCATION_ATTEMPTS {
                    return Err(Error::DuplicateKey {
                        entity: "employee id",
                        key: employee_id,
                    });
                }
                warn!(employee_id = %employee_id, attempt, "Employee id taken concurrently, retrying");
            }
            Err(err) => return Err(err.into()),
        }
    };

    info!(employee_id = %model.employee_id, role = ?model.role, "Employee created");
    Ok(model.into())
}

/// Point lookup by employee id
pub async fn get_employee<C>(db: &C, employee_id: &str) -> Result<Option<EmployeeView>>
where
    C: ConnectionTrait,
{
    Ok(Employee::find_by_id(employee_id.to_string())
        .one(db)
        .await?
        .map(Into::into))
}

/// All employees, newest first
pub async fn list_employees<C>(db: &C) -> Result<Vec<EmployeeView>>
where
    C: ConnectionTrait,
{
    Ok(Employee::find()
        .order_by_desc(EmployeeColumn::CreatedAt)
        .all(db)
        .await?
        .into_iter()
        .map(Into::into)
        .collect())
}

/// Updates profile, role or status.
///
/// # Errors
/// [`Error::EmployeeNotFound`], [`Error::Validation`] for a blank name or phone,
/// [`Error::DuplicateKey`] when the new phone belongs to another employee.
pub async fn update_employee<C>(db: &C, employee_id: &str, update: EmployeeUpdate) -> Result<EmployeeView>
where
    C: ConnectionTrait,
{
    let existing = require_employee(db, employee_id).await?;
    let mut phone_key = existing.phone.clone();
    let mut active: employee::ActiveModel = existing.into();

    if let Some(name) = update.name {
        active.name = Set(required(&name, "name")?);
    }
    if let Some(phone) = update.phone {
        let phone = required(&phone, "phone")?;
        ensure_phone_free(db, &phone, Some(employee_id)).await?;
        phone_key.clone_from(&phone);
        active.phone = Set(phone);
    }
    if let Some(role) = update.role {
        active.role = Set(role);
    }
    if let Some(status) = update.status {
        active.status = Set(status);
    }
    active.updated_at = Set(Utc::now());

    let model = active
        .update(db)
        .await
        .map_err(|e| Error::from_write(e, "employee phone", &phone_key))?;
    info!(employee_id, status = ?model.status, "Employee updated");
    Ok(model.into())
}

/// Replaces the password after checking the current one.
///
/// # Errors
/// [`Error::EmployeeNotFound`], [`Error::InvalidCredentials`] when `old_password` is wrong.
pub async fn change_password<C>(db: &C, employee_id: &str, old_password: &str, new_password: &str) -> Result<()>
where
    C: ConnectionTrait,
{
    if new_password.is_empty() {
        return Err(Error::validation("New password cannot be empty"));
    }

    let existing = require_employee(db, employee_id).await?;
    if !verify_password(old_password, &existing.password_hash) {
        warn!(employee_id, "Password change rejected");
        return Err(Error::InvalidCredentials);
    }

    let mut active: employee::ActiveModel = existing.into();
    active.password_hash = Set(hash_password(new_password)?);
    active.updated_at = Set(Utc::now());
    active.update(db).await?;

    info!(employee_id, "Employee password changed");
    Ok(())
}

/// Hard-deletes an employee.
///
/// # Errors
/// [`Error::EmployeeNotFound`] when nothing was deleted.
pub async fn delete_employee<C>(db: &C, employee_id: &str) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = Employee::delete_by_id(employee_id.to_string())
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::EmployeeNotFound {
            employee_id: employee_id.to_string(),
        });
    }
    info!(employee_id, "Employee deleted");
    Ok(())
}

/// Checks a phone/password pair for an active employee.
///
/// # Errors
/// [`Error::InvalidCredentials`] for an unknown phone, an inactive account or a wrong password.
pub async fn authenticate<C>(db: &C, phone: &str, password: &str) -> Result<EmployeeView>
where
    C: ConnectionTrait,
{
    let found = Employee::find()
        .filter(EmployeeColumn::Phone.eq(phone.trim()))
        .one(db)
        .await?;

    match found {
        Some(model)
            if model.status == EmployeeStatus::Active
                && verify_password(password, &model.password_hash) =>
        {
            info!(employee_id = %model.employee_id, "Employee authenticated");
            Ok(model.into())
        }
        _ => {
            warn!("Authentication failed");
            Err(Error::InvalidCredentials)
        }
    }
}

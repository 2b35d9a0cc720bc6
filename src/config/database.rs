//! Database configuration module.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated with `Schema::create_table_from_entity`, so the database
//! schema always matches the entity definitions without hand-written SQL.

use crate::entities::{ConsumeRecord, Employee, Member, RechargeRecord};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};
use std::path::Path;
use tracing::{debug, info};

/// Default database location used when neither the config file nor `DATABASE_URL` set one
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/cue_ledger.sqlite?mode=rwc";

/// Establishes a connection to the `SQLite` database at `database_url`.
///
/// For file-backed URLs the parent directory is created first, since `SQLite`
/// only creates the file itself.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    if let Some(parent) = sqlite_file_parent(database_url) {
        debug!("Ensuring database directory {:?} exists", parent);
        std::fs::create_dir_all(parent)?;
    }

    Database::connect(database_url).await.map_err(Into::into)
}

/// Creates all ledger tables if they do not exist yet.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut member_table = schema.create_table_from_entity(Member);
    let mut recharge_table = schema.create_table_from_entity(RechargeRecord);
    let mut consume_table = schema.create_table_from_entity(ConsumeRecord);
    let mut employee_table = schema.create_table_from_entity(Employee);

    db.execute(builder.build(member_table.if_not_exists())).await?;
    db.execute(builder.build(recharge_table.if_not_exists())).await?;
    db.execute(builder.build(consume_table.if_not_exists())).await?;
    db.execute(builder.build(employee_table.if_not_exists())).await?;

    info!("Ledger tables ensured");
    Ok(())
}

fn sqlite_file_parent(database_url: &str) -> Option<&Path> {
    let path = database_url.strip_prefix("sqlite://")?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() || path.contains(":memory:") {
        return None;
    }
    Path::new(path)
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{
        consume_record::Model as ConsumeRecordModel, employee::Model as EmployeeModel,
        member::Model as MemberModel, recharge_record::Model as RechargeRecordModel,
    };
    use sea_orm::{EntityTrait, QuerySelect};

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Test that tables exist by querying them
        let _: Vec<MemberModel> = Member::find().limit(1).all(&db).await?;
        let _: Vec<RechargeRecordModel> = RechargeRecord::find().limit(1).all(&db).await?;
        let _: Vec<ConsumeRecordModel> = ConsumeRecord::find().limit(1).all(&db).await?;
        let _: Vec<EmployeeModel> = Employee::find().limit(1).all(&db).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_repeatable() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_file_database_creates_parent_directory() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let db_path = dir.path().join("nested").join("ledger.sqlite");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());

        let db = create_connection(&url).await?;
        create_tables(&db).await?;

        assert!(db_path.exists());
        Ok(())
    }

    #[test]
    fn test_sqlite_file_parent() {
        assert_eq!(
            sqlite_file_parent("sqlite://data/ledger.sqlite?mode=rwc"),
            Some(Path::new("data"))
        );
        assert_eq!(sqlite_file_parent("sqlite://ledger.sqlite"), None);
        assert_eq!(sqlite_file_parent("sqlite::memory:"), None);
    }
}

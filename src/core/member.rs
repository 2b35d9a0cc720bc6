//! Member directory - Registration, lookup, listing and profile edits.
//!
//! Balances are never written here. A new member starts at 0.00 and only the
//! balance mutator or a restore changes it afterwards.

use crate::{
    core::query::{MemberQuery, Page, contains_literal, search_term},
    entities::{Member, MemberColumn, member},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{Condition, PaginatorTrait, QueryOrder, QuerySelect, Set, prelude::*};
use tracing::{debug, info};

/// Gender recorded when registration does not specify one
pub const DEFAULT_GENDER: &str = "male";

/// Registration details for a new member
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewMember {
    /// Business id, unique and immutable
    pub member_id: String,
    /// Display name
    pub name: String,
    /// Contact phone
    pub phone: Option<String>,
    /// Gender label, defaults to [`DEFAULT_GENDER`]
    pub gender: Option<String>,
}

/// Editable profile fields. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberUpdate {
    /// New display name
    pub name: Option<String>,
    /// New phone; `Some(String::new())` clears it
    pub phone: Option<String>,
    /// New gender label
    pub gender: Option<String>,
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required_text(value: &str, field: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::validation(format!("Member {field} cannot be empty")));
    }
    Ok(value.to_string())
}

/// Registers a member with a zero balance.
///
/// # Errors
/// [`Error::Validation`] for a blank id or name, [`Error::DuplicateKey`] when the id exists.
pub async fn create_member<C>(db: &C, new: NewMember) -> Result<member::Model>
where
    C: ConnectionTrait,
{
    let member_id = required_text(&new.member_id, "id")?;
    let name = required_text(&new.name, "name")?;

    if Member::find_by_id(member_id.clone()).one(db).await?.is_some() {
        return Err(Error::DuplicateKey {
            entity: "member",
            key: member_id,
        });
    }

    let now = Utc::now();
    let model = member::ActiveModel {
        member_id: Set(member_id.clone()),
        name: Set(name),
        phone: Set(optional_text(new.phone)),
        gender: Set(Some(
            optional_text(new.gender).unwrap_or_else(|| DEFAULT_GENDER.to_string()),
        )),
        balance_cents: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .map_err(|e| Error::from_write(e, "member", &member_id))?;

    info!(member_id = %model.member_id, name = %model.name, "Member created");
    Ok(model)
}

/// Point lookup by member id
pub async fn get_member<C>(db: &C, member_id: &str) -> Result<Option<member::Model>>
where
    C: ConnectionTrait,
{
    Member::find_by_id(member_id.to_string())
        .one(db)
        .await
        .map_err(Into::into)
}

/// Like [`get_member`] but a missing member is an error.
///
/// # Errors
/// [`Error::MemberNotFound`] when no member has this id.
pub async fn require_member<C>(db: &C, member_id: &str) -> Result<member::Model>
where
    C: ConnectionTrait,
{
    get_member(db, member_id)
        .await?
        .ok_or_else(|| Error::MemberNotFound {
            member_id: member_id.to_string(),
        })
}

/// Lists members newest first, optionally filtered by a substring of id, name or phone.
pub async fn list_members<C>(db: &C, query: &MemberQuery) -> Result<Page<member::Model>>
where
    C: ConnectionTrait,
{
    let mut select = Member::find();
    if let Some(term) = search_term(query.search.as_ref()) {
        select = select.filter(
            Condition::any()
                .add(contains_literal(MemberColumn::MemberId, term))
                .add(contains_literal(MemberColumn::Name, term))
                .add(contains_literal(MemberColumn::Phone, term)),
        );
    }

    let total = select.clone().count(db).await?;
    let pagination = query.pagination;
    let records = select
        .order_by_desc(MemberColumn::CreatedAt)
        .order_by_asc(MemberColumn::MemberId)
        .offset(pagination.offset())
        .limit(pagination.page_size)
        .all(db)
        .await?;

    debug!(total, page = pagination.page, "Listed members");
    Ok(Page::new(records, total, pagination))
}

/// Applies profile edits. The id and balance cannot change here.
///
/// # Errors
/// [`Error::MemberNotFound`] for an unknown id, [`Error::Validation`] for a blank name.
pub async fn update_member<C>(db: &C, member_id: &str, update: MemberUpdate) -> Result<member::Model>
where
    C: ConnectionTrait,
{
    let existing = require_member(db, member_id).await?;
    let mut active: member::ActiveModel = existing.into();

    if let Some(name) = update.name {
        active.name = Set(required_text(&name, "name")?);
    }
    if let Some(phone) = update.phone {
        active.phone = Set(optional_text(Some(phone)));
    }
    if let Some(gender) = update.gender {
        active.gender = Set(optional_text(Some(gender)));
    }
    active.updated_at = Set(Utc::now());

    let model = active.update(db).await?;
    info!(member_id = %model.member_id, "Member updated");
    Ok(model)
}

/// Removes a member. Their recharge and consume records are kept.
///
/// # Errors
/// [`Error::MemberNotFound`] when nothing was deleted.
pub async fn delete_member<C>(db: &C, member_id: &str) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = Member::delete_by_id(member_id.to_string()).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(Error::MemberNotFound {
            member_id: member_id.to_string(),
        });
    }
    info!(member_id, "Member deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::query::Pagination;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_create_member_defaults() -> Result<()> {
        let store = setup_test_store().await?;
        let db = store.connection();

        let member = create_member(
            db,
            NewMember {
                member_id: " M001 ".to_string(),
                name: "Alice".to_string(),
                phone: Some("  ".to_string()),
                gender: None,
            },
        )
        .await?;

        assert_eq!(member.member_id, "M001");
        assert_eq!(member.balance_cents, 0);
        assert_eq!(member.balance().to_string(), "0.00");
        assert_eq!(member.gender.as_deref(), Some(DEFAULT_GENDER));
        assert_eq!(member.phone, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_member_duplicate_id() -> Result<()> {
        let store = setup_test_store().await?;
        create_test_member(&store, "M001", "Alice").await?;

        let result = create_test_member(&store, "M001", "Bob").await;
        assert!(matches!(
            result,
            Err(Error::DuplicateKey { entity: "member", .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_create_member_requires_name() -> Result<()> {
        let store = setup_test_store().await?;
        let result = create_test_member(&store, "M001", "   ").await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let result = create_test_member(&store, "", "Alice").await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_require_member_not_found() -> Result<()> {
        let store = setup_test_store().await?;
        let result = require_member(store.connection(), "missing").await;
        assert!(matches!(result, Err(Error::MemberNotFound { member_id }) if member_id == "missing"));
        Ok(())
    }

    #[tokio::test]
    async fn test_list_members_search_and_pagination() -> Result<()> {
        let store = setup_test_store().await?;
        let db = store.connection();
        for (id, name, phone) in [
            ("M001", "Alice", "13800000001"),
            ("M002", "Bob", "13800000002"),
            ("M003", "Alicia", "13900000003"),
        ] {
            create_member(
                db,
                NewMember {
                    member_id: id.to_string(),
                    name: name.to_string(),
                    phone: Some(phone.to_string()),
                    gender: None,
                },
            )
            .await?;
        }

        let all = list_members(db, &MemberQuery::default()).await?;
        assert_eq!(all.total, 3);
        assert_eq!(all.total_pages, 1);

        let by_name = list_members(
            db,
            &MemberQuery {
                search: Some("Ali".to_string()),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(by_name.total, 2);

        let by_phone = list_members(
            db,
            &MemberQuery {
                search: Some("139".to_string()),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(by_phone.records[0].member_id, "M003");

        let second_page = list_members(
            db,
            &MemberQuery {
                search: None,
                pagination: Pagination::new(2, 2),
            },
        )
        .await?;
        assert_eq!(second_page.records.len(), 1);
        assert_eq!(second_page.total_pages, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_search_wildcards_match_literally() -> Result<()> {
        let store = setup_test_store().await?;
        create_test_member(&store, "M001", "Alice").await?;
        create_test_member(&store, "VIP_01", "Bob 100%").await?;

        let search = |term: &str| MemberQuery {
            search: Some(term.to_string()),
            ..Default::default()
        };
        let db = store.connection();

        assert_eq!(list_members(db, &search("%")).await?.total, 1);
        assert_eq!(list_members(db, &search("_")).await?.records[0].member_id, "VIP_01");
        assert_eq!(list_members(db, &search("0%")).await?.total, 1);
        assert_eq!(list_members(db, &search("A%e")).await?.total, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_member_keeps_balance() -> Result<()> {
        let store = setup_test_store().await?;
        let member = funded_member(&store, "M001", "Alice", "500.00").await?;

        let updated = update_member(
            store.connection(),
            "M001",
            MemberUpdate {
                name: Some("Alice Chen".to_string()),
                phone: Some("13800000001".to_string()),
                gender: Some("female".to_string()),
            },
        )
        .await?;

        assert_eq!(updated.name, "Alice Chen");
        assert_eq!(updated.gender.as_deref(), Some("female"));
        assert_eq!(updated.balance_cents, member.balance_cents);
        assert!(updated.updated_at >= member.updated_at);

        let blank = update_member(
            store.connection(),
            "M001",
            MemberUpdate {
                name: Some(String::new()),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(blank, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_member() -> Result<()> {
        let store = setup_test_store().await?;
        create_test_member(&store, "M001", "Alice").await?;

        delete_member(store.connection(), "M001").await?;
        assert!(get_member(store.connection(), "M001").await?.is_none());

        let again = delete_member(store.connection(), "M001").await;
        assert!(matches!(again, Err(Error::MemberNotFound { .. })));
        Ok(())
    }
}

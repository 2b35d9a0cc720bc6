//! Entity module - `SeaORM` definitions for every ledger table.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod consume_record;
pub mod employee;
pub mod member;
pub mod recharge_record;

// Re-export specific types to avoid conflicts
pub use consume_record::{
    Column as ConsumeRecordColumn, Entity as ConsumeRecord, Model as ConsumeRecordModel,
};
pub use employee::{Column as EmployeeColumn, Entity as Employee, Model as EmployeeModel};
pub use member::{Column as MemberColumn, Entity as Member, Model as MemberModel};
pub use recharge_record::{
    Column as RechargeRecordColumn, Entity as RechargeRecord, Model as RechargeRecordModel,
};

//! # greenpoints-store
//!
//! Persistent account storage for GreenPoints, backed by SQLite.
//!
//! Accounts are partitioned into role buckets (`ADMIN`, `USER`, `EMPLOYEE`)
//! and every mutation runs as a single statement or transaction, so
//! concurrent writers cannot lose each other's updates. The crate exposes a
//! synchronous [`Database`] handle with typed helpers for each concern.

pub mod accounts;
pub mod database;
pub mod leaderboard;
pub mod metadata;
pub mod migrations;
pub mod models;
pub mod moderation;
pub mod points;
pub mod sessions;
pub mod snapshot;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;

#[cfg(test)]
pub(crate) mod test_support {
    use greenpoints_shared::types::{Gender, NodeId, Role};

    use crate::models::NewAccount;

    /// Account named `Name <id>` with security key `s3cret`.
    pub(crate) fn new_account(id: &str, role: Role) -> NewAccount {
        NewAccount {
            id: NodeId::new(id).unwrap(),
            name: format!("Name {id}"),
            role,
            gender: Gender::Male,
            secret: "s3cret".into(),
        }
    }
}

//! Suspension and notices.
//!
//! Toggling a ban and posting a notice address the `USER` bucket only;
//! identities in other buckets are reported as not found.

use greenpoints_shared::types::{validate_notice, NodeId, Profile};
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::metadata::touch_last_sync;

impl Database {
    /// Flip the suspension flag of a user account.
    pub fn toggle_ban(&self, id: &NodeId) -> Result<Profile> {
        let profile = self.user_update(
            id,
            "UPDATE accounts SET is_banned = NOT is_banned WHERE id = ?1 AND role = 'USER'",
            params![id.as_str()],
        )?;
        tracing::info!(id = %id, banned = profile.is_banned, "suspension toggled");
        Ok(profile)
    }

    /// Set the suspension flag of any account explicitly.
    pub fn set_banned(&self, id: &NodeId, banned: bool) -> Result<Profile> {
        let profile = self.update_and_fetch(
            id,
            "UPDATE accounts SET is_banned = ?1 WHERE id = ?2",
            &banned,
        )?;
        tracing::info!(id = %id, banned, "suspension set");
        Ok(profile)
    }

    /// Post a notice to a user account, replacing any previous one.
    pub fn set_notice(&self, id: &NodeId, notice: &str) -> Result<Profile> {
        validate_notice(notice)?;
        let profile = self.user_update(
            id,
            "UPDATE accounts SET notice = ?2 WHERE id = ?1 AND role = 'USER'",
            params![id.as_str(), notice],
        )?;
        tracing::info!(id = %id, "notice posted");
        Ok(profile)
    }

    /// Acknowledge (remove) the notice on any account.
    pub fn clear_notice(&self, id: &NodeId) -> Result<Profile> {
        let tx = self.conn().unchecked_transaction()?;
        let affected = tx.execute(
            "UPDATE accounts SET notice = NULL WHERE id = ?1",
            params![id.as_str()],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        touch_last_sync(&tx)?;
        tx.commit()?;
        self.get_profile(id)
    }

    fn user_update(&self, id: &NodeId, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Profile> {
        let tx = self.conn().unchecked_transaction()?;
        if tx.execute(sql, args)? == 0 {
            return Err(StoreError::NotFound);
        }
        touch_last_sync(&tx)?;
        tx.commit()?;
        self.get_profile(id)
    }
}

#[cfg(test)]
mod tests {
    use greenpoints_shared::types::Role;

    use super::*;
    use crate::test_support::new_account;

    #[test]
    fn toggle_ban_flips_flag() {
        let db = Database::open_in_memory().unwrap();
        let p = db.register_account(&new_account("ID-1", Role::User)).unwrap();

        assert!(db.toggle_ban(&p.id).unwrap().is_banned);
        assert!(!db.toggle_ban(&p.id).unwrap().is_banned);
    }

    #[test]
    fn toggle_ban_only_touches_user_bucket() {
        let db = Database::open_in_memory().unwrap();
        let admin = db.register_account(&new_account("MGR-1", Role::Admin)).unwrap();

        assert!(matches!(db.toggle_ban(&admin.id), Err(StoreError::NotFound)));
        assert!(!db.get_profile(&admin.id).unwrap().is_banned);

        // Explicit set works on any bucket.
        assert!(db.set_banned(&admin.id, true).unwrap().is_banned);
    }

    #[test]
    fn notice_lifecycle() {
        let db = Database::open_in_memory().unwrap();
        let p = db.register_account(&new_account("ID-1", Role::User)).unwrap();

        let p2 = db.set_notice(&p.id, "Please empty bin 4").unwrap();
        assert_eq!(p2.notice.as_deref(), Some("Please empty bin 4"));

        let p3 = db.set_notice(&p.id, "Second notice").unwrap();
        assert_eq!(p3.notice.as_deref(), Some("Second notice"));

        assert!(db.clear_notice(&p.id).unwrap().notice.is_none());
    }

    #[test]
    fn notice_limits() {
        let db = Database::open_in_memory().unwrap();
        let p = db.register_account(&new_account("ID-1", Role::User)).unwrap();
        let emp = db.register_account(&new_account("EMP-1", Role::Employee)).unwrap();

        assert!(matches!(
            db.set_notice(&p.id, &"x".repeat(1001)),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            db.set_notice(&emp.id, "hi"),
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            db.clear_notice(&NodeId::new("ghost").unwrap()),
            Err(StoreError::NotFound)
        ));
    }
}

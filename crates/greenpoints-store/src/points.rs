//! XP crediting. One transaction per credit: read, check bounds, write.

use greenpoints_shared::constants::{MAX_UNITS_PER_CREDIT, XP_PER_UNIT};
use greenpoints_shared::types::NodeId;
use rusqlite::params;

use crate::accounts::{row_to_profile, to_sql_counter, PROFILE_COLUMNS};
use crate::database::Database;
use crate::error::{not_found, Result, StoreError};
use crate::metadata::touch_last_sync;
use crate::models::CreditReceipt;

impl Database {
    /// Credit `units` recycled bottles to an account: `bottles += units`,
    /// `points += units * XP_PER_UNIT`.
    ///
    /// Locked-out accounts are rejected (a banned admin keeps access, as
    /// it does at sign-in); counters never wrap.
    pub fn credit_units(&self, id: &NodeId, units: u64) -> Result<CreditReceipt> {
        if units == 0 || units > MAX_UNITS_PER_CREDIT {
            return Err(StoreError::InvalidUnits {
                units,
                max: MAX_UNITS_PER_CREDIT,
            });
        }
        let xp = units
            .checked_mul(XP_PER_UNIT)
            .ok_or_else(|| StoreError::CounterOverflow("points".into()))?;

        let tx = self.conn().unchecked_transaction()?;
        let current = tx
            .query_row(
                &format!("SELECT {PROFILE_COLUMNS} FROM accounts WHERE id = ?1"),
                params![id.as_str()],
                row_to_profile,
            )
            .map_err(not_found)?;

        if current.is_locked_out() {
            return Err(StoreError::Suspended(id.to_string()));
        }

        let points = current
            .points
            .checked_add(xp)
            .ok_or_else(|| StoreError::CounterOverflow("points".into()))?;
        let bottles = current
            .bottles
            .checked_add(units)
            .ok_or_else(|| StoreError::CounterOverflow("bottles".into()))?;

        tx.execute(
            "UPDATE accounts SET points = ?1, bottles = ?2 WHERE id = ?3",
            params![
                to_sql_counter("points", points)?,
                to_sql_counter("bottles", bottles)?,
                id.as_str(),
            ],
        )?;
        touch_last_sync(&tx)?;
        tx.commit()?;

        tracing::info!(id = %id, units, xp, points, "recycling credited");

        let mut profile = current;
        profile.points = points;
        profile.bottles = bottles;
        Ok(CreditReceipt {
            profile,
            units,
            xp_awarded: xp,
        })
    }
}

#[cfg(test)]
mod tests {
    use greenpoints_shared::types::Role;

    use super::*;
    use crate::test_support::new_account;

    #[test]
    fn credit_awards_25_xp_per_unit() {
        let db = Database::open_in_memory().unwrap();
        let p = db.register_account(&new_account("ID-1", Role::User)).unwrap();

        let receipt = db.credit_units(&p.id, 1).unwrap();
        assert_eq!(receipt.xp_awarded, 25);
        assert_eq!(receipt.profile.points, 25);
        assert_eq!(receipt.profile.bottles, 1);

        let receipt = db.credit_units(&p.id, 3).unwrap();
        assert_eq!(receipt.xp_awarded, 75);
        assert_eq!(receipt.profile.points, 100);
        assert_eq!(receipt.profile.bottles, 4);

        let stored = db.get_profile(&p.id).unwrap();
        assert_eq!((stored.points, stored.bottles), (100, 4));
    }

    #[test]
    fn credit_rejects_bad_units() {
        let db = Database::open_in_memory().unwrap();
        let p = db.register_account(&new_account("ID-1", Role::User)).unwrap();

        assert!(matches!(
            db.credit_units(&p.id, 0),
            Err(StoreError::InvalidUnits { units: 0, .. })
        ));
        assert!(matches!(
            db.credit_units(&p.id, 101),
            Err(StoreError::InvalidUnits { units: 101, .. })
        ));
    }

    #[test]
    fn credit_unknown_account() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.credit_units(&NodeId::new("ghost").unwrap(), 1),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn suspended_accounts_do_not_accrue() {
        let db = Database::open_in_memory().unwrap();
        let p = db.register_account(&new_account("ID-1", Role::User)).unwrap();
        db.set_banned(&p.id, true).unwrap();

        assert!(matches!(
            db.credit_units(&p.id, 1),
            Err(StoreError::Suspended(_))
        ));
        assert_eq!(db.get_profile(&p.id).unwrap().points, 0);
    }

    #[test]
    fn banned_admin_still_accrues() {
        let db = Database::open_in_memory().unwrap();
        let admin = db.register_account(&new_account("MGR-1", Role::Admin)).unwrap();
        db.set_banned(&admin.id, true).unwrap();

        let receipt = db.credit_units(&admin.id, 2).unwrap();
        assert_eq!(receipt.profile.points, 50);
        assert!(receipt.profile.is_banned);
    }

    #[test]
    fn counters_never_wrap() {
        let db = Database::open_in_memory().unwrap();
        let p = db.register_account(&new_account("ID-1", Role::User)).unwrap();
        db.conn()
            .execute(
                "UPDATE accounts SET points = ?1 WHERE id = 'ID-1'",
                params![i64::MAX - 10],
            )
            .unwrap();

        assert!(matches!(
            db.credit_units(&p.id, 1),
            Err(StoreError::CounterOverflow(field)) if field == "points"
        ));
    }
}

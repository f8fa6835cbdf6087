//! Ranking and network-wide totals.

use greenpoints_shared::types::carbon_offset_kg;
use rusqlite::params;

use crate::accounts::{row_to_profile, PROFILE_COLUMNS};
use crate::database::Database;
use crate::error::Result;
use crate::models::{LeaderboardEntry, NetworkStats};

impl Database {
    /// Top `limit` accounts of the USER bucket by points, ties broken by
    /// bottles then identity.
    pub fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {PROFILE_COLUMNS} FROM accounts
             WHERE role = 'USER'
             ORDER BY points DESC, bottles DESC, id ASC
             LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit], row_to_profile)?;

        let mut entries = Vec::new();
        for (i, row) in rows.enumerate() {
            let p = row?;
            entries.push(LeaderboardEntry {
                position: i + 1,
                rank: p.rank(),
                carbon_offset_kg: p.carbon_offset_kg(),
                id: p.id,
                name: p.name,
                points: p.points,
                bottles: p.bottles,
                profile_image: p.profile_image,
            });
        }
        Ok(entries)
    }

    pub fn network_stats(&self) -> Result<NetworkStats> {
        let (admins, users, employees, banned, points, bottles): (i64, i64, i64, i64, i64, i64) =
            self.conn().query_row(
                "SELECT
                    COUNT(CASE WHEN role = 'ADMIN' THEN 1 END),
                    COUNT(CASE WHEN role = 'USER' THEN 1 END),
                    COUNT(CASE WHEN role = 'EMPLOYEE' THEN 1 END),
                    COUNT(CASE WHEN is_banned THEN 1 END),
                    COALESCE(SUM(points), 0),
                    COALESCE(SUM(bottles), 0)
                 FROM accounts",
                [],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )?;

        // Counts and sums of non-negative columns
        let total_bottles = bottles.max(0) as u64;
        Ok(NetworkStats {
            admins: admins.max(0) as u64,
            users: users.max(0) as u64,
            employees: employees.max(0) as u64,
            banned: banned.max(0) as u64,
            total_points: points.max(0) as u64,
            total_bottles,
            carbon_offset_kg: carbon_offset_kg(total_bottles),
        })
    }
}

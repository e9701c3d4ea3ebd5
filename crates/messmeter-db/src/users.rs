use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use messmeter_core::error::RedeemError;
use messmeter_types::api::LeaderboardEntry;
use messmeter_types::models::{Role, TxSource, UserProfile};

use crate::models::UserRow;
use crate::{ledger, Database};

const USER_COLUMNS: &str = "id, username, password, display_name, room, role, points, \
     streak_days, best_streak, last_attendance_date, created_at";

impl Database {
    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        password_hash: &str,
        display_name: &str,
        room: &str,
        role: Role,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, password, display_name, room, role)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                (id, username, password_hash, display_name, room, role.as_str()),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn get_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>> {
        match self.get_user_by_id(&user_id.to_string())? {
            Some(row) => Ok(Some(row.into_profile()?)),
            None => Ok(None),
        }
    }

    /// Create the bootstrap admin account, or promote an existing account of
    /// that name. Called once at startup from env config.
    pub fn ensure_admin(&self, username: &str, password_hash: &str) -> Result<Uuid> {
        if let Some(existing) = self.get_user_by_username(username)? {
            self.with_conn(|conn| {
                conn.execute(
                    "UPDATE users SET role = 'admin' WHERE username = ?1",
                    [username],
                )?;
                Ok(())
            })?;
            return Ok(existing.id.parse()?);
        }

        let id = Uuid::new_v4();
        self.create_user(
            &id.to_string(),
            username,
            password_hash,
            "Mess Admin",
            "",
            Role::Admin,
        )?;
        Ok(id)
    }

    pub fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, display_name, room, points, streak_days
                 FROM users
                 WHERE role = 'student'
                 ORDER BY points DESC, display_name ASC
                 LIMIT ?1",
            )?;

            let rows = stmt
                .query_map([limit], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(id, display_name, room, points, streak_days)| {
                    Ok(LeaderboardEntry {
                        user_id: id.parse()?,
                        display_name,
                        room,
                        points,
                        streak_days: streak_days.max(0) as u32,
                    })
                })
                .collect()
        })
    }

    /// Redeem a reward. Balance sufficiency is checked inside the same
    /// transaction that appends the deduction, so concurrent redemptions
    /// cannot both pass the check against a stale read.
    pub fn redeem(&self, user_id: Uuid, reward: &str, cost: i64) -> Result<i64, RedeemError> {
        let mut conn = self.lock().map_err(RedeemError::Store)?;
        let tx = conn.transaction().map_err(RedeemError::store)?;
        let uid = user_id.to_string();

        let balance: i64 = tx
            .query_row("SELECT points FROM users WHERE id = ?1", [&uid], |row| {
                row.get(0)
            })
            .optional()
            .map_err(RedeemError::store)?
            .ok_or(RedeemError::UnknownUser)?;

        if balance < cost {
            return Err(RedeemError::InsufficientBalance { balance, cost });
        }

        ledger::append(
            &tx,
            &uid,
            -cost,
            &format!("Redeemed: {}", reward),
            TxSource::Redemption,
            None,
        )
        .map_err(RedeemError::Store)?;

        tx.commit().map_err(RedeemError::store)?;
        Ok(balance - cost)
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, column);
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                display_name: row.get(3)?,
                room: row.get(4)?,
                role: row.get(5)?,
                points: row.get(6)?,
                streak_days: row.get(7)?,
                best_streak: row.get(8)?,
                last_attendance_date: row.get(9)?,
                created_at: row.get(10)?,
            })
        })
        .optional()?;

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_with_user(points: i64) -> (Database, Uuid) {
        let db = Database::open_in_memory().unwrap();
        let id = Uuid::new_v4();
        db.create_user(&id.to_string(), "ravi", "hash", "Ravi", "A-101", Role::Student)
            .unwrap();
        if points != 0 {
            db.apply_transaction(id, points, "seed", TxSource::Adjustment, None)
                .unwrap();
        }
        (db, id)
    }

    #[test]
    fn redeem_deducts_and_logs() {
        let (db, user) = db_with_user(20);
        let balance = db.redeem(user, "Coffee voucher", 15).unwrap();
        assert_eq!(balance, 5);
        assert_eq!(db.get_balance(user).unwrap(), 5);
        assert_eq!(db.ledger_sum(user).unwrap(), 5);
    }

    #[test]
    fn redeem_with_insufficient_balance_changes_nothing() {
        let (db, user) = db_with_user(10);
        let err = db.redeem(user, "Coffee voucher", 15).unwrap_err();
        assert!(matches!(
            err,
            RedeemError::InsufficientBalance { balance: 10, cost: 15 }
        ));
        assert_eq!(db.get_balance(user).unwrap(), 10);
        assert_eq!(db.get_transactions(user, 10).unwrap().len(), 1); // seed only
    }

    #[test]
    fn ensure_admin_promotes_existing_account() {
        let (db, user) = db_with_user(0);
        let admin_id = db.ensure_admin("ravi", "other-hash").unwrap();
        assert_eq!(admin_id, user);
        let profile = db.get_profile(user).unwrap().unwrap();
        assert_eq!(profile.role, Role::Admin);
    }

    #[test]
    fn leaderboard_orders_by_points() {
        let (db, first) = db_with_user(5);
        let second = Uuid::new_v4();
        db.create_user(&second.to_string(), "meera", "hash", "Meera", "C-4", Role::Student)
            .unwrap();
        db.apply_transaction(second, 12, "seed", TxSource::Adjustment, None)
            .unwrap();

        let board = db.leaderboard(10).unwrap();
        assert_eq!(board[0].user_id, second);
        assert_eq!(board[1].user_id, first);
    }
}

use anyhow::Result;
use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use messmeter_types::models::{PointTransaction, TxDirection, TxSource};

use crate::models::TransactionRow;
use crate::Database;

/// Append one ledger entry and move the user's balance, inside the caller's
/// transaction. Returns false when `source_key` was already recorded — the
/// grant is a retry and must not apply a second time.
pub(crate) fn append(
    conn: &Connection,
    user_id: &str,
    signed_amount: i64,
    reason: &str,
    source: TxSource,
    source_key: Option<&str>,
) -> Result<bool> {
    let (direction, amount) = if signed_amount >= 0 {
        (TxDirection::Earned, signed_amount)
    } else {
        (TxDirection::Lost, -signed_amount)
    };

    let inserted = conn.execute(
        "INSERT OR IGNORE INTO point_transactions
            (id, user_id, direction, amount, reason, source, source_key, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            Uuid::new_v4().to_string(),
            user_id,
            direction.as_str(),
            amount,
            reason,
            source.as_str(),
            source_key,
            Utc::now().to_rfc3339(),
        ],
    )?;
    if inserted == 0 {
        return Ok(false);
    }

    let updated = conn.execute(
        "UPDATE users SET points = points + ?1 WHERE id = ?2",
        rusqlite::params![signed_amount, user_id],
    )?;
    if updated == 0 {
        anyhow::bail!("unknown user: {}", user_id);
    }
    Ok(true)
}

impl Database {
    /// Append a transaction and update the denormalized balance atomically.
    /// This layer never asserts the balance stays non-negative; redemption
    /// checks sufficiency before calling with a negative amount.
    pub fn apply_transaction(
        &self,
        user_id: Uuid,
        signed_amount: i64,
        reason: &str,
        source: TxSource,
        source_key: Option<&str>,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let applied = append(&tx, &user_id.to_string(), signed_amount, reason, source, source_key)?;
            tx.commit()?;
            Ok(applied)
        })
    }

    pub fn get_transactions(&self, user_id: Uuid, limit: u32) -> Result<Vec<PointTransaction>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, direction, amount, reason, source, source_key, created_at
                 FROM point_transactions
                 WHERE user_id = ?1
                 ORDER BY created_at DESC
                 LIMIT ?2",
            )?;

            let rows = stmt
                .query_map(rusqlite::params![user_id.to_string(), limit], |row| {
                    Ok(TransactionRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        direction: row.get(2)?,
                        amount: row.get(3)?,
                        reason: row.get(4)?,
                        source: row.get(5)?,
                        source_key: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(|r| r.into_transaction()).collect()
        })
    }

    /// Signed ledger sum for a user. Reconciliation tooling compares this
    /// against the denormalized `users.points` balance.
    pub fn ledger_sum(&self, user_id: Uuid) -> Result<i64> {
        self.with_conn(|conn| {
            let sum = conn.query_row(
                "SELECT COALESCE(SUM(CASE WHEN direction = 'lost' THEN -amount ELSE amount END), 0)
                 FROM point_transactions WHERE user_id = ?1",
                [user_id.to_string()],
                |row| row.get(0),
            )?;
            Ok(sum)
        })
    }

    pub fn get_balance(&self, user_id: Uuid) -> Result<i64> {
        self.with_conn(|conn| {
            let balance = conn.query_row(
                "SELECT points FROM users WHERE id = ?1",
                [user_id.to_string()],
                |row| row.get(0),
            )?;
            Ok(balance)
        })
    }
}

#[cfg(test)]
mod tests {
    use messmeter_types::models::Role;

    use super::*;

    fn db_with_user() -> (Database, Uuid) {
        let db = Database::open_in_memory().unwrap();
        let id = Uuid::new_v4();
        db.create_user(&id.to_string(), "asha", "hash", "Asha", "B-204", Role::Student)
            .unwrap();
        (db, id)
    }

    #[test]
    fn transaction_moves_the_balance() {
        let (db, user) = db_with_user();
        db.apply_transaction(user, 5, "test grant", TxSource::Adjustment, None)
            .unwrap();
        db.apply_transaction(user, -2, "test deduction", TxSource::Penalty, None)
            .unwrap();

        assert_eq!(db.get_balance(user).unwrap(), 3);
        assert_eq!(db.ledger_sum(user).unwrap(), 3);

        let txs = db.get_transactions(user, 10).unwrap();
        assert_eq!(txs.len(), 2);
        assert!(txs.iter().all(|t| t.amount >= 0));
    }

    #[test]
    fn keyed_grant_is_idempotent() {
        let (db, user) = db_with_user();
        let applied = db
            .apply_transaction(user, 10, "bonus", TxSource::Bonus, Some("streak:x:7:2025-06-07"))
            .unwrap();
        assert!(applied);

        let retried = db
            .apply_transaction(user, 10, "bonus", TxSource::Bonus, Some("streak:x:7:2025-06-07"))
            .unwrap();
        assert!(!retried);

        assert_eq!(db.get_balance(user).unwrap(), 10);
        assert_eq!(db.get_transactions(user, 10).unwrap().len(), 1);
    }

    #[test]
    fn unkeyed_grants_always_append() {
        let (db, user) = db_with_user();
        db.apply_transaction(user, 1, "a", TxSource::Adjustment, None).unwrap();
        db.apply_transaction(user, 1, "b", TxSource::Adjustment, None).unwrap();
        assert_eq!(db.get_balance(user).unwrap(), 2);
    }
}

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use messmeter_types::models::MealType;

use crate::Database;

/// The shared code of the day for one meal. Persisted so repeated requests
/// reuse the same code; only an explicit refresh rotates it.
#[derive(Debug, Clone)]
pub struct AdminQrCode {
    pub meal: MealType,
    pub date: NaiveDate,
    pub qr_id: Uuid,
    pub generated_at: DateTime<Utc>,
}

impl Database {
    pub fn get_or_create_admin_qr(&self, meal: MealType, date: NaiveDate) -> Result<AdminQrCode> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let id = format!("{}_{}", meal.as_str(), date);

            let existing = tx
                .query_row(
                    "SELECT qr_id, generated_at FROM admin_qr_codes WHERE id = ?1",
                    [&id],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
                )
                .optional()?;

            let code = match existing {
                Some((qr_id, generated_at)) => AdminQrCode {
                    meal,
                    date,
                    qr_id: qr_id.parse()?,
                    generated_at: crate::models::parse_timestamp(&generated_at),
                },
                None => {
                    let qr_id = Uuid::new_v4();
                    let now = Utc::now();
                    tx.execute(
                        "INSERT INTO admin_qr_codes (id, meal, date, qr_id, generated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![id, meal.as_str(), date.to_string(), qr_id.to_string(), now.to_rfc3339()],
                    )?;
                    AdminQrCode {
                        meal,
                        date,
                        qr_id,
                        generated_at: now,
                    }
                }
            };

            tx.commit()?;
            Ok(code)
        })
    }

    /// Rotate the code of the day: delete and regenerate. Any previously
    /// issued copy stops validating immediately.
    pub fn refresh_admin_qr(&self, meal: MealType, date: NaiveDate) -> Result<AdminQrCode> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let id = format!("{}_{}", meal.as_str(), date);
            let qr_id = Uuid::new_v4();
            let now = Utc::now();

            tx.execute("DELETE FROM admin_qr_codes WHERE id = ?1", [&id])?;
            tx.execute(
                "INSERT INTO admin_qr_codes (id, meal, date, qr_id, generated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, meal.as_str(), date.to_string(), qr_id.to_string(), now.to_rfc3339()],
            )?;

            tx.commit()?;
            Ok(AdminQrCode {
                meal,
                date,
                qr_id,
                generated_at: now,
            })
        })
    }

    /// Possession check for a scanned admin payload: the presented qr_id must
    /// match the code currently stored for (meal, date).
    pub fn admin_qr_matches(&self, meal: MealType, date: NaiveDate, qr_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let stored: Option<String> = conn
                .query_row(
                    "SELECT qr_id FROM admin_qr_codes WHERE id = ?1",
                    [format!("{}_{}", meal.as_str(), date)],
                    |row| row.get(0),
                )
                .optional()?;

            Ok(stored.as_deref() == Some(qr_id.to_string().as_str()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 10).unwrap()
    }

    #[test]
    fn code_of_the_day_is_reused() {
        let db = Database::open_in_memory().unwrap();
        let first = db.get_or_create_admin_qr(MealType::Lunch, day()).unwrap();
        let second = db.get_or_create_admin_qr(MealType::Lunch, day()).unwrap();
        assert_eq!(first.qr_id, second.qr_id);

        // Different meal gets its own code
        let dinner = db.get_or_create_admin_qr(MealType::Dinner, day()).unwrap();
        assert_ne!(first.qr_id, dinner.qr_id);
    }

    #[test]
    fn refresh_invalidates_the_old_code() {
        let db = Database::open_in_memory().unwrap();
        let old = db.get_or_create_admin_qr(MealType::Lunch, day()).unwrap();
        let new = db.refresh_admin_qr(MealType::Lunch, day()).unwrap();
        assert_ne!(old.qr_id, new.qr_id);

        assert!(!db.admin_qr_matches(MealType::Lunch, day(), old.qr_id).unwrap());
        assert!(db.admin_qr_matches(MealType::Lunch, day(), new.qr_id).unwrap());
    }

    #[test]
    fn unknown_code_never_matches() {
        let db = Database::open_in_memory().unwrap();
        assert!(!db
            .admin_qr_matches(MealType::Lunch, day(), Uuid::new_v4())
            .unwrap());
    }
}

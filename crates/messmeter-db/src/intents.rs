use anyhow::Result;
use chrono::{NaiveDate, NaiveTime, Utc};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use messmeter_core::error::IntentError;
use messmeter_core::window::MealTimeSettings;
use messmeter_types::api::IntentCounts;
use messmeter_types::models::{MealIntent, MealType};

use crate::Database;

impl Database {
    /// Record a student's intent to eat or skip one meal. The toggle window
    /// must be open; only the toggled meal's flag is written on conflict, so
    /// stale client state can never clobber the other two flags.
    pub fn set_meal_intent(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        meal: MealType,
        eating: bool,
        now: NaiveTime,
        settings: &MealTimeSettings,
    ) -> Result<(), IntentError> {
        if !settings.is_toggle_open(meal, now) {
            return Err(IntentError::ToggleWindowClosed {
                meal,
                opens_at: settings.for_meal(meal).toggle.start.to_string(),
            });
        }

        let conn = self.lock().map_err(IntentError::Store)?;
        let id = format!("{}_{}", user_id, date);
        let column = meal.as_str(); // static column names, one per meal

        let sql = format!(
            "INSERT INTO meal_intents (id, user_id, date, {col}, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET {col} = excluded.{col}, updated_at = excluded.updated_at",
            col = column
        );
        conn.execute(
            &sql,
            params![
                id,
                user_id.to_string(),
                date.to_string(),
                eating,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(IntentError::store)?;

        Ok(())
    }

    pub fn get_meal_intent(&self, user_id: Uuid, date: NaiveDate) -> Result<Option<MealIntent>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT breakfast, lunch, dinner FROM meal_intents WHERE id = ?1",
                    [format!("{}_{}", user_id, date)],
                    |row| {
                        Ok((
                            row.get::<_, bool>(0)?,
                            row.get::<_, bool>(1)?,
                            row.get::<_, bool>(2)?,
                        ))
                    },
                )
                .optional()?;

            Ok(row.map(|(breakfast, lunch, dinner)| MealIntent {
                user_id,
                date,
                breakfast,
                lunch,
                dinner,
            }))
        })
    }

    /// Expected headcount per meal for capacity planning dashboards.
    pub fn intent_counts(&self, date: NaiveDate) -> Result<IntentCounts> {
        self.with_conn(|conn| {
            let (breakfast, lunch, dinner) = conn.query_row(
                "SELECT COALESCE(SUM(breakfast), 0), COALESCE(SUM(lunch), 0), COALESCE(SUM(dinner), 0)
                 FROM meal_intents WHERE date = ?1",
                [date.to_string()],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )?;

            Ok(IntentCounts {
                date,
                breakfast: breakfast.max(0) as u32,
                lunch: lunch.max(0) as u32,
                dinner: dinner.max(0) as u32,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use messmeter_types::models::Role;

    use super::*;

    fn setup() -> (Database, Uuid, MealTimeSettings) {
        let db = Database::open_in_memory().unwrap();
        let id = Uuid::new_v4();
        db.create_user(&id.to_string(), "asha", "hash", "Asha", "B-204", Role::Student)
            .unwrap();
        (db, id, MealTimeSettings::default())
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    fn at(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    #[test]
    fn toggling_one_meal_leaves_the_others_alone() {
        let (db, user, settings) = setup();

        // Lunch toggle window is 07:00-11:00, dinner 11:00-17:00
        db.set_meal_intent(user, day(10), MealType::Lunch, true, at(9, 0), &settings)
            .unwrap();
        db.set_meal_intent(user, day(10), MealType::Dinner, true, at(12, 0), &settings)
            .unwrap();
        db.set_meal_intent(user, day(10), MealType::Lunch, false, at(10, 0), &settings)
            .unwrap();

        let intent = db.get_meal_intent(user, day(10)).unwrap().unwrap();
        assert!(!intent.breakfast);
        assert!(!intent.lunch);
        assert!(intent.dinner);
    }

    #[test]
    fn closed_toggle_window_is_rejected_with_opening_time() {
        let (db, user, settings) = setup();

        let err = db
            .set_meal_intent(user, day(10), MealType::Lunch, true, at(12, 30), &settings)
            .unwrap_err();

        match err {
            IntentError::ToggleWindowClosed { meal, opens_at } => {
                assert_eq!(meal, MealType::Lunch);
                assert_eq!(opens_at, "07:00");
            }
            other => panic!("expected ToggleWindowClosed, got {:?}", other),
        }
        assert!(db.get_meal_intent(user, day(10)).unwrap().is_none());
    }

    #[test]
    fn overnight_breakfast_toggle_works_late_evening() {
        let (db, user, settings) = setup();

        db.set_meal_intent(user, day(11), MealType::Breakfast, true, at(22, 0), &settings)
            .unwrap();
        let intent = db.get_meal_intent(user, day(11)).unwrap().unwrap();
        assert!(intent.breakfast);
    }

    #[test]
    fn counts_sum_across_users() {
        let (db, first, settings) = setup();
        let second = Uuid::new_v4();
        db.create_user(&second.to_string(), "meera", "hash", "Meera", "C-4", Role::Student)
            .unwrap();

        db.set_meal_intent(first, day(10), MealType::Lunch, true, at(9, 0), &settings)
            .unwrap();
        db.set_meal_intent(second, day(10), MealType::Lunch, true, at(9, 0), &settings)
            .unwrap();
        db.set_meal_intent(second, day(10), MealType::Dinner, true, at(12, 0), &settings)
            .unwrap();

        let counts = db.intent_counts(day(10)).unwrap();
        assert_eq!(counts.breakfast, 0);
        assert_eq!(counts.lunch, 2);
        assert_eq!(counts.dinner, 1);
    }
}

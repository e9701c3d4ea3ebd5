use anyhow::Result;
use chrono::{NaiveDate, NaiveTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use messmeter_core::config::PointsConfig;
use messmeter_core::error::CheckinError;
use messmeter_core::streak::{self, StreakState};
use messmeter_core::window::MealTimeSettings;
use messmeter_types::models::{MealAttendance, MealType, TxSource};

use crate::models::AttendanceRow;
use crate::{ledger, Database};

/// What a successful check-in did: points moved, streak state after the
/// advance, and whether a milestone bonus fired.
#[derive(Debug)]
pub struct CheckinOutcome {
    pub username: String,
    pub points_awarded: i64,
    pub streak_days: u32,
    pub best_streak: u32,
    pub milestone_bonus: Option<i64>,
    pub balance: i64,
}

impl Database {
    /// Record one attendance for (user, meal, date), exactly once.
    ///
    /// The attendance insert, the point grant, and the streak advance run in
    /// a single write transaction. De-duplication is the keyed insert itself:
    /// a concurrent scan from another device loses the race at the primary
    /// key, not at a separate existence query.
    pub fn record_attendance(
        &self,
        user_id: Uuid,
        meal: MealType,
        date: NaiveDate,
        now: NaiveTime,
        settings: &MealTimeSettings,
        scanned_by: &str,
        points: &PointsConfig,
    ) -> Result<CheckinOutcome, CheckinError> {
        if !settings.is_scan_open(meal, now) {
            return Err(CheckinError::ScanWindowClosed {
                meal,
                opens_at: settings.for_meal(meal).scan.start.to_string(),
            });
        }

        let mut conn = self.lock().map_err(CheckinError::Store)?;
        let tx = conn.transaction().map_err(CheckinError::store)?;
        let uid = user_id.to_string();

        // Snapshot the display identity onto the attendance row
        let username: String = tx
            .query_row("SELECT username FROM users WHERE id = ?1", [&uid], |row| {
                row.get(0)
            })
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    CheckinError::store(anyhow::anyhow!("unknown user: {}", uid))
                }
                e => CheckinError::store(e),
            })?;

        let key = format!("{}_{}_{}", uid, meal.as_str(), date);
        match tx.execute(
            "INSERT INTO meal_attendance (id, user_id, username, meal, date, scanned_at, scanned_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                key,
                uid,
                username,
                meal.as_str(),
                date.to_string(),
                Utc::now().to_rfc3339(),
                scanned_by,
            ],
        ) {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(CheckinError::DuplicateAttendance);
            }
            Err(e) => return Err(CheckinError::store(e)),
        }

        // Base attendance grant, keyed so a retried write cannot double-pay
        let granted = ledger::append(
            &tx,
            &uid,
            points.attendance,
            &format!("Attendance: {} on {}", meal, date),
            TxSource::Attendance,
            Some(&format!("attendance:{}", key)),
        )
        .map_err(CheckinError::Store)?;
        let points_awarded = if granted { points.attendance } else { 0 };

        // Roll the streak forward from the state read inside this transaction
        let (streak_days, best_streak, last_date): (i64, i64, Option<String>) = tx
            .query_row(
                "SELECT streak_days, best_streak, last_attendance_date FROM users WHERE id = ?1",
                [&uid],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(CheckinError::store)?;

        let state = StreakState {
            streak_days: streak_days.max(0) as u32,
            best_streak: best_streak.max(0) as u32,
            last_attendance_date: last_date.and_then(|s| s.parse().ok()),
        };
        let update = streak::advance(state, date);

        if update.advanced {
            tx.execute(
                "UPDATE users SET streak_days = ?1, best_streak = ?2, last_attendance_date = ?3
                 WHERE id = ?4",
                params![
                    update.state.streak_days,
                    update.state.best_streak,
                    date.to_string(),
                    uid,
                ],
            )
            .map_err(CheckinError::store)?;
        }

        let mut milestone_bonus = None;
        if let Some(days) = update.milestone {
            // Deterministic key: re-running this milestone never double-awards
            let bonus_key = format!("streak:{}:{}:{}", uid, days, date);
            let awarded = ledger::append(
                &tx,
                &uid,
                points.streak_milestone,
                &format!("{}-day streak bonus", days),
                TxSource::Bonus,
                Some(&bonus_key),
            )
            .map_err(CheckinError::Store)?;
            if awarded {
                milestone_bonus = Some(points.streak_milestone);
            }
        }

        let balance: i64 = tx
            .query_row("SELECT points FROM users WHERE id = ?1", [&uid], |row| {
                row.get(0)
            })
            .map_err(CheckinError::store)?;

        tx.commit().map_err(CheckinError::store)?;

        Ok(CheckinOutcome {
            username,
            points_awarded,
            streak_days: update.state.streak_days,
            best_streak: update.state.best_streak,
            milestone_bonus,
            balance,
        })
    }

    pub fn attendance_for_date(
        &self,
        date: NaiveDate,
        meal: Option<MealType>,
    ) -> Result<Vec<MealAttendance>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, username, meal, date, scanned_at, scanned_by
                 FROM meal_attendance
                 WHERE date = ?1 AND (?2 IS NULL OR meal = ?2)
                 ORDER BY scanned_at ASC",
            )?;

            let rows = stmt
                .query_map(
                    params![date.to_string(), meal.map(|m| m.as_str())],
                    |row| {
                        Ok(AttendanceRow {
                            user_id: row.get(0)?,
                            username: row.get(1)?,
                            meal: row.get(2)?,
                            date: row.get(3)?,
                            scanned_at: row.get(4)?,
                            scanned_by: row.get(5)?,
                        })
                    },
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(|r| r.into_attendance()).collect()
        })
    }

    pub fn attendance_count(&self, date: NaiveDate, meal: MealType) -> Result<u32> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM meal_attendance WHERE date = ?1 AND meal = ?2",
                params![date.to_string(), meal.as_str()],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }
}

#[cfg(test)]
mod tests {
    use messmeter_types::models::Role;

    use super::*;

    fn setup() -> (Database, Uuid, MealTimeSettings, PointsConfig) {
        let db = Database::open_in_memory().unwrap();
        let id = Uuid::new_v4();
        db.create_user(&id.to_string(), "asha", "hash", "Asha", "B-204", Role::Student)
            .unwrap();
        (db, id, MealTimeSettings::default(), PointsConfig::default())
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    fn at(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    #[test]
    fn checkin_awards_points_and_starts_streak() {
        let (db, user, settings, points) = setup();

        let outcome = db
            .record_attendance(user, MealType::Lunch, day(10), at(13, 0), &settings, "self", &points)
            .unwrap();

        assert_eq!(outcome.points_awarded, 5);
        assert_eq!(outcome.streak_days, 1);
        assert_eq!(outcome.milestone_bonus, None);
        assert_eq!(outcome.balance, 5);
        assert_eq!(db.attendance_count(day(10), MealType::Lunch).unwrap(), 1);
    }

    #[test]
    fn closed_scan_window_is_rejected_with_opening_time() {
        let (db, user, settings, points) = setup();

        let err = db
            .record_attendance(user, MealType::Lunch, day(10), at(15, 0), &settings, "self", &points)
            .unwrap_err();

        match err {
            CheckinError::ScanWindowClosed { meal, opens_at } => {
                assert_eq!(meal, MealType::Lunch);
                assert_eq!(opens_at, "12:00");
            }
            other => panic!("expected ScanWindowClosed, got {:?}", other),
        }
        assert_eq!(db.attendance_count(day(10), MealType::Lunch).unwrap(), 0);
    }

    #[test]
    fn duplicate_checkin_is_rejected_without_a_second_grant() {
        let (db, user, settings, points) = setup();

        db.record_attendance(user, MealType::Lunch, day(10), at(13, 0), &settings, "self", &points)
            .unwrap();
        let err = db
            .record_attendance(user, MealType::Lunch, day(10), at(13, 5), &settings, "self", &points)
            .unwrap_err();

        assert!(matches!(err, CheckinError::DuplicateAttendance));
        assert_eq!(db.attendance_count(day(10), MealType::Lunch).unwrap(), 1);
        assert_eq!(db.get_balance(user).unwrap(), 5);
        assert_eq!(db.ledger_sum(user).unwrap(), 5);
    }

    #[test]
    fn second_meal_same_day_earns_points_but_not_streak() {
        let (db, user, settings, points) = setup();

        db.record_attendance(user, MealType::Breakfast, day(10), at(8, 0), &settings, "self", &points)
            .unwrap();
        let outcome = db
            .record_attendance(user, MealType::Lunch, day(10), at(13, 0), &settings, "self", &points)
            .unwrap();

        assert_eq!(outcome.streak_days, 1);
        assert_eq!(outcome.points_awarded, 5);
        assert_eq!(db.get_balance(user).unwrap(), 10);
    }

    #[test]
    fn streak_advances_daily_and_resets_after_a_gap() {
        let (db, user, settings, points) = setup();

        db.record_attendance(user, MealType::Lunch, day(10), at(13, 0), &settings, "self", &points)
            .unwrap();
        let second = db
            .record_attendance(user, MealType::Lunch, day(11), at(13, 0), &settings, "self", &points)
            .unwrap();
        assert_eq!(second.streak_days, 2);

        let after_gap = db
            .record_attendance(user, MealType::Lunch, day(14), at(13, 0), &settings, "self", &points)
            .unwrap();
        assert_eq!(after_gap.streak_days, 1);
        assert_eq!(after_gap.best_streak, 2);
    }

    #[test]
    fn milestone_bonus_fires_exactly_once() {
        let (db, user, settings, points) = setup();

        for d in 1..=6 {
            let outcome = db
                .record_attendance(user, MealType::Lunch, day(d), at(13, 0), &settings, "self", &points)
                .unwrap();
            assert_eq!(outcome.milestone_bonus, None);
        }

        let seventh = db
            .record_attendance(user, MealType::Lunch, day(7), at(13, 0), &settings, "self", &points)
            .unwrap();
        assert_eq!(seventh.streak_days, 7);
        assert_eq!(seventh.milestone_bonus, Some(10));
        // 7 attendances * 5 + one milestone bonus
        assert_eq!(db.get_balance(user).unwrap(), 45);

        // A second meal on milestone day must not re-award the bonus
        let dinner = db
            .record_attendance(user, MealType::Dinner, day(7), at(20, 0), &settings, "self", &points)
            .unwrap();
        assert_eq!(dinner.milestone_bonus, None);
        assert_eq!(db.get_balance(user).unwrap(), 50);
        assert_eq!(db.ledger_sum(user).unwrap(), 50);
    }
}

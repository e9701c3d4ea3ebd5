//! End-to-end check-in flow: intent toggle, admin QR of the day, scan-window
//! gated recording, and duplicate rejection — the same sequence the API
//! handlers drive, exercised directly against the store.

use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

use messmeter_core::config::PointsConfig;
use messmeter_core::error::{CheckinError, QrError};
use messmeter_core::qr::AdminQr;
use messmeter_core::window::MealTimeSettings;
use messmeter_db::Database;
use messmeter_types::models::{MealType, Role};

fn at(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

#[test]
fn lunch_checkin_via_admin_qr() {
    let db = Database::open_in_memory().unwrap();
    let settings = MealTimeSettings::default(); // lunch scan 12:00-14:30
    let points = PointsConfig::default();

    let student = Uuid::new_v4();
    db.create_user(&student.to_string(), "asha", "hash", "Asha", "B-204", Role::Student)
        .unwrap();

    let today = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();

    // Morning: student toggles lunch intent inside the 07:00-11:00 window
    db.set_meal_intent(student, today, MealType::Lunch, true, at(9, 0), &settings)
        .unwrap();
    assert_eq!(db.intent_counts(today).unwrap().lunch, 1);

    // Staff puts up the code of the day
    let code = db.get_or_create_admin_qr(MealType::Lunch, today).unwrap();
    let payload = AdminQr::build(MealType::Lunch, today, code.qr_id, code.generated_at).encode();

    // 13:00 — student scans the displayed code
    let scanned = AdminQr::validate(&payload, today).unwrap();
    assert!(db
        .admin_qr_matches(scanned.meal_type, scanned.date, scanned.qr_id)
        .unwrap());

    let outcome = db
        .record_attendance(
            student,
            scanned.meal_type,
            today,
            at(13, 0),
            &settings,
            "self",
            &points,
        )
        .unwrap();
    assert_eq!(outcome.points_awarded, 5);
    assert_eq!(outcome.streak_days, 1);
    assert_eq!(outcome.balance, 5);

    // 13:05 — a second scan of the same code is a benign duplicate
    let err = db
        .record_attendance(
            student,
            MealType::Lunch,
            today,
            at(13, 5),
            &settings,
            "self",
            &points,
        )
        .unwrap_err();
    assert!(matches!(err, CheckinError::DuplicateAttendance));
    assert_eq!(db.get_balance(student).unwrap(), 5);
    assert_eq!(db.ledger_sum(student).unwrap(), 5);
    assert_eq!(db.attendance_count(today, MealType::Lunch).unwrap(), 1);
}

#[test]
fn refreshed_code_rejects_old_copies() {
    let db = Database::open_in_memory().unwrap();
    let today = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();

    let old = db.get_or_create_admin_qr(MealType::Dinner, today).unwrap();
    db.refresh_admin_qr(MealType::Dinner, today).unwrap();

    let stale_payload = AdminQr::build(MealType::Dinner, today, old.qr_id, old.generated_at).encode();
    let scanned = AdminQr::validate(&stale_payload, today).unwrap();
    assert!(!db
        .admin_qr_matches(scanned.meal_type, scanned.date, scanned.qr_id)
        .unwrap());
}

#[test]
fn yesterdays_payload_never_reaches_the_store() {
    let yesterday = NaiveDate::from_ymd_opt(2025, 6, 9).unwrap();
    let today = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();

    let payload = AdminQr::build(MealType::Lunch, yesterday, Uuid::new_v4(), chrono::Utc::now());
    assert_eq!(
        AdminQr::validate(&payload.encode(), today),
        Err(QrError::Stale {
            payload_date: yesterday
        })
    );
}

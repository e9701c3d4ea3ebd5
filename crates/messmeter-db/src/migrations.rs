use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id                    TEXT PRIMARY KEY,
            username              TEXT NOT NULL UNIQUE,
            password              TEXT NOT NULL,
            display_name          TEXT NOT NULL,
            room                  TEXT NOT NULL DEFAULT '',
            role                  TEXT NOT NULL DEFAULT 'student',
            points                INTEGER NOT NULL DEFAULT 0,
            streak_days           INTEGER NOT NULL DEFAULT 0,
            best_streak           INTEGER NOT NULL DEFAULT 0,
            last_attendance_date  TEXT,
            created_at            TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- One row per (user, day); id is the deterministic key user_date
        CREATE TABLE IF NOT EXISTS meal_intents (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id),
            date        TEXT NOT NULL,
            breakfast   INTEGER NOT NULL DEFAULT 0,
            lunch       INTEGER NOT NULL DEFAULT 0,
            dinner      INTEGER NOT NULL DEFAULT 0,
            updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_intents_date
            ON meal_intents(date);

        -- id is the deterministic key user_meal_date; the primary key is the
        -- duplicate-prevention mechanism, not a query-then-check
        CREATE TABLE IF NOT EXISTS meal_attendance (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id),
            username    TEXT NOT NULL,
            meal        TEXT NOT NULL,
            date        TEXT NOT NULL,
            scanned_at  TEXT NOT NULL,
            scanned_by  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_attendance_date
            ON meal_attendance(date, meal);

        -- Append-only ledger; source_key is the idempotency key for retried
        -- grants (UNIQUE ignores NULLs, so unkeyed entries always append)
        CREATE TABLE IF NOT EXISTS point_transactions (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id),
            direction   TEXT NOT NULL,
            amount      INTEGER NOT NULL,
            reason      TEXT NOT NULL,
            source      TEXT NOT NULL,
            source_key  TEXT UNIQUE,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_transactions_user
            ON point_transactions(user_id, created_at);

        -- One shared code per (meal, date); id is the key meal_date
        CREATE TABLE IF NOT EXISTS admin_qr_codes (
            id            TEXT PRIMARY KEY,
            meal          TEXT NOT NULL,
            date          TEXT NOT NULL,
            qr_id         TEXT NOT NULL,
            generated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS meal_time_settings (
            meal          TEXT PRIMARY KEY,
            toggle_start  TEXT NOT NULL,
            toggle_end    TEXT NOT NULL,
            scan_start    TEXT NOT NULL,
            scan_end      TEXT NOT NULL
        );

        -- One submission per (user, meal, day); the constraint is the
        -- duplicate-prevention mechanism, same as meal_attendance
        CREATE TABLE IF NOT EXISTS meal_feedback (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id),
            meal        TEXT NOT NULL,
            date        TEXT NOT NULL,
            ratings     TEXT NOT NULL,
            text        TEXT NOT NULL DEFAULT '',
            created_at  TEXT NOT NULL,
            UNIQUE(user_id, meal, date)
        );

        CREATE INDEX IF NOT EXISTS idx_feedback_date
            ON meal_feedback(date, meal);

        CREATE TABLE IF NOT EXISTS ai_summaries (
            id            TEXT PRIMARY KEY,
            period        TEXT NOT NULL,
            kind          TEXT NOT NULL,
            content       TEXT NOT NULL,
            generated_at  TEXT NOT NULL
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}

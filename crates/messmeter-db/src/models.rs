//! Database row types — these map directly to SQLite rows.
//! Conversion into the canonical messmeter-types shapes happens here, in one
//! place, so business logic never sees raw/legacy column values.

use std::str::FromStr;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::warn;

use messmeter_types::models::{
    MealAttendance, MealFeedback, MealType, PointTransaction, Role, TxDirection, TxSource,
    UserProfile,
};

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub display_name: String,
    pub room: String,
    pub role: String,
    pub points: i64,
    pub streak_days: i64,
    pub best_streak: i64,
    pub last_attendance_date: Option<String>,
    pub created_at: String,
}

impl UserRow {
    pub fn into_profile(self) -> Result<UserProfile> {
        Ok(UserProfile {
            id: self.id.parse()?,
            role: Role::from_str(&self.role).map_err(anyhow::Error::msg)?,
            username: self.username,
            display_name: self.display_name,
            room: self.room,
            points: self.points,
            streak_days: self.streak_days.max(0) as u32,
            best_streak: self.best_streak.max(0) as u32,
            last_attendance_date: match self.last_attendance_date {
                Some(s) => Some(s.parse()?),
                None => None,
            },
            created_at: parse_timestamp(&self.created_at),
        })
    }
}

pub struct AttendanceRow {
    pub user_id: String,
    pub username: String,
    pub meal: String,
    pub date: String,
    pub scanned_at: String,
    pub scanned_by: String,
}

impl AttendanceRow {
    pub fn into_attendance(self) -> Result<MealAttendance> {
        Ok(MealAttendance {
            user_id: self.user_id.parse()?,
            meal: MealType::from_str(&self.meal).map_err(anyhow::Error::msg)?,
            date: self.date.parse()?,
            scanned_at: parse_timestamp(&self.scanned_at),
            username: self.username,
            scanned_by: self.scanned_by,
        })
    }
}

pub struct TransactionRow {
    pub id: String,
    pub user_id: String,
    pub direction: String,
    pub amount: i64,
    pub reason: String,
    pub source: String,
    pub source_key: Option<String>,
    pub created_at: String,
}

impl TransactionRow {
    /// Normalize a ledger row to the canonical shape. Legacy rows carried a
    /// signed amount with no direction column; the sign of `amount` decides
    /// the direction when the stored direction string is unrecognized.
    pub fn into_transaction(self) -> Result<PointTransaction> {
        let direction = TxDirection::from_str(&self.direction).unwrap_or_else(|_| {
            if self.amount < 0 {
                TxDirection::Lost
            } else {
                TxDirection::Earned
            }
        });

        Ok(PointTransaction {
            id: self.id.parse()?,
            user_id: self.user_id.parse()?,
            direction,
            amount: self.amount.abs(),
            source: TxSource::from_str(&self.source).unwrap_or(TxSource::Adjustment),
            reason: self.reason,
            source_key: self.source_key,
            created_at: parse_timestamp(&self.created_at),
        })
    }
}

pub struct FeedbackRow {
    pub id: String,
    pub user_id: String,
    pub meal: String,
    pub date: String,
    pub ratings: String,
    pub text: String,
    pub created_at: String,
}

impl FeedbackRow {
    pub fn into_feedback(self) -> Result<MealFeedback> {
        Ok(MealFeedback {
            id: self.id.parse()?,
            user_id: self.user_id.parse()?,
            meal: MealType::from_str(&self.meal).map_err(anyhow::Error::msg)?,
            date: self.date.parse()?,
            ratings: serde_json::from_str(&self.ratings).unwrap_or_default(),
            text: self.text,
            created_at: parse_timestamp(&self.created_at),
        })
    }
}

/// Parse a stored timestamp. Rows written by this crate use RFC 3339; rows
/// defaulted by SQLite use "YYYY-MM-DD HH:MM:SS" without a timezone.
pub fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

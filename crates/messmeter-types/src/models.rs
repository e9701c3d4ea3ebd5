use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The three meals a mess hall serves per day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
}

impl MealType {
    pub const ALL: [MealType; 3] = [MealType::Breakfast, MealType::Lunch, MealType::Dinner];

    pub fn as_str(&self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
        }
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MealType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "breakfast" => Ok(MealType::Breakfast),
            "lunch" => Ok(MealType::Lunch),
            "dinner" => Ok(MealType::Dinner),
            other => Err(format!("unknown meal type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// A mess-hall account. `points` is the denormalized running balance backed
/// by the transaction ledger; `streak_days`/`best_streak`/`last_attendance_date`
/// are maintained by the attendance recorder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub room: String,
    pub role: Role,
    pub points: i64,
    pub streak_days: u32,
    pub best_streak: u32,
    pub last_attendance_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

/// A student's stated plan to eat or skip each meal on a given day.
/// One record per (user, day); individual flags are updated field-wise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealIntent {
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub breakfast: bool,
    pub lunch: bool,
    pub dinner: bool,
}

impl MealIntent {
    pub fn meal(&self, meal: MealType) -> bool {
        match meal {
            MealType::Breakfast => self.breakfast,
            MealType::Lunch => self.lunch,
            MealType::Dinner => self.dinner,
        }
    }
}

/// A confirmed check-in: at most one per (user, meal, day).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealAttendance {
    pub user_id: Uuid,
    pub username: String,
    pub meal: MealType,
    pub date: NaiveDate,
    pub scanned_at: DateTime<Utc>,
    /// Who performed the scan: a staff user id, or "self" for admin-QR check-ins.
    pub scanned_by: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxDirection {
    Earned,
    Lost,
}

impl TxDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxDirection::Earned => "earned",
            TxDirection::Lost => "lost",
        }
    }
}

impl FromStr for TxDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "earned" => Ok(TxDirection::Earned),
            "lost" => Ok(TxDirection::Lost),
            other => Err(format!("unknown transaction direction: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxSource {
    MealReview,
    Attendance,
    Bonus,
    Penalty,
    Redemption,
    Adjustment,
}

impl TxSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxSource::MealReview => "meal_review",
            TxSource::Attendance => "attendance",
            TxSource::Bonus => "bonus",
            TxSource::Penalty => "penalty",
            TxSource::Redemption => "redemption",
            TxSource::Adjustment => "adjustment",
        }
    }
}

impl FromStr for TxSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "meal_review" => Ok(TxSource::MealReview),
            "attendance" => Ok(TxSource::Attendance),
            "bonus" => Ok(TxSource::Bonus),
            "penalty" => Ok(TxSource::Penalty),
            "redemption" => Ok(TxSource::Redemption),
            "adjustment" => Ok(TxSource::Adjustment),
            other => Err(format!("unknown transaction source: {}", other)),
        }
    }
}

/// One append-only ledger entry. `amount` is always a non-negative magnitude;
/// `direction` carries the sign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub direction: TxDirection,
    pub amount: i64,
    pub reason: String,
    pub source: TxSource,
    /// Stable idempotency key; retried grants with the same key are ignored.
    pub source_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PointTransaction {
    /// Signed contribution of this entry to the balance.
    pub fn signed_amount(&self) -> i64 {
        match self.direction {
            TxDirection::Earned => self.amount,
            TxDirection::Lost => -self.amount,
        }
    }
}

/// A meal feedback submission: numeric ratings per aspect plus free text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealFeedback {
    pub id: Uuid,
    pub user_id: Uuid,
    pub meal: MealType,
    pub date: NaiveDate,
    pub ratings: HashMap<String, f64>,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

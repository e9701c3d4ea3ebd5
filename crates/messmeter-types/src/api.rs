use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{MealType, Role, TxSource};

// -- JWT Claims --

/// JWT claims shared across messmeter-api (REST middleware) and
/// messmeter-gateway (WebSocket authentication). Canonical definition lives
/// here in messmeter-types to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub role: Role,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub display_name: String,
    pub room: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
    pub token: String,
}

// -- Meal intent --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetIntentRequest {
    pub date: NaiveDate,
    pub meal: MealType,
    pub eating: bool,
}

/// Expected headcount per meal for a given date, for the admin dashboard.
#[derive(Debug, Serialize)]
pub struct IntentCounts {
    pub date: NaiveDate,
    pub breakfast: u32,
    pub lunch: u32,
    pub dinner: u32,
}

// -- QR / check-in --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanRequest {
    /// The raw string decoded from the QR image.
    pub payload: String,
}

#[derive(Debug, Serialize)]
pub struct SelfQrResponse {
    pub payload: String,
    pub meal: MealType,
    pub date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct AdminQrResponse {
    pub payload: String,
    pub qr_id: Uuid,
    pub meal: MealType,
    pub date: NaiveDate,
    pub generated_at: DateTime<Utc>,
}

/// Outcome of a successful check-in.
#[derive(Debug, Serialize)]
pub struct CheckinResponse {
    pub user_id: Uuid,
    pub meal: MealType,
    pub date: NaiveDate,
    pub points_awarded: i64,
    pub streak_days: u32,
    pub best_streak: u32,
    /// Extra points granted when the streak hit a milestone, if any.
    pub milestone_bonus: Option<i64>,
}

// -- Meal time settings --

/// Wall-clock window pair for one meal, as HH:MM strings. Validated fail-fast
/// on write; malformed values never reach the evaluator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealWindowConfig {
    pub toggle_start: String,
    pub toggle_end: String,
    pub scan_start: String,
    pub scan_end: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealTimeSettingsDto {
    pub breakfast: MealWindowConfig,
    pub lunch: MealWindowConfig,
    pub dinner: MealWindowConfig,
}

// -- Points / rewards --

#[derive(Debug, Serialize)]
pub struct TransactionView {
    pub id: Uuid,
    pub direction: String,
    pub amount: i64,
    pub reason: String,
    pub source: TxSource,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedeemRequest {
    pub reward: String,
    pub cost: i64,
}

#[derive(Debug, Serialize)]
pub struct RedeemResponse {
    pub reward: String,
    pub cost: i64,
    pub balance: i64,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardEntry {
    pub user_id: Uuid,
    pub display_name: String,
    pub room: String,
    pub points: i64,
    pub streak_days: u32,
}

// -- Feedback / insights --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedbackRequest {
    pub meal: MealType,
    pub date: NaiveDate,
    pub ratings: HashMap<String, f64>,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub id: Uuid,
    pub points_awarded: i64,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub message: String,
    pub content: String,
}

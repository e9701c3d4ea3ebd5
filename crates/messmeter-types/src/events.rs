use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{MealType, Role, TxSource};

/// Events pushed over the WebSocket gateway to live dashboards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready {
        user_id: Uuid,
        username: String,
        role: Role,
    },

    /// A user connected to or disconnected from the gateway
    PresenceUpdate {
        user_id: Uuid,
        username: String,
        online: bool,
    },

    /// A check-in was recorded; dashboards bump their live headcount
    AttendanceMarked {
        user_id: Uuid,
        username: String,
        meal: MealType,
        date: NaiveDate,
        streak_days: u32,
    },

    /// A student changed their eating intent for a meal
    IntentUpdated {
        user_id: Uuid,
        date: NaiveDate,
        meal: MealType,
        eating: bool,
    },

    /// Targeted to the affected user: their point balance changed
    PointsAdjusted {
        user_id: Uuid,
        delta: i64,
        balance: i64,
        source: TxSource,
    },

    /// Meal time windows were changed by an admin; clients re-derive
    /// their countdown timers from wall-clock time
    SettingsUpdated,
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },
}

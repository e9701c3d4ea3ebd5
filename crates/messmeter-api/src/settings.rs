use axum::{extract::State, response::IntoResponse, Json};
use tracing::info;

use messmeter_core::window::MealTimeSettings;
use messmeter_types::api::MealTimeSettingsDto;
use messmeter_types::events::GatewayEvent;

use crate::auth::AppState;
use crate::error::ApiError;

/// Current meal windows as HH:MM strings, defaults filled in for any meal an
/// admin has never customised.
pub async fn get_settings(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let settings = state.db.load_meal_settings()?;
    Ok(Json(settings.to_dto()))
}

/// Replace all three meals' windows. The whole payload is validated before
/// any of it is stored, so a single bad HH:MM leaves the settings untouched.
pub async fn put_settings(
    State(state): State<AppState>,
    Json(dto): Json<MealTimeSettingsDto>,
) -> Result<impl IntoResponse, ApiError> {
    let settings = MealTimeSettings::from_dto(&dto)?;
    state.db.save_meal_settings(&settings)?;

    info!("Meal time windows updated");
    state.dispatcher.broadcast(GatewayEvent::SettingsUpdated);

    Ok(Json(settings.to_dto()))
}

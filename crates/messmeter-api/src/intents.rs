use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use chrono::NaiveDate;
use serde_json::json;

use messmeter_types::api::{Claims, SetIntentRequest};
use messmeter_types::events::GatewayEvent;

use crate::auth::AppState;
use crate::clock;
use crate::error::ApiError;

/// Toggle one meal's eating intent. Only the named meal's flag is touched;
/// the window gate and the field-level write both live in the store layer.
pub async fn set_intent(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SetIntentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (_, now) = clock::local_now();

    let db_state = state.clone();
    tokio::task::spawn_blocking(move || {
        let settings = db_state
            .db
            .load_meal_settings()
            .map_err(messmeter_core::error::IntentError::store)?;
        db_state
            .db
            .set_meal_intent(claims.sub, req.date, req.meal, req.eating, now, &settings)
    })
    .await
    .map_err(|_| ApiError::internal())??;

    state.dispatcher.broadcast(GatewayEvent::IntentUpdated {
        user_id: claims.sub,
        date: req.date,
        meal: req.meal,
        eating: req.eating,
    });

    Ok(Json(json!({
        "date": req.date,
        "meal": req.meal,
        "eating": req.eating,
    })))
}

/// The caller's own intent flags for today. Absent row means nothing toggled
/// yet, reported as all-false.
pub async fn get_today(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let (today, _) = clock::local_now();

    let intent = state.db.get_meal_intent(claims.sub, today)?;
    Ok(Json(json!({
        "date": today,
        "breakfast": intent.as_ref().is_some_and(|i| i.breakfast),
        "lunch": intent.as_ref().is_some_and(|i| i.lunch),
        "dinner": intent.as_ref().is_some_and(|i| i.dinner),
    })))
}

pub async fn counts(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
) -> Result<impl IntoResponse, ApiError> {
    let counts = state.db.intent_counts(date)?;
    Ok(Json(counts))
}

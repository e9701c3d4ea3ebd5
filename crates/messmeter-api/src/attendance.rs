use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use messmeter_core::error::CheckinError;
use messmeter_core::qr::{AdminQr, SelfQr};
use messmeter_db::checkin::CheckinOutcome;
use messmeter_types::api::{
    AdminQrResponse, CheckinResponse, Claims, ScanRequest, SelfQrResponse,
};
use messmeter_types::events::GatewayEvent;
use messmeter_types::models::{MealType, TxSource};

use crate::auth::AppState;
use crate::clock;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct SelfQrQuery {
    pub meal: MealType,
}

#[derive(Debug, Deserialize)]
pub struct AttendanceQuery {
    pub meal: Option<MealType>,
}

/// Issue the caller's self-identifying QR payload for one meal today.
/// The payload is only honored at a staff scanning station.
pub async fn self_qr(
    Extension(claims): Extension<Claims>,
    Query(query): Query<SelfQrQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (today, _) = clock::local_now();
    let qr = SelfQr::build(claims.sub, query.meal, today, clock::now_millis());

    Ok(Json(SelfQrResponse {
        payload: qr.encode(),
        meal: query.meal,
        date: today,
    }))
}

/// Student scans the code of the day displayed at the counter. Possession is
/// proven against the stored qr_id, then the check-in is recorded for the
/// authenticated caller.
pub async fn checkin(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ScanRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (today, _) = clock::local_now();
    let payload = AdminQr::validate(&req.payload, today)?;

    if !state
        .db
        .admin_qr_matches(payload.meal_type, payload.date, payload.qr_id)?
    {
        return Err(ApiError::new(
            StatusCode::GONE,
            "this code has been refreshed; scan the current code at the counter",
        ));
    }

    let outcome = run_checkin(&state, claims.sub, payload.meal_type, today, "self".into()).await?;
    Ok(respond(&state, claims.sub, payload.meal_type, today, outcome).await)
}

/// Staff scans a student's self-issued QR. The payload names the student;
/// the scanning admin is recorded as the witness.
pub async fn scan(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ScanRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (today, _) = clock::local_now();
    let payload = SelfQr::validate(&req.payload, today)?;

    let outcome = run_checkin(
        &state,
        payload.uid,
        payload.meal,
        today,
        claims.sub.to_string(),
    )
    .await?;
    Ok(respond(&state, payload.uid, payload.meal, today, outcome).await)
}

pub async fn admin_qr(
    State(state): State<AppState>,
    Path(meal): Path<MealType>,
) -> Result<impl IntoResponse, ApiError> {
    let (today, _) = clock::local_now();
    let code = state.db.get_or_create_admin_qr(meal, today)?;
    Ok(Json(admin_qr_response(code)))
}

pub async fn refresh_admin_qr(
    State(state): State<AppState>,
    Path(meal): Path<MealType>,
) -> Result<impl IntoResponse, ApiError> {
    let (today, _) = clock::local_now();
    let code = state.db.refresh_admin_qr(meal, today)?;
    info!("Admin QR for {} on {} rotated", meal, today);
    Ok(Json(admin_qr_response(code)))
}

pub async fn list_for_date(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
    Query(query): Query<AttendanceQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = state.db.attendance_for_date(date, query.meal)?;
    Ok(Json(rows))
}

fn admin_qr_response(code: messmeter_db::qr_codes::AdminQrCode) -> AdminQrResponse {
    let payload = AdminQr::build(code.meal, code.date, code.qr_id, code.generated_at);
    AdminQrResponse {
        payload: payload.encode(),
        qr_id: code.qr_id,
        meal: code.meal,
        date: code.date,
        generated_at: code.generated_at,
    }
}

async fn run_checkin(
    state: &AppState,
    user_id: Uuid,
    meal: MealType,
    date: NaiveDate,
    scanned_by: String,
) -> Result<CheckinOutcome, ApiError> {
    let (_, now) = clock::local_now();

    let db_state = state.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let settings = db_state
            .db
            .load_meal_settings()
            .map_err(CheckinError::store)?;
        db_state.db.record_attendance(
            user_id,
            meal,
            date,
            now,
            &settings,
            &scanned_by,
            &db_state.points,
        )
    })
    .await
    .map_err(|_| ApiError::internal())??;

    Ok(outcome)
}

async fn respond(
    state: &AppState,
    user_id: Uuid,
    meal: MealType,
    date: NaiveDate,
    outcome: CheckinOutcome,
) -> Json<CheckinResponse> {
    state.dispatcher.broadcast(GatewayEvent::AttendanceMarked {
        user_id,
        username: outcome.username.clone(),
        meal,
        date,
        streak_days: outcome.streak_days,
    });

    let delta = outcome.points_awarded + outcome.milestone_bonus.unwrap_or(0);
    state
        .dispatcher
        .send_to_user(
            user_id,
            GatewayEvent::PointsAdjusted {
                user_id,
                delta,
                balance: outcome.balance,
                source: TxSource::Attendance,
            },
        )
        .await;

    Json(CheckinResponse {
        user_id,
        meal,
        date,
        points_awarded: outcome.points_awarded,
        streak_days: outcome.streak_days,
        best_streak: outcome.best_streak,
        milestone_bonus: outcome.milestone_bonus,
    })
}

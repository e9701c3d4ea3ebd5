use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};

use messmeter_types::api::{Claims, FeedbackRequest, FeedbackResponse};
use messmeter_types::events::GatewayEvent;
use messmeter_types::models::TxSource;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::rewards::PageQuery;

/// Submit meal feedback. The review grant rides in the same store
/// transaction as the feedback row.
pub async fn submit(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<FeedbackRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.ratings.is_empty() && req.text.trim().is_empty() {
        return Err(ApiError::bad_request(
            "feedback needs at least one rating or some text",
        ));
    }

    let db_state = state.clone();
    let (id, points_awarded) = tokio::task::spawn_blocking(move || {
        db_state.db.submit_feedback(
            claims.sub,
            req.meal,
            req.date,
            &req.ratings,
            req.text.trim(),
            &db_state.points,
        )
    })
    .await
    .map_err(|_| ApiError::internal())??;

    if points_awarded > 0 {
        let balance = state.db.get_balance(claims.sub)?;
        state
            .dispatcher
            .send_to_user(
                claims.sub,
                GatewayEvent::PointsAdjusted {
                    user_id: claims.sub,
                    delta: points_awarded,
                    balance,
                    source: TxSource::MealReview,
                },
            )
            .await;
    }

    Ok((
        StatusCode::CREATED,
        Json(FeedbackResponse { id, points_awarded }),
    ))
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.unwrap_or(100).min(1000);
    let entries = state.db.list_feedback(limit)?;
    Ok(Json(entries))
}

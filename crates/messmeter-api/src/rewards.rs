use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use tracing::info;

use messmeter_types::api::{Claims, RedeemRequest, RedeemResponse, TransactionView};
use messmeter_types::events::GatewayEvent;
use messmeter_types::models::TxSource;

use crate::auth::AppState;
use crate::error::ApiError;

const DEFAULT_PAGE: u32 = 50;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
}

/// The caller's ledger, newest first.
pub async fn transactions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE).min(500);
    let entries = state.db.get_transactions(claims.sub, limit)?;

    let views: Vec<TransactionView> = entries
        .into_iter()
        .map(|tx| TransactionView {
            id: tx.id,
            direction: tx.direction.as_str().to_string(),
            amount: tx.amount,
            reason: tx.reason,
            source: tx.source,
            created_at: tx.created_at,
        })
        .collect();

    Ok(Json(views))
}

pub async fn leaderboard(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE).min(200);
    let entries = state.db.leaderboard(limit)?;
    Ok(Json(entries))
}

/// Spend points on a reward. Sufficiency is checked and the ledger entry
/// written in one transaction; an insufficient balance changes nothing.
pub async fn redeem(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<RedeemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.cost <= 0 {
        return Err(ApiError::bad_request("reward cost must be positive"));
    }
    if req.reward.trim().is_empty() {
        return Err(ApiError::bad_request("reward name must not be empty"));
    }

    let db_state = state.clone();
    let reward = req.reward.clone();
    let balance = tokio::task::spawn_blocking(move || {
        db_state.db.redeem(claims.sub, &reward, req.cost)
    })
    .await
    .map_err(|_| ApiError::internal())??;

    info!(
        "{} redeemed '{}' for {} points, balance now {}",
        claims.username, req.reward, req.cost, balance
    );

    state
        .dispatcher
        .send_to_user(
            claims.sub,
            GatewayEvent::PointsAdjusted {
                user_id: claims.sub,
                delta: -req.cost,
                balance,
                source: TxSource::Redemption,
            },
        )
        .await;

    Ok(Json(RedeemResponse {
        reward: req.reward,
        cost: req.cost,
        balance,
    }))
}

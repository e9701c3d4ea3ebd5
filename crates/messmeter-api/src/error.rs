use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use messmeter_core::error::{
    CheckinError, ConfigError, FeedbackError, IntentError, QrError, RedeemError,
};

/// Error surfaced to HTTP clients. The message is user-visible and explains
/// which condition failed; store failures are collapsed to a retry hint.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "authentication required")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "something went wrong; try again",
        )
    }

    fn store_unavailable() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "the service is temporarily unavailable; try again in a moment",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        error!("internal error: {:#}", err);
        ApiError::internal()
    }
}

impl From<QrError> for ApiError {
    fn from(err: QrError) -> Self {
        let status = match err {
            QrError::Malformed | QrError::Tampered => StatusCode::BAD_REQUEST,
            QrError::Stale { .. } => StatusCode::GONE,
        };
        ApiError::new(status, err.to_string())
    }
}

impl From<CheckinError> for ApiError {
    fn from(err: CheckinError) -> Self {
        match err {
            CheckinError::ScanWindowClosed { .. } => {
                ApiError::new(StatusCode::FORBIDDEN, err.to_string())
            }
            CheckinError::DuplicateAttendance => {
                ApiError::new(StatusCode::CONFLICT, err.to_string())
            }
            CheckinError::Qr(qr) => qr.into(),
            CheckinError::Store(inner) => {
                error!("check-in store failure: {:#}", inner);
                ApiError::store_unavailable()
            }
        }
    }
}

impl From<IntentError> for ApiError {
    fn from(err: IntentError) -> Self {
        match err {
            IntentError::ToggleWindowClosed { .. } => {
                ApiError::new(StatusCode::FORBIDDEN, err.to_string())
            }
            IntentError::Store(inner) => {
                error!("intent store failure: {:#}", inner);
                ApiError::store_unavailable()
            }
        }
    }
}

impl From<FeedbackError> for ApiError {
    fn from(err: FeedbackError) -> Self {
        match err {
            FeedbackError::AlreadySubmitted => {
                ApiError::new(StatusCode::CONFLICT, err.to_string())
            }
            FeedbackError::Store(inner) => {
                error!("feedback store failure: {:#}", inner);
                ApiError::store_unavailable()
            }
        }
    }
}

impl From<RedeemError> for ApiError {
    fn from(err: RedeemError) -> Self {
        match err {
            RedeemError::InsufficientBalance { .. } => {
                ApiError::new(StatusCode::CONFLICT, err.to_string())
            }
            RedeemError::UnknownUser => ApiError::not_found("unknown user"),
            RedeemError::Store(inner) => {
                error!("redeem store failure: {:#}", inner);
                ApiError::store_unavailable()
            }
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

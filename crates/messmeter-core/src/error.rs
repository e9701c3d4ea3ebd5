use chrono::NaiveDate;
use thiserror::Error;

use messmeter_types::models::MealType;

/// Fatal configuration problems, rejected at load/write time so the
/// evaluator never sees a malformed window.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid wall-clock time '{0}': expected HH:MM")]
    InvalidTime(String),
}

/// QR validation failures. All are user-correctable: obtain a fresh or
/// correct code and try again.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QrError {
    #[error("QR payload could not be parsed")]
    Malformed,

    #[error("QR payload failed its integrity check")]
    Tampered,

    #[error("QR code is dated {payload_date}; a code is valid for exactly one calendar day")]
    Stale { payload_date: NaiveDate },
}

/// Check-in failures surfaced to the scanning user.
#[derive(Debug, Error)]
pub enum CheckinError {
    #[error("scan window for {meal} is closed; it opens at {opens_at}")]
    ScanWindowClosed { meal: MealType, opens_at: String },

    /// Benign from the user's perspective: the meal was already counted,
    /// either by a genuine re-scan or by losing a race between devices.
    #[error("attendance for this meal is already recorded")]
    DuplicateAttendance,

    #[error(transparent)]
    Qr(#[from] QrError),

    #[error("store unavailable: {0}")]
    Store(#[source] anyhow::Error),
}

impl CheckinError {
    pub fn store(err: impl Into<anyhow::Error>) -> Self {
        CheckinError::Store(err.into())
    }
}

#[derive(Debug, Error)]
pub enum IntentError {
    #[error("toggle window for {meal} is closed; it opens at {opens_at}")]
    ToggleWindowClosed { meal: MealType, opens_at: String },

    #[error("store unavailable: {0}")]
    Store(#[source] anyhow::Error),
}

impl IntentError {
    pub fn store(err: impl Into<anyhow::Error>) -> Self {
        IntentError::Store(err.into())
    }
}

#[derive(Debug, Error)]
pub enum FeedbackError {
    /// One submission per (user, meal, day); a repeat changes nothing and
    /// grants nothing.
    #[error("feedback for this meal is already submitted")]
    AlreadySubmitted,

    #[error("store unavailable: {0}")]
    Store(#[source] anyhow::Error),
}

impl FeedbackError {
    pub fn store(err: impl Into<anyhow::Error>) -> Self {
        FeedbackError::Store(err.into())
    }
}

#[derive(Debug, Error)]
pub enum RedeemError {
    #[error("insufficient balance: have {balance}, need {cost}")]
    InsufficientBalance { balance: i64, cost: i64 },

    #[error("unknown user")]
    UnknownUser,

    #[error("store unavailable: {0}")]
    Store(#[source] anyhow::Error),
}

impl RedeemError {
    pub fn store(err: impl Into<anyhow::Error>) -> Self {
        RedeemError::Store(err.into())
    }
}

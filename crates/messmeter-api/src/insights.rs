use anyhow::{anyhow, Context};
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tracing::info;

use messmeter_db::feedback::FeedbackAggregate;
use messmeter_types::api::SummaryResponse;

use crate::auth::AppState;
use crate::error::ApiError;

const WEEKLY_SUMMARY_ID: &str = "weekly_summary";

/// Thin client for the external analysis service. Holds one pooled
/// reqwest client for the process lifetime.
#[derive(Clone)]
pub struct AnalysisClient {
    base_url: String,
    http: reqwest::Client,
}

impl AnalysisClient {
    pub fn new(base_url: String) -> Self {
        AnalysisClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Ship the feedback aggregate off for summarisation and return the
    /// generated prose.
    pub async fn generate_summary(&self, aggregate: &FeedbackAggregate) -> anyhow::Result<String> {
        let resp = self
            .http
            .post(format!("{}/generate-summary", self.base_url))
            .json(aggregate)
            .send()
            .await
            .context("analysis service unreachable")?
            .error_for_status()
            .context("analysis service rejected the request")?;

        let body: serde_json::Value = resp.json().await?;
        body.get("content")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("analysis service returned no content"))
    }

    /// Forward a plate photo for waste estimation, returning the service's
    /// verdict untouched.
    pub async fn analyze_plate(
        &self,
        filename: String,
        content_type: String,
        bytes: Vec<u8>,
    ) -> anyhow::Result<serde_json::Value> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename)
            .mime_str(&content_type)?;
        let form = reqwest::multipart::Form::new().part("image", part);

        let resp = self
            .http
            .post(format!("{}/analyze", self.base_url))
            .multipart(form)
            .send()
            .await
            .context("analysis service unreachable")?
            .error_for_status()
            .context("analysis service rejected the image")?;

        Ok(resp.json().await?)
    }
}

fn analysis(state: &AppState) -> Result<&AnalysisClient, ApiError> {
    state.analysis.as_ref().ok_or_else(|| {
        ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "no analysis service is configured",
        )
    })
}

/// Aggregate all stored feedback and generate this week's summary. With no
/// feedback on file there is nothing to summarise and the service is never
/// called.
pub async fn generate_weekly(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let client = analysis(&state)?.clone();

    let db_state = state.clone();
    let aggregate = tokio::task::spawn_blocking(move || db_state.db.aggregate_feedback())
        .await
        .map_err(|_| ApiError::internal())??;

    if aggregate.total_feedback == 0 {
        return Ok(Json(SummaryResponse {
            message: "No feedback available".to_string(),
            content: "No meal feedback was submitted during this period.".to_string(),
        }));
    }

    let content = client.generate_summary(&aggregate).await?;
    state
        .db
        .save_summary(WEEKLY_SUMMARY_ID, &aggregate.range, "weekly", &content)?;

    info!(
        "Weekly summary generated from {} feedback entries",
        aggregate.total_feedback
    );

    Ok(Json(SummaryResponse {
        message: "Weekly summary generated".to_string(),
        content,
    }))
}

pub async fn get_weekly(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let (content, generated_at) = state
        .db
        .get_summary(WEEKLY_SUMMARY_ID)?
        .ok_or_else(|| ApiError::not_found("no weekly summary has been generated yet"))?;

    Ok(Json(json!({
        "content": content,
        "generated_at": generated_at,
    })))
}

/// Proxy a plate photo to the analysis service. The image never touches the
/// store; only the multipart field named `image` is read.
pub async fn analyze_plate(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let client = analysis(&state)?.clone();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::bad_request("malformed multipart body"))?
    {
        if field.name() != Some("image") {
            continue;
        }

        let filename = field.file_name().unwrap_or("plate.jpg").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|_| ApiError::bad_request("could not read image data"))?
            .to_vec();

        if bytes.is_empty() {
            return Err(ApiError::bad_request("image field is empty"));
        }

        let verdict = client.analyze_plate(filename, content_type, bytes).await?;
        return Ok(Json(verdict));
    }

    Err(ApiError::bad_request("missing multipart field 'image'"))
}

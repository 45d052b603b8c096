//! Grant holder handlers. Every rejection is the same 401, whatever the
//! reason, so a caller learns nothing about a secret it presents.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use crate::middleware::{invalid_token, BearerSecret};
use crate::models::{RecordBundle, ReportFormat};
use crate::services::ReportLookup;
use crate::AppState;
use service_core::error::AppError;

const EXPORT_FILENAME: &str = "farm-records-export.json";

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    #[serde(default)]
    pub format: ReportFormat,
}

/// GET /access/records
#[tracing::instrument(skip_all)]
pub async fn get_records(
    State(state): State<AppState>,
    secret: BearerSecret,
) -> Result<Json<RecordBundle>, AppError> {
    state
        .authority
        .get_filtered_records(secret.expose())
        .await?
        .map(Json)
        .ok_or_else(invalid_token)
}

/// GET /access/records/export
#[tracing::instrument(skip_all)]
pub async fn export_records(
    State(state): State<AppState>,
    secret: BearerSecret,
) -> Result<Response, AppError> {
    let bundle = state
        .authority
        .export_filtered_records(secret.expose())
        .await?
        .ok_or_else(invalid_token)?;

    Ok((
        [(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", EXPORT_FILENAME),
        )],
        Json(bundle),
    )
        .into_response())
}

/// GET /access/report?format=html|csv|text
#[tracing::instrument(skip(state, secret), fields(format = ?query.format))]
pub async fn get_report(
    State(state): State<AppState>,
    secret: BearerSecret,
    Query(query): Query<ReportQuery>,
) -> Result<Response, AppError> {
    match state
        .authority
        .lookup_report(secret.expose(), query.format)
        .await?
    {
        ReportLookup::Rendered(report) => Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, query.format.content_type())],
            report,
        )
            .into_response()),
        ReportLookup::NoReport => Err(AppError::NotFound(anyhow::anyhow!(
            "No health check has been run yet"
        ))),
        ReportLookup::Unauthorized => Err(invalid_token()),
    }
}

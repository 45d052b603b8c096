use axum::{extract::State, Json};

use crate::models::HealthCheckResult;
use crate::AppState;
use service_core::error::AppError;

/// Run the farm record health check and keep it as the latest result.
///
/// POST /health-checks
#[tracing::instrument(skip(state))]
pub async fn run_health_check(
    State(state): State<AppState>,
) -> Result<Json<HealthCheckResult>, AppError> {
    state.health_check.run().await.map(Json)
}

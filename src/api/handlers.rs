use axum::{Json, extract::State, http::StatusCode};
use std::time::Instant;

use crate::error::AuditError;
use crate::report::AuditReport;

use super::AppState;
use super::models::{AuditRequest, ErrorResponse};

pub async fn audit_handler(
    State(state): State<AppState>,
    Json(request): Json<AuditRequest>,
) -> Result<Json<AuditReport>, (StatusCode, Json<ErrorResponse>)> {
    let start = Instant::now();

    if request.url.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "url cannot be empty".to_string(),
            }),
        ));
    }

    match state.orchestrator.run_audit(&request.url, &state.config).await {
        Ok(report) => {
            log::info!(
                "audit of {} served in {}ms",
                report.url,
                start.elapsed().as_millis()
            );
            Ok(Json(report))
        }
        Err(e) => {
            let status = match e {
                AuditError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
                AuditError::FatalFetch { .. } => StatusCode::BAD_GATEWAY,
            };
            log::warn!("audit request for {} failed: {e}", request.url);
            Err((
                status,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            ))
        }
    }
}

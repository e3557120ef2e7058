use axum::{Router, routing::post};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::AuditConfig;
use crate::orchestrator::AuditOrchestrator;

pub mod handlers;
pub mod models;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<AuditOrchestrator>,
    pub config: AuditConfig,
}

pub fn create_router(orchestrator: Arc<AuditOrchestrator>, config: AuditConfig) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/audit", post(handlers::audit_handler))
        .with_state(AppState {
            orchestrator,
            config,
        })
        .layer(cors)
}

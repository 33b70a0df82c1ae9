// =====================================================================================
// MONITORING CELL ROUTER
// =====================================================================================

use axum::{middleware, routing::get, Router};
use std::sync::Arc;

use crate::facade::MonitoringFacade;
use crate::handlers::{
    get_channels, get_costs, get_full_status, get_gateway, get_logs, get_performance,
    get_status, method_not_allowed, not_found,
};
use shared_utils::cors::permissive_cors;

pub fn create_monitoring_router(facade: Arc<MonitoringFacade>) -> Router {
    Router::new()
        .route("/api/status", get(get_status))
        .route("/api/health", get(get_status))
        .route("/api/full-status", get(get_full_status))
        .route("/api/monitoring/all", get(get_full_status))
        .route("/api/monitoring/gateway", get(get_gateway))
        .route("/api/monitoring/costs", get(get_costs))
        .route("/api/monitoring/performance", get(get_performance))
        .route("/api/monitoring/logs", get(get_logs))
        .route("/api/monitoring/channels", get(get_channels))
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(middleware::from_fn(permissive_cors))
        .with_state(facade)
}

/// Paths served by [`create_monitoring_router`], for startup logging.
pub const ENDPOINTS: &[&str] = &[
    "/api/status",
    "/api/health",
    "/api/full-status",
    "/api/monitoring/all",
    "/api/monitoring/gateway",
    "/api/monitoring/costs",
    "/api/monitoring/performance",
    "/api/monitoring/logs",
    "/api/monitoring/channels",
];

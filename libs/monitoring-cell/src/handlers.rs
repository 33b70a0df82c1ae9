// =====================================================================================
// MONITORING CELL HANDLERS
// =====================================================================================

use axum::{
    extract::State,
    http::{Method, StatusCode, Uri},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::facade::MonitoringFacade;
use crate::models::{
    AnomalySnapshot, ChannelReport, CostSnapshot, FullStatus, MonitoringError,
    PerformanceSnapshot, ProbeResult, StatusResponse,
};

// =====================================================================================
// LIVENESS ENDPOINTS
// =====================================================================================

#[instrument(skip(facade))]
pub async fn get_status(State(facade): State<Arc<MonitoringFacade>>) -> Json<StatusResponse> {
    Json(facade.status())
}

// =====================================================================================
// SNAPSHOT ENDPOINTS
// =====================================================================================

#[instrument(skip(facade))]
pub async fn get_full_status(State(facade): State<Arc<MonitoringFacade>>) -> Json<FullStatus> {
    Json(facade.full_status().await)
}

#[instrument(skip(facade))]
pub async fn get_gateway(State(facade): State<Arc<MonitoringFacade>>) -> Json<ProbeResult> {
    Json(facade.gateway().await)
}

#[instrument(skip(facade))]
pub async fn get_costs(State(facade): State<Arc<MonitoringFacade>>) -> Json<CostSnapshot> {
    Json(facade.costs().await)
}

#[instrument(skip(facade))]
pub async fn get_performance(
    State(facade): State<Arc<MonitoringFacade>>,
) -> Json<PerformanceSnapshot> {
    Json(facade.performance().await)
}

#[instrument(skip(facade))]
pub async fn get_logs(State(facade): State<Arc<MonitoringFacade>>) -> Json<AnomalySnapshot> {
    Json(facade.logs().await)
}

#[instrument(skip(facade))]
pub async fn get_channels(State(facade): State<Arc<MonitoringFacade>>) -> Json<ChannelReport> {
    Json(facade.channels().await)
}

pub async fn not_found(uri: Uri) -> MonitoringError {
    debug!("No route for {}", uri.path());
    MonitoringError::NotFound
}

pub async fn method_not_allowed(method: Method, uri: Uri) -> MonitoringError {
    debug!("{} not allowed on {}", method, uri.path());
    MonitoringError::MethodNotAllowed
}

// =====================================================================================
// ERROR RESPONSE IMPLEMENTATION
// =====================================================================================

impl IntoResponse for MonitoringError {
    fn into_response(self) -> axum::response::Response {
        let status = match self {
            MonitoringError::NotFound => StatusCode::NOT_FOUND,
            MonitoringError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            MonitoringError::QueryTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            MonitoringError::ChannelProbe(_) | MonitoringError::ChannelProbeNotConfigured => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            MonitoringError::Store(_) | MonitoringError::Task(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

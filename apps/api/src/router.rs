use std::sync::Arc;

use axum::Router;

use monitoring_cell::{create_monitoring_router, MonitoringFacade};
use shared_config::AppConfig;

pub fn create_router(config: &AppConfig) -> Router {
    let facade = Arc::new(MonitoringFacade::from_config(config));
    create_monitoring_router(facade)
}

//! 路由模块

use axum::{
    routing::{get, post},
    Router,
};
use crate::handlers;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/reports", post(handlers::generate_report))
        .route("/api/reports/daily-sales", post(handlers::daily_sales_report))
        .route(
            "/api/reports/product-performance",
            post(handlers::product_performance_report),
        )
        .route("/api/reports/{id}/artifact", get(handlers::download_artifact))
        .route("/api/connection/test", get(handlers::test_connection))
        .route("/api/health", get(handlers::health_check))
}

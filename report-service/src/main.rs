//! 报表生成服务
//!
//! 提供报表生成功能，包括：
//! - 执行只读查询并映射为图表
//! - 内置每日销售、商品业绩报表
//! - 渲染为 SVG / PNG 或导出 JSON / CSV，并提供文件下载
//! - 数据库连接测试

mod handlers;
mod routes;
mod service;
mod state;
mod store;

use anyhow::Context;
use axum::{middleware, routing::get, Json, Router};
use common::config::AppConfig;
use common::logging::init_tracing;
use common::middleware::request_id::request_id_middleware;
use state::AppState;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;

const SERVICE_NAME: &str = "report-service";
const DEFAULT_PORT: u16 = 8083;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "报表服务 API",
        version = "0.1.0",
        description = "MySQL 查询结果图表化微服务"
    ),
    paths(
        handlers::generate_report,
        handlers::daily_sales_report,
        handlers::product_performance_report,
        handlers::download_artifact,
        handlers::test_connection,
        handlers::health_check,
    ),
    components(schemas(
        common::models::ReportRequest,
        common::models::PresetRequest,
        common::models::ReportResult,
        common::models::ColumnMapping,
        common::models::QueryParam,
        common::models::OutputFormat,
        common::models::ChartSpec,
        common::models::Series,
        common::models::Point,
        common::models::XDomain,
        handlers::HealthResponse,
        handlers::ConnectionTestResult,
    )),
    tags(
        (name = "reports", description = "报表生成端点"),
        (name = "connection", description = "数据库连接端点"),
        (name = "health", description = "健康检查端点")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置
    let mut config = AppConfig::load_with_service(SERVICE_NAME);
    config.port = std::env::var("SERVER_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    // 初始化日志追踪
    init_tracing(config.log_format);

    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .with_context(|| format!("创建报表目录失败: {}", config.output_dir.display()))?;

    // 创建应用状态
    let state = AppState::new(config.clone());

    // 创建路由
    let app = create_router(state);

    // 启动服务
    let addr = format!("{}:{}", config.host, config.port);
    info!(
        service = SERVICE_NAME,
        address = %addr,
        database = %config.database.target(),
        output_dir = %config.output_dir.display(),
        "启动服务"
    );

    let listener = TcpListener::bind(&addr).await.context("绑定地址失败")?;
    axum::serve(listener, app).await.context("服务启动失败")?;
    Ok(())
}

fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::router())
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

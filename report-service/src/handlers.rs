//! Handler模块

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use common::errors::AppError;
use common::middleware::RequestId;
use common::models::{PresetRequest, ReportRequest, ReportResult};
use common::response::ApiResponse;
use reporter::Preset;

use crate::service::{ReportService, ReportServiceTrait};
use crate::state::AppState;

const SERVICE_NAME: &str = "report-service";

/// 按查询生成图表报表
#[utoipa::path(
    post,
    path = "/api/reports",
    tag = "reports",
    request_body = ReportRequest,
    responses(
        (status = 200, description = "报表生成成功", body = ApiResponse<ReportResult>),
        (status = 400, description = "SQL 无效或校验错误"),
        (status = 422, description = "列映射与查询结果不符"),
        (status = 502, description = "数据库执行查询失败"),
        (status = 503, description = "数据库不可用")
    )
)]
pub async fn generate_report(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(req): Json<ReportRequest>,
) -> Result<Json<ApiResponse<ReportResult>>, AppError> {
    let service = ReportService::from_state(&state);
    let result = service.generate(req).await?;
    Ok(Json(respond(result, &request_id)))
}

/// 每日销售报表
#[utoipa::path(
    post,
    path = "/api/reports/daily-sales",
    tag = "reports",
    request_body = PresetRequest,
    responses(
        (status = 200, description = "报表生成成功", body = ApiResponse<ReportResult>),
        (status = 400, description = "日期范围无效"),
        (status = 503, description = "数据库不可用")
    )
)]
pub async fn daily_sales_report(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(req): Json<PresetRequest>,
) -> Result<Json<ApiResponse<ReportResult>>, AppError> {
    let service = ReportService::from_state(&state);
    let result = service.generate_preset(Preset::DailySales, req).await?;
    Ok(Json(respond(result, &request_id)))
}

/// 商品业绩报表
#[utoipa::path(
    post,
    path = "/api/reports/product-performance",
    tag = "reports",
    request_body = PresetRequest,
    responses(
        (status = 200, description = "报表生成成功", body = ApiResponse<ReportResult>),
        (status = 400, description = "日期范围无效"),
        (status = 503, description = "数据库不可用")
    )
)]
pub async fn product_performance_report(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(req): Json<PresetRequest>,
) -> Result<Json<ApiResponse<ReportResult>>, AppError> {
    let service = ReportService::from_state(&state);
    let result = service
        .generate_preset(Preset::ProductPerformance, req)
        .await?;
    Ok(Json(respond(result, &request_id)))
}

/// 下载报表文件
#[utoipa::path(
    get,
    path = "/api/reports/{id}/artifact",
    tag = "reports",
    params(
        ("id" = String, Path, description = "报表 ID")
    ),
    responses(
        (status = 200, description = "报表文件内容"),
        (status = 404, description = "报表未找到")
    )
)]
pub async fn download_artifact(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let service = ReportService::from_state(&state);
    let (format, bytes) = service.artifact(&id).await?;
    Ok(([(header::CONTENT_TYPE, format.content_type())], bytes).into_response())
}

/// 测试报表数据库连接
#[utoipa::path(
    get,
    path = "/api/connection/test",
    tag = "connection",
    responses(
        (status = 200, description = "连接测试结果", body = ApiResponse<ConnectionTestResult>)
    )
)]
pub async fn test_connection(
    State(state): State<AppState>,
) -> Json<ApiResponse<ConnectionTestResult>> {
    let service = ReportService::from_state(&state);
    let target = state.config.database.target();
    let result = match service.test_connection().await {
        Ok(latency_ms) => ConnectionTestResult {
            target,
            success: true,
            latency_ms: Some(latency_ms),
            error: None,
        },
        Err(e) => {
            tracing::warn!(error = %e, "数据库连接测试失败");
            ConnectionTestResult {
                target,
                success: false,
                latency_ms: None,
                error: Some(e.to_string()),
            }
        }
    };
    Json(ApiResponse::ok_with_service(result, SERVICE_NAME))
}

/// 健康检查端点
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "服务运行正常", body = HealthResponse)
    )
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}

fn respond(result: ReportResult, request_id: &RequestId) -> ApiResponse<ReportResult> {
    let elapsed = result.execution_time_ms;
    ApiResponse::ok_with_service(result, SERVICE_NAME)
        .with_request_id(request_id.as_str())
        .with_duration(elapsed)
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

/// 连接测试结果
#[derive(Serialize, ToSchema)]
pub struct ConnectionTestResult {
    /// 连接目标（不含密码）
    pub target: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

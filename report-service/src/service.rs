//! 报表生成服务模块

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use validator::Validate;

use common::errors::{AppError, AppResult};
use common::models::connection::ConnectionConfig;
use common::models::{
    ColumnMapping, OutputFormat, PresetRequest, QueryDescriptor, ReportRequest, ReportResult,
};
use common::utils::{IdGenerator, SqlValidator};
use reporter::{check_connection, ChartRenderer, OutputSink, Preset, Reporter};

use crate::state::AppState;
use crate::store::ArtifactStore;

/// 报表服务 Trait
#[async_trait]
pub trait ReportServiceTrait: Send + Sync {
    /// 按任意只读查询生成报表
    async fn generate(&self, req: ReportRequest) -> AppResult<ReportResult>;

    /// 生成内置销售报表
    async fn generate_preset(&self, preset: Preset, req: PresetRequest) -> AppResult<ReportResult>;

    /// 读取已生成的报表文件
    async fn artifact(&self, report_id: &str) -> AppResult<(OutputFormat, Vec<u8>)>;

    /// 测试数据库连接，返回往返耗时（毫秒）
    async fn test_connection(&self) -> AppResult<u64>;
}

/// 报表生成服务
pub struct ReportService {
    database: ConnectionConfig,
    renderer: ChartRenderer,
    store: Arc<ArtifactStore>,
}

impl ReportService {
    /// 创建新的报表服务实例
    pub fn new(
        database: ConnectionConfig,
        renderer: ChartRenderer,
        store: Arc<ArtifactStore>,
    ) -> Self {
        Self {
            database,
            renderer,
            store,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            state.config.database.clone(),
            state.renderer,
            state.store.clone(),
        )
    }

    /// 执行查询、映射并渲染到存储目录
    async fn produce(
        &self,
        reporter: Reporter,
        query: QueryDescriptor,
        mapping: ColumnMapping,
        format: OutputFormat,
    ) -> AppResult<ReportResult> {
        let start = Instant::now();
        let outcome = reporter.build_chart(&self.database, &query, &mapping).await?;
        let chart = outcome.chart;

        // plotters 为同步绘制，放到阻塞线程池
        let report_id = IdGenerator::report_id();
        let mut sink = self.store.sink(&report_id, format);
        let renderer = *reporter.renderer();
        let to_render = chart.clone();
        let artifact_size = tokio::task::spawn_blocking(move || {
            let bytes = renderer.render_to_bytes(&to_render, format)?;
            sink.write_artifact(&bytes)?;
            Ok::<usize, AppError>(bytes.len())
        })
        .await
        .map_err(|e| AppError::Internal(format!("渲染任务失败: {}", e)))??;

        let execution_time_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            report_id = %report_id,
            format = %format,
            rows = outcome.row_count,
            truncated = outcome.truncated,
            bytes = artifact_size,
            elapsed_ms = execution_time_ms,
            "报表已生成"
        );

        Ok(ReportResult {
            report_id,
            chart,
            format,
            artifact_size,
            row_count: outcome.row_count,
            truncated: outcome.truncated,
            execution_time_ms,
        })
    }
}

#[async_trait]
impl ReportServiceTrait for ReportService {
    async fn generate(&self, req: ReportRequest) -> AppResult<ReportResult> {
        // 校验请求与 SQL，在连接数据库之前完成
        req.validate()?;
        SqlValidator::validate(&req.sql)?;

        let query = QueryDescriptor::new(req.sql, req.params)?;
        let reporter =
            Reporter::new(self.renderer).with_row_limit(req.limit.map(|limit| limit as usize));
        self.produce(reporter, query, req.mapping, req.format).await
    }

    async fn generate_preset(&self, preset: Preset, req: PresetRequest) -> AppResult<ReportResult> {
        req.validate()?;

        let (query, mapping) = preset.build(req.from, req.to)?;
        tracing::debug!(preset = %preset, from = %req.from, to = %req.to, "生成内置报表");
        self.produce(Reporter::new(self.renderer), query, mapping, req.format)
            .await
    }

    async fn artifact(&self, report_id: &str) -> AppResult<(OutputFormat, Vec<u8>)> {
        self.store.load(report_id).await
    }

    async fn test_connection(&self) -> AppResult<u64> {
        let rtt = check_connection(&self.database).await?;
        Ok(rtt.as_millis() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::errors::{QueryError, ReportError};

    fn service(dir: &std::path::Path) -> ReportService {
        // 端口 1 上没有 MySQL，任何连接尝试都会失败
        let database = ConnectionConfig::new("127.0.0.1", 1, "root", "secret", "pos_db")
            .with_connect_timeout(2);
        ReportService::new(
            database,
            ChartRenderer::default(),
            Arc::new(ArtifactStore::new(dir)),
        )
    }

    fn request(sql: &str) -> ReportRequest {
        serde_json::from_value(serde_json::json!({
            "sql": sql,
            "mapping": { "x": "year", "y": ["value"] }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_write_statement_is_rejected_before_connecting() {
        let dir = tempfile::tempdir().unwrap();
        let err = service(dir.path())
            .generate(request("DELETE FROM sales"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Report(ReportError::Query(QueryError::Unsafe(_)))
        ));
    }

    #[tokio::test]
    async fn test_parameter_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = service(dir.path())
            .generate(request("SELECT year, value FROM t WHERE year > ?"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_unreachable_database_leaves_no_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let err = service(dir.path())
            .generate(request("SELECT 2021 AS year, 100 AS value"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CONNECTION_ERROR");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_default_limit_applies() {
        let req = request("SELECT 1");
        assert_eq!(req.limit, Some(common::models::report::DEFAULT_ROW_LIMIT));
        assert_eq!(req.format, OutputFormat::Svg);
    }
}

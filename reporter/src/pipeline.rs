//! The report pipeline: connect, execute, map, render.
//!
//! Stages run strictly in sequence and the first failure ends the report.
//! The connection is released on every path.

use std::time::{Duration, Instant};

use common::errors::{QueryError, ReportError};
use common::models::chart::{ChartSpec, ColumnMapping};
use common::models::connection::ConnectionConfig;
use common::models::query::QueryDescriptor;
use futures::TryStreamExt;
use tracing::{info, warn};

use crate::connection::{connect, ReportConnection};
use crate::executor::execute;
use crate::mapping::SpecBuilder;
use crate::render::ChartRenderer;
use crate::sink::OutputSink;

/// What a finished report produced.
#[derive(Debug, Clone)]
pub struct ReportOutcome {
    pub chart: ChartSpec,
    pub row_count: usize,
    /// The row limit ended the read while rows remained.
    pub truncated: bool,
    pub elapsed: Duration,
}

/// Runs reports. Holds no per-report state, so one value can serve any
/// number of concurrent reports.
#[derive(Debug, Clone, Default)]
pub struct Reporter {
    renderer: ChartRenderer,
    row_limit: Option<usize>,
}

impl Reporter {
    pub fn new(renderer: ChartRenderer) -> Self {
        Self {
            renderer,
            row_limit: None,
        }
    }

    /// Caps the rows read per report; later rows are left unread.
    pub fn with_row_limit(mut self, limit: Option<usize>) -> Self {
        self.row_limit = limit;
        self
    }

    pub fn renderer(&self) -> &ChartRenderer {
        &self.renderer
    }

    /// Executes `query` on an open connection and folds the rows into a
    /// chart.
    ///
    /// The mapping is checked against the schema before any row is read.
    pub async fn collect(
        &self,
        conn: &mut ReportConnection,
        query: &QueryDescriptor,
        mapping: &ColumnMapping,
    ) -> Result<ReportOutcome, ReportError> {
        let start = Instant::now();
        let mut rows = execute(conn, query).await?;
        if let Some(limit) = self.row_limit {
            rows = rows.with_limit(limit);
        }

        let mut builder = SpecBuilder::new(rows.schema(), mapping)?;
        while let Some(row) = rows.try_next().await? {
            builder.push(&row)?;
        }

        if rows.is_truncated() {
            warn!(limit = rows.rows_read(), "result cut short by the row limit");
        }
        Ok(ReportOutcome {
            chart: builder.finish(),
            row_count: rows.rows_read(),
            truncated: rows.is_truncated(),
            elapsed: start.elapsed(),
        })
    }

    /// Opens a connection, collects the chart and releases the connection.
    ///
    /// With `query_timeout_secs` set, a query that overruns is killed on the
    /// server and reported as [`QueryError::Timeout`].
    pub async fn build_chart(
        &self,
        config: &ConnectionConfig,
        query: &QueryDescriptor,
        mapping: &ColumnMapping,
    ) -> Result<ReportOutcome, ReportError> {
        let mut conn = connect(config).await?;

        let collected = match config.query_timeout_secs {
            Some(secs) => {
                let run = self.collect(&mut conn, query, mapping);
                let outcome = tokio::time::timeout(Duration::from_secs(secs), run).await;
                match outcome {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(connection_id = conn.connection_id(), secs, "query timed out");
                        let killer = conn.kill_handle();
                        drop(conn);
                        if let Err(e) = killer.kill().await {
                            warn!(error = %e, "failed to kill timed out query");
                        }
                        return Err(QueryError::Timeout(secs).into());
                    }
                }
            }
            None => self.collect(&mut conn, query, mapping).await,
        };

        conn.close().await;
        collected
    }

    /// Runs the whole pipeline and writes the artifact to `sink`.
    pub async fn run(
        &self,
        config: &ConnectionConfig,
        query: &QueryDescriptor,
        mapping: &ColumnMapping,
        sink: &mut dyn OutputSink,
    ) -> Result<ReportOutcome, ReportError> {
        let start = Instant::now();
        let mut outcome = self.build_chart(config, query, mapping).await?;
        self.renderer.render(&outcome.chart, sink)?;

        outcome.elapsed = start.elapsed();
        info!(
            rows = outcome.row_count,
            truncated = outcome.truncated,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            sink = %sink.describe(),
            "report finished"
        );
        Ok(outcome)
    }
}

/// Connects, runs `SELECT 1` and disconnects. Returns the round-trip time.
pub async fn check_connection(config: &ConnectionConfig) -> Result<Duration, ReportError> {
    let mut conn = connect(config).await?;
    let result = conn.ping().await;
    conn.close().await;
    result
}

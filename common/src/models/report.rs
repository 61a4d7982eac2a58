//! Report request and result models used by the HTTP API.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use super::chart::{ChartSpec, ColumnMapping, OutputFormat};
use super::query::QueryParam;

/// Default maximum number of rows folded into a chart.
pub const DEFAULT_ROW_LIMIT: u32 = 1000;

/// Request body for an ad-hoc report.
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReportRequest {
    /// Read-only SQL statement with `?` placeholders.
    #[validate(length(min = 1, message = "SQL statement is required"))]
    pub sql: String,

    /// Values for the placeholders, in order.
    #[serde(default)]
    pub params: Vec<QueryParam>,

    /// Column to axis/series mapping.
    #[validate(nested)]
    pub mapping: ColumnMapping,

    /// Artifact format (default: svg).
    #[serde(default)]
    pub format: OutputFormat,

    /// Maximum number of rows to chart (default: 1000).
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, message = "limit must be positive"))]
    pub limit: Option<u32>,
}

fn default_limit() -> Option<u32> {
    Some(DEFAULT_ROW_LIMIT)
}

/// Request body for the built-in sales reports.
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_range"))]
pub struct PresetRequest {
    /// First day of the range (inclusive).
    pub from: NaiveDate,

    /// Last day of the range (inclusive).
    pub to: NaiveDate,

    /// Artifact format (default: svg).
    #[serde(default)]
    pub format: OutputFormat,
}

fn validate_range(req: &PresetRequest) -> Result<(), ValidationError> {
    if req.from > req.to {
        let mut err = ValidationError::new("date_range");
        err.message = Some("`from` must not be after `to`".into());
        return Err(err);
    }
    Ok(())
}

/// Result of a generated report.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReportResult {
    /// Identifier of the stored artifact.
    pub report_id: String,

    /// Chart that was rendered.
    pub chart: ChartSpec,

    /// Artifact format.
    pub format: OutputFormat,

    /// Artifact size in bytes.
    pub artifact_size: usize,

    /// Number of rows read from the database.
    pub row_count: usize,

    /// The row limit stopped the read while more rows were available, so
    /// the chart covers only the first `row_count` rows.
    #[serde(default)]
    pub truncated: bool,

    /// Time spent querying and rendering, in milliseconds.
    pub execution_time_ms: u64,
}

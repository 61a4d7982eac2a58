//! Error types.
//!
//! Each report stage has its own error enum. [`ReportError`] unifies them for
//! the pipeline and [`AppError`] adds the HTTP-facing cases.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::response::ApiResponse;

/// Failures while establishing or holding a database connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The connection configuration failed validation.
    #[error("invalid connection config: {0}")]
    InvalidConfig(String),

    /// The server could not be reached.
    #[error("cannot reach {target}: {message}")]
    Unreachable { target: String, message: String },

    /// The server rejected the credentials.
    #[error("authentication failed for {target}: {message}")]
    Authentication { target: String, message: String },

    /// No connection within the configured timeout.
    #[error("connecting to {target} timed out after {secs}s")]
    Timeout { target: String, secs: u64 },

    /// The connection died or was terminated while in use.
    #[error("connection lost: {0}")]
    Lost(String),
}

/// Failures while preparing or running a query.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Bound parameters do not match the placeholders in the query text.
    #[error("query has {placeholders} placeholder(s) but {params} parameter(s) were bound")]
    ParameterMismatch { placeholders: usize, params: usize },

    /// The statement is not allowed for reports.
    #[error("unsafe SQL: {0}")]
    Unsafe(String),

    /// The server could not parse the statement.
    #[error("malformed SQL: {0}")]
    Syntax(String),

    /// The server failed while executing the statement.
    #[error("server error {code}: {message}")]
    Server { code: String, message: String },

    /// The query did not finish within the configured timeout.
    #[error("query timed out after {0}s")]
    Timeout(u64),

    /// A cell could not be decoded into a report value.
    #[error("cannot decode column `{column}` ({data_type}): {message}")]
    Decode {
        column: String,
        data_type: String,
        message: String,
    },

    /// A row disagrees with the result schema.
    #[error("row {row} does not match the result schema: {message}")]
    SchemaMismatch { row: usize, message: String },
}

/// Failures while mapping result rows onto a chart.
#[derive(Debug, Error, PartialEq)]
pub enum MappingError {
    /// A designated column is absent from the result schema.
    #[error("column `{0}` is not in the result set")]
    MissingColumn(String),

    /// A designated column has a kind the chart cannot use there.
    #[error("column `{column}` is {found}, expected {expected}")]
    IncompatibleType {
        column: String,
        expected: String,
        found: String,
    },

    /// The mapping names no y columns.
    #[error("mapping needs at least one y column")]
    NoSeries,

    /// A row has fewer cells than the schema promises.
    #[error("row {row} has {found} cell(s), schema has {expected}")]
    RowShape {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// Failures while turning a chart spec into an artifact.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The canvas or data cannot form a drawable chart.
    #[error("invalid chart geometry: {0}")]
    InvalidGeometry(String),

    /// The drawing backend failed.
    #[error("drawing failed: {0}")]
    Backend(String),

    /// The artifact could not be serialized.
    #[error("cannot encode {format} artifact: {message}")]
    Encode { format: String, message: String },

    /// The sink could not store the artifact.
    #[error("cannot write artifact to {target}: {source}")]
    Sink {
        target: String,
        #[source]
        source: std::io::Error,
    },
}

/// Any failure of the report pipeline.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl ReportError {
    /// Stable error code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            ReportError::Connection(_) => "CONNECTION_ERROR",
            ReportError::Query(QueryError::Unsafe(_)) => "UNSAFE_SQL",
            ReportError::Query(QueryError::ParameterMismatch { .. }) => "VALIDATION_ERROR",
            ReportError::Query(_) => "QUERY_ERROR",
            ReportError::Mapping(_) => "MAPPING_ERROR",
            ReportError::Render(_) => "RENDER_ERROR",
        }
    }

    /// HTTP status matching the failed stage.
    pub fn status(&self) -> StatusCode {
        match self {
            ReportError::Connection(ConnectionError::InvalidConfig(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ReportError::Connection(_) => StatusCode::SERVICE_UNAVAILABLE,
            ReportError::Query(QueryError::Unsafe(_))
            | ReportError::Query(QueryError::ParameterMismatch { .. }) => StatusCode::BAD_REQUEST,
            ReportError::Query(QueryError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            ReportError::Query(_) => StatusCode::BAD_GATEWAY,
            ReportError::Mapping(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ReportError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Errors returned by HTTP handlers.
#[derive(Debug, Error)]
pub enum AppError {
    /// Request body failed validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The report pipeline failed.
    #[error(transparent)]
    Report(#[from] ReportError),

    /// Unexpected server-side failure.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias used by service code.
pub type AppResult<T> = Result<T, AppError>;

impl From<ConnectionError> for AppError {
    fn from(e: ConnectionError) -> Self {
        AppError::Report(e.into())
    }
}

impl From<QueryError> for AppError {
    fn from(e: QueryError) -> Self {
        AppError::Report(e.into())
    }
}

impl From<MappingError> for AppError {
    fn from(e: MappingError) -> Self {
        AppError::Report(e.into())
    }
}

impl From<RenderError> for AppError {
    fn from(e: RenderError) -> Self {
        AppError::Report(e.into())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::Validation(e.to_string())
    }
}

impl AppError {
    /// Stable error code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Report(e) => e.code(),
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Report(e) => e.status(),
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        } else {
            tracing::warn!(code = self.code(), error = %self, "request rejected");
        }
        (status, Json(ApiResponse::err(self.code(), self.to_string()))).into_response()
    }
}

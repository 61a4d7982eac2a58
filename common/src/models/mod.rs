//! Shared data models.

pub mod chart;
pub mod connection;
pub mod query;
pub mod report;

// Re-export commonly used types
pub use chart::{ChartSpec, ColumnMapping, OutputFormat, Point, Series, XDomain};
pub use connection::ConnectionConfig;
pub use query::{Cell, ColumnInfo, ColumnKind, QueryDescriptor, QueryParam, ResultRow, ResultSchema};
pub use report::{PresetRequest, ReportRequest, ReportResult};

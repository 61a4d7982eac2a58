//! Turns MySQL query results into charts.
//!
//! A report runs four stages in order:
//!
//! 1. [`connect`] opens a [`ReportConnection`];
//! 2. [`execute`] runs a [`QueryDescriptor`](common::models::QueryDescriptor)
//!    and yields a lazy [`RowStream`];
//! 3. [`to_chart_spec`] maps the rows onto a
//!    [`ChartSpec`](common::models::ChartSpec);
//! 4. [`render`] draws the chart into an [`OutputSink`].
//!
//! [`Reporter`] wires the stages together.

pub mod connection;
pub mod executor;
pub mod export;
pub mod mapping;
pub mod pipeline;
pub mod presets;
pub mod render;
pub mod sink;

pub use connection::{connect, KillHandle, ReportConnection};
pub use executor::{execute, RowStream};
pub use mapping::{to_chart_spec, SpecBuilder};
pub use pipeline::{check_connection, ReportOutcome, Reporter};
pub use presets::Preset;
pub use render::{render, ChartRenderer};
pub use sink::{FileSink, MemorySink, OutputSink};

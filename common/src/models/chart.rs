//! Chart specification models.
//!
//! A [`ChartSpec`] is the renderer-independent description of a chart: every
//! point is an `(x, y)` pair of numbers and the [`XDomain`] says how x values
//! are to be read back (plain numbers, days, seconds or category indexes).

use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// One `(x, y)` data point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// A named, ordered sequence of points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Series {
    pub name: String,
    pub points: Vec<Point>,
}

impl Series {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            points: Vec::new(),
        }
    }
}

/// How the x values of every series are interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum XDomain {
    /// Plain numbers.
    Numeric,
    /// Days since 1970-01-01.
    Date,
    /// Seconds since 1970-01-01 00:00:00.
    DateTime,
    /// Indexes into `labels`.
    Category { labels: Vec<String> },
}

impl XDomain {
    /// Encodes a date as an x value.
    pub fn encode_date(date: NaiveDate) -> f64 {
        date.signed_duration_since(epoch_date()).num_days() as f64
    }

    /// Encodes a date-time as an x value.
    pub fn encode_datetime(value: NaiveDateTime) -> f64 {
        value.and_utc().timestamp() as f64
    }

    /// Formats an x value for axis labels and exports.
    pub fn format(&self, x: f64) -> String {
        match self {
            XDomain::Numeric => format_number(x),
            XDomain::Date => epoch_date()
                .checked_add_signed(chrono::Duration::days(x.round() as i64))
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            XDomain::DateTime => DateTime::from_timestamp(x.round() as i64, 0)
                .map(|d| d.naive_utc().format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
            XDomain::Category { labels } => {
                let index = x.round();
                if (x - index).abs() > 1e-6 || index < 0.0 {
                    return String::new();
                }
                labels.get(index as usize).cloned().unwrap_or_default()
            }
        }
    }
}

fn epoch_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

/// Formats a number without a trailing `.0` for whole values.
pub fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

/// Everything needed to draw a chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChartSpec {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub x_domain: XDomain,
    pub series: Vec<Series>,
}

impl ChartSpec {
    /// Total number of points across all series.
    pub fn point_count(&self) -> usize {
        self.series.iter().map(|s| s.points.len()).sum()
    }

    /// True when no series has a point.
    pub fn is_empty(&self) -> bool {
        self.point_count() == 0
    }

    /// Formats an x value according to the chart's domain.
    pub fn format_x(&self, x: f64) -> String {
        self.x_domain.format(x)
    }
}

/// Which result columns feed the chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
pub struct ColumnMapping {
    /// Column used for the x axis.
    #[validate(length(min = 1, message = "x column is required"))]
    pub x: String,

    /// Columns plotted as series, one series per column.
    #[validate(length(min = 1, message = "at least one y column is required"))]
    pub y: Vec<String>,

    /// Chart title (defaults to `<y> by <x>`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// X axis label (defaults to the x column name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_label: Option<String>,

    /// Y axis label (defaults to the y column name, or `value`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_label: Option<String>,
}

impl ColumnMapping {
    pub fn new<I, S>(x: impl Into<String>, y: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            x: x.into(),
            y: y.into_iter().map(Into::into).collect(),
            title: None,
            x_label: None,
            y_label: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_x_label(mut self, label: impl Into<String>) -> Self {
        self.x_label = Some(label.into());
        self
    }

    pub fn with_y_label(mut self, label: impl Into<String>) -> Self {
        self.y_label = Some(label.into());
        self
    }
}

/// Artifact format produced by rendering or export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Scalable vector graphics.
    #[default]
    Svg,
    /// Raster image.
    Png,
    /// Chart spec as JSON.
    Json,
    /// Chart points as CSV.
    Csv,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Svg => "svg",
            OutputFormat::Png => "png",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Svg => "image/svg+xml",
            OutputFormat::Png => "image/png",
            OutputFormat::Json => "application/json",
            OutputFormat::Csv => "text/csv",
        }
    }

    /// Whether the format is a drawn image rather than a data export.
    pub fn is_image(self) -> bool {
        matches!(self, OutputFormat::Svg | OutputFormat::Png)
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "svg" => Some(OutputFormat::Svg),
            "png" => Some(OutputFormat::Png),
            "json" => Some(OutputFormat::Json),
            "csv" => Some(OutputFormat::Csv),
            _ => None,
        }
    }

    /// Format implied by a file name.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

//! Query and result-set models.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::QueryError;
use crate::utils::SqlValidator;

/// A value bound to a `?` placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum QueryParam {
    /// SQL NULL.
    Null,
    /// Boolean (sent as TINYINT).
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Date and time without zone, e.g. `2024-03-01T00:00:00`.
    DateTime(NaiveDateTime),
    /// Calendar date, e.g. `2024-03-01`.
    Date(NaiveDate),
    /// Text.
    Text(String),
}

impl QueryParam {
    /// Interprets a command-line literal.
    ///
    /// Integers, floats, ISO dates and date-times are recognised; `null`
    /// maps to SQL NULL and anything else is text.
    pub fn parse_literal(raw: &str) -> Self {
        let s = raw.trim();
        if s.eq_ignore_ascii_case("null") {
            return QueryParam::Null;
        }
        if let Ok(v) = s.parse::<i64>() {
            return QueryParam::Int(v);
        }
        if let Ok(v) = s.parse::<f64>() {
            return QueryParam::Float(v);
        }
        for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
            if let Ok(v) = NaiveDateTime::parse_from_str(s, format) {
                return QueryParam::DateTime(v);
            }
        }
        if let Ok(v) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return QueryParam::Date(v);
        }
        QueryParam::Text(raw.to_string())
    }
}

impl From<i64> for QueryParam {
    fn from(v: i64) -> Self {
        QueryParam::Int(v)
    }
}

impl From<f64> for QueryParam {
    fn from(v: f64) -> Self {
        QueryParam::Float(v)
    }
}

impl From<&str> for QueryParam {
    fn from(v: &str) -> Self {
        QueryParam::Text(v.to_string())
    }
}

impl From<String> for QueryParam {
    fn from(v: String) -> Self {
        QueryParam::Text(v)
    }
}

impl From<NaiveDate> for QueryParam {
    fn from(v: NaiveDate) -> Self {
        QueryParam::Date(v)
    }
}

impl From<NaiveDateTime> for QueryParam {
    fn from(v: NaiveDateTime) -> Self {
        QueryParam::DateTime(v)
    }
}

/// Query text plus bound parameters.
///
/// Construction checks that the number of parameters equals the number of
/// `?` placeholders; the descriptor cannot be modified afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    sql: String,
    params: Vec<QueryParam>,
}

impl QueryDescriptor {
    /// Creates a descriptor, rejecting a parameter/placeholder mismatch.
    pub fn new(sql: impl Into<String>, params: Vec<QueryParam>) -> Result<Self, QueryError> {
        let sql = sql.into();
        let placeholders = SqlValidator::count_placeholders(&sql);
        if placeholders != params.len() {
            return Err(QueryError::ParameterMismatch {
                placeholders,
                params: params.len(),
            });
        }
        Ok(Self { sql, params })
    }

    /// Query text.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Bound parameters in placeholder order.
    pub fn params(&self) -> &[QueryParam] {
        &self.params
    }
}

/// Coarse type of a result column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    /// Integer, decimal or floating point.
    Numeric,
    /// Character data (also the fallback for unknown types).
    Text,
    /// Calendar date.
    Date,
    /// Date with time of day.
    DateTime,
}

impl ColumnKind {
    pub fn is_temporal(self) -> bool {
        matches!(self, ColumnKind::Date | ColumnKind::DateTime)
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKind::Numeric => write!(f, "numeric"),
            ColumnKind::Text => write!(f, "text"),
            ColumnKind::Date => write!(f, "date"),
            ColumnKind::DateTime => write!(f, "datetime"),
        }
    }
}

/// Column information in a query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ColumnInfo {
    /// Column name (or alias).
    pub name: String,

    /// Database type name, e.g. `DECIMAL`.
    pub data_type: String,

    /// Report kind derived from the database type.
    pub kind: ColumnKind,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            kind,
        }
    }
}

/// Ordered column list shared by every row of one result set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultSchema {
    columns: Vec<ColumnInfo>,
}

impl ResultSchema {
    pub fn new(columns: Vec<ColumnInfo>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Position of a column by name.
    ///
    /// An exact match wins; otherwise names are compared ignoring ASCII case,
    /// as MySQL does for column names.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .or_else(|| {
                self.columns
                    .iter()
                    .position(|c| c.name.eq_ignore_ascii_case(name))
            })
    }

    /// Column by name, see [`ResultSchema::index_of`].
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.index_of(name).map(|i| &self.columns[i])
    }

    /// Verifies that `row` has this schema's shape.
    ///
    /// `index` is the zero-based row number used in the error.
    pub fn check_row(&self, index: usize, row: &ResultRow) -> Result<(), QueryError> {
        if row.len() != self.columns.len() {
            return Err(QueryError::SchemaMismatch {
                row: index,
                message: format!(
                    "{} cell(s) for {} column(s)",
                    row.len(),
                    self.columns.len()
                ),
            });
        }
        for (column, cell) in self.columns.iter().zip(row.cells()) {
            if let Some(kind) = cell.kind() {
                if kind != column.kind {
                    return Err(QueryError::SchemaMismatch {
                        row: index,
                        message: format!(
                            "column `{}` is {} but the cell is {}",
                            column.name, column.kind, kind
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// One typed value of a result row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Cell {
    /// Kind of a non-NULL cell.
    pub fn kind(&self) -> Option<ColumnKind> {
        match self {
            Cell::Null => None,
            Cell::Int(_) | Cell::Float(_) => Some(ColumnKind::Numeric),
            Cell::Text(_) => Some(ColumnKind::Text),
            Cell::Date(_) => Some(ColumnKind::Date),
            Cell::DateTime(_) => Some(ColumnKind::DateTime),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Numeric value, if the cell is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(v) => Some(*v as f64),
            Cell::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Int(v) => write!(f, "{}", v),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Text(v) => write!(f, "{}", v),
            Cell::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            Cell::DateTime(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// One row of a query result.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ResultRow {
    cells: Vec<Cell>,
}

impl ResultRow {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn get(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl From<Vec<Cell>> for ResultRow {
    fn from(cells: Vec<Cell>) -> Self {
        Self::new(cells)
    }
}

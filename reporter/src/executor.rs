//! Query execution.
//!
//! [`execute`] prepares the statement to learn the result schema, then
//! streams rows lazily as typed [`ResultRow`]s.

use std::pin::Pin;
use std::task::{Context, Poll};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use common::errors::{QueryError, ReportError};
use common::models::query::{
    Cell, ColumnInfo, ColumnKind, QueryDescriptor, QueryParam, ResultRow, ResultSchema,
};
use futures::ready;
use futures::stream::{BoxStream, Stream, StreamExt};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::mysql::{MySql, MySqlArguments, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, Executor, Row, Statement, TypeInfo, ValueRef};
use tracing::debug;

use crate::connection::{classify_query_error, ReportConnection};

/// How one column's wire values become [`Cell`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColumnDecoder {
    Signed,
    Unsigned,
    Decimal,
    Float,
    Double,
    Date,
    DateTime,
    Time,
    Text,
    Binary,
    /// Column whose type is `NULL`; every cell is NULL.
    AlwaysNull,
}

/// Maps a MySQL type name to its report kind and decoder.
///
/// Unknown types fall back to text.
pub(crate) fn classify_type(type_name: &str) -> (ColumnKind, ColumnDecoder) {
    let upper = type_name.to_ascii_uppercase();
    let unsigned = upper.ends_with("UNSIGNED");
    let base = upper.split_whitespace().next().unwrap_or("");

    match base {
        "BOOLEAN" | "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER" | "BIGINT" => {
            if unsigned {
                (ColumnKind::Numeric, ColumnDecoder::Unsigned)
            } else {
                (ColumnKind::Numeric, ColumnDecoder::Signed)
            }
        }
        "YEAR" => (ColumnKind::Numeric, ColumnDecoder::Unsigned),
        "DECIMAL" | "NUMERIC" => (ColumnKind::Numeric, ColumnDecoder::Decimal),
        "FLOAT" => (ColumnKind::Numeric, ColumnDecoder::Float),
        "DOUBLE" | "REAL" => (ColumnKind::Numeric, ColumnDecoder::Double),
        "DATE" => (ColumnKind::Date, ColumnDecoder::Date),
        "DATETIME" | "TIMESTAMP" => (ColumnKind::DateTime, ColumnDecoder::DateTime),
        "TIME" => (ColumnKind::Text, ColumnDecoder::Time),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
        | "GEOMETRY" => (ColumnKind::Text, ColumnDecoder::Binary),
        "NULL" => (ColumnKind::Text, ColumnDecoder::AlwaysNull),
        _ => (ColumnKind::Text, ColumnDecoder::Text),
    }
}

fn bind_param<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    param: &QueryParam,
) -> Query<'q, MySql, MySqlArguments> {
    match param {
        QueryParam::Null => query.bind(Option::<String>::None),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::DateTime(v) => query.bind(*v),
        QueryParam::Date(v) => query.bind(*v),
        QueryParam::Text(v) => query.bind(v.clone()),
    }
}

/// Runs `query` on `conn` and returns its rows as a lazy stream.
///
/// The statement is prepared first so the schema is available even when
/// the result is empty. No row is read until the stream is polled.
pub async fn execute<'c>(
    conn: &'c mut ReportConnection,
    query: &'c QueryDescriptor,
) -> Result<RowStream<'c>, ReportError> {
    let raw = conn.raw();

    let statement = (&mut *raw)
        .prepare(query.sql())
        .await
        .map_err(classify_query_error)?;

    let mut columns = Vec::with_capacity(statement.columns().len());
    let mut decoders = Vec::with_capacity(statement.columns().len());
    for column in statement.columns() {
        let type_name = column.type_info().name();
        let (kind, decoder) = classify_type(type_name);
        columns.push(ColumnInfo::new(column.name(), type_name, kind));
        decoders.push(decoder);
    }
    let schema = ResultSchema::new(columns);
    debug!(columns = schema.len(), params = query.params().len(), "statement prepared");

    let bound = query
        .params()
        .iter()
        .fold(sqlx::query(query.sql()), bind_param);

    let decoder = RowDecoder {
        schema: schema.clone(),
        decoders,
    };
    let rows = bound
        .fetch(raw)
        .map(move |row| match row {
            Ok(raw) => decoder.decode(&raw).map_err(ReportError::from),
            Err(e) => Err(classify_query_error(e)),
        })
        .boxed();

    Ok(RowStream::new(schema, rows))
}

/// Turns MySQL wire rows into [`ResultRow`]s, one decoder per column.
struct RowDecoder {
    schema: ResultSchema,
    decoders: Vec<ColumnDecoder>,
}

impl RowDecoder {
    fn decode(&self, row: &MySqlRow) -> Result<ResultRow, QueryError> {
        let mut cells = Vec::with_capacity(self.decoders.len());
        for (index, decoder) in self.decoders.iter().enumerate() {
            cells.push(self.decode_cell(row, index, *decoder)?);
        }
        Ok(ResultRow::new(cells))
    }

    fn decode_cell(
        &self,
        row: &MySqlRow,
        index: usize,
        decoder: ColumnDecoder,
    ) -> Result<Cell, QueryError> {
        let column = &self.schema.columns()[index];
        let decode_err = |e: sqlx::Error| QueryError::Decode {
            column: column.name.clone(),
            data_type: column.data_type.clone(),
            message: e.to_string(),
        };

        if decoder == ColumnDecoder::AlwaysNull
            || row.try_get_raw(index).map_err(decode_err)?.is_null()
        {
            return Ok(Cell::Null);
        }

        let cell = match decoder {
            ColumnDecoder::Signed => Cell::Int(
                row.try_get_unchecked::<i64, _>(index)
                    .map_err(decode_err)?,
            ),
            ColumnDecoder::Unsigned => {
                let v = row.try_get_unchecked::<u64, _>(index).map_err(decode_err)?;
                match i64::try_from(v) {
                    Ok(v) => Cell::Int(v),
                    Err(_) => Cell::Float(v as f64),
                }
            }
            ColumnDecoder::Decimal => {
                let v = row
                    .try_get_unchecked::<Decimal, _>(index)
                    .map_err(decode_err)?;
                Cell::Float(v.to_f64().ok_or_else(|| QueryError::Decode {
                    column: column.name.clone(),
                    data_type: column.data_type.clone(),
                    message: format!("{} is out of range for f64", v),
                })?)
            }
            ColumnDecoder::Float => {
                let v = row.try_get_unchecked::<f32, _>(index).map_err(decode_err)?;
                Cell::Float(f64::from(v))
            }
            ColumnDecoder::Double => Cell::Float(
                row.try_get_unchecked::<f64, _>(index)
                    .map_err(decode_err)?,
            ),
            ColumnDecoder::Date => Cell::Date(
                row.try_get_unchecked::<NaiveDate, _>(index)
                    .map_err(decode_err)?,
            ),
            ColumnDecoder::DateTime => Cell::DateTime(
                row.try_get_unchecked::<NaiveDateTime, _>(index)
                    .map_err(decode_err)?,
            ),
            ColumnDecoder::Time => Cell::Text(
                row.try_get_unchecked::<NaiveTime, _>(index)
                    .map_err(decode_err)?
                    .format("%H:%M:%S")
                    .to_string(),
            ),
            ColumnDecoder::Text => Cell::Text(
                row.try_get_unchecked::<String, _>(index)
                    .map_err(decode_err)?,
            ),
            ColumnDecoder::Binary => {
                let bytes = row
                    .try_get_unchecked::<Vec<u8>, _>(index)
                    .map_err(decode_err)?;
                Cell::Text(String::from_utf8_lossy(&bytes).into_owned())
            }
            ColumnDecoder::AlwaysNull => Cell::Null,
        };
        Ok(cell)
    }
}

/// Lazy, finite, single-pass stream of result rows.
///
/// Every row is checked against the schema, and the stream ends after the
/// first error. Borrows the connection it reads from; dropping the stream
/// discards any unread rows.
pub struct RowStream<'c> {
    schema: ResultSchema,
    rows: BoxStream<'c, Result<ResultRow, ReportError>>,
    read: usize,
    limit: Option<usize>,
    truncated: bool,
    finished: bool,
}

impl<'c> RowStream<'c> {
    /// Wraps a stream of decoded rows described by `schema`.
    pub fn new(schema: ResultSchema, rows: BoxStream<'c, Result<ResultRow, ReportError>>) -> Self {
        Self {
            schema,
            rows,
            read: 0,
            limit: None,
            truncated: false,
            finished: false,
        }
    }

    /// Schema of every row this stream yields.
    pub fn schema(&self) -> &ResultSchema {
        &self.schema
    }

    /// Ends the stream after `limit` rows.
    ///
    /// One further row is fetched and dropped to tell whether the limit cut
    /// the result short.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Rows yielded so far.
    pub fn rows_read(&self) -> usize {
        self.read
    }

    /// Whether the row limit ended the stream while rows remained.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

impl Stream for RowStream<'_> {
    type Item = Result<ResultRow, ReportError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        let at_limit = this.limit.is_some_and(|limit| this.read >= limit);

        match ready!(this.rows.as_mut().poll_next(cx)) {
            None => {
                this.finished = true;
                Poll::Ready(None)
            }
            Some(_) if at_limit => {
                this.truncated = true;
                this.finished = true;
                Poll::Ready(None)
            }
            Some(Err(e)) => {
                this.finished = true;
                Poll::Ready(Some(Err(e)))
            }
            Some(Ok(row)) => match this.schema.check_row(this.read, &row) {
                Ok(()) => {
                    this.read += 1;
                    Poll::Ready(Some(Ok(row)))
                }
                Err(e) => {
                    this.finished = true;
                    Poll::Ready(Some(Err(e.into())))
                }
            },
        }
    }
}

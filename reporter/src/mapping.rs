//! Result rows to chart spec.

use common::errors::MappingError;
use common::models::chart::{ChartSpec, ColumnMapping, Point, Series, XDomain};
use common::models::query::{Cell, ColumnKind, ResultRow, ResultSchema};

/// Incremental builder used by [`to_chart_spec`] and by the pipeline, which
/// feeds rows straight from the stream.
///
/// All column checks happen in [`SpecBuilder::new`], so a builder that was
/// created successfully only fails on malformed rows.
#[derive(Debug)]
pub struct SpecBuilder {
    x_index: usize,
    x_kind: ColumnKind,
    y_indexes: Vec<usize>,
    labels: Vec<String>,
    series: Vec<Series>,
    title: String,
    x_label: String,
    y_label: String,
    expected_cells: usize,
    rows: usize,
}

impl SpecBuilder {
    pub fn new(schema: &ResultSchema, mapping: &ColumnMapping) -> Result<Self, MappingError> {
        if mapping.y.is_empty() {
            return Err(MappingError::NoSeries);
        }

        let x_index = schema
            .index_of(&mapping.x)
            .ok_or_else(|| MappingError::MissingColumn(mapping.x.clone()))?;
        let x_column = &schema.columns()[x_index];

        let mut y_indexes = Vec::with_capacity(mapping.y.len());
        let mut series = Vec::with_capacity(mapping.y.len());
        for name in &mapping.y {
            let index = schema
                .index_of(name)
                .ok_or_else(|| MappingError::MissingColumn(name.clone()))?;
            let column = &schema.columns()[index];
            if column.kind != ColumnKind::Numeric {
                return Err(MappingError::IncompatibleType {
                    column: column.name.clone(),
                    expected: ColumnKind::Numeric.to_string(),
                    found: column.kind.to_string(),
                });
            }
            y_indexes.push(index);
            series.push(Series::new(column.name.clone()));
        }

        let y_names: Vec<&str> = series.iter().map(|s| s.name.as_str()).collect();
        let title = mapping
            .title
            .clone()
            .unwrap_or_else(|| format!("{} by {}", y_names.join(", "), x_column.name));
        let x_label = mapping
            .x_label
            .clone()
            .unwrap_or_else(|| x_column.name.clone());
        let y_label = mapping.y_label.clone().unwrap_or_else(|| match y_names.as_slice() {
            [single] => single.to_string(),
            _ => String::from("value"),
        });

        Ok(Self {
            x_index,
            x_kind: x_column.kind,
            y_indexes,
            labels: Vec::new(),
            series,
            title,
            x_label,
            y_label,
            expected_cells: schema.len(),
            rows: 0,
        })
    }

    /// Adds one row.
    ///
    /// A NULL x skips the row; a NULL y skips only that series' point.
    pub fn push(&mut self, row: &ResultRow) -> Result<(), MappingError> {
        let index = self.rows;
        self.rows += 1;
        if row.len() < self.expected_cells {
            return Err(MappingError::RowShape {
                row: index,
                expected: self.expected_cells,
                found: row.len(),
            });
        }

        let Some(x) = self.encode_x(&row.cells()[self.x_index]) else {
            return Ok(());
        };

        for (series, &y_index) in self.series.iter_mut().zip(&self.y_indexes) {
            if let Some(y) = row.cells()[y_index].as_f64() {
                series.points.push(Point::new(x, y));
            }
        }
        Ok(())
    }

    fn encode_x(&mut self, cell: &Cell) -> Option<f64> {
        match cell {
            Cell::Null => None,
            Cell::Int(_) | Cell::Float(_) => cell.as_f64(),
            Cell::Date(d) => Some(XDomain::encode_date(*d)),
            Cell::DateTime(dt) => Some(XDomain::encode_datetime(*dt)),
            Cell::Text(label) => {
                let position = match self.labels.iter().position(|l| l == label) {
                    Some(p) => p,
                    None => {
                        self.labels.push(label.clone());
                        self.labels.len() - 1
                    }
                };
                Some(position as f64)
            }
        }
    }

    /// Rows pushed so far, including skipped ones.
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn finish(self) -> ChartSpec {
        let x_domain = match self.x_kind {
            ColumnKind::Numeric => XDomain::Numeric,
            ColumnKind::Date => XDomain::Date,
            ColumnKind::DateTime => XDomain::DateTime,
            ColumnKind::Text => XDomain::Category {
                labels: self.labels,
            },
        };
        ChartSpec {
            title: self.title,
            x_label: self.x_label,
            y_label: self.y_label,
            x_domain,
            series: self.series,
        }
    }
}

/// Maps result rows onto a chart: one series per y column, in mapping order.
///
/// Fails without producing anything when a designated column is missing or
/// a y column is not numeric.
pub fn to_chart_spec<'a, I>(
    schema: &ResultSchema,
    rows: I,
    mapping: &ColumnMapping,
) -> Result<ChartSpec, MappingError>
where
    I: IntoIterator<Item = &'a ResultRow>,
{
    let mut builder = SpecBuilder::new(schema, mapping)?;
    for row in rows {
        builder.push(row)?;
    }
    Ok(builder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use common::models::query::ColumnInfo;

    fn year_value() -> (ResultSchema, Vec<ResultRow>) {
        let schema = ResultSchema::new(vec![
            ColumnInfo::new("year", "INT", ColumnKind::Numeric),
            ColumnInfo::new("value", "DECIMAL", ColumnKind::Numeric),
        ]);
        let rows = [(2021, 100.0), (2022, 150.0), (2023, 90.0)]
            .into_iter()
            .map(|(x, y)| ResultRow::new(vec![Cell::Int(x), Cell::Float(y)]))
            .collect();
        (schema, rows)
    }

    #[test]
    fn test_year_value_rows_become_one_series() {
        let (schema, rows) = year_value();
        let spec = to_chart_spec(&schema, &rows, &ColumnMapping::new("year", ["value"])).unwrap();

        assert_eq!(spec.series.len(), 1);
        assert_eq!(spec.series[0].name, "value");
        assert_eq!(
            spec.series[0].points,
            vec![
                Point::new(2021.0, 100.0),
                Point::new(2022.0, 150.0),
                Point::new(2023.0, 90.0),
            ]
        );
        assert_eq!(spec.x_domain, XDomain::Numeric);
        assert_eq!(spec.title, "value by year");
        assert_eq!(spec.x_label, "year");
        assert_eq!(spec.y_label, "value");
    }

    #[test]
    fn test_point_count_matches_row_count() {
        let (schema, rows) = year_value();
        let spec = to_chart_spec(&schema, &rows, &ColumnMapping::new("year", ["value"])).unwrap();
        assert_eq!(spec.series[0].points.len(), rows.len());
    }

    #[test]
    fn test_mapping_is_idempotent() {
        let (schema, rows) = year_value();
        let mapping = ColumnMapping::new("year", ["value"]).with_title("Sales");
        let first = to_chart_spec(&schema, &rows, &mapping).unwrap();
        let second = to_chart_spec(&schema, &rows, &mapping).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_column_fails() {
        let (schema, rows) = year_value();
        let err = to_chart_spec(&schema, &rows, &ColumnMapping::new("year", ["profit"]))
            .unwrap_err();
        assert_eq!(err, MappingError::MissingColumn("profit".into()));

        let err = to_chart_spec(&schema, &rows, &ColumnMapping::new("month", ["value"]))
            .unwrap_err();
        assert_eq!(err, MappingError::MissingColumn("month".into()));
    }

    #[test]
    fn test_no_y_columns_fails() {
        let (schema, rows) = year_value();
        let mapping = ColumnMapping::new("year", Vec::<String>::new());
        assert_eq!(
            to_chart_spec(&schema, &rows, &mapping).unwrap_err(),
            MappingError::NoSeries
        );
    }

    #[test]
    fn test_text_y_column_is_incompatible() {
        let schema = ResultSchema::new(vec![
            ColumnInfo::new("year", "INT", ColumnKind::Numeric),
            ColumnInfo::new("name", "VARCHAR", ColumnKind::Text),
        ]);
        let err = to_chart_spec(&schema, &[], &ColumnMapping::new("year", ["name"])).unwrap_err();
        assert!(matches!(err, MappingError::IncompatibleType { ref column, .. } if column == "name"));
    }

    #[test]
    fn test_zero_rows_give_one_empty_series() {
        let (schema, _) = year_value();
        let spec = to_chart_spec(&schema, &[], &ColumnMapping::new("year", ["value"])).unwrap();
        assert_eq!(spec.series.len(), 1);
        assert!(spec.series[0].points.is_empty());
        assert!(spec.is_empty());
    }

    #[test]
    fn test_date_x_and_multiple_series() {
        let schema = ResultSchema::new(vec![
            ColumnInfo::new("sale_day", "DATE", ColumnKind::Date),
            ColumnInfo::new("total_sales", "DECIMAL", ColumnKind::Numeric),
            ColumnInfo::new("average_sale", "DECIMAL", ColumnKind::Numeric),
        ]);
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let rows = vec![
            ResultRow::new(vec![Cell::Date(day), Cell::Float(120.5), Cell::Float(40.0)]),
            ResultRow::new(vec![Cell::Date(day.succ_opt().unwrap()), Cell::Float(80.0), Cell::Null]),
        ];
        let mapping = ColumnMapping::new("sale_day", ["total_sales", "average_sale"]);
        let spec = to_chart_spec(&schema, &rows, &mapping).unwrap();

        assert_eq!(spec.x_domain, XDomain::Date);
        assert_eq!(spec.series.len(), 2);
        assert_eq!(spec.series[0].points.len(), 2);
        assert_eq!(spec.series[1].points.len(), 1);
        assert_eq!(spec.format_x(spec.series[0].points[0].x), "2024-03-01");
        assert_eq!(spec.y_label, "value");
        assert_eq!(spec.title, "total_sales, average_sale by sale_day");
    }

    #[test]
    fn test_text_x_becomes_categories_in_first_seen_order() {
        let schema = ResultSchema::new(vec![
            ColumnInfo::new("product", "VARCHAR", ColumnKind::Text),
            ColumnInfo::new("revenue", "DECIMAL", ColumnKind::Numeric),
        ]);
        let rows: Vec<ResultRow> = [("Coffee", 30.0), ("Bread", 12.0), ("Coffee", 5.0)]
            .into_iter()
            .map(|(p, r)| ResultRow::new(vec![Cell::Text(p.into()), Cell::Float(r)]))
            .collect();
        let spec = to_chart_spec(&schema, &rows, &ColumnMapping::new("product", ["revenue"])).unwrap();

        assert_eq!(
            spec.x_domain,
            XDomain::Category {
                labels: vec!["Coffee".into(), "Bread".into()]
            }
        );
        let xs: Vec<f64> = spec.series[0].points.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_null_x_skips_row() {
        let (schema, _) = year_value();
        let rows = vec![
            ResultRow::new(vec![Cell::Null, Cell::Float(1.0)]),
            ResultRow::new(vec![Cell::Int(2024), Cell::Float(2.0)]),
        ];
        let spec = to_chart_spec(&schema, &rows, &ColumnMapping::new("year", ["value"])).unwrap();
        assert_eq!(spec.series[0].points, vec![Point::new(2024.0, 2.0)]);
    }

    #[test]
    fn test_short_row_is_rejected() {
        let (schema, _) = year_value();
        let rows = vec![ResultRow::new(vec![Cell::Int(2024)])];
        let err = to_chart_spec(&schema, &rows, &ColumnMapping::new("year", ["value"])).unwrap_err();
        assert_eq!(
            err,
            MappingError::RowShape {
                row: 0,
                expected: 2,
                found: 1
            }
        );
    }
}

//! Data exports of a chart spec.
//!
//! JSON is the spec itself. CSV has the x label as first column and one
//! column per series; rows are the distinct x values in ascending order.

use std::io::Write;

use common::errors::RenderError;
use common::models::chart::{format_number, ChartSpec};

fn encode_err(format: &str, message: impl ToString) -> RenderError {
    RenderError::Encode {
        format: format.to_string(),
        message: message.to_string(),
    }
}

/// Writes the spec as pretty-printed JSON.
pub fn write_json<W: Write>(spec: &ChartSpec, out: W) -> Result<(), RenderError> {
    serde_json::to_writer_pretty(out, spec).map_err(|e| encode_err("json", e))
}

/// Writes the spec as CSV.
pub fn write_csv<W: Write>(spec: &ChartSpec, mut out: W) -> Result<(), RenderError> {
    let mut xs: Vec<f64> = spec
        .series
        .iter()
        .flat_map(|s| s.points.iter().map(|p| p.x))
        .collect();
    xs.sort_by(f64::total_cmp);
    xs.dedup();

    let mut header = vec![csv_field(&spec.x_label)];
    header.extend(spec.series.iter().map(|s| csv_field(&s.name)));
    writeln!(out, "{}", header.join(",")).map_err(|e| encode_err("csv", e))?;

    for x in xs {
        let mut record = vec![csv_field(&spec.format_x(x))];
        for series in &spec.series {
            // first point wins when a series repeats an x
            let cell = series
                .points
                .iter()
                .find(|p| p.x == x)
                .map(|p| format_number(p.y))
                .unwrap_or_default();
            record.push(cell);
        }
        writeln!(out, "{}", record.join(",")).map_err(|e| encode_err("csv", e))?;
    }
    Ok(())
}

/// JSON export as bytes.
pub fn to_json(spec: &ChartSpec) -> Result<Vec<u8>, RenderError> {
    let mut buf = Vec::new();
    write_json(spec, &mut buf)?;
    Ok(buf)
}

/// CSV export as bytes.
pub fn to_csv(spec: &ChartSpec) -> Result<Vec<u8>, RenderError> {
    let mut buf = Vec::new();
    write_csv(spec, &mut buf)?;
    Ok(buf)
}

fn csv_field(value: &str) -> String {
    if value.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::models::chart::{Point, Series, XDomain};

    fn spec() -> ChartSpec {
        ChartSpec {
            title: "Product performance".into(),
            x_label: "product".into(),
            y_label: "value".into(),
            x_domain: XDomain::Category {
                labels: vec!["Bread, sliced".into(), "Coffee".into()],
            },
            series: vec![
                Series {
                    name: "revenue".into(),
                    points: vec![Point::new(0.0, 12.5), Point::new(1.0, 30.0)],
                },
                Series {
                    name: "quantity_sold".into(),
                    points: vec![Point::new(1.0, 6.0)],
                },
            ],
        }
    }

    #[test]
    fn test_csv_has_one_column_per_series() {
        let csv = String::from_utf8(to_csv(&spec()).unwrap()).unwrap();
        assert_eq!(
            csv,
            "product,revenue,quantity_sold\n\"Bread, sliced\",12.5,\nCoffee,30,6\n"
        );
    }

    #[test]
    fn test_csv_of_empty_chart_is_header_only() {
        let mut spec = spec();
        spec.series.iter_mut().for_each(|s| s.points.clear());
        let csv = String::from_utf8(to_csv(&spec).unwrap()).unwrap();
        assert_eq!(csv, "product,revenue,quantity_sold\n");
    }

    #[test]
    fn test_json_round_trips() {
        let bytes = to_json(&spec()).unwrap();
        let parsed: ChartSpec = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed, spec());
    }
}

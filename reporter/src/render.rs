//! Chart rendering.
//!
//! Every artifact is produced fully in memory before the sink sees it.
//! Numeric and temporal x domains are drawn as lines with point markers,
//! category domains as grouped bars.

use std::ops::Range;
use std::sync::OnceLock;

use common::config::{DEFAULT_CHART_HEIGHT, DEFAULT_CHART_WIDTH};
use common::errors::RenderError;
use common::models::chart::{format_number, ChartSpec, OutputFormat, XDomain};
use plotters::coord::Shift;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;
use plotters::style::register_font;
use tracing::info;

use crate::export;
use crate::sink::OutputSink;

/// Smallest canvas edge that still leaves room for axes and caption.
pub const MIN_DIMENSION: u32 = 100;
pub const MAX_DIMENSION: u32 = 10_000;

/// Share of a category slot covered by its bars.
const BAR_GROUP_WIDTH: f64 = 0.8;

/// DejaVu Sans, used for every family plotters asks for.
static CHART_FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");
const FONT_FAMILIES: [&str; 3] = ["sans-serif", "serif", "monospace"];

static FONTS_REGISTERED: OnceLock<bool> = OnceLock::new();

/// Registers the bundled font once per process. Text is laid out and
/// rasterised from it, so no system fonts are needed.
fn ensure_fonts() -> Result<(), RenderError> {
    let registered = *FONTS_REGISTERED.get_or_init(|| {
        FONT_FAMILIES
            .iter()
            .all(|family| register_font(family, FontStyle::Normal, CHART_FONT).is_ok())
    });
    if registered {
        Ok(())
    } else {
        Err(RenderError::Backend("bundled chart font could not be loaded".into()))
    }
}

fn backend_err<E>(e: DrawingAreaErrorKind<E>) -> RenderError
where
    E: std::error::Error + Send + Sync,
{
    RenderError::Backend(e.to_string())
}

/// Renders chart specs at a fixed canvas size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartRenderer {
    width: u32,
    height: u32,
}

impl Default for ChartRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_CHART_WIDTH, DEFAULT_CHART_HEIGHT)
    }
}

impl ChartRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Renders `spec` and hands the finished artifact to `sink`.
    ///
    /// Nothing reaches the sink when rendering fails.
    pub fn render(&self, spec: &ChartSpec, sink: &mut dyn OutputSink) -> Result<(), RenderError> {
        let format = sink.format();
        let bytes = self.render_to_bytes(spec, format)?;
        sink.write_artifact(&bytes)?;
        info!(
            target_sink = %sink.describe(),
            format = %format,
            bytes = bytes.len(),
            series = spec.series.len(),
            points = spec.point_count(),
            "chart rendered"
        );
        Ok(())
    }

    /// Produces the artifact bytes for `format`.
    pub fn render_to_bytes(
        &self,
        spec: &ChartSpec,
        format: OutputFormat,
    ) -> Result<Vec<u8>, RenderError> {
        self.check_geometry(spec)?;
        match format {
            OutputFormat::Svg => {
                ensure_fonts()?;
                self.render_svg(spec)
            }
            OutputFormat::Png => {
                ensure_fonts()?;
                self.render_png(spec)
            }
            OutputFormat::Json => export::to_json(spec),
            OutputFormat::Csv => export::to_csv(spec),
        }
    }

    fn check_geometry(&self, spec: &ChartSpec) -> Result<(), RenderError> {
        let range = MIN_DIMENSION..=MAX_DIMENSION;
        if !range.contains(&self.width) || !range.contains(&self.height) {
            return Err(RenderError::InvalidGeometry(format!(
                "canvas {}x{} is outside {}..={} pixels per side",
                self.width, self.height, MIN_DIMENSION, MAX_DIMENSION
            )));
        }
        for series in &spec.series {
            if let Some(p) = series
                .points
                .iter()
                .find(|p| !p.x.is_finite() || !p.y.is_finite())
            {
                return Err(RenderError::InvalidGeometry(format!(
                    "series `{}` has a non-finite point ({}, {})",
                    series.name, p.x, p.y
                )));
            }
        }
        Ok(())
    }

    fn render_svg(&self, spec: &ChartSpec) -> Result<Vec<u8>, RenderError> {
        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, self.size()).into_drawing_area();
            draw_chart(spec, &root)?;
            root.present().map_err(backend_err)?;
        }
        Ok(svg.into_bytes())
    }

    /// The bitmap backend encodes PNG only when saving to a path, so the
    /// image goes through a scratch file.
    fn render_png(&self, spec: &ChartSpec) -> Result<Vec<u8>, RenderError> {
        let scratch = tempfile::Builder::new()
            .prefix("chart-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| RenderError::Encode {
                format: OutputFormat::Png.to_string(),
                message: e.to_string(),
            })?;
        {
            let root = BitMapBackend::new(scratch.path(), self.size()).into_drawing_area();
            draw_chart(spec, &root)?;
            root.present().map_err(backend_err)?;
        }
        std::fs::read(scratch.path()).map_err(|e| RenderError::Encode {
            format: OutputFormat::Png.to_string(),
            message: e.to_string(),
        })
    }
}

/// Renders with the default canvas size.
pub fn render(spec: &ChartSpec, sink: &mut dyn OutputSink) -> Result<(), RenderError> {
    ChartRenderer::default().render(spec, sink)
}

/// Axis ranges covering every point with 10% vertical padding.
fn axis_ranges(spec: &ChartSpec) -> (Range<f64>, Range<f64>) {
    let points = || spec.series.iter().flat_map(|s| s.points.iter());
    let categorical = matches!(spec.x_domain, XDomain::Category { .. });

    let x_range = match &spec.x_domain {
        XDomain::Category { labels } => -0.5..(labels.len().max(1) as f64 - 0.5),
        _ => match min_max(points().map(|p| p.x)) {
            None => 0.0..1.0,
            Some((lo, hi)) if lo == hi => (lo - 1.0)..(hi + 1.0),
            Some((lo, hi)) => lo..hi,
        },
    };

    let y_range = match min_max(points().map(|p| p.y)) {
        None => 0.0..1.0,
        Some((mut lo, mut hi)) => {
            if categorical {
                // bars grow from zero
                lo = lo.min(0.0);
                hi = hi.max(0.0);
            }
            let span = hi - lo;
            let padding = if span > 0.0 {
                span * 0.1
            } else {
                (hi.abs() * 0.1).max(1.0)
            };
            let y_min = if lo >= 0.0 {
                (lo - padding).max(0.0)
            } else {
                lo - padding
            };
            y_min..(hi + padding)
        }
    };

    (x_range, y_range)
}

fn min_max(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

fn draw_chart<DB: DrawingBackend>(
    spec: &ChartSpec,
    root: &DrawingArea<DB, Shift>,
) -> Result<(), RenderError> {
    root.fill(&WHITE).map_err(backend_err)?;

    let (x_range, y_range) = axis_ranges(spec);
    let mut chart = ChartBuilder::on(root)
        .caption(&spec.title, ("sans-serif", 28))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d(x_range, y_range.clone())
        .map_err(backend_err)?;

    let x_labels = match &spec.x_domain {
        XDomain::Category { labels } => labels.len().clamp(1, 20),
        _ => 10,
    };
    let x_formatter = |x: &f64| spec.format_x(*x);
    let y_formatter = |y: &f64| format_number((y * 100.0).round() / 100.0);

    chart
        .configure_mesh()
        .x_desc(spec.x_label.as_str())
        .y_desc(spec.y_label.as_str())
        .x_labels(x_labels)
        .y_labels(10)
        .x_label_formatter(&x_formatter)
        .y_label_formatter(&y_formatter)
        .draw()
        .map_err(backend_err)?;

    let series_count = spec.series.len().max(1) as f64;
    let bar_width = BAR_GROUP_WIDTH / series_count;
    let baseline = 0.0_f64.clamp(y_range.start, y_range.end);

    for (index, series) in spec.series.iter().enumerate() {
        let color = Palette99::pick(index).to_rgba();

        if let XDomain::Category { .. } = spec.x_domain {
            let offset = -BAR_GROUP_WIDTH / 2.0 + bar_width * index as f64;
            chart
                .draw_series(series.points.iter().map(|p| {
                    let left = p.x + offset;
                    Rectangle::new([(left, baseline), (left + bar_width, p.y)], color.filled())
                }))
                .map_err(backend_err)?
                .label(series.name.as_str())
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
        } else {
            chart
                .draw_series(LineSeries::new(
                    series.points.iter().map(|p| (p.x, p.y)),
                    color.stroke_width(2),
                ))
                .map_err(backend_err)?
                .label(series.name.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
            chart
                .draw_series(
                    series
                        .points
                        .iter()
                        .map(|p| Circle::new((p.x, p.y), 3, color.filled())),
                )
                .map_err(backend_err)?;
        }
    }

    if spec.series.len() > 1 {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(backend_err)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{FileSink, MemorySink};
    use common::models::chart::{Point, Series};

    fn year_value() -> ChartSpec {
        ChartSpec {
            title: "value by year".into(),
            x_label: "year".into(),
            y_label: "value".into(),
            x_domain: XDomain::Numeric,
            series: vec![Series {
                name: "value".into(),
                points: vec![
                    Point::new(2021.0, 100.0),
                    Point::new(2022.0, 150.0),
                    Point::new(2023.0, 90.0),
                ],
            }],
        }
    }

    #[test]
    fn test_same_spec_gives_identical_svg_in_two_sinks() {
        let spec = year_value();
        let renderer = ChartRenderer::new(640, 480);
        let mut first = MemorySink::new(OutputFormat::Svg);
        let mut second = MemorySink::new(OutputFormat::Svg);
        renderer.render(&spec, &mut first).unwrap();
        renderer.render(&spec, &mut second).unwrap();

        assert_eq!(first.bytes(), second.bytes());
        let svg = String::from_utf8(first.into_bytes()).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("value by year"));
    }

    #[test]
    fn test_empty_chart_renders() {
        let mut spec = year_value();
        spec.series[0].points.clear();
        let mut sink = MemorySink::new(OutputFormat::Svg);
        render(&spec, &mut sink).unwrap();
        assert!(String::from_utf8_lossy(sink.bytes()).contains("</svg>"));
    }

    fn product_performance() -> ChartSpec {
        ChartSpec {
            title: "Product performance".into(),
            x_label: "product".into(),
            y_label: "value".into(),
            x_domain: XDomain::Category {
                labels: vec!["Bread".into(), "Coffee".into()],
            },
            series: vec![
                Series {
                    name: "revenue".into(),
                    points: vec![Point::new(0.0, 12.0), Point::new(1.0, 30.0)],
                },
                Series {
                    name: "quantity_sold".into(),
                    points: vec![Point::new(0.0, 4.0), Point::new(1.0, 6.0)],
                },
            ],
        }
    }

    const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

    #[test]
    fn test_categories_render_as_bars() {
        let bytes = ChartRenderer::new(800, 600)
            .render_to_bytes(&product_performance(), OutputFormat::Svg)
            .unwrap();
        let svg = String::from_utf8(bytes).unwrap();
        assert!(svg.contains("<rect"));
        assert!(svg.contains("quantity_sold"));
    }

    #[test]
    fn test_png_has_png_signature() {
        let bytes = ChartRenderer::new(320, 240)
            .render_to_bytes(&year_value(), OutputFormat::Png)
            .unwrap();
        assert_eq!(&bytes[..8], PNG_SIGNATURE);
    }

    #[test]
    fn test_empty_chart_renders_as_png() {
        let mut spec = year_value();
        spec.series[0].points.clear();
        let mut sink = MemorySink::new(OutputFormat::Png);
        render(&spec, &mut sink).unwrap();
        assert!(sink.bytes().starts_with(PNG_SIGNATURE));
    }

    #[test]
    fn test_category_chart_renders_as_png() {
        let bytes = ChartRenderer::new(640, 480)
            .render_to_bytes(&product_performance(), OutputFormat::Png)
            .unwrap();
        assert!(bytes.starts_with(PNG_SIGNATURE));
    }

    #[test]
    fn test_png_file_sink_writes_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daily.png");
        let mut sink = FileSink::new(&path);
        ChartRenderer::new(400, 300)
            .render(&year_value(), &mut sink)
            .unwrap();
        assert!(std::fs::read(&path).unwrap().starts_with(PNG_SIGNATURE));
    }

    #[test]
    fn test_export_formats_bypass_drawing() {
        let bytes = ChartRenderer::default()
            .render_to_bytes(&year_value(), OutputFormat::Csv)
            .unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "year,value\n2021,100\n2022,150\n2023,90\n"
        );
    }

    #[test]
    fn test_tiny_canvas_is_rejected() {
        let err = ChartRenderer::new(0, 480)
            .render_to_bytes(&year_value(), OutputFormat::Svg)
            .unwrap_err();
        assert!(matches!(err, RenderError::InvalidGeometry(_)));
    }

    #[test]
    fn test_non_finite_point_is_rejected() {
        let mut spec = year_value();
        spec.series[0].points.push(Point::new(2024.0, f64::NAN));
        let mut sink = MemorySink::new(OutputFormat::Svg);
        let err = render(&spec, &mut sink).unwrap_err();
        assert!(matches!(err, RenderError::InvalidGeometry(_)));
        assert!(sink.bytes().is_empty());
    }

    #[test]
    fn test_unwritable_sink_fails_without_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let target = blocker.join("chart.svg");

        let mut sink = FileSink::new(&target);
        let err = render(&year_value(), &mut sink).unwrap_err();
        assert!(matches!(err, RenderError::Sink { .. }));
        assert!(!target.exists());
    }

    #[test]
    fn test_axis_ranges_pad_and_clamp() {
        let (x, y) = axis_ranges(&year_value());
        assert_eq!(x, 2021.0..2023.0);
        assert!((y.start - 84.0).abs() < 1e-9);
        assert!((y.end - 156.0).abs() < 1e-9);

        let mut empty = year_value();
        empty.series[0].points.clear();
        assert_eq!(axis_ranges(&empty), (0.0..1.0, 0.0..1.0));
    }
}

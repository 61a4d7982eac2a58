//! 报表命令行工具
//!
//! 查询 MySQL 并将结果渲染为 SVG / PNG 图表，或导出为 JSON / CSV

use std::path::PathBuf;

use anyhow::{bail, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use common::config::{load_dotenv, AppConfig};
use common::logging::init_tracing;
use common::models::{ColumnMapping, QueryDescriptor, QueryParam};
use common::utils::SqlValidator;
use reporter::{check_connection, ChartRenderer, FileSink, OutputSink, Preset, Reporter};

const SERVICE_NAME: &str = "reporter";

/// Render MySQL query results as charts
#[derive(Parser)]
#[command(name = "reporter", version, about, long_about = None)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Output file; the extension selects the format (svg, png, json, csv)
    #[arg(short, long, global = true, default_value = "report.svg", env = "REPORT_OUTPUT")]
    output: PathBuf,

    /// Canvas width in pixels (defaults to CHART_WIDTH)
    #[arg(long, global = true)]
    width: Option<u32>,

    /// Canvas height in pixels (defaults to CHART_HEIGHT)
    #[arg(long, global = true)]
    height: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chart an arbitrary read query
    Query(QueryArgs),

    /// Total and average sale per day
    DailySales(RangeArgs),

    /// Revenue and quantity sold per product
    ProductPerformance(RangeArgs),

    /// Check that the database is reachable
    Ping,
}

#[derive(Args)]
struct QueryArgs {
    /// SQL text with `?` placeholders
    #[arg(long)]
    sql: String,

    /// Placeholder value, in order (repeatable)
    #[arg(short, long = "param")]
    params: Vec<String>,

    /// Column for the x axis
    #[arg(short, long)]
    x: String,

    /// Column plotted as a series (repeatable)
    #[arg(short, long, required = true)]
    y: Vec<String>,

    /// Chart title
    #[arg(long)]
    title: Option<String>,

    /// Stop after this many rows
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(Args)]
struct RangeArgs {
    /// First day (YYYY-MM-DD)
    #[arg(long)]
    from: NaiveDate,

    /// Last day, inclusive (YYYY-MM-DD)
    #[arg(long)]
    to: NaiveDate,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 先加载 .env，命令行参数的 env 回退才能读到
    load_dotenv();
    let cli = Cli::parse();

    let config = AppConfig::load_with_service(SERVICE_NAME);
    init_tracing(config.log_format);

    let renderer = ChartRenderer::new(
        cli.width.unwrap_or(config.chart_width),
        cli.height.unwrap_or(config.chart_height),
    );
    let mut sink = FileSink::new(&cli.output);

    let (reporter, query, mapping) = match cli.command {
        Command::Ping => {
            let rtt = check_connection(&config.database).await?;
            println!(
                "connected to {} ({} ms)",
                config.database.target(),
                rtt.as_millis()
            );
            return Ok(());
        }
        Command::Query(args) => {
            SqlValidator::validate(&args.sql)?;
            let params = args
                .params
                .iter()
                .map(|p| QueryParam::parse_literal(p))
                .collect();
            let query = QueryDescriptor::new(args.sql, params)?;
            let mut mapping = ColumnMapping::new(args.x, args.y);
            if let Some(title) = args.title {
                mapping = mapping.with_title(title);
            }
            (
                Reporter::new(renderer).with_row_limit(args.limit),
                query,
                mapping,
            )
        }
        Command::DailySales(range) => {
            let (query, mapping) = preset(Preset::DailySales, &range)?;
            (Reporter::new(renderer), query, mapping)
        }
        Command::ProductPerformance(range) => {
            let (query, mapping) = preset(Preset::ProductPerformance, &range)?;
            (Reporter::new(renderer), query, mapping)
        }
    };

    let outcome = reporter
        .run(&config.database, &query, &mapping, &mut sink)
        .await?;
    println!(
        "wrote {} ({} rows, {} series, {} ms)",
        sink.describe(),
        outcome.row_count,
        outcome.chart.series.len(),
        outcome.elapsed.as_millis()
    );
    if outcome.truncated {
        eprintln!("结果已截断：仅读取前 {} 行", outcome.row_count);
    }
    Ok(())
}

fn preset(preset: Preset, range: &RangeArgs) -> Result<(QueryDescriptor, ColumnMapping)> {
    if range.from > range.to {
        bail!("--from {} is after --to {}", range.from, range.to);
    }
    Ok(preset.build(range.from, range.to)?)
}

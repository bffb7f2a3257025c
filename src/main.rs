use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use std::io::{self, Write};
use std::path::PathBuf;
use tabdash::aggregate::AggOp;
use tabdash::config::DashboardConfig;
use tabdash::csv_reader::{read_stdin_source, Source};
use tabdash::error::LoadError;
use tabdash::filter::FilterSelection;
use tabdash::pipeline::{Dashboard, ViewRequest};
use tabdash::{graph, parser, OutputFormat};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Dashboard view (preview, columns, chart spec, notices) as JSON
    Json,
    Png,
    Svg,
}

#[derive(Parser, Debug)]
#[command(name = "tabdash")]
#[command(about = "Filter, aggregate and chart Korean public-data CSV files", long_about = None)]
struct Args {
    /// CSV file to read (config `default_input`, then stdin, when omitted)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Categorical filter, e.g. '자치구명=강남구,서초구' (repeatable)
    #[arg(short, long = "filter")]
    filters: Vec<String>,

    /// Chart request, e.g. 'bar(x: 자치구명, y: 월매출액, color: 업종명)'
    #[arg(short, long)]
    chart: Option<String>,

    /// Aggregation applied before charting (sum, mean, count)
    #[arg(long, requires = "chart")]
    agg: Option<String>,

    /// Keep only the N largest groups
    #[arg(long, requires = "chart")]
    top: Option<usize>,

    /// Number of preview rows
    #[arg(long)]
    preview: Option<usize>,

    /// Print the column names and exit
    #[arg(long)]
    columns: bool,

    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Output file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run(Args::parse()) {
        match e.downcast_ref::<LoadError>() {
            Some(load) => {
                eprintln!("Error: {}", load);
                let attempted = load.attempted_encodings();
                if !attempted.is_empty() {
                    eprintln!("Attempted encodings: {}", attempted.join(", "));
                }
            }
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => DashboardConfig::from_file(path)?,
        None => DashboardConfig::default(),
    };
    if let Some(rows) = args.preview {
        config.preview_rows = rows;
    }

    let mut filters = FilterSelection::new();
    for raw in &args.filters {
        let arg = parser::filter_arg(raw)?;
        filters.select(&arg.column, arg.values);
    }

    let chart = match &args.chart {
        Some(raw) => {
            let mut request = parser::chart_request(raw)?;
            if let Some(op) = &args.agg {
                request.agg = Some(op.parse::<AggOp>().map_err(anyhow::Error::msg)?);
            }
            if args.top.is_some() {
                request.top = args.top;
            }
            Some(request)
        }
        None => None,
    };

    let source = match (&args.input, &config.default_input) {
        (Some(path), _) => Source::Path(path.clone()),
        (None, Some(path)) if !path.exists() => bail!(
            "Default input '{}' not found; pass --input or pipe a CSV on stdin",
            path.display()
        ),
        (None, Some(path)) => Source::Path(path.clone()),
        (None, None) => read_stdin_source()?,
    };

    let render = config.render.clone();
    let mut dashboard = Dashboard::new(config).context("Invalid configuration")?;
    let view = dashboard.run(&source, &ViewRequest { filters, chart })?;

    let bytes = if args.columns {
        let mut text = view.columns.join("\n");
        text.push('\n');
        text.into_bytes()
    } else {
        match args.format {
            Format::Json => {
                let mut json = serde_json::to_vec_pretty(&view).context("Failed to serialise view")?;
                json.push(b'\n');
                json
            }
            Format::Png | Format::Svg => {
                let Some(spec) = &view.chart else {
                    bail!("No chart to render (pass --chart, or see warnings above)");
                };
                let mut options = render;
                options.format = if args.format == Format::Png {
                    OutputFormat::Png
                } else {
                    OutputFormat::Svg
                };
                graph::render_chart(spec, &options).context("Failed to render chart")?
            }
        }
    };

    match &args.output {
        Some(path) => std::fs::write(path, &bytes)
            .with_context(|| format!("Failed to write '{}'", path.display()))?,
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(&bytes).context("Failed to write to stdout")?;
            handle.flush().context("Failed to flush stdout")?;
        }
    }

    Ok(())
}

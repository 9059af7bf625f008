//! fermoview: interactive explorer for precomputed metabolomics feature results
//!
//! Loads the chromatogram, network and grouping payloads of one job and exposes the
//! feature dashboard (filtering, chromatogram traces, molecular network and detail
//! tables) as a local web server, plus headless `count` and `render` commands.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};

mod chromatogram;
mod config;
mod dashboard;
mod error;
mod files;
mod filter;
mod network;
mod panel;
mod payload;
mod sample;
mod surface;
#[cfg(feature = "serve")]
mod serve;
#[cfg(test)]
mod fixtures;

use crate::chromatogram::{HighlightBox, Plot};
use crate::config::Config;
use crate::dashboard::Dashboard;
use crate::error::DashboardError;
use crate::payload::{Dataset, FeatureId, NetworkKind};
use crate::surface::RecordedView;

/// Explore metabolomics features: chromatograms, molecular networks and filters
#[derive(Parser, Debug)]
#[command(name = "fermoview")]
#[command(version)]
#[command(about = "Explore precomputed metabolomics features in a local dashboard")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the dashboard web server
    #[cfg(feature = "serve")]
    Serve(ServeArgs),

    /// Print retained/total feature counts per sample under a filter preset
    Count(CountArgs),

    /// Render the overview chromatogram of one sample to SVG and/or JSON
    Render(RenderArgs),
}

/// Options shared by every subcommand
#[derive(Parser, Debug)]
struct CommonArgs {
    /// YAML configuration file naming the job payloads
    #[arg(short, long)]
    config: PathBuf,

    /// Filter preset (YAML); overrides the `filters` section of the config
    #[arg(short, long)]
    filters: Option<PathBuf>,

    /// Number of threads for per-sample recounts
    #[arg(short, long, default_value_t = num_cpus::get())]
    threads: usize,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[cfg(feature = "serve")]
#[derive(Parser, Debug)]
struct ServeArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Port for the web server (default: from config, else 8765)
    #[arg(long)]
    port: Option<u16>,

    /// Do not open a browser window
    #[arg(long)]
    no_browser: bool,
}

#[derive(Parser, Debug)]
struct CountArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Network used by the network-exclusion filter
    #[arg(short, long, default_value = "modified_cosine")]
    network: NetworkKind,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Sample to render
    #[arg(short, long)]
    sample: String,

    /// Feature to outline with the highlight box
    #[arg(long)]
    feature: Option<String>,

    /// Network used by the network-exclusion filter
    #[arg(short, long, default_value = "modified_cosine")]
    network: NetworkKind,

    /// Output SVG file
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Output JSON file with the plot description
    #[arg(long)]
    json: Option<PathBuf>,

    /// SVG width in pixels
    #[arg(long, default_value_t = 1000)]
    width: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        #[cfg(feature = "serve")]
        Commands::Serve(args) => run_serve(args),
        Commands::Count(args) => run_count(args),
        Commands::Render(args) => run_render(args),
    }
}

/// Initialize logging and the thread pool
fn init(common: &CommonArgs) -> Result<()> {
    let log_level = if common.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    rayon::ThreadPoolBuilder::new()
        .num_threads(common.threads)
        .build_global()?;

    info!("fermoview v{}", env!("CARGO_PKG_VERSION"));
    Ok(())
}

/// Load configuration and payloads, and build a headless dashboard
fn load_dashboard(common: &CommonArgs) -> Result<(Config, Dashboard<RecordedView>)> {
    info!("Loading configuration: {}", common.config.display());
    let config = Config::from_yaml(&common.config)?;

    let dataset = Dataset::from_files(
        &config.payloads.chromatogram,
        &config.payloads.network,
        config.payloads.groups.as_deref(),
        config.payloads.feature_groups.as_deref(),
    )?;

    let inputs = match &common.filters {
        Some(path) => {
            info!("Using filter preset: {}", path.display());
            config::load_filters(path)?
        }
        None => config.filters.clone(),
    };

    let dashboard = Dashboard::new(dataset, RecordedView::default(), inputs)?;
    Ok((config, dashboard))
}

#[cfg(feature = "serve")]
fn run_serve(args: ServeArgs) -> Result<()> {
    init(&args.common)?;
    let (config, dashboard) = load_dashboard(&args.common)?;

    let port = args.port.unwrap_or(config.server.port);
    let open_browser = config.server.open_browser && !args.no_browser;
    let state = serve::ServerState {
        dashboard,
        results_dir: config.results_dir.clone(),
        job_id: config.job_id.clone(),
    };
    serve::start_server(state, port, open_browser)
}

fn run_count(args: CountArgs) -> Result<()> {
    init(&args.common)?;
    let (_, mut dashboard) = load_dashboard(&args.common)?;
    dashboard.set_network_kind(args.network)?;

    println!("sample\tretained\ttotal");
    for row in dashboard.sample_counts() {
        println!("{}\t{}\t{}", row.sample, row.retained, row.total);
    }
    Ok(())
}

/// JSON written by `render --json`
#[derive(Serialize)]
struct RenderOutput<'a> {
    generated: String,
    command_line: String,
    sample: &'a str,
    network: NetworkKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    feature: Option<&'a str>,
    plot: &'a Plot,
    #[serde(skip_serializing_if = "Option::is_none")]
    highlight: Option<&'a HighlightBox>,
}

fn run_render(args: RenderArgs) -> Result<()> {
    init(&args.common)?;
    if args.svg.is_none() && args.json.is_none() {
        anyhow::bail!("Nothing to write: pass --svg and/or --json");
    }

    let (_, mut dashboard) = load_dashboard(&args.common)?;
    dashboard.select_sample(&args.sample)?;
    dashboard.set_network_kind(args.network)?;

    if let Some(feature) = &args.feature {
        match dashboard.click_feature(&FeatureId::new(feature.as_str())) {
            Ok(()) => {}
            // the highlight box is still drawn
            Err(e @ DashboardError::NotInNetwork { .. }) => warn!("{}", e),
            Err(e) => return Err(e.into()),
        }
    }

    let plot = dashboard
        .overview_plot()
        .context("No sample selected")?;

    if let Some(path) = &args.svg {
        let svg = dashboard.chromatogram_svg(args.width)?;
        write_output(path, svg.as_bytes())?;
    }

    if let Some(path) = &args.json {
        let output = RenderOutput {
            generated: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            command_line: std::env::args().collect::<Vec<_>>().join(" "),
            sample: &args.sample,
            network: args.network,
            feature: args.feature.as_deref(),
            plot: &plot,
            highlight: dashboard.highlight(),
        };
        let json = serde_json::to_vec_pretty(&output)?;
        write_output(path, &json)?;
    }

    if let Some(count) = dashboard.active_count() {
        info!("{}: {} of {} features in range", count.sample, count.retained, count.total);
    }
    Ok(())
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Wrote {}", path.display());
    Ok(())
}

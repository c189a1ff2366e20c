use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use log::info;
use traffic_profiler::{
    capture::PcapFileSource,
    charts::ChartRenderer,
    formatting::format_flow_summary,
    settings::{Config, FlowSource},
    traffic::Comparison,
    BatchOutcome, BatchRunner,
};

#[derive(Parser)]
#[command(name = "traffic-profiler")]
#[command(about = "Classify captured traffic flows and compare their statistics")]
struct Cli {
    #[arg(short, long, help = "Configuration file path (TOML)")]
    config: Option<PathBuf>,

    #[arg(
        short,
        long = "flow",
        value_name = "SOURCE=LABEL",
        value_parser = FlowSource::parse,
        help = "Capture to analyze; repeat to replace the configured flow list"
    )]
    flows: Vec<FlowSource>,

    #[arg(short, long, help = "Directory for comparison charts")]
    output_dir: Option<PathBuf>,

    #[arg(long, value_name = "PATH", help = "Write all flow results as JSON")]
    json: Option<PathBuf>,

    #[arg(long, value_name = "PATH", help = "Write the effective configuration and exit")]
    dump_config: Option<PathBuf>,

    #[arg(short, long, help = "Enable debug logging")]
    debug: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let mut config = match &cli.config {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::with_default_flows(),
    };

    if !cli.flows.is_empty() {
        config.flows = cli.flows.clone();
    } else if config.flows.is_empty() {
        config.flows = Config::default_flows();
    }
    if let Some(dir) = &cli.output_dir {
        config.report.output_dir = dir.clone();
    }
    config.validate().context("invalid configuration")?;

    if let Some(path) = &cli.dump_config {
        config
            .save_to_file(path)
            .with_context(|| format!("writing configuration to {}", path.display()))?;
        println!("Configuration written to {}", path.display());
        return Ok(());
    }

    let mut runner = BatchRunner::new(PcapFileSource::new(), config.rules.clone());
    let outcome = runner.run_with(&config.flows, |result| {
        println!("{}", format_flow_summary(result));
    });

    for failure in &outcome.failures {
        if failure.dropped_packets > 0 {
            eprintln!(
                "error: {} ({}): {} [{} dropped packets]",
                failure.flow_label, failure.source, failure.reason, failure.dropped_packets
            );
        } else {
            eprintln!("error: {} ({}): {}", failure.flow_label, failure.source, failure.reason);
        }
    }

    if let Some(path) = &cli.json {
        write_json(&outcome, path)?;
    }

    match outcome.report.comparison() {
        Comparison::Ready(series) => {
            let renderer = ChartRenderer::new(config.report.clone());
            let written = renderer
                .render_all(&series)
                .context("rendering comparison charts")?;
            for (s, path) in series.iter().zip(&written) {
                println!("created {} comparison graph: {}", s.metric.title(), path.display());
            }
        }
        other => {
            if let Comparison::Suppressed { collected } = other {
                info!("comparison needs at least two flows, have {}", collected);
            }
            if let Some(message) = other.message() {
                println!("{}", message);
            }
        }
    }

    Ok(())
}

fn write_json(outcome: &BatchOutcome, path: &Path) -> anyhow::Result<()> {
    let content = serde_json::to_string_pretty(outcome).context("serializing results")?;
    fs::write(path, content).with_context(|| format!("writing results to {}", path.display()))?;
    info!("results written to {}", path.display());
    Ok(())
}

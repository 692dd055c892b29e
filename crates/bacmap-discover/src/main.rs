//! CLI entry point for bacmap snapshot tooling.
//!
//! Live scans need a BACnet datalink implementing the transport traits
//! and run through the library API; the binary covers everything that
//! works on recorded snapshots: diffing, inspection, and window
//! planning against a prior scan.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

use bacmap_core::DeviceInstance;
use bacmap_discover::config::ScannerConfig;
use bacmap_discover::windows::WindowPlanner;
use bacmap_graph::{diff_snapshots, Snapshot, TopologyGraph};

#[derive(Parser)]
#[command(name = "bacmap")]
#[command(about = "BACnet internetwork topology snapshot tooling")]
struct Cli {
    /// Config file prefix (default: bacmap).
    #[arg(short, long, default_value = "bacmap")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Structurally compare two scan snapshots.
    Diff {
        /// Older snapshot (side A).
        a: PathBuf,
        /// Newer snapshot (side B).
        b: PathBuf,
        /// Write the merged graph with provenance relations here.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Summarize one snapshot: node counts, triples, content hash.
    Show { snapshot: PathBuf },
    /// Print the Who-Is window plan a scan would use.
    Plan {
        /// Prior snapshot supplying density hints.
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Diff { a, b, output } => cmd_diff(&a, &b, output.as_deref()),
        Command::Show { snapshot } => cmd_show(&snapshot),
        Command::Plan { snapshot } => cmd_plan(&cli.config, snapshot.as_deref()),
    }
}

fn cmd_diff(a: &std::path::Path, b: &std::path::Path, output: Option<&std::path::Path>) -> anyhow::Result<()> {
    let snap_a = Snapshot::load(a)?;
    let snap_b = Snapshot::load(b)?;
    let diff = diff_snapshots(&snap_a, &snap_b)?;

    println!("in both    {:>6}", diff.summary.in_both);
    println!("only in A  {:>6}", diff.summary.only_in_a);
    println!("only in B  {:>6}", diff.summary.only_in_b);

    if let Some(path) = output {
        Snapshot::capture(&diff.merged, Uuid::new_v4()).save(path)?;
        println!("merged graph written to {}", path.display());
    }
    Ok(())
}

fn cmd_show(path: &std::path::Path) -> anyhow::Result<()> {
    let snapshot = Snapshot::load(path)?;
    let graph = snapshot.restore()?;

    println!("scan id      {}", snapshot.scan_id);
    println!("recorded at  {}", snapshot.recorded_at.to_rfc3339());
    println!("triples      {}", snapshot.triples.len());
    println!("content hash {}", snapshot.content_hash()?);
    for (kind, count) in graph.kind_counts() {
        println!("{:<12} {count:>6}", kind.as_str());
    }
    Ok(())
}

fn cmd_plan(config_prefix: &str, snapshot: Option<&std::path::Path>) -> anyhow::Result<()> {
    let config = load_scanner_config(config_prefix)?;
    config.validate()?;

    let prior = match snapshot {
        Some(path) => Snapshot::load(path)?.restore()?,
        None => TopologyGraph::new(),
    };

    let planner = WindowPlanner::new(
        &prior,
        DeviceInstance::new(config.low_limit)?,
        DeviceInstance::new(config.high_limit)?,
        config.empty_step_size,
        config.full_step_size,
    );

    let mut total = 0usize;
    let mut narrowed = 0usize;
    for window in planner.windows() {
        total += 1;
        let clamped = window.high.get() == config.high_limit;
        if !clamped && window.width() <= config.empty_step_size {
            narrowed += 1;
            println!(
                "narrowed window [{}, {}] (width {})",
                window.low,
                window.high,
                window.width()
            );
        }
    }
    println!(
        "{total} windows over [{}, {}], {narrowed} narrowed by prior density",
        config.low_limit, config.high_limit
    );
    Ok(())
}

fn load_scanner_config(file_prefix: &str) -> anyhow::Result<ScannerConfig> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("BACMAP")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    match cfg.get::<ScannerConfig>("scanner") {
        Ok(c) => Ok(c),
        Err(_) => Ok(ScannerConfig::default()),
    }
}

//! CLI for comparing and merging tread point sets.
//!
//! Input files are JSON arrays of `{"x": .., "y": .., "confidence": ..}`.
//!
//! # Usage
//!
//! ```bash
//! pada-match compare left.json right.json
//! pada-match merge left.json right.json --output fused.json
//! pada-match --config configs/pada.yaml merge a.json b.json
//! ```

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use pada_match::{
    CoarseMatcher, Graph, GraphBuilder, PadaConfig, Result, TopologyPipeline, TreadPoint,
};

#[derive(Parser, Debug)]
#[command(name = "pada-match", version, about = "Compare and fuse outsole tread point sets")]
struct Cli {
    /// YAML configuration (defaults to configs/pada.yaml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Coarse same/similar/different decision for two point sets
    Compare {
        /// First point set
        a: PathBuf,
        /// Second point set
        b: PathBuf,
    },
    /// Merge the second point set into the first
    Merge {
        /// Reference point set
        a: PathBuf,
        /// Point set merged into the reference
        b: PathBuf,
        /// Write the merged graph snapshot (JSON) here
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Write the visualization snapshot (JSON) here
        #[arg(long)]
        visualization: Option<PathBuf>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => PadaConfig::load(path)?,
        None => PadaConfig::load_default()?,
    };
    let builder = GraphBuilder::new(config.graph.clone());

    match cli.command {
        Command::Compare { a, b } => {
            let ga = load_graph(&builder, &a)?;
            let gb = load_graph(&builder, &b)?;
            let matcher = CoarseMatcher::new(config.matcher.clone(), config.signature.clone());
            let outcome = matcher.compare(&ga, &gb);

            println!("Decision:   {}", outcome.decision.name());
            println!("Similarity: {:.3}", outcome.similarity);
            println!("Confidence: {:.3}", outcome.confidence);
            println!("Reason:     {}", outcome.reason);
        }
        Command::Merge {
            a,
            b,
            output,
            visualization,
        } => {
            let ga = load_graph(&builder, &a)?;
            let gb = load_graph(&builder, &b)?;
            let pipeline = TopologyPipeline::from_config(&config);
            let result = pipeline.full_topology_merge(&ga, &gb, None)?;

            println!("Method:  {}", result.merge.method());
            println!("Nodes:   {}", result.final_graph.node_count());
            println!(
                "Quality: {} ({:.3})",
                result.quality.tier.name(),
                result.quality.combined_score
            );
            if let Some(report) = result.validation.value() {
                println!("Validation: {}", report.summary);
            }
            for rec in &result.quality.recommendations {
                println!("  - {}", rec);
            }

            if let Some(path) = output {
                std::fs::write(&path, result.final_graph.snapshot().to_json()?)?;
                log::info!("Wrote merged graph to {}", path.display());
            }
            if let Some(path) = visualization {
                std::fs::write(&path, result.visualization().to_json()?)?;
                log::info!("Wrote visualization to {}", path.display());
            }
        }
    }
    Ok(())
}

fn load_graph(builder: &GraphBuilder, path: &Path) -> Result<Graph> {
    let contents = std::fs::read_to_string(path)?;
    let points: Vec<TreadPoint> = serde_json::from_str(&contents)?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    log::info!("Loaded {} points from {}", points.len(), path.display());
    Ok(builder.build_named(&points, &name))
}

//! CLI interface for the k-NN classifier

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use knn_classifier::distance::CosineBreakdown;
use knn_classifier::extract::{FeatureExtractor, VectorFileExtractor};
use knn_classifier::{BackendKind, ClassificationEngine, EngineConfig, FeatureVector, VotingMode};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "knn-classifier")]
#[command(about = "Labeled vector store with k-NN classification", long_about = None)]
struct Cli {
    /// JSON engine configuration. Flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Data directory for persistence. In-memory when unset.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Storage backend
    #[arg(long, value_enum)]
    backend: Option<BackendArg>,

    /// Log per-record distances and vote tallies
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy)]
enum BackendArg {
    Exact,
    Indexed,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Exact => BackendKind::Exact,
            BackendArg::Indexed => BackendKind::Indexed,
        }
    }
}

#[derive(ValueEnum, Clone, Copy)]
enum ModeArg {
    Hybrid,
    Plurality,
}

impl From<ModeArg> for VotingMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Hybrid => VotingMode::Hybrid,
            ModeArg::Plurality => VotingMode::Plurality,
        }
    }
}

/// A feature vector given inline or as a file of floats.
#[derive(Args)]
struct VectorInput {
    /// File holding comma or whitespace separated floats
    #[arg(long, conflicts_with = "vector", required_unless_present = "vector")]
    file: Option<PathBuf>,
    /// Vector as comma-separated values (e.g., "1.0,2.0,3.0")
    #[arg(long)]
    vector: Option<String>,
}

impl VectorInput {
    fn load(&self) -> Result<FeatureVector> {
        match (&self.file, &self.vector) {
            (Some(path), _) => VectorFileExtractor::new()
                .extract(path)
                .with_context(|| format!("reading features from {}", path.display())),
            (None, Some(text)) => Ok(text.parse()?),
            (None, None) => anyhow::bail!("either --file or --vector is required"),
        }
    }

    /// Display name: the file name when read from disk.
    fn name(&self) -> Option<String> {
        self.file
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Store a labeled feature vector
    Add {
        #[command(flatten)]
        input: VectorInput,
        /// Category label, e.g. a genre
        #[arg(short, long)]
        label: String,
        /// Display name; defaults to the file name
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Classify a feature vector against the stored records
    Classify {
        #[command(flatten)]
        input: VectorInput,
        /// Number of neighbors; defaults to the configured k
        #[arg(short, long)]
        k: Option<usize>,
        /// Voting mode; defaults to the configured mode
        #[arg(short, long, value_enum)]
        mode: Option<ModeArg>,
    },
    /// Cosine similarity between two feature files
    Compare {
        first: PathBuf,
        second: PathBuf,
        /// Print the dot product and norms as well
        #[arg(short, long)]
        details: bool,
    },
    /// Print the number of stored records
    Count,
    /// Start the HTTP API server
    Serve {
        /// Address to bind to
        #[arg(long, default_value = "0.0.0.0:3000")]
        addr: String,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = Some(dir.clone());
    }
    if let Some(backend) = cli.backend {
        config.backend = backend.into();
    }
    Ok(config)
}

fn run(engine: &ClassificationEngine, command: Commands) -> Result<()> {
    match command {
        Commands::Add { input, label, name } => {
            let vector = input.load()?;
            let name = name.or_else(|| input.name()).unwrap_or_else(|| label.clone());
            let id = engine.add_named(&name, &label, vector)?;
            println!("Stored '{}' as {} ({} records)", name, id, engine.total_records());
        }
        Commands::Classify { input, k, mode } => {
            let vector = input.load()?;
            let k = k.unwrap_or(engine.config().k);
            let mode = mode.map(VotingMode::from).unwrap_or(engine.config().voting);
            let result = engine.classify(&vector, k, mode)?;

            println!(
                "Predicted: {} ({:.2}% confidence)",
                result.winning_label, result.confidence_percent
            );
            println!("Scores:");
            for (label, score) in &result.per_label_scores {
                println!("  {:<16} {:.4}", label, score);
            }
            println!("Neighbors:");
            for (i, n) in result.neighbors_considered.iter().enumerate() {
                println!(
                    "{}. {} [{}] (distance: {:.4})",
                    i + 1,
                    n.display_name(),
                    n.label,
                    n.distance
                );
            }
        }
        Commands::Count => {
            println!("{} records", engine.total_records());
        }
        Commands::Compare { .. } | Commands::Serve { .. } => {
            unreachable!("handled before the engine is built");
        }
    }
    Ok(())
}

fn compare(first: &Path, second: &Path, details: bool) -> Result<()> {
    let extractor = VectorFileExtractor::new();
    let a = extractor.extract(first)?;
    let b = extractor.extract(second)?;
    let breakdown = CosineBreakdown::compute(&a, &b)?;

    if details {
        println!("dot product:  {:.6}", breakdown.dot);
        println!("norm (first): {:.6}", breakdown.norm_a);
        println!("norm (second): {:.6}", breakdown.norm_b);
    }
    println!(
        "cosine similarity: {:.6} ({:.2}%)",
        breakdown.similarity,
        breakdown.similarity * 100.0
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Compare needs no store
    if let Commands::Compare {
        ref first,
        ref second,
        details,
    } = cli.command
    {
        return compare(first, second, details);
    }

    let config = load_config(&cli)?;
    let engine = ClassificationEngine::from_config(config)?;

    if let Commands::Serve { ref addr } = cli.command {
        return knn_classifier::server::start(addr, engine).await;
    }

    run(&engine, cli.command)
}

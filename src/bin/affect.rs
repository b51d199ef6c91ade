//! Affect CLI - Command-line interface for the affect engine
//!
//! Commands:
//! - aggregate: Build the daily behavioral feature table from raw logs
//! - train: Train a sequence model on a feature table and persist the artifact
//! - analyze: Run the serving pipeline on questionnaire answers or features

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use affect_engine::config::DEFAULT_WINDOW_DAYS;
use affect_engine::features::aggregate::{FeatureAggregator, RawLogs};
use affect_engine::features::dataset::WindowBuilder;
use affect_engine::features::logs::BehavioralFeatureRow;
use affect_engine::model::Architecture;
use affect_engine::pipeline::ArtifactPaths;
use affect_engine::{
    AffectProcessor, EngineConfig, EngineError, Trainer, TrainingConfig, ENGINE_VERSION,
};

/// Affect - affective pattern classification and risk scoring
#[derive(Parser)]
#[command(name = "affect")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Classify affective patterns and score behavioral risk", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the daily behavioral feature table from raw logs
    Aggregate {
        /// Raw logs JSON file (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for NDJSON feature rows (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Train a sequence model on a feature table and persist the artifact
    Train {
        /// Feature table as NDJSON (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Artifact output path
        #[arg(short, long)]
        output: PathBuf,

        /// Model architecture
        #[arg(long, default_value = "lstm")]
        arch: ArchChoice,

        /// Window length in days
        #[arg(long, default_value_t = DEFAULT_WINDOW_DAYS)]
        seq_len: usize,

        /// Training epochs
        #[arg(long, default_value = "10")]
        epochs: usize,

        /// Hidden state width
        #[arg(long, default_value = "32")]
        hidden_dim: usize,

        /// RNG seed for the split, shuffle and initialization
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Analyze questionnaire answers through the serving pipeline
    Analyze {
        /// Comma-separated ordinal answers, each 0-3
        #[arg(long, value_delimiter = ',')]
        answers: Vec<u8>,

        /// Trained emotion-path classifier artifact
        #[arg(long)]
        model: Option<PathBuf>,

        /// Pin the stochastic stages to a seed
        #[arg(long)]
        seed: Option<u64>,

        /// Pretty-print the insight JSON
        #[arg(long)]
        pretty: bool,
    },

    /// Analyze a behavioral feature table through the serving pipeline
    Behavior {
        /// Feature rows for one user as NDJSON (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Trained risk predictor artifact
        #[arg(long)]
        model: Option<PathBuf>,

        /// Pretty-print the insight JSON
        #[arg(long)]
        pretty: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum ArchChoice {
    /// Stacked recurrent model
    Lstm,
    /// Single-head attention encoder
    Transformer,
}

impl From<ArchChoice> for Architecture {
    fn from(choice: ArchChoice) -> Self {
        match choice {
            ArchChoice::Lstm => Architecture::Lstm,
            ArchChoice::Transformer => Architecture::Transformer,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), AffectCliError> {
    match cli.command {
        Commands::Aggregate { input, output } => cmd_aggregate(&input, &output),

        Commands::Train {
            input,
            output,
            arch,
            seq_len,
            epochs,
            hidden_dim,
            seed,
        } => cmd_train(&input, &output, arch, seq_len, epochs, hidden_dim, seed),

        Commands::Analyze {
            answers,
            model,
            seed,
            pretty,
        } => cmd_analyze(&answers, model, seed, pretty),

        Commands::Behavior {
            input,
            model,
            pretty,
        } => cmd_behavior(&input, model, pretty),
    }
}

fn cmd_aggregate(input: &PathBuf, output: &PathBuf) -> Result<(), AffectCliError> {
    let input_data = read_input(input)?;
    let logs: RawLogs = serde_json::from_str(&input_data)?;
    let rows = FeatureAggregator::aggregate(&logs);

    if rows.is_empty() {
        return Err(AffectCliError::NoRows);
    }

    let mut lines: Vec<String> = Vec::with_capacity(rows.len());
    for row in &rows {
        lines.push(serde_json::to_string(row)?);
    }
    write_output(output, &(lines.join("\n") + "\n"))?;
    Ok(())
}

fn cmd_train(
    input: &PathBuf,
    output: &PathBuf,
    arch: ArchChoice,
    seq_len: usize,
    epochs: usize,
    hidden_dim: usize,
    seed: u64,
) -> Result<(), AffectCliError> {
    let rows = read_feature_rows(input)?;
    let windows = WindowBuilder::new(seq_len).build(&rows)?;

    let config = TrainingConfig {
        architecture: arch.into(),
        hidden_dim,
        epochs,
        seed,
        ..TrainingConfig::default()
    };
    let report = Trainer::new(config).train_and_save(&windows, output)?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn cmd_analyze(
    answers: &[u8],
    model: Option<PathBuf>,
    seed: Option<u64>,
    pretty: bool,
) -> Result<(), AffectCliError> {
    let config = match seed {
        Some(seed) => EngineConfig::seeded(seed),
        None => EngineConfig::default(),
    };
    let artifacts = ArtifactPaths {
        emotion_classifier: model,
        ..ArtifactPaths::default()
    };
    let mut processor = AffectProcessor::new(config, &artifacts);
    let insight = processor.analyze_answers(answers)?;

    print_insight(&insight, pretty)
}

fn cmd_behavior(
    input: &PathBuf,
    model: Option<PathBuf>,
    pretty: bool,
) -> Result<(), AffectCliError> {
    let rows = read_feature_rows(input)?;
    let artifacts = ArtifactPaths {
        risk_predictor: model,
        ..ArtifactPaths::default()
    };
    let mut processor = AffectProcessor::new(EngineConfig::default(), &artifacts);
    let insight = processor.analyze_behavior(&rows)?;

    print_insight(&insight, pretty)
}

// Helper functions

fn read_input(input: &PathBuf) -> Result<String, AffectCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn read_feature_rows(input: &PathBuf) -> Result<Vec<BehavioralFeatureRow>, AffectCliError> {
    let input_data = read_input(input)?;
    let mut rows = Vec::new();
    for line in input_data.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        rows.push(serde_json::from_str(trimmed)?);
    }
    if rows.is_empty() {
        return Err(AffectCliError::NoRows);
    }
    Ok(rows)
}

fn write_output(output: &PathBuf, data: &str) -> Result<(), AffectCliError> {
    if output.to_string_lossy() == "-" {
        print!("{}", data);
    } else {
        fs::write(output, data)?;
    }
    Ok(())
}

fn print_insight(
    insight: &affect_engine::AffectInsight,
    pretty: bool,
) -> Result<(), AffectCliError> {
    if pretty {
        println!("{}", serde_json::to_string_pretty(insight)?);
    } else {
        println!("{}", serde_json::to_string(insight)?);
    }
    Ok(())
}

// Error types

#[derive(Debug)]
enum AffectCliError {
    Io(io::Error),
    Engine(EngineError),
    Json(serde_json::Error),
    NoRows,
}

impl From<io::Error> for AffectCliError {
    fn from(e: io::Error) -> Self {
        AffectCliError::Io(e)
    }
}

impl From<EngineError> for AffectCliError {
    fn from(e: EngineError) -> Self {
        AffectCliError::Engine(e)
    }
}

impl From<serde_json::Error> for AffectCliError {
    fn from(e: serde_json::Error) -> Self {
        AffectCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<AffectCliError> for CliError {
    fn from(e: AffectCliError) -> Self {
        match e {
            AffectCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            AffectCliError::Engine(e) => CliError {
                code: "ENGINE_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            AffectCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            AffectCliError::NoRows => CliError {
                code: "NO_ROWS".to_string(),
                message: "No records found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
        }
    }
}

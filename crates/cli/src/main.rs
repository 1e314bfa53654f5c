//! FastForest command line interface
//!
//! Compiles XGBoost text dumps to the binary forest format, scores rows of
//! features and reports model metadata.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use fastforest::{
    load_binary, load_text_with_config, ErrorKind, Forest, ForestConfig, ForestError,
    ForestSummary,
};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "fastforest")]
#[command(author = "FastForest Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compile and evaluate XGBoost tree ensembles", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile a text dump into a binary forest and print its hash
    Convert {
        /// XGBoost text dump
        input: PathBuf,
        /// Binary output path
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        schema: SchemaArgs,
    },
    /// Score feature rows read from a file or stdin
    Predict(PredictCommand),
    /// Print model statistics as JSON
    Inspect {
        #[command(flatten)]
        model: ModelArgs,
    },
    /// Print the BLAKE3 content hash of a model
    Hash {
        #[command(flatten)]
        model: ModelArgs,
    },
}

#[derive(Args, Debug)]
struct SchemaArgs {
    /// Comma-separated feature names; discovered from the dump when omitted
    #[arg(long, value_delimiter = ',')]
    features: Option<Vec<String>>,

    /// Number of classes (2 for binary models)
    #[arg(long)]
    classes: Option<usize>,
}

impl SchemaArgs {
    fn is_set(&self) -> bool {
        self.features.is_some() || self.classes.is_some()
    }

    fn apply(&self, config: &mut ForestConfig) -> Result<()> {
        if let Some(features) = &self.features {
            config.features = Some(features.clone());
        }
        if let Some(classes) = self.classes {
            config.n_classes = classes;
        }
        config.validate()?;
        Ok(())
    }
}

#[derive(Args, Debug)]
struct ModelArgs {
    /// Model path: a binary forest, or a text dump with --text
    model: PathBuf,

    /// Treat the model as an XGBoost text dump
    #[arg(long)]
    text: bool,

    #[command(flatten)]
    schema: SchemaArgs,
}

impl ModelArgs {
    /// Load the model; text dumps also report their feature order.
    fn load(&self, config: &mut ForestConfig) -> Result<(Forest, Option<Vec<String>>)> {
        if self.text {
            self.schema.apply(config)?;
            let (forest, features) = load_text_with_config(&self.model, config)
                .with_context(|| format!("failed to compile {}", self.model.display()))?;
            return Ok((forest, Some(features)));
        }
        if self.schema.is_set() {
            bail!("--features and --classes only apply to text dumps (add --text)");
        }
        let forest = load_binary(&self.model)
            .with_context(|| format!("failed to load {}", self.model.display()))?;
        Ok((forest, None))
    }
}

#[derive(Args, Debug)]
struct PredictCommand {
    #[command(flatten)]
    model: ModelArgs,

    /// Rows of whitespace or comma separated values; stdin when omitted
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Binary models: print the logistic probability instead of the raw score
    #[arg(long)]
    probability: bool,

    /// Multi-class models: print raw per-class scores instead of probabilities
    #[arg(long)]
    raw: bool,

    /// Additive base response; overrides the configured value
    #[arg(long)]
    base: Option<f32>,
}

#[derive(Serialize)]
struct InspectReport {
    #[serde(flatten)]
    summary: ForestSummary,
    hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    features: Option<Vec<String>>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

/// 2 for bad input, 3 for corrupt models, 4 for misuse, 1 otherwise.
fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<ForestError>().map(ForestError::kind) {
        Some(ErrorKind::Input) => 2,
        Some(ErrorKind::CorruptModel) => 3,
        Some(ErrorKind::Usage) => 4,
        None => 1,
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => ForestConfig::from_toml_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ForestConfig::default(),
    };
    config
        .apply_env()
        .context("invalid FASTFOREST_* environment override")?;

    init_logging(cli.verbose, &config.logging.level)?;
    debug!(?config, "effective configuration");

    match cli.command {
        Commands::Convert {
            input,
            output,
            schema,
        } => {
            schema.apply(&mut config)?;
            convert(&input, &output, &config)?;
            Ok(())
        }
        Commands::Predict(cmd) => predict(&cmd, config),
        Commands::Inspect { model } => inspect(&model, config),
        Commands::Hash { model } => {
            let (forest, _) = model.load(&mut config)?;
            println!("{}", forest.hash_hex());
            Ok(())
        }
    }
}

fn init_logging(verbose: bool, configured: &str) -> Result<()> {
    let log_level = if verbose {
        Level::DEBUG
    } else {
        configured.parse().unwrap_or(Level::INFO)
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

fn convert(input: &Path, output: &Path, config: &ForestConfig) -> Result<String> {
    let (forest, features) = load_text_with_config(input, config)
        .with_context(|| format!("failed to compile {}", input.display()))?;
    forest
        .write_binary(output)
        .with_context(|| format!("failed to write {}", output.display()))?;

    let hash = forest.hash_hex();
    info!(
        output = %output.display(),
        trees = forest.n_trees(),
        features = ?features,
        hash = %hash,
        "wrote binary forest"
    );
    println!("{hash}");
    Ok(hash)
}

fn predict(cmd: &PredictCommand, mut config: ForestConfig) -> Result<()> {
    let (forest, _) = cmd.model.load(&mut config)?;
    let base_response = cmd.base.unwrap_or(config.base_response);

    let (rows, n_features) = match &cmd.input {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            read_rows(BufReader::new(file))?
        }
        None => read_rows(io::stdin().lock())?,
    };
    if rows.is_empty() {
        return Ok(());
    }
    info!(rows = rows.len() / n_features, n_features, "scoring");

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for line in score_rows(&forest, &rows, n_features, base_response, cmd)? {
        writeln!(out, "{line}")?;
    }
    out.flush()?;
    Ok(())
}

/// One output line per row: a score, or space separated class values.
fn score_rows(
    forest: &Forest,
    rows: &[f32],
    n_features: usize,
    base_response: f32,
    cmd: &PredictCommand,
) -> Result<Vec<String>> {
    let n_classes = forest.n_classes();
    if n_classes == 2 {
        if cmd.raw {
            bail!("--raw applies to multi-class models");
        }
        let scores = forest.evaluate_rows_with_base(rows, n_features, base_response)?;
        return Ok(scores
            .into_iter()
            .map(|score| {
                if cmd.probability {
                    sigmoid(score).to_string()
                } else {
                    score.to_string()
                }
            })
            .collect());
    }

    if cmd.probability {
        bail!("--probability applies to binary models; multi-class output is already a distribution");
    }
    let values = if cmd.raw {
        if n_features < forest.n_features_required() {
            return Err(ForestError::FeatureVectorTooShort {
                required: forest.n_features_required(),
                actual: n_features,
            }
            .into());
        }
        let mut values = vec![0.0; rows.len() / n_features * n_classes];
        for (row, slots) in rows.chunks(n_features).zip(values.chunks_mut(n_classes)) {
            forest.evaluate_multiclass_into(row, slots, base_response)?;
        }
        values
    } else {
        forest.softmax_rows_with_base(rows, n_features, base_response)?
    };

    Ok(values
        .chunks(n_classes)
        .map(|class_values| {
            class_values
                .iter()
                .map(f32::to_string)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect())
}

fn sigmoid(score: f32) -> f32 {
    1.0 / (1.0 + (-score).exp())
}

/// Parse a row-major matrix; blank lines and `#` comments are skipped.
fn read_rows<R: BufRead>(reader: R) -> Result<(Vec<f32>, usize)> {
    let mut values = Vec::new();
    let mut width = None;

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let row = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|v| !v.is_empty())
            .map(|v| {
                v.parse::<f32>()
                    .with_context(|| format!("line {}: `{v}` is not a number", i + 1))
            })
            .collect::<Result<Vec<f32>>>()?;

        match width {
            None => width = Some(row.len()),
            Some(w) if w != row.len() => {
                bail!("line {}: expected {w} values, found {}", i + 1, row.len())
            }
            Some(_) => {}
        }
        values.extend(row);
    }

    Ok((values, width.unwrap_or(0)))
}

fn inspect(model: &ModelArgs, mut config: ForestConfig) -> Result<()> {
    let (forest, features) = model.load(&mut config)?;
    let report = InspectReport {
        summary: forest.summary(),
        hash: forest.hash_hex(),
        features,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

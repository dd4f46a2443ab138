use std::{fs, io::Read, path::PathBuf, time::Instant};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use crate::{
    CLASSIFICATION_THRESHOLD, Category, FileArtifactStore, Normalizer, Prediction, ReviewDetector,
    TrainingConfig,
    model::{DEFAULT_MODEL_PATH, MODEL_PATH_ENV},
    training,
};

/// Environment variable naming the default training dataset.
pub const DATA_PATH_ENV: &str = "IS_IT_FAKE_DATA";

#[derive(Parser)]
#[command(name = "is-it-fake", version)]
#[command(about = "Detect computer generated (fake) product reviews", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Quiet mode (warnings and errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Verbose mode; repeat for more detail
    #[arg(short, long, action = ArgAction::Count, global = true, conflicts_with = "quiet")]
    verbose: u8,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Train a model from a labelled CSV and write the artifact
    Train(TrainArgs),
    /// Classify review text with a trained model
    Predict(PredictArgs),
    /// Print the normalized form of a review
    Normalize(NormalizeArgs),
}

#[derive(Args)]
struct TrainArgs {
    /// Labelled CSV with a review text column and a label column
    #[arg(value_name = "CSV", env = DATA_PATH_ENV)]
    data: PathBuf,

    /// Where to write the trained artifact
    #[arg(short, long, value_name = "PATH", env = MODEL_PATH_ENV, default_value = DEFAULT_MODEL_PATH)]
    model: PathBuf,

    /// JSON training configuration; flags below override it
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Share of each class held out for evaluation
    #[arg(long)]
    holdout: Option<f64>,

    /// Cross-validation folds for the alpha search
    #[arg(long)]
    folds: Option<usize>,

    /// Seed for the data splits
    #[arg(long)]
    seed: Option<u64>,

    /// Skip the alpha search and use --alpha
    #[arg(long)]
    no_search: bool,

    /// Smoothing used when the search is skipped
    #[arg(long)]
    alpha: Option<f64>,

    /// Keep word forms instead of Porter stemming
    #[arg(long)]
    no_stem: bool,

    /// Text column (auto-detected when omitted)
    #[arg(long)]
    text_column: Option<String>,

    /// Label column
    #[arg(long)]
    label_column: Option<String>,

    /// Field delimiter
    #[arg(long)]
    delimiter: Option<char>,

    /// Also write the training report as JSON
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,
}

#[derive(Args)]
struct PredictArgs {
    /// Text to analyze (if not provided, reads from stdin)
    #[arg(value_name = "TEXT")]
    text: Option<String>,

    /// Read text from file
    #[arg(short, long, value_name = "PATH", conflicts_with = "text")]
    file: Option<PathBuf>,

    /// Batch process reviews (one per line, blank lines skipped)
    #[arg(short, long, value_name = "PATH", conflicts_with_all = ["text", "file"])]
    batch: Option<PathBuf>,

    /// Batch process from JSON array
    #[arg(long, value_name = "PATH", conflicts_with_all = ["text", "file", "batch"])]
    batch_json: Option<PathBuf>,

    /// Trained artifact
    #[arg(short, long, value_name = "PATH", env = MODEL_PATH_ENV, default_value = DEFAULT_MODEL_PATH)]
    model: PathBuf,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "human")]
    format: OutputFormat,

    /// Classification threshold on P(generated)
    #[arg(short = 't', long, default_value_t = CLASSIFICATION_THRESHOLD, value_parser = parse_threshold)]
    threshold: f64,
}

fn parse_threshold(raw: &str) -> Result<f64, String> {
    let threshold: f64 = raw.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&threshold) {
        Ok(threshold)
    } else {
        Err(format!("threshold must be between 0 and 1, got {raw}"))
    }
}

#[derive(Args)]
struct NormalizeArgs {
    /// Text to normalize (if not provided, reads from stdin)
    #[arg(value_name = "TEXT")]
    text: Option<String>,

    /// Skip Porter stemming
    #[arg(long)]
    no_stem: bool,
}

#[derive(ValueEnum, Clone, Copy)]
enum OutputFormat {
    /// Output just the category label
    Label,
    /// Output P(generated) as a float 0-1
    Probability,
    /// Output as JSON
    Json,
    /// Label with the model confidence
    Human,
}

#[derive(Clone, Copy)]
enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

enum InputSource {
    Single(String),
    Batch(Vec<String>),
}

pub fn run(cli: &Cli) -> Result<()> {
    let verbosity = match (cli.quiet, cli.verbose) {
        (true, _) => Verbosity::Quiet,
        (_, 0) => Verbosity::Normal,
        _ => Verbosity::Verbose,
    };
    init_logging(cli, verbosity);

    match &cli.command {
        Command::Train(args) => run_train(args),
        Command::Predict(args) => run_predict(args, verbosity),
        Command::Normalize(args) => {
            let text = match &args.text {
                Some(text) => text.clone(),
                None => read_stdin()?,
            };
            println!("{}", Normalizer::new(!args.no_stem).normalize(&text));
            Ok(())
        }
    }
}

fn init_logging(cli: &Cli, verbosity: Verbosity) {
    let default_level = match (verbosity, cli.verbose) {
        (Verbosity::Quiet, _) => "warn",
        (Verbosity::Normal, _) => "info",
        (Verbosity::Verbose, 1) => "debug",
        (Verbosity::Verbose, _) => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    // A subscriber may already be installed when embedded; keep it.
    let _ = if cli.json_logs {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn run_train(args: &TrainArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => TrainingConfig::from_json_file(path)?,
        None => TrainingConfig::default(),
    };
    if let Some(holdout) = args.holdout {
        config.holdout_fraction = holdout;
    }
    if let Some(folds) = args.folds {
        config.folds = folds;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(alpha) = args.alpha {
        config.alpha = alpha;
    }
    if args.no_search {
        config.search_alphas.clear();
    }
    if args.no_stem {
        config.stem = false;
    }
    if let Some(column) = &args.text_column {
        config.dataset.text_column = Some(column.clone());
    }
    if let Some(column) = &args.label_column {
        config.dataset.label_column = column.clone();
    }
    if let Some(delimiter) = args.delimiter {
        config.dataset.delimiter = delimiter;
    }

    let store = FileArtifactStore::new(&args.model);
    let report = training::train_and_save(&args.data, &config, &store)
        .with_context(|| format!("Training on {} failed", args.data.display()))?;

    println!("Model written to {}", args.model.display());
    println!(
        "Examples: {} train, {} held out ({} rows read, {} dropped)",
        report.train_examples, report.holdout_examples, report.rows_read, report.rows_dropped
    );
    println!("Vocabulary: {} n-grams", report.vocabulary_size);
    println!("Alpha: {}", report.alpha);
    if let Some(cv) = report.cv_accuracy {
        println!("Cross-validated accuracy: {:.2}%", cv * 100.0);
    }
    println!("Training accuracy: {:.2}%", report.train_accuracy * 100.0);
    if let Some(holdout) = report.holdout_accuracy {
        println!("Held-out accuracy: {:.2}%", holdout * 100.0);
    }

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
    }
    Ok(())
}

/// Priority: text arg > file > batch > batch_json > stdin
fn determine_input_source(args: &PredictArgs) -> Result<InputSource> {
    if let Some(text) = &args.text {
        return Ok(InputSource::Single(text.clone()));
    }

    if let Some(path) = &args.file {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;
        return Ok(InputSource::Single(text));
    }

    if let Some(path) = &args.batch {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read batch file: {}", path.display()))?;
        let texts = contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(String::from)
            .collect();
        return Ok(InputSource::Batch(texts));
    }

    if let Some(path) = &args.batch_json {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read JSON batch file: {}", path.display()))?;
        let texts: Vec<String> =
            serde_json::from_str(&contents).with_context(|| "Failed to parse JSON array")?;
        return Ok(InputSource::Batch(texts));
    }

    Ok(InputSource::Single(read_stdin()?))
}

fn read_stdin() -> Result<String> {
    let mut buffer = String::new();
    std::io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read from stdin")?;
    Ok(buffer)
}

fn run_predict(args: &PredictArgs, verbosity: Verbosity) -> Result<()> {
    let input_source = determine_input_source(args)?;
    let detector = ReviewDetector::from_path(&args.model).with_threshold(args.threshold);
    let start = matches!(verbosity, Verbosity::Verbose).then(Instant::now);

    match input_source {
        InputSource::Single(text) => {
            let prediction = detector.predict(&text)?;
            report_elapsed(start);
            output_result(&prediction, args)?;
        }
        InputSource::Batch(texts) => {
            let predictions = detector.predict_batch(&texts)?;
            report_elapsed(start);
            output_batch_results(&predictions, args)?;
        }
    }
    Ok(())
}

fn report_elapsed(start: Option<Instant>) {
    if let Some(start_time) = start {
        eprintln!("Inference time: {:?}", start_time.elapsed());
    }
}

fn to_json(prediction: &Prediction, threshold: f64) -> serde_json::Value {
    let category = prediction.classification(threshold);
    serde_json::json!({
        "category": category,
        "label": category.label(),
        "confidence": prediction.confidence_annotation(threshold),
        "probabilities": {
            "authentic": prediction.authentic_probability(),
            "generated": prediction.generated_probability(),
        },
    })
}

/// Output single result based on format
fn output_result(prediction: &Prediction, args: &PredictArgs) -> Result<()> {
    let category: Category = prediction.classification(args.threshold);
    match args.format {
        OutputFormat::Label => {
            println!("{}", category.label());
        }
        OutputFormat::Probability => {
            println!("{:.4}", prediction.generated_probability());
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&to_json(prediction, args.threshold))?
            );
        }
        OutputFormat::Human => {
            println!("Result: {}", category.label());
            println!("{}", prediction.confidence_annotation(args.threshold));
        }
    }
    Ok(())
}

fn output_batch_results(predictions: &[Prediction], args: &PredictArgs) -> Result<()> {
    match args.format {
        OutputFormat::Json => {
            let json_array = predictions
                .iter()
                .map(|prediction| to_json(prediction, args.threshold))
                .collect::<Vec<_>>();
            println!("{}", serde_json::to_string(&json_array)?);
        }
        _ => {
            for prediction in predictions {
                output_result(prediction, args)?;
            }
        }
    }
    Ok(())
}

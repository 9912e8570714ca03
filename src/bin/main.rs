//! smosvm Command Line Interface
//!
//! Train, cross-validate and apply SVM models on libsvm or CSV data.

use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use log::{error, info, warn};
use smosvm::api::{evaluate, EvaluationMetrics, SVM};
use smosvm::core::{KernelType, Parameter, Problem, Result, SVMError, SvmType};
use smosvm::data::{detect_format, load_problem_as, DataFormat};
use smosvm::model::Model;
use smosvm::persistence::{format_g, load_model, save_model};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "smosvm")]
#[command(about = "Support Vector Machine training and prediction")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model, or cross-validate with -v
    Train(TrainArgs),
    /// Predict a data file with a trained model
    Predict(PredictArgs),
    /// Display model information
    Info(InfoArgs),
}

#[derive(Args)]
struct TrainArgs {
    /// Training data file (LibSVM or CSV format)
    #[arg(long)]
    data: PathBuf,

    /// Output model file (default: <data file name>.model)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Data format: auto, libsvm, or csv
    #[arg(short, long, default_value = "auto")]
    format: String,

    /// SVM type: 0 C-SVC, 1 nu-SVC, 2 one-class, 3 epsilon-SVR, 4 nu-SVR
    #[arg(short = 's', long, default_value_t = 0, value_parser = clap::value_parser!(i32).range(0..=4))]
    svm_type: i32,

    /// Kernel: 0 linear, 1 polynomial, 2 rbf, 3 sigmoid, 4 precomputed
    #[arg(short = 't', long, default_value_t = 2, value_parser = clap::value_parser!(i32).range(0..=4))]
    kernel_type: i32,

    /// Degree of the polynomial kernel
    #[arg(short, long, default_value_t = 3)]
    degree: i32,

    /// Kernel gamma (0 means 1/max feature index)
    #[arg(short, long, default_value_t = 0.0)]
    gamma: f64,

    /// Kernel coef0
    #[arg(short = 'r', long, default_value_t = 0.0)]
    coef0: f64,

    /// Cost C of C-SVC, epsilon-SVR and nu-SVR
    #[arg(short = 'c', long, default_value_t = 1.0)]
    cost: f64,

    /// nu of nu-SVC, one-class SVM and nu-SVR
    #[arg(short, long, default_value_t = 0.5)]
    nu: f64,

    /// Tube width of epsilon-SVR
    #[arg(short = 'p', long = "loss-epsilon", default_value_t = 0.1)]
    p: f64,

    /// Kernel cache size in MB
    #[arg(short = 'm', long, default_value_t = 100.0)]
    cache_size: f64,

    /// Stopping tolerance
    #[arg(short = 'e', long, default_value_t = 0.001)]
    tolerance: f64,

    /// Use the shrinking heuristic (0 or 1)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=1))]
    shrinking: u8,

    /// Train probability estimates (0 or 1)
    #[arg(short = 'b', long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
    probability: u8,

    /// Class weight as label:weight, multiplies C for that class
    #[arg(short = 'w', long = "weight", value_parser = parse_weight)]
    weights: Vec<(i32, f64)>,

    /// Run n-fold cross validation instead of saving a model
    #[arg(short = 'v', long = "folds")]
    folds: Option<usize>,

    /// Seed of the cross-validation and probability calibration folds
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args)]
struct PredictArgs {
    /// Input data file
    #[arg(long)]
    data: PathBuf,

    /// Trained model file
    #[arg(short, long)]
    model: PathBuf,

    /// Output predictions file (prints to stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Data format: auto, libsvm, or csv
    #[arg(short, long, default_value = "auto")]
    format: String,

    /// Output class probabilities (0 or 1)
    #[arg(short = 'b', long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
    probability: u8,
}

#[derive(Args)]
struct InfoArgs {
    /// Model file
    model: PathBuf,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let result = match cli.command {
        Commands::Train(args) => train_command(args),
        Commands::Predict(args) => predict_command(args),
        Commands::Info(args) => info_command(args),
    };

    if let Err(e) = result {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn parse_weight(s: &str) -> std::result::Result<(i32, f64), String> {
    let (label, weight) = s
        .split_once(':')
        .ok_or_else(|| format!("expected label:weight, got {s}"))?;
    let label = label
        .trim()
        .parse::<i32>()
        .map_err(|_| format!("invalid class label: {label}"))?;
    let weight = weight
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("invalid weight: {weight}"))?;
    Ok((label, weight))
}

fn load_data(path: &Path, format: &str) -> Result<Problem> {
    let format = if format == "auto" {
        detect_format(path)
    } else {
        format.parse::<DataFormat>()?
    };
    info!("Loading {:?} as {} format", path, format);
    load_problem_as(path, format)
}

impl TrainArgs {
    fn parameter(&self) -> Result<Parameter> {
        Ok(Parameter {
            svm_type: SvmType::from_code(self.svm_type)?,
            kernel_type: KernelType::from_code(self.kernel_type)?,
            degree: self.degree,
            gamma: self.gamma,
            coef0: self.coef0,
            cache_size: self.cache_size,
            eps: self.tolerance,
            c: self.cost,
            weights: self.weights.clone(),
            nu: self.nu,
            p: self.p,
            shrinking: self.shrinking == 1,
            probability: self.probability == 1,
        })
    }

    fn model_path(&self) -> PathBuf {
        match &self.output {
            Some(path) => path.clone(),
            None => {
                let name = self
                    .data
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "data".to_string());
                PathBuf::from(format!("{name}.model"))
            }
        }
    }
}

fn train_command(args: TrainArgs) -> Result<()> {
    let param = args.parameter()?;
    let problem = load_data(&args.data, &args.format)?;
    info!(
        "Loaded {} samples, max feature index {}",
        problem.len(),
        problem.max_index()
    );

    let mut svm = SVM::from_parameter(param);
    if let Some(seed) = args.seed {
        svm = svm.with_seed(seed);
    }

    if let Some(folds) = args.folds {
        let metrics = svm.cross_validate(&problem, folds)?;
        print_cross_validation(svm.param().svm_type, &metrics);
        return Ok(());
    }

    let model = svm.train(&problem)?;
    info!(
        "Trained {} model with {} support vectors",
        model.svm_type(),
        model.total_sv()
    );

    let path = args.model_path();
    save_model(&path, &model)?;
    info!("Model saved to: {:?}", path);
    Ok(())
}

fn print_cross_validation(svm_type: SvmType, metrics: &EvaluationMetrics) {
    if svm_type.is_regression() {
        println!(
            "Cross Validation Mean squared error = {}",
            format_g(metrics.mean_squared_error, 6)
        );
        println!(
            "Cross Validation Squared correlation coefficient = {}",
            format_g(metrics.squared_correlation, 6)
        );
    } else {
        println!(
            "Cross Validation Accuracy = {}%",
            format_g(100.0 * metrics.accuracy(), 6)
        );
    }
}

fn predict_command(args: PredictArgs) -> Result<()> {
    info!("Loading model from: {:?}", args.model);
    let model = load_model(&args.model)?;
    let problem = load_data(&args.data, &args.format)?;

    let with_probability = args.probability == 1;
    if with_probability {
        if model.svm_type().is_classification() && !model.has_probability_model() {
            return Err(SVMError::ProbabilityUnavailable(
                "model was trained without probability estimates".to_string(),
            ));
        }
        if let Some(sigma) = model.svr_probability() {
            info!(
                "Prob. model for test data: target value = predicted value + z, \
                 z: Laplace distribution e^(-|z|/sigma)/(2sigma), sigma = {}",
                format_g(sigma, 6)
            );
        }
        if model.svm_type() == SvmType::OneClass {
            warn!("one-class SVM has no probability output; printing labels only");
        }
    } else if model.has_probability_model() {
        info!("Model supports probability estimates, but disabled in prediction");
    }

    let to_file = args.output.is_some();
    let mut writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let predictions = write_predictions(&mut writer, &model, &problem, with_probability)?;
    writer.flush()?;
    drop(writer);

    let metrics = EvaluationMetrics::compute(&predictions, &problem.labels());
    let report = evaluation_report(model.svm_type(), &metrics);
    if to_file {
        println!("{report}");
    } else {
        eprintln!("{report}");
    }
    Ok(())
}

fn write_predictions<W: Write>(
    writer: &mut W,
    model: &Model,
    problem: &Problem,
    with_probability: bool,
) -> Result<Vec<f64>> {
    let class_probabilities = with_probability && model.has_probability_model();

    if class_probabilities {
        write!(writer, "labels")?;
        for label in model.labels().unwrap_or(&[]) {
            write!(writer, " {label}")?;
        }
        writeln!(writer)?;
    }

    let mut predictions = Vec::with_capacity(problem.len());
    for sample in problem.samples() {
        if class_probabilities {
            let (label, probabilities) = model.predict_probability(&sample.features)?;
            write!(writer, "{}", format_g(label, 6))?;
            for p in probabilities {
                write!(writer, " {}", format_g(p, 6))?;
            }
            writeln!(writer)?;
            predictions.push(label);
        } else {
            let label = model.predict(&sample.features);
            writeln!(writer, "{}", format_g(label, 17))?;
            predictions.push(label);
        }
    }
    Ok(predictions)
}

fn evaluation_report(svm_type: SvmType, metrics: &EvaluationMetrics) -> String {
    if svm_type.is_regression() {
        format!(
            "Mean squared error = {} (regression)\nSquared correlation coefficient = {} (regression)",
            format_g(metrics.mean_squared_error, 6),
            format_g(metrics.squared_correlation, 6)
        )
    } else {
        format!(
            "Accuracy = {}% ({}/{}) (classification)",
            format_g(100.0 * metrics.accuracy(), 6),
            metrics.correct,
            metrics.total
        )
    }
}

fn info_command(args: InfoArgs) -> Result<()> {
    info!("Loading model from: {:?}", args.model);
    let model = load_model(&args.model)?;
    let summary = model.summary();

    if args.json {
        let json = serde_json::to_string_pretty(&summary)
            .map_err(|e| SVMError::SerializationError(e.to_string()))?;
        println!("{json}");
        return Ok(());
    }

    let param = model.param();
    println!("=== SVM Model Summary ===");
    println!("SVM Type: {}", summary.svm_type);
    println!("Kernel Type: {}", param.kernel_type);
    if param.kernel_type == KernelType::Polynomial {
        println!("Degree: {}", param.degree);
    }
    if param.kernel_type.uses_gamma() {
        println!("Gamma: {}", format_g(param.gamma, 6));
    }
    if param.kernel_type.uses_coef0() {
        println!("Coef0: {}", format_g(param.coef0, 6));
    }
    println!("Classes: {}", summary.nr_class);
    if let Some(labels) = &summary.labels {
        println!("Labels: {}", join(labels));
    }
    println!("Support Vectors: {}", summary.total_sv);
    if let Some(n_sv) = &summary.n_sv {
        println!("Support Vectors per Class: {}", join(n_sv));
    }
    let rho: Vec<String> = summary.rho.iter().map(|&r| format_g(r, 6)).collect();
    println!("Rho: {}", rho.join(" "));
    println!(
        "Probability Estimates: {}",
        if summary.has_probability { "yes" } else { "no" }
    );
    Ok(())
}

fn join<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

//! Greyhound CLI - Command-line interface for race time predictions

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use greyhound::core::{Diagnostics, ModelConfig, Severity};
use greyhound::data::load_history;
use greyhound::error::validate_box_number;
use greyhound::models::{format_time, RaceDefinition, RaceEntrant, RacePrediction, WeightSet};
use greyhound::predictor::TimePredictor;
use greyhound::simulation::{RaceSimulation, RaceSimulator, SensitivityOutcome, SensitivityTester};

#[derive(Parser)]
#[command(name = "greyhound")]
#[command(author, version, about = "Greyhound race time prediction CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON file overriding model constants
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON instead of tables
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict finish times for a race
    Predict {
        #[command(flatten)]
        race: RaceArgs,

        #[command(flatten)]
        weights: WeightArgs,

        /// Also trace the race through its checkpoints
        #[arg(long)]
        simulate: bool,
    },

    /// Predict a race and show the checkpoint simulation
    Simulate {
        #[command(flatten)]
        race: RaceArgs,

        #[command(flatten)]
        weights: WeightArgs,
    },

    /// Compare rankings across the weight catalogue
    Sensitivity {
        #[command(flatten)]
        race: RaceArgs,
    },

    /// Show the configured checkpoint table
    Checkpoints {
        /// Only this track (code or display name)
        #[arg(short, long)]
        track: Option<String>,
    },
}

#[derive(Args)]
struct RaceArgs {
    /// Historical race records (CSV)
    history: PathBuf,

    /// Race definition JSON; overrides the inline race options
    #[arg(long)]
    race: Option<PathBuf>,

    /// Track code or display name
    #[arg(short, long)]
    track: Option<String>,

    /// Race distance in metres
    #[arg(short, long)]
    distance: Option<u32>,

    /// Race grade, e.g. A3
    #[arg(short, long, default_value = "")]
    grade: String,

    /// Race date (DD/MM/YYYY)
    #[arg(long)]
    date: Option<String>,

    /// Entrant as "Name:Box"; repeat for each runner
    #[arg(short, long = "entrant", value_parser = parse_entrant)]
    entrants: Vec<RaceEntrant>,
}

#[derive(Args)]
struct WeightArgs {
    /// Weight on the best finish time
    #[arg(long)]
    best: Option<f64>,

    /// Weight on the mean finish time
    #[arg(long)]
    average: Option<f64>,

    /// Weight on the assigned-box mean time
    #[arg(long)]
    average_trap: Option<f64>,
}

impl WeightArgs {
    fn resolve(&self, defaults: &WeightSet) -> WeightSet {
        WeightSet::new(
            self.best.unwrap_or(defaults.best),
            self.average.unwrap_or(defaults.average),
            self.average_trap.unwrap_or(defaults.average_trap),
        )
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set subscriber")?;

    if !cli.json {
        println!("{}", "Greyhound CLI v0.3.0".cyan().bold());
        println!();
    }

    let config = match &cli.config {
        Some(path) => ModelConfig::load(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => ModelConfig::default(),
    };

    match cli.command {
        Commands::Predict {
            race,
            weights,
            simulate,
        } => {
            let weights = weights.resolve(&config.default_weights);
            run_predict(config, &race, &weights, simulate, cli.json)?;
        }
        Commands::Simulate { race, weights } => {
            let weights = weights.resolve(&config.default_weights);
            run_predict(config, &race, &weights, true, cli.json)?;
        }
        Commands::Sensitivity { race } => {
            run_sensitivity(config, &race, cli.json)?;
        }
        Commands::Checkpoints { track } => {
            show_checkpoints(&config, track.as_deref(), cli.json)?;
        }
    }

    Ok(())
}

/// Parse "Name:Box"; the name may itself contain colons
fn parse_entrant(value: &str) -> Result<RaceEntrant, String> {
    let (name, box_str) = value
        .rsplit_once(':')
        .ok_or_else(|| format!("expected Name:Box, got '{}'", value))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing entrant name in '{}'", value));
    }
    let box_no: u8 = box_str
        .trim()
        .parse()
        .map_err(|_| format!("invalid box '{}' for {}", box_str.trim(), name))?;
    validate_box_number(box_no).map_err(|e| e.to_string())?;
    Ok(RaceEntrant {
        name: name.to_string(),
        box_no,
    })
}

fn load_race(args: &RaceArgs) -> Result<RaceDefinition> {
    if let Some(path) = &args.race {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read race definition {:?}", path))?;
        let race: RaceDefinition = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse race definition {:?}", path))?;
        return Ok(race);
    }

    let Some(track) = &args.track else {
        bail!("--track is required unless --race is given");
    };
    let Some(distance) = args.distance else {
        bail!("--distance is required unless --race is given");
    };

    Ok(RaceDefinition {
        track: track.clone(),
        distance,
        grade: args.grade.clone(),
        date: args.date.clone(),
        entrants: args.entrants.clone(),
    })
}

fn spinner(message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(message.to_string());
    Ok(pb)
}

fn run_predict(
    config: ModelConfig,
    args: &RaceArgs,
    weights: &WeightSet,
    simulate: bool,
    json: bool,
) -> Result<()> {
    let race = load_race(args)?;
    let predictor = TimePredictor::new(config);

    let pb = spinner("Loading race history...")?;
    let prediction = predictor.predict_loaded(load_history(&args.history), &race, weights);
    pb.finish_and_clear();

    let simulation = if simulate && !prediction.is_fatal() {
        Some(RaceSimulator::new(predictor.config()).simulate(&prediction.results, &race))
    } else {
        None
    };

    if json {
        let output = serde_json::json!({
            "race": race,
            "weights": weights,
            "prediction": prediction,
            "simulation": simulation,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_prediction(&race, weights, &prediction, &args.history);
        if let Some(sim) = &simulation {
            print_simulation(sim);
        }
    }

    if prediction.is_fatal() {
        bail!("Prediction failed for {:?}", args.history);
    }
    Ok(())
}

fn print_prediction(
    race: &RaceDefinition,
    weights: &WeightSet,
    prediction: &RacePrediction,
    history: &Path,
) {
    println!(
        "{}: {} {}m {} {}",
        "Race".green(),
        race.track,
        race.distance,
        race.grade,
        race.date.as_deref().unwrap_or("")
    );
    println!(
        "{}: {} ({} records)",
        "History".green(),
        history.display(),
        prediction.records_loaded
    );
    println!("{}: {}", "Weights".green(), weights);
    println!();

    print_diagnostics(&prediction.diagnostics);

    if prediction.results.is_empty() {
        println!("{}", "No predictions produced.".yellow());
        return;
    }

    println!("{}", "=== Predicted Times ===".yellow().bold());
    println!(
        "{:>4} {:>3} {:<20} {:>8} {:>8} {:>8} {:>8} {:<12} {:<11} {}",
        "Rank", "Box", "Name", "Pred", "Base", "Best", "Avg", "Recency", "Style", "Data"
    );
    println!("{}", "-".repeat(100));

    for (i, r) in prediction.results.iter().enumerate() {
        let predicted = format_time(r.predicted_time);
        let predicted = if r.predicted_time.is_some() {
            predicted.bold()
        } else {
            predicted.dimmed()
        };
        println!(
            "{:>4} {:>3} {:<20} {:>8} {:>8} {:>8} {:>8} {:<12} {:<11} {}",
            i + 1,
            r.box_no,
            truncate_name(&r.name, 20),
            predicted,
            format_time(r.base_time),
            format_time(r.indicators.best_time),
            format_time(r.indicators.mean_time),
            r.indicators.recency.label(),
            r.indicators.bends.style.to_string(),
            r.indicators.flags.code()
        );
    }
    println!();

    println!("{}", "=== Adjustments ===".yellow().bold());
    for r in &prediction.results {
        if r.indicators.has_history() {
            println!(
                "{:>3} {:<20} {:+.2}s  {}",
                r.box_no,
                truncate_name(&r.name, 20),
                r.adjustments.total(),
                r.adjustments
            );
        }
    }
    println!();
}

fn print_simulation(sim: &RaceSimulation) {
    println!("{}", "=== Race Simulation ===".yellow().bold());
    print!("{}", sim);
    println!();
}

fn print_diagnostics(diagnostics: &Diagnostics) {
    let notable: Vec<_> = diagnostics
        .iter()
        .filter(|d| d.severity != Severity::Info)
        .collect();
    if notable.is_empty() {
        return;
    }

    println!("{}", "=== Messages ===".yellow().bold());
    for d in notable {
        match d.severity {
            Severity::Fatal => println!("{} {}", "error:".red().bold(), d.message),
            _ => println!("{} {}", "warning:".yellow(), d.message),
        }
    }
    println!();
}

fn run_sensitivity(config: ModelConfig, args: &RaceArgs, json: bool) -> Result<()> {
    let race = load_race(args)?;
    let predictor = TimePredictor::new(config);
    let tester = SensitivityTester::new(&predictor);

    let pb = spinner("Running weight sets...")?;
    let outcome = tester.run_loaded(load_history(&args.history), &race);
    pb.finish_and_clear();

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    let report = match outcome {
        SensitivityOutcome::Skipped {
            reason,
            diagnostics,
        } => {
            print_diagnostics(&diagnostics);
            println!("{} {}", "Skipped:".yellow().bold(), reason);
            return Ok(());
        }
        SensitivityOutcome::Completed(report) => report,
    };

    print_diagnostics(&report.diagnostics);

    println!("{}", "=== Rankings per Weight Set ===".yellow().bold());
    for run in &report.runs {
        println!("{}", run.weights.to_string().cyan());
        for (i, r) in run.prediction.results.iter().enumerate() {
            println!(
                "  {:>2}. {:>3} {:<20} {:>8}",
                i + 1,
                r.box_no,
                truncate_name(&r.name, 20),
                format_time(r.predicted_time)
            );
        }
    }
    println!();

    println!("{}", "=== Sensitivity Summary ===".yellow().bold());
    println!(
        "{:>3} {:<20} {:>5} {:>5} {:>8} {:>8} {:>7}",
        "Box", "Name", "Best", "Worst", "Fastest", "Slowest", "Spread"
    );
    println!("{}", "-".repeat(62));
    for s in &report.summary {
        let spread = s
            .spread()
            .map(|v| format!("{:.2}", v))
            .unwrap_or_else(|| "N/A".to_string());
        let line = format!(
            "{:>3} {:<20} {:>5} {:>5} {:>8} {:>8} {:>7}",
            s.box_no,
            truncate_name(&s.name, 20),
            s.best_rank,
            s.worst_rank,
            format_time(s.fastest),
            format_time(s.slowest),
            spread
        );
        if s.best_rank != s.worst_rank {
            println!("{}", line.yellow());
        } else {
            println!("{}", line);
        }
    }

    Ok(())
}

fn show_checkpoints(config: &ModelConfig, track: Option<&str>, json: bool) -> Result<()> {
    let wanted = track.map(|t| config.resolve_track(t).0);

    let table: Vec<_> = config
        .checkpoints
        .iter()
        .filter(|(code, _)| wanted.as_deref().map_or(true, |w| w == code.as_str()))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&table)?);
        return Ok(());
    }

    if table.is_empty() {
        println!(
            "{}",
            format!("No checkpoints configured for '{}'", track.unwrap_or("")).yellow()
        );
        return Ok(());
    }

    println!("{:<8} {:>8}  {}", "Track", "Distance", "Checkpoints (m)");
    println!("{}", "-".repeat(50));
    for (code, distances) in table {
        for (distance, points) in distances {
            let points: Vec<String> = points.iter().map(u32::to_string).collect();
            println!("{:<8} {:>8}  {}", code, distance, points.join(", "));
        }
    }

    Ok(())
}

/// Truncate name to fit display width
fn truncate_name(name: &str, max_len: usize) -> String {
    let chars: Vec<char> = name.chars().collect();
    if chars.len() <= max_len {
        name.to_string()
    } else {
        chars[..max_len - 1].iter().collect::<String>() + "…"
    }
}

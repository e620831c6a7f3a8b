#![forbid(unsafe_code)]

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use percentile_harness::{
    extract_anchors, validate, DenseDistribution, Domain, EngineConfig, ForecastEngine, GridPoint,
    JsonlSink, JsonlTraceSink, QuestionBounds, TraceSink,
};

#[derive(Parser)]
#[command(name = "percentile", version, about = "Percentile-to-distribution CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse percentile anchors from a model answer
    Extract {
        #[arg(long)]
        input: PathBuf,
    },
    /// Build, validate and aggregate attempts for one question
    Forecast {
        /// Question bounds JSON
        #[arg(long)]
        bounds: PathBuf,
        /// One file per attempt (repeatable)
        #[arg(long = "attempt", required = true)]
        attempts: Vec<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
        /// JSONL trace output, one line per attempt
        #[arg(long)]
        trace: Option<PathBuf>,
        #[arg(long)]
        out: PathBuf,
    },
    /// Validate a CDF given as a JSON array of values on the standard grid
    ///
    /// Exits with status 2 when the distribution is rejected.
    Validate {
        #[arg(long)]
        bounds: PathBuf,
        #[arg(long)]
        cdf: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Run synthetic evaluation suite
    Eval {
        #[arg(long)]
        case: Option<String>,
        #[arg(long)]
        out: PathBuf,
    },
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Extract { input } => {
            let text = std::fs::read_to_string(input)?;
            let anchors = extract_anchors(&text)?;
            print_json(&anchors)?;
        }
        Commands::Forecast {
            bounds,
            attempts,
            config,
            trace,
            out,
        } => {
            let engine = ForecastEngine::new(load_config(config.as_deref())?)?;
            let bounds: QuestionBounds = read_json(&bounds)?;
            let texts = attempts
                .iter()
                .map(std::fs::read_to_string)
                .collect::<Result<Vec<_>, _>>()?;

            let result = match trace {
                Some(path) => {
                    let (sink, worker) = JsonlTraceSink::create(&path)?;
                    let result = engine.forecast_question_with_trace(
                        &bounds,
                        &texts,
                        Some(&sink as &dyn TraceSink),
                    );
                    drop(sink);
                    let lines = worker.join()?;
                    tracing::info!(path = %path.display(), lines, "Wrote attempt trace");
                    result
                }
                None => engine.forecast_question(&bounds, &texts),
            };
            write_json(&out, &result?)?;
        }
        Commands::Validate {
            bounds,
            cdf,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let bounds: QuestionBounds = read_json(&bounds)?;
            let domain = Domain::resolve(&bounds)?;
            let values: Vec<f64> = read_json(&cdf)?;
            let points = domain
                .grid(values.len())
                .into_iter()
                .zip(values)
                .map(|(x, cdf)| GridPoint { x, cdf })
                .collect();

            let validated = validate(DenseDistribution::from_points(points), &domain, &config);
            print_json(&validated)?;
            if !validated.verdict.accepted {
                return Ok(ExitCode::from(2));
            }
        }
        Commands::Eval { case, out } => {
            let results = percentile_harness::evaluation::run_synthetic_suite(case.as_deref());
            if results.is_empty() {
                return Err(format!("no synthetic case named {:?}", case.unwrap_or_default()).into());
            }
            let (sink, worker) = JsonlSink::create(&out)?;
            for result in results {
                sink.send(result)?;
            }
            drop(sink);
            let lines = worker.join()?;
            tracing::info!(path = %out.display(), lines, "Wrote evaluation results");
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(EngineConfig::load(path)?),
        None => Ok(EngineConfig::default()),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, Box<dyn std::error::Error>> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer_pretty(&mut handle, value)?;
    writeln!(handle)?;
    Ok(())
}

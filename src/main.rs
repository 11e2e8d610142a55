use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use impact_engine::benchmark::BenchmarkValidator;
use impact_engine::config::Config;
use impact_engine::feasibility::ConstraintSet;
use impact_engine::leontief::{ShockMode, ShockSchedule};
use impact_engine::model::{ModelSnapshot, ModelStore};
use impact_engine::pipeline::{run_blocking, ImpactRunner, RunRequest, Scenario};
use impact_engine::satellite::SatelliteCoefficients;
use impact_engine::telemetry::init_tracing;
use impact_engine::workforce::WorkforceInputs;

#[derive(Parser)]
#[command(name = "impact-engine")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Input-Output economic impact engine", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = "config/default.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a shock schedule and write the run result as JSON
    Run {
        /// Model snapshot (JSON)
        #[arg(short, long)]
        model: PathBuf,

        /// Scenario file (JSON)
        #[arg(short, long)]
        scenario: PathBuf,

        /// Satellite coefficients (JSON)
        #[arg(long)]
        coefficients: Option<PathBuf>,

        /// Constraint set (JSON)
        #[arg(long)]
        constraints: Option<PathBuf>,

        /// Occupation bridge, classifications, targets and baseline (JSON)
        #[arg(long)]
        workforce: Option<PathBuf>,

        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compare computed multipliers against a reference set
    Benchmark {
        /// Model snapshot (JSON)
        #[arg(short, long)]
        model: PathBuf,

        /// Reference multipliers (JSON)
        #[arg(short, long)]
        reference: PathBuf,

        /// Relative tolerance (default from config)
        #[arg(short, long)]
        tolerance: Option<f64>,

        /// Print the report as JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as TOML
    ShowConfig,

    /// Print Type I output multipliers as JSON
    Multipliers {
        /// Model snapshot (JSON)
        #[arg(short, long)]
        model: PathBuf,
    },
}

/// Scenario as stored on disk; the model version is assigned at load time.
#[derive(Deserialize)]
struct ScenarioFile {
    #[serde(default)]
    name: String,
    schedule: ShockSchedule,
    #[serde(default)]
    shock_mode: Option<ShockMode>,
    #[serde(default)]
    sensitivity_multipliers: Vec<f64>,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

fn read_optional<T: DeserializeOwned>(path: Option<&PathBuf>) -> Result<Option<T>> {
    path.map(|p| read_json(p)).transpose()
}

fn write_output(output: Option<&Path>, body: &str) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, body)
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            println!("{body}");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let cfg = Config::load_from(&cli.config)?;
    let store = Arc::new(ModelStore::new());

    match cli.command {
        Commands::Run {
            model,
            scenario,
            coefficients,
            constraints,
            workforce,
            output,
        } => {
            let snapshot: ModelSnapshot = read_json(&model)?;
            let version = store
                .register(snapshot, model.display().to_string())
                .context("model snapshot rejected")?;
            let file: ScenarioFile = read_json(&scenario)?;

            let mut scenario = Scenario::new(version.model_version_id, file.schedule);
            scenario.name = file.name;
            scenario.shock_mode = file.shock_mode;
            scenario.sensitivity_multipliers = file.sensitivity_multipliers;

            let request = RunRequest {
                scenario,
                coefficients: read_optional::<SatelliteCoefficients>(coefficients.as_ref())?,
                constraints: read_optional::<ConstraintSet>(constraints.as_ref())?,
                workforce: read_optional::<WorkforceInputs>(workforce.as_ref())?,
            };

            let runner = Arc::new(ImpactRunner::new(&cfg, store));
            let result = run_blocking(runner, request).await.context("run failed")?;
            info!(run_id = %result.snapshot.run_id, years = result.result_sets.len(), "run finished");
            write_output(output.as_deref(), &serde_json::to_string_pretty(&result)?)?;
        }
        Commands::Benchmark {
            model,
            reference,
            tolerance,
            json,
        } => {
            let snapshot: ModelSnapshot = read_json(&model)?;
            let version = store.register(snapshot, model.display().to_string())?;
            let runner = ImpactRunner::new(&cfg, store.clone());
            let registered = store.get(version.model_version_id)?;
            let computed = runner.leontief().output_multipliers(&registered)?;

            let benchmark = BenchmarkValidator::load_benchmark_from_file(&reference)
                .with_context(|| format!("failed to load benchmark {}", reference.display()))?;
            let validator = match tolerance {
                Some(t) => BenchmarkValidator::with_tolerance(t),
                None => BenchmarkValidator::new(&cfg.benchmark),
            };
            let computed: BTreeMap<String, f64> = computed.iter().map(|(k, v)| (k.to_string(), v)).collect();
            let report = validator.validate(&computed, &benchmark);

            let body = if json {
                serde_json::to_string_pretty(&report)?
            } else {
                BenchmarkValidator::format_report(&report)
            };
            write_output(None, &body)?;
            if !report.overall_pass {
                std::process::exit(2);
            }
        }
        Commands::ShowConfig => {
            let body = toml::to_string_pretty(&cfg).context("failed to render configuration")?;
            write_output(None, &body)?;
        }
        Commands::Multipliers { model } => {
            let snapshot: ModelSnapshot = read_json(&model)?;
            let version = store.register(snapshot, model.display().to_string())?;
            let runner = ImpactRunner::new(&cfg, store.clone());
            let registered = store.get(version.model_version_id)?;
            let multipliers = runner.leontief().output_multipliers(&registered)?;
            write_output(None, &serde_json::to_string_pretty(&multipliers)?)?;
        }
    }

    Ok(())
}

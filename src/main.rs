use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use pit_strategy_eval::config::{LapTimeSource, ModelErrorPolicy, RunConfig};

/// Estimate the race time a model-predicted pit strategy would have gained
/// or lost against the strategy actually raced.
#[derive(Debug, Parser)]
#[command(name = "pit-eval", version)]
struct Args {
    /// JSON run config; flags and env vars override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding pitstop_classifier, pitlap1_regressor and pitlap2_regressor
    #[arg(long, env = "MODELS_DIR")]
    models_dir: Option<PathBuf>,

    /// Race table (JSON array, or JSON Lines with a .jsonl extension)
    #[arg(long, env = "RACES_PATH")]
    races: Option<PathBuf>,

    /// Output CSV path [default: results/deltaT.csv]
    #[arg(long, env = "OUT_CSV")]
    out: Option<PathBuf>,

    /// Scenarios sampled per race [default: 200]
    #[arg(long)]
    scenarios: Option<usize>,

    /// Base seed; race i uses seed + i [default: 42]
    #[arg(long)]
    seed: Option<u64>,

    /// Expected safety-car periods per race [default: 0.5]
    #[arg(long)]
    sc_rate: Option<f64>,

    /// Laps neutralised by each safety car [default: 4]
    #[arg(long)]
    sc_laps: Option<u32>,

    /// Pit delta multiplier for stops under a safety car [default: 1.0]
    #[arg(long)]
    sc_pit_factor: Option<f64>,

    /// Lap-time predictor [default: safety-car-pace]
    #[arg(long, value_enum)]
    lap_time: Option<LapTimeSource>,

    /// Green-flag lap time in seconds for the constant and pace predictors [default: 90]
    #[arg(long)]
    base_lap_time: Option<f64>,

    /// Lap time multiplier under a safety car for the pace predictor [default: 1.4]
    #[arg(long)]
    sc_pace_factor: Option<f64>,

    /// Worker threads, 0 for one per core [default: 0]
    #[arg(long)]
    threads: Option<usize>,

    /// Races whose features do not fit the models [default: abort]
    #[arg(long, value_enum)]
    on_model_error: Option<ModelErrorPolicy>,
}

impl Args {
    fn into_config(self) -> Result<RunConfig> {
        let mut cfg = match &self.config {
            Some(path) => RunConfig::load(path)?,
            None => RunConfig::default(),
        };
        if let Some(v) = self.models_dir {
            cfg.models_dir = v;
        }
        if let Some(v) = self.races {
            cfg.races_path = v;
        }
        if let Some(v) = self.out {
            cfg.out_csv = v;
        }
        if let Some(v) = self.scenarios {
            cfg.scenarios_per_race = v;
        }
        if let Some(v) = self.seed {
            cfg.seed = v;
        }
        if let Some(v) = self.sc_rate {
            cfg.safety_car_rate = v;
        }
        if let Some(v) = self.sc_laps {
            cfg.sc_duration_laps = v;
        }
        if let Some(v) = self.sc_pit_factor {
            cfg.sc_pit_factor = v;
        }
        if let Some(v) = self.lap_time {
            cfg.lap_time_model = v;
        }
        if let Some(v) = self.base_lap_time {
            cfg.base_lap_time = v;
        }
        if let Some(v) = self.sc_pace_factor {
            cfg.safety_car_pace_factor = v;
        }
        if let Some(v) = self.threads {
            cfg.threads = v;
        }
        if let Some(v) = self.on_model_error {
            cfg.on_model_error = v;
        }
        Ok(cfg)
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut cfg = Args::parse().into_config()?;
    // LOG_RACES=1 turns on per-race detail lines.
    if std::env::var("LOG_RACES").ok().as_deref() == Some("1") {
        cfg.log_races = true;
    }
    tracing::info!(
        "races={} models={} scenarios={} seed={} sc_rate={}",
        cfg.races_path.display(),
        cfg.models_dir.display(),
        cfg.scenarios_per_race,
        cfg.seed,
        cfg.safety_car_rate
    );

    let rows = pit_strategy_eval::run(&cfg)?;
    let mean = if rows.is_empty() {
        0.0
    } else {
        rows.iter().map(|r| r.mean_delta_t).sum::<f64>() / rows.len() as f64
    };
    tracing::info!(
        "wrote deltaT results to {} ({} races, mean deltaT {:.3}s)",
        cfg.out_csv.display(),
        rows.len(),
        mean
    );
    Ok(())
}

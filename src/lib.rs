//! Monte Carlo evaluation of model-predicted pit strategies against the
//! strategies actually raced, under random safety-car interruptions.

pub mod config;
pub mod error;
pub mod evaluator;
pub mod input;
pub mod model;
pub mod orchestrator;
pub mod predictor;
pub mod scenario;
pub mod stats;
pub mod strategy;
pub mod types;
pub mod writer;

use anyhow::{Context, Result};
use std::sync::Arc;

use config::{LapTimeSource, RunConfig};
use model::{load_model, ModelSet, LAP_TIME_STEM};
use orchestrator::Orchestrator;
use predictor::{ConstantLapTime, LapTimePredictor, ModelLapTime, SafetyCarPace};
use types::RaceAggregate;

/// Lap-time predictor selected by the run configuration.
pub fn build_predictor(cfg: &RunConfig) -> Result<Arc<dyn LapTimePredictor>> {
    let predictor: Arc<dyn LapTimePredictor> = match cfg.lap_time_model {
        LapTimeSource::Constant => Arc::new(ConstantLapTime(cfg.base_lap_time)),
        LapTimeSource::SafetyCarPace => Arc::new(SafetyCarPace {
            base: cfg.base_lap_time,
            safety_car_factor: cfg.safety_car_pace_factor,
        }),
        LapTimeSource::Model => {
            let m = load_model(&cfg.models_dir, LAP_TIME_STEM)?;
            Arc::new(ModelLapTime::new(m)?)
        }
    };
    Ok(predictor)
}

/// Load inputs and models, evaluate every race and write the results table.
pub fn run(cfg: &RunConfig) -> Result<Vec<RaceAggregate>> {
    cfg.validate()?;
    let races = input::load_races(&cfg.races_path)?;
    let models = ModelSet::load(&cfg.models_dir)
        .with_context(|| format!("failed to load models from {}", cfg.models_dir.display()))?;
    let predictor = build_predictor(cfg)?;
    let orch = Orchestrator::from_config(cfg, models, predictor)?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(cfg.threads)
        .build()
        .context("failed to build worker pool")?;
    let rows = pool.install(|| orch.run(&races, cfg.scenarios_per_race, cfg.seed))?;

    writer::write_csv(&cfg.out_csv, &rows)?;
    Ok(rows)
}

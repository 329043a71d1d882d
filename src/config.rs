use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::ConfigError;
use crate::evaluator::DEFAULT_SC_DURATION_LAPS;
use crate::predictor::{DEFAULT_BASE_LAP_TIME, DEFAULT_SAFETY_CAR_PACE_FACTOR};
use crate::scenario::{DEFAULT_SAFETY_CAR_RATE, MAX_SAFETY_CAR_RATE};

pub const DEFAULT_SCENARIOS_PER_RACE: usize = 200;
pub const DEFAULT_SEED: u64 = 42;

/// Which lap-time predictor drives the simulation.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LapTimeSource {
    /// `base_lap_time` on every lap.
    Constant,
    /// `base_lap_time`, slowed by `safety_car_pace_factor` under a safety car.
    #[default]
    SafetyCarPace,
    /// `lap_time_regressor` artifact from the models directory.
    Model,
}

/// What to do with a race whose features do not fit the models.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ModelErrorPolicy {
    /// Fail the run before any simulation starts.
    #[default]
    Abort,
    /// Log the race and leave it out of the output.
    Skip,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    pub models_dir: PathBuf,
    pub races_path: PathBuf,
    pub out_csv: PathBuf,
    pub scenarios_per_race: usize,
    pub seed: u64,
    /// Expected safety-car periods per race (Poisson rate).
    pub safety_car_rate: f64,
    pub sc_duration_laps: u32,
    /// Pit delta multiplier for stops under a safety car.
    pub sc_pit_factor: f64,
    pub lap_time_model: LapTimeSource,
    pub base_lap_time: f64,
    pub safety_car_pace_factor: f64,
    /// Worker threads; 0 lets rayon decide.
    pub threads: usize,
    pub on_model_error: ModelErrorPolicy,
    /// Log strategies and deltaT statistics for every race.
    pub log_races: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("models"),
            races_path: PathBuf::from("data/races.json"),
            out_csv: PathBuf::from("results/deltaT.csv"),
            scenarios_per_race: DEFAULT_SCENARIOS_PER_RACE,
            seed: DEFAULT_SEED,
            safety_car_rate: DEFAULT_SAFETY_CAR_RATE,
            sc_duration_laps: DEFAULT_SC_DURATION_LAPS,
            sc_pit_factor: 1.0,
            lap_time_model: LapTimeSource::default(),
            base_lap_time: DEFAULT_BASE_LAP_TIME,
            safety_car_pace_factor: DEFAULT_SAFETY_CAR_PACE_FACTOR,
            threads: 0,
            on_model_error: ModelErrorPolicy::default(),
            log_races: false,
        }
    }
}

impl RunConfig {
    /// Read a JSON config file; missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&data).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid =
            |field: &'static str, reason: String| ConfigError::InvalidParameter { field, reason };
        if self.scenarios_per_race == 0 {
            return Err(invalid("scenarios_per_race", "must be at least 1".into()));
        }
        if !self.safety_car_rate.is_finite()
            || !(0.0..=MAX_SAFETY_CAR_RATE).contains(&self.safety_car_rate)
        {
            return Err(invalid(
                "safety_car_rate",
                format!(
                    "must be within [0, {MAX_SAFETY_CAR_RATE}] (got {})",
                    self.safety_car_rate
                ),
            ));
        }
        if self.sc_duration_laps == 0 {
            return Err(invalid("sc_duration_laps", "must be at least 1".into()));
        }
        if !self.sc_pit_factor.is_finite() || self.sc_pit_factor < 0.0 {
            return Err(invalid(
                "sc_pit_factor",
                format!("must be finite and non-negative (got {})", self.sc_pit_factor),
            ));
        }
        if !self.base_lap_time.is_finite() || self.base_lap_time < 0.0 {
            return Err(invalid(
                "base_lap_time",
                format!("must be finite and non-negative (got {})", self.base_lap_time),
            ));
        }
        if !self.safety_car_pace_factor.is_finite() || self.safety_car_pace_factor < 0.0 {
            return Err(invalid(
                "safety_car_pace_factor",
                format!(
                    "must be finite and non-negative (got {})",
                    self.safety_car_pace_factor
                ),
            ));
        }
        Ok(())
    }
}

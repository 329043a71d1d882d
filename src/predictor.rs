//! Lap-time prediction capability consumed by the evaluator.
//!
//! Safety-car state reaches a predictor only through [`LapContext`]: a
//! period starting at lap `s` neutralises laps `s ..= s + duration - 1`.

use std::sync::Arc;

use crate::model::RaceModel;
use crate::types::Scenario;

/// Number of features in [`LapContext::features`].
pub const LAP_FEATURE_DIM: usize = 4;

pub const DEFAULT_BASE_LAP_TIME: f64 = 90.0;
pub const DEFAULT_SAFETY_CAR_PACE_FACTOR: f64 = 1.4;

/// What a predictor may know about one lap of one simulated race.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LapContext {
    pub lap: u32,
    pub race_length: u32,
    /// Lap is inside at least one safety-car window.
    pub safety_car: bool,
    /// Number of overlapping safety-car windows on this lap.
    pub safety_car_intensity: u32,
    /// Laps since the latest covering safety car began; 0 on green laps.
    pub laps_into_safety_car: u32,
}

impl LapContext {
    pub fn new(lap: u32, race_length: u32, scenario: &Scenario, sc_duration_laps: u32) -> Self {
        let intensity = scenario.intensity_at(lap, sc_duration_laps);
        Self {
            lap,
            race_length,
            safety_car: intensity > 0,
            safety_car_intensity: intensity,
            laps_into_safety_car: scenario.laps_into(lap, sc_duration_laps),
        }
    }

    /// Feature row handed to a model-backed predictor:
    /// `[lap, lap / race_length, safety_car (0/1), intensity]`.
    pub fn features(&self) -> [f64; LAP_FEATURE_DIM] {
        let progress = if self.race_length == 0 {
            0.0
        } else {
            f64::from(self.lap) / f64::from(self.race_length)
        };
        [
            f64::from(self.lap),
            progress,
            if self.safety_car { 1.0 } else { 0.0 },
            f64::from(self.safety_car_intensity),
        ]
    }
}

pub trait LapTimePredictor: Send + Sync {
    /// Expected duration of `ctx.lap` in seconds. Implementations return a
    /// finite, non-negative value.
    fn predict(&self, ctx: &LapContext) -> f64;
}

/// Same lap time regardless of lap or safety-car state.
#[derive(Debug, Clone, Copy)]
pub struct ConstantLapTime(pub f64);

impl LapTimePredictor for ConstantLapTime {
    fn predict(&self, _ctx: &LapContext) -> f64 {
        self.0
    }
}

/// Green laps at `base`, neutralised laps slowed by `safety_car_factor`.
#[derive(Debug, Clone, Copy)]
pub struct SafetyCarPace {
    pub base: f64,
    pub safety_car_factor: f64,
}

impl Default for SafetyCarPace {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE_LAP_TIME,
            safety_car_factor: DEFAULT_SAFETY_CAR_PACE_FACTOR,
        }
    }
}

impl LapTimePredictor for SafetyCarPace {
    fn predict(&self, ctx: &LapContext) -> f64 {
        if ctx.safety_car {
            self.base * self.safety_car_factor
        } else {
            self.base
        }
    }
}

/// Trained lap-time regressor fed [`LapContext::features`].
pub struct ModelLapTime {
    model: Arc<dyn RaceModel>,
}

impl ModelLapTime {
    pub fn new(model: Arc<dyn RaceModel>) -> Result<Self, crate::error::ModelError> {
        if model.in_dim() != LAP_FEATURE_DIM {
            return Err(crate::error::ModelError::FeatureLength {
                model: model.name().to_string(),
                got: LAP_FEATURE_DIM,
                expected: model.in_dim(),
            });
        }
        Ok(Self { model })
    }
}

impl LapTimePredictor for ModelLapTime {
    fn predict(&self, ctx: &LapContext) -> f64 {
        match self.model.predict(&ctx.features()) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!("lap {} prediction failed: {}", ctx.lap, e);
                f64::NAN
            }
        }
    }
}

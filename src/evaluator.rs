//! Lap-by-lap race simulation under two pit strategies sharing one pace.

use crate::predictor::{LapContext, LapTimePredictor};
use crate::types::{Scenario, SimulationResult, Strategy};

/// Laps neutralised by each safety car, counting its start lap.
pub const DEFAULT_SC_DURATION_LAPS: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluator {
    pub sc_duration_laps: u32,
    /// Multiplier on the pit delta for a stop made under a safety car.
    /// 1.0 charges the full delta everywhere.
    pub sc_pit_factor: f64,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self {
            sc_duration_laps: DEFAULT_SC_DURATION_LAPS,
            sc_pit_factor: 1.0,
        }
    }
}

impl Evaluator {
    /// Total race time for the model and baseline strategies in `scenario`.
    pub fn evaluate(
        &self,
        model: &Strategy,
        baseline: &Strategy,
        scenario: &Scenario,
        predictor: &dyn LapTimePredictor,
        pit_delta: f64,
        race_length: u32,
    ) -> SimulationResult {
        let mut model_total = 0.0;
        let mut baseline_total = 0.0;

        for lap in 1..=race_length {
            let ctx = LapContext::new(lap, race_length, scenario, self.sc_duration_laps);
            let lap_t = sanitize(predictor.predict(&ctx), lap);
            model_total += lap_t;
            baseline_total += lap_t;

            let stop_cost = if ctx.safety_car {
                pit_delta * self.sc_pit_factor
            } else {
                pit_delta
            };
            if model.pits_on(lap) {
                model_total += stop_cost;
            }
            if baseline.pits_on(lap) {
                baseline_total += stop_cost;
            }
        }

        SimulationResult {
            model_total,
            baseline_total,
        }
    }
}

fn sanitize(t: f64, lap: u32) -> f64 {
    if t.is_finite() && t >= 0.0 {
        t
    } else {
        tracing::warn!("lap {}: predictor returned {}, using 0.0", lap, t);
        0.0
    }
}

/// [`Evaluator::evaluate`] with default safety-car settings.
pub fn evaluate(
    model: &Strategy,
    baseline: &Strategy,
    scenario: &Scenario,
    predictor: &dyn LapTimePredictor,
    pit_delta: f64,
    race_length: u32,
) -> SimulationResult {
    Evaluator::default().evaluate(model, baseline, scenario, predictor, pit_delta, race_length)
}

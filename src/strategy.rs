//! Baseline and model-derived pit strategies for a race.

use crate::error::{ConfigError, ModelError};
use crate::input::validate_race;
use crate::model::ModelSet;
use crate::types::{Race, Strategy};

/// The strategy the race was actually run with. Rejects an invalid record.
pub fn baseline_strategy(race: &Race) -> Result<Strategy, ConfigError> {
    validate_race(race)?;
    Ok(Strategy::new(race.actual_pit_laps.clone()))
}

/// Truncate a regressor output toward zero and clamp it into the race.
pub fn clamp_lap(predicted: f64, total_laps: u32) -> u32 {
    let lap = predicted.trunc();
    if lap.is_nan() || lap < 1.0 {
        1
    } else if lap >= f64::from(total_laps) {
        total_laps
    } else {
        lap as u32
    }
}

/// Make a two-stop plan strictly increasing inside `[1, total_laps]`.
/// Returns a single lap when the race is too short for two stops.
pub fn order_two_stop(first: u32, second: u32, total_laps: u32) -> Vec<u32> {
    if total_laps < 2 {
        return vec![first.min(second).max(1)];
    }
    let (mut a, mut b) = (first.min(second), first.max(second));
    if a == b {
        if b < total_laps {
            b += 1;
        } else {
            a -= 1;
        }
    }
    vec![a, b]
}

/// Stop count from a classifier label: one stop only for label 1, two
/// stops for every other label (0 included).
pub fn stop_count(label: f64) -> usize {
    if label.round() == 1.0 {
        1
    } else {
        2
    }
}

/// Strategy implied by the fitted models for this race.
pub fn model_strategy(race: &Race, models: &ModelSet) -> Result<Strategy, ModelError> {
    let x = &race.feature_vector;
    let label = models.classifier.predict(x)?;
    let laps = match stop_count(label) {
        1 => vec![clamp_lap(models.first_stop.predict(x)?, race.total_laps)],
        _ => {
            let first = clamp_lap(models.first_stop.predict(x)?, race.total_laps);
            let second = clamp_lap(models.second_stop.predict(x)?, race.total_laps);
            order_two_stop(first, second, race.total_laps)
        }
    };
    Ok(Strategy::new(laps))
}

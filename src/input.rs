//! Race table loading. JSON array, or JSON Lines for `.jsonl` files.

use std::{collections::HashSet, fs, path::Path};

use crate::error::ConfigError;
use crate::types::Race;

pub fn load_races(path: &Path) -> Result<Vec<Race>, ConfigError> {
    let name = path.display().to_string();
    let txt = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: name.clone(),
        reason: e.to_string(),
    })?;
    let races = if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
        parse_lines(&name, &txt)?
    } else {
        serde_json::from_str(&txt).map_err(|e| ConfigError::Parse {
            path: name.clone(),
            reason: e.to_string(),
        })?
    };
    validate_races(&races)?;
    tracing::info!("loaded {} races from {}", races.len(), name);
    Ok(races)
}

fn parse_lines(name: &str, txt: &str) -> Result<Vec<Race>, ConfigError> {
    txt.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|e| ConfigError::Parse {
                path: format!("{name}:{}", i + 1),
                reason: e.to_string(),
            })
        })
        .collect()
}

/// Record-level checks that hold before any model or sampler is touched.
pub fn validate_races(races: &[Race]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for race in races {
        if !seen.insert(race.race_id.as_str()) {
            return Err(ConfigError::DuplicateRace {
                race_id: race.race_id.clone(),
            });
        }
        validate_race(race)?;
    }
    Ok(())
}

pub fn validate_race(race: &Race) -> Result<(), ConfigError> {
    if race.total_laps == 0 {
        return Err(ConfigError::NonPositiveRaceLength {
            race_id: race.race_id.clone(),
        });
    }
    if !race.pit_delta.is_finite() || race.pit_delta < 0.0 {
        return Err(ConfigError::InvalidPitDelta {
            race_id: race.race_id.clone(),
            value: race.pit_delta,
        });
    }
    if race.feature_vector.is_empty() {
        return Err(ConfigError::EmptyFeatures {
            race_id: race.race_id.clone(),
        });
    }
    if let Some(&lap) = race
        .actual_pit_laps
        .iter()
        .find(|&&l| l == 0 || l > race.total_laps)
    {
        return Err(ConfigError::PitLapOutOfRange {
            race_id: race.race_id.clone(),
            lap,
            total_laps: race.total_laps,
        });
    }
    Ok(())
}

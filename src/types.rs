use serde::{Deserialize, Serialize};

/// One row of the input table. Read-only once loaded.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Race {
    pub race_id: String,
    pub total_laps: u32,
    #[serde(default)]
    pub actual_pit_laps: Vec<u32>,
    pub feature_vector: Vec<f64>,
    pub pit_delta: f64,
}

/// Ordered, deduplicated pit laps (1-based).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Strategy {
    laps: Vec<u32>,
}

impl Strategy {
    pub fn new(mut laps: Vec<u32>) -> Self {
        laps.sort_unstable();
        laps.dedup();
        Self { laps }
    }

    pub fn laps(&self) -> &[u32] {
        &self.laps
    }

    pub fn stops(&self) -> usize {
        self.laps.len()
    }

    pub fn pits_on(&self, lap: u32) -> bool {
        self.laps.binary_search(&lap).is_ok()
    }
}

/// Safety-car start laps for one simulated race, ascending. Empty when the
/// race runs green throughout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Scenario {
    starts: Vec<u32>,
}

impl Scenario {
    pub fn new(mut starts: Vec<u32>) -> Self {
        starts.sort_unstable();
        Self { starts }
    }

    pub fn green() -> Self {
        Self::default()
    }

    pub fn starts(&self) -> &[u32] {
        &self.starts
    }

    pub fn is_green(&self) -> bool {
        self.starts.is_empty()
    }

    /// Number of safety-car periods covering `lap` when each lasts
    /// `duration` laps from its start.
    pub fn intensity_at(&self, lap: u32, duration: u32) -> u32 {
        let duration = duration.max(1);
        self.starts
            .iter()
            .filter(|&&s| s <= lap && lap < s.saturating_add(duration))
            .count() as u32
    }

    /// Laps since the most recent covering safety car began, 0 if green.
    pub fn laps_into(&self, lap: u32, duration: u32) -> u32 {
        let duration = duration.max(1);
        self.starts
            .iter()
            .rev()
            .find(|&&s| s <= lap && lap < s.saturating_add(duration))
            .map(|&s| lap - s)
            .unwrap_or(0)
    }
}

/// Race totals under both strategies for one scenario.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimulationResult {
    pub model_total: f64,
    pub baseline_total: f64,
}

impl SimulationResult {
    /// Positive when the model strategy is faster.
    pub fn delta_t(&self) -> f64 {
        self.baseline_total - self.model_total
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceAggregate {
    pub race_id: String,
    pub predicted_stops: usize,
    pub actual_stops: usize,
    pub mean_delta_t: f64,
    pub std_delta_t: f64,
    pub median_delta_t: f64,
}

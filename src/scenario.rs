//! Safety-car scenario sampling.
//!
//! Each draw picks a Poisson number of safety-car periods, then places each
//! one uniformly over the race (with replacement). Scenario `i` of a set is
//! drawn from its own ChaCha8 stream keyed by `(seed, i)`, so the set is
//! identical whether it is built sequentially or across the rayon pool.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Poisson};
use rayon::prelude::*;

use crate::error::SamplingError;
use crate::types::Scenario;

/// Historical average number of safety-car periods per race.
pub const DEFAULT_SAFETY_CAR_RATE: f64 = 0.5;

/// Upper bound on the Poisson rate; each drawn period costs one lap entry.
pub const MAX_SAFETY_CAR_RATE: f64 = 20.0;

#[derive(Debug, Clone)]
pub struct ScenarioSampler {
    rate: f64,
    poisson: Option<Poisson<f64>>,
}

impl ScenarioSampler {
    pub fn new(rate: f64) -> Result<Self, SamplingError> {
        let invalid = || SamplingError::InvalidRate {
            rate,
            max: MAX_SAFETY_CAR_RATE,
        };
        if !rate.is_finite() || !(0.0..=MAX_SAFETY_CAR_RATE).contains(&rate) {
            return Err(invalid());
        }
        // Poisson rejects a zero rate; that case always yields green races.
        let poisson = if rate > 0.0 {
            Some(Poisson::new(rate).map_err(|_| invalid())?)
        } else {
            None
        };
        Ok(Self { rate, poisson })
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Draw `count` scenarios for a race of `race_length` laps.
    pub fn sample_scenarios(
        &self,
        count: usize,
        race_length: u32,
        seed: u64,
    ) -> Result<Vec<Scenario>, SamplingError> {
        if race_length == 0 {
            return Err(SamplingError::NonPositiveRaceLength);
        }
        Ok((0..count)
            .into_par_iter()
            .map(|i| self.draw(race_length, seed, i as u64))
            .collect())
    }

    /// Draw the `index`-th scenario of the set keyed by `seed`.
    pub fn draw(&self, race_length: u32, seed: u64, index: u64) -> Scenario {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(index);

        let k = match &self.poisson {
            Some(p) => p.sample(&mut rng) as usize,
            None => 0,
        };
        if k == 0 {
            return Scenario::green();
        }
        let starts = (0..k).map(|_| rng.gen_range(1..=race_length)).collect();
        Scenario::new(starts)
    }
}

impl Default for ScenarioSampler {
    fn default() -> Self {
        Self {
            rate: DEFAULT_SAFETY_CAR_RATE,
            poisson: Poisson::new(DEFAULT_SAFETY_CAR_RATE).ok(),
        }
    }
}

/// Seed for the race at `race_index` under a run-level `base_seed`.
pub fn race_seed(base_seed: u64, race_index: usize) -> u64 {
    base_seed.wrapping_add(race_index as u64)
}

/// Convenience wrapper using the default safety-car rate.
pub fn sample_scenarios(
    count: usize,
    race_length: u32,
    seed: u64,
) -> Result<Vec<Scenario>, SamplingError> {
    ScenarioSampler::default().sample_scenarios(count, race_length, seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_scenarios() {
        let a = sample_scenarios(500, 52, 42).unwrap();
        let b = sample_scenarios(500, 52, 42).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_differ() {
        let a = sample_scenarios(500, 52, 42).unwrap();
        let b = sample_scenarios(500, 52, 43).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn laps_sorted_and_in_range() {
        let sampler = ScenarioSampler::new(3.0).unwrap();
        for sc in sampler.sample_scenarios(1000, 20, 7).unwrap() {
            let starts = sc.starts();
            assert!(starts.windows(2).all(|w| w[0] <= w[1]));
            assert!(starts.iter().all(|&l| (1..=20).contains(&l)));
        }
    }

    #[test]
    fn parallel_matches_sequential_draws() {
        let sampler = ScenarioSampler::new(1.5).unwrap();
        let set = sampler.sample_scenarios(64, 58, 9).unwrap();
        for (i, sc) in set.iter().enumerate() {
            assert_eq!(sc, &sampler.draw(58, 9, i as u64));
        }
    }

    #[test]
    fn mean_count_tracks_rate() {
        let sampler = ScenarioSampler::new(0.5).unwrap();
        let set = sampler.sample_scenarios(20_000, 52, 1).unwrap();
        let mean = set.iter().map(|s| s.starts().len()).sum::<usize>() as f64 / set.len() as f64;
        assert!((mean - 0.5).abs() < 0.05, "mean count {mean}");
        assert!(set.iter().any(Scenario::is_green));
    }

    #[test]
    fn zero_rate_is_always_green() {
        let sampler = ScenarioSampler::new(0.0).unwrap();
        let set = sampler.sample_scenarios(100, 52, 3).unwrap();
        assert!(set.iter().all(Scenario::is_green));
    }

    #[test]
    fn rejects_bad_parameters() {
        assert_eq!(
            sample_scenarios(10, 0, 1),
            Err(SamplingError::NonPositiveRaceLength)
        );
        assert!(matches!(
            ScenarioSampler::new(-1.0),
            Err(SamplingError::InvalidRate { .. })
        ));
        assert!(matches!(
            ScenarioSampler::new(f64::NAN),
            Err(SamplingError::InvalidRate { .. })
        ));
    }

    #[test]
    fn rejects_runaway_rate() {
        assert!(ScenarioSampler::new(MAX_SAFETY_CAR_RATE).is_ok());
        assert_eq!(
            ScenarioSampler::new(1e9).unwrap_err(),
            SamplingError::InvalidRate {
                rate: 1e9,
                max: MAX_SAFETY_CAR_RATE
            }
        );
    }

    #[test]
    fn zero_count_is_empty() {
        assert!(sample_scenarios(0, 52, 1).unwrap().is_empty());
    }

    #[test]
    fn race_seeds_are_distinct() {
        assert_ne!(race_seed(42, 0), race_seed(42, 1));
        assert_eq!(race_seed(u64::MAX, 1), 0);
    }
}

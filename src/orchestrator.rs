//! Per-race Monte Carlo evaluation of model versus baseline pit strategies.
//!
//! A run has two phases. Preparation walks the races in order, validates
//! each record and derives both strategies; any error there stops the run
//! before a single lap is simulated (or drops the race, under
//! [`ModelErrorPolicy::Skip`]). Simulation then fans races and their
//! scenarios out over the rayon pool. Every scenario's random draws depend
//! only on `(seed + race index, scenario index)`, and the collected
//! aggregates keep input order, so the output is independent of scheduling.

use rayon::prelude::*;
use std::sync::Arc;

use crate::config::{ModelErrorPolicy, RunConfig};
use crate::error::{EvalError, SamplingError};
use crate::evaluator::Evaluator;
use crate::model::ModelSet;
use crate::predictor::LapTimePredictor;
use crate::scenario::{race_seed, ScenarioSampler};
use crate::stats::Summary;
use crate::strategy::{baseline_strategy, model_strategy};
use crate::types::{Race, RaceAggregate, Strategy};

/// A race that passed preparation, with both strategies fixed.
#[derive(Debug, Clone)]
pub struct RacePlan<'a> {
    pub index: usize,
    pub race: &'a Race,
    pub baseline: Strategy,
    pub model: Strategy,
}

pub struct Orchestrator {
    models: ModelSet,
    predictor: Arc<dyn LapTimePredictor>,
    sampler: ScenarioSampler,
    evaluator: Evaluator,
    policy: ModelErrorPolicy,
    log_races: bool,
}

impl Orchestrator {
    pub fn new(models: ModelSet, predictor: Arc<dyn LapTimePredictor>) -> Self {
        Self {
            models,
            predictor,
            sampler: ScenarioSampler::default(),
            evaluator: Evaluator::default(),
            policy: ModelErrorPolicy::default(),
            log_races: false,
        }
    }

    pub fn from_config(
        cfg: &RunConfig,
        models: ModelSet,
        predictor: Arc<dyn LapTimePredictor>,
    ) -> Result<Self, SamplingError> {
        Ok(Self::new(models, predictor)
            .with_sampler(ScenarioSampler::new(cfg.safety_car_rate)?)
            .with_evaluator(Evaluator {
                sc_duration_laps: cfg.sc_duration_laps,
                sc_pit_factor: cfg.sc_pit_factor,
            })
            .with_policy(cfg.on_model_error)
            .with_race_log(cfg.log_races))
    }

    pub fn with_sampler(mut self, sampler: ScenarioSampler) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_evaluator(mut self, evaluator: Evaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_policy(mut self, policy: ModelErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Log each race's strategies and deltaT statistics at info level.
    pub fn with_race_log(mut self, enabled: bool) -> Self {
        self.log_races = enabled;
        self
    }

    /// Evaluate every race and return one aggregate per surviving race,
    /// in input order.
    pub fn run(
        &self,
        races: &[Race],
        scenarios_per_race: usize,
        seed: u64,
    ) -> Result<Vec<RaceAggregate>, EvalError> {
        if scenarios_per_race == 0 {
            return Err(EvalError::Run(SamplingError::NoScenarios));
        }
        let plans = self.prepare(races)?;
        tracing::info!(
            "simulating {} races x {} scenarios (seed {})",
            plans.len(),
            scenarios_per_race,
            seed
        );

        plans
            .par_iter()
            .map(|plan| {
                let agg = self
                    .aggregate(plan, scenarios_per_race, seed)
                    .map_err(|source| EvalError::Sampling {
                        race_id: plan.race.race_id.clone(),
                        source,
                    })?;
                if self.log_races {
                    tracing::info!(
                        "race={} model={:?} baseline={:?} mean={:.3} std={:.3} median={:.3}",
                        agg.race_id,
                        plan.model.laps(),
                        plan.baseline.laps(),
                        agg.mean_delta_t,
                        agg.std_delta_t,
                        agg.median_delta_t
                    );
                }
                Ok(agg)
            })
            .collect()
    }

    /// Validate records and derive strategies for every race, in order.
    pub fn prepare<'a>(&self, races: &'a [Race]) -> Result<Vec<RacePlan<'a>>, EvalError> {
        let mut plans = Vec::with_capacity(races.len());
        for (index, race) in races.iter().enumerate() {
            let baseline = baseline_strategy(race)?;
            let derived = self
                .models
                .check(&race.feature_vector)
                .and_then(|()| model_strategy(race, &self.models));
            let model = match (derived, self.policy) {
                (Ok(s), _) => s,
                (Err(source), ModelErrorPolicy::Abort) => {
                    return Err(EvalError::Model {
                        race_id: race.race_id.clone(),
                        source,
                    })
                }
                (Err(e), ModelErrorPolicy::Skip) => {
                    tracing::warn!("skipping race {}: {}", race.race_id, e);
                    continue;
                }
            };
            tracing::debug!(
                "race {}: model {:?} baseline {:?}",
                race.race_id,
                model.laps(),
                baseline.laps()
            );
            plans.push(RacePlan {
                index,
                race,
                baseline,
                model,
            });
        }
        Ok(plans)
    }

    /// Sample scenarios for one planned race and reduce its deltaT samples.
    pub fn aggregate(
        &self,
        plan: &RacePlan<'_>,
        scenarios_per_race: usize,
        seed: u64,
    ) -> Result<RaceAggregate, SamplingError> {
        let race = plan.race;
        let scenarios = self.sampler.sample_scenarios(
            scenarios_per_race,
            race.total_laps,
            race_seed(seed, plan.index),
        )?;

        let mut deltas: Vec<f64> = scenarios
            .par_iter()
            .map(|sc| {
                self.evaluator
                    .evaluate(
                        &plan.model,
                        &plan.baseline,
                        sc,
                        self.predictor.as_ref(),
                        race.pit_delta,
                        race.total_laps,
                    )
                    .delta_t()
            })
            .collect();

        let summary = Summary::from_samples(&mut deltas).ok_or(SamplingError::NoScenarios)?;
        Ok(RaceAggregate {
            race_id: race.race_id.clone(),
            predicted_stops: plan.model.stops(),
            actual_stops: plan.baseline.stops(),
            mean_delta_t: summary.mean,
            std_delta_t: summary.std_dev,
            median_delta_t: summary.median,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::model::LinearModel;
    use crate::predictor::{ConstantLapTime, SafetyCarPace};

    fn models(stops: f64, lap1: f64, lap2: f64) -> ModelSet {
        ModelSet {
            classifier: Arc::new(LinearModel::classifier(
                "clf",
                vec![stops],
                vec![vec![0.0, 0.0]],
                vec![0.0],
            )),
            first_stop: Arc::new(LinearModel::regressor("lap1", vec![0.0, 0.0], lap1)),
            second_stop: Arc::new(LinearModel::regressor("lap2", vec![0.0, 0.0], lap2)),
        }
    }

    fn race(id: &str, pits: Vec<u32>) -> Race {
        Race {
            race_id: id.into(),
            total_laps: 52,
            actual_pit_laps: pits,
            feature_vector: vec![0.5, 1.0],
            pit_delta: 22.0,
        }
    }

    #[test]
    fn one_row_per_race_in_order() {
        let orch = Orchestrator::new(models(1.0, 25.0, 0.0), Arc::new(ConstantLapTime(90.0)));
        let races = vec![race("a", vec![25]), race("b", vec![20, 40]), race("c", vec![])];
        let out = orch.run(&races, 50, 42).unwrap();
        let ids: Vec<_> = out.iter().map(|r| r.race_id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert_eq!(out[1].actual_stops, 2);
        assert_eq!(out[1].predicted_stops, 1);
        // One stop fewer than the baseline saves exactly one pit delta.
        assert_eq!(out[1].mean_delta_t, 22.0);
        assert_eq!(out[2].mean_delta_t, -22.0);
    }

    #[test]
    fn same_seed_same_output() {
        let orch = Orchestrator::new(models(2.0, 15.0, 35.0), Arc::new(SafetyCarPace::default()))
            .with_evaluator(Evaluator {
                sc_duration_laps: 4,
                sc_pit_factor: 0.5,
            });
        let races = vec![race("a", vec![25]), race("b", vec![18, 40])];
        assert_eq!(orch.run(&races, 200, 9).unwrap(), orch.run(&races, 200, 9).unwrap());
    }

    #[test]
    fn model_shape_error_aborts_by_default() {
        let orch = Orchestrator::new(models(1.0, 25.0, 0.0), Arc::new(ConstantLapTime(90.0)));
        let mut bad = race("bad", vec![25]);
        bad.feature_vector = vec![1.0, 2.0, 3.0];
        let err = orch.run(&[race("a", vec![25]), bad], 10, 1).unwrap_err();
        assert!(matches!(
            err,
            EvalError::Model {
                source: ModelError::FeatureLength { got: 3, expected: 2, .. },
                ..
            }
        ));
    }

    #[test]
    fn model_shape_error_skips_when_asked() {
        let orch = Orchestrator::new(models(1.0, 25.0, 0.0), Arc::new(ConstantLapTime(90.0)))
            .with_policy(ModelErrorPolicy::Skip);
        let mut bad = race("bad", vec![25]);
        bad.feature_vector = vec![1.0];
        let out = orch.run(&[bad, race("ok", vec![25])], 10, 1).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].race_id, "ok");
    }

    #[test]
    fn zero_scenarios_is_rejected() {
        let orch = Orchestrator::new(models(1.0, 25.0, 0.0), Arc::new(ConstantLapTime(90.0)));
        assert_eq!(
            orch.run(&[race("a", vec![25])], 0, 1),
            Err(EvalError::Run(SamplingError::NoScenarios))
        );
    }

    #[test]
    fn zero_label_runs_two_stops() {
        let orch = Orchestrator::new(models(0.0, 18.0, 36.0), Arc::new(ConstantLapTime(90.0)));
        let out = orch.run(&[race("a", vec![25])], 10, 1).unwrap();
        assert_eq!(out[0].predicted_stops, 2);
        assert_eq!(out[0].mean_delta_t, -22.0);
    }

    #[test]
    fn race_log_comes_from_config() {
        let orch = |log_races| {
            let cfg = RunConfig {
                log_races,
                ..RunConfig::default()
            };
            let predictor = Arc::new(ConstantLapTime(90.0));
            Orchestrator::from_config(&cfg, models(1.0, 25.0, 0.0), predictor).unwrap()
        };
        assert!(!orch(false).log_races);
        assert!(orch(true).log_races);
    }

    #[test]
    fn invalid_record_always_aborts() {
        let orch = Orchestrator::new(models(1.0, 25.0, 0.0), Arc::new(ConstantLapTime(90.0)))
            .with_policy(ModelErrorPolicy::Skip);
        let mut bad = race("bad", vec![25]);
        bad.pit_delta = -3.0;
        assert!(matches!(orch.run(&[bad], 10, 1), Err(EvalError::Config(_))));
    }

    #[test]
    fn race_index_changes_the_scenario_stream() {
        let orch = Orchestrator::new(models(1.0, 20.0, 0.0), Arc::new(SafetyCarPace::default()))
            .with_sampler(ScenarioSampler::new(2.0).unwrap())
            .with_evaluator(Evaluator {
                sc_duration_laps: 5,
                sc_pit_factor: 0.3,
            });
        let races = vec![race("a", vec![25]), race("b", vec![25])];
        let out = orch.run(&races, 300, 5).unwrap();
        assert_ne!(out[0].mean_delta_t, out[1].mean_delta_t);
    }
}

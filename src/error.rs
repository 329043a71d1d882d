use thiserror::Error;

/// Bad input table, bad race record or bad run parameters. Aborts the run.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("failed to read {path}: {reason}")]
    Io { path: String, reason: String },
    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },
    #[error("race {race_id}: total_laps must be positive")]
    NonPositiveRaceLength { race_id: String },
    #[error("race {race_id}: pit_delta must be finite and non-negative (got {value})")]
    InvalidPitDelta { race_id: String, value: f64 },
    #[error("race {race_id}: actual pit lap {lap} outside [1, {total_laps}]")]
    PitLapOutOfRange {
        race_id: String,
        lap: u32,
        total_laps: u32,
    },
    #[error("race {race_id}: feature vector is empty")]
    EmptyFeatures { race_id: String },
    #[error("duplicate race id {race_id}")]
    DuplicateRace { race_id: String },
    #[error("{field} is invalid: {reason}")]
    InvalidParameter { field: &'static str, reason: String },
}

/// A feature vector or artifact that does not fit a loaded model.
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("{model}: feature length mismatch: got {got}, expected {expected}")]
    FeatureLength {
        model: String,
        got: usize,
        expected: usize,
    },
    #[error("{model}: feature {index} is not finite ({value})")]
    NonFiniteFeature {
        model: String,
        index: usize,
        value: f64,
    },
    #[error("{model}: prediction is not finite ({value})")]
    NonFiniteOutput { model: String, value: f64 },
    #[error("{model}: malformed artifact: {reason}")]
    Artifact { model: String, reason: String },
    #[error("{model}: inference failed: {reason}")]
    Inference { model: String, reason: String },
}

/// Sampler parameters rejected before any draw.
#[derive(Debug, Error, PartialEq)]
pub enum SamplingError {
    #[error("race length must be positive")]
    NonPositiveRaceLength,
    #[error("safety car rate must be finite and within [0, {max}] (got {rate})")]
    InvalidRate { rate: f64, max: f64 },
    #[error("at least one scenario per race is required")]
    NoScenarios,
}

#[derive(Debug, Error, PartialEq)]
pub enum EvalError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("race {race_id}: {source}")]
    Model {
        race_id: String,
        #[source]
        source: ModelError,
    },
    #[error(transparent)]
    Run(SamplingError),
    #[error("race {race_id}: {source}")]
    Sampling {
        race_id: String,
        #[source]
        source: SamplingError,
    },
}

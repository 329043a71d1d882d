use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{fs, path::Path, sync::Arc};

use crate::error::ModelError;

pub const CLASSIFIER_STEM: &str = "pitstop_classifier";
pub const FIRST_STOP_STEM: &str = "pitlap1_regressor";
pub const SECOND_STOP_STEM: &str = "pitlap2_regressor";
pub const LAP_TIME_STEM: &str = "lap_time_regressor";

/// A fitted model seen as `predict(feature_vector) -> scalar`.
pub trait RaceModel: Send + Sync {
    fn name(&self) -> &str;
    fn in_dim(&self) -> usize;
    fn predict(&self, x: &[f64]) -> Result<f64, ModelError>;
}

/// Shape and value checks shared by every model kind.
pub fn check_input(name: &str, x: &[f64], in_dim: usize) -> Result<(), ModelError> {
    if x.len() != in_dim {
        return Err(ModelError::FeatureLength {
            model: name.to_string(),
            got: x.len(),
            expected: in_dim,
        });
    }
    if let Some((index, &value)) = x.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(ModelError::NonFiniteFeature {
            model: name.to_string(),
            index,
            value,
        });
    }
    Ok(())
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ArtifactJson {
    Regressor {
        in_dim: Option<usize>,
        weights: Vec<f64>,
        bias: f64,
    },
    Classifier {
        in_dim: Option<usize>,
        classes: Vec<f64>,
        weights: Vec<Vec<f64>>,
        bias: Vec<f64>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Head {
    Regressor { weights: Vec<f64>, bias: f64 },
    /// One score row per class; the prediction is the argmax class label.
    Classifier {
        classes: Vec<f64>,
        weights: Vec<Vec<f64>>,
        bias: Vec<f64>,
    },
}

/// Linear regressor or linear multi-class classifier exported as JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearModel {
    name: String,
    in_dim: usize,
    head: Head,
}

impl LinearModel {
    pub fn regressor(name: &str, weights: Vec<f64>, bias: f64) -> Self {
        Self {
            name: name.to_string(),
            in_dim: weights.len(),
            head: Head::Regressor { weights, bias },
        }
    }

    pub fn classifier(
        name: &str,
        classes: Vec<f64>,
        weights: Vec<Vec<f64>>,
        bias: Vec<f64>,
    ) -> Self {
        let in_dim = weights.first().map_or(0, Vec::len);
        Self {
            name: name.to_string(),
            in_dim,
            head: Head::Classifier {
                classes,
                weights,
                bias,
            },
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("model")
            .to_string();
        let txt = fs::read_to_string(path)
            .with_context(|| format!("failed to read model at {}", path.display()))?;
        let art: ArtifactJson = serde_json::from_str(&txt)
            .with_context(|| format!("failed to parse model {}", path.display()))?;
        let model = Self::from_artifact(&name, art)?;
        tracing::info!("loaded {} (linear, in_dim={})", model.name, model.in_dim);
        Ok(model)
    }

    fn from_artifact(name: &str, art: ArtifactJson) -> Result<Self, ModelError> {
        let bad = |reason: String| ModelError::Artifact {
            model: name.to_string(),
            reason,
        };
        let model = match art {
            ArtifactJson::Regressor {
                in_dim,
                weights,
                bias,
            } => {
                if let Some(d) = in_dim {
                    if d != weights.len() {
                        return Err(bad(format!("in_dim {d} != {} weights", weights.len())));
                    }
                }
                Self::regressor(name, weights, bias)
            }
            ArtifactJson::Classifier {
                in_dim,
                classes,
                weights,
                bias,
            } => {
                if classes.is_empty() {
                    return Err(bad("no classes".into()));
                }
                if weights.len() != classes.len() || bias.len() != classes.len() {
                    return Err(bad(format!(
                        "{} classes but {} weight rows and {} biases",
                        classes.len(),
                        weights.len(),
                        bias.len()
                    )));
                }
                let width = in_dim.unwrap_or_else(|| weights[0].len());
                if weights.iter().any(|row| row.len() != width) {
                    return Err(bad(format!("weight rows must all have {width} entries")));
                }
                Self::classifier(name, classes, weights, bias)
            }
        };
        if model.in_dim == 0 {
            return Err(bad("model takes no features".into()));
        }
        Ok(model)
    }
}

fn dot(w: &[f64], x: &[f64]) -> f64 {
    w.iter().zip(x).map(|(a, b)| a * b).sum()
}

impl RaceModel for LinearModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn in_dim(&self) -> usize {
        self.in_dim
    }

    fn predict(&self, x: &[f64]) -> Result<f64, ModelError> {
        check_input(&self.name, x, self.in_dim)?;
        let out = match &self.head {
            Head::Regressor { weights, bias } => dot(weights, x) + bias,
            Head::Classifier {
                classes,
                weights,
                bias,
            } => {
                let mut best = (0usize, f64::NEG_INFINITY);
                for (i, (row, b)) in weights.iter().zip(bias).enumerate() {
                    let score = dot(row, x) + b;
                    if score > best.1 {
                        best = (i, score);
                    }
                }
                classes[best.0]
            }
        };
        if !out.is_finite() {
            return Err(ModelError::NonFiniteOutput {
                model: self.name.clone(),
                value: out,
            });
        }
        Ok(out)
    }
}

#[cfg(feature = "torch")]
pub mod torch {
    //! TorchScript artifacts, loaded with tch on CPU.

    use super::*;
    use tch::{kind::Kind, CModule, Device, Tensor};

    #[derive(Deserialize)]
    struct MetaJson {
        in_dim: usize,
        /// Present for classifiers: label of each output column.
        classes: Option<Vec<f64>>,
    }

    pub struct TorchModel {
        name: String,
        model: CModule,
        device: Device,
        in_dim: usize,
        classes: Option<Vec<f64>>,
    }

    impl TorchModel {
        pub fn new(model_path: &Path, meta_path: &Path) -> Result<Self> {
            let device = Device::Cpu;
            let name = model_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("model")
                .to_string();

            let meta_txt = fs::read_to_string(meta_path)
                .with_context(|| format!("failed to read meta at {}", meta_path.display()))?;
            let meta: MetaJson = serde_json::from_str(&meta_txt)
                .with_context(|| format!("failed to parse {}", meta_path.display()))?;

            let model = CModule::load_on_device(model_path, device)
                .with_context(|| format!("failed to load TorchScript {}", model_path.display()))?;

            // Probe output shape with a dummy forward: [1] or [1, 1] for
            // regressors, [1, C] for classifiers.
            let dummy = Tensor::zeros([1, meta.in_dim as i64], (Kind::Float, device));
            let t = model.forward_ts(&[dummy])?;
            let width = t.numel() as usize;
            match &meta.classes {
                Some(c) if c.len() != width => {
                    bail!("{name}: {} classes but output has {width} columns", c.len())
                }
                None if width != 1 => bail!("{name}: regressor output size {:?}", t.size()),
                _ => {}
            }
            tracing::info!("loaded {} (torchscript, in_dim={})", name, meta.in_dim);

            Ok(Self {
                name,
                model,
                device,
                in_dim: meta.in_dim,
                classes: meta.classes,
            })
        }
    }

    impl RaceModel for TorchModel {
        fn name(&self) -> &str {
            &self.name
        }

        fn in_dim(&self) -> usize {
            self.in_dim
        }

        fn predict(&self, x: &[f64]) -> Result<f64, ModelError> {
            check_input(&self.name, x, self.in_dim)?;
            let row: Vec<f32> = x.iter().map(|&v| v as f32).collect();
            let input = Tensor::from_slice(&row)
                .reshape([1, self.in_dim as i64])
                .to_device(self.device);
            let out = self
                .model
                .forward_ts(&[input])
                .map_err(|e| ModelError::Inference {
                    model: self.name.clone(),
                    reason: e.to_string(),
                })?
                .reshape([-1]);
            let value = match &self.classes {
                Some(classes) => classes[out.argmax(0, false).int64_value(&[]) as usize],
                None => out.double_value(&[0]),
            };
            if !value.is_finite() {
                return Err(ModelError::NonFiniteOutput {
                    model: self.name.clone(),
                    value,
                });
            }
            Ok(value)
        }
    }
}

/// Load `<dir>/<stem>.json`, or `<dir>/<stem>.pt` + `<dir>/<stem>.meta.json`
/// when built with the `torch` feature.
pub fn load_model(dir: &Path, stem: &str) -> Result<Arc<dyn RaceModel>> {
    let json = dir.join(format!("{stem}.json"));
    if json.exists() {
        return Ok(Arc::new(LinearModel::load(&json)?));
    }
    let pt = dir.join(format!("{stem}.pt"));
    if pt.exists() {
        return load_torchscript(dir, stem, &pt);
    }
    bail!("no model artifact {stem} in {}", dir.display())
}

#[cfg(feature = "torch")]
fn load_torchscript(dir: &Path, stem: &str, pt: &Path) -> Result<Arc<dyn RaceModel>> {
    let meta = dir.join(format!("{stem}.meta.json"));
    Ok(Arc::new(torch::TorchModel::new(pt, &meta)?))
}

#[cfg(not(feature = "torch"))]
fn load_torchscript(_dir: &Path, _stem: &str, pt: &Path) -> Result<Arc<dyn RaceModel>> {
    bail!(
        "{} is a TorchScript model; rebuild with --features torch",
        pt.display()
    )
}

/// The three fitted models used to derive a race's model strategy.
#[derive(Clone)]
pub struct ModelSet {
    pub classifier: Arc<dyn RaceModel>,
    pub first_stop: Arc<dyn RaceModel>,
    pub second_stop: Arc<dyn RaceModel>,
}

impl ModelSet {
    pub fn load(dir: &Path) -> Result<Self> {
        Ok(Self {
            classifier: load_model(dir, CLASSIFIER_STEM)?,
            first_stop: load_model(dir, FIRST_STOP_STEM)?,
            second_stop: load_model(dir, SECOND_STOP_STEM)?,
        })
    }

    /// Check a feature vector against every model's input shape.
    pub fn check(&self, x: &[f64]) -> Result<(), ModelError> {
        for m in [&self.classifier, &self.first_stop, &self.second_stop] {
            check_input(m.name(), x, m.in_dim())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regressor_is_affine() {
        let m = LinearModel::regressor("r", vec![2.0, -1.0], 3.0);
        assert_eq!(m.predict(&[4.0, 1.0]).unwrap(), 10.0);
    }

    #[test]
    fn classifier_picks_highest_score() {
        let m = LinearModel::classifier(
            "c",
            vec![1.0, 2.0],
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            vec![0.0, 0.0],
        );
        assert_eq!(m.predict(&[5.0, 1.0]).unwrap(), 1.0);
        assert_eq!(m.predict(&[1.0, 5.0]).unwrap(), 2.0);
    }

    #[test]
    fn length_mismatch_is_reported() {
        let m = LinearModel::regressor("r", vec![1.0, 1.0, 1.0], 0.0);
        assert_eq!(
            m.predict(&[1.0]),
            Err(ModelError::FeatureLength {
                model: "r".into(),
                got: 1,
                expected: 3
            })
        );
    }

    #[test]
    fn non_finite_feature_is_reported() {
        let m = LinearModel::regressor("r", vec![1.0, 1.0], 0.0);
        assert!(matches!(
            m.predict(&[1.0, f64::NAN]),
            Err(ModelError::NonFiniteFeature { index: 1, .. })
        ));
    }

    #[test]
    fn artifact_json_parses() {
        let art: ArtifactJson = serde_json::from_str(
            r#"{"kind":"classifier","in_dim":2,"classes":[1,2],"weights":[[1,0],[0,1]],"bias":[0,0.5]}"#,
        )
        .unwrap();
        let m = LinearModel::from_artifact("c", art).unwrap();
        assert_eq!(m.in_dim(), 2);
        assert_eq!(m.predict(&[0.0, 0.0]).unwrap(), 2.0);
    }

    #[test]
    fn ragged_classifier_is_rejected() {
        let art = ArtifactJson::Classifier {
            in_dim: None,
            classes: vec![1.0, 2.0],
            weights: vec![vec![1.0, 0.0], vec![1.0]],
            bias: vec![0.0, 0.0],
        };
        assert!(matches!(
            LinearModel::from_artifact("c", art),
            Err(ModelError::Artifact { .. })
        ));
    }

    #[test]
    fn model_set_loads_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("pitstop_classifier.json"),
            r#"{"kind":"classifier","classes":[1,2],"weights":[[1,0],[0,1]],"bias":[0,0]}"#,
        )
        .unwrap();
        for stem in [FIRST_STOP_STEM, SECOND_STOP_STEM] {
            fs::write(
                dir.path().join(format!("{stem}.json")),
                r#"{"kind":"regressor","weights":[1,1],"bias":0}"#,
            )
            .unwrap();
        }
        let set = ModelSet::load(dir.path()).unwrap();
        assert!(set.check(&[1.0, 2.0]).is_ok());
        assert!(set.check(&[1.0]).is_err());
    }

    #[test]
    fn missing_artifact_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ModelSet::load(dir.path()).is_err());
    }
}

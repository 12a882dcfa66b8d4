//! Fitted feature scaler.
//!
//! The parameters mirror the fitted attributes of scikit-learn's
//! `StandardScaler` (`mean_`, `scale_`) and `MinMaxScaler` (`min_`, `scale_`).

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::PredictError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FittedScaler {
    /// `x' = (x - mean) / scale`
    Standard { mean: Vec<f64>, scale: Vec<f64> },
    /// `x' = x * scale + min`
    MinMax { min: Vec<f64>, scale: Vec<f64> },
}

impl FittedScaler {
    /// Loads a scaler, bincode unless the file ends in `.json`
    pub fn load(path: &Path) -> Result<Self, PredictError> {
        let bytes = std::fs::read(path).map_err(|e| PredictError::artifact(path, e))?;

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let scaler: FittedScaler = if is_json {
            serde_json::from_slice(&bytes).map_err(|e| PredictError::artifact(path, e))?
        } else {
            bincode::deserialize(&bytes).map_err(|e| PredictError::artifact(path, e))?
        };

        scaler
            .validate()
            .map_err(|reason| PredictError::artifact(path, reason))?;
        Ok(scaler)
    }

    /// Number of features the scaler was fitted on
    pub fn width(&self) -> usize {
        match self {
            Self::Standard { mean, .. } => mean.len(),
            Self::MinMax { min, .. } => min.len(),
        }
    }

    pub fn transform(&self, features: &[f64]) -> Result<Vec<f64>, PredictError> {
        if features.len() != self.width() {
            return Err(PredictError::FeatureShapeError {
                stage: "scaler",
                expected: self.width(),
                actual: features.len(),
            });
        }

        let scaled = match self {
            Self::Standard { mean, scale } => features
                .iter()
                .zip(mean.iter().zip(scale))
                .map(|(x, (m, s))| (x - m) / s)
                .collect(),
            Self::MinMax { min, scale } => features
                .iter()
                .zip(min.iter().zip(scale))
                .map(|(x, (m, s))| x * s + m)
                .collect(),
        };
        Ok(scaled)
    }

    fn validate(&self) -> Result<(), String> {
        let (offsets, scale) = match self {
            Self::Standard { mean, scale } => (mean, scale),
            Self::MinMax { min, scale } => (min, scale),
        };

        if offsets.is_empty() {
            return Err("scaler has no features".to_string());
        }
        if offsets.len() != scale.len() {
            return Err(format!(
                "parameter length mismatch ({} vs {})",
                offsets.len(),
                scale.len()
            ));
        }
        if offsets.iter().chain(scale).any(|v| !v.is_finite()) {
            return Err("scaler parameters must be finite".to_string());
        }
        if matches!(self, Self::Standard { .. }) && scale.iter().any(|s| *s == 0.0) {
            return Err("standard scaler has a zero scale".to_string());
        }
        Ok(())
    }
}

//! Price inference over pre-trained artifacts.
//!
//! Three artifacts are produced offline by the training notebook:
//!
//! - a fitted feature scaler ([`FittedScaler`])
//! - a boosted-tree regression model ([`Booster`])
//! - the neighbourhood category table ([`CategoryEncoding`])
//!
//! [`PricePredictor::initialize`] loads them once, and the resulting context
//! is shared read-only by every request.

mod booster;
mod encoding;
mod predictor;
mod scaler;

pub use booster::Booster;
pub use encoding::{CategoryEncoding, ROME_MUNICIPI};
pub use predictor::{ArtifactPaths, PricePredictor, ValidationPolicy};
pub use scaler::FittedScaler;

use crate::error::PredictError;

/// Column order the model was trained on
pub const FEATURE_ORDER: [&str; 4] = ["beds", "accommodates", "bathrooms", "neighbourhood_cleansed"];

/// Interface the adapter uses to call a regression model
pub trait Regressor: Send + Sync {
    /// One estimate per input row
    fn predict_rows(&self, rows: &[&[f64]]) -> Result<Vec<f64>, PredictError>;

    fn num_features(&self) -> usize;

    fn name(&self) -> &str;
}

/// Raw model input, laid out as [`FEATURE_ORDER`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f64; 4]);

impl FeatureVector {
    pub fn new(beds: i32, accommodates: i32, bathrooms: i32, neighbourhood_code: i64) -> Self {
        Self([
            beds as f64,
            accommodates as f64,
            bathrooms as f64,
            neighbourhood_code as f64,
        ])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_vector_order() {
        let v = FeatureVector::new(1, 2, 3, 7);
        assert_eq!(v.as_slice(), &[1.0, 2.0, 3.0, 7.0]);
        assert_eq!(
            FEATURE_ORDER,
            ["beds", "accommodates", "bathrooms", "neighbourhood_cleansed"]
        );
    }
}

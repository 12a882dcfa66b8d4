use std::path::PathBuf;
use tracing::{debug, info};

use super::{Booster, CategoryEncoding, FeatureVector, FittedScaler, Regressor, FEATURE_ORDER};
use crate::error::PredictError;
use crate::models::ListingQuery;

/// How numeric query fields are checked before inference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationPolicy {
    /// Every count must lie in `1..=max_count`
    Strict { max_count: i32 },
    /// Counts reach the model exactly as submitted
    Passthrough,
}

impl ValidationPolicy {
    fn check(&self, query: &ListingQuery) -> Result<(), PredictError> {
        let Self::Strict { max_count } = *self else {
            return Ok(());
        };

        for (field, value) in [
            ("beds", query.beds),
            ("accommodates", query.accommodates),
            ("bathrooms", query.bathrooms),
        ] {
            if !(1..=max_count).contains(&value) {
                return Err(PredictError::InvalidQueryError(format!(
                    "{field} must be between 1 and {max_count}, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Locations of the three training artifacts
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub scaler: PathBuf,
    pub model: PathBuf,
    pub encoding: PathBuf,
    /// Optional inverse table, cross-checked when the file exists
    pub decoding: Option<PathBuf>,
}

/// Loaded, immutable inference context
pub struct PricePredictor {
    scaler: FittedScaler,
    model: Box<dyn Regressor>,
    encoding: CategoryEncoding,
    policy: ValidationPolicy,
}

impl std::fmt::Debug for PricePredictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PricePredictor")
            .field("scaler", &self.scaler)
            .field("model", &self.model.name())
            .field("neighbourhoods", &self.encoding.len())
            .field("policy", &self.policy)
            .finish()
    }
}

impl PricePredictor {
    /// Loads scaler, model and category table and checks they agree on the feature width
    pub fn initialize(paths: &ArtifactPaths, policy: ValidationPolicy) -> Result<Self, PredictError> {
        let scaler = FittedScaler::load(&paths.scaler)?;
        info!(path = %paths.scaler.display(), width = scaler.width(), "loaded feature scaler");

        let model = Booster::load(&paths.model)?;
        info!(path = %paths.model.display(), model = model.name(), link = ?model.link(), "loaded price model");

        let decoding = match paths.decoding.as_deref() {
            Some(path) if path.exists() => Some(path),
            Some(path) => {
                debug!(path = %path.display(), "no inverse mapping, deriving it");
                None
            }
            None => None,
        };
        let encoding = CategoryEncoding::load(&paths.encoding, decoding)?;
        info!(
            path = %paths.encoding.display(),
            neighbourhoods = encoding.len(),
            "loaded neighbourhood mapping"
        );

        if scaler.width() != FEATURE_ORDER.len() {
            return Err(PredictError::artifact(
                &paths.scaler,
                format!("scaler has {} features, expected {}", scaler.width(), FEATURE_ORDER.len()),
            ));
        }
        if model.num_features() != FEATURE_ORDER.len() {
            return Err(PredictError::artifact(
                &paths.model,
                format!(
                    "model has {} features, expected {}",
                    model.num_features(),
                    FEATURE_ORDER.len()
                ),
            ));
        }

        Self::from_parts(scaler, Box::new(model), encoding, policy)
    }

    /// Builds a predictor from already loaded parts
    pub fn from_parts(
        scaler: FittedScaler,
        model: Box<dyn Regressor>,
        encoding: CategoryEncoding,
        policy: ValidationPolicy,
    ) -> Result<Self, PredictError> {
        for (stage, width) in [("scaler", scaler.width()), ("model", model.num_features())] {
            if width != FEATURE_ORDER.len() {
                return Err(PredictError::FeatureShapeError {
                    stage,
                    expected: FEATURE_ORDER.len(),
                    actual: width,
                });
            }
        }
        Ok(Self {
            scaler,
            model,
            encoding,
            policy,
        })
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn encoding(&self) -> &CategoryEncoding {
        &self.encoding
    }

    pub fn policy(&self) -> ValidationPolicy {
        self.policy
    }

    /// Validates the query and assembles its raw feature vector
    pub fn encode(&self, query: &ListingQuery) -> Result<FeatureVector, PredictError> {
        self.policy.check(query)?;

        let code = self.encoding.code(&query.neighbourhood).ok_or_else(|| {
            PredictError::UnknownCategoryError {
                name: query.neighbourhood.clone(),
                suggestion: self.encoding.suggest(&query.neighbourhood).map(str::to_string),
            }
        })?;
        debug!(code, district = self.encoding.name(code), "neighbourhood encoded");

        Ok(FeatureVector::new(
            query.beds,
            query.accommodates,
            query.bathrooms,
            code,
        ))
    }

    /// Scales the features and asks the model for exactly one estimate
    pub fn predict_encoded(&self, features: &FeatureVector) -> Result<f64, PredictError> {
        let scaled = self.scaler.transform(features.as_slice())?;

        let output = self
            .model
            .predict_rows(&[scaled.as_slice()])
            .map_err(|e| match e {
                shape @ PredictError::FeatureShapeError { .. } => shape,
                other => PredictError::inference(other.to_string()),
            })?;

        let price = match output.as_slice() {
            [price] => *price,
            other => {
                return Err(PredictError::FeatureShapeError {
                    stage: "model output",
                    expected: 1,
                    actual: other.len(),
                })
            }
        };

        if !price.is_finite() {
            return Err(PredictError::inference(format!(
                "model returned a non-finite estimate ({price})"
            )));
        }
        if price < 0.0 {
            debug!(price, "negative estimate floored at zero");
            return Ok(0.0);
        }
        Ok(price)
    }

    pub fn predict(&self, query: &ListingQuery) -> Result<f64, PredictError> {
        let features = self.encode(query)?;
        self.predict_encoded(&features)
    }
}

use axum::{extract::rejection::JsonRejection, http::StatusCode, response::IntoResponse, Json};
use std::path::PathBuf;
use thiserror::Error;

use crate::models::ApiResponse;

/// Errors raised while loading the price artifacts or running a prediction
#[derive(Debug, Error)]
pub enum PredictError {
    /// An artifact file is missing, unreadable or malformed
    #[error("failed to load artifact {}: {reason}", path.display())]
    ArtifactLoadError { path: PathBuf, reason: String },

    /// The neighbourhood is not a key of the category mapping
    #[error("unknown neighbourhood: {name}")]
    UnknownCategoryError {
        name: String,
        suggestion: Option<String>,
    },

    /// The feature vector width disagrees with what an artifact expects
    #[error("feature shape mismatch at {stage}: expected {expected}, got {actual}")]
    FeatureShapeError {
        stage: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A numeric field was rejected by the strict validation policy
    #[error("invalid listing query: {0}")]
    InvalidQueryError(String),

    /// The model failed to produce a usable estimate
    #[error("inference failed: {0}")]
    InferenceError(String),
}

impl PredictError {
    pub fn artifact(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ArtifactLoadError {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn inference(msg: impl Into<String>) -> Self {
        Self::InferenceError(msg.into())
    }

    /// Errors caused by what the user submitted
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownCategoryError { .. } | Self::InvalidQueryError(_)
        )
    }

    /// Only a failed model call may succeed on a plain retry
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::InferenceError(_))
    }
}

/// Errors raised while loading the listings dataset
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("failed to load listings {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },
}

/// Everything a handler can fail with
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Predict(#[from] PredictError),

    #[error("prediction unavailable: {0}")]
    PredictorUnavailable(String),

    #[error("listing statistics unavailable: {0}")]
    ListingsUnavailable(String),

    #[error("invalid request body: {}", .0.body_text())]
    InvalidBody(#[from] JsonRejection),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Predict(PredictError::UnknownCategoryError { .. }) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "unknown_category")
            }
            Self::Predict(PredictError::InvalidQueryError(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "invalid_query")
            }
            Self::Predict(PredictError::FeatureShapeError { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
            Self::Predict(PredictError::InferenceError(_))
            | Self::Predict(PredictError::ArtifactLoadError { .. })
            | Self::PredictorUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "prediction_unavailable")
            }
            Self::ListingsUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "listings_unavailable")
            }
            Self::InvalidBody(rejection) => (rejection.status(), "invalid_body"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = self.status_and_code();

        let mut data = serde_json::json!({ "code": code });
        if let Self::Predict(PredictError::UnknownCategoryError {
            suggestion: Some(suggestion),
            ..
        }) = &self
        {
            data["suggestion"] = serde_json::json!(suggestion);
        }
        if let Self::Predict(err) = &self {
            data["retriable"] = serde_json::json!(err.is_retriable());
        }

        // Internal contract violations never leak details to the caller
        let message = match &self {
            Self::Predict(PredictError::FeatureShapeError { .. }) => {
                tracing::error!(error = %self, "feature contract violated");
                "internal error".to_string()
            }
            _ => self.to_string(),
        };

        let body = ApiResponse {
            status: "error".to_string(),
            message,
            data: Some(data),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_inference_errors_are_retriable() {
        assert!(PredictError::inference("boom").is_retriable());
        assert!(!PredictError::InvalidQueryError("beds".into()).is_retriable());
        assert!(!PredictError::artifact("x.bin", "missing").is_retriable());
    }

    #[test]
    fn test_client_errors() {
        let unknown = PredictError::UnknownCategoryError {
            name: "Atlantis".into(),
            suggestion: None,
        };
        assert!(unknown.is_client_error());
        assert!(!PredictError::FeatureShapeError {
            stage: "scaler",
            expected: 4,
            actual: 3
        }
        .is_client_error());
    }

    #[test]
    fn test_status_mapping() {
        let err = ApiError::from(PredictError::UnknownCategoryError {
            name: "Atlantis".into(),
            suggestion: None,
        });
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);

        let err = ApiError::from(PredictError::FeatureShapeError {
            stage: "model output",
            expected: 1,
            actual: 2,
        });
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = ApiError::PredictorUnavailable("not loaded".into());
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    async fn body_of(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_inference_error_is_retriable_unavailable() {
        let (status, body) = body_of(PredictError::inference("boom").into()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "error");
        assert_eq!(body["data"]["code"], "prediction_unavailable");
        assert_eq!(body["data"]["retriable"], true);
    }

    #[tokio::test]
    async fn test_unknown_category_carries_suggestion() {
        let err = PredictError::UnknownCategoryError {
            name: "IX EUR".into(),
            suggestion: Some("IX Eur".into()),
        };
        let (_, body) = body_of(err.into()).await;
        assert_eq!(body["data"]["suggestion"], "IX Eur");
        assert_eq!(body["data"]["retriable"], false);
    }

    #[tokio::test]
    async fn test_shape_error_hides_details() {
        let err = PredictError::FeatureShapeError {
            stage: "scaler",
            expected: 4,
            actual: 3,
        };
        let (_, body) = body_of(err.into()).await;
        assert_eq!(body["message"], "internal error");
        assert_eq!(body["data"]["code"], "internal");
    }

    #[test]
    fn test_artifact_error_names_path() {
        let err = PredictError::artifact("outputs/scaler.bin", "No such file");
        assert!(err.to_string().contains("outputs/scaler.bin"));
    }
}

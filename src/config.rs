use std::path::PathBuf;
use std::str::FromStr;

use crate::inference::{ArtifactPaths, ValidationPolicy};

/// Service configuration, read from the environment
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,

    // Prediction artifacts
    pub scaler_path: PathBuf,
    pub model_path: PathBuf,
    pub encoding_path: PathBuf,
    pub decoding_path: PathBuf,
    pub validation_policy: PolicyKind,
    pub max_count: i32,
    pub currency_symbol: String,

    pub listings_path: PathBuf,
}

/// Name of the configured validation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    Strict,
    Passthrough,
}

impl FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "passthrough" => Ok(Self::Passthrough),
            other => Err(format!("unknown validation policy {other:?}")),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup, falling back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let string = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Self {
            host: string("HOST", "127.0.0.1"),
            port: parsed(&lookup, "PORT", 8080),
            scaler_path: string("SCALER_PATH", "outputs/scaler.bin").into(),
            model_path: string("MODEL_PATH", "models/price_xgb.json").into(),
            encoding_path: string("ENCODING_PATH", "outputs/mapeo.json").into(),
            decoding_path: string("DECODING_PATH", "outputs/mapeo_inverso.json").into(),
            validation_policy: parsed(&lookup, "VALIDATION_POLICY", PolicyKind::Strict),
            max_count: parsed(&lookup, "MAX_COUNT", 50),
            currency_symbol: string("CURRENCY_SYMBOL", "€"),
            listings_path: string("LISTINGS_PATH", "data/airbnb_limpio.csv").into(),
        }
    }

    pub fn artifact_paths(&self) -> ArtifactPaths {
        ArtifactPaths {
            scaler: self.scaler_path.clone(),
            model: self.model_path.clone(),
            encoding: self.encoding_path.clone(),
            decoding: Some(self.decoding_path.clone()),
        }
    }

    pub fn validation(&self) -> ValidationPolicy {
        match self.validation_policy {
            PolicyKind::Strict => ValidationPolicy::Strict {
                max_count: self.max_count,
            },
            PolicyKind::Passthrough => ValidationPolicy::Passthrough,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "unparseable setting, using default");
            default
        }),
        None => default,
    }
}

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::error::PredictError;

/// The fifteen municipi of Rome as they appear in `neighbourhood_cleansed`
pub const ROME_MUNICIPI: [&str; 15] = [
    "I Centro Storico",
    "II Parioli/Nomentano",
    "III Monte Sacro",
    "IV Tiburtina",
    "V Prenestino/Centocelle",
    "VI Roma delle Torri",
    "VII San Giovanni/Cinecittà",
    "VIII Appia Antica",
    "IX Eur",
    "X Ostia/Acilia",
    "XI Arvalia/Portuense",
    "XII Monte Verde",
    "XIII Aurelia",
    "XIV Monte Mario",
    "XV Cassia/Flaminia",
];

/// Minimum Jaro-Winkler similarity for a "did you mean" suggestion
const SUGGESTION_THRESHOLD: f64 = 0.8;

/// Neighbourhood name <-> integer code table fixed at training time
#[derive(Debug, Clone)]
pub struct CategoryEncoding {
    forward: HashMap<String, i64>,
    inverse: BTreeMap<i64, String>,
}

impl CategoryEncoding {
    /// Loads the forward map and, when present, checks it against the inverse map
    pub fn load(forward_path: &Path, inverse_path: Option<&Path>) -> Result<Self, PredictError> {
        let forward: HashMap<String, i64> = read_json(forward_path)?;
        let encoding =
            Self::from_forward(forward).map_err(|reason| PredictError::artifact(forward_path, reason))?;

        if let Some(path) = inverse_path {
            let raw: HashMap<String, String> = read_json(path)?;
            let mut inverse = BTreeMap::new();
            for (code, name) in raw {
                let code: i64 = code
                    .trim()
                    .parse()
                    .map_err(|_| PredictError::artifact(path, format!("code {code:?} is not an integer")))?;
                inverse.insert(code, name);
            }
            if inverse != encoding.inverse {
                return Err(PredictError::artifact(
                    path,
                    "inverse mapping disagrees with the forward mapping",
                ));
            }
        }

        let unexpected: Vec<&str> = encoding
            .forward
            .keys()
            .map(String::as_str)
            .filter(|name| !ROME_MUNICIPI.contains(name))
            .collect();
        if !unexpected.is_empty() {
            tracing::warn!(?unexpected, "mapping contains names outside the municipi list");
        }

        Ok(encoding)
    }

    pub fn from_forward(forward: HashMap<String, i64>) -> Result<Self, String> {
        if forward.is_empty() {
            return Err("mapping is empty".to_string());
        }

        let mut inverse = BTreeMap::new();
        for (name, code) in &forward {
            if let Some(previous) = inverse.insert(*code, name.clone()) {
                return Err(format!("code {code} is shared by {previous:?} and {name:?}"));
            }
        }
        Ok(Self { forward, inverse })
    }

    pub fn code(&self, name: &str) -> Option<i64> {
        self.forward.get(name).copied()
    }

    pub fn name(&self, code: i64) -> Option<&str> {
        self.inverse.get(&code).map(String::as_str)
    }

    /// All entries ordered by code
    pub fn entries(&self) -> impl Iterator<Item = (i64, &str)> + '_ {
        self.inverse.iter().map(|(code, name)| (*code, name.as_str()))
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// Closest known name to an unknown one
    pub fn suggest(&self, name: &str) -> Option<&str> {
        self.forward
            .keys()
            .map(|known| (known, strsim::jaro_winkler(&name.to_lowercase(), &known.to_lowercase())))
            .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(known, _)| known.as_str())
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, PredictError> {
    let text = std::fs::read_to_string(path).map_err(|e| PredictError::artifact(path, e))?;
    serde_json::from_str(&text).map_err(|e| PredictError::artifact(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use tempfile::TempDir;

    #[test]
    fn test_load_forward_and_inverse() {
        let dir = TempDir::new().unwrap();
        let (forward, inverse) = fixtures::write_mappings(dir.path());

        let encoding = CategoryEncoding::load(&forward, Some(&inverse)).unwrap();
        assert_eq!(encoding.len(), ROME_MUNICIPI.len());
        assert_eq!(encoding.code("I Centro Storico"), Some(0));
        assert_eq!(encoding.name(14), Some("XV Cassia/Flaminia"));
    }

    #[test]
    fn test_inverse_is_optional() {
        let dir = TempDir::new().unwrap();
        let (forward, _) = fixtures::write_mappings(dir.path());

        let encoding = CategoryEncoding::load(&forward, None).unwrap();
        assert_eq!(encoding.name(8), Some("IX Eur"));
    }

    #[test]
    fn test_entries_ordered_by_code() {
        let encoding = fixtures::encoding();
        let codes: Vec<i64> = encoding.entries().map(|(code, _)| code).collect();
        let mut sorted = codes.clone();
        sorted.sort();
        assert_eq!(codes, sorted);
    }

    #[test]
    fn test_duplicate_codes_rejected() {
        let forward = HashMap::from([("A".to_string(), 1), ("B".to_string(), 1)]);
        let err = CategoryEncoding::from_forward(forward).unwrap_err();
        assert!(err.contains("shared by"));
    }

    #[test]
    fn test_disagreeing_inverse_rejected() {
        let dir = TempDir::new().unwrap();
        let (forward, inverse) = fixtures::write_mappings(dir.path());
        std::fs::write(&inverse, r#"{"0": "IX Eur"}"#).unwrap();

        let err = CategoryEncoding::load(&forward, Some(&inverse)).unwrap_err();
        assert!(err.to_string().contains("disagrees"));
    }

    #[test]
    fn test_missing_file_is_artifact_error() {
        let dir = TempDir::new().unwrap();
        let err = CategoryEncoding::load(&dir.path().join("mapeo.json"), None).unwrap_err();
        assert!(matches!(err, PredictError::ArtifactLoadError { .. }));
    }

    #[test]
    fn test_suggest_close_name() {
        let encoding = fixtures::encoding();
        assert_eq!(encoding.suggest("I centro storico"), Some("I Centro Storico"));
        assert_eq!(encoding.suggest("Trastevere Lungo Nome"), None);
    }
}

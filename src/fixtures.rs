//! Small artifacts and datasets shared by the test modules.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::inference::{ArtifactPaths, CategoryEncoding, FittedScaler, ROME_MUNICIPI};

/// Two stumps: feature 3 at 0.5 (10 | 40, NaN left) and feature 0 at 0.0 (5 | 7, NaN right)
pub fn model_json(objective: &str, base_score: &str) -> String {
    format!(
        r#"{{
  "learner": {{
    "attributes": {{}},
    "feature_names": [],
    "feature_types": [],
    "gradient_booster": {{
      "model": {{
        "gbtree_model_param": {{"num_parallel_tree": "1", "num_trees": "2"}},
        "tree_info": [0, 0],
        "trees": [{trees}]
      }},
      "name": "gbtree"
    }},
    "learner_model_param": {{
      "base_score": "{base_score}",
      "boost_from_average": "1",
      "num_class": "0",
      "num_feature": "4",
      "num_target": "1"
    }},
    "objective": {{"name": "{objective}", "reg_loss_param": {{"scale_pos_weight": "1"}}}}
  }},
  "version": [2, 0, 3]
}}"#,
        trees = trees_json(),
    )
}

/// Same stumps under a dart booster weighted 0.5 and 2.0
pub fn dart_model_json() -> String {
    format!(
        r#"{{
  "learner": {{
    "gradient_booster": {{
      "name": "dart",
      "gbtree": {{"name": "gbtree", "model": {{"trees": [{trees}]}}}},
      "weight_drop": [0.5, 2.0]
    }},
    "learner_model_param": {{"base_score": "[0E0]", "num_feature": "4"}},
    "objective": {{"name": "reg:squarederror"}}
  }}
}}"#,
        trees = trees_json(),
    )
}

fn trees_json() -> &'static str {
    r#"
    {
      "base_weights": [0.0, 10.0, 40.0],
      "default_left": [1, 0, 0],
      "id": 0,
      "left_children": [1, -1, -1],
      "right_children": [2, -1, -1],
      "split_conditions": [0.5, 10.0, 40.0],
      "split_indices": [3, 0, 0],
      "split_type": [0, 0, 0]
    },
    {
      "base_weights": [0.0, 5.0, 7.0],
      "default_left": [false, false, false],
      "id": 1,
      "left_children": [1, -1, -1],
      "right_children": [2, -1, -1],
      "split_conditions": [0.0, 5.0, 7.0],
      "split_indices": [0, 0, 0]
    }"#
}

pub fn scaler() -> FittedScaler {
    FittedScaler::Standard {
        mean: vec![1.5, 3.0, 1.2, 5.0],
        scale: vec![1.0, 1.5, 0.5, 4.0],
    }
}

/// Municipi coded by their position in [`ROME_MUNICIPI`]
pub fn encoding() -> CategoryEncoding {
    let forward: HashMap<String, i64> = ROME_MUNICIPI
        .iter()
        .enumerate()
        .map(|(code, name)| (name.to_string(), code as i64))
        .collect();
    CategoryEncoding::from_forward(forward).unwrap()
}

/// Writes `mapeo.json` and `mapeo_inverso.json`
pub fn write_mappings(dir: &Path) -> (PathBuf, PathBuf) {
    let forward: HashMap<&str, usize> = ROME_MUNICIPI
        .iter()
        .enumerate()
        .map(|(code, name)| (*name, code))
        .collect();
    let inverse: HashMap<String, &str> = ROME_MUNICIPI
        .iter()
        .enumerate()
        .map(|(code, name)| (code.to_string(), *name))
        .collect();

    let forward_path = dir.join("mapeo.json");
    let inverse_path = dir.join("mapeo_inverso.json");
    std::fs::write(&forward_path, serde_json::to_string(&forward).unwrap()).unwrap();
    std::fs::write(&inverse_path, serde_json::to_string(&inverse).unwrap()).unwrap();
    (forward_path, inverse_path)
}

/// Writes a complete, consistent artifact set
pub fn write_artifacts(dir: &Path) -> ArtifactPaths {
    let scaler_path = dir.join("scaler.bin");
    std::fs::write(&scaler_path, bincode::serialize(&scaler()).unwrap()).unwrap();

    let model_path = dir.join("price_xgb.json");
    std::fs::write(&model_path, model_json("reg:squarederror", "1E2")).unwrap();

    let (encoding, decoding) = write_mappings(dir);
    ArtifactPaths {
        scaler: scaler_path,
        model: model_path,
        encoding,
        decoding: Some(decoding),
    }
}

/// A handful of listings in the cleaned CSV layout
pub fn write_listings_csv(dir: &Path) -> PathBuf {
    let path = dir.join("airbnb_limpio.csv");
    let csv = "\
id,host_id,host_is_superhost,neighbourhood_cleansed,latitude,longitude,property_type,room_type,accommodates,price,review_scores_rating,review_scores_location
1,100,t,I Centro Storico,41.89,12.48,Entire rental unit,Entire home/apt,4,150.0,4.8,4.9
2,100,t,I Centro Storico,41.90,12.47,Entire rental unit,Entire home/apt,2,110.0,4.6,5.0
3,200,f,I Centro Storico,41.89,12.49,Private room in rental unit,Private room,2,,4.4,
4,300,f,XIII Aurelia,41.89,12.42,Entire rental unit,Entire home/apt,4,80.0,4.7,4.5
5,100,t,IX Eur,41.83,12.47,Private room in bed and breakfast,Private room,1,60.0,,4.0
";
    std::fs::write(&path, csv).unwrap();
    path
}

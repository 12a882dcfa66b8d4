//! Boosted decision-tree ensemble read from the XGBoost JSON model format.
//!
//! Only the fields needed for inference are read. Leaves store their value in
//! `split_conditions`, internal nodes send a row left when
//! `x[split_index] < split_condition` and follow `default_left` for NaN.
//! Comparisons and accumulation happen in `f32`, as in XGBoost itself.

use serde::Deserialize;
use std::path::Path;

use super::Regressor;
use crate::error::PredictError;

#[derive(Deserialize)]
struct ModelFile {
    learner: LearnerJson,
}

#[derive(Deserialize)]
struct LearnerJson {
    learner_model_param: LearnerModelParam,
    objective: ObjectiveJson,
    gradient_booster: GradientBoosterJson,
}

#[derive(Deserialize)]
struct LearnerModelParam {
    base_score: String,
    num_feature: String,
}

#[derive(Deserialize)]
struct ObjectiveJson {
    name: String,
}

#[derive(Deserialize)]
#[serde(tag = "name")]
enum GradientBoosterJson {
    #[serde(rename = "gbtree")]
    GbTree { model: GbTreeModelJson },
    #[serde(rename = "dart")]
    Dart {
        gbtree: DartInnerJson,
        weight_drop: Vec<f32>,
    },
}

#[derive(Deserialize)]
struct DartInnerJson {
    model: GbTreeModelJson,
}

#[derive(Deserialize)]
struct GbTreeModelJson {
    trees: Vec<TreeJson>,
}

#[derive(Deserialize)]
struct TreeJson {
    left_children: Vec<i32>,
    right_children: Vec<i32>,
    split_indices: Vec<u32>,
    split_conditions: Vec<f32>,
    default_left: Vec<Flag>,
    #[serde(default)]
    split_type: Vec<u8>,
}

/// `default_left` is written as 0/1 by some XGBoost versions and as booleans by others
#[derive(Deserialize, Clone, Copy)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(u8),
}

impl Flag {
    fn is_set(self) -> bool {
        match self {
            Flag::Bool(b) => b,
            Flag::Int(i) => i != 0,
        }
    }
}

/// Output transform implied by the training objective
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Link {
    Identity,
    Log,
    Logistic,
}

impl Link {
    fn for_objective(name: &str) -> Option<Self> {
        match name {
            "reg:squarederror" | "reg:linear" | "reg:squaredlogerror"
            | "reg:pseudohubererror" | "reg:absoluteerror" | "reg:quantileerror" => {
                Some(Link::Identity)
            }
            "reg:gamma" | "reg:tweedie" | "count:poisson" => Some(Link::Log),
            "reg:logistic" => Some(Link::Logistic),
            _ => None,
        }
    }

    fn to_margin(self, base_score: f32) -> Result<f32, String> {
        match self {
            Link::Identity => Ok(base_score),
            Link::Log if base_score > 0.0 => Ok(base_score.ln()),
            Link::Logistic if base_score > 0.0 && base_score < 1.0 => {
                Ok((base_score / (1.0 - base_score)).ln())
            }
            _ => Err(format!("base_score {base_score} is outside the objective's range")),
        }
    }

    fn apply(self, margin: f32) -> f32 {
        match self {
            Link::Identity => margin,
            Link::Log => margin.exp(),
            Link::Logistic => 1.0 / (1.0 + (-margin).exp()),
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    left: i32,
    right: i32,
    feature: u32,
    /// Split threshold, or the leaf value when `left == -1`
    value: f32,
    default_left: bool,
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn from_json(tree: TreeJson, num_feature: usize) -> Result<Self, String> {
        let len = tree.left_children.len();
        if len == 0 {
            return Err("tree has no nodes".to_string());
        }
        if tree.right_children.len() != len
            || tree.split_indices.len() != len
            || tree.split_conditions.len() != len
            || tree.default_left.len() != len
        {
            return Err("tree node arrays differ in length".to_string());
        }
        if tree.split_type.iter().any(|t| *t != 0) {
            return Err("categorical splits are not supported".to_string());
        }

        let mut nodes = Vec::with_capacity(len);
        for i in 0..len {
            let (left, right) = (tree.left_children[i], tree.right_children[i]);
            if left != -1 {
                // Children are always allocated after their parent
                for child in [left, right] {
                    if child <= (i as i32) || (child as usize) >= len {
                        return Err(format!("node {i} has invalid child {child}"));
                    }
                }
                if (tree.split_indices[i] as usize) >= num_feature {
                    return Err(format!(
                        "node {i} splits on feature {} but the model has {num_feature}",
                        tree.split_indices[i]
                    ));
                }
            }
            nodes.push(Node {
                left,
                right,
                feature: tree.split_indices[i],
                value: tree.split_conditions[i],
                default_left: tree.default_left[i].is_set(),
            });
        }
        Ok(Tree { nodes })
    }

    fn leaf_value(&self, row: &[f32]) -> f32 {
        let mut idx = 0usize;
        loop {
            let node = &self.nodes[idx];
            if node.left == -1 {
                return node.value;
            }
            let x = row[node.feature as usize];
            let go_left = if x.is_nan() {
                node.default_left
            } else {
                x < node.value
            };
            let next = if go_left { node.left } else { node.right };
            idx = next as usize;
        }
    }
}

/// A loaded tree ensemble
#[derive(Debug, Clone)]
pub struct Booster {
    trees: Vec<Tree>,
    /// Per-tree weight, all ones for gbtree
    weights: Vec<f32>,
    base_margin: f32,
    link: Link,
    num_feature: usize,
    description: String,
}

impl Booster {
    pub fn load(path: &Path) -> Result<Self, PredictError> {
        let json = std::fs::read_to_string(path).map_err(|e| PredictError::artifact(path, e))?;
        Self::parse(&json).map_err(|reason| PredictError::artifact(path, reason))
    }

    pub fn parse(json: &str) -> Result<Self, String> {
        let file: ModelFile = serde_json::from_str(json).map_err(|e| e.to_string())?;
        let learner = file.learner;

        let objective = learner.objective.name;
        let link = Link::for_objective(&objective)
            .ok_or_else(|| format!("unsupported objective {objective}"))?;

        let num_feature: usize = learner
            .learner_model_param
            .num_feature
            .trim()
            .parse()
            .map_err(|_| "num_feature is not an integer".to_string())?;
        let base_score = parse_base_score(&learner.learner_model_param.base_score)?;
        let base_margin = link.to_margin(base_score)?;

        let (kind, raw_trees, weights) = match learner.gradient_booster {
            GradientBoosterJson::GbTree { model } => {
                let weights = vec![1.0; model.trees.len()];
                ("gbtree", model.trees, weights)
            }
            GradientBoosterJson::Dart {
                gbtree,
                weight_drop,
            } => {
                if weight_drop.len() != gbtree.model.trees.len() {
                    return Err(format!(
                        "dart has {} weights for {} trees",
                        weight_drop.len(),
                        gbtree.model.trees.len()
                    ));
                }
                ("dart", gbtree.model.trees, weight_drop)
            }
        };

        let trees = raw_trees
            .into_iter()
            .enumerate()
            .map(|(i, tree)| Tree::from_json(tree, num_feature).map_err(|e| format!("tree {i}: {e}")))
            .collect::<Result<Vec<_>, _>>()?;

        let description = format!("xgboost {kind} ({objective}, {} trees)", trees.len());
        Ok(Booster {
            trees,
            weights,
            base_margin,
            link,
            num_feature,
            description,
        })
    }

    pub fn link(&self) -> Link {
        self.link
    }

    /// Prediction for one row whose width is already checked
    fn predict_row(&self, row: &[f64]) -> f32 {
        let row: Vec<f32> = row.iter().map(|x| *x as f32).collect();
        let margin = self
            .trees
            .iter()
            .zip(&self.weights)
            .fold(self.base_margin, |acc, (tree, w)| acc + tree.leaf_value(&row) * w);
        self.link.apply(margin)
    }
}

impl Regressor for Booster {
    fn predict_rows(&self, rows: &[&[f64]]) -> Result<Vec<f64>, PredictError> {
        rows.iter()
            .map(|row| {
                if row.len() != self.num_feature {
                    return Err(PredictError::FeatureShapeError {
                        stage: "model",
                        expected: self.num_feature,
                        actual: row.len(),
                    });
                }
                Ok(self.predict_row(row) as f64)
            })
            .collect()
    }

    fn num_features(&self) -> usize {
        self.num_feature
    }

    fn name(&self) -> &str {
        &self.description
    }
}

/// Accepts both `"1.5E2"` and the bracketed `"[1.5E2]"` written by newer releases
fn parse_base_score(raw: &str) -> Result<f32, String> {
    let trimmed = raw.trim().trim_start_matches('[').trim_end_matches(']').trim();
    trimmed
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("invalid base_score {raw:?}"))
}

//! Records exchanged with models and produced by an evaluation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::item::Item;
use super::response::Response;

/// Auxiliary per-trial columns forwarded to `predict` and `adapt`.
pub type Optionals = BTreeMap<String, Value>;

/// Demographic context passed to `start_participant`.
pub type Demographics = BTreeMap<String, Value>;

/// One training trial handed to `pre_train`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingRecord {
    pub id: Value,
    pub sequence: Value,
    pub item: Item,

    /// Decoded response of the trial.
    pub response: Response,

    /// Every other column of the row, verbatim.
    pub fields: BTreeMap<String, Value>,
}

/// One scored trial of one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub model: String,
    pub id: Value,
    pub domain: String,
    pub sequence: Value,
    pub task: String,
    pub choices: String,
    pub truth: Response,

    /// Display form of the prediction.
    pub prediction: String,
    pub hit: f64,
}

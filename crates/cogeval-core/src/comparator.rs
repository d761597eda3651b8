//! Scoring predictions against recorded responses.

use serde::{Deserialize, Serialize};

use crate::domain::Response;

/// Decides how well a prediction matches the truth.
pub trait Comparator: Send + Sync {
    /// Score in `[0, 1]`; `1.0` is a hit.
    fn compare(&self, prediction: &Response, truth: &Response) -> f64;

    /// Display form stored in the result table.
    fn format(&self, prediction: &Response) -> String {
        prediction.encode()
    }
}

/// Exact match on the canonical encoding.
///
/// Comparing encodings makes an undecoded prediction and its decoded
/// counterpart score as equal.
#[derive(Debug, Clone, Copy, Default)]
pub struct EqualityComparator;

impl Comparator for EqualityComparator {
    fn compare(&self, prediction: &Response, truth: &Response) -> f64 {
        if prediction.encode() == truth.encode() {
            1.0
        } else {
            0.0
        }
    }
}

/// Comparators selectable from configuration.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ComparatorKind {
    #[default]
    Equality,
}

impl ComparatorKind {
    pub fn build(self) -> Box<dyn Comparator> {
        match self {
            ComparatorKind::Equality => Box::new(EqualityComparator),
        }
    }
}

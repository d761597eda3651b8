//! Subject identifier reconciliation between training and test data.
//!
//! When the caller does not assert that both datasets share identifier
//! meaning, training ids are renumbered densely to `[0, T)` and test ids to
//! `[T, T + S)`, both in first-occurrence order.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::dataset::Dataset;
use crate::domain::error::Result;

/// Old-to-new identifier pairs applied to each dataset.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IdentityRemap {
    pub train: Vec<(Value, Value)>,
    pub test: Vec<(Value, Value)>,
}

impl IdentityRemap {
    /// Identifier a renumbered training subject had in its source file.
    pub fn original_train(&self, id: &Value) -> Option<&Value> {
        original(&self.train, id)
    }

    /// Identifier a renumbered test subject had in its source file.
    pub fn original_test(&self, id: &Value) -> Option<&Value> {
        original(&self.test, id)
    }
}

fn original<'a>(pairs: &'a [(Value, Value)], id: &Value) -> Option<&'a Value> {
    pairs
        .iter()
        .find(|(_, renumbered)| renumbered == id)
        .map(|(old, _)| old)
}

/// Validate both datasets and renumber identifiers unless they correspond.
///
/// Returns `None` when identifiers were left untouched.
pub fn reconcile_identities(
    test: &mut Dataset,
    train: Option<&mut Dataset>,
    corresponding_data: bool,
) -> Result<Option<IdentityRemap>> {
    test.validate_schema("test")?;
    let train = match train {
        Some(train) => {
            train.validate_schema("training")?;
            train
        }
        None => return Ok(None),
    };
    if corresponding_data {
        debug!("training and test identifiers declared corresponding");
        return Ok(None);
    }

    let train_pairs = renumber(train, 0);
    let test_pairs = renumber(test, train_pairs.len());
    debug!(
        train_subjects = train_pairs.len(),
        test_subjects = test_pairs.len(),
        "remapped subject identifiers"
    );

    Ok(Some(IdentityRemap {
        train: train_pairs,
        test: test_pairs,
    }))
}

fn renumber(dataset: &mut Dataset, offset: usize) -> Vec<(Value, Value)> {
    let pairs: Vec<(Value, Value)> = dataset
        .distinct("id")
        .into_iter()
        .enumerate()
        .map(|(idx, old)| (old, Value::from((offset + idx) as u64)))
        .collect();

    let lookup: HashMap<String, Value> = pairs
        .iter()
        .map(|(old, new)| (old.to_string(), new.clone()))
        .collect();

    dataset.map_column("id", |old| {
        lookup
            .get(&old.to_string())
            .cloned()
            .unwrap_or_else(|| old.clone())
    });
    pairs
}

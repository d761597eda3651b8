//! Stimulus descriptions handed to models.

use serde::Serialize;
use serde_json::Value;

use super::response::split_parts;

/// A single stimulus presented to a model.
///
/// Built fresh for every predict and adapt call and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Item {
    identifier: Value,
    domain: String,
    task: String,
    response_type: String,
    choices: String,
}

impl Item {
    pub fn new(
        identifier: Value,
        domain: impl Into<String>,
        task: impl Into<String>,
        response_type: impl Into<String>,
        choices: impl Into<String>,
    ) -> Self {
        Self {
            identifier,
            domain: domain.into(),
            task: task.into(),
            response_type: response_type.into(),
            choices: choices.into(),
        }
    }

    /// Subject identifier the item is presented to.
    pub fn identifier(&self) -> &Value {
        &self.identifier
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Raw task encoding.
    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn response_type(&self) -> &str {
        &self.response_type
    }

    /// Raw choices encoding.
    pub fn choices(&self) -> &str {
        &self.choices
    }

    /// Task premises split on `/`, each split on `;`.
    pub fn task_parts(&self) -> Vec<Vec<String>> {
        split_parts(&self.task)
    }

    /// Choice options split on `|`, each split like a task.
    pub fn choice_options(&self) -> Vec<Vec<Vec<String>>> {
        self.choices.split('|').map(split_parts).collect()
    }
}

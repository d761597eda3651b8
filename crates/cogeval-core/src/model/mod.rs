//! Model capability contract and model loading.
//!
//! # Modules
//!
//! - [`loader`]: manifest discovery, `ModelCatalog`, `ModelLoader`
//! - [`baseline`]: `constant` and `frequency` reference models

pub mod baseline;
pub mod loader;

use std::collections::BTreeSet;

use serde_json::Value;

use crate::domain::{Demographics, Item, Optionals, Response, TrainingRecord};

pub use baseline::{ConstantModel, FrequencyModel};
pub use loader::{LoadContext, LoadedModel, ModelCatalog, ModelFactory, ModelLoader};

/// A stateful predictive model driven through the evaluation lifecycle.
///
/// The engine calls `pre_train` once on the loaded instance, then for each
/// subject works on a [`Model::fork`] of it: `start_participant`, followed by
/// `predict` and `adapt` for every trial in sequence order.
pub trait Model: Send {
    fn name(&self) -> &str;

    fn supported_domains(&self) -> BTreeSet<String>;

    fn supported_response_types(&self) -> BTreeSet<String>;

    /// Train on every training subject, each ordered by sequence.
    fn pre_train(&mut self, _dataset: &[Vec<TrainingRecord>]) -> anyhow::Result<()> {
        Ok(())
    }

    fn start_participant(&mut self, _id: &Value, _demographics: &Demographics) -> anyhow::Result<()> {
        Ok(())
    }

    fn predict(&mut self, item: &Item, optionals: &Optionals) -> anyhow::Result<Response>;

    /// Observe the true response to a trial.
    fn adapt(&mut self, _item: &Item, _truth: &Response, _optionals: &Optionals) -> anyhow::Result<()> {
        Ok(())
    }

    /// Independent copy of the current state.
    ///
    /// Nothing done to the copy may be visible through `self`.
    fn fork(&self) -> Box<dyn Model>;
}

//! Reference models bundled with the default catalog.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;

use super::loader::{LoadContext, ModelCatalog};
use super::Model;
use crate::domain::{Demographics, Item, Optionals, Response, TrainingRecord};

/// Register `constant` and `frequency` in a catalog.
pub fn register_baselines(catalog: &mut ModelCatalog) {
    catalog.register("constant", |params, ctx| {
        let model: Box<dyn Model> = Box::new(ConstantModel::from_params(params, ctx)?);
        Ok(model)
    });
    catalog.register("frequency", |params, _ctx| {
        let model: Box<dyn Model> = Box::new(FrequencyModel::from_params(params)?);
        Ok(model)
    });
}

fn parse_params<T: for<'de> Deserialize<'de> + Default>(params: &Value) -> anyhow::Result<T> {
    if params.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(params.clone()).context("invalid model params")
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConstantParams {
    name: Option<String>,
    #[serde(default)]
    domains: BTreeSet<String>,
    #[serde(default)]
    response_types: BTreeSet<String>,
    response: Option<Response>,

    /// File holding the encoded response, relative to the manifest.
    response_file: Option<PathBuf>,
}

/// Predicts the same response for every item.
#[derive(Debug, Clone)]
pub struct ConstantModel {
    name: String,
    domains: BTreeSet<String>,
    response_types: BTreeSet<String>,
    response: Response,
}

impl ConstantModel {
    pub fn new(
        name: impl Into<String>,
        domains: BTreeSet<String>,
        response_types: BTreeSet<String>,
        response: Response,
    ) -> Self {
        Self {
            name: name.into(),
            domains,
            response_types,
            response,
        }
    }

    fn from_params(params: &Value, ctx: &LoadContext) -> anyhow::Result<Self> {
        let params: ConstantParams = parse_params(params)?;
        let response = match (params.response, params.response_file) {
            (Some(response), _) => response,
            (None, Some(file)) => {
                let path = ctx.resolve(&file);
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("read response file {:?}", path))?;
                Response::Encoded(raw.trim().to_string())
            }
            (None, None) => anyhow::bail!("constant model needs `response` or `response_file`"),
        };
        Ok(Self::new(
            params.name.unwrap_or_else(|| "constant".to_string()),
            params.domains,
            params.response_types,
            response,
        ))
    }
}

impl Model for ConstantModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn supported_domains(&self) -> BTreeSet<String> {
        self.domains.clone()
    }

    fn supported_response_types(&self) -> BTreeSet<String> {
        self.response_types.clone()
    }

    fn predict(&mut self, item: &Item, _optionals: &Optionals) -> anyhow::Result<Response> {
        Ok(self.response.clone().decode(item.response_type())?)
    }

    fn fork(&self) -> Box<dyn Model> {
        Box::new(self.clone())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FrequencyParams {
    name: Option<String>,
    #[serde(default)]
    domains: BTreeSet<String>,
    #[serde(default)]
    response_types: BTreeSet<String>,
}

type Counts = HashMap<String, BTreeMap<String, usize>>;

/// Predicts the most frequent response seen for the same task.
///
/// The participant's own history (from `adapt`) wins over the population
/// history (from `pre_train`). Without either, the first choice option is
/// predicted. Ties go to the lexicographically smallest encoding.
#[derive(Debug, Clone)]
pub struct FrequencyModel {
    name: String,
    domains: BTreeSet<String>,
    response_types: BTreeSet<String>,
    population: Counts,
    personal: Counts,
}

impl FrequencyModel {
    pub fn new(
        name: impl Into<String>,
        domains: BTreeSet<String>,
        response_types: BTreeSet<String>,
    ) -> Self {
        Self {
            name: name.into(),
            domains,
            response_types,
            population: Counts::new(),
            personal: Counts::new(),
        }
    }

    fn from_params(params: &Value) -> anyhow::Result<Self> {
        let params: FrequencyParams = parse_params(params)?;
        Ok(Self::new(
            params.name.unwrap_or_else(|| "frequency".to_string()),
            params.domains,
            params.response_types,
        ))
    }

    /// Observations recorded for the current participant.
    pub fn personal_observations(&self) -> usize {
        self.personal.values().flat_map(|c| c.values()).sum()
    }
}

fn observe(counts: &mut Counts, task: &str, response: &Response) {
    *counts
        .entry(task.to_string())
        .or_default()
        .entry(response.encode())
        .or_insert(0) += 1;
}

fn most_frequent(counts: &Counts, task: &str) -> Option<String> {
    counts
        .get(task)?
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(response, _)| response.clone())
}

impl Model for FrequencyModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn supported_domains(&self) -> BTreeSet<String> {
        self.domains.clone()
    }

    fn supported_response_types(&self) -> BTreeSet<String> {
        self.response_types.clone()
    }

    fn pre_train(&mut self, dataset: &[Vec<TrainingRecord>]) -> anyhow::Result<()> {
        for record in dataset.iter().flatten() {
            observe(&mut self.population, record.item.task(), &record.response);
        }
        Ok(())
    }

    fn start_participant(&mut self, _id: &Value, _demographics: &Demographics) -> anyhow::Result<()> {
        self.personal.clear();
        Ok(())
    }

    fn predict(&mut self, item: &Item, _optionals: &Optionals) -> anyhow::Result<Response> {
        let encoded = most_frequent(&self.personal, item.task())
            .or_else(|| most_frequent(&self.population, item.task()))
            .or_else(|| item.choices().split('|').next().map(str::to_string))
            .unwrap_or_default();
        Ok(Response::Encoded(encoded).decode(item.response_type())?)
    }

    fn adapt(&mut self, item: &Item, truth: &Response, _optionals: &Optionals) -> anyhow::Result<()> {
        observe(&mut self.personal, item.task(), truth);
        Ok(())
    }

    fn fork(&self) -> Box<dyn Model> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(task: &str) -> Item {
        Item::new(json!(1), "syllogistic", task, "single-choice", "Aac|Eac|NVC")
    }

    fn training(task: &str, response: &str) -> TrainingRecord {
        TrainingRecord {
            id: json!(0),
            sequence: json!(0),
            item: item(task),
            response: Response::from(response).decode("single-choice").unwrap(),
            fields: BTreeMap::new(),
        }
    }

    #[test]
    fn test_constant_predicts_decoded_response() {
        let mut model = ConstantModel::new(
            "nvc",
            BTreeSet::new(),
            BTreeSet::new(),
            Response::from("NVC"),
        );
        let prediction = model.predict(&item("AA1"), &Optionals::new()).unwrap();
        assert_eq!(prediction, Response::Single(vec![vec!["NVC".to_string()]]));
    }

    #[test]
    fn test_constant_params_require_response() {
        let ctx = LoadContext::new(PathBuf::from("/tmp"), Vec::new());
        assert!(ConstantModel::from_params(&json!({}), &ctx).is_err());

        let model = ConstantModel::from_params(
            &json!({"name": "c", "domains": ["syllogistic"], "response": "Aac"}),
            &ctx,
        )
        .unwrap();
        assert_eq!(model.name(), "c");
        assert!(model.supported_domains().contains("syllogistic"));
    }

    #[test]
    fn test_constant_reads_response_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("answer.txt"), "Eac\n").unwrap();
        let ctx = LoadContext::new(dir.path().to_path_buf(), Vec::new());

        let mut model =
            ConstantModel::from_params(&json!({"response_file": "answer.txt"}), &ctx).unwrap();
        assert_eq!(model.name(), "constant");
        let prediction = model.predict(&item("AA1"), &Optionals::new()).unwrap();
        assert_eq!(prediction.encode(), "Eac");
    }

    #[test]
    fn test_frequency_falls_back_to_first_choice() {
        let mut model = FrequencyModel::from_params(&Value::Null).unwrap();
        assert_eq!(model.name(), "frequency");
        let prediction = model.predict(&item("AA1"), &Optionals::new()).unwrap();
        assert_eq!(prediction.encode(), "Aac");
    }

    #[test]
    fn test_frequency_uses_population_then_personal() {
        let mut model = FrequencyModel::new("f", BTreeSet::new(), BTreeSet::new());
        model
            .pre_train(&[
                vec![training("AA1", "Aac"), training("AA1", "NVC")],
                vec![training("AA1", "NVC")],
            ])
            .unwrap();

        let optionals = Optionals::new();
        assert_eq!(
            model.predict(&item("AA1"), &optionals).unwrap().encode(),
            "NVC"
        );

        let truth = Response::from("Eac").decode("single-choice").unwrap();
        model.adapt(&item("AA1"), &truth, &optionals).unwrap();
        assert_eq!(
            model.predict(&item("AA1"), &optionals).unwrap().encode(),
            "Eac"
        );
        assert_eq!(model.personal_observations(), 1);
    }

    #[test]
    fn test_frequency_ties_pick_smallest_encoding() {
        let mut model = FrequencyModel::new("f", BTreeSet::new(), BTreeSet::new());
        model
            .pre_train(&[vec![training("AA1", "NVC"), training("AA1", "Aac")]])
            .unwrap();
        assert_eq!(
            model.predict(&item("AA1"), &Optionals::new()).unwrap().encode(),
            "Aac"
        );
    }

    #[test]
    fn test_fork_isolates_state() {
        let base = FrequencyModel::new("f", BTreeSet::new(), BTreeSet::new());
        let mut fork = base.fork();
        let truth = Response::from("Eac").decode("single-choice").unwrap();
        fork.adapt(&item("AA1"), &truth, &Optionals::new()).unwrap();

        assert_eq!(base.personal_observations(), 0);
        let mut again = base.fork();
        assert_eq!(
            again.predict(&item("AA1"), &Optionals::new()).unwrap().encode(),
            "Aac"
        );
    }
}

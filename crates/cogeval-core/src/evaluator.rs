//! Evaluation engine.
//!
//! For every model in order: load the manifest, instantiate, check that the
//! model covers every domain and response type in the data, pre-train once
//! on the training data if present, then replay each test subject through a
//! fresh fork of the pre-trained model. Each trial is predicted, scored and
//! then adapted to before the next trial of the same subject.
//!
//! Applicability failures are recorded against the model and the run
//! continues with the next model. Any other error aborts the run. The model
//! is unloaded before moving on either way.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::comparator::{Comparator, EqualityComparator};
use crate::config::Benchmark;
use crate::dataset::{distinct_values, field, is_required, value_text, Dataset, Row, Subject};
use crate::domain::error::{EvalError, Result};
use crate::domain::{Demographics, Item, Optionals, Response, ResultRow, TrainingRecord};
use crate::identity::{reconcile_identities, IdentityRemap};
use crate::model::{LoadedModel, Model, ModelCatalog, ModelLoader};
use crate::results::ResultTable;

/// Demographic columns forwarded to `start_participant` when present.
pub const DEMOGRAPHIC_FIELDS: [&str; 5] = ["age", "gender", "education", "affinity", "experience"];

/// Keys a training record sets itself; same-named columns are not copied.
const TRAINING_KEYS: [&str; 4] = ["id", "sequence", "item", "response"];

/// A model skipped because it does not cover the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of a full evaluation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvaluationReport {
    pub results: ResultTable,
    pub failures: Vec<ModelFailure>,
}

/// Drives models over a test dataset and scores their predictions.
pub struct Evaluator {
    models: Vec<PathBuf>,
    test: Dataset,
    train: Option<Dataset>,
    domains: BTreeSet<String>,
    response_types: BTreeSet<String>,
    remap: Option<IdentityRemap>,
    loader: ModelLoader,
    comparator: Box<dyn Comparator>,
}

impl Evaluator {
    /// Validate and reconcile the datasets and collect the domain and
    /// response type registry.
    pub fn new(
        models: Vec<PathBuf>,
        mut test: Dataset,
        mut train: Option<Dataset>,
        corresponding_data: bool,
    ) -> Result<Self> {
        let remap = reconcile_identities(&mut test, train.as_mut(), corresponding_data)?;

        let mut domains = test.distinct_text("domain");
        let mut response_types = test.distinct_text("response_type");
        if let Some(train) = &train {
            domains.extend(train.distinct_text("domain"));
            response_types.extend(train.distinct_text("response_type"));
        }

        Ok(Self {
            models,
            test,
            train,
            domains,
            response_types,
            remap,
            loader: ModelLoader::new(ModelCatalog::with_baselines()),
            comparator: Box::new(EqualityComparator),
        })
    }

    /// Load the datasets named by a benchmark.
    pub fn from_benchmark(benchmark: &Benchmark) -> Result<Self> {
        let test = Dataset::from_path(&benchmark.test)?;
        let train = benchmark
            .train
            .as_deref()
            .map(Dataset::from_path)
            .transpose()?;
        let evaluator = Self::new(
            benchmark.models.clone(),
            test,
            train,
            benchmark.corresponding_data,
        )?;
        Ok(evaluator.with_comparator(benchmark.comparator.build()))
    }

    pub fn with_loader(mut self, loader: ModelLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_comparator(mut self, comparator: Box<dyn Comparator>) -> Self {
        self.comparator = comparator;
        self
    }

    pub fn domains(&self) -> &BTreeSet<String> {
        &self.domains
    }

    pub fn response_types(&self) -> &BTreeSet<String> {
        &self.response_types
    }

    pub fn test_data(&self) -> &Dataset {
        &self.test
    }

    pub fn train_data(&self) -> Option<&Dataset> {
        self.train.as_ref()
    }

    /// Identifier renumbering applied at construction, if any.
    pub fn identity_remap(&self) -> Option<&IdentityRemap> {
        self.remap.as_ref()
    }

    pub fn loader(&self) -> &ModelLoader {
        &self.loader
    }

    /// Evaluate every model in order.
    pub fn evaluate(&mut self) -> Result<EvaluationReport> {
        let training = self
            .train
            .as_ref()
            .map(|train| training_sequences(train, self.remap.as_ref()))
            .transpose()?;

        let mut report = EvaluationReport::default();
        let total = self.models.len();
        for (idx, path) in self.models.iter().enumerate() {
            info!(model = %path.display(), "Evaluating model ({}/{})", idx + 1, total);

            let unit = self.loader.load(path)?;
            let outcome = self.evaluate_unit(&unit, training.as_deref());
            self.loader.unload(unit);

            match outcome {
                Ok(rows) => {
                    info!(model = %path.display(), trials = rows.len(), "Model evaluated");
                    report.results.extend(rows);
                }
                Err(err) if err.is_model_scoped() => {
                    warn!(model = %path.display(), error = %err, "Skipping model");
                    report.failures.push(ModelFailure {
                        path: path.clone(),
                        error: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        Ok(report)
    }

    fn evaluate_unit(
        &self,
        unit: &LoadedModel,
        training: Option<&[Vec<TrainingRecord>]>,
    ) -> Result<Vec<ResultRow>> {
        let mut pre_model = self.loader.instantiate(unit)?;
        self.check_applicability(pre_model.as_ref())?;

        if let Some(training) = training {
            let name = pre_model.name().to_string();
            debug!(model = %name, subjects = training.len(), "Pre-training");
            pre_model
                .pre_train(training)
                .map_err(|err| EvalError::hook(&name, "pre_train", err))?;
        }

        let mut rows = Vec::new();
        for subject in self.test.subjects() {
            let mut model = pre_model.fork();
            self.simulate_subject(model.as_mut(), &subject, &mut rows)?;
        }
        Ok(rows)
    }

    fn check_applicability(&self, model: &dyn Model) -> Result<()> {
        let supported = model.supported_domains();
        let missing: Vec<String> = self.domains.difference(&supported).cloned().collect();
        if !missing.is_empty() {
            return Err(EvalError::UnsupportedDomain {
                model: model.name().to_string(),
                domains: missing,
            });
        }

        let supported = model.supported_response_types();
        let missing: Vec<String> = self
            .response_types
            .difference(&supported)
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(EvalError::UnsupportedResponseType {
                model: model.name().to_string(),
                response_types: missing,
            });
        }
        Ok(())
    }

    fn simulate_subject(
        &self,
        model: &mut dyn Model,
        subject: &Subject<'_>,
        rows: &mut Vec<ResultRow>,
    ) -> Result<()> {
        let name = model.name().to_string();
        let source_id = self
            .remap
            .as_ref()
            .and_then(|remap| remap.original_test(subject.id))
            .unwrap_or(subject.id);
        let demographics = self.extract_demographics(subject);
        debug!(model = %name, subject = %subject.id, trials = subject.rows.len(), "Starting participant");
        model
            .start_participant(subject.id, &demographics)
            .map_err(|err| EvalError::hook(&name, "start_participant", err))?;

        for row in &subject.rows {
            let trial = Trial::from_row(subject.id, source_id, row)?;
            let optionals = extract_optionals(row);

            let prediction = model
                .predict(&trial.item(), &optionals)
                .map_err(|err| EvalError::hook(&name, "predict", err))?;
            let hit = self.comparator.compare(&prediction, &trial.truth);

            model
                .adapt(&trial.item(), &trial.truth, &optionals)
                .map_err(|err| EvalError::hook(&name, "adapt", err))?;

            rows.push(ResultRow {
                model: model.name().to_string(),
                id: subject.id.clone(),
                prediction: self.comparator.format(&prediction),
                hit,
                domain: trial.domain,
                sequence: trial.sequence,
                task: trial.task,
                choices: trial.choices,
                truth: trial.truth,
            });
        }
        Ok(())
    }

    /// Distinct demographic values of a subject, scalar when unique.
    fn extract_demographics(&self, subject: &Subject<'_>) -> Demographics {
        DEMOGRAPHIC_FIELDS
            .iter()
            .filter(|column| self.test.has_column(column))
            .map(|column| {
                let mut values =
                    distinct_values(subject.rows.iter().map(|row| field(row, column)));
                let value = if values.len() == 1 {
                    values.remove(0)
                } else {
                    Value::Array(values)
                };
                (column.to_string(), value)
            })
            .collect()
    }
}

/// Columns outside the required schema.
fn extract_optionals(row: &Row) -> Optionals {
    row.iter()
        .filter(|(column, _)| !is_required(column))
        .map(|(column, value)| (column.clone(), value.clone()))
        .collect()
}

/// Required fields of one trial with the truth decoded.
struct Trial {
    identifier: Value,
    domain: String,
    task: String,
    response_type: String,
    choices: String,
    sequence: Value,
    truth: Response,
}

impl Trial {
    /// `source_id` is the identifier reported when the truth is malformed.
    fn from_row(subject: &Value, source_id: &Value, row: &Row) -> Result<Self> {
        let response_type = value_text(field(row, "response_type"));
        let sequence = field(row, "sequence").clone();
        let truth = cell_response(field(row, "response"))
            .decode(&response_type)
            .map_err(|source| EvalError::Decode {
                subject: value_text(source_id),
                sequence: value_text(&sequence),
                source,
            })?;

        Ok(Self {
            identifier: subject.clone(),
            domain: value_text(field(row, "domain")),
            task: value_text(field(row, "task")),
            response_type,
            choices: value_text(field(row, "choices")),
            sequence,
            truth,
        })
    }

    /// A freshly built item; predict and adapt each get their own.
    fn item(&self) -> Item {
        Item::new(
            self.identifier.clone(),
            self.domain.clone(),
            self.task.clone(),
            self.response_type.clone(),
            self.choices.clone(),
        )
    }
}

fn cell_response(value: &Value) -> Response {
    Response::Encoded(value_text(value))
}

/// Training subjects in grouping order, each sorted by sequence.
fn training_sequences(
    train: &Dataset,
    remap: Option<&IdentityRemap>,
) -> Result<Vec<Vec<TrainingRecord>>> {
    train
        .subjects()
        .iter()
        .map(|subject| {
            let source_id = remap
                .and_then(|remap| remap.original_train(subject.id))
                .unwrap_or(subject.id);
            subject
                .rows
                .iter()
                .map(|row| training_record(subject.id, source_id, row))
                .collect::<Result<Vec<_>>>()
        })
        .collect()
}

fn training_record(subject: &Value, source_id: &Value, row: &Row) -> Result<TrainingRecord> {
    let trial = Trial::from_row(subject, source_id, row)?;
    let fields: BTreeMap<String, Value> = row
        .iter()
        .filter(|(column, _)| !TRAINING_KEYS.contains(&column.as_str()))
        .map(|(column, value)| (column.clone(), value.clone()))
        .collect();

    Ok(TrainingRecord {
        id: subject.clone(),
        item: trial.item(),
        sequence: trial.sequence,
        response: trial.truth,
        fields,
    })
}

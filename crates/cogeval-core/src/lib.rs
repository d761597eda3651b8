//! cogeval core library
//!
//! Replays recorded per-subject response sequences through predictive
//! models and scores each prediction against the recorded response.

pub mod comparator;
pub mod config;
pub mod dataset;
pub mod domain;
pub mod evaluator;
pub mod identity;
pub mod model;
pub mod reporting;
pub mod results;
pub mod telemetry;

pub use comparator::{Comparator, ComparatorKind, EqualityComparator};
pub use config::{search_path_from_env, Benchmark, MODEL_PATH_ENV};
pub use dataset::{Dataset, Row, Subject, REQUIRED_FIELDS};
pub use domain::{
    DecodeError, Demographics, EvalError, Item, Optionals, Response, Result, ResultRow,
    TrainingRecord, MULTIPLE_CHOICE,
};
pub use evaluator::{EvaluationReport, Evaluator, ModelFailure, DEMOGRAPHIC_FIELDS};
pub use identity::{reconcile_identities, IdentityRemap};
pub use model::{
    ConstantModel, FrequencyModel, LoadContext, LoadedModel, Model, ModelCatalog, ModelFactory,
    ModelLoader,
};
pub use reporting::{
    file_digest, render_summary_md, write_summary_json, RunSummaryArtifact,
    SUMMARY_SCHEMA_VERSION,
};
pub use results::{ModelAccuracy, ResultTable, RESULT_COLUMNS};
pub use telemetry::init_tracing;

/// cogeval version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Benchmark configuration.
//!
//! A benchmark file is JSON:
//!
//! ```json
//! {
//!   "data.test": "data/test.csv",
//!   "data.train": "data/train.csv",
//!   "corresponding_data": false,
//!   "models": ["models/frequency.json"],
//!   "comparator": "equality"
//! }
//! ```
//!
//! Relative paths are resolved against the benchmark file's directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::comparator::ComparatorKind;
use crate::domain::error::Result;

/// Environment variable holding extra model resource roots.
pub const MODEL_PATH_ENV: &str = "COGEVAL_MODEL_PATH";

/// One evaluation run: datasets, models and scoring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Benchmark {
    #[serde(rename = "data.test", alias = "test")]
    pub test: PathBuf,

    #[serde(rename = "data.train", alias = "train", default)]
    pub train: Option<PathBuf>,

    /// Training and test ids refer to the same subjects.
    #[serde(default)]
    pub corresponding_data: bool,

    pub models: Vec<PathBuf>,

    #[serde(default)]
    pub comparator: ComparatorKind,
}

impl Benchmark {
    pub fn new(test: PathBuf, models: Vec<PathBuf>) -> Self {
        Self {
            test,
            train: None,
            corresponding_data: false,
            models,
            comparator: ComparatorKind::default(),
        }
    }

    pub fn with_train(mut self, train: PathBuf) -> Self {
        self.train = Some(train);
        self
    }

    pub fn with_corresponding_data(mut self, corresponding_data: bool) -> Self {
        self.corresponding_data = corresponding_data;
        self
    }

    /// Parse a benchmark file and resolve its paths.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let benchmark: Benchmark = serde_json::from_str(&content)?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(benchmark.resolve_relative(base))
    }

    /// Join every relative path onto `base`.
    pub fn resolve_relative(mut self, base: &Path) -> Self {
        let join = |p: PathBuf| if p.is_absolute() { p } else { base.join(p) };
        self.test = join(self.test);
        self.train = self.train.map(join);
        self.models = self.models.into_iter().map(join).collect();
        self
    }
}

/// Model resource roots listed in [`MODEL_PATH_ENV`].
pub fn search_path_from_env() -> Vec<PathBuf> {
    std::env::var_os(MODEL_PATH_ENV)
        .map(|paths| std::env::split_paths(&paths).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dotted_keys() {
        let benchmark: Benchmark = serde_json::from_str(
            r#"{"data.test": "t.csv", "data.train": "tr.csv", "models": ["m.json"], "type": "prediction"}"#,
        )
        .unwrap();
        assert_eq!(benchmark.test, PathBuf::from("t.csv"));
        assert_eq!(benchmark.train, Some(PathBuf::from("tr.csv")));
        assert!(!benchmark.corresponding_data);
        assert_eq!(benchmark.comparator, ComparatorKind::Equality);
    }

    #[test]
    fn test_parse_short_keys() {
        let benchmark: Benchmark = serde_json::from_str(
            r#"{"test": "t.csv", "models": [], "corresponding_data": true}"#,
        )
        .unwrap();
        assert!(benchmark.train.is_none());
        assert!(benchmark.corresponding_data);
    }

    #[test]
    fn test_from_path_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("bench.json");
        std::fs::write(
            &file,
            r#"{"data.test": "data/test.csv", "models": ["models/m.json", "/abs/m.json"]}"#,
        )
        .unwrap();

        let benchmark = Benchmark::from_path(&file).unwrap();
        assert_eq!(benchmark.test, dir.path().join("data/test.csv"));
        assert_eq!(benchmark.models[0], dir.path().join("models/m.json"));
        assert_eq!(benchmark.models[1], PathBuf::from("/abs/m.json"));
    }

    #[test]
    fn test_builder() {
        let benchmark = Benchmark::new(PathBuf::from("t.csv"), vec![PathBuf::from("m.json")])
            .with_train(PathBuf::from("tr.csv"))
            .with_corresponding_data(true);
        assert_eq!(benchmark.train, Some(PathBuf::from("tr.csv")));
        assert!(benchmark.corresponding_data);
    }
}

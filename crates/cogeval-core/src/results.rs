//! Append-only result table.

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dataset::value_text;
use crate::domain::error::Result;
use crate::domain::ResultRow;

/// Output column order.
pub const RESULT_COLUMNS: [&str; 9] = [
    "model",
    "id",
    "domain",
    "sequence",
    "task",
    "choices",
    "truth",
    "prediction",
    "hit",
];

/// Mean hit of one model over its scored trials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelAccuracy {
    pub model: String,
    pub trials: usize,
    pub hits: f64,
    pub accuracy: f64,
}

/// Scored trials in model, subject, sequence order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultTable {
    rows: Vec<ResultRow>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: ResultRow) {
        self.rows.push(row);
    }

    pub fn extend(&mut self, rows: impl IntoIterator<Item = ResultRow>) {
        self.rows.extend(rows);
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Per-model accuracy, models in first-appearance order.
    pub fn accuracy_by_model(&self) -> Vec<ModelAccuracy> {
        let mut summary: Vec<ModelAccuracy> = Vec::new();
        for row in &self.rows {
            let pos = match summary.iter().position(|s| s.model == row.model) {
                Some(pos) => pos,
                None => {
                    summary.push(ModelAccuracy {
                        model: row.model.clone(),
                        trials: 0,
                        hits: 0.0,
                        accuracy: 0.0,
                    });
                    summary.len() - 1
                }
            };
            summary[pos].trials += 1;
            summary[pos].hits += row.hit;
        }
        for entry in &mut summary {
            entry.accuracy = entry.hits / entry.trials as f64;
        }
        summary
    }

    /// Write the table as CSV with a header row.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<()> {
        let mut out = csv::Writer::from_writer(writer);
        out.write_record(RESULT_COLUMNS)?;
        for row in &self.rows {
            out.write_record([
                row.model.clone(),
                value_text(&row.id),
                row.domain.clone(),
                value_text(&row.sequence),
                row.task.clone(),
                row.choices.clone(),
                row.truth.encode(),
                row.prediction.clone(),
                row.hit.to_string(),
            ])?;
        }
        out.flush()?;
        Ok(())
    }

    pub fn write_csv_path(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_csv(io::BufWriter::new(file))
    }
}

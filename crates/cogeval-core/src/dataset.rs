//! Tabular response datasets.
//!
//! A dataset is an ordered list of rows keyed by column name. The stimulus
//! and response columns always keep their recorded text. Any other column
//! becomes numeric only when every non-empty cell in it converts to a
//! number that prints back exactly as written, so `007` or `1.50` keep the
//! whole column textual. Empty cells outside the text columns are `null`.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io;
use std::path::Path;

use serde_json::{Number, Value};

use crate::domain::error::{EvalError, Result};

/// Columns every dataset must provide.
pub const REQUIRED_FIELDS: [&str; 7] = [
    "id",
    "domain",
    "response_type",
    "task",
    "choices",
    "response",
    "sequence",
];

/// Required columns whose cells are never converted to numbers.
const TEXT_FIELDS: [&str; 5] = ["domain", "response_type", "task", "choices", "response"];

/// One dataset row.
pub type Row = BTreeMap<String, Value>;

static MISSING: Value = Value::Null;

/// An ordered table of response records.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Row>,
}

/// All rows sharing one subject id, ordered by `sequence`.
#[derive(Debug, Clone)]
pub struct Subject<'a> {
    pub id: &'a Value,
    pub rows: Vec<&'a Row>,
}

impl Dataset {
    /// Load a comma-separated file with a header row.
    pub fn from_path(path: &Path) -> Result<Self> {
        let reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
        Self::from_csv(reader)
    }

    /// Load comma-separated data with a header row from any reader.
    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self> {
        Self::from_csv(csv::ReaderBuilder::new().has_headers(true).from_reader(reader))
    }

    fn from_csv<R: io::Read>(mut reader: csv::Reader<R>) -> Result<Self> {
        let columns: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let records = reader
            .records()
            .collect::<std::result::Result<Vec<csv::StringRecord>, csv::Error>>()?;

        let kinds: Vec<CellKind> = columns
            .iter()
            .enumerate()
            .map(|(idx, column)| CellKind::infer(column, records.iter().filter_map(|r| r.get(idx))))
            .collect();

        let rows: Vec<Row> = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .zip(&kinds)
                    .zip(record.iter())
                    .map(|((column, kind), cell)| (column.clone(), kind.cell(cell)))
                    .collect()
            })
            .collect();

        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Fail with a schema error naming every missing required column.
    pub fn validate_schema(&self, dataset: &str) -> Result<()> {
        let missing: Vec<String> = REQUIRED_FIELDS
            .iter()
            .filter(|field| !self.has_column(field))
            .map(|field| field.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(EvalError::Schema {
                dataset: dataset.to_string(),
                missing,
            })
        }
    }

    /// Distinct values of a column in first-occurrence order.
    pub fn distinct(&self, column: &str) -> Vec<Value> {
        distinct_values(self.rows.iter().map(|row| field(row, column)))
    }

    /// Distinct values of a column rendered as text.
    pub fn distinct_text(&self, column: &str) -> BTreeSet<String> {
        self.rows
            .iter()
            .map(|row| value_text(field(row, column)))
            .collect()
    }

    /// Group rows by `id` in first-occurrence order, each group sorted by
    /// `sequence` (stable, so ties keep file order).
    pub fn subjects(&self) -> Vec<Subject<'_>> {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut subjects: Vec<Subject<'_>> = Vec::new();

        for row in &self.rows {
            let id = field(row, "id");
            let slot = *index.entry(id.to_string()).or_insert_with(|| {
                subjects.push(Subject {
                    id,
                    rows: Vec::new(),
                });
                subjects.len() - 1
            });
            subjects[slot].rows.push(row);
        }

        for subject in &mut subjects {
            subject
                .rows
                .sort_by(|a, b| compare_values(field(a, "sequence"), field(b, "sequence")));
        }
        subjects
    }

    /// Rewrite every value of one column in place.
    pub(crate) fn map_column(&mut self, column: &str, mut f: impl FnMut(&Value) -> Value) {
        for row in &mut self.rows {
            let updated = f(field(row, column));
            row.insert(column.to_string(), updated);
        }
    }
}

/// Whether a column belongs to the required schema.
pub fn is_required(column: &str) -> bool {
    REQUIRED_FIELDS.contains(&column)
}

/// Cell of a row, `null` when absent.
pub fn field<'a>(row: &'a Row, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&MISSING)
}

/// Text form of a cell: strings unquoted, `null` empty.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Order two cells numerically when both are numbers, textually otherwise.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => value_text(a).cmp(&value_text(b)),
    }
}

/// Deduplicate values keeping first occurrences.
pub(crate) fn distinct_values<'a>(values: impl Iterator<Item = &'a Value>) -> Vec<Value> {
    let mut seen: Vec<Value> = Vec::new();
    for value in values {
        if !seen.contains(value) {
            seen.push(value.clone());
        }
    }
    seen
}

/// How the cells of one column are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    /// Recorded text, empty cells included.
    Text,
    /// Text with empty cells as `null`.
    Optional,
    /// Numbers with empty cells as `null`.
    Numeric,
}

impl CellKind {
    fn infer<'a>(column: &str, mut cells: impl Iterator<Item = &'a str>) -> Self {
        if TEXT_FIELDS.contains(&column) {
            return CellKind::Text;
        }
        let numeric = cells.all(|cell| {
            let cell = cell.trim();
            cell.is_empty() || exact_number(cell).is_some()
        });
        if numeric {
            CellKind::Numeric
        } else {
            CellKind::Optional
        }
    }

    fn cell(self, raw: &str) -> Value {
        let raw = raw.trim();
        match self {
            CellKind::Text => Value::String(raw.to_string()),
            _ if raw.is_empty() => Value::Null,
            CellKind::Numeric => {
                exact_number(raw).unwrap_or_else(|| Value::String(raw.to_string()))
            }
            CellKind::Optional => Value::String(raw.to_string()),
        }
    }
}

/// The number `raw` denotes, if printing it gives back `raw` unchanged.
fn exact_number(raw: &str) -> Option<Value> {
    let value = if let Ok(i) = raw.parse::<i64>() {
        Value::from(i)
    } else {
        Value::Number(raw.parse::<f64>().ok().and_then(Number::from_f64)?)
    };
    (value.to_string() == raw).then_some(value)
}

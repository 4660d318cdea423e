//! Tabular training source.
//!
//! Reads the same flat file the registry writes, but only the five
//! risk-relevant columns, and fails loudly on anything it cannot use.

use std::path::Path;

use crate::csv::{Row, Table};
use crate::error::{DataError, DataResult};
use crate::record::split_symptoms;
use crate::registry::parse_bool;

use super::features::FeatureVector;

/// Columns a training file must provide.
pub const REQUIRED_COLUMNS: [&str; 5] = [
    "age",
    "prev_pregnancies",
    "prev_complications",
    "missed_anc",
    "symptoms",
];

/// Derived feature vectors for a whole batch, in file order.
#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    pub features: Vec<FeatureVector>,
}

impl TrainingSet {
    pub fn new(features: Vec<FeatureVector>) -> Self {
        Self { features }
    }

    /// Read and derive features from a CSV file.
    pub fn from_csv(path: &Path) -> DataResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| DataError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&content, path)
    }

    /// Derive features from CSV text. `origin` is only used in error messages.
    pub fn parse(content: &str, origin: &Path) -> DataResult<Self> {
        let table = Table::parse(content);

        let mut columns = [0usize; 5];
        for (slot, name) in columns.iter_mut().zip(REQUIRED_COLUMNS) {
            *slot = table.column(name).ok_or_else(|| DataError::MissingColumn {
                path: origin.display().to_string(),
                column: name.into(),
            })?;
        }

        let features = table
            .rows
            .iter()
            .map(|row| derive_row(row, &columns))
            .collect::<DataResult<Vec<_>>>()?;

        Ok(Self { features })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

fn derive_row(row: &Row, columns: &[usize; 5]) -> DataResult<FeatureVector> {
    let [age, prev_pregnancies, prev_complications, missed_anc, symptoms] = *columns;

    let count = |idx: usize, name: &str| -> DataResult<u32> {
        let raw = row.get(idx).trim();
        raw.parse().map_err(|_| DataError::InvalidValue {
            line: row.line,
            column: name.into(),
            value: raw.into(),
        })
    };

    let complications_raw = row.get(prev_complications).trim();
    let complications = parse_bool(complications_raw).ok_or_else(|| DataError::InvalidValue {
        line: row.line,
        column: "prev_complications".into(),
        value: complications_raw.into(),
    })?;

    Ok(FeatureVector::new(
        count(age, "age")?,
        count(prev_pregnancies, "prev_pregnancies")?,
        complications,
        count(missed_anc, "missed_anc")?,
        split_symptoms(row.get(symptoms)).len() as u32,
    ))
}

//! Explicit mapping between risk categories and classifier class indices.
//!
//! The table is built from the labels actually seen in training, ordered by
//! severity, and is persisted alongside the classifier. Decoding never infers
//! a category from position alone: an index outside the table is rejected.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::record::RiskLevel;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    /// `classes[i]` is the category for class index `i`.
    classes: Vec<RiskLevel>,
}

impl LabelEncoder {
    /// Build the table from the distinct labels in `labels`.
    pub fn fit(labels: &[RiskLevel]) -> Self {
        let mut classes: Vec<RiskLevel> = labels.to_vec();
        classes.sort();
        classes.dedup();
        Self { classes }
    }

    /// Class index for `level`, if it was seen during fitting.
    pub fn encode(&self, level: RiskLevel) -> Option<usize> {
        self.classes.iter().position(|c| *c == level)
    }

    /// Encode a whole label column. Every label must be in the table.
    pub fn encode_all(&self, labels: &[RiskLevel]) -> ModelResult<Vec<usize>> {
        labels
            .iter()
            .map(|l| {
                self.encode(*l).ok_or_else(|| ModelError::UnknownLabel {
                    label: l.to_string(),
                })
            })
            .collect()
    }

    pub fn decode(&self, index: usize) -> ModelResult<RiskLevel> {
        self.classes
            .get(index)
            .copied()
            .ok_or(ModelError::UnknownClass {
                index,
                classes: self.classes.len(),
            })
    }

    pub fn classes(&self) -> &[RiskLevel] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

//! Feature derivation: a pure function from a record to five numbers.
//!
//! No range validation happens here. Counts are unsigned, so negative values
//! are already rejected when records are parsed; ages pass through as given.

use serde::{Deserialize, Serialize};

use crate::record::Mother;

/// Number of features the classifier consumes.
pub const N_FEATURES: usize = 5;

/// Feature column names, in [`FeatureVector::as_array`] order.
pub const FEATURE_NAMES: [&str; N_FEATURES] = [
    "age",
    "prev_pregnancies",
    "prev_complications",
    "missed_anc",
    "symptoms_count",
];

/// Risk-relevant view of one record. Recomputed on every prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureVector {
    pub age: u32,
    pub prev_pregnancies: u32,
    /// 0 or 1.
    pub prev_complications: u8,
    pub missed_anc: u32,
    pub symptoms_count: u32,
}

impl FeatureVector {
    pub fn new(
        age: u32,
        prev_pregnancies: u32,
        prev_complications: bool,
        missed_anc: u32,
        symptoms_count: u32,
    ) -> Self {
        Self {
            age,
            prev_pregnancies,
            prev_complications: u8::from(prev_complications),
            missed_anc,
            symptoms_count,
        }
    }

    pub fn from_mother(mother: &Mother) -> Self {
        Self::new(
            mother.age,
            mother.prev_pregnancies,
            mother.prev_complications,
            mother.missed_anc,
            mother.symptoms.len() as u32,
        )
    }

    pub fn has_complications(&self) -> bool {
        self.prev_complications != 0
    }

    /// Dense numeric form used by the classifier.
    pub fn as_array(&self) -> [f64; N_FEATURES] {
        [
            f64::from(self.age),
            f64::from(self.prev_pregnancies),
            f64::from(self.prev_complications),
            f64::from(self.missed_anc),
            f64::from(self.symptoms_count),
        ]
    }
}

impl From<&Mother> for FeatureVector {
    fn from(mother: &Mother) -> Self {
        Self::from_mother(mother)
    }
}

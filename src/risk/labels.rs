//! Rule-based label generation for synthetic training targets.
//!
//! The cascade runs in severity order and a later rule overwrites an earlier
//! one: every vector starts `low`, is raised to `medium` by any moderate
//! factor, then to `high` by any severe factor. These labels only ever feed
//! training; predictions always come from the trained classifier.

use crate::config::RiskRules;
use crate::record::RiskLevel;

use super::features::FeatureVector;

/// Label one feature vector.
pub fn label(fv: &FeatureVector, rules: &RiskRules) -> RiskLevel {
    let mut level = RiskLevel::Low;

    if is_moderate(fv, rules) {
        level = RiskLevel::Medium;
    }
    if is_severe(fv, rules) {
        level = RiskLevel::High;
    }

    level
}

/// Label a batch, preserving order.
pub fn label_batch(features: &[FeatureVector], rules: &RiskRules) -> Vec<RiskLevel> {
    features.iter().map(|fv| label(fv, rules)).collect()
}

fn is_moderate(fv: &FeatureVector, rules: &RiskRules) -> bool {
    fv.age < rules.low_age_threshold
        || fv.age > rules.high_age_threshold
        || fv.has_complications()
        || fv.symptoms_count > rules.symptom_count_medium_threshold
        || fv.missed_anc > rules.missed_anc_medium_threshold
}

fn is_severe(fv: &FeatureVector, rules: &RiskRules) -> bool {
    fv.age < rules.extreme_low_age_threshold
        || fv.age > rules.extreme_high_age_threshold
        || fv.symptoms_count > rules.symptom_count_high_threshold
        || fv.missed_anc > rules.missed_anc_high_threshold
}

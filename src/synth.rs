//! Seeded synthetic cohorts for demos, benchmarks and tests.
//!
//! The two stock sample records are too few to train anything meaningful,
//! so `furha init --synthetic N` fills the registry from here instead.

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::record::{Mother, RiskLevel};

/// Symptoms the front end can report.
pub const SYMPTOMS: [&str; 5] = ["bleeding", "severe_pain", "fever", "headache", "swelling"];

const LANGUAGES: [&str; 3] = ["Rendille", "Samburu", "Swahili"];

/// Generate `n` distinct mothers. The same `(n, seed, today)` yields the same cohort.
pub fn synthetic_cohort(n: usize, seed: u64, today: NaiveDate) -> Vec<Mother> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|i| synthetic_mother(&mut rng, i, today)).collect()
}

fn synthetic_mother(rng: &mut StdRng, i: usize, today: NaiveDate) -> Mother {
    let weeks_pregnant: i64 = rng.gen_range(4..40);
    let lmp = today - Duration::weeks(weeks_pregnant);

    let n_symptoms = match rng.gen_range(0..10) {
        0..=5 => 0,
        6..=7 => 1,
        8 => 2,
        _ => rng.gen_range(3..=SYMPTOMS.len()),
    };
    let symptoms = SYMPTOMS
        .choose_multiple(rng, n_symptoms)
        .map(|s| s.to_string())
        .collect();

    Mother {
        phone_number: format!("+2547{:08}", i),
        national_id: format!("{:08}", 10_000_000 + i),
        language: LANGUAGES[rng.gen_range(0..LANGUAGES.len())].to_string(),
        edd: lmp + Duration::days(crate::record::GESTATION_DAYS),
        lmp,
        age: rng.gen_range(13..=46),
        prev_pregnancies: rng.gen_range(0..=6),
        prev_complications: rng.gen_bool(0.2),
        risk_level: RiskLevel::Low,
        anc_visits: rng.gen_range(0..=8),
        missed_anc: match rng.gen_range(0..10) {
            0..=4 => 0,
            5..=6 => 1,
            7..=8 => 2,
            _ => rng.gen_range(3..=5),
        },
        last_contact: None,
        symptoms,
    }
}

// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # furha
//!
//! Maternal-health engagement prototype: a USSD front end for registering
//! pregnant mothers, simulated voice follow-up, a reporting dashboard, and a
//! risk engine that sorts mothers into `low` / `medium` / `high` categories.
//!
//! ## Architecture
//!
//! - **Risk engine** (`risk`): feature derivation, a rule-based label cascade,
//!   a seeded random forest, and a persisted (classifier, encoder) artifact
//! - **Registry** (`registry`): CSV-backed store of [`record::Mother`] records
//! - **USSD** (`ussd`): per-phone menu state machine
//! - **Voice** (`voice`): composed, logged outbound calls
//! - **Dashboard** (`dashboard`): summary statistics, text and HTML rendering
//!
//! ## Library usage
//!
//! ```no_run
//! use furha::registry::MotherRegistry;
//! use furha::risk::{RiskEngine, RiskEngineConfig};
//!
//! let engine = RiskEngine::new(RiskEngineConfig::default());
//! let report = engine.train("sample_data/sample_mothers.csv".as_ref()).unwrap();
//! println!("{report}");
//!
//! let registry = MotherRegistry::open("sample_data/sample_mothers.csv").unwrap();
//! for mother in engine.identify_high_risk(registry.mothers()) {
//!     println!("{} needs attention", mother.phone_number);
//! }
//! ```

pub mod config;
pub mod csv;
pub mod dashboard;
pub mod error;
pub mod record;
pub mod registry;
pub mod risk;
pub mod synth;
pub mod ussd;
pub mod voice;

//! Risk assessment engine.
//!
//! The pipeline runs in two directions:
//!
//! - **Training**: tabular records → [`features`] → rule-based [`labels`] →
//!   [`encoder`] → seeded 80/20 split → [`forest`] fit → [`artifact`] persisted.
//! - **Inference**: persisted [`artifact`] + derived features → predicted category.
//!
//! [`engine::RiskEngine`] owns both directions and the lazily loaded artifact.

pub mod artifact;
pub mod dataset;
pub mod encoder;
pub mod engine;
pub mod features;
pub mod forest;
pub mod labels;

pub use engine::{RiskEngine, RiskEngineConfig, TrainingReport};
pub use features::FeatureVector;

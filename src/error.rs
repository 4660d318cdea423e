//! Rich diagnostic error types for the furha prototype.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for furha.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, source spans) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum FurhaError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Training data errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum DataError {
    #[error("failed to read training data: {path}")]
    #[diagnostic(
        code(furha::data::io),
        help(
            "The training source could not be opened. Check that the file exists \
             and is readable, or run `furha init` to seed the sample registry."
        )
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("training data {path} is missing required column \"{column}\"")]
    #[diagnostic(
        code(furha::data::missing_column),
        help(
            "The header row must name every risk-relevant column: \
             age, prev_pregnancies, prev_complications, missed_anc, symptoms."
        )
    )]
    MissingColumn { path: String, column: String },

    #[error("invalid value {value:?} for column \"{column}\" on line {line}")]
    #[diagnostic(
        code(furha::data::invalid_value),
        help(
            "Counts and ages must be non-negative integers and \
             prev_complications must be True/False (or 1/0)."
        )
    )]
    InvalidValue {
        line: usize,
        column: String,
        value: String,
    },

    #[error("training data has {rows} usable row(s); at least {required} are needed")]
    #[diagnostic(
        code(furha::data::too_few_rows),
        help("The held-out split needs at least one row on each side. Add more records.")
    )]
    TooFewRows { rows: usize, required: usize },
}

// ---------------------------------------------------------------------------
// Model artifact errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ModelError {
    #[error("model artifact I/O error at {path}")]
    #[diagnostic(
        code(furha::model::io),
        help(
            "A filesystem operation on the models directory failed. Check that it \
             exists, is writable, and that the disk is not full."
        )
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(furha::model::serde),
        help(
            "Failed to serialize or deserialize the model artifact. \
             The stored format may be from an incompatible build; retrain with `furha train`."
        )
    )]
    Serialization { message: String },

    #[error("class index {index} is outside the label encoder table ({classes} classes)")]
    #[diagnostic(
        code(furha::model::unknown_class),
        help(
            "The classifier and label encoder disagree. \
             They must come from the same training run; retrain with `furha train`."
        )
    )]
    UnknownClass { index: usize, classes: usize },

    #[error("label \"{label}\" is not in the label encoder table")]
    #[diagnostic(
        code(furha::model::unknown_label),
        help("Labels must be encoded with the encoder fitted on the same training batch.")
    )]
    UnknownLabel { label: String },

    #[error("cannot fit a classifier on an empty training set")]
    #[diagnostic(
        code(furha::model::empty_training_set),
        help("Provide at least one labelled row.")
    )]
    EmptyTrainingSet,
}

// ---------------------------------------------------------------------------
// Registry errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum RegistryError {
    #[error("registry file I/O error: {path}")]
    #[diagnostic(
        code(furha::registry::io),
        help("Check that the registry file's directory exists and is writable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("registry file {path} is missing column \"{column}\"")]
    #[diagnostic(
        code(furha::registry::missing_column),
        help(
            "The registry CSV needs at least phone_number, national_id, language, \
             edd, lmp, age, prev_pregnancies and prev_complications."
        )
    )]
    MissingColumn { path: String, column: String },

    #[error("invalid value {value:?} for \"{column}\" on line {line} of {path}")]
    #[diagnostic(
        code(furha::registry::invalid_value),
        help("Dates use YYYY-MM-DD, counts are non-negative integers, booleans are True/False.")
    )]
    InvalidValue {
        path: String,
        line: usize,
        column: String,
        value: String,
    },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(furha::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    #[diagnostic(
        code(furha::config::parse),
        help("Check the TOML syntax. Run `furha init` to write a default config.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(furha::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {message}")]
    #[diagnostic(code(furha::config::invalid), help("{message}"))]
    Invalid { message: String },
}

pub type DataResult<T> = std::result::Result<T, DataError>;
pub type ModelResult<T> = std::result::Result<T, ModelError>;
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Convenience alias for functions returning furha results.
pub type FurhaResult<T> = std::result::Result<T, FurhaError>;

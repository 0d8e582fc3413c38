use serde::{Deserialize, Serialize};
use strum_macros::Display;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Unable to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to parse JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unable to parse CSV in {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("Unknown view: {0}")]
    UnknownView(String),
}

/// Rejections raised while defining an ensemble. None of them mutate state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("ensemble name must not be empty")]
    EmptyName,

    #[error("ensemble {name} needs at least two distinct member models, got {count}")]
    TooFewMembers { name: String, count: usize },

    #[error("an ensemble named {0} already exists")]
    DuplicateEnsemble(String),

    #[error("ensemble name {0} collides with an evaluated model")]
    NameCollidesWithModel(String),

    #[error("ensemble {name} references unknown model {model}")]
    UnknownMember { name: String, model: String },

    #[error("ensemble {name} has invalid weight {weight} for model {model}")]
    InvalidWeight {
        name: String,
        model: String,
        weight: f64,
    },

    #[error("ensemble {name} has a weight for non-member model {model}")]
    WeightForNonMember { name: String, model: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Dimension {
    Records,
    Model,
    Subject,
    Year,
    ResponseTime,
    Tokens,
    ErrorOverlap,
    CommonFailure,
    Difficulty,
    TestSet,
}

/// Non-fatal: a requested grouping produced no matching records. The caller
/// still receives an empty or zero aggregate alongside this marker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyGroupWarning {
    pub dimension: Dimension,
    pub detail: String,
}

impl EmptyGroupWarning {
    pub fn new(dimension: Dimension, detail: impl Into<String>) -> Self {
        let warning = EmptyGroupWarning {
            dimension,
            detail: detail.into(),
        };
        log::warn!("No data for {}: {}", warning.dimension, warning.detail);
        warning
    }
}

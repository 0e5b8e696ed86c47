use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single scoring or assignment computation.
///
/// These are fatal to the computation that raised them only; the sweep
/// catches them per record and excludes that record from every statistic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoreError {
    #[error("hero index {index} is outside the catalog (len {len})")]
    InvalidHeroIndex { index: usize, len: usize },

    #[error("role assignment needs exactly 5 heroes, got {len}")]
    IncompleteTeam { len: usize },

    #[error("hero index {index} appears more than once in a team")]
    RepeatedHero { index: usize },
}

/// Catalog load failures. All of them are unrecoverable and surface before
/// any match is processed.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse catalog {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("catalog is missing required table `{0}`")]
    MissingTable(&'static str),

    #[error("malformed catalog: {0}")]
    Shape(String),
}

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("failed to read match corpus {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed match corpus: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Validation(String),
}

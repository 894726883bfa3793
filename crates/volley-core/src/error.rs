// Error types shared across the engine.

use thiserror::Error;

/// Failures surfaced by resolution and summary computation.
///
/// Every variant is a user-recoverable condition: callers map them to a
/// structured response instead of propagating them as faults.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A structurally required column was missing from the ingested table.
    #[error("column '{column}' not found in dataset")]
    Schema { column: String },

    /// The approximate matcher found nothing at or above the threshold.
    #[error("no close match for '{query}'{}", closest_hint(.closest, .score))]
    NoMatch {
        query: String,
        closest: Option<String>,
        score: Option<u8>,
    },

    #[error("unknown dataset '{0}'")]
    UnknownDataset(String),

    #[error("no dataset has been ingested")]
    NoDataset,
}

fn closest_hint(closest: &Option<String>, score: &Option<u8>) -> String {
    match (closest, score) {
        (Some(name), Some(score)) => format!("; closest candidate '{name}' scored {score}"),
        _ => String::new(),
    }
}

/// Failures while reading a tabular source file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("validation error: {0}")]
    Validation(String),
}

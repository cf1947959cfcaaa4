//! Error types for synth-planner
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)
//!
//! Two tiers:
//! - [`Error`]: the operation could not produce a result at all.
//! - [`Warning`]: a local, recoverable failure scoped to one candidate, one
//!   pairwise pair, or one experiment. Warnings travel inside reports and never
//!   abort the computation for unrelated items.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// synth-planner error types
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid input (bad argument, malformed record)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Settings file is inconsistent
    #[error("Invalid configuration: {0}\nCheck the settings file (Precursors, Target, Temperatures, ...)")]
    InvalidConfig(String),

    /// Chemical formula could not be parsed
    #[error("Cannot parse chemical formula '{formula}': {reason}")]
    FormulaParse {
        /// Offending formula text
        formula: String,
        /// What went wrong
        reason: String,
    },

    /// Persisted artifact is malformed
    #[error("Storage error: {0}")]
    StorageError(String),

    /// A recoverable planning failure escalated to a hard error
    #[error(transparent)]
    Planning(#[from] Warning),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow/CSV error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Recoverable failures reported alongside a result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Warning {
    /// No precursor subset balances against the target (+ byproducts)
    #[error("Infeasible configuration: {target} cannot be mass-balanced from any precursor subset\nAdd precursors or allowed byproducts that cover every element of the target")]
    InfeasibleConfiguration {
        /// Target formula
        target: String,
    },

    /// Phase Energy Oracle has no entry for a phase at a temperature
    #[error("Oracle miss: no energy for {formula} at {temperature} C\nThe affected candidate or pairwise inference was excluded, not scored as zero")]
    OracleMiss {
        /// Formula that was looked up
        formula: String,
        /// Temperature (C) of the lookup
        temperature: f64,
    },

    /// No reaction pathway reproduces an observed outcome
    #[error("Unresolved attribution: {precursors} at {temperature} C left unexplained phases [{residual}]\nThe experiment stays in history but no pairwise reaction was inferred from it")]
    UnresolvedAttribution {
        /// Tested precursor set
        precursors: String,
        /// Tested temperature (C)
        temperature: f64,
        /// Observed phases no hypothesis could produce
        residual: String,
    },

    /// Two pairwise records disagree on the same pair
    #[error("Store conflict for {pair}: existing '{existing}' contradicts incoming '{incoming}'\nThe existing record was kept; resolve the pairwise database entry manually")]
    StoreConflict {
        /// Reactant pair
        pair: String,
        /// Record already in the store
        existing: String,
        /// Record that was rejected
        incoming: String,
    },
}

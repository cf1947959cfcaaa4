//! Experiment history
//!
//! This module provides the data structures for reported synthesis
//! outcomes, the feedback that drives pairwise inference and suggestion.
//!
//! ## Schema Overview
//!
//! ```text
//! ExperimentLog (1) ──< ExperimentRecord (N)
//!                          │
//!                          ├── PrecursorSet + amounts
//!                          ├── temperature
//!                          └──< (product phase, wt%) (N)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use synth_planner::chemistry::{Phase, PrecursorSet};
//! use synth_planner::experiment::{ExperimentLog, ExperimentRecord};
//!
//! let precursors = PrecursorSet::from_formulas(&["BaO", "CuO"])?;
//! let record = ExperimentRecord::builder(precursors, 700.0)
//!     .product(Phase::from_id("BaCuO2_63")?, 80.0)
//!     .product(Phase::new("CuO")?, 20.0)
//!     .build()?;
//!
//! let mut log = ExperimentLog::new();
//! log.add(record)?;
//! assert_eq!(log.len(), 1);
//! # Ok::<(), synth_planner::Error>(())
//! ```

mod experiment_record;
mod log;

pub use experiment_record::{
    ExperimentRecord, ExperimentRecordBuilder, FRACTION_MATCH_TOLERANCE, PURITY_THRESHOLD, WEIGHT_FRACTION_TOLERANCE,
};
pub use log::ExperimentLog;

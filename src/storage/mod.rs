//! Campaign artifacts on disk
//!
//! A campaign directory holds:
//!
//! | File | Content | Format |
//! |---|---|---|
//! | `Settings.json` | [`SynthesisConfig`] | JSON |
//! | `Energies.json` | [`TabulatedOracle`] energies | JSON |
//! | `Rxn_TD.csv` | candidate table | CSV via Arrow |
//! | `PairwiseRxns.csv` | pairwise reaction database | CSV via Arrow |
//! | `Exp.json` | experiment log | JSON |
//!
//! Tabular artifacts go through Arrow [`RecordBatch`]es so the same columns
//! can be handed to any Arrow consumer. Every artifact is rewritten whole;
//! there are no in-place row updates.

mod candidate_table;
mod experiment_log;
mod pairwise_table;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, Float64Array, StringArray};
use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use tracing::debug;

use crate::config::SynthesisConfig;
use crate::oracle::TabulatedOracle;
use crate::{Error, Result};

pub use candidate_table::{candidate_schema, load_candidates, save_candidates};
pub use experiment_log::{load_experiments, log_from_json, log_to_json, save_experiments, EXPERIMENT_LABEL};
pub use pairwise_table::{load_pairwise, pairwise_schema, save_pairwise, seed_pairwise};

/// Settings file name
pub const SETTINGS_FILE: &str = "Settings.json";
/// Energy table file name
pub const ENERGIES_FILE: &str = "Energies.json";
/// Candidate table file name
pub const CANDIDATES_FILE: &str = "Rxn_TD.csv";
/// Pairwise reaction database file name
pub const PAIRWISE_FILE: &str = "PairwiseRxns.csv";
/// Experiment log file name
pub const EXPERIMENTS_FILE: &str = "Exp.json";

/// Paths of one campaign directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignDir {
    root: PathBuf,
}

impl CampaignDir {
    /// Campaign rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Settings file path.
    #[must_use]
    pub fn settings(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }

    /// Energy table path.
    #[must_use]
    pub fn energies(&self) -> PathBuf {
        self.root.join(ENERGIES_FILE)
    }

    /// Candidate table path.
    #[must_use]
    pub fn candidates(&self) -> PathBuf {
        self.root.join(CANDIDATES_FILE)
    }

    /// Pairwise database path.
    #[must_use]
    pub fn pairwise(&self) -> PathBuf {
        self.root.join(PAIRWISE_FILE)
    }

    /// Experiment log path.
    #[must_use]
    pub fn experiments(&self) -> PathBuf {
        self.root.join(EXPERIMENTS_FILE)
    }
}

/// Load and validate a settings file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or fails validation.
pub fn load_config(path: impl AsRef<Path>) -> Result<SynthesisConfig> {
    let text = std::fs::read_to_string(path.as_ref())?;
    SynthesisConfig::from_json_str(&text)
}

/// Load an energy table, applying the configured atmosphere to gas energies.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_energies(path: impl AsRef<Path>, config: &SynthesisConfig) -> Result<TabulatedOracle> {
    Ok(TabulatedOracle::from_json_file(path)?.with_atmosphere(config.atmosphere()))
}

/// Write one batch as CSV with a header row.
pub(crate) fn write_csv(path: &Path, batch: &RecordBatch) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = arrow::csv::WriterBuilder::new().with_header(true).build(file);
    writer.write(batch)?;
    debug!(path = %path.display(), rows = batch.num_rows(), "csv written");
    Ok(())
}

/// Read a CSV file with a header row into one batch of `schema`.
pub(crate) fn read_csv(path: &Path, schema: Arc<Schema>) -> Result<RecordBatch> {
    let file = File::open(path)?;
    let reader = arrow::csv::ReaderBuilder::new(schema.clone())
        .with_header(true)
        .build(file)?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    let batch = arrow::compute::concat_batches(&schema, &batches)?;
    debug!(path = %path.display(), rows = batch.num_rows(), "csv read");
    Ok(batch)
}

/// Named UTF-8 column of `batch`.
pub(crate) fn string_column<'b>(batch: &'b RecordBatch, name: &str) -> Result<&'b StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| Error::StorageError(format!("missing column '{name}'")))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| Error::StorageError(format!("column '{name}' is not text")))
}

/// Named Float64 column of `batch`.
pub(crate) fn float_column<'b>(batch: &'b RecordBatch, name: &str) -> Result<&'b Float64Array> {
    batch
        .column_by_name(name)
        .ok_or_else(|| Error::StorageError(format!("missing column '{name}'")))?
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| Error::StorageError(format!("column '{name}' is not numeric")))
}

/// Text cell, empty for nulls.
pub(crate) fn text(array: &StringArray, row: usize) -> &str {
    if array.is_null(row) {
        ""
    } else {
        array.value(row)
    }
}

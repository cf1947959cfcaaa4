//! Pairwise reaction database as an Arrow batch / CSV
//!
//! One row per observation: `Pairwise reactants`, `Pairwise Products`
//! (or `None`), `Temperature Range`.

use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use tracing::{info, warn};

use super::{read_csv, string_column, text, write_csv};
use crate::pairwise::{format_products, Observation, PairwiseStore, ReactantPair, NO_REACTION};
use crate::{Error, Result, Warning};

const REACTANTS: &str = "Pairwise reactants";
const PRODUCTS: &str = "Pairwise Products";
const RANGE: &str = "Temperature Range";

/// Schema of the persisted pairwise database.
#[must_use]
pub fn pairwise_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new(REACTANTS, DataType::Utf8, false),
        Field::new(PRODUCTS, DataType::Utf8, false),
        Field::new(RANGE, DataType::Utf8, false),
    ]))
}

impl PairwiseStore {
    /// One row per observation, pairs in canonical order.
    ///
    /// # Errors
    ///
    /// Returns an error if Arrow rejects the columns.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let mut reactants = Vec::new();
        let mut products = Vec::new();
        let mut ranges = Vec::new();
        for (pair, observations) in self.iter() {
            for observation in observations {
                reactants.push(pair.to_string());
                products.push(
                    observation
                        .products()
                        .map_or_else(|| NO_REACTION.to_string(), format_products),
                );
                ranges.push(observation.describe());
            }
        }
        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(reactants)),
            Arc::new(StringArray::from(products)),
            Arc::new(StringArray::from(ranges)),
        ];
        Ok(RecordBatch::try_new(pairwise_schema(), columns)?)
    }

    /// Rebuild a store from a batch. Rows that contradict earlier rows are
    /// skipped and returned as warnings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageError`] for missing columns or malformed rows.
    pub fn from_record_batch(batch: &RecordBatch) -> Result<(Self, Vec<Warning>)> {
        let reactants = string_column(batch, REACTANTS)?;
        let products = string_column(batch, PRODUCTS)?;
        let ranges = string_column(batch, RANGE)?;

        let mut store = Self::new();
        let mut warnings = Vec::new();
        for row in 0..batch.num_rows() {
            let located = |e: Error| Error::StorageError(format!("pairwise row {}: {e}", row + 1));
            let pair = ReactantPair::parse(text(reactants, row)).map_err(located)?;
            let observation = Observation::parse(text(products, row), text(ranges, row)).map_err(located)?;
            if let Err(warning) = store.insert_observation(&pair, observation) {
                warn!(%warning, row = row + 1, "pairwise row skipped");
                warnings.push(warning);
            }
        }
        Ok((store, warnings))
    }
}

/// Write the pairwise database CSV.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn save_pairwise(store: &PairwiseStore, path: impl AsRef<Path>) -> Result<()> {
    write_csv(path.as_ref(), &store.to_record_batch()?)
}

/// Read a pairwise database CSV.
///
/// # Errors
///
/// Returns an error if the file cannot be read or a row is malformed.
pub fn load_pairwise(path: impl AsRef<Path>) -> Result<(PairwiseStore, Vec<Warning>)> {
    let batch = read_csv(path.as_ref(), pairwise_schema())?;
    PairwiseStore::from_record_batch(&batch)
}

/// Seed `store` with a pairwise database from a prior campaign.
///
/// Rows that contradict each other in the file, and imported observations that
/// contradict `store`, are skipped; both are returned as warnings. Existing
/// records always win.
///
/// # Errors
///
/// Returns an error if the file cannot be read or a row is malformed.
pub fn seed_pairwise(store: &mut PairwiseStore, path: impl AsRef<Path>) -> Result<Vec<Warning>> {
    let path = path.as_ref();
    let (seed, mut warnings) = load_pairwise(path)?;
    let before = store.len();
    let conflicts = store.import(&seed);
    info!(
        path = %path.display(),
        pairs = seed.len(),
        added = store.len() - before,
        conflicts = conflicts.len(),
        "pairwise store seeded"
    );
    warnings.extend(conflicts);
    Ok(warnings)
}

//! Experiment Log - ordered history of reported experiments
//!
//! The log is the suggestion engine's feedback memory: it answers "was this
//! (precursor set, temperature) already tested?" and "has the target been
//! made phase-pure yet?".

use tracing::debug;

use super::ExperimentRecord;
use crate::chemistry::{Phase, PrecursorSet};
use crate::{Error, Result};

/// Ordered, append-only experiment history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExperimentLog {
    records: Vec<ExperimentRecord>,
}

impl ExperimentLog {
    /// Create a new empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the same precursor set was already
    /// logged at the same temperature.
    pub fn add(&mut self, record: ExperimentRecord) -> Result<()> {
        if self.contains(record.precursors(), record.temperature()) {
            return Err(Error::InvalidInput(format!(
                "experiment {} at {} C is already logged",
                record.key(),
                record.temperature()
            )));
        }
        debug!(precursors = %record.precursors(), temperature = record.temperature(), "experiment logged");
        self.records.push(record);
        Ok(())
    }

    /// True if `precursors` was tested at `temperature`.
    #[must_use]
    pub fn contains(&self, precursors: &PrecursorSet, temperature: f64) -> bool {
        self.records.iter().any(|r| r.tests(precursors, temperature))
    }

    /// Record for `precursors` at `temperature`, if tested.
    #[must_use]
    pub fn get(&self, precursors: &PrecursorSet, temperature: f64) -> Option<&ExperimentRecord> {
        self.records.iter().find(|r| r.tests(precursors, temperature))
    }

    /// First record (in log order) in which `target` came out phase-pure.
    #[must_use]
    pub fn solved_by(&self, target: &Phase) -> Option<&ExperimentRecord> {
        self.records.iter().find(|r| r.is_phase_pure(target))
    }

    /// Records in log order.
    pub fn iter(&self) -> impl Iterator<Item = &ExperimentRecord> {
        self.records.iter()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when nothing was logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'a> IntoIterator for &'a ExperimentLog {
    type Item = &'a ExperimentRecord;
    type IntoIter = std::slice::Iter<'a, ExperimentRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(formulas: &[&str], temperature: f64, products: &[(&str, f64)]) -> ExperimentRecord {
        products
            .iter()
            .fold(
                ExperimentRecord::builder(PrecursorSet::from_formulas(formulas).unwrap(), temperature),
                |builder, (id, wt)| builder.product(Phase::from_id(id).unwrap(), *wt),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_log_rejects_duplicates() {
        let mut log = ExperimentLog::new();
        assert!(log.is_empty());
        log.add(record(&["BaO", "CuO"], 700.0, &[("BaCuO2", 100.0)])).unwrap();
        log.add(record(&["BaO", "CuO"], 800.0, &[("BaCuO2", 100.0)])).unwrap();
        assert_eq!(log.len(), 2);

        let duplicate = log.add(record(&["CuO", "BaO"], 700.0, &[("BaCuO2", 100.0)]));
        assert!(duplicate.is_err());
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_solved_by() {
        let mut log = ExperimentLog::new();
        log.add(record(&["BaO", "CuO"], 600.0, &[("BaO", 50.0), ("CuO", 50.0)])).unwrap();
        let target = Phase::new("BaCuO2").unwrap();
        assert!(log.solved_by(&target).is_none());

        log.add(record(&["BaO", "CuO"], 800.0, &[("BaCuO2_63", 100.0)])).unwrap();
        assert_eq!(log.solved_by(&target).map(ExperimentRecord::temperature), Some(800.0));
        assert!(log.contains(&PrecursorSet::from_formulas(&["BaO", "CuO"]).unwrap(), 600.0));
    }
}

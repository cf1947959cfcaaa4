//! Experiment Record - one tested precursor set at one temperature

use chrono::{DateTime, Utc};

use crate::chemistry::{Phase, PrecursorSet};
use crate::config::temperature_key;
use crate::{Error, Result};

/// Allowed deviation (wt%) of the weight-fraction sum from 100.
pub const WEIGHT_FRACTION_TOLERANCE: f64 = 5.0;

/// Target weight fraction (wt%) at which a product counts as phase-pure.
pub const PURITY_THRESHOLD: f64 = 99.5;

/// A predicted and an observed weight fraction (0-1) of the same phase agree
/// within this tolerance.
pub const FRACTION_MATCH_TOLERANCE: f64 = 0.10;

/// Experiment Record represents one reported synthesis outcome.
///
/// Weight fractions are stored in wt% (summing to 100), in the same order
/// as the products. Records are immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentRecord {
    precursors: PrecursorSet,
    amounts: Vec<f64>,
    temperature: f64,
    products: Vec<Phase>,
    weight_fractions: Vec<f64>,
    logged_at: DateTime<Utc>,
}

impl ExperimentRecord {
    /// Create a builder for an experiment on `precursors` at `temperature` (°C).
    #[must_use]
    pub fn builder(precursors: PrecursorSet, temperature: f64) -> ExperimentRecordBuilder {
        ExperimentRecordBuilder::new(precursors, temperature)
    }

    /// Tested precursor set.
    #[must_use]
    pub const fn precursors(&self) -> &PrecursorSet {
        &self.precursors
    }

    /// Precursor amounts, in precursor-set order.
    #[must_use]
    pub fn amounts(&self) -> &[f64] {
        &self.amounts
    }

    /// Precursor phases with their amounts.
    #[must_use]
    pub fn weighted_precursors(&self) -> Vec<(Phase, f64)> {
        self.precursors.iter().cloned().zip(self.amounts.iter().copied()).collect()
    }

    /// Tested temperature (°C).
    #[must_use]
    pub const fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Observed product phases, structure labels included.
    #[must_use]
    pub fn products(&self) -> &[Phase] {
        &self.products
    }

    /// Weight fractions (wt%), aligned with [`ExperimentRecord::products`].
    #[must_use]
    pub fn weight_fractions(&self) -> &[f64] {
        &self.weight_fractions
    }

    /// When the record was logged.
    #[must_use]
    pub const fn logged_at(&self) -> DateTime<Utc> {
        self.logged_at
    }

    /// Canonical precursor key (`"A, B, C"`).
    #[must_use]
    pub fn key(&self) -> String {
        self.precursors.key()
    }

    /// True if this record tested `precursors` at `temperature`.
    #[must_use]
    pub fn tests(&self, precursors: &PrecursorSet, temperature: f64) -> bool {
        &self.precursors == precursors && temperature_key(self.temperature) == temperature_key(temperature)
    }

    /// Observed phases with structure labels dropped, paired with fractions (0-1).
    /// Duplicate formulas are summed.
    #[must_use]
    pub fn phase_fractions(&self) -> Vec<(Phase, f64)> {
        let mut merged: Vec<(Phase, f64)> = Vec::new();
        for (phase, fraction) in self.products.iter().zip(&self.weight_fractions) {
            let phase = phase.without_polymorph();
            match merged.iter_mut().find(|(p, _)| *p == phase) {
                Some((_, total)) => *total += fraction / 100.0,
                None => merged.push((phase, fraction / 100.0)),
            }
        }
        merged.sort_by(|a, b| a.0.cmp(&b.0));
        merged
    }

    /// Weight fraction (0-1) of a phase, ignoring structure labels.
    #[must_use]
    pub fn fraction_of(&self, phase: &Phase) -> f64 {
        let phase = phase.without_polymorph();
        self.products
            .iter()
            .zip(&self.weight_fractions)
            .filter(|(p, _)| p.without_polymorph() == phase)
            .map(|(_, w)| w / 100.0)
            .sum()
    }

    /// True when `target` makes up the whole product.
    #[must_use]
    pub fn is_phase_pure(&self, target: &Phase) -> bool {
        self.fraction_of(target) * 100.0 >= PURITY_THRESHOLD
    }
}

/// Builder for `ExperimentRecord`.
#[derive(Debug)]
pub struct ExperimentRecordBuilder {
    precursors: PrecursorSet,
    temperature: f64,
    amounts: Vec<f64>,
    products: Vec<Phase>,
    weight_fractions: Vec<f64>,
    logged_at: DateTime<Utc>,
}

impl ExperimentRecordBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(precursors: PrecursorSet, temperature: f64) -> Self {
        Self {
            precursors,
            temperature,
            amounts: Vec::new(),
            products: Vec::new(),
            weight_fractions: Vec::new(),
            logged_at: Utc::now(),
        }
    }

    /// Set precursor amounts (precursor-set order). Defaults to 1 each.
    #[must_use]
    pub fn amounts(mut self, amounts: Vec<f64>) -> Self {
        self.amounts = amounts;
        self
    }

    /// Add one observed product with its weight fraction.
    #[must_use]
    pub fn product(mut self, phase: Phase, weight_fraction: f64) -> Self {
        self.products.push(phase);
        self.weight_fractions.push(weight_fraction);
        self
    }

    /// Set all observed products at once.
    #[must_use]
    pub fn products(mut self, products: Vec<Phase>, weight_fractions: Vec<f64>) -> Self {
        self.products = products;
        self.weight_fractions = weight_fractions;
        self
    }

    /// Set a custom log timestamp (useful for deserialization/testing).
    #[must_use]
    pub const fn logged_at(mut self, logged_at: DateTime<Utc>) -> Self {
        self.logged_at = logged_at;
        self
    }

    /// Validate and build the `ExperimentRecord`.
    ///
    /// Fractions summing to ~1 are read as mass fractions and scaled to wt%.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an empty precursor set or product
    /// list, mismatched list lengths, negative values, or fractions that do
    /// not sum to 100 within [`WEIGHT_FRACTION_TOLERANCE`].
    pub fn build(self) -> Result<ExperimentRecord> {
        let key = self.precursors.key();
        let invalid = |reason: String| Error::InvalidInput(format!("experiment {key} at {} C: {reason}", self.temperature));

        if self.precursors.is_empty() {
            return Err(invalid("no precursors".to_string()));
        }
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(invalid("invalid temperature".to_string()));
        }
        let amounts = if self.amounts.is_empty() {
            vec![1.0; self.precursors.len()]
        } else {
            self.amounts
        };
        if amounts.len() != self.precursors.len() {
            return Err(invalid(format!(
                "{} amounts for {} precursors",
                amounts.len(),
                self.precursors.len()
            )));
        }
        if amounts.iter().any(|a| !a.is_finite() || *a < 0.0) {
            return Err(invalid("negative precursor amount".to_string()));
        }
        if self.products.is_empty() {
            return Err(invalid("no products".to_string()));
        }
        if self.products.len() != self.weight_fractions.len() {
            return Err(invalid(format!(
                "{} weight fractions for {} products",
                self.weight_fractions.len(),
                self.products.len()
            )));
        }
        if self.weight_fractions.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(invalid("negative weight fraction".to_string()));
        }

        let mut weight_fractions = self.weight_fractions;
        let total: f64 = weight_fractions.iter().sum();
        if (total - 1.0).abs() <= 0.01 {
            weight_fractions.iter_mut().for_each(|w| *w *= 100.0);
        } else if (total - 100.0).abs() > WEIGHT_FRACTION_TOLERANCE {
            return Err(invalid(format!("weight fractions sum to {total}, expected 100")));
        }

        Ok(ExperimentRecord {
            precursors: self.precursors,
            amounts,
            temperature: self.temperature,
            products: self.products,
            weight_fractions,
            logged_at: self.logged_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(formulas: &[&str]) -> PrecursorSet {
        PrecursorSet::from_formulas(formulas).unwrap()
    }

    fn phase(id: &str) -> Phase {
        Phase::from_id(id).unwrap()
    }

    #[test]
    fn test_experiment_record_builder() {
        let record = ExperimentRecord::builder(set(&["Y2O3", "BaO2", "CuCO3"]), 700.0)
            .amounts(vec![2.0, 3.0, 0.5])
            .product(phase("BaCO3_62"), 40.0)
            .product(phase("CuO_15"), 35.0)
            .product(phase("Y2O3_206"), 25.0)
            .build()
            .unwrap();
        assert_eq!(record.key(), "BaO2, CuCO3, Y2O3");
        assert!((record.fraction_of(&phase("BaCO3")) - 0.40).abs() < 1e-12);
        assert!(!record.is_phase_pure(&phase("YBa2Cu3O6.5")));
        assert!(record.tests(&set(&["CuCO3", "BaO2", "Y2O3"]), 700.4));
        assert_eq!(record.phase_fractions().len(), 3);
    }

    #[test]
    fn test_fractions_of_one_are_rescaled() {
        let record = ExperimentRecord::builder(set(&["BaO", "CuO"]), 800.0)
            .product(phase("BaCuO2"), 1.0)
            .build()
            .unwrap();
        assert_eq!(record.weight_fractions(), &[100.0]);
        assert!(record.is_phase_pure(&phase("BaCuO2")));
        assert_eq!(record.amounts(), &[1.0, 1.0]);
    }

    #[test]
    fn test_build_rejects_bad_records() {
        let bad_sum = ExperimentRecord::builder(set(&["BaO", "CuO"]), 800.0)
            .product(phase("BaCuO2"), 50.0)
            .build();
        assert!(matches!(bad_sum, Err(Error::InvalidInput(_))));

        let no_products = ExperimentRecord::builder(set(&["BaO", "CuO"]), 800.0).build();
        assert!(no_products.is_err());

        let bad_amounts = ExperimentRecord::builder(set(&["BaO", "CuO"]), 800.0)
            .amounts(vec![1.0])
            .product(phase("BaCuO2"), 100.0)
            .build();
        assert!(bad_amounts.is_err());
    }
}

//! Candidate table as an Arrow batch / CSV
//!
//! Columns: `Precursors`, `Amounts`, `Products`, `Reaction energy (meV/atom)`.
//! Lists are `" + "`-joined; products carry their coefficients.

use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;

use super::{float_column, read_csv, string_column, text, write_csv};
use crate::candidates::{Candidate, CandidateTable};
use crate::chemistry::{Phase, PrecursorSet};
use crate::reaction::{Reaction, BALANCE_TOLERANCE};
use crate::{Error, Result};

const PRECURSORS: &str = "Precursors";
const AMOUNTS: &str = "Amounts";
const PRODUCTS: &str = "Products";
const ENERGY: &str = "Reaction energy (meV/atom)";

/// Schema of the persisted candidate table.
#[must_use]
pub fn candidate_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new(PRECURSORS, DataType::Utf8, false),
        Field::new(AMOUNTS, DataType::Utf8, false),
        Field::new(PRODUCTS, DataType::Utf8, false),
        Field::new(ENERGY, DataType::Float64, false),
    ]))
}

impl CandidateTable {
    /// One row per candidate, in rank order.
    ///
    /// # Errors
    ///
    /// Returns an error if Arrow rejects the columns.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let precursors: Vec<String> = self.iter().map(|c| c.precursors().to_string()).collect();
        let amounts: Vec<String> = self
            .iter()
            .map(|c| {
                c.amounts()
                    .iter()
                    .map(|a| format_amount(*a))
                    .collect::<Vec<_>>()
                    .join(" + ")
            })
            .collect();
        let products: Vec<String> = self.iter().map(Candidate::products_text).collect();
        let energies: Vec<f64> = self.iter().map(Candidate::energy).collect();

        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(precursors)),
            Arc::new(StringArray::from(amounts)),
            Arc::new(StringArray::from(products)),
            Arc::new(Float64Array::from(energies)),
        ];
        Ok(RecordBatch::try_new(candidate_schema(), columns)?)
    }

    /// Rebuild a table from a batch. Energies are taken as evaluated at
    /// `reference_temperature`.
    ///
    /// Product terms without coefficients are rebalanced against the
    /// precursors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageError`] for missing columns or malformed rows.
    pub fn from_record_batch(batch: &RecordBatch, reference_temperature: f64) -> Result<Self> {
        let precursors = string_column(batch, PRECURSORS)?;
        let amounts = string_column(batch, AMOUNTS)?;
        let products = string_column(batch, PRODUCTS)?;
        let energies = float_column(batch, ENERGY)?;

        let mut candidates = Vec::with_capacity(batch.num_rows());
        for row in 0..batch.num_rows() {
            let bad = |reason: String| Error::StorageError(format!("candidate row {}: {reason}", row + 1));
            let formulas: Vec<&str> = split_terms(text(precursors, row));
            let set = PrecursorSet::from_formulas(&formulas)?;
            let amounts: Vec<f64> = split_terms(text(amounts, row))
                .into_iter()
                .map(|a| a.parse::<f64>().map_err(|_| bad(format!("bad amount '{a}'"))))
                .collect::<Result<_>>()?;
            if amounts.len() != formulas.len() {
                return Err(bad(format!("{} amounts for {} precursors", amounts.len(), formulas.len())));
            }
            // Amounts follow the file's precursor order; the set is sorted.
            let weighted: Vec<(Phase, f64)> = formulas
                .iter()
                .map(|f| Phase::from_id(f).map(|p| p.without_polymorph()))
                .zip(amounts)
                .map(|(p, a)| p.map(|p| (p, a)))
                .collect::<Result<_>>()?;
            let product_terms = parse_products(text(products, row))?;
            let reaction = rebuild_reaction(&set, &weighted, product_terms);
            candidates.push(Candidate::new(set, reaction, energies.value(row)));
        }
        Ok(Self::new(reference_temperature, candidates))
    }
}

/// Write a candidate table CSV.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn save_candidates(table: &CandidateTable, path: impl AsRef<Path>) -> Result<()> {
    write_csv(path.as_ref(), &table.to_record_batch()?)
}

/// Read a candidate table CSV.
///
/// # Errors
///
/// Returns an error if the file cannot be read or a row is malformed.
pub fn load_candidates(path: impl AsRef<Path>, reference_temperature: f64) -> Result<CandidateTable> {
    let batch = read_csv(path.as_ref(), candidate_schema())?;
    CandidateTable::from_record_batch(&batch, reference_temperature)
}

fn split_terms(text: &str) -> Vec<&str> {
    text.split(" + ").map(str::trim).filter(|s| !s.is_empty()).collect()
}

/// `"YBa2Cu3O6.5 + 0.5 O2 + 3 CO2"` into (phase, coefficient or `None`).
fn parse_products(text: &str) -> Result<Vec<(Phase, Option<f64>)>> {
    split_terms(text)
        .into_iter()
        .map(|term| match term.split_once(' ') {
            Some((coefficient, formula)) if coefficient.parse::<f64>().is_ok() => {
                Ok((Phase::from_id(formula.trim())?, coefficient.parse().ok()))
            }
            _ => Ok((Phase::from_id(term)?, None)),
        })
        .collect()
}

fn rebuild_reaction(set: &PrecursorSet, weighted: &[(Phase, f64)], products: Vec<(Phase, Option<f64>)>) -> Reaction {
    let reactants: Vec<(Phase, f64)> = set
        .iter()
        .map(|phase| {
            let amount = weighted.iter().find(|(p, _)| p == phase).map_or(0.0, |(_, a)| *a);
            (phase.clone(), amount)
        })
        .collect();
    let product_phases: Vec<Phase> = products.iter().map(|(p, _)| p.clone()).collect();

    let with_coefficients: Vec<(Phase, f64)> = products.iter().map(|(p, c)| (p.clone(), c.unwrap_or(1.0))).collect();
    let explicit = Reaction::from_parts(reactants.clone(), with_coefficients);
    if explicit.is_mass_balanced(BALANCE_TOLERANCE) {
        return explicit;
    }
    // O2 taken up during the reaction is not listed among the precursors.
    let phases: Vec<Phase> = set.iter().cloned().collect();
    Reaction::balanced_with_gases(&phases, &product_phases, &[Phase::oxygen()], &[]).unwrap_or(explicit)
}

/// Amounts keep three decimals.
fn format_amount(amount: f64) -> String {
    let rounded = (amount * 1000.0).round() / 1000.0;
    format!("{rounded}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_products_with_coefficients() {
        let terms = parse_products("Ba2YCu3O6.5 + 0.5 O2 + 3 CO2").unwrap();
        assert_eq!(terms.len(), 3);
        assert_eq!(terms[0].1, None);
        assert_eq!(terms[1], (Phase::oxygen(), Some(0.5)));
        assert_eq!(terms[2], (Phase::carbon_dioxide(), Some(3.0)));
    }

    #[test]
    fn test_rebalances_bare_products() {
        let set = PrecursorSet::from_formulas(&["BaCO3", "CuO"]).unwrap();
        let weighted = vec![(Phase::new("BaCO3").unwrap(), 1.0), (Phase::new("CuO").unwrap(), 1.0)];
        let products = parse_products("BaCuO2 + CO2").unwrap();
        let reaction = rebuild_reaction(&set, &weighted, products);
        assert!(reaction.is_mass_balanced(BALANCE_TOLERANCE));
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(1.0), "1");
        assert_eq!(format_amount(0.33333), "0.333");
    }
}

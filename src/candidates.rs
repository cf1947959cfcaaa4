//! Candidate Generator
//!
//! Enumerates precursor subsets, balances each against the target plus
//! allowed byproducts, and scores the most favorable balance at the highest
//! sampled temperature.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::chemistry::{combinations, Phase, PrecursorSet};
use crate::config::SynthesisConfig;
use crate::oracle::EnergyOracle;
use crate::reaction::{best_route, format_term, ProductPool, Reaction, RouteFailure, BALANCE_TOLERANCE};
use crate::{Result, Warning};

/// One feasible precursor set with its most favorable target-forming reaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    precursors: PrecursorSet,
    reaction: Reaction,
    energy: f64,
}

impl Candidate {
    /// Create a candidate.
    #[must_use]
    pub const fn new(precursors: PrecursorSet, reaction: Reaction, energy: f64) -> Self {
        Self {
            precursors,
            reaction,
            energy,
        }
    }

    /// Precursor set.
    #[must_use]
    pub const fn precursors(&self) -> &PrecursorSet {
        &self.precursors
    }

    /// Balanced target-forming reaction.
    #[must_use]
    pub const fn reaction(&self) -> &Reaction {
        &self.reaction
    }

    /// Reaction energy (meV/atom) at the reference temperature.
    #[must_use]
    pub const fn energy(&self) -> f64 {
        self.energy
    }

    /// Stoichiometric amount of each precursor, in precursor-set order.
    #[must_use]
    pub fn amounts(&self) -> Vec<f64> {
        self.precursors
            .iter()
            .map(|phase| {
                self.reaction
                    .reactants()
                    .iter()
                    .find(|(p, _)| p == phase)
                    .map_or(0.0, |(_, c)| *c)
            })
            .collect()
    }

    /// Precursor phases with their amounts.
    #[must_use]
    pub fn weighted_precursors(&self) -> Vec<(Phase, f64)> {
        self.precursors.iter().cloned().zip(self.amounts()).collect()
    }

    /// Products with coefficients, e.g. `Ba2YCu3O6.5 + O2 + 3 CO2`.
    #[must_use]
    pub fn products_text(&self) -> String {
        self.reaction
            .products()
            .iter()
            .map(|(phase, c)| format_term(phase, *c))
            .collect::<Vec<_>>()
            .join(" + ")
    }
}

/// Candidate table, sorted by energy (most negative first).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateTable {
    reference_temperature: f64,
    candidates: Vec<Candidate>,
    warnings: Vec<Warning>,
}

impl CandidateTable {
    /// Build a table; candidates are sorted by energy, then fewer
    /// precursors, then precursor key.
    #[must_use]
    pub fn new(reference_temperature: f64, mut candidates: Vec<Candidate>) -> Self {
        candidates.sort_by(|a, b| {
            a.energy
                .total_cmp(&b.energy)
                .then_with(|| a.precursors.len().cmp(&b.precursors.len()))
                .then_with(|| a.precursors.key().cmp(&b.precursors.key()))
        });
        Self {
            reference_temperature,
            candidates,
            warnings: Vec::new(),
        }
    }

    /// Attach warnings gathered while generating the table.
    #[must_use]
    pub fn with_warnings(mut self, warnings: Vec<Warning>) -> Self {
        self.warnings = warnings;
        self
    }

    /// Temperature (°C) the energies were evaluated at.
    #[must_use]
    pub const fn reference_temperature(&self) -> f64 {
        self.reference_temperature
    }

    /// Candidates in rank order.
    #[must_use]
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Candidates in rank order.
    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter()
    }

    /// Candidate for a precursor set.
    #[must_use]
    pub fn get(&self, precursors: &PrecursorSet) -> Option<&Candidate> {
        self.candidates.iter().find(|c| &c.precursors == precursors)
    }

    /// Number of candidates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// True when no precursor set balances.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Infeasibility and oracle-miss warnings.
    #[must_use]
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }
}

/// Byproducts and uptake gases allowed when forming the target from fresh precursors.
pub(crate) fn candidate_pool(config: &SynthesisConfig) -> Result<ProductPool> {
    let byproducts = config
        .byproduct_phases()?
        .into_iter()
        .filter(|b| config.open_system() || !b.is_gas())
        .collect();
    let uptake = if config.allow_oxidation() {
        vec![Phase::oxygen()]
    } else {
        Vec::new()
    };
    Ok(ProductPool { byproducts, uptake })
}

/// Generate the ranked candidate table.
///
/// Infeasible configurations and oracle misses are reported in
/// [`CandidateTable::warnings`]; they do not fail the call.
///
/// # Errors
///
/// Returns an error only if the configuration holds unparsable formulas.
pub fn generate_candidates(config: &SynthesisConfig, oracle: &dyn EnergyOracle) -> Result<CandidateTable> {
    let precursors = config.precursor_phases()?;
    let target = config.target_phase()?;
    let pool = candidate_pool(config)?;
    let max_size = config.max_precursors()?.min(precursors.len());
    let temperature = config.max_temperature();

    let mut candidates = Vec::new();
    let mut warnings: Vec<Warning> = Vec::new();
    let mut seen_misses: BTreeSet<String> = BTreeSet::new();
    let mut balanced_any = false;

    for size in 2..=max_size {
        for subset in combinations(&precursors, size) {
            match best_route(&subset, &target, &pool, oracle, temperature) {
                Ok(route) => {
                    balanced_any = true;
                    debug_assert!(route.reaction.is_mass_balanced(BALANCE_TOLERANCE));
                    let set = PrecursorSet::new(subset);
                    debug!(precursors = %set, energy = route.energy, "candidate accepted");
                    candidates.push(Candidate::new(set, route.reaction, route.energy));
                }
                Err(RouteFailure::Unbalanced) => {}
                Err(RouteFailure::Oracle(warning)) => {
                    balanced_any = true;
                    if seen_misses.insert(warning.to_string()) {
                        warn!(%warning, "candidate excluded");
                        warnings.push(warning);
                    }
                }
            }
        }
    }

    if !balanced_any {
        let warning = Warning::InfeasibleConfiguration {
            target: target.formula().to_string(),
        };
        warn!(%warning, "no candidates");
        warnings.push(warning);
    }

    info!(
        candidates = candidates.len(),
        warnings = warnings.len(),
        temperature,
        "candidate table generated"
    );
    Ok(CandidateTable::new(temperature, candidates).with_warnings(warnings))
}

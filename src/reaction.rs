//! Reaction balancing and driving forces
//!
//! Balancing fixes the first product's coefficient to 1, moves the remaining
//! products to the reactant side with negative sign and solves the element
//! balance `A x = b` in the least-squares sense via SVD. A solution is only
//! accepted when it is unique (full column rank), exact within
//! [`BALANCE_TOLERANCE`], and every coefficient is strictly positive: each
//! reactant participates and each extra product is produced, never consumed.

use std::collections::BTreeSet;
use std::fmt;

use nalgebra::{DMatrix, DVector};
use tracing::trace;

use crate::chemistry::{combinations, Composition, Element, Phase};
use crate::oracle::EnergyOracle;
use crate::Warning;

/// Largest residual (atoms) tolerated in an element balance.
pub const BALANCE_TOLERANCE: f64 = 1e-3;

/// Coefficients at or below this count as absent.
const COEFFICIENT_EPS: f64 = 1e-6;

/// Singular values below this are treated as zero.
const RANK_EPS: f64 = 1e-8;

/// Solved coefficients for a reactant/product split.
#[derive(Debug, Clone, PartialEq)]
pub struct Balance {
    /// One coefficient per reactant, in input order
    pub reactants: Vec<f64>,
    /// One coefficient per product, in input order; the first is always 1
    pub products: Vec<f64>,
}

/// Balance `reactants -> products`.
///
/// Returns `None` when the element sets of the two sides differ, the
/// solution is not unique, the residual exceeds [`BALANCE_TOLERANCE`], or a
/// coefficient is not strictly positive.
#[must_use]
pub fn balance(reactants: &[&Composition], products: &[&Composition]) -> Option<Balance> {
    let (first, others) = products.split_first()?;
    if reactants.is_empty() {
        return None;
    }

    let reactant_elements: BTreeSet<Element> = reactants.iter().flat_map(|&c| c.elements()).collect();
    let product_elements: BTreeSet<Element> = products.iter().flat_map(|&c| c.elements()).collect();
    if reactant_elements != product_elements {
        return None;
    }
    let elements: Vec<Element> = reactant_elements.into_iter().collect();

    let n = reactants.len();
    let cols = n + others.len();
    if cols > elements.len() {
        return None;
    }

    let a = DMatrix::from_fn(elements.len(), cols, |row, col| {
        let element = elements[row];
        if col < n {
            reactants[col].amount(element)
        } else {
            -others[col - n].amount(element)
        }
    });
    let b = DVector::from_iterator(elements.len(), elements.iter().map(|e| first.amount(*e)));

    let svd = a.clone().svd(true, true);
    if svd.rank(RANK_EPS) < cols {
        return None;
    }
    let x = svd.solve(&b, RANK_EPS).ok()?;
    let residual = (&a * &x - &b).norm();
    if residual > BALANCE_TOLERANCE {
        return None;
    }
    if x.iter().any(|c| *c <= COEFFICIENT_EPS) {
        return None;
    }

    Some(Balance {
        reactants: x.iter().take(n).copied().collect(),
        products: std::iter::once(1.0).chain(x.iter().skip(n).copied()).collect(),
    })
}

/// A balanced reaction between phases.
#[derive(Debug, Clone, PartialEq)]
pub struct Reaction {
    reactants: Vec<(Phase, f64)>,
    products: Vec<(Phase, f64)>,
}

impl Reaction {
    /// Reaction with explicit coefficients. Balance is not checked; see
    /// [`Reaction::is_mass_balanced`].
    #[must_use]
    pub const fn from_parts(reactants: Vec<(Phase, f64)>, products: Vec<(Phase, f64)>) -> Self {
        Self { reactants, products }
    }

    /// Balance `reactants -> products`, or `None` (see [`balance`]).
    #[must_use]
    pub fn balanced(reactants: &[Phase], products: &[Phase]) -> Option<Self> {
        let r: Vec<&Composition> = reactants.iter().map(Phase::composition).collect();
        let p: Vec<&Composition> = products.iter().map(Phase::composition).collect();
        let solution = balance(&r, &p)?;
        Some(Self {
            reactants: reactants.iter().cloned().zip(solution.reactants).collect(),
            products: products.iter().cloned().zip(solution.products).collect(),
        })
    }

    /// Balance `reactants -> products`, letting gases enter or leave.
    ///
    /// Gas options are tried from fewest to most: no gas, one gas, then
    /// pairs, uptake before release. A gas is never on both sides. The first
    /// balanced option is returned.
    #[must_use]
    pub fn balanced_with_gases(
        reactants: &[Phase],
        products: &[Phase],
        uptake: &[Phase],
        release: &[Phase],
    ) -> Option<Self> {
        for (taken, released) in gas_options(uptake, release, reactants, products) {
            let r: Vec<Phase> = reactants.iter().cloned().chain(taken).collect();
            let p: Vec<Phase> = products.iter().cloned().chain(released).collect();
            if let Some(reaction) = Self::balanced(&r, &p) {
                return Some(reaction);
            }
        }
        None
    }

    /// Reactant phases with coefficients.
    #[must_use]
    pub fn reactants(&self) -> &[(Phase, f64)] {
        &self.reactants
    }

    /// Product phases with coefficients.
    #[must_use]
    pub fn products(&self) -> &[(Phase, f64)] {
        &self.products
    }

    /// Reactant and product element totals agree within `tolerance` atoms.
    #[must_use]
    pub fn is_mass_balanced(&self, tolerance: f64) -> bool {
        side_composition(&self.reactants).approx_eq(&side_composition(&self.products), tolerance)
    }

    /// Reaction energy (meV/atom) at `temperature`: product-side minus
    /// reactant-side formation energy, each weighted by atoms.
    ///
    /// # Errors
    ///
    /// Returns [`Warning::OracleMiss`] for the first phase without an energy.
    pub fn energy(&self, oracle: &dyn EnergyOracle, temperature: f64) -> Result<f64, Warning> {
        let (e_r, n_r) = side_energy(&self.reactants, oracle, temperature)?;
        let (e_p, n_p) = side_energy(&self.products, oracle, temperature)?;
        if n_r <= 0.0 || n_p <= 0.0 {
            return Ok(0.0);
        }
        Ok(1000.0 * (e_p / n_p - e_r / n_r))
    }
}

impl fmt::Display for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", format_side(&self.reactants), format_side(&self.products))
    }
}

fn side_composition(terms: &[(Phase, f64)]) -> Composition {
    let mut total = Composition::default();
    for (phase, coefficient) in terms {
        total.add_scaled(phase.composition(), *coefficient);
    }
    total
}

fn side_energy(
    terms: &[(Phase, f64)],
    oracle: &dyn EnergyOracle,
    temperature: f64,
) -> Result<(f64, f64), Warning> {
    let mut energy = 0.0;
    let mut atoms = 0.0;
    for (phase, coefficient) in terms {
        let ef = phase_energy(oracle, phase, temperature)?;
        let n = coefficient * phase.num_atoms();
        energy += n * ef;
        atoms += n;
    }
    Ok((energy, atoms))
}

/// Oracle lookup with a miss turned into a warning.
///
/// # Errors
///
/// Returns [`Warning::OracleMiss`] when the oracle has no entry.
pub fn phase_energy(oracle: &dyn EnergyOracle, phase: &Phase, temperature: f64) -> Result<f64, Warning> {
    oracle
        .formation_energy(phase, temperature)
        .ok_or_else(|| Warning::OracleMiss {
            formula: phase.formula().to_string(),
            temperature,
        })
}

/// Coefficient followed by formula, coefficient omitted when 1.
pub(crate) fn format_term(phase: &Phase, coefficient: f64) -> String {
    if (coefficient - 1.0).abs() < 1e-6 {
        phase.formula().to_string()
    } else {
        format!("{} {}", format_coefficient(coefficient), phase.formula())
    }
}

/// Coefficient text: integers bare, otherwise up to four decimals.
pub(crate) fn format_coefficient(coefficient: f64) -> String {
    let text = format!("{coefficient:.4}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn format_side(terms: &[(Phase, f64)]) -> String {
    terms
        .iter()
        .map(|(phase, coefficient)| format_term(phase, *coefficient))
        .collect::<Vec<_>>()
        .join(" + ")
}

/// Disjoint (uptake, release) gas subsets, fewest gases first.
fn gas_options(
    uptake: &[Phase],
    release: &[Phase],
    reactants: &[Phase],
    products: &[Phase],
) -> Vec<(Vec<Phase>, Vec<Phase>)> {
    let uptake: Vec<Phase> = uptake
        .iter()
        .filter(|g| !reactants.contains(g) && !products.contains(g))
        .cloned()
        .collect();
    let release: Vec<Phase> = release
        .iter()
        .filter(|g| !reactants.contains(g) && !products.contains(g))
        .cloned()
        .collect();

    let mut options = Vec::new();
    for total in 0..=uptake.len() + release.len() {
        for k in 0..=total.min(uptake.len()) {
            for taken in combinations(&uptake, k) {
                for released in combinations(&release, total - k) {
                    if released.iter().any(|g| taken.contains(g)) {
                        continue;
                    }
                    options.push((taken.clone(), released));
                }
            }
        }
    }
    options
}

/// A balanced target-forming route and its energy.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetRoute {
    /// Balanced reaction, target first among the products
    pub reaction: Reaction,
    /// Reaction energy (meV/atom)
    pub energy: f64,
}

/// Why no target-forming route was scored.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteFailure {
    /// No gas/byproduct option balances
    Unbalanced,
    /// Every balanced option needed an energy the oracle lacks
    Oracle(Warning),
}

/// Where gases may enter or leave when forming the target.
#[derive(Debug, Clone, Default)]
pub struct ProductPool {
    /// Byproducts that may form next to the target (solids and gases)
    pub byproducts: Vec<Phase>,
    /// Gases that may be consumed from the atmosphere
    pub uptake: Vec<Phase>,
}

/// Most favorable balanced route from separate reactant phases to the target.
///
/// Every reactant must take part. All subsets of `pool.byproducts` (including
/// none) are tried, each with and without every subset of `pool.uptake`.
///
/// # Errors
///
/// [`RouteFailure::Unbalanced`] when nothing balances,
/// [`RouteFailure::Oracle`] when every balanced option hits an oracle miss.
pub fn best_route(
    reactants: &[Phase],
    target: &Phase,
    pool: &ProductPool,
    oracle: &dyn EnergyOracle,
    temperature: f64,
) -> Result<TargetRoute, RouteFailure> {
    let mut best: Option<TargetRoute> = None;
    let mut miss: Option<Warning> = None;

    for (taken, byproducts) in byproduct_options(reactants, target, pool) {
        let r: Vec<Phase> = reactants.iter().cloned().chain(taken).collect();
        let p: Vec<Phase> = std::iter::once(target.clone()).chain(byproducts).collect();
        let Some(reaction) = Reaction::balanced(&r, &p) else {
            continue;
        };
        match reaction.energy(oracle, temperature) {
            Ok(energy) => {
                trace!(%reaction, energy, "balanced option");
                if best.as_ref().map_or(true, |b| energy < b.energy) {
                    best = Some(TargetRoute { reaction, energy });
                }
            }
            Err(warning) => {
                miss.get_or_insert(warning);
            }
        }
    }

    match (best, miss) {
        (Some(route), _) => Ok(route),
        (None, Some(warning)) => Err(RouteFailure::Oracle(warning)),
        (None, None) => Err(RouteFailure::Unbalanced),
    }
}

/// Most favorable route from a phase mixture with fixed proportions to the target.
///
/// The mixture's net composition is balanced as a single reactant, so linearly
/// dependent mixtures (e.g. partially reacted precursor sets) are allowed.
/// The returned reaction lists the mixture phases with their scaled amounts.
///
/// # Errors
///
/// See [`best_route`].
pub fn mixture_route(
    mixture: &[(Phase, f64)],
    target: &Phase,
    pool: &ProductPool,
    oracle: &dyn EnergyOracle,
    temperature: f64,
) -> Result<TargetRoute, RouteFailure> {
    let solids: Vec<(Phase, f64)> = mixture
        .iter()
        .filter(|(phase, amount)| !phase.is_gas() && *amount > COEFFICIENT_EPS)
        .cloned()
        .collect();
    if solids.is_empty() {
        return Err(RouteFailure::Unbalanced);
    }
    let net = side_composition(&solids);
    let phases: Vec<Phase> = solids.iter().map(|(p, _)| p.clone()).collect();

    let mut best: Option<TargetRoute> = None;
    let mut miss: Option<Warning> = None;

    for (taken, byproducts) in byproduct_options(&phases, target, pool) {
        let mut r: Vec<&Composition> = vec![&net];
        r.extend(taken.iter().map(Phase::composition));
        let p_phases: Vec<Phase> = std::iter::once(target.clone()).chain(byproducts).collect();
        let p: Vec<&Composition> = p_phases.iter().map(Phase::composition).collect();
        let Some(solution) = balance(&r, &p) else {
            continue;
        };
        let scale = solution.reactants[0];
        let reactant_terms: Vec<(Phase, f64)> = solids
            .iter()
            .map(|(phase, amount)| (phase.clone(), amount * scale))
            .chain(taken.iter().cloned().zip(solution.reactants.iter().skip(1).copied()))
            .collect();
        let reaction = Reaction::from_parts(reactant_terms, p_phases.into_iter().zip(solution.products).collect());
        match reaction.energy(oracle, temperature) {
            Ok(energy) => {
                if best.as_ref().map_or(true, |b| energy < b.energy) {
                    best = Some(TargetRoute { reaction, energy });
                }
            }
            Err(warning) => {
                miss.get_or_insert(warning);
            }
        }
    }

    match (best, miss) {
        (Some(route), _) => Ok(route),
        (None, Some(warning)) => Err(RouteFailure::Oracle(warning)),
        (None, None) => Err(RouteFailure::Unbalanced),
    }
}

/// (uptake gases, byproducts) combinations; a phase never appears twice.
fn byproduct_options(reactants: &[Phase], target: &Phase, pool: &ProductPool) -> Vec<(Vec<Phase>, Vec<Phase>)> {
    let byproducts: Vec<Phase> = pool
        .byproducts
        .iter()
        .filter(|b| *b != target && !reactants.contains(b))
        .cloned()
        .collect();
    let uptake: Vec<Phase> = pool
        .uptake
        .iter()
        .filter(|g| !reactants.contains(g))
        .cloned()
        .collect();

    let mut options = Vec::new();
    for k in 0..=uptake.len() {
        for taken in combinations(&uptake, k) {
            for size in 0..=byproducts.len() {
                for chosen in combinations(&byproducts, size) {
                    if chosen.iter().any(|b| taken.contains(b)) {
                        continue;
                    }
                    options.push((taken.clone(), chosen));
                }
            }
        }
    }
    options
}

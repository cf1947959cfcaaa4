//! Outcome Attributor
//!
//! Explains one reported experiment in terms of pairwise reactions. The
//! search walks a tree of phase-set states: each edge applies one balanced
//! reaction between one or two present phases, and a leaf is a consistent
//! hypothesis when its phases reproduce the observed products and their
//! weight fractions (within [`FRACTION_MATCH_TOLERANCE`]). The traversal uses
//! an explicit stack, is memoized on visited states and is bounded in depth
//! and breadth.
//!
//! ## Usage
//!
//! ```rust
//! use synth_planner::attribution::{AttributionStatus, Attributor};
//! use synth_planner::chemistry::{Phase, PrecursorSet};
//! use synth_planner::config::{PolicyFlags, SynthesisConfig};
//! use synth_planner::experiment::ExperimentRecord;
//! use synth_planner::oracle::TabulatedOracle;
//! use synth_planner::pairwise::PairwiseStore;
//!
//! let config = SynthesisConfig::builder(["BaO", "CuO"], "BaCuO2", [700.0]).build()?;
//! let oracle = TabulatedOracle::new();
//! let attributor = Attributor::new(&config, &oracle, PolicyFlags::new())?;
//!
//! let record = ExperimentRecord::builder(PrecursorSet::from_formulas(&["BaO", "CuO"])?, 700.0)
//!     .product(Phase::new("BaCuO2")?, 100.0)
//!     .build()?;
//! let mut store = PairwiseStore::new();
//! let attribution = attributor.attribute_and_record(&record, &mut store);
//! assert_eq!(attribution.status, AttributionStatus::Resolved);
//! assert_eq!(store.len(), 1);
//! # Ok::<(), synth_planner::Error>(())
//! ```

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::chemistry::{combinations, Phase, PrecursorSet};
use crate::config::{PolicyFlags, SynthesisConfig};
use crate::evolution::{apply_reaction, mixture_of, weight_fractions, Mixture};
use crate::experiment::{ExperimentRecord, FRACTION_MATCH_TOLERANCE};
use crate::oracle::EnergyOracle;
use crate::pairwise::{format_products, Outcome, PairStatus, PairwiseStore, ProductSet, ReactantPair};
use crate::reaction::Reaction;
use crate::{Result, Warning};

/// Maximum reactions in one hypothesis.
pub const MAX_DEPTH: usize = 6;

/// Maximum hypotheses kept per experiment.
pub const MAX_HYPOTHESES: usize = 32;

/// Maximum states expanded per experiment.
const MAX_EXPANSIONS: usize = 512;

/// One inferred pairwise reaction.
#[derive(Debug, Clone, PartialEq)]
pub struct InferredStep {
    /// Reacting pair (or single decomposing phase)
    pub pair: ReactantPair,
    /// Solid products
    pub products: ProductSet,
    /// Balanced reaction, gases included
    pub reaction: Reaction,
}

impl InferredStep {
    fn key(&self) -> (ReactantPair, ProductSet) {
        (self.pair.clone(), self.products.clone())
    }
}

/// Attribution outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributionStatus {
    /// No new phase formed
    NoReaction,
    /// At least one reaction order reproduces the observation
    Resolved,
    /// No reaction order reproduces the observation
    Unresolved,
}

/// Result of attributing one experiment.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribution {
    /// Tested precursor set
    pub precursors: PrecursorSet,
    /// Tested temperature (°C)
    pub temperature: f64,
    /// Outcome
    pub status: AttributionStatus,
    /// Consistent reaction orders, shortest first
    pub hypotheses: Vec<Vec<InferredStep>>,
    /// Precursor pairs that both survived and never reacted
    pub inert_pairs: Vec<ReactantPair>,
    /// Observed phases no hypothesis explains (only when unresolved)
    pub residual: Vec<Phase>,
    /// Oracle misses, the unresolved warning and store conflicts
    pub warnings: Vec<Warning>,
    observed: BTreeSet<Phase>,
}

impl Attribution {
    /// Pairwise outcomes this attribution implies at its temperature.
    ///
    /// A step is recorded as reacting when one of its products survives into
    /// the observation. Steps whose products were all consumed later get no
    /// record at all: the pair did react, so an inert bound would be wrong, and
    /// the intermediate product set is not observed. Unresolved attributions
    /// imply nothing.
    #[must_use]
    pub fn implied_outcomes(&self) -> Vec<(ReactantPair, Outcome)> {
        if self.status == AttributionStatus::Unresolved {
            return Vec::new();
        }
        let mut reacting: BTreeSet<(ReactantPair, ProductSet)> = BTreeSet::new();
        for step in self.hypotheses.iter().flatten() {
            if step.products.iter().any(|p| self.observed.contains(p)) {
                reacting.insert(step.key());
            }
        }
        let used: BTreeSet<&ReactantPair> = self.hypotheses.iter().flatten().map(|s| &s.pair).collect();

        reacting
            .into_iter()
            .map(|(pair, products)| (pair, Outcome::Reacts(products)))
            .chain(
                self.inert_pairs
                    .iter()
                    .filter(|p| !used.contains(p))
                    .map(|p| (p.clone(), Outcome::NoReaction)),
            )
            .collect()
    }
}

/// Search node: current mixture, phases consumed along the way, steps taken.
#[derive(Debug, Clone)]
struct Node {
    mixture: Mixture,
    consumed: BTreeSet<Phase>,
    steps: Vec<InferredStep>,
}

impl Node {
    fn visit_key(&self) -> (Vec<Phase>, Vec<(ReactantPair, ProductSet)>) {
        let mut steps: Vec<_> = self.steps.iter().map(InferredStep::key).collect();
        steps.sort();
        (self.mixture.keys().cloned().collect(), steps)
    }

    /// Every present phase was observed, every observed phase is either
    /// present or an incompletely consumed reactant, and the predicted weight
    /// fractions agree with the observed ones.
    fn matches(&self, observed: &BTreeMap<Phase, f64>) -> bool {
        self.mixture.keys().all(|p| observed.contains_key(p))
            && observed
                .keys()
                .all(|p| self.mixture.contains_key(p) || self.consumed.contains(p))
            && fractions_agree(&self.mixture, observed)
    }
}

/// Predicted fractions match the observed ones renormalized over the
/// predicted phases. Observed leftovers of consumed reactants are outside the
/// prediction and do not count against it.
fn fractions_agree(mixture: &Mixture, observed: &BTreeMap<Phase, f64>) -> bool {
    let shared: f64 = mixture.keys().filter_map(|p| observed.get(p)).sum();
    if shared <= 0.0 {
        return false;
    }
    weight_fractions(mixture).iter().all(|(phase, predicted)| {
        let seen = observed.get(phase).copied().unwrap_or(0.0) / shared;
        (predicted - seen).abs() <= FRACTION_MATCH_TOLERANCE
    })
}

/// Reconstructs pairwise reactions from reported experiments.
pub struct Attributor<'a> {
    byproducts: Vec<Phase>,
    uptake: Vec<Phase>,
    release: Vec<Phase>,
    oracle: &'a dyn EnergyOracle,
    policy: PolicyFlags,
}

impl<'a> Attributor<'a> {
    /// Build an attributor for one campaign.
    ///
    /// Gases may leave in an open system; O2 may enter when oxidation is
    /// allowed, and CO2 too in an open system.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured byproducts do not parse.
    pub fn new(config: &SynthesisConfig, oracle: &'a dyn EnergyOracle, policy: PolicyFlags) -> Result<Self> {
        let allowed = config.byproduct_phases()?;
        let byproducts = allowed.iter().filter(|p| !p.is_gas()).cloned().collect();

        let mut uptake = Vec::new();
        let mut release = Vec::new();
        if config.open_system() || config.allow_oxidation() {
            uptake.push(Phase::oxygen());
        }
        if config.open_system() {
            uptake.push(Phase::carbon_dioxide());
            release.extend([Phase::oxygen(), Phase::carbon_dioxide()]);
            let extra: Vec<Phase> = allowed.into_iter().filter(|p| p.is_gas() && !release.contains(p)).collect();
            release.extend(extra);
        }

        Ok(Self {
            byproducts,
            uptake,
            release,
            oracle,
            policy,
        })
    }

    /// Attribute one experiment against the current store. The store is
    /// consulted (known inert pairs are skipped, known products are
    /// candidates), not modified.
    #[must_use]
    pub fn attribute(&self, record: &ExperimentRecord, store: &PairwiseStore) -> Attribution {
        let temperature = record.temperature();
        let start = mixture_of(&record.weighted_precursors());
        let fractions: BTreeMap<Phase, f64> = record
            .phase_fractions()
            .into_iter()
            .filter(|(p, _)| !p.is_gas())
            .collect();
        let observed: BTreeSet<Phase> = fractions.keys().cloned().collect();
        let novel: BTreeSet<Phase> = observed.iter().filter(|p| !start.contains_key(*p)).cloned().collect();

        let precursors: Vec<Phase> = start.keys().cloned().collect();
        let inert_pairs: Vec<ReactantPair> = combinations(&precursors, 2)
            .iter()
            .filter(|pair| pair.iter().all(|p| observed.contains(p)))
            .map(|pair| ReactantPair::new(&pair[0], &pair[1]))
            .collect();

        let mut attribution = Attribution {
            precursors: record.precursors().clone(),
            temperature,
            status: AttributionStatus::NoReaction,
            hypotheses: Vec::new(),
            inert_pairs,
            residual: Vec::new(),
            warnings: Vec::new(),
            observed,
        };

        if novel.is_empty() {
            info!(precursors = %attribution.precursors, temperature, "no reaction observed");
            return attribution;
        }

        let (hypotheses, produced) = self.search(start, &fractions, &novel, store, temperature, &mut attribution.warnings);
        if hypotheses.is_empty() {
            let unexplained: Vec<Phase> = novel.iter().filter(|p| !produced.contains(*p)).cloned().collect();
            attribution.residual = if unexplained.is_empty() {
                novel.into_iter().collect()
            } else {
                unexplained
            };
            let warning = Warning::UnresolvedAttribution {
                precursors: attribution.precursors.to_string(),
                temperature,
                residual: format_products(&attribution.residual.iter().cloned().collect()),
            };
            warn!(%warning, "attribution failed");
            attribution.warnings.push(warning);
            attribution.status = AttributionStatus::Unresolved;
        } else {
            info!(
                precursors = %attribution.precursors,
                temperature,
                hypotheses = hypotheses.len(),
                "attribution resolved"
            );
            attribution.hypotheses = hypotheses;
            attribution.status = AttributionStatus::Resolved;
        }
        attribution
    }

    /// Attribute one experiment and merge the implied outcomes into `store`.
    /// Store conflicts are added to the attribution's warnings.
    pub fn attribute_and_record(&self, record: &ExperimentRecord, store: &mut PairwiseStore) -> Attribution {
        let mut attribution = self.attribute(record, store);
        for (pair, outcome) in attribution.implied_outcomes() {
            match store.record(&pair, attribution.temperature, &outcome) {
                Ok(changed) => {
                    if changed && self.policy.verbose {
                        debug!(%pair, ?outcome, temperature = attribution.temperature, "pairwise record updated");
                    }
                }
                Err(conflict) => attribution.warnings.push(conflict),
            }
        }
        attribution
    }

    /// Depth-first search for consistent reaction orders. Also returns every
    /// phase produced along any explored edge.
    fn search(
        &self,
        start: Mixture,
        observed: &BTreeMap<Phase, f64>,
        novel: &BTreeSet<Phase>,
        store: &PairwiseStore,
        temperature: f64,
        warnings: &mut Vec<Warning>,
    ) -> (Vec<Vec<InferredStep>>, BTreeSet<Phase>) {
        let root = Node {
            mixture: start,
            consumed: BTreeSet::new(),
            steps: Vec::new(),
        };
        let mut visited = BTreeSet::new();
        visited.insert(root.visit_key());
        let mut stack = vec![root];
        let mut hypotheses: Vec<Vec<InferredStep>> = Vec::new();
        let mut produced: BTreeSet<Phase> = BTreeSet::new();
        let mut expansions = 0;

        while let Some(node) = stack.pop() {
            if !node.steps.is_empty() && node.matches(observed) {
                hypotheses.push(node.steps);
                if hypotheses.len() >= MAX_HYPOTHESES {
                    break;
                }
                continue;
            }
            if node.steps.len() >= MAX_DEPTH {
                continue;
            }
            expansions += 1;
            if expansions > MAX_EXPANSIONS {
                debug!(temperature, "attribution search truncated");
                break;
            }

            let mut children = self.expand(&node, novel, store, temperature, warnings);
            produced.extend(children.iter().flat_map(|c| c.steps.last()).flat_map(|s| s.products.iter().cloned()));
            children.retain(|child| visited.insert(child.visit_key()));
            // Reverse so the first child is explored first.
            stack.extend(children.into_iter().rev());
        }

        hypotheses.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| describe(a).cmp(&describe(b))));
        (hypotheses, produced)
    }

    fn expand(
        &self,
        node: &Node,
        novel: &BTreeSet<Phase>,
        store: &PairwiseStore,
        temperature: f64,
        warnings: &mut Vec<Warning>,
    ) -> Vec<Node> {
        let present: Vec<Phase> = node.mixture.keys().cloned().collect();
        let interfaces: Vec<ReactantPair> = present
            .iter()
            .map(ReactantPair::single)
            .chain(combinations(&present, 2).iter().map(|p| ReactantPair::new(&p[0], &p[1])))
            .collect();

        let mut children = Vec::new();
        for pair in interfaces {
            if matches!(store.lookup(&pair, temperature), PairStatus::Inert) {
                continue;
            }
            let pool = self.product_pool(&pair, novel, store);
            for size in 1..=2 {
                for products in combinations(&pool, size) {
                    let Some(reaction) =
                        Reaction::balanced_with_gases(&pair.phases(), &products, &self.uptake, &self.release)
                    else {
                        continue;
                    };
                    if self.policy.enforce_thermo && !self.favorable(&reaction, temperature, warnings) {
                        continue;
                    }
                    let Some(mixture) = apply_reaction(&node.mixture, &reaction) else {
                        continue;
                    };
                    let mut consumed = node.consumed.clone();
                    consumed.extend(pair.phases());
                    let mut steps = node.steps.clone();
                    steps.push(InferredStep {
                        pair: pair.clone(),
                        products: products.into_iter().collect(),
                        reaction,
                    });
                    children.push(Node { mixture, consumed, steps });
                }
            }
        }
        children
    }

    /// Phases a pair may form: novel observed phases, solid byproducts and
    /// products already recorded for the pair.
    fn product_pool(&self, pair: &ReactantPair, novel: &BTreeSet<Phase>, store: &PairwiseStore) -> Vec<Phase> {
        let mut pool: BTreeSet<Phase> = novel.iter().cloned().collect();
        pool.extend(self.byproducts.iter().cloned());
        for observation in store.observations(pair) {
            if let Some(products) = observation.products() {
                pool.extend(products.iter().cloned());
            }
        }
        pool.into_iter().filter(|p| !pair.contains(p)).collect()
    }

    fn favorable(&self, reaction: &Reaction, temperature: f64, warnings: &mut Vec<Warning>) -> bool {
        match reaction.energy(self.oracle, temperature) {
            Ok(energy) => energy < 0.0,
            Err(warning) => {
                if !warnings.contains(&warning) {
                    warn!(%warning, %reaction, "step excluded");
                    warnings.push(warning);
                }
                false
            }
        }
    }
}

fn describe(steps: &[InferredStep]) -> String {
    steps
        .iter()
        .map(|s| s.reaction.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::TabulatedOracle;

    fn phase(formula: &str) -> Phase {
        Phase::new(formula).unwrap()
    }

    fn config() -> SynthesisConfig {
        SynthesisConfig::builder(["Y2O3", "BaO", "BaO2", "CuCO3"], "YBa2Cu3O6.5", [700.0, 900.0])
            .allowed_byproducts(["O2", "CO2"])
            .build()
            .unwrap()
    }

    fn record(formulas: &[&str], amounts: Vec<f64>, products: &[(&str, f64)]) -> ExperimentRecord {
        products
            .iter()
            .fold(
                ExperimentRecord::builder(PrecursorSet::from_formulas(formulas).unwrap(), 700.0).amounts(amounts),
                |builder, (id, wt)| builder.product(Phase::from_id(id).unwrap(), *wt),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_carbonate_intermediate_is_attributed() {
        let oracle = TabulatedOracle::new();
        let attributor = Attributor::new(&config(), &oracle, PolicyFlags::new()).unwrap();
        // PrecursorSet order: BaO2, CuCO3, Y2O3
        let record = record(
            &["Y2O3", "BaO2", "CuCO3"],
            vec![2.0, 3.0, 0.5],
            &[("BaCO3_62", 55.0), ("CuO", 35.0), ("Y2O3", 10.0)],
        );
        let mut store = PairwiseStore::new();
        let attribution = attributor.attribute_and_record(&record, &mut store);

        assert_eq!(attribution.status, AttributionStatus::Resolved);
        assert!(attribution.residual.is_empty());
        let pair = ReactantPair::new(&phase("BaO2"), &phase("CuCO3"));
        assert!(store.knows(&pair));
        assert!(matches!(
            store.lookup(&pair, 700.0),
            PairStatus::Reacts(products) if products.contains(&phase("BaCO3"))
        ));
    }

    #[test]
    fn test_unchanged_precursors_are_inert() {
        let oracle = TabulatedOracle::new();
        let attributor = Attributor::new(&config(), &oracle, PolicyFlags::new()).unwrap();
        let record = record(&["Y2O3", "BaO"], vec![1.0, 1.0], &[("Y2O3", 60.0), ("BaO", 40.0)]);
        let mut store = PairwiseStore::new();
        let attribution = attributor.attribute_and_record(&record, &mut store);

        assert_eq!(attribution.status, AttributionStatus::NoReaction);
        let pair = ReactantPair::new(&phase("Y2O3"), &phase("BaO"));
        assert_eq!(store.lookup(&pair, 700.0), PairStatus::Inert);
    }

    #[test]
    fn test_unexplained_phase_is_unresolved() {
        let oracle = TabulatedOracle::new();
        let attributor = Attributor::new(&config(), &oracle, PolicyFlags::new()).unwrap();
        let record = record(&["Y2O3", "BaO"], vec![1.0, 1.0], &[("CuO", 100.0)]);
        let mut store = PairwiseStore::new();
        let attribution = attributor.attribute_and_record(&record, &mut store);

        assert_eq!(attribution.status, AttributionStatus::Unresolved);
        assert_eq!(attribution.residual, vec![phase("CuO")]);
        assert!(matches!(attribution.warnings[0], Warning::UnresolvedAttribution { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn test_enforce_thermo_drops_unfavorable_orders() {
        let mut oracle = TabulatedOracle::new();
        for (formula, energy) in [("BaO", -2.9), ("CuO", -0.8), ("BaCuO2", -1.0)] {
            oracle.insert(formula, 700.0, energy).unwrap();
        }
        let policy = PolicyFlags::new().with_enforce_thermo(true);
        let attributor = Attributor::new(&config(), &oracle, policy).unwrap();
        let record = record(&["BaO", "CuO"], vec![1.0, 1.0], &[("BaCuO2", 100.0)]);
        let attribution = attributor.attribute(&record, &PairwiseStore::new());
        assert_eq!(attribution.status, AttributionStatus::Unresolved);

        let lenient = Attributor::new(&config(), &oracle, PolicyFlags::new()).unwrap();
        assert_eq!(lenient.attribute(&record, &PairwiseStore::new()).status, AttributionStatus::Resolved);
    }

    #[test]
    fn test_weight_fractions_must_match_prediction() {
        let oracle = TabulatedOracle::new();
        let attributor = Attributor::new(&config(), &oracle, PolicyFlags::new()).unwrap();
        // BaO + 2 CuO: one CuO is left over, about 75 wt% BaCuO2
        let consistent = record(&["BaO", "CuO"], vec![1.0, 2.0], &[("BaCuO2", 75.0), ("CuO", 25.0)]);
        let attribution = attributor.attribute(&consistent, &PairwiseStore::new());
        assert_eq!(attribution.status, AttributionStatus::Resolved);

        let inverted = record(&["BaO", "CuO"], vec![1.0, 2.0], &[("BaCuO2", 30.0), ("CuO", 70.0)]);
        let mut store = PairwiseStore::new();
        let attribution = attributor.attribute_and_record(&inverted, &mut store);
        assert_eq!(attribution.status, AttributionStatus::Unresolved);
        assert_eq!(attribution.residual, vec![phase("BaCuO2")]);
        assert!(store.is_empty());
    }
}

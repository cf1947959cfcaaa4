//! Suggestion Engine
//!
//! Ranks every untested (precursor set, temperature) pair of the candidate
//! table and returns the next batch to run. Each entry is scored by evolving
//! its precursors through the known pairwise reactions at that temperature:
//!
//! - if the target forms, the entry is scored by the target's weight fraction
//! - otherwise the remaining driving force from the evolved phases to the
//!   target is the *effective* driving force, which is the candidate's own
//!   driving force when no known reaction applies
//!
//! Entries whose known reactions form phases other than the target or an
//! allowed byproduct are demoted unless `partial_yield` is set.
//!
//! ## Usage
//!
//! ```rust
//! use synth_planner::candidates::generate_candidates;
//! use synth_planner::config::{PolicyFlags, SynthesisConfig};
//! use synth_planner::experiment::ExperimentLog;
//! use synth_planner::oracle::TabulatedOracle;
//! use synth_planner::pairwise::PairwiseStore;
//! use synth_planner::suggest::{SuggestionEngine, SuggestionState};
//!
//! let config = SynthesisConfig::builder(["BaO", "CuO"], "BaCuO2", [600.0, 800.0]).build()?;
//! let oracle = TabulatedOracle::new()
//!     .with_energy("BaO", 800.0, -2.9)?
//!     .with_energy("CuO", 800.0, -0.8)?
//!     .with_energy("BaCuO2", 800.0, -2.0)?;
//! let table = generate_candidates(&config, &oracle)?;
//!
//! let engine = SuggestionEngine::new(&config, &oracle, PolicyFlags::new())?;
//! let mut store = PairwiseStore::new();
//! let report = engine.suggest(&table, &mut store, &ExperimentLog::new(), 1)?;
//! assert_eq!(report.state, SuggestionState::InProgress);
//! assert_eq!(report.suggestions()[0].temperature, 600.0);
//! # Ok::<(), synth_planner::Error>(())
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::attribution::{Attribution, Attributor};
use crate::candidates::{candidate_pool, Candidate, CandidateTable};
use crate::chemistry::{combinations, Phase, PrecursorSet};
use crate::config::{temperature_key, PolicyFlags, SynthesisConfig};
use crate::evolution::{Evolution, Evolver};
use crate::experiment::{ExperimentLog, FRACTION_MATCH_TOLERANCE};
use crate::oracle::EnergyOracle;
use crate::pairwise::{PairwiseStore, ReactantPair};
use crate::reaction::{mixture_route, ProductPool, RouteFailure};
use crate::topk::TopKSelection;
use crate::{Error, Result, Warning};

/// Two predicted outcomes with the same phases and weight fractions within
/// this tolerance (0-1) are the same outcome.
pub const REDUNDANCY_TOLERANCE: f64 = FRACTION_MATCH_TOLERANCE;

/// Yields at or above this count as a pure target.
const PURE_YIELD: f64 = 1.0 - 1e-6;

/// Ranking tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    /// Eligible for the top of the ranking
    Top,
    /// Ranked after every top-tier entry
    Demoted,
}

/// Campaign state after a suggestion round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionState {
    /// Untested candidates remain and the target is not yet pure
    InProgress,
    /// Some experiment made the target phase-pure
    Solved,
    /// Every candidate was tested at every temperature
    Exhausted,
}

/// One ranked (precursor set, temperature) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    /// Precursor set
    pub precursors: PrecursorSet,
    /// Stoichiometric amounts, in precursor-set order
    pub amounts: Vec<f64>,
    /// Temperature (°C) to test
    pub temperature: f64,
    /// Candidate driving force (meV/atom)
    pub energy: f64,
    /// Driving force left after known reactions (meV/atom)
    pub effective_energy: f64,
    /// Predicted target weight fraction (0-1)
    pub expected_yield: f64,
    /// Predicted phases with weight fractions (0-1)
    pub predicted: Vec<(Phase, f64)>,
    /// Known intermediates that are neither target nor allowed byproduct
    pub detrimental: Vec<Phase>,
    /// Pairs among the predicted phases the store knows nothing about
    pub new_interfaces: usize,
    /// Ranking tier
    pub tier: Tier,
}

impl Suggestion {
    #[allow(clippy::cast_precision_loss)]
    fn rank_key(&self, explore: bool) -> RankKey {
        let interfaces = -(self.new_interfaces as f64);
        let (primary, secondary) = if explore {
            (interfaces, self.effective_energy)
        } else {
            (self.effective_energy, interfaces)
        };
        RankKey {
            tier: self.tier,
            neg_yield: -self.expected_yield,
            primary,
            secondary,
            temperature: self.temperature,
            phases: self.precursors.len(),
            key: self.precursors.key(),
        }
    }
}

/// Total order over suggestions: tier, yield, policy-dependent energy and
/// interface terms, then lower temperature, fewer phases and lexical key.
#[derive(Debug, Clone)]
struct RankKey {
    tier: Tier,
    neg_yield: f64,
    primary: f64,
    secondary: f64,
    temperature: f64,
    phases: usize,
    key: String,
}

impl Ord for RankKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.tier
            .cmp(&other.tier)
            .then(self.neg_yield.total_cmp(&other.neg_yield))
            .then(self.primary.total_cmp(&other.primary))
            .then(self.secondary.total_cmp(&other.secondary))
            .then(self.temperature.total_cmp(&other.temperature))
            .then(self.phases.cmp(&other.phases))
            .then_with(|| self.key.cmp(&other.key))
    }
}

impl PartialOrd for RankKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for RankKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RankKey {}

/// What a suggestion round produced.
#[derive(Debug, Clone, PartialEq)]
pub enum SuggestionOutcome {
    /// Experiments to run next, best first
    Suggestions(Vec<Suggestion>),
    /// The target was made phase-pure
    Solved {
        /// Successful precursor set
        precursors: PrecursorSet,
        /// Successful temperature (°C)
        temperature: f64,
    },
    /// Untested entries remain, but none could be ranked (redundant
    /// predictions, unbalanceable evolved phases or oracle misses)
    Unranked {
        /// Untested (precursor set, temperature) pairs
        untested: usize,
    },
    /// Nothing left to test
    Exhausted,
}

/// Result of one suggestion round.
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestionReport {
    /// Suggestions or terminal result
    pub outcome: SuggestionOutcome,
    /// Campaign state
    pub state: SuggestionState,
    /// Full ranking of untested pairs, best first
    pub ranking: Vec<Suggestion>,
    /// Attribution of every logged experiment
    pub attributions: Vec<Attribution>,
    /// Oracle misses, unresolved attributions and store conflicts
    pub warnings: Vec<Warning>,
}

impl SuggestionReport {
    /// Suggested experiments (empty unless the outcome is
    /// [`SuggestionOutcome::Suggestions`]).
    #[must_use]
    pub fn suggestions(&self) -> &[Suggestion] {
        match &self.outcome {
            SuggestionOutcome::Suggestions(batch) => batch,
            _ => &[],
        }
    }

    /// True for a terminal round: exhausted, or solved without `--all`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self.outcome, SuggestionOutcome::Solved { .. } | SuggestionOutcome::Exhausted)
    }
}

/// Suggestion engine for one campaign.
pub struct SuggestionEngine<'a> {
    oracle: &'a dyn EnergyOracle,
    policy: PolicyFlags,
    attributor: Attributor<'a>,
    target: Phase,
    byproducts: Vec<Phase>,
    pool: ProductPool,
    temperatures: Vec<f64>,
}

impl<'a> SuggestionEngine<'a> {
    /// Build an engine for `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration holds unparsable formulas.
    pub fn new(config: &SynthesisConfig, oracle: &'a dyn EnergyOracle, policy: PolicyFlags) -> Result<Self> {
        let mut pool = candidate_pool(config)?;
        if config.open_system() {
            for gas in [Phase::oxygen(), Phase::carbon_dioxide()] {
                if !pool.byproducts.contains(&gas) {
                    pool.byproducts.push(gas);
                }
            }
        }
        Ok(Self {
            oracle,
            policy,
            attributor: Attributor::new(config, oracle, policy)?,
            target: config.target_phase()?,
            byproducts: config.byproduct_phases()?,
            pool,
            temperatures: config.sorted_temperatures(),
        })
    }

    /// Attribute every logged experiment, lowest temperature first, and merge
    /// the results into `store`.
    pub fn attribute_history(&self, log: &ExperimentLog, store: &mut PairwiseStore) -> Vec<Attribution> {
        let mut records: Vec<_> = log.iter().collect();
        records.sort_by(|a, b| a.temperature().total_cmp(&b.temperature()));
        records
            .into_iter()
            .map(|record| self.attributor.attribute_and_record(record, store))
            .collect()
    }

    /// Rank every untested (candidate, temperature) pair, best first.
    /// Entries whose evolved phases cannot reach the target, or that hit an
    /// oracle miss, are left out; misses are added to `warnings`.
    #[must_use]
    pub fn rank(
        &self,
        table: &CandidateTable,
        store: &PairwiseStore,
        log: &ExperimentLog,
        warnings: &mut Vec<Warning>,
    ) -> Vec<Suggestion> {
        self.rank_untested(table, store, log, warnings).0
    }

    /// Ranking plus the number of untested pairs it was built from.
    fn rank_untested(
        &self,
        table: &CandidateTable,
        store: &PairwiseStore,
        log: &ExperimentLog,
        warnings: &mut Vec<Warning>,
    ) -> (Vec<Suggestion>, usize) {
        let min_temperature = self.temperatures.first().copied().unwrap_or(0.0);
        let evolver = Evolver::new(store, self.oracle, self.policy, min_temperature);

        let mut ranking = Vec::new();
        let mut untested = 0;
        for candidate in table.iter() {
            for &temperature in &self.temperatures {
                if log.contains(candidate.precursors(), temperature) {
                    continue;
                }
                untested += 1;
                let evolution = evolver.evolve(&candidate.weighted_precursors(), temperature, warnings);
                if let Some(entry) = self.score(candidate, temperature, table.reference_temperature(), &evolution, store, log, warnings) {
                    ranking.push(entry);
                }
            }
        }

        let explore = self.policy.explore;
        ranking.sort_by_cached_key(|s: &Suggestion| s.rank_key(explore));
        (ranking, untested)
    }

    #[allow(clippy::too_many_arguments)]
    fn score(
        &self,
        candidate: &Candidate,
        temperature: f64,
        reference_temperature: f64,
        evolution: &Evolution,
        store: &PairwiseStore,
        log: &ExperimentLog,
        warnings: &mut Vec<Warning>,
    ) -> Option<Suggestion> {
        let precursors = candidate.precursors();
        let predicted = evolution.weight_fractions();

        if !evolution.steps.is_empty() && self.is_redundant(precursors, &predicted, log) {
            if self.policy.verbose {
                debug!(%precursors, temperature, "redundant prediction skipped");
            }
            return None;
        }

        let mut expected_yield = evolution.fraction_of(&self.target);
        if !self.policy.partial_yield && expected_yield < PURE_YIELD {
            expected_yield = 0.0;
        }

        let effective_energy = if evolution.steps.is_empty() {
            candidate.energy()
        } else {
            let mixture: Vec<(Phase, f64)> = evolution.phases.iter().map(|(p, a)| (p.clone(), *a)).collect();
            match mixture_route(&mixture, &self.target, &self.pool, self.oracle, reference_temperature) {
                Ok(route) => route.energy,
                Err(RouteFailure::Unbalanced) => {
                    debug!(%precursors, temperature, "evolved phases cannot form the target");
                    return None;
                }
                Err(RouteFailure::Oracle(warning)) => {
                    if !warnings.contains(&warning) {
                        warn!(%warning, %precursors, "suggestion excluded");
                        warnings.push(warning);
                    }
                    return None;
                }
            }
        };

        let mut detrimental: Vec<Phase> = evolution
            .intermediates()
            .filter(|p| **p != self.target && !self.byproducts.contains(p))
            .cloned()
            .collect();
        detrimental.sort();
        detrimental.dedup();

        let present: Vec<Phase> = evolution.phases.keys().cloned().collect();
        let new_interfaces = combinations(&present, 2)
            .iter()
            .filter(|pair| !store.knows(&ReactantPair::new(&pair[0], &pair[1])))
            .count();

        let eligible = detrimental.is_empty() || self.policy.partial_yield;
        let tier = if eligible && (effective_energy < 0.0 || expected_yield > 0.0) {
            Tier::Top
        } else {
            Tier::Demoted
        };

        Some(Suggestion {
            precursors: precursors.clone(),
            amounts: candidate.amounts(),
            temperature,
            energy: candidate.energy(),
            effective_energy,
            expected_yield,
            predicted,
            detrimental,
            new_interfaces,
            tier,
        })
    }

    /// Another precursor set already produced these phases at the lowest
    /// temperature.
    fn is_redundant(&self, precursors: &PrecursorSet, predicted: &[(Phase, f64)], log: &ExperimentLog) -> bool {
        let Some(&lowest) = self.temperatures.first() else {
            return false;
        };
        log.iter()
            .filter(|r| r.precursors() != precursors && temperature_key(r.temperature()) == temperature_key(lowest))
            .any(|r| {
                let observed = r.phase_fractions();
                observed.len() == predicted.len()
                    && observed
                        .iter()
                        .zip(predicted)
                        .all(|((p, w), (q, v))| p == q && (w - v).abs() <= REDUNDANCY_TOLERANCE)
            })
    }

    /// Run one suggestion round: attribute the history into `store`, rank,
    /// and pick `batch_size` experiments on distinct precursor sets.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `batch_size` is zero.
    pub fn suggest(
        &self,
        table: &CandidateTable,
        store: &mut PairwiseStore,
        log: &ExperimentLog,
        batch_size: usize,
    ) -> Result<SuggestionReport> {
        if batch_size == 0 {
            return Err(Error::InvalidInput("batch size must be positive".to_string()));
        }
        let attributions = self.attribute_history(log, store);
        let mut warnings: Vec<Warning> = Vec::new();
        for warning in attributions.iter().flat_map(|a| a.warnings.iter()) {
            if !warnings.contains(warning) {
                warnings.push(warning.clone());
            }
        }

        let (ranking, untested) = self.rank_untested(table, store, log, &mut warnings);
        let solved = log.solved_by(&self.target);

        let (outcome, state) = match solved {
            Some(record) if !self.policy.all => (
                SuggestionOutcome::Solved {
                    precursors: record.precursors().clone(),
                    temperature: record.temperature(),
                },
                SuggestionState::Solved,
            ),
            solved => {
                let state = if solved.is_some() {
                    SuggestionState::Solved
                } else if untested == 0 {
                    SuggestionState::Exhausted
                } else {
                    SuggestionState::InProgress
                };
                let outcome = if untested == 0 {
                    SuggestionOutcome::Exhausted
                } else if ranking.is_empty() {
                    warn!(untested, warnings = warnings.len(), "no untested entry could be ranked");
                    SuggestionOutcome::Unranked { untested }
                } else {
                    SuggestionOutcome::Suggestions(self.select_batch(&ranking, batch_size)?)
                };
                (outcome, state)
            }
        };

        info!(
            ranked = ranking.len(),
            ?state,
            warnings = warnings.len(),
            "suggestion round finished"
        );
        Ok(SuggestionReport {
            outcome,
            state,
            ranking,
            attributions,
            warnings,
        })
    }

    /// Best entry of each distinct precursor set, top `batch_size` of those.
    fn select_batch(&self, ranking: &[Suggestion], batch_size: usize) -> Result<Vec<Suggestion>> {
        let explore = self.policy.explore;
        let mut best: BTreeMap<String, &Suggestion> = BTreeMap::new();
        for entry in ranking {
            best.entry(entry.precursors.key()).or_insert(entry);
        }
        let distinct: Vec<&Suggestion> = best.into_values().collect();
        let batch = distinct.top_k_by_key(batch_size, |s| s.rank_key(explore))?;
        Ok(batch.into_iter().map(|s| (*s).clone()).collect())
    }
}

/// One-shot suggestion round; see [`SuggestionEngine::suggest`].
///
/// # Errors
///
/// Returns an error for unparsable configuration formulas or a zero batch size.
pub fn suggest(
    config: &SynthesisConfig,
    table: &CandidateTable,
    store: &mut PairwiseStore,
    log: &ExperimentLog,
    oracle: &dyn EnergyOracle,
    policy: PolicyFlags,
    batch_size: usize,
) -> Result<SuggestionReport> {
    SuggestionEngine::new(config, oracle, policy)?.suggest(table, store, log, batch_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidates::generate_candidates;
    use crate::experiment::ExperimentRecord;
    use crate::oracle::TabulatedOracle;
    use crate::pairwise::{Outcome, PairStatus, ProductSet};

    fn phase(formula: &str) -> Phase {
        Phase::new(formula).unwrap()
    }

    fn oracle() -> TabulatedOracle {
        let mut oracle = TabulatedOracle::new();
        for (formula, energy) in [
            ("BaO", -2.9),
            ("CuO", -0.8),
            ("BaO2", -2.0),
            ("BaCuO2", -2.0),
            ("BaCO3", -2.4),
            ("Ba2CuO3", -2.3),
            ("CO2", -1.37),
        ] {
            oracle.insert(formula, 800.0, energy).unwrap();
        }
        oracle
    }

    fn config() -> SynthesisConfig {
        SynthesisConfig::builder(["BaO", "BaO2", "CuO", "BaCO3"], "BaCuO2", [600.0, 800.0])
            .allowed_byproducts(["O2", "CO2"])
            .build()
            .unwrap()
    }

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
    fn test_fresh_campaign_follows_driving_force() {
        let oracle = oracle();
        let config = config();
        let table = generate_candidates(&config, &oracle).unwrap();
        let engine = SuggestionEngine::new(&config, &oracle, PolicyFlags::new()).unwrap();

        let report = engine.suggest(&table, &mut PairwiseStore::new(), &ExperimentLog::new(), 1).unwrap();
        assert_eq!(report.state, SuggestionState::InProgress);
        assert_eq!(report.ranking.len(), table.len() * 2);
        let first = &report.suggestions()[0];
        assert_eq!(first.precursors, table.candidates()[0].precursors().clone());
        assert_eq!(first.temperature, 600.0);
        assert!((first.effective_energy - first.energy).abs() < 1e-9);
    }

    #[test]
    fn test_detrimental_intermediate_demotes_candidate() {
        let oracle = oracle();
        let config = config();
        let table = generate_candidates(&config, &oracle).unwrap();
        let mut store = PairwiseStore::new();
        let pair = ReactantPair::new(&phase("BaO"), &phase("CuO"));
        let products: ProductSet = [phase("Ba2CuO3")].into_iter().collect();
        store.record(&pair, 600.0, &Outcome::Reacts(products)).unwrap();

        let engine = SuggestionEngine::new(&config, &oracle, PolicyFlags::new()).unwrap();
        let ranking = engine.rank(&table, &store, &ExperimentLog::new(), &mut Vec::new());
        let demoted = ranking
            .iter()
            .find(|s| s.precursors.key() == "BaO, CuO" && s.temperature == 800.0)
            .unwrap();
        assert_eq!(demoted.detrimental, vec![phase("Ba2CuO3")]);
        assert!(demoted.effective_energy < 0.0);
        assert_eq!(demoted.tier, Tier::Demoted);
        assert_eq!(ranking[0].tier, Tier::Top);

        let partial = SuggestionEngine::new(&config, &oracle, PolicyFlags::new().with_partial_yield(true)).unwrap();
        let ranking = partial.rank(&table, &store, &ExperimentLog::new(), &mut Vec::new());
        let entry = ranking
            .iter()
            .find(|s| s.precursors.key() == "BaO, CuO" && s.temperature == 800.0)
            .unwrap();
        assert_eq!(entry.tier, Tier::Top);
    }

    #[test]
    fn test_tested_pairs_are_excluded_and_batch_is_distinct() {
        let oracle = oracle();
        let config = config();
        let table = generate_candidates(&config, &oracle).unwrap();
        let mut log = ExperimentLog::new();
        log.add(record(&["BaO", "CuO"], 600.0, &[("BaO", 45.0), ("CuO", 55.0)])).unwrap();

        let engine = SuggestionEngine::new(&config, &oracle, PolicyFlags::new()).unwrap();
        let report = engine.suggest(&table, &mut PairwiseStore::new(), &log, 3).unwrap();
        assert!(!report
            .ranking
            .iter()
            .any(|s| s.precursors.key() == "BaO, CuO" && s.temperature == 600.0));
        let keys: Vec<String> = report.suggestions().iter().map(|s| s.precursors.key()).collect();
        let mut distinct = keys.clone();
        distinct.dedup();
        assert_eq!(keys.len(), distinct.len());
    }

    #[test]
    fn test_solved_campaign_stops_unless_all() {
        let oracle = oracle();
        let config = config();
        let table = generate_candidates(&config, &oracle).unwrap();
        let mut log = ExperimentLog::new();
        log.add(record(&["BaO", "CuO"], 800.0, &[("BaCuO2", 100.0)])).unwrap();

        let engine = SuggestionEngine::new(&config, &oracle, PolicyFlags::new()).unwrap();
        let report = engine.suggest(&table, &mut PairwiseStore::new(), &log, 1).unwrap();
        assert_eq!(report.state, SuggestionState::Solved);
        assert!(report.is_terminal());

        let engine = SuggestionEngine::new(&config, &oracle, PolicyFlags::new().with_all(true)).unwrap();
        let report = engine.suggest(&table, &mut PairwiseStore::new(), &log, 1).unwrap();
        assert_eq!(report.state, SuggestionState::Solved);
        assert_eq!(report.suggestions().len(), 1);
    }

    #[test]
    fn test_inert_pair_is_not_a_new_interface() {
        let oracle = oracle();
        let config = config();
        let table = generate_candidates(&config, &oracle).unwrap();
        let mut store = PairwiseStore::new();
        store
            .record(&ReactantPair::new(&phase("BaO"), &phase("CuO")), 600.0, &Outcome::NoReaction)
            .unwrap();

        let engine = SuggestionEngine::new(&config, &oracle, PolicyFlags::new().with_explore(true)).unwrap();
        let ranking = engine.rank(&table, &store, &ExperimentLog::new(), &mut Vec::new());
        let entry = |key: &str| {
            ranking
                .iter()
                .find(|s| s.precursors.key() == key && s.temperature == 800.0)
                .unwrap()
        };
        // Inert only up to 600 C: unresolved at 800 C but already known
        assert_eq!(store.lookup(&ReactantPair::new(&phase("BaO"), &phase("CuO")), 800.0), PairStatus::Unknown);
        assert_eq!(entry("BaO, CuO").new_interfaces, 0);
        assert_eq!(entry("BaCO3, CuO").new_interfaces, 1);
    }

    #[test]
    fn test_evolved_route_scored_at_reference_temperature() {
        let mut oracle = oracle();
        for (formula, energy) in [
            ("BaO", -2.9),
            ("CuO", -0.8),
            ("BaO2", -2.0),
            ("BaCuO2", -2.0),
            ("BaCO3", -2.4),
            ("Ba2CuO3", -2.5),
            ("CO2", -1.37),
        ] {
            oracle.insert(formula, 600.0, energy).unwrap();
        }
        let config = config();
        let table = generate_candidates(&config, &oracle).unwrap();
        let mut store = PairwiseStore::new();
        let products: ProductSet = [phase("Ba2CuO3")].into_iter().collect();
        store
            .record(&ReactantPair::new(&phase("BaO"), &phase("CuO")), 600.0, &Outcome::Reacts(products))
            .unwrap();

        let engine = SuggestionEngine::new(&config, &oracle, PolicyFlags::new().with_partial_yield(true)).unwrap();
        let evolved = [(phase("Ba2CuO3"), 0.5), (phase("CuO"), 0.5)];
        let at = |temperature| {
            mixture_route(&evolved, &phase("BaCuO2"), &engine.pool, &oracle, temperature)
                .unwrap()
                .energy
        };
        let (reference, lowest) = (at(800.0), at(600.0));
        assert!(reference < 0.0);
        assert!(lowest > 0.0);

        let ranking = engine.rank(&table, &store, &ExperimentLog::new(), &mut Vec::new());
        let entry = ranking
            .iter()
            .find(|s| s.precursors.key() == "BaO, CuO" && s.temperature == 600.0)
            .unwrap();
        assert!((entry.effective_energy - reference).abs() < 1e-6);
        assert_eq!(entry.tier, Tier::Top);
    }

    #[test]
    fn test_zero_batch_is_rejected() {
        let oracle = oracle();
        let config = config();
        let table = generate_candidates(&config, &oracle).unwrap();
        let engine = SuggestionEngine::new(&config, &oracle, PolicyFlags::new()).unwrap();
        assert!(engine.suggest(&table, &mut PairwiseStore::new(), &ExperimentLog::new(), 0).is_err());
    }
}

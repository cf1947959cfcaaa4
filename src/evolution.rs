//! Forward prediction of a precursor set's reaction path
//!
//! Starting from the precursors (with amounts), known pairwise reactions are
//! applied one at a time, lowest onset temperature first. Each step consumes
//! the limiting reagent, leaves the excess reactant behind and drops gaseous
//! products. Evolution stops when no known reaction applies, when the order
//! of reactions can't be decided, or when a phase set repeats.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, trace};

use crate::chemistry::{combinations, Phase};
use crate::config::PolicyFlags;
use crate::oracle::EnergyOracle;
use crate::pairwise::{format_products, PairStatus, PairwiseStore, ProductSet, ReactantPair};
use crate::reaction::Reaction;
use crate::Warning;

/// Upper bound on applied reactions per evolution.
pub const MAX_EVOLUTION_STEPS: usize = 16;

/// Amounts at or below this are treated as fully consumed.
const AMOUNT_EPS: f64 = 1e-6;

/// Phase amounts of a reacting mixture (solids only).
pub type Mixture = BTreeMap<Phase, f64>;

/// Build a mixture from (phase, amount) pairs, dropping gases and empty entries.
#[must_use]
pub fn mixture_of(phases: &[(Phase, f64)]) -> Mixture {
    let mut mixture = Mixture::new();
    for (phase, amount) in phases {
        if !phase.is_gas() && *amount > AMOUNT_EPS {
            *mixture.entry(phase.without_polymorph()).or_insert(0.0) += amount;
        }
    }
    mixture
}

/// Weight fractions (0-1) of a mixture.
#[must_use]
pub fn weight_fractions(mixture: &Mixture) -> Vec<(Phase, f64)> {
    let total: f64 = mixture.iter().map(|(p, a)| p.molar_mass() * a).sum();
    if total <= 0.0 {
        return Vec::new();
    }
    mixture
        .iter()
        .map(|(p, a)| (p.clone(), p.molar_mass() * a / total))
        .collect()
}

/// Apply `reaction` to `mixture` at the limiting reagent's extent.
///
/// Gaseous reactants are unlimited. Returns `None` if a solid reactant is
/// missing.
#[must_use]
pub fn apply_reaction(mixture: &Mixture, reaction: &Reaction) -> Option<Mixture> {
    let extent = reaction
        .reactants()
        .iter()
        .filter(|(p, _)| !p.is_gas())
        .map(|(p, c)| mixture.get(p).map(|available| available / c))
        .try_fold(f64::INFINITY, |acc, ratio| ratio.map(|r| acc.min(r)))?;
    if !extent.is_finite() || extent <= AMOUNT_EPS {
        return None;
    }

    let mut next = mixture.clone();
    for (phase, coefficient) in reaction.reactants().iter().filter(|(p, _)| !p.is_gas()) {
        if let Some(amount) = next.get_mut(phase) {
            *amount -= extent * coefficient;
        }
    }
    for (phase, coefficient) in reaction.products().iter().filter(|(p, _)| !p.is_gas()) {
        *next.entry(phase.clone()).or_insert(0.0) += extent * coefficient;
    }
    next.retain(|_, amount| *amount > AMOUNT_EPS);
    Some(next)
}

/// Balance a pairwise reaction, letting O2/CO2 enter or leave.
#[must_use]
pub fn balance_pairwise(pair: &ReactantPair, products: &ProductSet) -> Option<Reaction> {
    let gases = [Phase::oxygen(), Phase::carbon_dioxide()];
    let reactants = pair.phases();
    let products: Vec<Phase> = products.iter().cloned().collect();
    Reaction::balanced_with_gases(&reactants, &products, &gases, &gases)
}

/// One applied reaction.
#[derive(Debug, Clone, PartialEq)]
pub struct EvolutionStep {
    /// Reacting pair
    pub pair: ReactantPair,
    /// Balanced reaction that was applied
    pub reaction: Reaction,
    /// Temperature (°C) the reaction was observed at
    pub onset: f64,
}

/// Why evolution stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// No known reaction among the present phases
    NoKnownReaction,
    /// Some pair is unknown, so the first reaction can't be decided
    UnknownPairs,
    /// Two reactions share the lowest onset
    Degenerate,
    /// A phase set repeated
    Cycle,
    /// [`MAX_EVOLUTION_STEPS`] reached
    StepLimit,
    /// A known reaction could not be balanced
    Unbalanced,
}

/// Predicted phase evolution of one precursor set at one temperature.
#[derive(Debug, Clone, PartialEq)]
pub struct Evolution {
    /// Final mixture
    pub phases: Mixture,
    /// Applied reactions, in order
    pub steps: Vec<EvolutionStep>,
    /// Why it stopped
    pub stop: StopReason,
}

impl Evolution {
    /// Weight fraction (0-1) of `phase` in the final mixture.
    #[must_use]
    pub fn fraction_of(&self, phase: &Phase) -> f64 {
        weight_fractions(&self.phases)
            .into_iter()
            .find(|(p, _)| p == phase)
            .map_or(0.0, |(_, w)| w)
    }

    /// Final phases with weight fractions (0-1).
    #[must_use]
    pub fn weight_fractions(&self) -> Vec<(Phase, f64)> {
        weight_fractions(&self.phases)
    }

    /// Products of all applied steps.
    pub fn intermediates(&self) -> impl Iterator<Item = &Phase> {
        self.steps
            .iter()
            .flat_map(|s| s.reaction.products().iter().map(|(p, _)| p))
            .filter(|p| !p.is_gas())
    }
}

/// Shared inputs for evolution.
#[derive(Clone, Copy)]
pub struct Evolver<'a> {
    store: &'a PairwiseStore,
    oracle: &'a dyn EnergyOracle,
    policy: PolicyFlags,
    min_temperature: f64,
}

impl<'a> Evolver<'a> {
    /// `min_temperature` is the campaign's lowest sampled temperature, the
    /// threshold for the greedy rule.
    #[must_use]
    pub const fn new(
        store: &'a PairwiseStore,
        oracle: &'a dyn EnergyOracle,
        policy: PolicyFlags,
        min_temperature: f64,
    ) -> Self {
        Self {
            store,
            oracle,
            policy,
            min_temperature,
        }
    }

    /// Evolve `start` at `temperature`. Oracle misses from the favorability
    /// check (only with `enforce_thermo`) are appended to `warnings`.
    #[must_use]
    pub fn evolve(&self, start: &[(Phase, f64)], temperature: f64, warnings: &mut Vec<Warning>) -> Evolution {
        let mut mixture = mixture_of(start);
        let mut steps = Vec::new();
        let mut seen: BTreeSet<BTreeSet<Phase>> = BTreeSet::new();
        seen.insert(mixture.keys().cloned().collect());

        loop {
            if steps.len() >= MAX_EVOLUTION_STEPS {
                return self.finish(mixture, steps, StopReason::StepLimit);
            }
            let (pair, products, onset) = match self.next_reaction(&mixture, temperature, warnings) {
                Ok(next) => next,
                Err(reason) => return self.finish(mixture, steps, reason),
            };
            let Some(reaction) = balance_pairwise(&pair, &products) else {
                return self.finish(mixture, steps, StopReason::Unbalanced);
            };
            let Some(next) = apply_reaction(&mixture, &reaction) else {
                return self.finish(mixture, steps, StopReason::NoKnownReaction);
            };
            trace!(%reaction, onset, "evolution step");
            steps.push(EvolutionStep { pair, reaction, onset });
            mixture = next;
            if !seen.insert(mixture.keys().cloned().collect()) {
                return self.finish(mixture, steps, StopReason::Cycle);
            }
        }
    }

    fn finish(&self, phases: Mixture, steps: Vec<EvolutionStep>, stop: StopReason) -> Evolution {
        if self.policy.verbose {
            debug!(steps = steps.len(), ?stop, "evolution finished");
        }
        Evolution { phases, steps, stop }
    }

    /// The next reaction to apply: (pair, products, onset temperature).
    fn next_reaction(
        &self,
        mixture: &Mixture,
        temperature: f64,
        warnings: &mut Vec<Warning>,
    ) -> Result<(ReactantPair, ProductSet, f64), StopReason> {
        let present: Vec<Phase> = mixture.keys().cloned().collect();
        let interfaces: Vec<ReactantPair> = present
            .iter()
            .map(ReactantPair::single)
            .chain(combinations(&present, 2).iter().map(|p| ReactantPair::new(&p[0], &p[1])))
            .collect();

        let mut unknown = false;
        let mut known: Vec<(f64, ReactantPair, ProductSet)> = Vec::new();
        for pair in interfaces {
            match self.store.lookup(&pair, temperature) {
                PairStatus::Reacts(products) => {
                    if self.policy.enforce_thermo && !self.favorable(&pair, products, temperature, warnings) {
                        continue;
                    }
                    let onset = self
                        .store
                        .earliest_reaction(&pair)
                        .map_or(temperature, |(_, t)| t);
                    known.push((onset, pair, products.clone()));
                }
                PairStatus::Inert => {}
                // Single phases need no record: absence of a known decomposition
                // does not block prediction.
                PairStatus::Unknown => unknown |= pair.second().is_some(),
            }
        }
        known.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        if self.policy.greedy {
            if let Some(first) = pick_lowest(known.iter().filter(|k| k.0 <= self.min_temperature))? {
                return Ok(first);
            }
        }
        if unknown {
            return Err(StopReason::UnknownPairs);
        }
        pick_lowest(known.iter())?.ok_or(StopReason::NoKnownReaction)
    }

    fn favorable(
        &self,
        pair: &ReactantPair,
        products: &ProductSet,
        temperature: f64,
        warnings: &mut Vec<Warning>,
    ) -> bool {
        let Some(reaction) = balance_pairwise(pair, products) else {
            return false;
        };
        match reaction.energy(self.oracle, temperature) {
            Ok(energy) => energy < 0.0,
            Err(warning) => {
                debug!(%pair, products = %format_products(products), "favorability unknown");
                if !warnings.contains(&warning) {
                    warnings.push(warning);
                }
                false
            }
        }
    }
}

/// Lowest-onset reaction, `Err(Degenerate)` if two different pairs tie.
fn pick_lowest<'k>(
    mut known: impl Iterator<Item = &'k (f64, ReactantPair, ProductSet)>,
) -> Result<Option<(ReactantPair, ProductSet, f64)>, StopReason> {
    let Some((onset, pair, products)) = known.next() else {
        return Ok(None);
    };
    if let Some((next_onset, next_pair, _)) = known.next() {
        if (next_onset - onset).abs() < f64::EPSILON && next_pair != pair {
            return Err(StopReason::Degenerate);
        }
    }
    Ok(Some((pair.clone(), products.clone(), *onset)))
}

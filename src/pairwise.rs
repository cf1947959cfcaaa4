//! Pairwise Reaction Store
//!
//! Empirical model of which phase pairs react, at what temperature, and into
//! what. Each pair holds one or more [`Observation`]s:
//!
//! - inert: no reaction at or below `lower`; onset somewhere in `(lower, 2000]`
//! - reacting: forms `products` somewhere in `(lower, upper]`
//!
//! New observations only ever narrow intervals. An observation that
//! contradicts the stored record is rejected with a
//! [`Warning::StoreConflict`] and the store is left untouched.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::{debug, warn};

use crate::chemistry::Phase;
use crate::{Error, Result, Warning};

/// Lower temperature sentinel (°C): nothing known about low temperatures.
pub const LOWEST_TEMPERATURE: f64 = 0.0;

/// Upper temperature sentinel (°C): nothing known about the onset.
pub const HIGHEST_TEMPERATURE: f64 = 2000.0;

/// Products marker for "no reaction" in the persisted database.
pub const NO_REACTION: &str = "None";

/// Solid products of a pairwise reaction.
pub type ProductSet = BTreeSet<Phase>;

/// Join products as `A + B`.
#[must_use]
pub fn format_products(products: &ProductSet) -> String {
    products.iter().map(Phase::formula).collect::<Vec<_>>().join(" + ")
}

/// Unordered pair of reacting phases, or a single phase (decomposition).
///
/// Structure labels are dropped: pairs are keyed by reduced formula.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReactantPair {
    first: Phase,
    second: Option<Phase>,
}

impl ReactantPair {
    /// Pair of two phases in canonical order; identical phases collapse to a single.
    #[must_use]
    pub fn new(a: &Phase, b: &Phase) -> Self {
        let (a, b) = (a.without_polymorph(), b.without_polymorph());
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Self { first: a, second: Some(b) },
            std::cmp::Ordering::Greater => Self { first: b, second: Some(a) },
            std::cmp::Ordering::Equal => Self { first: a, second: None },
        }
    }

    /// A single phase reacting on its own.
    #[must_use]
    pub fn single(phase: &Phase) -> Self {
        Self {
            first: phase.without_polymorph(),
            second: None,
        }
    }

    /// Parse `"A + B"` or `"A"`.
    ///
    /// # Errors
    ///
    /// Returns an error for more than two phases or unparsable formulas.
    pub fn parse(text: &str) -> Result<Self> {
        let parts: Vec<&str> = text.split('+').map(str::trim).filter(|s| !s.is_empty()).collect();
        match parts.as_slice() {
            [a] => Ok(Self::single(&Phase::from_id(a)?)),
            [a, b] => Ok(Self::new(&Phase::from_id(a)?, &Phase::from_id(b)?)),
            _ => Err(Error::InvalidInput(format!(
                "pairwise reactants '{text}' must name one or two phases"
            ))),
        }
    }

    /// Phases of the pair (one or two).
    #[must_use]
    pub fn phases(&self) -> Vec<Phase> {
        std::iter::once(self.first.clone()).chain(self.second.clone()).collect()
    }

    /// First phase in canonical order.
    #[must_use]
    pub const fn first(&self) -> &Phase {
        &self.first
    }

    /// Second phase, `None` for a single-phase entry.
    #[must_use]
    pub const fn second(&self) -> Option<&Phase> {
        self.second.as_ref()
    }

    /// True if `phase` (ignoring structure label) is part of the pair.
    #[must_use]
    pub fn contains(&self, phase: &Phase) -> bool {
        let phase = phase.without_polymorph();
        self.first == phase || self.second.as_ref() == Some(&phase)
    }
}

impl fmt::Display for ReactantPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.second {
            Some(second) => write!(f, "{} + {}", self.first.formula(), second.formula()),
            None => f.write_str(self.first.formula()),
        }
    }
}

/// Outcome of one experiment for one pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The pair did not react
    NoReaction,
    /// The pair reacted into these products
    Reacts(ProductSet),
}

/// What the store knows about a pair at one temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairStatus<'a> {
    /// Known to have reacted at or below the temperature
    Reacts(&'a ProductSet),
    /// Known not to react at the temperature
    Inert,
    /// Not enough information
    Unknown,
}

/// One temperature-bounded observation for a pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    products: Option<ProductSet>,
    lower: f64,
    upper: f64,
}

impl Observation {
    /// No reaction at or below `temperature`.
    #[must_use]
    pub const fn inert(temperature: f64) -> Self {
        Self {
            products: None,
            lower: temperature,
            upper: HIGHEST_TEMPERATURE,
        }
    }

    /// Reaction into `products` somewhere in `(lower, upper]`.
    #[must_use]
    pub const fn reacting(products: ProductSet, lower: f64, upper: f64) -> Self {
        Self {
            products: Some(products),
            lower,
            upper,
        }
    }

    /// Products, `None` for an inert observation.
    #[must_use]
    pub const fn products(&self) -> Option<&ProductSet> {
        self.products.as_ref()
    }

    /// Highest temperature known to show no reaction.
    #[must_use]
    pub const fn lower(&self) -> f64 {
        self.lower
    }

    /// Temperature at which the reaction was seen (sentinel for inert).
    #[must_use]
    pub const fn upper(&self) -> f64 {
        self.upper
    }

    /// True for an inert observation.
    #[must_use]
    pub const fn is_inert(&self) -> bool {
        self.products.is_none()
    }

    /// Temperature range text as persisted.
    #[must_use]
    pub fn describe(&self) -> String {
        let has_lower = self.lower > LOWEST_TEMPERATURE;
        let has_upper = self.products.is_some() && self.upper < HIGHEST_TEMPERATURE;
        match (has_lower, has_upper) {
            (true, true) => format!(
                "Reacts between {}-{} C",
                format_temperature(self.lower),
                format_temperature(self.upper)
            ),
            (true, false) => format!("Does not react at or below {} C", format_temperature(self.lower)),
            (false, true) => format!("Reacts below {} C", format_temperature(self.upper)),
            (false, false) => "Unknown".to_string(),
        }
    }

    /// Parse persisted products and range text.
    ///
    /// # Errors
    ///
    /// Returns an error for unrecognised range text or unparsable formulas.
    pub fn parse(products: &str, range: &str) -> Result<Self> {
        let products = products.trim();
        let products = if products.is_empty() || products == NO_REACTION {
            None
        } else {
            Some(
                products
                    .split('+')
                    .map(|p| Phase::from_id(p.trim()).map(|phase| phase.without_polymorph()))
                    .collect::<Result<ProductSet>>()?,
            )
        };

        let range = range.trim();
        let bad = || Error::InvalidInput(format!("unrecognised temperature range '{range}'"));
        let number = |text: &str| -> Result<f64> { text.trim().trim_end_matches('C').trim().parse().map_err(|_| bad()) };

        let (lower, upper) = if let Some(rest) = range.strip_prefix("Reacts between") {
            let (lo, hi) = rest.split_once('-').ok_or_else(bad)?;
            (number(lo)?, number(hi)?)
        } else if let Some(rest) = range.strip_prefix("Does not react at or below") {
            (number(rest)?, HIGHEST_TEMPERATURE)
        } else if let Some(rest) = range.strip_prefix("Reacts below") {
            (LOWEST_TEMPERATURE, number(rest)?)
        } else if range == "Unknown" {
            (LOWEST_TEMPERATURE, HIGHEST_TEMPERATURE)
        } else {
            return Err(bad());
        };

        match products {
            None => Ok(Self::inert(lower)),
            Some(products) => Ok(Self::reacting(products, lower, upper)),
        }
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.products {
            Some(products) => write!(f, "{} ({})", format_products(products), self.describe()),
            None => write!(f, "{NO_REACTION} ({})", self.describe()),
        }
    }
}

/// Temperatures print without decimals when integral.
fn format_temperature(temperature: f64) -> String {
    crate::reaction::format_coefficient(temperature)
}

/// Persistent map from reactant pairs to observations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairwiseStore {
    records: BTreeMap<ReactantPair, Vec<Observation>>,
}

impl PairwiseStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Known outcome for `pair` at `temperature`.
    ///
    /// Reacting wins when an observation has `upper <= temperature` (the
    /// earliest such reaction). Inert requires every observation to have
    /// `lower >= temperature`.
    #[must_use]
    pub fn lookup(&self, pair: &ReactantPair, temperature: f64) -> PairStatus<'_> {
        let Some(observations) = self.records.get(pair) else {
            return PairStatus::Unknown;
        };
        let earliest = observations
            .iter()
            .filter(|o| o.upper <= temperature)
            .filter_map(|o| o.products.as_ref().map(|p| (p, o.upper)))
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((products, _)) = earliest {
            return PairStatus::Reacts(products);
        }
        if observations.iter().all(|o| o.lower >= temperature) {
            PairStatus::Inert
        } else {
            PairStatus::Unknown
        }
    }

    /// Earliest known reaction of `pair`: products and the temperature it was seen at.
    #[must_use]
    pub fn earliest_reaction(&self, pair: &ReactantPair) -> Option<(&ProductSet, f64)> {
        self.records
            .get(pair)?
            .iter()
            .filter_map(|o| o.products.as_ref().map(|p| (p, o.upper)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// True if the pair has any reacting or inert observation.
    #[must_use]
    pub fn knows(&self, pair: &ReactantPair) -> bool {
        self.records
            .get(pair)
            .is_some_and(|obs| obs.iter().any(|o| o.products.is_some() || o.lower > LOWEST_TEMPERATURE))
    }

    /// Pairs known not to react at `temperature`.
    #[must_use]
    pub fn inert_pairs(&self, temperature: f64) -> Vec<&ReactantPair> {
        self.records
            .keys()
            .filter(|pair| self.lookup(pair, temperature) == PairStatus::Inert)
            .collect()
    }

    /// Observations stored for `pair`.
    #[must_use]
    pub fn observations(&self, pair: &ReactantPair) -> &[Observation] {
        self.records.get(pair).map_or(&[][..], Vec::as_slice)
    }

    /// Merge one observation of `pair` at `temperature`.
    ///
    /// Returns whether the store changed.
    ///
    /// # Errors
    ///
    /// Returns [`Warning::StoreConflict`] when the outcome contradicts the
    /// stored record; the store is unchanged in that case.
    pub fn record(&mut self, pair: &ReactantPair, temperature: f64, outcome: &Outcome) -> std::result::Result<bool, Warning> {
        let observations = self.records.entry(pair.clone()).or_default();
        let result = match outcome {
            Outcome::NoReaction => record_inert(observations, pair, temperature),
            Outcome::Reacts(products) => record_reaction(observations, pair, temperature, products),
        };
        if observations.is_empty() {
            self.records.remove(pair);
        }
        match &result {
            Ok(true) => debug!(%pair, temperature, ?outcome, "pairwise record updated"),
            Ok(false) => {}
            Err(warning) => warn!(%warning, "pairwise record rejected"),
        }
        result
    }

    /// Insert a persisted observation as-is, merging with what is stored.
    ///
    /// # Errors
    ///
    /// Returns [`Warning::StoreConflict`] if it contradicts the stored record.
    pub fn insert_observation(
        &mut self,
        pair: &ReactantPair,
        observation: Observation,
    ) -> std::result::Result<bool, Warning> {
        let observations = self.records.entry(pair.clone()).or_default();
        if observations.contains(&observation) {
            return Ok(false);
        }
        let result = merge_observation(observations, pair, &observation);
        if observations.is_empty() {
            self.records.remove(pair);
        }
        result
    }

    /// Union another store into this one.
    ///
    /// Pairs absent here are copied whole. For shared pairs each incoming
    /// observation is merged; contradictions are returned as warnings and the
    /// existing record kept. Importing the same store twice changes nothing
    /// the second time.
    pub fn import(&mut self, other: &Self) -> Vec<Warning> {
        let mut warnings = Vec::new();
        for (pair, incoming) in &other.records {
            if !self.records.contains_key(pair) {
                self.records.insert(pair.clone(), incoming.clone());
                continue;
            }
            for observation in incoming {
                if let Err(warning) = self.insert_observation(pair, observation.clone()) {
                    warn!(%warning, "import conflict");
                    warnings.push(warning);
                }
            }
        }
        debug!(pairs = self.records.len(), conflicts = warnings.len(), "pairwise store imported");
        warnings
    }

    /// Number of pairs with observations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no pair is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Pairs and observations in canonical pair order.
    pub fn iter(&self) -> impl Iterator<Item = (&ReactantPair, &[Observation])> {
        self.records.iter().map(|(pair, obs)| (pair, obs.as_slice()))
    }
}

fn conflict(pair: &ReactantPair, existing: &Observation, incoming: String) -> Warning {
    Warning::StoreConflict {
        pair: pair.to_string(),
        existing: existing.to_string(),
        incoming,
    }
}

fn record_inert(
    observations: &mut Vec<Observation>,
    pair: &ReactantPair,
    temperature: f64,
) -> std::result::Result<bool, Warning> {
    if let Some(existing) = observations
        .iter()
        .find(|o| o.products.is_some() && o.upper <= temperature)
    {
        return Err(conflict(
            pair,
            existing,
            format!("{NO_REACTION} at {} C", format_temperature(temperature)),
        ));
    }
    if observations.is_empty() {
        observations.push(Observation::inert(temperature));
        return Ok(true);
    }
    let mut changed = false;
    for observation in observations.iter_mut().filter(|o| o.lower < temperature) {
        observation.lower = temperature;
        changed = true;
    }
    Ok(changed)
}

fn record_reaction(
    observations: &mut Vec<Observation>,
    pair: &ReactantPair,
    temperature: f64,
    products: &ProductSet,
) -> std::result::Result<bool, Warning> {
    if let Some(existing) = observations.iter().find(|o| {
        o.lower >= temperature && (o.products.is_none() || o.products.as_ref() == Some(products))
    }) {
        return Err(conflict(
            pair,
            existing,
            format!("{} at {} C", format_products(products), format_temperature(temperature)),
        ));
    }

    if let Some(same) = observations.iter_mut().find(|o| o.products.as_ref() == Some(products)) {
        if temperature < same.upper {
            same.upper = temperature;
            return Ok(true);
        }
        return Ok(false);
    }

    if let Some(inert) = observations.iter_mut().find(|o| o.products.is_none()) {
        inert.products = Some(products.clone());
        inert.upper = temperature;
        sort_observations(observations);
        return Ok(true);
    }

    let lower = observations
        .iter()
        .flat_map(|o| [o.lower, o.upper])
        .filter(|bound| *bound < temperature)
        .fold(LOWEST_TEMPERATURE, f64::max);
    observations.push(Observation::reacting(products.clone(), lower, temperature));
    sort_observations(observations);
    Ok(true)
}

/// Merge a full observation (both bounds) into a pair's list.
fn merge_observation(
    observations: &mut Vec<Observation>,
    pair: &ReactantPair,
    incoming: &Observation,
) -> std::result::Result<bool, Warning> {
    match &incoming.products {
        None if incoming.lower <= LOWEST_TEMPERATURE => Ok(false),
        None => record_inert(observations, pair, incoming.lower),
        Some(products) => {
            let mut changed = record_reaction(observations, pair, incoming.upper, products)?;
            if let Some(same) = observations.iter_mut().find(|o| o.products.as_ref() == Some(products)) {
                if incoming.lower > same.lower && incoming.lower < same.upper {
                    same.lower = incoming.lower;
                    changed = true;
                }
            }
            Ok(changed)
        }
    }
}

fn sort_observations(observations: &mut [Observation]) {
    observations.sort_by(|a, b| a.upper.total_cmp(&b.upper).then(a.lower.total_cmp(&b.lower)));
}

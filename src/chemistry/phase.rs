//! Phases and precursor sets

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use super::Composition;
use crate::Result;

/// Gaseous species. O2 and CO2 take part in balancing; all of them are
/// dropped from solid phase sets.
const GASES: [&str; 4] = ["O2", "CO2", "H2O", "H3N"];

/// A chemical phase: reduced composition plus an optional polymorph label.
///
/// Identity (equality, ordering, hashing) is the reduced formula and the
/// polymorph label. Use [`Phase::without_polymorph`] when the structure label
/// must not distinguish phases.
#[derive(Debug, Clone)]
pub struct Phase {
    formula: String,
    composition: Composition,
    polymorph: Option<String>,
}

impl Phase {
    /// Phase from a plain formula such as `"YBa2Cu3O6.5"`.
    ///
    /// # Errors
    ///
    /// Returns an error if the formula cannot be parsed.
    pub fn new(formula: &str) -> Result<Self> {
        Ok(Self::from_composition(&Composition::parse(formula)?))
    }

    /// Phase from a phase identifier with an optional structure suffix,
    /// e.g. `"BaCO3_62"` (polymorph `62`) or `"CuO"`.
    ///
    /// # Errors
    ///
    /// Returns an error if the formula part cannot be parsed.
    pub fn from_id(id: &str) -> Result<Self> {
        let id = id.trim();
        match id.rsplit_once('_') {
            Some((formula, suffix)) if !suffix.is_empty() => {
                let mut phase = Self::new(formula)?;
                phase.polymorph = Some(suffix.to_string());
                Ok(phase)
            }
            _ => Self::new(id),
        }
    }

    /// Phase with the reduced form of `composition`.
    #[must_use]
    pub fn from_composition(composition: &Composition) -> Self {
        let (reduced, _) = composition.reduced();
        Self {
            formula: reduced.formula(),
            composition: reduced,
            polymorph: None,
        }
    }

    /// Molecular oxygen.
    #[must_use]
    pub fn oxygen() -> Self {
        Self::gas("O2")
    }

    /// Carbon dioxide.
    #[must_use]
    pub fn carbon_dioxide() -> Self {
        Self::gas("CO2")
    }

    fn gas(formula: &str) -> Self {
        let composition = match formula {
            "O2" => Composition::from_amounts(super::Element::from_symbol("O").map(|o| (o, 2.0))),
            _ => Composition::from_amounts(
                super::Element::from_symbol("C")
                    .map(|c| (c, 1.0))
                    .into_iter()
                    .chain(super::Element::from_symbol("O").map(|o| (o, 2.0))),
            ),
        };
        Self {
            formula: formula.to_string(),
            composition,
            polymorph: None,
        }
    }

    /// Reduced formula.
    #[must_use]
    pub fn formula(&self) -> &str {
        &self.formula
    }

    /// Reduced composition (one formula unit).
    #[must_use]
    pub const fn composition(&self) -> &Composition {
        &self.composition
    }

    /// Polymorph / structure label, if any.
    #[must_use]
    pub fn polymorph(&self) -> Option<&str> {
        self.polymorph.as_deref()
    }

    /// The same phase with the structure label removed.
    #[must_use]
    pub fn without_polymorph(&self) -> Self {
        Self {
            polymorph: None,
            ..self.clone()
        }
    }

    /// Phase identifier: formula, plus `_label` when a polymorph is set.
    #[must_use]
    pub fn id(&self) -> String {
        match &self.polymorph {
            Some(label) => format!("{}_{label}", self.formula),
            None => self.formula.clone(),
        }
    }

    /// True for gaseous species (O2, CO2, H2O, NH3).
    #[must_use]
    pub fn is_gas(&self) -> bool {
        GASES.contains(&self.formula.as_str())
    }

    /// Atoms per formula unit.
    #[must_use]
    pub fn num_atoms(&self) -> f64 {
        self.composition.num_atoms()
    }

    /// Molar mass per formula unit (g/mol).
    #[must_use]
    pub fn molar_mass(&self) -> f64 {
        self.composition.molar_mass()
    }
}

impl PartialEq for Phase {
    fn eq(&self, other: &Self) -> bool {
        self.formula == other.formula && self.polymorph == other.polymorph
    }
}

impl Eq for Phase {}

impl Hash for Phase {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.formula.hash(state);
        self.polymorph.hash(state);
    }
}

impl PartialOrd for Phase {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Phase {
    fn cmp(&self, other: &Self) -> Ordering {
        self.formula
            .cmp(&other.formula)
            .then_with(|| self.polymorph.cmp(&other.polymorph))
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

/// Unordered set of precursor phases for one experiment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrecursorSet(BTreeSet<Phase>);

impl PrecursorSet {
    /// Build from phases; duplicates collapse.
    pub fn new(phases: impl IntoIterator<Item = Phase>) -> Self {
        Self(phases.into_iter().collect())
    }

    /// Parse a list of formulas.
    ///
    /// # Errors
    ///
    /// Returns an error if any formula cannot be parsed.
    pub fn from_formulas<S: AsRef<str>>(formulas: &[S]) -> Result<Self> {
        formulas
            .iter()
            .map(|f| Phase::from_id(f.as_ref()))
            .collect::<Result<BTreeSet<_>>>()
            .map(Self)
    }

    /// Canonical key: sorted formulas joined by `", "`.
    #[must_use]
    pub fn key(&self) -> String {
        self.0.iter().map(Phase::id).collect::<Vec<_>>().join(", ")
    }

    /// Phases in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &Phase> {
        self.0.iter()
    }

    /// Number of phases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the set holds no phase.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Membership test.
    #[must_use]
    pub fn contains(&self, phase: &Phase) -> bool {
        self.0.contains(phase)
    }

    /// Underlying phase set.
    #[must_use]
    pub const fn phases(&self) -> &BTreeSet<Phase> {
        &self.0
    }
}

impl fmt::Display for PrecursorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self.0.iter().map(Phase::id).collect::<Vec<_>>().join(" + ");
        f.write_str(&joined)
    }
}

impl FromIterator<Phase> for PrecursorSet {
    fn from_iter<I: IntoIterator<Item = Phase>>(iter: I) -> Self {
        Self::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_reduces_formula() {
        let phase = Phase::new("YBa2Cu3O7").unwrap();
        assert_eq!(phase.formula(), "Ba2YCu3O7");
        assert_eq!(phase, Phase::new("Ba2 Y Cu3 O7").unwrap());
        assert!(!phase.is_gas());
    }

    #[test]
    fn test_phase_id_with_polymorph() {
        let phase = Phase::from_id("BaCO3_62").unwrap();
        assert_eq!(phase.formula(), "BaCO3");
        assert_eq!(phase.polymorph(), Some("62"));
        assert_eq!(phase.id(), "BaCO3_62");
        assert_ne!(phase, Phase::new("BaCO3").unwrap());
        assert_eq!(phase.without_polymorph(), Phase::new("BaCO3").unwrap());
    }

    #[test]
    fn test_gases() {
        assert!(Phase::oxygen().is_gas());
        assert_eq!(Phase::oxygen(), Phase::new("O2").unwrap());
        assert_eq!(Phase::carbon_dioxide(), Phase::new("CO2").unwrap());
        assert!(Phase::new("NH3").unwrap().is_gas());
    }

    #[test]
    fn test_precursor_set_key_is_sorted() {
        let set = PrecursorSet::from_formulas(&["Y2O3", "CuO", "BaO2"]).unwrap();
        assert_eq!(set.key(), "BaO2, CuO, Y2O3");
        assert_eq!(set.to_string(), "BaO2 + CuO + Y2O3");
        assert_eq!(set.len(), 3);
    }
}

//! Phase Energy Oracle
//!
//! The planner never computes energies itself: it asks an [`EnergyOracle`]
//! for the formation free energy of a phase at a sampled temperature.
//! [`TabulatedOracle`] is the in-process implementation backed by a
//! temperature → formula → energy table (the JSON produced by an external
//! materials-database query).

use std::collections::BTreeMap;
use std::path::Path;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chemistry::{Composition, Phase};
use crate::config::temperature_key;
use crate::{Error, Result};

/// Source of formation free energies (eV/atom).
///
/// Returning `None` is an oracle miss: callers exclude whatever depended on
/// the value instead of treating it as zero.
pub trait EnergyOracle {
    /// Formation free energy per atom of `phase` at `temperature` (°C).
    fn formation_energy(&self, phase: &Phase, temperature: f64) -> Option<f64>;
}

/// Synthesis atmosphere, fixing gas partial pressures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Atmosphere {
    /// Ambient air: p(O2) = 21200 Pa, p(CO2) = 4050 Pa
    #[default]
    Air,
    /// Inert flow: every reactive gas at 0.1 Pa
    Inert,
}

impl Atmosphere {
    /// Partial pressure (Pa) of a gas in this atmosphere.
    #[must_use]
    pub fn partial_pressure(self, gas: &str) -> f64 {
        match (self, gas) {
            (Self::Air, "O2") => 21200.0,
            (Self::Air, "CO2") => 4050.0,
            (Self::Air, "H3N") => 16.0,
            (Self::Air, "H2O") => 2300.0,
            _ => 0.1,
        }
    }
}

const STANDARD_TEMPERATURE: f64 = 298.15;
const STANDARD_PRESSURE: f64 = 1e5;
const GAS_CONSTANT: f64 = 8.314_459_8;
const EV_TO_KJ_PER_MOL: f64 = 96.4853;

/// Ideal-gas chemical potential shift Δμ(T, p) relative to the standard state,
/// in eV per atom of the molecule. `None` for species without Cp/S data.
///
/// Heat capacity is taken constant at its standard value (JANAF tables).
#[must_use]
pub fn gas_chempot_correction(gas: &str, temperature_k: f64, pressure: f64) -> Option<f64> {
    // (Cp, S) in J/(K mol), and atoms the correction is spread over
    let (cp, s, atoms) = match gas {
        "O2" => (29.376, 205.147, 1.0),
        "CO2" => (37.129, 213.79, 3.0),
        "H3N" => (35.640, 192.80, 4.0),
        "H2O" => (33.22, 194.10, 3.0),
        _ => return None,
    };
    let t = temperature_k;
    let t0 = STANDARD_TEMPERATURE;
    let pv = GAS_CONSTANT * t * (pressure / STANDARD_PRESSURE).ln();
    let ts = -cp * (t * t.ln() - t0 * t0.ln()) + cp * (t - t0) * (1.0 + t0.ln()) - s * (t - t0);
    Some((pv + ts) / (1000.0 * EV_TO_KJ_PER_MOL) / atoms)
}

/// One tabulated entry: either a bare number or `{"Ef": number}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum EnergyEntry {
    Value(f64),
    Record {
        #[serde(rename = "Ef")]
        ef: f64,
    },
}

/// Temperature-indexed formation energy table.
///
/// Formulas are canonicalised to their reduced form on insert, so `YBa2Cu3O7`
/// and `Ba2YCu3O7` address the same row.
#[derive(Debug, Clone, Default)]
pub struct TabulatedOracle {
    tables: BTreeMap<i64, FxHashMap<String, f64>>,
    atmosphere: Option<Atmosphere>,
}

impl TabulatedOracle {
    /// Empty table without gas correction.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the ideal-gas correction for `atmosphere` to O2 and CO2.
    #[must_use]
    pub const fn with_atmosphere(mut self, atmosphere: Atmosphere) -> Self {
        self.atmosphere = Some(atmosphere);
        self
    }

    /// Insert an energy (eV/atom) for `formula` at `temperature` (°C).
    ///
    /// # Errors
    ///
    /// Returns an error if the formula cannot be parsed.
    pub fn insert(&mut self, formula: &str, temperature: f64, energy: f64) -> Result<()> {
        let canonical = Composition::parse(formula)?.reduced_formula();
        self.tables
            .entry(temperature_key(temperature))
            .or_default()
            .insert(canonical, energy);
        Ok(())
    }

    /// Builder-style [`TabulatedOracle::insert`].
    ///
    /// # Errors
    ///
    /// Returns an error if the formula cannot be parsed.
    pub fn with_energy(mut self, formula: &str, temperature: f64, energy: f64) -> Result<Self> {
        self.insert(formula, temperature, energy)?;
        Ok(self)
    }

    /// Parse `{"<T>": {"<formula>": energy | {"Ef": energy}}}`.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed JSON, non-numeric temperature keys or
    /// unparsable formulas.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let raw: BTreeMap<String, BTreeMap<String, EnergyEntry>> = serde_json::from_str(text)?;
        let mut oracle = Self::new();
        for (temperature, entries) in raw {
            let t: f64 = temperature.trim().trim_end_matches('C').trim().parse().map_err(|_| {
                Error::InvalidInput(format!("energy table temperature '{temperature}' is not a number"))
            })?;
            for (formula, entry) in entries {
                let energy = match entry {
                    EnergyEntry::Value(v) | EnergyEntry::Record { ef: v } => v,
                };
                oracle.insert(&formula, t, energy)?;
            }
        }
        debug!(temperatures = oracle.tables.len(), "energy table loaded");
        Ok(oracle)
    }

    /// Read an energy table from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Tabulated temperatures (°C), ascending.
    pub fn temperatures(&self) -> impl Iterator<Item = i64> + '_ {
        self.tables.keys().copied()
    }

    /// Number of entries at `temperature`.
    #[must_use]
    pub fn len_at(&self, temperature: f64) -> usize {
        self.tables.get(&temperature_key(temperature)).map_or(0, FxHashMap::len)
    }
}

impl EnergyOracle for TabulatedOracle {
    fn formation_energy(&self, phase: &Phase, temperature: f64) -> Option<f64> {
        let formula = phase.formula();
        let tabulated = self
            .tables
            .get(&temperature_key(temperature))
            .and_then(|table| table.get(formula))
            .copied();
        // Elemental oxygen is the reference state.
        let base = match tabulated {
            Some(value) => value,
            None if formula == "O2" => 0.0,
            None => return None,
        };
        match self.atmosphere {
            Some(atmosphere) if phase.is_gas() => {
                let correction = gas_chempot_correction(
                    formula,
                    temperature + 273.15,
                    atmosphere.partial_pressure(formula),
                )
                .unwrap_or(0.0);
                Some(base + correction)
            }
            _ => Some(base),
        }
    }
}

//! Campaign configuration and policy flags
//!
//! [`SynthesisConfig`] mirrors the settings file of a campaign directory:
//!
//! ```json
//! {
//!   "Precursors": ["Y2O3", "BaO", "BaO2", "CuCO3"],
//!   "Target": "YBa2Cu3O6.5",
//!   "Allowed Byproducts": ["O2", "CO2"],
//!   "Temperatures": [600, 700, 800, 900],
//!   "Open System": "True",
//!   "Allow Oxidation": "False"
//! }
//! ```
//!
//! [`PolicyFlags`] is the immutable set of heuristic switches threaded through
//! the attributor and the suggestion engine.

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};

use crate::chemistry::{Composition, Element, Phase};
use crate::oracle::Atmosphere;
use crate::{Error, Result};

/// Integer key for a temperature (°C), used to match sampled temperatures
/// across tables and logs.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn temperature_key(temperature: f64) -> i64 {
    temperature.round() as i64
}

/// Settings of one synthesis campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisConfig {
    #[serde(rename = "Precursors")]
    precursors: Vec<String>,
    #[serde(rename = "Target")]
    target: String,
    #[serde(rename = "Allowed Byproducts", default)]
    allowed_byproducts: Vec<String>,
    #[serde(rename = "Temperatures")]
    temperatures: Vec<f64>,
    #[serde(rename = "Open System", default = "default_open_system", deserialize_with = "flexible_bool")]
    open_system: bool,
    #[serde(rename = "Allow Oxidation", default, deserialize_with = "flexible_bool")]
    allow_oxidation: bool,
    #[serde(rename = "Max Precursors", default, skip_serializing_if = "Option::is_none")]
    max_precursors: Option<usize>,
    #[serde(rename = "Atmosphere", default)]
    atmosphere: Atmosphere,
}

const fn default_open_system() -> bool {
    true
}

/// Accept JSON booleans as well as the strings `"True"`/`"False"`.
fn flexible_bool<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => Ok(value),
        Flag::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" => Ok(false),
            other => Err(serde::de::Error::custom(format!("expected a boolean, got '{other}'"))),
        },
    }
}

impl SynthesisConfig {
    /// Create a builder with the required fields.
    #[must_use]
    pub fn builder<S: Into<String>>(
        precursors: impl IntoIterator<Item = S>,
        target: impl Into<String>,
        temperatures: impl IntoIterator<Item = f64>,
    ) -> SynthesisConfigBuilder {
        SynthesisConfigBuilder::new(precursors, target, temperatures)
    }

    /// Parse a settings document.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the configuration fails
    /// [`SynthesisConfig::validate`].
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for an empty precursor pool or
    /// temperature list, negative or non-finite temperatures, a maximum subset
    /// size below 2, and [`Error::FormulaParse`] for unparsable formulas.
    pub fn validate(&self) -> Result<()> {
        if self.precursors.is_empty() {
            return Err(Error::InvalidConfig("no precursors given".to_string()));
        }
        if self.temperatures.is_empty() {
            return Err(Error::InvalidConfig("no temperatures given".to_string()));
        }
        if let Some(t) = self.temperatures.iter().find(|t| !t.is_finite() || **t < 0.0) {
            return Err(Error::InvalidConfig(format!("temperature {t} is not a valid °C value")));
        }
        if let Some(max) = self.max_precursors {
            if max < 2 {
                return Err(Error::InvalidConfig(format!(
                    "Max Precursors must be at least 2, got {max}"
                )));
            }
        }
        self.precursor_phases()?;
        self.target_phase()?;
        self.byproduct_phases()?;
        Ok(())
    }

    /// Precursor pool, deduplicated and sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if a formula cannot be parsed.
    pub fn precursor_phases(&self) -> Result<Vec<Phase>> {
        let phases: BTreeSet<Phase> = self
            .precursors
            .iter()
            .map(|f| Phase::new(f))
            .collect::<Result<_>>()?;
        Ok(phases.into_iter().collect())
    }

    /// Target phase.
    ///
    /// # Errors
    ///
    /// Returns an error if the formula cannot be parsed.
    pub fn target_phase(&self) -> Result<Phase> {
        Phase::new(&self.target)
    }

    /// Allowed byproducts, deduplicated and sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if a formula cannot be parsed.
    pub fn byproduct_phases(&self) -> Result<Vec<Phase>> {
        let phases: BTreeSet<Phase> = self
            .allowed_byproducts
            .iter()
            .map(|f| Phase::new(f))
            .collect::<Result<_>>()?;
        Ok(phases.into_iter().collect())
    }

    /// Sampled temperatures, ascending and deduplicated.
    #[must_use]
    pub fn sorted_temperatures(&self) -> Vec<f64> {
        let mut temps = self.temperatures.clone();
        temps.sort_by(f64::total_cmp);
        temps.dedup_by(|a, b| temperature_key(*a) == temperature_key(*b));
        temps
    }

    /// Lowest sampled temperature.
    #[must_use]
    pub fn min_temperature(&self) -> f64 {
        self.sorted_temperatures().first().copied().unwrap_or(0.0)
    }

    /// Highest sampled temperature; candidate energies are evaluated here.
    #[must_use]
    pub fn max_temperature(&self) -> f64 {
        self.sorted_temperatures().last().copied().unwrap_or(0.0)
    }

    /// Largest precursor subset to enumerate.
    ///
    /// Defaults to the number of distinct elements in the precursor pool.
    ///
    /// # Errors
    ///
    /// Returns an error if a precursor formula cannot be parsed.
    pub fn max_precursors(&self) -> Result<usize> {
        if let Some(max) = self.max_precursors {
            return Ok(max);
        }
        let mut elements: BTreeSet<Element> = BTreeSet::new();
        for formula in &self.precursors {
            elements.extend(Composition::parse(formula)?.elements());
        }
        Ok(elements.len().max(2))
    }

    /// Raw precursor formulas as configured.
    #[must_use]
    pub fn precursors(&self) -> &[String] {
        &self.precursors
    }

    /// Raw target formula as configured.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Raw byproduct formulas as configured.
    #[must_use]
    pub fn allowed_byproducts(&self) -> &[String] {
        &self.allowed_byproducts
    }

    /// Whether gases may leave (or enter) the reacting mixture.
    #[must_use]
    pub const fn open_system(&self) -> bool {
        self.open_system
    }

    /// Whether O2 may be consumed as an extra reactant.
    #[must_use]
    pub const fn allow_oxidation(&self) -> bool {
        self.allow_oxidation
    }

    /// Synthesis atmosphere.
    #[must_use]
    pub const fn atmosphere(&self) -> Atmosphere {
        self.atmosphere
    }
}

/// Builder for `SynthesisConfig`.
#[derive(Debug)]
pub struct SynthesisConfigBuilder {
    config: SynthesisConfig,
}

impl SynthesisConfigBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new<S: Into<String>>(
        precursors: impl IntoIterator<Item = S>,
        target: impl Into<String>,
        temperatures: impl IntoIterator<Item = f64>,
    ) -> Self {
        Self {
            config: SynthesisConfig {
                precursors: precursors.into_iter().map(Into::into).collect(),
                target: target.into(),
                allowed_byproducts: Vec::new(),
                temperatures: temperatures.into_iter().collect(),
                open_system: true,
                allow_oxidation: false,
                max_precursors: None,
                atmosphere: Atmosphere::default(),
            },
        }
    }

    /// Set the allowed byproducts.
    #[must_use]
    pub fn allowed_byproducts<S: Into<String>>(mut self, byproducts: impl IntoIterator<Item = S>) -> Self {
        self.config.allowed_byproducts = byproducts.into_iter().map(Into::into).collect();
        self
    }

    /// Set the open-system flag.
    #[must_use]
    pub const fn open_system(mut self, open: bool) -> Self {
        self.config.open_system = open;
        self
    }

    /// Allow O2 as an extra reactant.
    #[must_use]
    pub const fn allow_oxidation(mut self, allow: bool) -> Self {
        self.config.allow_oxidation = allow;
        self
    }

    /// Bound the precursor subset size.
    #[must_use]
    pub const fn max_precursors(mut self, max: usize) -> Self {
        self.config.max_precursors = Some(max);
        self
    }

    /// Set the atmosphere.
    #[must_use]
    pub const fn atmosphere(mut self, atmosphere: Atmosphere) -> Self {
        self.config.atmosphere = atmosphere;
        self
    }

    /// Validate and build the `SynthesisConfig`.
    ///
    /// # Errors
    ///
    /// Returns an error if [`SynthesisConfig::validate`] fails.
    pub fn build(self) -> Result<SynthesisConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Heuristic policy switches. Immutable once built; `Copy` so it can be
/// threaded by value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct PolicyFlags {
    /// Diagnostic detail only; never changes results.
    pub verbose: bool,
    /// Rank by new pairwise interfaces instead of driving force.
    pub explore: bool,
    /// Only thermodynamically favorable pairwise reactions count.
    pub enforce_thermo: bool,
    /// Reactions known below the campaign minimum temperature always go first.
    pub greedy: bool,
    /// Candidates forming the target only partially stay eligible for the top rank.
    pub partial_yield: bool,
    /// Keep suggesting after the target has been made phase-pure.
    pub all: bool,
}

impl PolicyFlags {
    /// Exploit ranking, pure-yield, stop when solved.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            verbose: false,
            explore: false,
            enforce_thermo: false,
            greedy: false,
            partial_yield: false,
            all: false,
        }
    }

    /// Set `verbose`.
    #[must_use]
    pub const fn with_verbose(mut self, on: bool) -> Self {
        self.verbose = on;
        self
    }

    /// Set `explore`.
    #[must_use]
    pub const fn with_explore(mut self, on: bool) -> Self {
        self.explore = on;
        self
    }

    /// Set `enforce_thermo`.
    #[must_use]
    pub const fn with_enforce_thermo(mut self, on: bool) -> Self {
        self.enforce_thermo = on;
        self
    }

    /// Set `greedy`.
    #[must_use]
    pub const fn with_greedy(mut self, on: bool) -> Self {
        self.greedy = on;
        self
    }

    /// Set `partial_yield`.
    #[must_use]
    pub const fn with_partial_yield(mut self, on: bool) -> Self {
        self.partial_yield = on;
        self
    }

    /// Set `all`.
    #[must_use]
    pub const fn with_all(mut self, on: bool) -> Self {
        self.all = on;
        self
    }

    /// Parse `--flag` style arguments; unknown arguments are returned.
    pub fn from_args<'a>(args: impl IntoIterator<Item = &'a str>) -> (Self, Vec<&'a str>) {
        let mut flags = Self::new();
        let mut rest = Vec::new();
        for arg in args {
            match arg {
                "--verbose" | "-v" => flags.verbose = true,
                "--explore" => flags.explore = true,
                "--enforce_thermo" => flags.enforce_thermo = true,
                "--greedy" => flags.greedy = true,
                "--partial_yield" => flags.partial_yield = true,
                "--all" => flags.all = true,
                other => rest.push(other),
            }
        }
        (flags, rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTINGS: &str = r#"{
        "Precursors": ["Y2O3", "BaO", "BaO2", "CuCO3"],
        "Target": "YBa2Cu3O6.5",
        "Allowed Byproducts": ["O2", "CO2"],
        "Temperatures": [900, 600, 800, 700],
        "Open System": "True",
        "Allow Oxidation": "False"
    }"#;

    #[test]
    fn test_parse_settings_with_string_booleans() {
        let config = SynthesisConfig::from_json_str(SETTINGS).unwrap();
        assert!(config.open_system());
        assert!(!config.allow_oxidation());
        assert_eq!(config.atmosphere(), Atmosphere::Air);
        assert_eq!(config.sorted_temperatures(), vec![600.0, 700.0, 800.0, 900.0]);
        assert_eq!(config.max_temperature(), 900.0);
        assert_eq!(config.min_temperature(), 600.0);
        assert_eq!(config.target_phase().unwrap().formula(), "Ba2YCu3O6.5");
    }

    #[test]
    fn test_default_max_precursors_counts_elements() {
        let config = SynthesisConfig::from_json_str(SETTINGS).unwrap();
        // Y, O, Ba, Cu, C
        assert_eq!(config.max_precursors().unwrap(), 5);
    }

    #[test]
    fn test_builder_validates() {
        let err = SynthesisConfig::builder(Vec::<String>::new(), "CuO", [600.0]).build();
        assert!(matches!(err, Err(Error::InvalidConfig(_))));

        let err = SynthesisConfig::builder(["CuO", "BaO"], "BaCuO2", [600.0])
            .max_precursors(1)
            .build();
        assert!(matches!(err, Err(Error::InvalidConfig(_))));

        let err = SynthesisConfig::builder(["CuO", "Qq"], "BaCuO2", [600.0]).build();
        assert!(matches!(err, Err(Error::FormulaParse { .. })));
    }

    #[test]
    fn test_rejects_bad_boolean_text() {
        let json = SETTINGS.replace("\"Open System\": \"True\"", "\"Open System\": \"maybe\"");
        assert!(SynthesisConfig::from_json_str(&json).is_err());
    }

    #[test]
    fn test_policy_flags_from_args() {
        let (flags, rest) = PolicyFlags::from_args(["--explore", "--greedy", "--batch=3"]);
        assert!(flags.explore && flags.greedy);
        assert!(!flags.all);
        assert_eq!(rest, vec!["--batch=3"]);
        assert_eq!(PolicyFlags::default(), PolicyFlags::new());
    }
}

//! Experiment log JSON
//!
//! ```json
//! {
//!   "Universal File": {
//!     "BaO2, CuCO3, Y2O3": {
//!       "Precursor stoichiometry": [2.0, 3.0, 0.5],
//!       "Temperatures": {
//!         "700 C": {
//!           "products": ["BaCO3_62", "CuO_15", "Y2O3_206"],
//!           "product weight fractions": [55.0, 35.0, 10.0]
//!         }
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! Every top-level label is read; writing uses [`EXPERIMENT_LABEL`].
//! Entries keep file order.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::chemistry::{Phase, PrecursorSet};
use crate::config::temperature_key;
use crate::experiment::{ExperimentLog, ExperimentRecord};
use crate::{Error, Result};

/// Top-level label written to new logs.
pub const EXPERIMENT_LABEL: &str = "Universal File";

#[derive(Debug, Serialize, Deserialize)]
struct PrecursorEntry {
    #[serde(rename = "Precursor stoichiometry", default)]
    stoichiometry: Vec<f64>,
    #[serde(rename = "Temperatures", default)]
    temperatures: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TemperatureEntry {
    products: Vec<String>,
    #[serde(rename = "product weight fractions")]
    weight_fractions: Vec<f64>,
    #[serde(rename = "Logged", default, skip_serializing_if = "Option::is_none")]
    logged_at: Option<DateTime<Utc>>,
}

/// Parse an experiment log.
///
/// # Errors
///
/// Returns an error for malformed JSON or temperature keys, and
/// [`Error::InvalidInput`] for records that fail validation.
pub fn log_from_json(text: &str) -> Result<ExperimentLog> {
    let root: Map<String, Value> = serde_json::from_str(text)?;
    let mut log = ExperimentLog::new();
    for (_, file) in root {
        let entries: Map<String, Value> = serde_json::from_value(file)?;
        for (key, entry) in entries {
            let entry: PrecursorEntry = serde_json::from_value(entry)?;
            for (label, outcome) in entry.temperatures {
                let outcome: TemperatureEntry = serde_json::from_value(outcome)?;
                log.add(build_record(&key, &entry.stoichiometry, &label, outcome)?)?;
            }
        }
    }
    Ok(log)
}

fn build_record(key: &str, stoichiometry: &[f64], label: &str, outcome: TemperatureEntry) -> Result<ExperimentRecord> {
    let formulas: Vec<&str> = key.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
    let precursors = PrecursorSet::from_formulas(&formulas)?;
    let temperature = parse_temperature(label)?;

    let mut builder = ExperimentRecord::builder(precursors.clone(), temperature);
    if !stoichiometry.is_empty() {
        if stoichiometry.len() != formulas.len() {
            return Err(Error::StorageError(format!(
                "experiment '{key}': {} amounts for {} precursors",
                stoichiometry.len(),
                formulas.len()
            )));
        }
        // Stoichiometry follows the key's order; the set is sorted.
        let keyed: Vec<(Phase, f64)> = formulas
            .iter()
            .map(|f| Phase::from_id(f).map(|p| p.without_polymorph()))
            .zip(stoichiometry.iter().copied())
            .map(|(p, a)| p.map(|p| (p, a)))
            .collect::<Result<_>>()?;
        let amounts = precursors
            .iter()
            .map(|phase| keyed.iter().find(|(p, _)| p == phase).map_or(0.0, |(_, a)| *a))
            .collect();
        builder = builder.amounts(amounts);
    }

    let products = outcome
        .products
        .iter()
        .map(|id| Phase::from_id(id))
        .collect::<Result<Vec<_>>>()?;
    builder = builder.products(products, outcome.weight_fractions);
    if let Some(logged_at) = outcome.logged_at {
        builder = builder.logged_at(logged_at);
    }
    builder.build()
}

/// `"700 C"` or `"700"` into 700.0.
fn parse_temperature(label: &str) -> Result<f64> {
    label
        .trim()
        .trim_end_matches('C')
        .trim()
        .parse()
        .map_err(|_| Error::StorageError(format!("bad temperature key '{label}'")))
}

/// Serialize a log, grouping records by precursor set in log order.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn log_to_json(log: &ExperimentLog) -> Result<String> {
    let mut entries: Map<String, Value> = Map::new();
    for record in log {
        let slot = entries.entry(record.key()).or_insert_with(|| {
            serde_json::json!({
                "Precursor stoichiometry": record.amounts(),
                "Temperatures": {},
            })
        });
        let outcome = TemperatureEntry {
            products: record.products().iter().map(Phase::id).collect(),
            weight_fractions: record.weight_fractions().to_vec(),
            logged_at: Some(record.logged_at()),
        };
        let label = format!("{} C", temperature_key(record.temperature()));
        if let Some(temperatures) = slot.get_mut("Temperatures").and_then(Value::as_object_mut) {
            temperatures.insert(label, serde_json::to_value(outcome)?);
        }
    }
    let mut root = Map::new();
    root.insert(EXPERIMENT_LABEL.to_string(), Value::Object(entries));
    Ok(serde_json::to_string_pretty(&Value::Object(root))?)
}

/// Read an experiment log file.
///
/// # Errors
///
/// See [`log_from_json`].
pub fn load_experiments(path: impl AsRef<Path>) -> Result<ExperimentLog> {
    log_from_json(&std::fs::read_to_string(path)?)
}

/// Write an experiment log file.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn save_experiments(log: &ExperimentLog, path: impl AsRef<Path>) -> Result<()> {
    std::fs::write(path, log_to_json(log)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = r#"{
        "Universal File": {
            "Y2O3, BaO2, CuCO3": {
                "Precursor stoichiometry": [0.5, 2.0, 3.0],
                "Temperatures": {
                    "700 C": {
                        "products": ["BaCO3_62", "CuO_15", "Y2O3_206"],
                        "product weight fractions": [55.0, 35.0, 10.0],
                        "XRD": {"x": [], "y": []}
                    },
                    "800 C": {
                        "products": ["BaCO3_62", "CuO_15", "Y2O3_206"],
                        "product weight fractions": [0.5, 0.25, 0.25]
                    }
                }
            }
        }
    }"#;

    #[test]
    fn test_log_from_json() {
        let log = log_from_json(LOG).unwrap();
        assert_eq!(log.len(), 2);
        let set = PrecursorSet::from_formulas(&["BaO2", "CuCO3", "Y2O3"]).unwrap();
        let record = log.get(&set, 700.0).unwrap();
        // Reordered to the set's order: BaO2, CuCO3, Y2O3
        assert_eq!(record.amounts(), &[2.0, 3.0, 0.5]);
        assert_eq!(record.products()[0].polymorph(), Some("62"));
        assert_eq!(log.get(&set, 800.0).unwrap().weight_fractions(), &[50.0, 25.0, 25.0]);
    }

    #[test]
    fn test_bad_temperature_key() {
        let text = LOG.replace("\"700 C\"", "\"warm\"");
        assert!(matches!(log_from_json(&text), Err(Error::StorageError(_))));
    }

    #[test]
    fn test_written_log_reads_back() {
        let log = log_from_json(LOG).unwrap();
        let text = log_to_json(&log).unwrap();
        assert!(text.contains("\"BaO2, CuCO3, Y2O3\""));
        assert!(text.contains("\"700 C\""));
        let again = log_from_json(&text).unwrap();
        assert_eq!(again, log);
    }
}

//! Experiment Record and Log Tests

use chrono::{TimeZone, Utc};
use synth_planner::chemistry::{Phase, PrecursorSet};
use synth_planner::experiment::{ExperimentLog, ExperimentRecord, PURITY_THRESHOLD};
use synth_planner::Error;

fn set(formulas: &[&str]) -> PrecursorSet {
    PrecursorSet::from_formulas(formulas).unwrap()
}

fn phase(id: &str) -> Phase {
    Phase::from_id(id).unwrap()
}

// =============================================================================
// ExperimentRecord Tests
// =============================================================================

#[test]
fn test_experiment_record_creation() {
    let record = ExperimentRecord::builder(set(&["Y2O3", "BaO2", "CuCO3"]), 700.0)
        .amounts(vec![2.0, 3.0, 0.5])
        .product(phase("BaCO3_62"), 55.0)
        .product(phase("CuO_15"), 35.0)
        .product(phase("Y2O3_206"), 10.0)
        .build()
        .unwrap();

    assert_eq!(record.key(), "BaO2, CuCO3, Y2O3");
    assert_eq!(record.temperature(), 700.0);
    assert_eq!(record.products().len(), 3);
    assert!(record.logged_at().timestamp() > 0);
    assert!(record.tests(&set(&["CuCO3", "Y2O3", "BaO2"]), 700.0));
    assert!(!record.tests(&set(&["CuCO3", "Y2O3", "BaO2"]), 800.0));
}

#[test]
fn test_experiment_record_phase_fractions_drop_structure_labels() {
    let record = ExperimentRecord::builder(set(&["BaO", "CuO"]), 800.0)
        .product(phase("BaCuO2_63"), 60.0)
        .product(phase("BaCuO2_225"), 30.0)
        .product(phase("CuO"), 10.0)
        .build()
        .unwrap();

    let fractions = record.phase_fractions();
    assert_eq!(fractions.len(), 2);
    assert!((record.fraction_of(&phase("BaCuO2")) - 0.9).abs() < 1e-12);
    assert!(!record.is_phase_pure(&phase("BaCuO2")));
}

#[test]
fn test_experiment_record_purity() {
    let record = ExperimentRecord::builder(set(&["BaO", "CuO"]), 800.0)
        .product(phase("BaCuO2"), PURITY_THRESHOLD + 0.3)
        .product(phase("CuO"), 0.2)
        .build()
        .unwrap();
    assert!(record.is_phase_pure(&phase("BaCuO2")));
}

#[test]
fn test_experiment_record_custom_timestamp() {
    let logged_at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
    let record = ExperimentRecord::builder(set(&["BaO", "CuO"]), 600.0)
        .product(phase("BaO"), 50.0)
        .product(phase("CuO"), 50.0)
        .logged_at(logged_at)
        .build()
        .unwrap();
    assert_eq!(record.logged_at(), logged_at);
}

#[test]
fn test_experiment_record_rejects_mismatched_amounts() {
    let result = ExperimentRecord::builder(set(&["BaO", "CuO"]), 600.0)
        .amounts(vec![1.0])
        .product(phase("BaCuO2"), 100.0)
        .build();
    assert!(matches!(result, Err(Error::InvalidInput(_))));
}

// =============================================================================
// ExperimentLog Tests
// =============================================================================

#[test]
fn test_log_keeps_insertion_order() {
    let mut log = ExperimentLog::new();
    for temperature in [800.0, 600.0, 700.0] {
        log.add(
            ExperimentRecord::builder(set(&["BaO", "CuO"]), temperature)
                .product(phase("BaO"), 50.0)
                .product(phase("CuO"), 50.0)
                .build()
                .unwrap(),
        )
        .unwrap();
    }
    let temperatures: Vec<f64> = log.iter().map(ExperimentRecord::temperature).collect();
    assert_eq!(temperatures, vec![800.0, 600.0, 700.0]);
    assert_eq!(log.len(), 3);
}

#[test]
fn test_log_lookup_and_duplicates() {
    let mut log = ExperimentLog::new();
    let record = ExperimentRecord::builder(set(&["BaO", "CuO"]), 700.0)
        .product(phase("BaCuO2"), 100.0)
        .build()
        .unwrap();
    log.add(record.clone()).unwrap();

    assert!(log.contains(&set(&["CuO", "BaO"]), 700.0));
    assert_eq!(log.get(&set(&["BaO", "CuO"]), 700.0), Some(&record));
    assert_eq!(log.solved_by(&phase("BaCuO2")), Some(&record));
    assert!(log.add(record).is_err());
}

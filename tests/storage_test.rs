//! Campaign artifacts written to and read back from disk

use synth_planner::candidates::generate_candidates;
use synth_planner::chemistry::{Phase, PrecursorSet};
use synth_planner::config::PolicyFlags;
use synth_planner::experiment::{ExperimentLog, ExperimentRecord};
use synth_planner::oracle::{Atmosphere, EnergyOracle};
use synth_planner::pairwise::{Outcome, PairStatus, PairwiseStore, ReactantPair};
use synth_planner::reaction::BALANCE_TOLERANCE;
use synth_planner::storage::{
    load_candidates, load_config, load_energies, load_experiments, load_pairwise, save_candidates,
    save_experiments, save_pairwise, seed_pairwise, CampaignDir,
};
use synth_planner::suggest::SuggestionEngine;
use synth_planner::{Error, Warning};
use tempfile::TempDir;

const SETTINGS: &str = r#"{
    "Precursors": ["Y2O3", "BaO", "BaO2", "CuCO3"],
    "Target": "YBa2Cu3O6.5",
    "Allowed Byproducts": ["O2", "CO2"],
    "Temperatures": [700, 800],
    "Open System": "True",
    "Allow Oxidation": "False"
}"#;

const ENERGIES: &str = r#"{
    "800": {
        "Y2O3": -3.9,
        "BaO": -2.9,
        "BaO2": {"Ef": -2.2},
        "CuCO3": -1.2,
        "YBa2Cu3O6.5": -2.5,
        "CO2": -1.37
    }
}"#;

fn campaign() -> (TempDir, CampaignDir) {
    let tmp = tempfile::tempdir().unwrap();
    let dir = CampaignDir::new(tmp.path());
    std::fs::write(dir.settings(), SETTINGS).unwrap();
    std::fs::write(dir.energies(), ENERGIES).unwrap();
    (tmp, dir)
}

fn phase(formula: &str) -> Phase {
    Phase::new(formula).unwrap()
}

#[test]
fn test_settings_and_energies_load() {
    let (_tmp, dir) = campaign();
    let config = load_config(dir.settings()).unwrap();
    assert!(config.open_system());
    assert!(!config.allow_oxidation());
    assert_eq!(config.atmosphere(), Atmosphere::Air);
    assert_eq!(config.max_temperature(), 800.0);

    let oracle = load_energies(dir.energies(), &config).unwrap();
    assert_eq!(oracle.formation_energy(&phase("BaO2"), 800.0), Some(-2.2));
    // Air shifts the CO2 chemical potential at 800 C.
    let co2 = oracle.formation_energy(&Phase::carbon_dioxide(), 800.0).unwrap();
    assert!((co2 + 1.37).abs() > 1e-3);
}

#[test]
fn test_candidate_table_round_trip() {
    let (_tmp, dir) = campaign();
    let config = load_config(dir.settings()).unwrap();
    let oracle = load_energies(dir.energies(), &config).unwrap();
    let table = generate_candidates(&config, &oracle).unwrap();
    assert!(!table.is_empty());

    save_candidates(&table, dir.candidates()).unwrap();
    let text = std::fs::read_to_string(dir.candidates()).unwrap();
    assert!(text.starts_with("Precursors,Amounts,Products,Reaction energy (meV/atom)"));

    let loaded = load_candidates(dir.candidates(), config.max_temperature()).unwrap();
    assert_eq!(loaded.len(), table.len());
    for (original, restored) in table.iter().zip(loaded.iter()) {
        assert_eq!(original.precursors(), restored.precursors());
        assert!((original.energy() - restored.energy()).abs() < 1e-9);
        assert!(restored.reaction().is_mass_balanced(BALANCE_TOLERANCE));
    }
}

#[test]
fn test_pairwise_database_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("PairwiseRxns.csv");

    let mut store = PairwiseStore::new();
    let formed = [phase("BaCO3"), phase("CuO")].into_iter().collect();
    store
        .record(&ReactantPair::new(&phase("Y2O3"), &phase("BaCO3")), 800.0, &Outcome::NoReaction)
        .unwrap();
    store
        .record(&ReactantPair::new(&phase("BaO2"), &phase("CuCO3")), 700.0, &Outcome::Reacts(formed))
        .unwrap();
    store
        .record(
            &ReactantPair::single(&phase("CuCO3")),
            600.0,
            &Outcome::Reacts([phase("CuO")].into_iter().collect()),
        )
        .unwrap();

    save_pairwise(&store, &path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("Does not react at or below 800 C"));
    assert!(text.contains("Reacts below 700 C"));

    let (loaded, warnings) = load_pairwise(&path).unwrap();
    assert!(warnings.is_empty());
    assert_eq!(loaded, store);
}

#[test]
fn test_seed_from_prior_campaign_database() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("PriorPairwiseRxns.csv");

    let mut prior = PairwiseStore::new();
    prior
        .record(&ReactantPair::new(&phase("Y2O3"), &phase("BaCO3")), 800.0, &Outcome::NoReaction)
        .unwrap();
    prior
        .record(
            &ReactantPair::single(&phase("CuCO3")),
            600.0,
            &Outcome::Reacts([phase("CuO")].into_iter().collect()),
        )
        .unwrap();
    let formed = [phase("BaCO3"), phase("CuO")].into_iter().collect();
    prior
        .record(&ReactantPair::new(&phase("BaO2"), &phase("CuCO3")), 700.0, &Outcome::Reacts(formed))
        .unwrap();
    save_pairwise(&prior, &path).unwrap();

    // This campaign already saw the pair stay inert above the prior onset
    let contested = ReactantPair::new(&phase("BaO2"), &phase("CuCO3"));
    let mut store = PairwiseStore::new();
    store.record(&contested, 800.0, &Outcome::NoReaction).unwrap();

    let warnings = seed_pairwise(&mut store, &path).unwrap();
    assert_eq!(warnings.len(), 1);
    assert!(matches!(&warnings[0], Warning::StoreConflict { pair, .. } if *pair == contested.to_string()));
    assert_eq!(store.len(), 3);
    assert_eq!(store.lookup(&contested, 800.0), PairStatus::Inert);
    assert_eq!(
        store.lookup(&ReactantPair::new(&phase("Y2O3"), &phase("BaCO3")), 800.0),
        PairStatus::Inert
    );
    assert!(matches!(
        store.lookup(&ReactantPair::single(&phase("CuCO3")), 700.0),
        PairStatus::Reacts(_)
    ));

    let seeded = store.clone();
    let warnings = seed_pairwise(&mut store, &path).unwrap();
    assert_eq!(warnings.len(), 1);
    assert_eq!(store, seeded);
}

#[test]
fn test_experiment_log_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("Exp.json");

    let mut log = ExperimentLog::new();
    log.add(
        ExperimentRecord::builder(PrecursorSet::from_formulas(&["Y2O3", "BaO2", "CuCO3"]).unwrap(), 700.0)
            .amounts(vec![2.0, 3.0, 0.5])
            .product(Phase::from_id("BaCO3_62").unwrap(), 55.0)
            .product(phase("CuO"), 35.0)
            .product(phase("Y2O3"), 10.0)
            .build()
            .unwrap(),
    )
    .unwrap();

    save_experiments(&log, &path).unwrap();
    let loaded = load_experiments(&path).unwrap();
    assert_eq!(loaded, log);
}

#[test]
fn test_missing_artifact_is_io_error() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = CampaignDir::new(tmp.path());
    assert!(matches!(load_experiments(dir.experiments()), Err(Error::Io(_))));
    assert!(load_candidates(dir.candidates(), 800.0).is_err());
}

#[test]
fn test_invalid_settings_are_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("Settings.json");
    std::fs::write(&path, r#"{"Precursors": [], "Target": "BaCuO2", "Temperatures": [800]}"#).unwrap();
    assert!(matches!(load_config(&path), Err(Error::InvalidConfig(_))));
}

#[test]
fn test_campaign_round_updates_pairwise_database() {
    let (_tmp, dir) = campaign();
    let config = load_config(dir.settings()).unwrap();
    let oracle = load_energies(dir.energies(), &config).unwrap();
    save_candidates(&generate_candidates(&config, &oracle).unwrap(), dir.candidates()).unwrap();

    let mut log = ExperimentLog::new();
    log.add(
        ExperimentRecord::builder(PrecursorSet::from_formulas(&["Y2O3", "BaO"]).unwrap(), 700.0)
            .product(phase("Y2O3"), 60.0)
            .product(phase("BaO"), 40.0)
            .build()
            .unwrap(),
    )
    .unwrap();
    save_experiments(&log, dir.experiments()).unwrap();

    // What one `suggest` invocation does with the directory.
    let table = load_candidates(dir.candidates(), config.max_temperature()).unwrap();
    let log = load_experiments(dir.experiments()).unwrap();
    let mut store = PairwiseStore::new();
    let engine = SuggestionEngine::new(&config, &oracle, PolicyFlags::new()).unwrap();
    engine.suggest(&table, &mut store, &log, 2).unwrap();
    save_pairwise(&store, dir.pairwise()).unwrap();

    let (reloaded, _) = load_pairwise(dir.pairwise()).unwrap();
    let inert = ReactantPair::new(&phase("Y2O3"), &phase("BaO"));
    assert!(reloaded.knows(&inert));
    assert_eq!(reloaded, store);
}

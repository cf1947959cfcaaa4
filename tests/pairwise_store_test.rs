//! Pairwise Reaction Store merge behavior

use synth_planner::chemistry::Phase;
use synth_planner::pairwise::{Outcome, PairStatus, PairwiseStore, ProductSet, ReactantPair};
use synth_planner::Warning;

fn phase(formula: &str) -> Phase {
    Phase::new(formula).unwrap()
}

fn pair(a: &str, b: &str) -> ReactantPair {
    ReactantPair::new(&phase(a), &phase(b))
}

fn products(formulas: &[&str]) -> ProductSet {
    formulas.iter().map(|f| phase(f)).collect()
}

fn lab_store() -> PairwiseStore {
    let mut store = PairwiseStore::new();
    store
        .record(&pair("Y2O3", "BaCO3"), 800.0, &Outcome::NoReaction)
        .unwrap();
    store
        .record(&pair("BaO2", "CuCO3"), 700.0, &Outcome::Reacts(products(&["BaCO3", "CuO"])))
        .unwrap();
    store
}

#[test]
fn test_import_into_empty_store_copies_everything() {
    let source = lab_store();
    let mut store = PairwiseStore::new();
    let warnings = store.import(&source);
    assert!(warnings.is_empty());
    assert_eq!(store, source);
    assert_eq!(store.len(), 2);
}

#[test]
fn test_import_twice_is_idempotent() {
    let source = lab_store();
    let mut once = PairwiseStore::new();
    once.import(&source);
    let mut twice = once.clone();
    let warnings = twice.import(&source);
    assert!(warnings.is_empty());
    assert_eq!(once, twice);
}

#[test]
fn test_import_refines_existing_bounds() {
    let mut store = PairwiseStore::new();
    let p = pair("BaO2", "CuCO3");
    let formed = products(&["BaCO3", "CuO"]);
    store.record(&p, 900.0, &Outcome::Reacts(formed.clone())).unwrap();

    store.import(&lab_store());
    assert_eq!(store.observations(&p).len(), 1);
    assert_eq!(store.observations(&p)[0].upper(), 700.0);
    assert_eq!(store.lookup(&p, 700.0), PairStatus::Reacts(&formed));
}

#[test]
fn test_import_conflict_keeps_existing_record() {
    let mut store = PairwiseStore::new();
    let p = pair("Y2O3", "BaCO3");
    store.record(&p, 700.0, &Outcome::Reacts(products(&["Y2BaO4"]))).unwrap();
    let before = store.clone();

    let warnings = store.import(&lab_store());
    assert_eq!(warnings.len(), 1);
    assert!(matches!(&warnings[0], Warning::StoreConflict { pair, .. } if pair == "BaCO3 + Y2O3"));
    assert_eq!(store.observations(&p), before.observations(&p));
    // The non-conflicting pair still arrives.
    assert!(store.knows(&pair("BaO2", "CuCO3")));
}

#[test]
fn test_inert_pairs_at_temperature() {
    let store = lab_store();
    assert_eq!(store.inert_pairs(800.0), vec![&pair("BaCO3", "Y2O3")]);
    assert!(store.inert_pairs(850.0).is_empty());
}

#[test]
fn test_earliest_reaction_across_product_sets() {
    let mut store = PairwiseStore::new();
    let p = pair("BaO", "CuO");
    store.record(&p, 600.0, &Outcome::Reacts(products(&["Ba2CuO3"]))).unwrap();
    store.record(&p, 800.0, &Outcome::Reacts(products(&["BaCuO2"]))).unwrap();

    let (formed, temperature) = store.earliest_reaction(&p).unwrap();
    assert_eq!(formed, &products(&["Ba2CuO3"]));
    assert_eq!(temperature, 600.0);
    assert_eq!(store.observations(&p)[1].describe(), "Reacts between 600-800 C");
}

#[test]
fn test_single_phase_decomposition() {
    let mut store = PairwiseStore::new();
    let carbonate = ReactantPair::single(&phase("CuCO3"));
    store.record(&carbonate, 600.0, &Outcome::Reacts(products(&["CuO"]))).unwrap();
    assert_eq!(carbonate.to_string(), "CuCO3");
    assert!(matches!(store.lookup(&carbonate, 700.0), PairStatus::Reacts(_)));
    assert_eq!(store.lookup(&carbonate, 500.0), PairStatus::Unknown);
}

#[test]
fn test_iteration_is_canonical() {
    let store = lab_store();
    let pairs: Vec<String> = store.iter().map(|(p, _)| p.to_string()).collect();
    let mut sorted = pairs.clone();
    sorted.sort();
    assert_eq!(pairs, sorted);
}

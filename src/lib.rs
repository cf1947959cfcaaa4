//! # synth-planner: Solid-State Synthesis Planning
//!
//! **Version**: 0.1.0
//!
//! synth-planner proposes which precursor mixtures to fire, and at which
//! temperature, to make a target inorganic phase. It ranks precursor sets by
//! thermodynamic driving force, learns pairwise reaction outcomes from each
//! characterized experiment, and re-ranks the remaining candidates so the
//! next batch avoids interfaces known to form stable intermediates.
//!
//! ## Components
//!
//! - [`candidates`]: balanced candidate reactions ranked by driving force
//! - [`pairwise`]: what each pair of phases forms, and when
//! - [`attribution`]: which pairwise reactions explain an observed product mixture
//! - [`evolution`]: predicted phase evolution of a mixture through known reactions
//! - [`suggest`]: ranking of untested experiments and batch selection
//! - [`storage`]: campaign artifacts (settings, energies, tables, experiment log)
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Jidoka**: Reactions that fail mass balance never enter the ranking
//! - **Genchi Genbutsu**: Rankings change only through observed experiments
//! - **Poka-Yoke**: Contradicting pairwise observations are reported, never merged
//!
//! ## Example Usage
//!
//! ```rust
//! use synth_planner::candidates::generate_candidates;
//! use synth_planner::config::SynthesisConfig;
//! use synth_planner::oracle::TabulatedOracle;
//!
//! let config = SynthesisConfig::builder(["BaO", "BaO2", "CuO"], "BaCuO2", [700.0]).build()?;
//! let oracle = TabulatedOracle::new()
//!     .with_energy("BaO", 700.0, -2.9)?
//!     .with_energy("BaO2", 700.0, -2.2)?
//!     .with_energy("CuO", 700.0, -0.8)?
//!     .with_energy("BaCuO2", 700.0, -2.0)?;
//!
//! let table = generate_candidates(&config, &oracle)?;
//! for candidate in table.iter() {
//!     println!("{}: {:.0} meV/atom", candidate.precursors(), candidate.energy());
//! }
//! # Ok::<(), synth_planner::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod attribution;
pub mod candidates;
pub mod chemistry;
pub mod config;
pub mod error;
pub mod evolution;
pub mod experiment;
pub mod oracle;
pub mod pairwise;
pub mod reaction;
pub mod storage;
pub mod suggest;
pub mod topk;

pub use error::{Error, Result, Warning};

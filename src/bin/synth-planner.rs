//! synth-planner command-line driver
//!
//! ```text
//! synth-planner gather <settings.json> <energies.json> <out.csv>
//! synth-planner suggest <dir> [--explore] [--enforce_thermo] [--greedy]
//!                             [--partial_yield] [--all] [--verbose] [--batch=N]
//!                             [--seed=<PairwiseRxns.csv>]...
//! ```
//!
//! `--seed` imports a pairwise database from a prior campaign before the
//! experiment history is attributed. It may be given more than once.
//!
//! Logging is controlled by `RUST_LOG` (default `info`, `debug` with `--verbose`).

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use synth_planner::candidates::generate_candidates;
use synth_planner::config::PolicyFlags;
use synth_planner::experiment::ExperimentLog;
use synth_planner::pairwise::PairwiseStore;
use synth_planner::storage::{
    load_candidates, load_config, load_energies, load_experiments, load_pairwise, save_candidates, save_pairwise,
    seed_pairwise, CampaignDir,
};
use synth_planner::suggest::{Suggestion, SuggestionEngine, SuggestionOutcome, SuggestionReport};

const USAGE: &str = "usage:
  synth-planner gather <settings.json> <energies.json> <out.csv>
  synth-planner suggest <dir> [--explore] [--enforce_thermo] [--greedy] [--partial_yield] [--all] [--verbose] [--batch=N] [--seed=<csv>]...";

/// Options of `suggest` beyond the policy flags.
struct SuggestOptions {
    batch: usize,
    seeds: Vec<PathBuf>,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (policy, rest) = PolicyFlags::from_args(args.iter().map(String::as_str));
    init_tracing(policy.verbose);

    match rest.as_slice() {
        ["gather", settings, energies, out] => gather(Path::new(settings), Path::new(energies), Path::new(out)),
        ["suggest", dir, options @ ..] => {
            let options = suggest_options(options)?;
            suggest(&CampaignDir::new(*dir), policy, &options)
        }
        _ => bail!("{USAGE}"),
    }
}

fn suggest_options(options: &[&str]) -> Result<SuggestOptions> {
    let mut parsed = SuggestOptions {
        batch: 1,
        seeds: Vec::new(),
    };
    for option in options {
        if let Some(n) = option.strip_prefix("--batch=") {
            parsed.batch = n.parse().with_context(|| format!("bad batch size '{n}'"))?;
        } else if let Some(path) = option.strip_prefix("--seed=") {
            parsed.seeds.push(PathBuf::from(path));
        } else {
            bail!("unknown option '{option}'\n{USAGE}");
        }
    }
    Ok(parsed)
}

fn gather(settings: &Path, energies: &Path, out: &Path) -> Result<()> {
    let config = load_config(settings).with_context(|| format!("reading {}", settings.display()))?;
    let oracle = load_energies(energies, &config).with_context(|| format!("reading {}", energies.display()))?;

    let table = generate_candidates(&config, &oracle)?;
    for warning in table.warnings() {
        warn!(%warning, "gather");
    }
    save_candidates(&table, out).with_context(|| format!("writing {}", out.display()))?;
    info!(candidates = table.len(), path = %out.display(), "candidate table written");
    Ok(())
}

fn suggest(dir: &CampaignDir, policy: PolicyFlags, options: &SuggestOptions) -> Result<()> {
    let settings = dir.settings();
    let config = load_config(&settings).with_context(|| format!("reading {}", settings.display()))?;
    let energies = dir.energies();
    let oracle = load_energies(&energies, &config).with_context(|| format!("reading {}", energies.display()))?;
    let candidates = dir.candidates();
    let table = load_candidates(&candidates, config.max_temperature())
        .with_context(|| format!("reading {} (run `synth-planner gather` first)", candidates.display()))?;

    let pairwise = dir.pairwise();
    let mut store = if pairwise.exists() {
        let (store, conflicts) =
            load_pairwise(&pairwise).with_context(|| format!("reading {}", pairwise.display()))?;
        for warning in conflicts {
            warn!(%warning, "pairwise database");
        }
        store
    } else {
        PairwiseStore::new()
    };
    for seed in &options.seeds {
        let conflicts = seed_pairwise(&mut store, seed).with_context(|| format!("reading seed {}", seed.display()))?;
        if !conflicts.is_empty() {
            warn!(path = %seed.display(), conflicts = conflicts.len(), "seed partially applied");
        }
    }

    let experiments = dir.experiments();
    let log = if experiments.exists() {
        load_experiments(&experiments).with_context(|| format!("reading {}", experiments.display()))?
    } else {
        ExperimentLog::new()
    };

    let engine = SuggestionEngine::new(&config, &oracle, policy)?;
    let report = engine.suggest(&table, &mut store, &log, options.batch)?;
    save_pairwise(&store, &pairwise).with_context(|| format!("writing {}", pairwise.display()))?;

    print_report(&report, policy.verbose);
    Ok(())
}

fn print_report(report: &SuggestionReport, verbose: bool) {
    if verbose {
        println!("Ranking ({} entries):", report.ranking.len());
        for (rank, entry) in report.ranking.iter().enumerate() {
            println!("{:>4}. {}", rank + 1, describe(entry));
        }
        println!();
    }
    match &report.outcome {
        SuggestionOutcome::Suggestions(batch) => {
            println!("Suggested experiments:");
            for entry in batch {
                println!("  {}", describe(entry));
            }
        }
        SuggestionOutcome::Solved {
            precursors,
            temperature,
        } => println!("Target obtained from {precursors} at {temperature} C"),
        SuggestionOutcome::Unranked { untested } => {
            println!("{untested} untested entries remain, but none could be ranked (see warnings)");
        }
        SuggestionOutcome::Exhausted => println!("All candidates have been tested"),
    }
}

fn describe(entry: &Suggestion) -> String {
    let amounts = entry
        .amounts
        .iter()
        .map(|a| format!("{a:.3}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "{} [{amounts}] at {} C: {:.1} meV/atom (effective {:.1}), yield {:.0}%, {:?}",
        entry.precursors,
        entry.temperature,
        entry.energy,
        entry.effective_energy,
        entry.expected_yield * 100.0,
        entry.tier,
    )
}

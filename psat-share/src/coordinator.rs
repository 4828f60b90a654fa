//! Spawns one OS thread per worker, wires each into a [`SharingFabric`], and reduces the fleet's
//! individual outcomes to a single answer (§5).

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use psat_core::config::{GlobalConfig, SolverConfig};
use psat_core::worker::SolveResult;
use psat_core::{SolverError, Worker, WorkerStats};
use psat_formula::CnfFormula;

use crate::answer::Answer;
use crate::fabric::SharingFabric;
use crate::limits::ControlMode;

/// Ring capacity between every pair of workers, for both the unit and clause rings. Not named as
/// a configuration key in §6; sized generously above [`crate::limits::LIMIT_CONFLICTS_EVAL`] so a
/// burst of exports between two limit reassessments doesn't immediately saturate a ring.
pub const DEFAULT_RING_CAPACITY: usize = 4096;

/// Initial pairwise export-size limit, before any AIMD/incremental adjustment.
pub const INITIAL_EXPORT_LIMIT: f64 = 8.0;

/// Knobs for a single [`solve`] call that aren't per-worker `SolverConfig` (§6: worker count,
/// export size limit, control mode, and the CPU/wall-clock budget are all CLI-level, not
/// configuration-file, concerns).
#[derive(Debug, Clone)]
pub struct SolveOptions {
    pub ring_capacity: usize,
    pub initial_export_limit: f64,
    pub control_mode: ControlMode,
    /// Wall-clock budget for the whole solve. `psat-cli` is the only caller that sets this; a
    /// background thread calls `AnswerBoard::request_stop` once it elapses, which every worker
    /// observes cooperatively at its next segment boundary (§5).
    pub time_limit: Option<Duration>,
    /// Resident-memory budget in mebibytes. Polled by a background thread at
    /// `MEMORY_POLL_INTERVAL`; once exceeded it requests a stop the same way `time_limit` does.
    /// `None` on platforms `crate::resource::memory_used_mb` can't read (never trips).
    pub memory_limit_mb: Option<u64>,
}

/// How often the memory watchdog samples RSS.
const MEMORY_POLL_INTERVAL: Duration = Duration::from_millis(200);

impl Default for SolveOptions {
    fn default() -> SolveOptions {
        SolveOptions {
            ring_capacity: DEFAULT_RING_CAPACITY,
            initial_export_limit: INITIAL_EXPORT_LIMIT,
            control_mode: ControlMode::Off,
            time_limit: None,
            memory_limit_mb: None,
        }
    }
}

/// Final outcome of a whole-fleet solve (§5).
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Sat(Vec<bool>),
    Unsat,
    /// No worker concluded before every worker was interrupted (an external stop request, or a
    /// resource limit, fired before any worker found an answer).
    Indeterminate,
}

/// Per-worker and fleet-wide statistics, gathered once every worker thread has joined (§7).
pub struct FleetStats {
    pub per_worker: Vec<WorkerStats>,
    /// `export_limit_matrix[p][q]`: the export-size limit producer `p` ended with towards
    /// consumer `q`, for §7's pairwise export-limit matrix report. Entries on the diagonal are
    /// meaningless (a worker never exports to itself) and are left at their initial value.
    pub export_limit_matrix: Vec<Vec<f64>>,
}

pub struct SolveOutput {
    pub outcome: Outcome,
    pub stats: FleetStats,
}

struct WorkerOutcome {
    id: usize,
    result: Result<SolveResult, SolverError>,
    stats: WorkerStats,
    model: Option<Vec<bool>>,
}

/// Builds the sharing fabric, runs one worker thread per entry of `solver_configs`, and returns
/// once every thread has joined.
pub fn solve(
    formula: &CnfFormula,
    global: &GlobalConfig,
    solver_configs: &[SolverConfig],
    options: &SolveOptions,
) -> SolveOutput {
    let n = solver_configs.len();
    assert!(n > 0, "at least one worker is required");

    let fabric = Arc::new(SharingFabric::new(
        n,
        options.ring_capacity,
        options.initial_export_limit,
        global.deterministic,
        global.det_freq_mode,
    ));
    let control_mode = options.control_mode;

    if let Some(limit) = options.time_limit {
        let fabric = Arc::clone(&fabric);
        thread::Builder::new()
            .name("psat-time-limit".to_owned())
            .spawn(move || {
                thread::sleep(limit);
                fabric.answers().request_stop();
            })
            .expect("failed to spawn the time-limit watchdog thread");
    }

    if let Some(limit_mb) = options.memory_limit_mb {
        let fabric = Arc::clone(&fabric);
        thread::Builder::new()
            .name("psat-memory-limit".to_owned())
            .spawn(move || {
                while !fabric.answers().should_stop() {
                    if let Some(used) = crate::resource::memory_used_mb() {
                        if used >= limit_mb {
                            fabric.answers().request_stop();
                            break;
                        }
                    }
                    thread::sleep(MEMORY_POLL_INTERVAL);
                }
            })
            .expect("failed to spawn the memory-limit watchdog thread");
    }

    let var_count = formula.var_count();
    let clauses: Vec<Vec<psat_formula::Lit>> = formula.iter().map(|c| c.to_vec()).collect();

    let handles: Vec<_> = solver_configs
        .iter()
        .enumerate()
        .map(|(id, config)| {
            let fabric = Arc::clone(&fabric);
            let fabric_config = config.clone();
            let worker_config = config.clone();
            let clauses = clauses.clone();

            thread::Builder::new()
                .name(format!("psat-worker-{}", id))
                .spawn(move || {
                    let mut worker = Worker::new(id, worker_config, id as u64);
                    worker.set_var_count(var_count);
                    for clause in &clauses {
                        worker.add_clause(clause);
                    }

                    let mut sharing = fabric.handle(id, &fabric_config, control_mode);
                    let result = worker.solve(&mut sharing);

                    let answer = match &result {
                        Ok(SolveResult::Sat) => Answer::Sat,
                        Ok(SolveResult::Unsat) => Answer::Unsat,
                        Ok(SolveResult::Interrupted) | Err(_) => Answer::Undef,
                    };
                    if answer != Answer::Undef {
                        fabric.answers().set(id, answer);
                    }
                    fabric.deregister_worker();

                    let model = match &result {
                        Ok(SolveResult::Sat) => Some(worker.model()),
                        _ => None,
                    };

                    WorkerOutcome {
                        id,
                        result,
                        stats: *worker.stats(),
                        model,
                    }
                })
                .expect("failed to spawn worker thread")
        })
        .collect();

    let mut outcomes: Vec<WorkerOutcome> = handles
        .into_iter()
        .map(|h| h.join().expect("worker thread panicked"))
        .collect();
    outcomes.sort_by_key(|o| o.id);

    let decided = outcomes
        .iter()
        .find(|o| matches!(o.result, Ok(SolveResult::Sat) | Ok(SolveResult::Unsat)));

    let outcome = match decided {
        Some(o) => match o.result {
            Ok(SolveResult::Sat) => Outcome::Sat(o.model.clone().unwrap_or_default()),
            Ok(SolveResult::Unsat) => Outcome::Unsat,
            _ => unreachable!("filtered to Sat/Unsat above"),
        },
        None => Outcome::Indeterminate,
    };

    let export_limit_matrix = (0..n)
        .map(|p| (0..n).map(|q| fabric.limits().get(p, q)).collect())
        .collect();

    SolveOutput {
        outcome,
        stats: FleetStats {
            per_worker: outcomes.into_iter().map(|o| o.stats).collect(),
            export_limit_matrix,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use psat_formula::lits;

    fn formula_from_clauses(var_count: usize, clauses: &[&[psat_formula::Lit]]) -> CnfFormula {
        let mut formula = CnfFormula::new();
        formula.set_var_count(var_count);
        for clause in clauses {
            formula.add_clause(clause.iter().copied());
        }
        formula
    }

    #[test]
    fn two_workers_agree_on_unsat() {
        let clauses = [
            &lits![1, 2][..],
            &lits![-1, 2][..],
            &lits![1, -2][..],
            &lits![-1, -2][..],
        ];
        let formula = formula_from_clauses(2, &clauses);
        let configs = vec![SolverConfig::default(), SolverConfig::default()];
        let output = solve(&formula, &GlobalConfig::default(), &configs, &SolveOptions::default());
        assert_eq!(output.outcome, Outcome::Unsat);
        assert_eq!(output.stats.per_worker.len(), 2);
    }

    #[test]
    fn single_worker_finds_a_model() {
        let clauses = [&lits![1, 2][..]];
        let formula = formula_from_clauses(2, &clauses);
        let configs = vec![SolverConfig::default()];
        let output = solve(&formula, &GlobalConfig::default(), &configs, &SolveOptions::default());
        match output.outcome {
            Outcome::Sat(model) => assert_eq!(model.len(), 2),
            other => panic!("expected Sat, got {:?}", other),
        }
    }

    #[test]
    fn deterministic_mode_still_reaches_an_answer() {
        let clauses = [
            &lits![1, 2][..],
            &lits![-1, 2][..],
            &lits![1, -2][..],
            &lits![-1, -2][..],
        ];
        let formula = formula_from_clauses(2, &clauses);
        let configs = vec![SolverConfig::default(), SolverConfig::default()];
        let mut global = GlobalConfig::default();
        global.deterministic = true;
        let output = solve(&formula, &global, &configs, &SolveOptions::default());
        assert_eq!(output.outcome, Outcome::Unsat);
    }
}

//! The single-worker CDCL search loop (§4.8) and its interface to the sharing fabric (§4.9/§4.10).
use psat_formula::{Lit, Var};

use crate::clause::activity::{bump_clause_activity, decay_clause_activities, ClauseActivity};
use crate::clause::{ClauseAlloc, ClauseDb, ClauseHeader, ClauseRef, Generator};
use crate::config::{ReducePolicy, SolverConfig};
use crate::decision::Decision;
use crate::error::SolverError;
use crate::glue::compute_glue;
use crate::load::{load_clause, LoadResult};
use crate::propagate::propagate;
use crate::reduce::{reduce_activity_sort, reduce_psm, ReduceSchedule, ReduceStats};
use crate::restart::RestartController;
use crate::stats::WorkerStats;
use crate::tmp::TmpData;
use crate::trail::{backtrack, enqueue_assignment, Conflict, Reason, Trail};
use crate::analyze::{analyze_conflict, AnalyzeConflict};
use crate::vsids::Vsids;
use crate::watch::Watchlists;

/// Outcome of a call to [`Worker::solve`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SolveResult {
    Sat,
    Unsat,
    /// The sharing fabric asked this worker to stop (another worker found an answer, or a
    /// resource limit fired).
    Interrupted,
}

/// The other half of the sharing fabric, as seen from a single worker.
///
/// `psat-share` provides the implementation; this crate only depends on the trait so the two
/// crates don't form a cycle.
pub trait SharingEndpoint {
    /// Offer a unit clause learnt (or simplified down to) at level 0.
    fn export_unit(&mut self, lit: Lit);
    /// Offer a learnt clause of the given LBD for export.
    fn export_clause(&mut self, lits: &[Lit], lbd: usize);
    /// Drain any units imported since the last call.
    fn import_units(&mut self, into: &mut Vec<Lit>);
    /// Drain any clauses imported since the last call, as `(literals, lbd, source worker)`.
    fn import_clauses(&mut self, into: &mut Vec<(Vec<Lit>, usize, usize)>);
    /// Whether the fleet has an answer and this worker should stop.
    fn should_stop(&self) -> bool;
    /// In deterministic mode, block until every worker reaches this point. A no-op otherwise.
    fn sync_barrier(&mut self);
}

/// All state owned by a single CDCL search worker.
pub struct Worker {
    id: usize,
    config: SolverConfig,

    alloc: ClauseAlloc,
    db: ClauseDb,
    watchlists: Watchlists,
    trail: Trail,
    vsids: Vsids,
    clause_activity: ClauseActivity,
    decision: Decision,
    analyze: AnalyzeConflict,
    restart: RestartController,
    reduce_schedule: ReduceSchedule,
    tmp: TmpData,

    stats: WorkerStats,
    agility: f32,
    last_deviation: f64,
    var_count: usize,
    unsat: bool,
}

impl Worker {
    pub fn new(id: usize, config: SolverConfig, base_seed: u64) -> Worker {
        let clause_activity = ClauseActivity::new(config.clause_decay);
        let decision = Decision::new(&config, base_seed, id);
        let restart = RestartController::new(&config);
        let reduce_schedule = ReduceSchedule::new(&config);

        Worker {
            id,
            clause_activity,
            decision,
            restart,
            reduce_schedule,
            config,
            alloc: ClauseAlloc::new(),
            db: ClauseDb::new(),
            watchlists: Watchlists::default(),
            trail: Trail::default(),
            vsids: Vsids::default(),
            analyze: AnalyzeConflict::default(),
            tmp: TmpData::default(),
            stats: WorkerStats::new(),
            agility: 0.0,
            last_deviation: 0.2,
            var_count: 0,
            unsat: false,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// The current variable count (grown monotonically by [`Worker::set_var_count`] and by
    /// importing clauses that reference higher indices).
    pub fn var_count(&self) -> usize {
        self.var_count
    }

    /// The satisfying assignment after [`Worker::solve`] returned [`SolveResult::Sat`].
    ///
    /// Every variable is assigned at that point (`pick_branch_lit` only returns `None` once every
    /// variable known to the decision heuristic has a value), but this defaults unset variables
    /// to `false` rather than panicking, so callers don't need to special-case variables this
    /// worker never heard about (e.g. ones only ever referenced by another worker's export).
    pub fn model(&self) -> Vec<bool> {
        (0..self.var_count)
            .map(|i| self.trail.var_value(Var::from_index(i)).unwrap_or(false))
            .collect()
    }

    /// Grow the solver's variable count to at least `count`.
    pub fn set_var_count(&mut self, count: usize) {
        if count <= self.var_count {
            return;
        }
        self.var_count = count;
        self.trail.set_var_count(count);
        self.watchlists.set_var_count(count);
        self.vsids.set_var_count(count);
        self.vsids.set_decay(self.config.var_decay);
        self.analyze.set_var_count(count);
        self.tmp.set_var_count(count);
        self.decision.set_var_count(count, self.config.init_phase_policy);
    }

    /// Add an original input clause. Only valid before [`Worker::solve`] is first called.
    pub fn add_clause(&mut self, lits: &[Lit]) {
        if self.unsat {
            return;
        }
        let result = load_clause(
            &mut self.alloc,
            &mut self.db,
            &mut self.watchlists,
            &mut self.trail,
            &mut self.tmp,
            Generator::Original,
            lits,
        );
        if result == LoadResult::Unsat {
            self.unsat = true;
        }
    }

    /// Run the search loop until a result is found or the sharing fabric interrupts this worker.
    pub fn solve(&mut self, sharing: &mut impl SharingEndpoint) -> Result<SolveResult, SolverError> {
        if self.unsat {
            return Ok(SolveResult::Unsat);
        }

        if let Err(conflict) = propagate(
            &mut self.watchlists,
            &mut self.alloc,
            &mut self.trail,
            &mut self.agility,
            |_| {},
        ) {
            let _ = conflict;
            return Ok(SolveResult::Unsat);
        }

        loop {
            if sharing.should_stop() {
                return Ok(SolveResult::Interrupted);
            }

            let mut reasserted = vec![];
            let propagate_result = propagate(
                &mut self.watchlists,
                &mut self.alloc,
                &mut self.trail,
                &mut self.agility,
                |cref| reasserted.push(cref),
            );

            for cref in reasserted {
                self.recompute_lbd(cref);
            }

            match propagate_result {
                Err(conflict) => {
                    if self.trail.current_level() == 0 {
                        return Ok(SolveResult::Unsat);
                    }

                    let backjump_level = analyze_conflict(
                        &mut self.analyze,
                        &mut self.vsids,
                        &self.alloc,
                        &self.trail,
                        conflict,
                    );

                    for &cref in self.analyze.involved().to_vec().iter() {
                        bump_clause_activity(&mut self.clause_activity, &self.db, &mut self.alloc, cref);
                    }
                    decay_clause_activities(&mut self.clause_activity, &self.db, &mut self.alloc);

                    let learnt: Vec<Lit> = self.analyze.clause().to_vec();
                    self.stats.record_conflict(learnt.len());

                    // Levels are only meaningful for currently assigned variables: compute the
                    // glue level before backtracking unassigns everything above the backjump
                    // level.
                    let lbd = {
                        let mut flags = vec![false; self.trail.current_level() + 1];
                        compute_glue(&mut flags, |v| self.trail.level(v), &learnt)
                    };

                    backtrack(&mut self.trail, &mut self.vsids, backjump_level);
                    self.sync_phase_from_trail();

                    self.restart.record_conflict(
                        &self.config,
                        lbd,
                        learnt.len(),
                        self.trail.trail().len(),
                    );

                    if learnt.len() == 1 {
                        sharing.export_unit(learnt[0]);
                        self.stats.exported_units += 1;
                    } else {
                        // Whether this offer actually reaches any peer is governed by the export
                        // policy and the per-pair ring state (§4.9), both of which live on the
                        // sharing fabric's side of this trait.
                        sharing.export_clause(&learnt, lbd);
                        self.stats.exported_clauses += 1;
                    }
                    self.install_learnt(&learnt, lbd, Generator::Worker(self.id));

                    self.reduce_schedule.tick();
                }
                Ok(()) => {
                    if self.restart.should_restart(&self.config) {
                        backtrack(&mut self.trail, &mut self.vsids, 0);
                        self.sync_phase_from_trail();
                        self.restart.restart(&self.config);
                        self.stats.restarts += 1;
                        sharing.sync_barrier();
                    }

                    if self.reduce_schedule.due() {
                        self.run_reduce();
                        self.reduce_schedule.rearm(&self.config);
                    }

                    match self.decision.pick_branch_lit(&mut self.vsids, &self.trail) {
                        None => return Ok(SolveResult::Sat),
                        Some(lit) => {
                            self.stats.decisions += 1;
                            self.trail.new_decision_level();
                            enqueue_assignment(&mut self.trail, lit, Reason::Unit);
                        }
                    }
                }
            }

            // Pulled regardless of which branch fired above: a worker deep in a run of
            // back-to-back conflicts (common right after a restart) would otherwise starve for
            // arbitrarily long on clauses and units the fleet already has available.
            if self.import_from_sharing(sharing) {
                return Ok(SolveResult::Unsat);
            }
        }
    }

    /// Attach a freshly derived clause as either a propagated unit or a newly watched learnt
    /// clause, enqueuing the asserting literal either way. The trail must already be at the
    /// clause's backjump level.
    fn install_learnt(&mut self, learnt: &[Lit], lbd: usize, generator: Generator) {
        if learnt.len() == 1 {
            enqueue_assignment(&mut self.trail, learnt[0], Reason::Unit);
        } else {
            let mut header = ClauseHeader::new();
            header.set_learnt(true);
            header.set_lbd(lbd);
            header.set_generator(generator);
            header.set_freeze_left(self.config.max_freeze);
            header.set_used_since_last_reduce(true);
            header.set_used_once(true);

            let cref = self.db.add_clause(&mut self.alloc, header, learnt);
            let lits = self.alloc.clause(cref).lits();
            self.watchlists.watch_clause(cref, [lits[0], lits[1]]);
            self.alloc.header_mut(cref).set_attached(true);
            let nb_attached = self.alloc.header(cref).nb_attached();
            self.alloc.header_mut(cref).set_nb_attached(nb_attached + 1);

            enqueue_assignment(&mut self.trail, learnt[0], Reason::Clause(cref));
        }
    }

    /// Import units and clauses offered by peers (§4.9/§4.10), returning `true` if doing so
    /// revealed the formula is unsatisfiable.
    ///
    /// An imported clause's literals may be stale relative to this worker's own trail: some may
    /// already be fixed at level 0, and among the rest, any number may currently be false at a
    /// deeper level. Installing it as a watched clause without accounting for that would violate
    /// the two-watched-literal invariant (see `watch.rs`), so each clause is re-simplified and, if
    /// still attached, its watches are rederived against the current assignment before it is ever
    /// handed to `Watchlists::watch_clause`.
    fn import_from_sharing(&mut self, sharing: &mut impl SharingEndpoint) -> bool {
        let mut units = vec![];
        sharing.import_units(&mut units);
        if !units.is_empty() {
            backtrack(&mut self.trail, &mut self.vsids, 0);
            self.sync_phase_from_trail();
            for lit in units {
                match self.trail.lit_value(lit) {
                    Some(false) => {
                        self.unsat = true;
                        return true;
                    }
                    Some(true) => {}
                    None => {
                        enqueue_assignment(&mut self.trail, lit, Reason::Unit);
                        self.stats.imported_units += 1;
                    }
                }
            }
        }

        let mut clauses = vec![];
        sharing.import_clauses(&mut clauses);
        for (lits, lbd, source) in clauses {
            if lits.len() < 2 {
                continue;
            }
            if self.config.reject_at_import && lbd > self.config.reject_lbd {
                continue;
            }

            // Drop literals already fixed false at level 0 for good; drop the whole clause if any
            // literal is already fixed true there, since it's satisfied and not worth storing.
            let mut satisfied = false;
            let mut filtered: Vec<Lit> = Vec::with_capacity(lits.len());
            for &lit in &lits {
                if self.trail.level(lit.var()) == 0 && self.trail.var_value(lit.var()).is_some() {
                    if self.trail.lit_is_true(lit) {
                        satisfied = true;
                        break;
                    }
                } else {
                    filtered.push(lit);
                }
            }
            if satisfied {
                continue;
            }

            if filtered.is_empty() {
                self.unsat = true;
                return true;
            }

            self.stats.imported_clauses += 1;

            if filtered.len() == 1 {
                let lit = filtered[0];
                backtrack(&mut self.trail, &mut self.vsids, 0);
                self.sync_phase_from_trail();
                match self.trail.lit_value(lit) {
                    Some(false) => {
                        self.unsat = true;
                        return true;
                    }
                    Some(true) => {}
                    None => {
                        enqueue_assignment(&mut self.trail, lit, Reason::Unit);
                        self.stats.imported_units += 1;
                    }
                }
                continue;
            }

            let attach_now = match self.config.import_policy {
                crate::config::ImportPolicy::NoFreeze => true,
                crate::config::ImportPolicy::FreezeAll => false,
                crate::config::ImportPolicy::Freeze => lbd <= self.config.max_lbd,
            };

            let mut header = ClauseHeader::new();
            header.set_learnt(true);
            header.set_lbd(lbd);
            header.set_generator(Generator::Worker(source));
            header.set_freeze_left(self.config.extra_imported_freeze);

            let cref = self.db.add_clause(&mut self.alloc, header, &filtered);

            if !attach_now {
                continue;
            }

            let clits = self.alloc.clause_mut(cref).lits_mut();
            let wtch = reorder_for_import_watch(clits, &self.trail).min(2);

            match wtch {
                0 => {
                    // Every literal is false under the current assignment: this import is a
                    // conflict in its own right. Fold it through the normal analysis path and
                    // reinstall whatever clause that derives instead of attaching this one as is.
                    let backjump_level = analyze_conflict(
                        &mut self.analyze,
                        &mut self.vsids,
                        &self.alloc,
                        &self.trail,
                        Conflict { cref },
                    );

                    let learnt: Vec<Lit> = self.analyze.clause().to_vec();
                    let new_lbd = {
                        let mut flags = vec![false; self.trail.current_level() + 1];
                        compute_glue(&mut flags, |v| self.trail.level(v), &learnt)
                    };

                    backtrack(&mut self.trail, &mut self.vsids, backjump_level);
                    self.sync_phase_from_trail();
                    self.install_learnt(&learnt, new_lbd, Generator::Worker(self.id));
                }
                1 => {
                    let lits_now = self.alloc.clause(cref).lits();
                    let unit_lit = lits_now[0];
                    let other = lits_now[1];
                    let needs_enqueue = self.trail.var_value(unit_lit.var()).is_none();

                    if needs_enqueue {
                        let backjump_level = self.trail.level(other.var());
                        backtrack(&mut self.trail, &mut self.vsids, backjump_level);
                        self.sync_phase_from_trail();
                    }

                    let lits_now = self.alloc.clause(cref).lits();
                    self.watchlists.watch_clause(cref, [lits_now[0], lits_now[1]]);
                    self.alloc.header_mut(cref).set_attached(true);
                    let nb_attached = self.alloc.header(cref).nb_attached();
                    self.alloc.header_mut(cref).set_nb_attached(nb_attached + 1);

                    if needs_enqueue {
                        enqueue_assignment(&mut self.trail, unit_lit, Reason::Clause(cref));
                    }
                }
                _ => {
                    let lits_now = self.alloc.clause(cref).lits();
                    self.watchlists.watch_clause(cref, [lits_now[0], lits_now[1]]);
                    self.alloc.header_mut(cref).set_attached(true);
                    let nb_attached = self.alloc.header(cref).nb_attached();
                    self.alloc.header_mut(cref).set_nb_attached(nb_attached + 1);
                }
            }
        }

        false
    }

    fn run_reduce(&mut self) {
        let mut stats = ReduceStats::default();
        let decision = &self.decision;
        let polarity = move |lit: Lit| decision.polarity(lit.var());

        let cancel_to = match self.config.reduce_policy() {
            ReducePolicy::Psm => reduce_psm(
                &mut self.db,
                &mut self.alloc,
                &mut self.watchlists,
                &self.trail,
                polarity,
                &self.config,
                self.last_deviation,
                &mut stats,
                Some(self.id),
            ),
            ReducePolicy::ActivitySort => {
                reduce_activity_sort(
                    &mut self.db,
                    &mut self.alloc,
                    &mut self.watchlists,
                    &self.trail,
                    &self.clause_activity,
                    &mut stats,
                );
                None
            }
        };

        if let Some(level) = cancel_to {
            backtrack(&mut self.trail, &mut self.vsids, level);
        }

        self.stats.record_reduce(&stats);

        if self.db.garbage_collection_due(&self.alloc) {
            self.collect_garbage();
        }
    }

    /// Relocate all live clauses into a fresh, compacted allocation, fixing up every trail reason
    /// that pointed at a clause that moved.
    fn collect_garbage(&mut self) {
        use std::collections::HashMap;

        let mut reasons: HashMap<ClauseRef, Vec<Var>> = HashMap::new();
        for &lit in self.trail.trail() {
            if let Reason::Clause(cref) = self.trail.reason(lit.var()) {
                reasons.entry(cref).or_default().push(lit.var());
            }
        }

        let mut relocations: Vec<(Var, ClauseRef)> = vec![];
        self.db.collect_garbage_now(
            &mut self.alloc,
            |cref| reasons.contains_key(&cref),
            |old, new| {
                if let Some(vars) = reasons.get(&old) {
                    relocations.extend(vars.iter().map(|&var| (var, new)));
                }
            },
        );

        for (var, new_cref) in relocations {
            self.trail.update_reason(var, Reason::Clause(new_cref));
        }
    }

    /// Feed every variable unassigned by the last backtrack into the decision heuristic's
    /// polarity cache, the way `cancelUntil` saves phases in MiniSat-lineage solvers.
    fn sync_phase_from_trail(&mut self) {
        for i in 0..self.var_count {
            let var = Var::from_index(i);
            if self.trail.var_value(var).is_none() {
                self.decision.save_polarity(var, self.trail.last_var_value(var), 0);
            }
        }
    }

    fn recompute_lbd(&mut self, cref: crate::clause::ClauseRef) {
        let mut flags = vec![false; self.trail.current_level() + 1];
        let lits: Vec<Lit> = self.alloc.clause(cref).lits().to_vec();
        let lbd = compute_glue(&mut flags, |v| self.trail.level(v), &lits);
        let old_lbd = self.alloc.header(cref).lbd();
        if lbd < old_lbd {
            self.alloc.header_mut(cref).set_lbd(lbd);
        }
    }
}

/// Reorder an imported clause's literals so positions 0 and 1 are the best candidates to watch
/// against the current trail: non-false literals first, then, among the false ones, the ones
/// falsified at the deepest decision level (the ones most likely to become unassigned next).
/// Returns the number of non-false literals found.
fn reorder_for_import_watch(lits: &mut [Lit], trail: &Trail) -> usize {
    lits.sort_by_key(|&lit| {
        if trail.lit_is_false(lit) {
            (1, usize::MAX - trail.level(lit.var()))
        } else {
            (0, 0)
        }
    });
    lits.iter().take_while(|&&lit| !trail.lit_is_false(lit)).count()
}

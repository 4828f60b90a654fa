//! The periodic learned-clause reduction pass (§4.7): a psm/usefulness-driven freezing policy
//! (mode A, the default) and an activity-sort half-removal policy (mode B).
use psat_formula::Lit;

use crate::clause::{activity::ClauseActivity, ClauseAlloc, ClauseDb, ClauseRef};
use crate::config::SolverConfig;
use crate::trail::{Reason, Trail};
use crate::watch::Watchlists;

/// Running counters updated by a reduction pass, surfacing the exact stats §7/§9 ask for.
#[derive(Default, Debug, Clone, Copy)]
pub struct ReduceStats {
    pub nb_reduce: u64,
    pub imported_deleted_no_use: u64,
    pub never_attached: u64,
}

/// Countdown/limit state driving when [`reduce`] runs, per §4.7's `controlReduce` /
/// `currentLimit` pair.
pub struct ReduceSchedule {
    pub control_reduce: i64,
    pub current_limit: i64,
}

impl ReduceSchedule {
    pub fn new(config: &SolverConfig) -> ReduceSchedule {
        ReduceSchedule {
            control_reduce: config.initial_nb_conflict_before_reduce as i64,
            current_limit: config.initial_nb_conflict_before_reduce as i64,
        }
    }

    pub fn tick(&mut self) {
        self.control_reduce -= 1;
    }

    pub fn due(&self) -> bool {
        self.control_reduce < 0
    }

    pub fn rearm(&mut self, config: &SolverConfig) {
        self.control_reduce = self.current_limit;
        self.current_limit += config.nb_conflict_before_reduce_increment as i64;
    }
}

fn is_locked(alloc: &ClauseAlloc, trail: &Trail, cref: ClauseRef) -> bool {
    let lits = alloc.clause(cref).lits();
    let lit0 = lits[0];
    trail.lit_is_true(lit0) && trail.reason(lit0.var()) == Reason::Clause(cref)
}

/// Move the (up to two) non-false literals of a clause to positions 0 and 1, with the
/// higher-level literal of the two in position 1 per the watch invariant. Returns the number of
/// non-false literals found among the first two after rearrangement, and the level of the
/// deepest literal seen.
fn rearrange_for_detach(lits: &mut [Lit], trail: &Trail) -> (usize, usize) {
    let mut write = 0;
    for read in 0..lits.len() {
        if !trail.lit_is_false(lits[read]) {
            lits.swap(write, read);
            write += 1;
            if write == 2 {
                break;
            }
        }
    }

    let wtch = write.min(2);

    if wtch == 2 {
        let level0 = trail.level(lits[0].var());
        let level1 = trail.level(lits[1].var());
        if level0 > level1 {
            lits.swap(0, 1);
        }
    }

    let max_level = lits
        .iter()
        .map(|&lit| trail.level(lit.var()))
        .max()
        .unwrap_or(0);

    (wtch, max_level)
}

/// Run the psm/usefulness reduction pass (mode A), the default.
///
/// Returns the level the caller must cancel to, if a latent conflict or unit was uncovered while
/// rearranging a detached clause's literals (`None` if no cancellation is required).
pub fn reduce_psm(
    db: &mut ClauseDb,
    alloc: &mut ClauseAlloc,
    watchlists: &mut Watchlists,
    trail: &Trail,
    saved_polarity: impl Fn(Lit) -> bool,
    config: &SolverConfig,
    last_deviation: f64,
    stats: &mut ReduceStats,
    self_id: Option<usize>,
) -> Option<usize> {
    let mut found_latent = false;
    let mut backjump_in_red = trail.current_level();

    let learnts: Vec<ClauseRef> = db.learnt_clauses(alloc).collect();

    // First pass: judge usefulness and fix up detached clauses' watch candidates.
    for &cref in &learnts {
        let header = alloc.header(cref);
        let size = header.len();
        let lbd = header.lbd();

        if size <= 2 || is_locked(alloc, trail, cref) || header.used_since_last_reduce() {
            continue;
        }
        if !(lbd > 3 && lbd <= config.max_lbd) {
            continue;
        }

        let n_tmp = (size as f64 * last_deviation).floor() as usize + 2;
        let lits = alloc.clause(cref).lits();
        let cpt = lits
            .iter()
            .filter(|&&lit| saved_polarity(lit) == lit.is_positive())
            .count();
        let useful = cpt <= n_tmp;
        alloc.header_mut(cref).set_useful(useful);

        if !alloc.header(cref).attached() {
            let lits = alloc.clause_mut(cref).lits_mut();
            let (wtch, max_level) = rearrange_for_detach(lits, trail);
            if wtch < 2 {
                found_latent = true;
                backjump_in_red = backjump_in_red.min(max_level);
            } else {
                backjump_in_red = backjump_in_red.min(max_level);
            }
        }
    }

    // Second pass: sweep, following the exact used/useful/freeze conditions of §4.7(A).
    for &cref in &learnts {
        let header = alloc.header(cref);
        let size = header.len();

        if size <= 2 || is_locked(alloc, trail, cref) {
            alloc.header_mut(cref).set_used_since_last_reduce(true);
            continue;
        }

        let used_since_last_reduce = header.used_since_last_reduce();
        if !used_since_last_reduce {
            alloc.header_mut(cref).decrement_freeze();
        } else {
            alloc.header_mut(cref).set_freeze_left(config.max_freeze);
        }
        alloc.header_mut(cref).set_used_since_last_reduce(false);

        let header = alloc.header(cref);
        let freeze_exhausted = header.freeze_left() == 0;

        if !header.useful() || freeze_exhausted {
            if header.attached() {
                detach_clause(alloc, watchlists, cref);
            }

            let header = alloc.header(cref);
            if freeze_exhausted || header.lbd() > config.max_lbd {
                let generator = header.generator();
                let was_ever_used = header.used_once();
                let nb_attached = header.nb_attached();

                let is_import = match (self_id, generator) {
                    (Some(id), crate::clause::Generator::Worker(g)) => g != id,
                    (_, crate::clause::Generator::Unspecified) => true,
                    _ => false,
                };

                if is_import && !was_ever_used {
                    stats.imported_deleted_no_use += 1;
                }
                if nb_attached == 0 {
                    stats.never_attached += 1;
                }

                db.delete_clause(alloc, cref);
            }
        } else if !header.attached() {
            alloc.header_mut(cref).set_freeze_left(config.max_freeze);
            reattach_clause(alloc, watchlists, cref);
        }
    }

    stats.nb_reduce += 1;

    if found_latent {
        Some(backjump_in_red.saturating_sub(1))
    } else {
        None
    }
}

/// Run the activity-sort reduction pass (mode B), used when `usePsm` is disabled.
pub fn reduce_activity_sort(
    db: &mut ClauseDb,
    alloc: &mut ClauseAlloc,
    watchlists: &mut Watchlists,
    trail: &Trail,
    clause_activity: &ClauseActivity,
    stats: &mut ReduceStats,
) {
    let mut learnts: Vec<ClauseRef> = db.learnt_clauses(alloc).collect();
    if learnts.is_empty() {
        stats.nb_reduce += 1;
        return;
    }

    learnts.sort_unstable_by(|&a, &b| {
        let ha = alloc.header(a);
        let hb = alloc.header(b);
        let a_small = ha.len() <= 2;
        let b_small = hb.len() <= 2;
        match (a_small, b_small) {
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            _ => ha
                .activity()
                .partial_cmp(&hb.activity())
                .unwrap_or(std::cmp::Ordering::Equal),
        }
    });

    let half = learnts.len() / 2;
    let threshold = clause_activity.bump_value() / learnts.len().max(1) as f32;

    for (i, &cref) in learnts.iter().enumerate() {
        let header = alloc.header(cref);
        if header.len() <= 2 || is_locked(alloc, trail, cref) {
            continue;
        }

        if i < half || header.activity() < threshold {
            if header.attached() {
                detach_clause(alloc, watchlists, cref);
            }

            let header = alloc.header(cref);
            let nb_attached = header.nb_attached();
            if nb_attached == 0 {
                stats.never_attached += 1;
            }

            db.delete_clause(alloc, cref);
        }
    }

    stats.nb_reduce += 1;
}

fn detach_clause(alloc: &mut ClauseAlloc, watchlists: &mut Watchlists, cref: ClauseRef) {
    alloc.header_mut(cref).set_attached(false);
    watchlists.retain(|c| c != cref);
}

fn reattach_clause(alloc: &mut ClauseAlloc, watchlists: &mut Watchlists, cref: ClauseRef) {
    let lits = alloc.clause(cref).lits();
    let watch = [lits[0], lits[1]];
    watchlists.watch_clause(cref, watch);

    let header = alloc.header_mut(cref);
    header.set_attached(true);
    let nb_attached = header.nb_attached();
    header.set_nb_attached(nb_attached + 1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::{ClauseHeader, Generator};

    #[test]
    fn locked_clauses_survive_mode_a() {
        let mut alloc = ClauseAlloc::new();
        let mut db = ClauseDb::new();
        let db = &mut db;
        let mut watchlists = Watchlists::default();
        let mut trail = Trail::default();

        trail.set_var_count(4);
        watchlists.set_var_count(4);

        let lits = psat_formula::lits![1, 2, 3, 4];
        let mut header = ClauseHeader::new();
        header.set_learnt(true);
        header.set_lbd(4);
        header.set_generator(Generator::Worker(0));
        let cref = db.add_clause(&mut alloc, header, &lits);
        watchlists.watch_clause(cref, [lits[0], lits[1]]);
        alloc.header_mut(cref).set_attached(true);

        crate::trail::enqueue_assignment(&mut trail, lits[0], Reason::Clause(cref));

        let config = SolverConfig::default();
        let mut stats = ReduceStats::default();

        reduce_psm(
            db,
            &mut alloc,
            &mut watchlists,
            &trail,
            |_| false,
            &config,
            0.1,
            &mut stats,
            Some(0),
        );

        assert!(alloc.header(cref).attached());
        assert_eq!(stats.nb_reduce, 1);
    }
}

//! The inner two-watched-literal unit propagation loop.
use psat_formula::Lit;

use crate::clause::ClauseRef;
use crate::trail::{enqueue_assignment, Conflict, Reason, Trail};
use crate::watch::{Watch, Watchlists};

/// Decay factor for the agility estimate, see [`propagate`].
const AGILITY_DECAY: f32 = 0.9999;

/// Propagate all currently enqueued facts.
///
/// Drains the trail's propagation queue, examining the watch lists of each newly assigned literal
/// in turn. Returns the first conflicting clause encountered, if any. `on_reasserted` is called
/// for every learnt clause found propagating with an LBD greater than 3, so a caller can recompute
/// and possibly shrink its LBD and re-export it.
pub fn propagate(
    watchlists: &mut Watchlists,
    alloc: &mut crate::clause::ClauseAlloc,
    trail: &mut Trail,
    agility: &mut f32,
    mut on_reasserted: impl FnMut(ClauseRef),
) -> Result<(), Conflict> {
    while let Some(lit) = trail.pop_queue() {
        if let Err(conflict) = propagate_literal(watchlists, alloc, trail, agility, lit, &mut on_reasserted) {
            return Err(conflict);
        }
    }
    Ok(())
}

/// Propagate all literals implied by clauses watched by the given literal.
///
/// See [`crate::watch`] for the invariants this upholds.
fn propagate_literal(
    watchlists: &mut Watchlists,
    alloc: &mut crate::clause::ClauseAlloc,
    trail: &mut Trail,
    agility: &mut f32,
    lit: Lit,
    on_reasserted: &mut impl FnMut(ClauseRef),
) -> Result<(), Conflict> {
    let false_lit = !lit;

    let mut list = std::mem::take(watchlists.watched_by_mut(lit));
    let mut write = 0;
    let mut conflict = None;

    let mut i = 0;
    while i < list.len() {
        let watch = list[i];
        i += 1;

        if trail.lit_is_true(watch.blocking) {
            list[write] = watch;
            write += 1;
            continue;
        }

        let cref = watch.cref;
        let clause = alloc.clause_mut(cref);
        let lits = clause.lits_mut();
        if lits[0] == false_lit {
            lits.swap(0, 1);
        }
        debug_assert_eq!(lits[1], false_lit);
        let first = lits[0];

        if first != watch.blocking && trail.lit_is_true(first) {
            list[write] = Watch {
                cref,
                blocking: first,
            };
            write += 1;
            continue;
        }

        let mut found_new_watch = false;
        for k in 2..lits.len() {
            if !trail.lit_is_false(lits[k]) {
                lits.swap(1, k);
                found_new_watch = true;
                break;
            }
        }

        if found_new_watch {
            let new_watched = alloc.clause(cref).lits()[1];
            assert_ne!(!new_watched, lit);
            watchlists.add_watch(
                !new_watched,
                Watch {
                    cref,
                    blocking: first,
                },
            );
            continue;
        }

        // No non-false literal found to replace the watch: the clause is unit or conflicting.
        list[write] = Watch {
            cref,
            blocking: first,
        };
        write += 1;

        if trail.lit_is_false(first) {
            conflict = Some(Conflict { cref });
            while i < list.len() {
                list[write] = list[i];
                write += 1;
                i += 1;
            }
            break;
        } else {
            let header = alloc.header(cref);
            if header.learnt() && header.lbd() > 3 {
                on_reasserted(cref);
            }

            update_agility(agility, trail, first);
            enqueue_assignment(trail, first, Reason::Clause(cref));
        }
    }

    list.truncate(write);
    *watchlists.watched_by_mut(lit) = list;

    match conflict {
        Some(conflict) => Err(conflict),
        None => Ok(()),
    }
}

/// Update the agility estimate: a running average of how often propagated literals disagree with
/// their saved polarity.
fn update_agility(agility: &mut f32, trail: &Trail, propagated: Lit) {
    let disagreed = propagated.is_positive() == trail.last_var_value(propagated.var());
    let sample = if disagreed { 0.0 } else { 1.0 };
    *agility = *agility * AGILITY_DECAY + (1.0 - AGILITY_DECAY) * sample;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::{ClauseAlloc, ClauseHeader};
    use crate::trail::enqueue_assignment;
    use psat_formula::lits;

    #[test]
    fn propagates_unit() {
        let mut alloc = ClauseAlloc::new();
        let mut watchlists = Watchlists::default();
        let mut trail = Trail::default();
        let mut agility = 0.0f32;

        trail.set_var_count(3);
        watchlists.set_var_count(3);

        let clause = lits![1, 2, 3];
        let cref = alloc.add_clause(ClauseHeader::new(), &clause);
        watchlists.watch_clause(cref, [clause[0], clause[1]]);

        trail.new_decision_level();
        enqueue_assignment(&mut trail, !clause[0], Reason::Unit);
        trail.new_decision_level();
        enqueue_assignment(&mut trail, !clause[1], Reason::Unit);

        let result = propagate(&mut watchlists, &mut alloc, &mut trail, &mut agility, |_| {});

        assert!(result.is_ok());
        assert!(trail.lit_is_true(clause[2]));
    }

    #[test]
    fn detects_conflict() {
        let mut alloc = ClauseAlloc::new();
        let mut watchlists = Watchlists::default();
        let mut trail = Trail::default();
        let mut agility = 0.0f32;

        trail.set_var_count(3);
        watchlists.set_var_count(3);

        let clause = lits![1, 2, 3];
        let cref = alloc.add_clause(ClauseHeader::new(), &clause);
        watchlists.watch_clause(cref, [clause[0], clause[1]]);

        trail.new_decision_level();
        enqueue_assignment(&mut trail, !clause[0], Reason::Unit);
        trail.new_decision_level();
        enqueue_assignment(&mut trail, !clause[1], Reason::Unit);
        trail.new_decision_level();
        enqueue_assignment(&mut trail, !clause[2], Reason::Unit);

        let result = propagate(&mut watchlists, &mut alloc, &mut trail, &mut agility, |_| {});

        assert_eq!(result, Err(Conflict { cref }));
    }
}

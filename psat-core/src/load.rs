//! Loading a formula (or a single imported/learnt clause) into a worker's clause storage.
use psat_formula::Lit;

use crate::clause::{ClauseAlloc, ClauseDb, ClauseHeader, Generator};
use crate::tmp::TmpData;
use crate::trail::{enqueue_assignment, Reason, Trail};
use crate::watch::Watchlists;

/// Outcome of [`load_clause`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LoadResult {
    /// The clause contained a complementary pair of literals and was discarded.
    Tautological,
    /// The clause was already satisfied by the current (level 0) assignment.
    Satisfied,
    /// After removing falsified literals nothing remained: the formula is unsatisfiable.
    Unsat,
    /// The clause simplified to a single literal, now enqueued (not yet propagated).
    Unit,
    /// The clause was added to the arena and attached.
    Added,
}

/// Add a clause to the current formula.
///
/// Removes duplicate literals, discards tautological clauses (e.g. `x v -x v y`), drops literals
/// already falsified at level 0, and dispatches among unit, binary and longer clauses. Binary
/// clauses are stored and watched exactly like longer clauses; there is no separate binary clause
/// list.
///
/// Only valid to call while at decision level 0. Does not adjust the solver's variable count;
/// that must happen first.
pub fn load_clause(
    alloc: &mut ClauseAlloc,
    db: &mut ClauseDb,
    watchlists: &mut Watchlists,
    trail: &mut Trail,
    tmp: &mut TmpData,
    generator: Generator,
    lits: &[Lit],
) -> LoadResult {
    debug_assert_eq!(trail.current_level(), 0);

    tmp.lits.clear();
    tmp.lits.extend_from_slice(lits);
    tmp.lits.sort_unstable();
    tmp.lits.dedup();

    let mut last = None;
    for &lit in tmp.lits.iter() {
        if last == Some(!lit) {
            return LoadResult::Tautological;
        }
        last = Some(lit);
    }

    let mut simplified = Vec::with_capacity(tmp.lits.len());
    for &lit in tmp.lits.iter() {
        match trail.lit_value(lit) {
            Some(true) => return LoadResult::Satisfied,
            Some(false) => (),
            None => simplified.push(lit),
        }
    }

    match simplified[..] {
        [] => LoadResult::Unsat,
        [lit] => {
            enqueue_assignment(trail, lit, Reason::Unit);
            LoadResult::Unit
        }
        _ => {
            let mut header = ClauseHeader::new();
            header.set_generator(generator);
            let cref = db.add_clause(alloc, header, &simplified);

            let lits = alloc.clause(cref).lits();
            watchlists.watch_clause(cref, [lits[0], lits[1]]);
            alloc.header_mut(cref).set_attached(true);
            let nb_attached = alloc.header(cref).nb_attached();
            alloc.header_mut(cref).set_nb_attached(nb_attached + 1);

            LoadResult::Added
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vsids::Vsids;
    use psat_formula::lits;

    fn fixture() -> (ClauseAlloc, ClauseDb, Watchlists, Trail, TmpData) {
        let mut trail = Trail::default();
        let mut watchlists = Watchlists::default();
        let mut vsids = Vsids::default();
        trail.set_var_count(10);
        watchlists.set_var_count(10);
        vsids.set_var_count(10);
        (
            ClauseAlloc::new(),
            ClauseDb::new(),
            watchlists,
            trail,
            TmpData::default(),
        )
    }

    #[test]
    fn unsat_on_empty_clause() {
        let (mut alloc, mut db, mut watchlists, mut trail, mut tmp) = fixture();
        let result = load_clause(
            &mut alloc,
            &mut db,
            &mut watchlists,
            &mut trail,
            &mut tmp,
            Generator::Original,
            &[],
        );
        assert_eq!(result, LoadResult::Unsat);
    }

    #[test]
    fn unit_clauses() {
        let (mut alloc, mut db, mut watchlists, mut trail, mut tmp) = fixture();

        let result = load_clause(
            &mut alloc,
            &mut db,
            &mut watchlists,
            &mut trail,
            &mut tmp,
            Generator::Original,
            &lits![1],
        );
        assert_eq!(result, LoadResult::Unit);
        assert_eq!(trail.trail().len(), 1);

        let result = load_clause(
            &mut alloc,
            &mut db,
            &mut watchlists,
            &mut trail,
            &mut tmp,
            Generator::Original,
            &lits![3, -3],
        );
        assert_eq!(result, LoadResult::Tautological);

        let result = load_clause(
            &mut alloc,
            &mut db,
            &mut watchlists,
            &mut trail,
            &mut tmp,
            Generator::Original,
            &lits![1],
        );
        assert_eq!(result, LoadResult::Satisfied);
    }

    #[test]
    fn long_clauses() {
        let (mut alloc, mut db, mut watchlists, mut trail, mut tmp) = fixture();

        let result = load_clause(
            &mut alloc,
            &mut db,
            &mut watchlists,
            &mut trail,
            &mut tmp,
            Generator::Original,
            &lits![1, 2, 3],
        );
        assert_eq!(result, LoadResult::Added);
        assert_eq!(db.count_irred(), 1);

        let result = load_clause(
            &mut alloc,
            &mut db,
            &mut watchlists,
            &mut trail,
            &mut tmp,
            Generator::Original,
            &lits![-2, 3, 3, 4],
        );
        assert_eq!(result, LoadResult::Added);
        assert_eq!(db.count_irred(), 2);
    }
}

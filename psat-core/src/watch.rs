//! Watch index: for each literal, the watchers whose clause would need re-examining if that
//! literal became false.
//!
//! Each (binary or longer) clause has always two watches pointing to it. The watches are kept in
//! the watchlists of two different literals of the clause. Whenever the watches are moved to
//! different literals the literals of the clause are permuted so the watched literals are in
//! position 0 and 1.
//!
//! When a clause is not unit under the current assignment, the watched literals point at two
//! non-false literals. When a clause is unit and thus propagating, the true literal is watched and
//! in position 0, the other watched literal is the one with the largest decision level and kept in
//! position 1. When a clause becomes satisfied before becoming unit the watches can be kept as
//! they were.
//!
//! There is no need to update watchlists on backtracking, as unassigning variables cannot
//! invalidate the invariant.
//!
//! See [Section 4.5.1 of the "Handbook of Satisfiability"][handbook-ch4] for more details and
//! references.
//!
//! As a further optimization we use blocking literals. This means that each watch stores a literal
//! of the clause that is different from the watched literal. It can be the other watched literal
//! or any unwatched literal. When that literal is true, the clause is already satisfied, meaning
//! that no watches need to be updated. This can be detected by just looking at the watch, avoiding
//! access of the clause database. This variant was introduced by [Niklas Sörensson and Niklas Eén
//! in "MINISAT 2.1 and MINISAT++1.0 — SAT Race 2008 Editions"][minisat-2.1].
//!
//! [handbook-ch4]: https://www.satassociation.org/articles/FAIA185-0131.pdf
//! [minisat-2.1]: https://www.cril.univ-artois.fr/SAT09/solvers/booklet.pdf

use psat_formula::Lit;

use crate::clause::ClauseRef;

/// A watch on a clause.
#[derive(Copy, Clone)]
pub struct Watch {
    /// Clause which has the referring lit in position 0 or 1.
    pub cref: ClauseRef,
    /// A lit of the clause, different from the referring lit.
    pub blocking: Lit,
}

/// Watch index: per-literal lists of watchers, with lazy compaction driven by the write cursor
/// used during propagation.
#[derive(Default)]
pub struct Watchlists {
    /// Contains only valid data for indices of assigned variables.
    watches: Vec<Vec<Watch>>,
}

impl Watchlists {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.watches.resize(count * 2, vec![]);
    }

    /// Start watching a clause.
    ///
    /// `lits` have to be the first two literals of the given clause.
    pub fn watch_clause(&mut self, cref: ClauseRef, lits: [Lit; 2]) {
        for i in 0..2 {
            let watch = Watch {
                cref,
                blocking: lits[i ^ 1],
            };
            self.watches[(!lits[i]).code()].push(watch);
        }
    }

    /// Return watches for a given literal.
    pub fn watched_by_mut(&mut self, lit: Lit) -> &mut Vec<Watch> {
        &mut self.watches[lit.code()]
    }

    /// Make a literal watch a clause.
    pub fn add_watch(&mut self, lit: Lit, watch: Watch) {
        self.watches[lit.code()].push(watch)
    }

    /// Drop every watch referring to a clause, used when rebuilding watch lists wholesale (e.g.
    /// after garbage collection, or when freezing a clause).
    pub fn retain(&mut self, mut keep: impl FnMut(ClauseRef) -> bool) {
        for list in &mut self.watches {
            list.retain(|w| keep(w.cref));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::{ClauseAlloc, ClauseHeader};
    use psat_formula::{lit, lits};

    #[test]
    fn watch_and_retain() {
        let mut watches = Watchlists::default();
        watches.set_var_count(4);

        let mut alloc = ClauseAlloc::new();
        let cref = alloc.add_clause(ClauseHeader::new(), &lits![1, 2]);
        watches.watch_clause(cref, [lit!(1), lit!(2)]);

        assert_eq!(watches.watched_by_mut(lit!(-1)).len(), 1);
        assert_eq!(watches.watched_by_mut(lit!(-2)).len(), 1);

        watches.retain(|_| false);

        assert_eq!(watches.watched_by_mut(lit!(-1)).len(), 0);
        assert_eq!(watches.watched_by_mut(lit!(-2)).len(), 0);
    }
}

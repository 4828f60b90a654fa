//! Database for long clauses: original (irredundant) clauses and learnt clauses share one arena,
//! distinguished by the `learnt` header bit per the uniform clause record model.
use super::{header::HEADER_LEN, ClauseAlloc, ClauseHeader, ClauseRef};

use psat_formula::Lit;

/// A coarse classification of a clause, kept only for bookkeeping (counts, iteration order); it
/// is not a separate storage partition the way tiered solvers use the term.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Tier {
    Irred,
    Learnt,
}

/// Database for long (3+ literal) clauses.
///
/// Removal can be delayed: entries whose header has the deleted bit set are skipped by scans and
/// physically reclaimed on the next garbage collection.
#[derive(Default)]
pub struct ClauseDb {
    /// May contain deleted clauses, see above.
    clauses: Vec<ClauseRef>,
    irred_count: usize,
    learnt_count: usize,
    /// Size of deleted but not collected clauses, in [`LitIdx`](psat_formula::LitIdx) words.
    garbage_size: usize,
}

impl ClauseDb {
    pub fn new() -> ClauseDb {
        ClauseDb::default()
    }

    /// Add a long clause to the database.
    pub fn add_clause(&mut self, alloc: &mut ClauseAlloc, header: ClauseHeader, lits: &[Lit]) -> ClauseRef {
        let learnt = header.learnt();
        let cref = alloc.add_clause(header, lits);

        self.clauses.push(cref);
        if learnt {
            self.learnt_count += 1;
        } else {
            self.irred_count += 1;
        }

        cref
    }

    /// Mark a long clause for deletion.
    pub fn delete_clause(&mut self, alloc: &mut ClauseAlloc, cref: ClauseRef) {
        let header = alloc.header_mut(cref);

        debug_assert!(!header.deleted(), "delete_clause for already deleted clause");

        header.set_deleted(true);
        header.set_attached(false);

        if header.learnt() {
            self.learnt_count -= 1;
        } else {
            self.irred_count -= 1;
        }

        self.garbage_size += header.len() + HEADER_LEN;
    }

    pub fn count_irred(&self) -> usize {
        self.irred_count
    }

    pub fn count_learnt(&self) -> usize {
        self.learnt_count
    }

    pub fn garbage_size(&self) -> usize {
        self.garbage_size
    }

    /// All (possibly deleted) clause references currently tracked, in insertion order.
    pub fn clauses(&self) -> &[ClauseRef] {
        &self.clauses
    }

    /// References to all non-deleted learnt clauses, in insertion order.
    pub fn learnt_clauses<'a>(&'a self, alloc: &'a ClauseAlloc) -> impl Iterator<Item = ClauseRef> + 'a {
        self.clauses
            .iter()
            .copied()
            .filter(move |&cref| {
                let header = alloc.header(cref);
                !header.deleted() && header.learnt()
            })
    }

    /// Whether a garbage collection is due given the current amount of deleted space.
    pub fn garbage_collection_due(&self, alloc: &ClauseAlloc) -> bool {
        self.garbage_size * 2 > alloc.buffer_size()
    }

    /// Unconditionally relocate all live clauses into a fresh, compacted allocation.
    ///
    /// `relocate_reason` is invoked for every live clause that is currently the reason for an
    /// assigned literal (identified by `is_reason`), so the caller can update its own reference
    /// after clauses move.
    pub fn collect_garbage_now(
        &mut self,
        alloc: &mut ClauseAlloc,
        mut is_reason: impl FnMut(ClauseRef) -> bool,
        mut relocate_reason: impl FnMut(ClauseRef, ClauseRef),
    ) {
        assert!(
            self.garbage_size <= alloc.buffer_size(),
            "inconsistent garbage tracking in ClauseDb"
        );
        let current_size = alloc.buffer_size() - self.garbage_size;

        // Overallocate to avoid an immediate regrow when new clauses are learned right after GC.
        let mut new_alloc = ClauseAlloc::with_capacity(current_size * 2);
        let mut new_clauses = Vec::with_capacity(self.clauses.len());

        for &cref in self.clauses.iter() {
            let clause = alloc.clause(cref);
            if clause.header().deleted() {
                continue;
            }
            let header = clause.header().clone();
            let was_reason = is_reason(cref);

            let new_cref = new_alloc.add_clause(header, clause.lits());
            new_clauses.push(new_cref);

            if was_reason {
                relocate_reason(cref, new_cref);
            }
        }

        *alloc = new_alloc;
        self.clauses = new_clauses;
        self.garbage_size = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use psat_formula::cnf::strategy::*;

    use proptest::*;

    #[test]
    fn counts_and_deletes() {
        let mut alloc = ClauseAlloc::new();
        let mut db = ClauseDb::new();

        let clauses: [&[_]; 4] = [
            &psat_formula::lits![1, 2, 3],
            &psat_formula::lits![4, -5, 6],
            &psat_formula::lits![-2, 3, -4],
            &psat_formula::lits![-3, 5, 2],
        ];

        let mut crefs = vec![];
        for (i, lits) in clauses.iter().enumerate() {
            let mut header = ClauseHeader::new();
            header.set_learnt(i >= 1);
            crefs.push(db.add_clause(&mut alloc, header, lits));
        }

        assert_eq!(db.count_irred(), 1);
        assert_eq!(db.count_learnt(), 3);

        db.delete_clause(&mut alloc, crefs[1]);
        db.delete_clause(&mut alloc, crefs[3]);

        assert_eq!(db.count_learnt(), 1);
        assert!(db.garbage_size() > 0);
    }

    proptest! {
        #[test]
        fn garbage_collection(
            input_a in cnf_formula(1..100usize, 500..1000, 3..30),
            input_b in cnf_formula(1..100usize, 0..500, 3..30),
        ) {
            let mut alloc = ClauseAlloc::new();
            let mut db = ClauseDb::new();

            let mut crefs_a = vec![];
            let mut crefs_b = vec![];

            for lits in input_a.iter() {
                let header = ClauseHeader::new();
                crefs_a.push(db.add_clause(&mut alloc, header, lits));
            }

            for lits in input_b.iter() {
                let header = ClauseHeader::new();
                crefs_b.push(db.add_clause(&mut alloc, header, lits));
            }

            for cref in crefs_a {
                db.delete_clause(&mut alloc, cref);
            }

            prop_assert!(db.garbage_size() > 0);

            db.collect_garbage_now(&mut alloc, |_| false, |_, _| {});

            prop_assert_eq!(db.garbage_size(), 0);

            for (lits, &cref) in input_b.iter().zip(db.clauses().iter()) {
                prop_assert_eq!(alloc.clause(cref).lits(), lits);
            }
        }
    }
}

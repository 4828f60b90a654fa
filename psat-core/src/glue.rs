//! Compute glue levels of clauses.
//!
//! The glue level of a propagating clause is the number of distinct decision levels of the clause's
//! variables. This is also called the literal block distance (LBD). For each clause the smallest
//! glue level observed is used as an indicator of how useful that clause is.

use psat_formula::{Lit, Var};

/// Compute the glue level of a clause.
///
/// `flags` is scratch space sized to at least the number of decision levels in use; it is
/// restored to all-`false` before returning. `level_of` resolves a variable to the decision level
/// it was assigned at.
pub fn compute_glue(flags: &mut [bool], level_of: impl Fn(Var) -> usize, lits: &[Lit]) -> usize {
    let mut glue = 0;

    for &lit in lits {
        let level = level_of(lit.var());
        let flag = &mut flags[level];
        if !*flag {
            *flag = true;
            glue += 1
        }
    }

    for &lit in lits {
        let level = level_of(lit.var());
        flags[level] = false;
    }

    glue
}

#[cfg(test)]
mod tests {
    use super::*;
    use psat_formula::lits;

    #[test]
    fn counts_distinct_levels() {
        let levels = [0usize, 1, 1, 2, 2, 2];
        let mut flags = vec![false; 8];
        let clause = lits![1, -2, 3, -4, 5, -6];

        let glue = compute_glue(&mut flags, |v| levels[v.index()], &clause);

        assert_eq!(glue, 3);
        assert!(flags.iter().all(|&f| !f));
    }
}

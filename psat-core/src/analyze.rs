//! Learns a new clause by analyzing a conflict.
use std::mem::swap;

use psat_formula::{Lit, Var};

use crate::clause::ClauseRef;
use crate::trail::{Conflict, Reason, Trail};
use crate::vec_mut_scan::VecMutScan;
use crate::vsids::Vsids;

/// Resolve the literals responsible for a conflict or a propagation.
///
/// `Conflict`'s clause has the full literal set; a `Reason::Clause` only exposes the literals
/// after the propagated one, since that one is implied rather than part of the justification.
fn conflict_lits<'a>(alloc: &'a crate::clause::ClauseAlloc, conflict: Conflict) -> &'a [Lit] {
    alloc.clause(conflict.cref).lits()
}

fn reason_lits<'a>(alloc: &'a crate::clause::ClauseAlloc, reason: Reason) -> &'a [Lit] {
    match reason {
        Reason::Unit => &[],
        Reason::Clause(cref) => &alloc.clause(cref).lits()[1..],
    }
}

/// Temporaries for conflict analysis, reused across conflicts to avoid reallocating.
#[derive(Default)]
pub struct AnalyzeConflict {
    /// The learned clause after analysis finishes.
    clause: Vec<Lit>,
    /// Number of literals in the current clause at the current decision level.
    current_level_count: usize,
    /// Variables in the current clause (plus variables visited during minimization).
    var_flags: Vec<bool>,
    /// Entries to clean in `var_flags` once analysis finishes.
    to_clean: Vec<Var>,
    /// Long clauses whose activity should be bumped.
    involved: Vec<ClauseRef>,
    /// Stack for recursive minimization.
    stack: Vec<Lit>,
}

impl AnalyzeConflict {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.var_flags.resize(count, false);
    }

    /// The learned clause. `clause[0]` is the asserting literal.
    pub fn clause(&self) -> &[Lit] {
        &self.clause
    }

    /// Long clauses involved in the conflict, to have their activity bumped.
    pub fn involved(&self) -> &[ClauseRef] {
        &self.involved
    }
}

/// Learns a new clause by analyzing a conflict.
///
/// Returns the lowest decision level that makes the learned clause asserting (the backjump
/// level).
pub fn analyze_conflict(
    analyze: &mut AnalyzeConflict,
    vsids: &mut Vsids,
    alloc: &crate::clause::ClauseAlloc,
    trail: &Trail,
    conflict: Conflict,
) -> usize {
    analyze.clause.clear();
    analyze.involved.clear();
    analyze.current_level_count = 0;

    let conflict_lits = conflict_lits(alloc, conflict);

    if trail.current_level() == 0 {
        // Conflict with no decisions: the empty clause is implied.
        return 0;
    }

    for &lit in conflict_lits {
        add_literal(analyze, vsids, trail, lit);
    }

    analyze.involved.push(conflict.cref);

    // To get rid of all but one literal of the current level, resolve the clause with the reason
    // for those literals, in reverse chronological order.
    for &lit in trail.trail().iter().rev() {
        let lit_present = &mut analyze.var_flags[lit.index()];
        if !*lit_present {
            continue;
        }
        *lit_present = false;
        analyze.current_level_count -= 1;
        if analyze.current_level_count == 0 {
            // lit is the last literal of the current level present in the current clause, so the
            // resulting clause asserts !lit: put it in position 0.
            analyze.clause.push(!lit);
            let end = analyze.clause.len() - 1;
            analyze.clause.swap(0, end);
            break;
        }

        let reason = trail.reason(lit.var());
        let lits = reason_lits(alloc, reason);

        for &lit in lits {
            add_literal(analyze, vsids, trail, lit);
        }

        if let Reason::Clause(cref) = reason {
            analyze.involved.push(cref);
        }
    }

    // Requires var_flags set for exactly the clause's variables. Sets more flags, listed in
    // to_clean.
    minimize_clause(analyze, alloc, trail);

    for var in analyze.to_clean.drain(..) {
        analyze.var_flags[var.index()] = false;
    }

    // Find the highest level literal besides the asserted one and move it into position 1. This
    // keeps the watch invariant valid after backtracking.
    let mut backtrack_to = 0;

    if analyze.clause.len() > 1 {
        let (prefix, rest) = analyze.clause.split_at_mut(2);
        let lit_1 = &mut prefix[1];
        backtrack_to = trail.level(lit_1.var());
        for lit in rest.iter_mut() {
            let lit_level = trail.level(lit.var());
            if lit_level > backtrack_to {
                backtrack_to = lit_level;
                swap(lit_1, lit);
            }
        }
    }

    vsids.decay();

    backtrack_to
}

/// Add a literal to the current clause.
fn add_literal(analyze: &mut AnalyzeConflict, vsids: &mut Vsids, trail: &Trail, lit: Lit) {
    let lit_level = trail.level(lit.var());
    // No need to add literals set by unit clauses, or already present.
    if lit_level > 0 && !analyze.var_flags[lit.index()] {
        vsids.bump(lit.var());

        analyze.var_flags[lit.index()] = true;
        if lit_level == trail.current_level() {
            analyze.current_level_count += 1;
        } else {
            analyze.clause.push(lit);
            analyze.to_clean.push(lit.var());
        }
    }
}

/// A Bloom filter of decision levels.
#[derive(Default)]
struct LevelAbstraction {
    bits: u64,
}

impl LevelAbstraction {
    pub fn add(&mut self, level: usize) {
        self.bits |= 1 << (level % 64)
    }

    pub fn test(&self, level: usize) -> bool {
        self.bits & (1 << (level % 64)) != 0
    }
}

/// Performs recursive clause minimization.
///
/// Requires `var_flags` to be set for exactly the variables of the unminimized clause. Sets more
/// flags during the search, listed in `to_clean`.
///
/// This removes redundant literals of the learned clause: literals already implied by other
/// literals of the clause. For each literal (apart from the asserting one) this performs a DFS in
/// the implication graph (following edges in reverse). The search stops expanding a literal
/// already known to be implied by the clause's literals. When a decision literal not in the
/// clause is found, the literal being tested is not redundant.
///
/// Two optimizations are used. First, the search aborts as soon as a literal of a decision level
/// not present in the clause is found (checked approximately via a Bloom filter over the clause's
/// decision levels), since the DFS would eventually reach that level's decision anyway. Second,
/// `var_flags` doubles as the already-visited marker during the DFS, so a redundant literal's
/// dependencies are never re-expanded by later searches.
fn minimize_clause(
    analyze: &mut AnalyzeConflict,
    alloc: &crate::clause::ClauseAlloc,
    trail: &Trail,
) {
    let mut involved_levels = LevelAbstraction::default();

    for &lit in analyze.clause.iter() {
        involved_levels.add(trail.level(lit.var()));
    }

    let mut scan = VecMutScan::new(&mut analyze.clause);

    // Always keep the first (asserting) literal.
    scan.next();

    'next_lit: while let Some(lit) = scan.next() {
        if trail.reason(lit.var()) == Reason::Unit {
            continue;
        }

        analyze.stack.clear();
        analyze.stack.push(!*lit);

        // Remember which var_flags are set during this DFS, to roll back if it fails.
        let top = analyze.to_clean.len();

        while let Some(lit) = analyze.stack.pop() {
            let reason = trail.reason(lit.var());
            let lits = reason_lits(alloc, reason);

            for &reason_lit in lits {
                let reason_level = trail.level(reason_lit.var());

                if !analyze.var_flags[reason_lit.index()] && reason_level > 0 {
                    if trail.reason(reason_lit.var()) == Reason::Unit
                        || !involved_levels.test(reason_level)
                    {
                        // reason_lit is a decision not in the clause, or at a decision level known
                        // not to be in the clause: abort the search.
                        for lit in analyze.to_clean.drain(top..) {
                            analyze.var_flags[lit.index()] = false;
                        }
                        continue 'next_lit;
                    } else {
                        analyze.var_flags[reason_lit.index()] = true;
                        analyze.to_clean.push(reason_lit.var());
                        analyze.stack.push(!reason_lit);
                    }
                }
            }
        }

        lit.remove();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::{ClauseAlloc, ClauseHeader};
    use crate::trail::enqueue_assignment;
    use psat_formula::lits;

    #[test]
    fn analyzes_simple_conflict() {
        let mut alloc = ClauseAlloc::new();
        let mut trail = Trail::default();
        let mut vsids = Vsids::default();
        let mut analyze = AnalyzeConflict::default();

        trail.set_var_count(3);
        vsids.set_var_count(3);
        analyze.set_var_count(3);

        let conflict_clause = lits![1, 2, 3];
        let cref = alloc.add_clause(ClauseHeader::new(), &conflict_clause);

        trail.new_decision_level();
        enqueue_assignment(&mut trail, !conflict_clause[0], Reason::Unit);
        trail.new_decision_level();
        enqueue_assignment(&mut trail, !conflict_clause[1], Reason::Unit);
        trail.new_decision_level();
        enqueue_assignment(&mut trail, !conflict_clause[2], Reason::Unit);

        let backtrack_to = analyze_conflict(
            &mut analyze,
            &mut vsids,
            &alloc,
            &trail,
            Conflict { cref },
        );

        // All three literals are decisions at distinct levels: the 1-UIP clause is the conflict
        // clause itself and we backjump to the second-highest decision level.
        assert_eq!(analyze.clause().len(), 3);
        assert_eq!(backtrack_to, 2);
    }
}

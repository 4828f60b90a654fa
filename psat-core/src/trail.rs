//! Trail & decision state: the assignment stack, per-variable `{value, reason, level}` and the
//! decision-level boundary index.
use psat_formula::{Lit, LitIdx, Var};

use crate::clause::ClauseRef;
use crate::vsids::Vsids;

/// Assignments that caused a propagation, or the absence of one.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Reason {
    /// A decision, or a unit clause satisfied at level 0.
    Unit,
    /// The clause that propagated this literal. The propagated literal is kept at position 0.
    Clause(ClauseRef),
}

impl Reason {
    pub fn is_unit(&self) -> bool {
        matches!(self, Reason::Unit)
    }
}

/// A clause, or pair of literals, responsible for the empty clause.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Conflict {
    pub cref: ClauseRef,
}

#[derive(Copy, Clone)]
struct VarData {
    reason: Reason,
    level: LitIdx,
}

impl Default for VarData {
    fn default() -> VarData {
        VarData {
            reason: Reason::Unit,
            level: 0,
        }
    }
}

/// This compares two `Option<bool>` values as bytes. Workaround for bad code generation.
fn fast_option_eq(a: Option<bool>, b: Option<bool>) -> bool {
    unsafe { std::mem::transmute::<_, u8>(a) == std::mem::transmute::<_, u8>(b) }
}

/// Current partial assignment, decision/propagation history and implication graph.
#[derive(Default)]
pub struct Trail {
    assignment: Vec<Option<bool>>,
    last_value: Vec<bool>,
    /// Valid only for indices of assigned variables.
    var_data: Vec<VarData>,
    /// Stack of all propagated and enqueued assignments.
    trail: Vec<Lit>,
    /// Next assignment in trail to propagate.
    queue_head_pos: usize,
    /// Decision levels as trail indices.
    decisions: Vec<LitIdx>,
    /// Number of unit clauses removed from the trail (after a `clear`).
    units_removed: usize,
}

impl Trail {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.assignment.resize(count, None);
        self.last_value.resize(count, false);
        self.var_data.resize(count, VarData::default());
    }

    /// Value assigned to a variable.
    pub fn var_value(&self, var: Var) -> Option<bool> {
        self.assignment[var.index()]
    }

    /// Value last assigned to a variable, used for phase saving.
    ///
    /// If the variable is currently assigned this returns the previously assigned value. If the
    /// variable was never assigned this returns false.
    pub fn last_var_value(&self, var: Var) -> bool {
        self.last_value[var.index()]
    }

    /// Value assigned to a literal.
    pub fn lit_value(&self, lit: Lit) -> Option<bool> {
        self.assignment[lit.index()].map(|b| b ^ lit.is_negative())
    }

    pub fn lit_is_true(&self, lit: Lit) -> bool {
        fast_option_eq(self.assignment[lit.index()], Some(lit.is_positive()))
    }

    pub fn lit_is_false(&self, lit: Lit) -> bool {
        fast_option_eq(self.assignment[lit.index()], Some(lit.is_negative()))
    }

    pub fn lit_is_unk(&self, lit: Lit) -> bool {
        fast_option_eq(self.assignment[lit.index()], None)
    }

    /// The reason for an assigned variable.
    ///
    /// Returns stale data if the variable isn't assigned.
    pub fn reason(&self, var: Var) -> Reason {
        self.var_data[var.index()].reason
    }

    /// The decision level an assigned variable was set at.
    ///
    /// Returns stale data if the variable isn't assigned.
    pub fn level(&self, var: Var) -> usize {
        self.var_data[var.index()].level as usize
    }

    /// Updates the reason for an assigned variable.
    ///
    /// Used when an imported clause subsumes the current reason for one of its literals.
    pub fn update_reason(&mut self, var: Var, reason: Reason) {
        self.var_data[var.index()].reason = reason;
    }

    /// Return the next assigned literal to propagate.
    pub fn queue_head(&self) -> Option<Lit> {
        self.trail.get(self.queue_head_pos).cloned()
    }

    /// Return the next assigned literal to propagate and remove it from the queue.
    pub fn pop_queue(&mut self) -> Option<Lit> {
        let head = self.queue_head();
        if head.is_some() {
            self.queue_head_pos += 1;
        }
        head
    }

    /// Assigned literals in assignment order.
    pub fn trail(&self) -> &[Lit] {
        &self.trail
    }

    /// Start a new decision level.
    ///
    /// Does not enqueue the decision itself.
    pub fn new_decision_level(&mut self) {
        self.decisions.push(self.trail.len() as LitIdx)
    }

    /// Current decision level.
    pub fn current_level(&self) -> usize {
        self.decisions.len()
    }

    /// The number of assignments at level 0.
    pub fn top_level_assignment_count(&self) -> usize {
        self.decisions
            .get(0)
            .map(|&len| len as usize)
            .unwrap_or(self.trail.len())
            + self.units_removed
    }

    /// Whether all assignments are processed.
    pub fn fully_propagated(&self) -> bool {
        self.queue_head_pos == self.trail.len()
    }
}

/// Enqueues the assignment of true to a literal.
///
/// This updates the assignment and trail, but does not perform any propagation. The literal has
/// to be unassigned when calling this.
pub fn enqueue_assignment(trail: &mut Trail, lit: Lit, reason: Reason) {
    debug_assert!(trail.lit_value(lit) == None);

    trail.assignment[lit.index()] = lit.is_positive().into();
    trail.trail.push(lit);

    let data = &mut trail.var_data[lit.index()];
    data.reason = reason;
    data.level = trail.decisions.len() as LitIdx;
}

/// Undo all assignments in decision levels deeper than the given level.
pub fn backtrack(trail: &mut Trail, vsids: &mut Vsids, level: usize) {
    if level == trail.decisions.len() {
        return;
    }

    let new_trail_len = trail.decisions[level] as usize;

    trail.queue_head_pos = new_trail_len;
    trail.decisions.truncate(level);

    let trail_end = &trail.trail[new_trail_len..];
    for &lit in trail_end {
        vsids.make_available(lit.var());
        let var_assignment = &mut trail.assignment[lit.index()];
        trail.last_value[lit.index()] = *var_assignment == Some(true);
        *var_assignment = None;
    }
    trail.trail.truncate(new_trail_len);
}

#[cfg(test)]
mod tests {
    use super::*;
    use psat_formula::lit;

    #[test]
    fn assign_and_backtrack() {
        let mut trail = Trail::default();
        let mut vsids = Vsids::default();
        trail.set_var_count(4);
        vsids.set_var_count(4);

        trail.new_decision_level();
        enqueue_assignment(&mut trail, lit!(1), Reason::Unit);
        trail.new_decision_level();
        enqueue_assignment(&mut trail, lit!(-2), Reason::Unit);

        assert_eq!(trail.current_level(), 2);
        assert!(trail.lit_is_true(lit!(1)));
        assert!(trail.lit_is_false(lit!(2)));

        backtrack(&mut trail, &mut vsids, 1);

        assert_eq!(trail.current_level(), 1);
        assert!(trail.lit_is_true(lit!(1)));
        assert!(trail.lit_is_unk(lit!(2)));
        assert_eq!(trail.last_var_value(psat_formula::var!(2)), false);
    }
}

//! Clause activity bumping and decay, used by the activity-sort reduction policy.
use super::{ClauseAlloc, ClauseDb, ClauseRef};

/// Per-worker bump/decay state for clause activities.
///
/// Individual clause activities live in the clause header; this only tracks the shared bump
/// increment and its decay, mirroring how variable activity (VSIDS) is tracked.
pub struct ClauseActivity {
    bump: f32,
    inv_decay: f32,
}

impl ClauseActivity {
    pub fn new(decay: f32) -> ClauseActivity {
        ClauseActivity {
            bump: 1.0,
            inv_decay: 1.0 / decay,
        }
    }

    pub fn set_decay(&mut self, decay: f32) {
        assert!(decay < 1.0 && decay > 1.0 / 16.0);
        self.inv_decay = 1.0 / decay;
    }

    /// Current bump increment, used by the activity-sort reduction policy to derive a deletion
    /// threshold relative to the number of learnt clauses.
    pub fn bump_value(&self) -> f32 {
        self.bump
    }
}

impl Default for ClauseActivity {
    fn default() -> ClauseActivity {
        ClauseActivity::new(0.999)
    }
}

fn rescale_limit() -> f32 {
    std::f32::MAX / 16.0
}

/// Increase a clause's activity, rescaling all activities if it would overflow.
pub fn bump_clause_activity(
    activity: &mut ClauseActivity,
    db: &ClauseDb,
    alloc: &mut ClauseAlloc,
    cref: ClauseRef,
) {
    let header = alloc.header_mut(cref);
    let bumped = header.activity() + activity.bump;
    header.set_activity(bumped);

    if bumped > rescale_limit() {
        rescale_clause_activities(activity, db, alloc);
    }
}

fn rescale_clause_activities(activity: &mut ClauseActivity, db: &ClauseDb, alloc: &mut ClauseAlloc) {
    let rescale_factor = 1.0 / rescale_limit();

    for &cref in db.clauses() {
        let header = alloc.header_mut(cref);
        if !header.deleted() {
            header.set_activity(header.activity() * rescale_factor);
        }
    }
    activity.bump *= rescale_factor;
}

/// Decay the shared clause activity bump increment.
pub fn decay_clause_activities(activity: &mut ClauseActivity, db: &ClauseDb, alloc: &mut ClauseAlloc) {
    activity.bump *= activity.inv_decay;
    if activity.bump >= rescale_limit() {
        rescale_clause_activities(activity, db, alloc);
    }
}

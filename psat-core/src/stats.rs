//! Per-worker statistics (§7), reported through the CLI's `--stats-output` file and aggregated by
//! `psat-share`'s pairwise export-limit matrix.

/// Counters accumulated over a worker's lifetime.
#[derive(Debug, Default, Clone, Copy)]
pub struct WorkerStats {
    pub conflicts: u64,
    pub decisions: u64,
    pub propagations: u64,
    pub restarts: u64,
    pub reduces: u64,
    pub learnt_literals: u64,

    pub imported_units: u64,
    pub imported_clauses: u64,
    pub imported_clauses_used: u64,
    pub imported_clauses_deleted_no_use: u64,
    pub never_attached_clauses: u64,

    pub exported_units: u64,
    pub exported_clauses: u64,
    pub exported_clauses_rejected: u64,
}

impl WorkerStats {
    pub fn new() -> WorkerStats {
        WorkerStats::default()
    }

    pub fn record_conflict(&mut self, learnt_size: usize) {
        self.conflicts += 1;
        self.learnt_literals += learnt_size as u64;
    }

    pub fn record_reduce(&mut self, reduce_stats: &crate::reduce::ReduceStats) {
        self.reduces += 1;
        self.imported_clauses_deleted_no_use += reduce_stats.imported_deleted_no_use;
        self.never_attached_clauses += reduce_stats.never_attached;
    }
}

//! The adaptive per-(producer, consumer) export-size limit table and its three control modes
//! (§4.9): off, incremental (±1 towards a target), and AIMD.
//!
//! `import_limit[p][q]` is written only by the consumer `q` — it is the one who knows how many
//! clauses it actually imported from `p` since the last window — and only read by the producer
//! `p`, under the `legacy` export policy, to decide whether a clause is small enough to bother
//! sending. That single-writer/many-reader split is why a plain `AtomicU64` storing the bit
//! pattern of an `f64` is enough; there is never a write/write race to arbitrate.

use std::sync::atomic::{AtomicU64, Ordering};

/// Every `LIMIT_CONFLICTS_EVAL` conflicts a worker reassesses its pairwise import limits, per
/// the original `Cooperation` class this fabric is grounded on.
pub const LIMIT_CONFLICTS_EVAL: u64 = 6000;
/// Target number of imported clauses per window, used by the incremental and AIMD controllers.
pub const MAX_IMPORT_CLAUSES: u64 = 4000;
/// Additive-increase and multiplicative-decrease constants for [`ControlMode::Aimd`].
pub const AIMDX: f64 = 0.25;
pub const AIMDY: f64 = 8.0;
/// Upper bound on a pairwise export limit (§8: "import_limit[p][q] ∈ [1, configured_upper_bound]").
/// Not exposed as a configuration key in §6; picked generously above any clause size a `maxLBD`
/// reduction policy would keep around.
pub const MAX_EXPORT_LIMIT: f64 = 1000.0;

/// Which control scheme updates the pairwise export-size limit.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ControlMode {
    /// Limits are fixed at their initial value.
    Off,
    /// ±1 towards a target import rate.
    Incremental,
    /// Additive increase, multiplicative decrease.
    Aimd,
}

/// Square table of per-pair export limits and import counters, owned by the [`crate::fabric::SharingFabric`]
/// and shared (read-only from the producer's side) across worker threads.
pub struct PairLimits {
    n: usize,
    limit: Vec<AtomicU64>,
    imports_since_reset: Vec<AtomicU64>,
}

impl PairLimits {
    pub fn new(n: usize, initial: f64) -> PairLimits {
        PairLimits {
            n,
            limit: (0..n * n).map(|_| AtomicU64::new(initial.to_bits())).collect(),
            imports_since_reset: (0..n * n).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    fn index(&self, producer: usize, consumer: usize) -> usize {
        producer * self.n + consumer
    }

    /// The current export-size limit producer `p` should respect when sending to consumer `q`.
    pub fn get(&self, producer: usize, consumer: usize) -> f64 {
        f64::from_bits(self.limit[self.index(producer, consumer)].load(Ordering::Relaxed))
    }

    pub(crate) fn set(&self, producer: usize, consumer: usize, value: f64) {
        self.limit[self.index(producer, consumer)].store(value.to_bits(), Ordering::Relaxed);
    }

    /// Called by consumer `q` whenever it installs a clause imported from `p`.
    pub fn record_import(&self, producer: usize, consumer: usize) {
        self.imports_since_reset[self.index(producer, consumer)].fetch_add(1, Ordering::Relaxed);
    }

    fn imports_since_reset(&self, producer: usize, consumer: usize) -> u64 {
        self.imports_since_reset[self.index(producer, consumer)].load(Ordering::Relaxed)
    }

    fn reset_imports(&self, producer: usize, consumer: usize) {
        self.imports_since_reset[self.index(producer, consumer)].store(0, Ordering::Relaxed);
    }

    /// Reassess every `import_limit[p][consumer]` for the given consumer, then zero that
    /// consumer's row of `imports_since_reset`. Called from the consumer's own worker thread.
    pub fn update_for_consumer(&self, consumer: usize, mode: ControlMode) {
        if mode == ControlMode::Off {
            for producer in 0..self.n {
                if producer != consumer {
                    self.reset_imports(producer, consumer);
                }
            }
            return;
        }

        let total: u64 = (0..self.n)
            .filter(|&p| p != consumer)
            .map(|p| self.imports_since_reset(p, consumer))
            .sum();
        let below_target = total < MAX_IMPORT_CLAUSES;

        for producer in 0..self.n {
            if producer == consumer {
                continue;
            }
            let current = self.get(producer, consumer);
            let updated = match mode {
                ControlMode::Off => current,
                ControlMode::Incremental => {
                    if below_target {
                        current + 1.0
                    } else {
                        current - 1.0
                    }
                }
                ControlMode::Aimd => {
                    if below_target {
                        current + AIMDY / current.max(1.0)
                    } else {
                        current - AIMDX * current
                    }
                }
            };
            self.set(producer, consumer, updated.max(1.0).min(MAX_EXPORT_LIMIT));
            self.reset_imports(producer, consumer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_respected() {
        let limits = PairLimits::new(3, 1.0);
        for _ in 0..100 {
            for _ in 0..(MAX_IMPORT_CLAUSES + 10) {
                limits.record_import(1, 0);
            }
            limits.update_for_consumer(0, ControlMode::Aimd);
        }
        let value = limits.get(1, 0);
        assert!(value >= 1.0 && value <= MAX_EXPORT_LIMIT);
        assert_eq!(limits.imports_since_reset(1, 0), 0);
    }

    #[test]
    fn off_mode_never_changes_limit() {
        let limits = PairLimits::new(2, 42.0);
        limits.record_import(1, 0);
        limits.update_for_consumer(0, ControlMode::Off);
        assert_eq!(limits.get(1, 0), 42.0);
        assert_eq!(limits.imports_since_reset(1, 0), 0);
    }

    #[test]
    fn incremental_moves_by_one() {
        let limits = PairLimits::new(2, 10.0);
        limits.update_for_consumer(0, ControlMode::Incremental);
        assert_eq!(limits.get(1, 0), 11.0);
    }
}

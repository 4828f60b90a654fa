//! Deterministic-mode coordination (§4.9): two barriers bracket every import round, and each
//! worker's barrier frequency (in conflict counts) is either fixed or adapts to how far behind
//! the slowest worker is.
//!
//! The original solver's `Determanager.h` is a thin barrier-count helper bolted onto
//! `Cooperation`; per the spec's design notes, it is folded directly into this type rather than
//! kept as a separate one — no behavior is dropped, only the extra indirection.
//!
//! This can't be a plain `std::sync::Barrier`: §4.9 requires that "a worker that has reached a
//! terminal answer still participates until the barrier is released," but once a worker's
//! `solve()` call returns, its thread is done calling `wait()` forever — a fixed-arity barrier
//! would then deadlock every other worker still mid-search. [`DeterministicBarrier::deregister`]
//! lets the coordinator shrink the arity once a worker is known to have stopped, unblocking any
//! round already waiting on it.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};

use psat_core::config::DetFreqMode;

/// Barrier frequency used before any worker has completed a round, per the original's
/// `INITIAL_DET_FREQUENCE`.
pub const INITIAL_DET_FREQUENCE: u64 = 700;

struct RoundState {
    generation: u64,
    arrived: usize,
}

/// Deterministic-mode barrier state shared by all workers.
pub struct DeterministicBarrier {
    enabled: bool,
    freq_mode: DetFreqMode,
    active: AtomicUsize,
    state: Mutex<RoundState>,
    cvar: Condvar,
    per_worker_freq: Vec<AtomicU64>,
    per_worker_learnts: Vec<AtomicUsize>,
}

impl DeterministicBarrier {
    pub fn new(n: usize, enabled: bool, freq_mode: DetFreqMode) -> DeterministicBarrier {
        DeterministicBarrier {
            enabled,
            freq_mode,
            active: AtomicUsize::new(n),
            state: Mutex::new(RoundState {
                generation: 0,
                arrived: 0,
            }),
            cvar: Condvar::new(),
            per_worker_freq: (0..n).map(|_| AtomicU64::new(INITIAL_DET_FREQUENCE)).collect(),
            per_worker_learnts: (0..n).map(|_| AtomicUsize::new(0)).collect(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// This worker's current barrier frequency, in conflicts.
    pub fn frequency(&self, worker_id: usize) -> u64 {
        self.per_worker_freq[worker_id].load(Ordering::Relaxed)
    }

    /// Remove a worker from the barrier's arity. Called by the coordinator once that worker's
    /// `solve()` has returned, so peers still mid-round aren't left waiting on it forever.
    pub fn deregister(&self) {
        if !self.enabled {
            return;
        }
        let mut state = self.state.lock().unwrap();
        let remaining = self.active.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining > 0 && state.arrived >= remaining {
            state.generation += 1;
            state.arrived = 0;
            self.cvar.notify_all();
        }
    }

    fn wait(&self) {
        let mut state = self.state.lock().unwrap();
        let generation = state.generation;
        state.arrived += 1;
        let needed = self.active.load(Ordering::SeqCst);
        if state.arrived >= needed {
            state.generation += 1;
            state.arrived = 0;
            self.cvar.notify_all();
        } else {
            while state.generation == generation {
                state = self.cvar.wait(state).unwrap();
            }
        }
    }

    /// Run one commit/release round for `worker_id`, reporting `learnts_len` (the size of its
    /// learnt-clause database at the barrier) so a dynamic frequency can be recomputed from the
    /// whole fleet's spread once everyone has arrived.
    ///
    /// `between` runs after the commit barrier and before the release barrier — this is where
    /// the caller actually drains rings into imports and installs them, so every worker observes
    /// exports made before the commit by every peer (§4.9's "exports up to conflict k... visible
    /// to all imports at conflict k+1").
    pub fn round(&self, worker_id: usize, learnts_len: usize, between: impl FnOnce()) {
        if !self.enabled {
            between();
            return;
        }

        self.per_worker_learnts[worker_id].store(learnts_len, Ordering::Relaxed);
        self.wait();

        between();

        if self.freq_mode == DetFreqMode::Dynamic {
            let max_learnts = self
                .per_worker_learnts
                .iter()
                .map(|l| l.load(Ordering::Relaxed))
                .max()
                .unwrap_or(0)
                .max(1);
            let my_learnts = self.per_worker_learnts[worker_id].load(Ordering::Relaxed);
            let factor = 1.0 + (max_learnts - my_learnts) as f64 / max_learnts as f64;
            let new_freq = (INITIAL_DET_FREQUENCE as f64 * factor) as u64;
            self.per_worker_freq[worker_id].store(new_freq.max(1), Ordering::Relaxed);
        }

        self.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn disabled_barrier_just_runs_between() {
        let barrier = DeterministicBarrier::new(1, false, DetFreqMode::Static);
        let mut ran = false;
        barrier.round(0, 0, || ran = true);
        assert!(ran);
    }

    #[test]
    fn static_frequency_never_changes() {
        let barrier = DeterministicBarrier::new(2, true, DetFreqMode::Static);
        assert_eq!(barrier.frequency(0), INITIAL_DET_FREQUENCE);
        assert_eq!(barrier.frequency(1), INITIAL_DET_FREQUENCE);
    }

    #[test]
    fn all_workers_cross_both_barriers() {
        let barrier = Arc::new(DeterministicBarrier::new(2, true, DetFreqMode::Dynamic));
        let b0 = barrier.clone();
        let handle = thread::spawn(move || b0.round(0, 10, || {}));
        barrier.round(1, 4, || {});
        handle.join().unwrap();

        // worker 1 is further behind (fewer learnts) so its next frequency should be larger.
        assert!(barrier.frequency(1) > barrier.frequency(0));
    }

    #[test]
    fn deregistering_a_finished_worker_unblocks_the_rest() {
        let barrier = Arc::new(DeterministicBarrier::new(3, true, DetFreqMode::Static));
        barrier.deregister();

        let b0 = barrier.clone();
        let handle = thread::spawn(move || b0.round(0, 0, || {}));
        barrier.round(1, 0, || {});
        handle.join().unwrap();
    }
}

//! Decision heuristic: VSIDS variable order plus the polarity, random and lexicographic biases
//! layered on top of it (§4.5).
use psat_formula::{Lit, Var};

use crate::config::{InitPhasePolicy, PhaseSaving, SolverConfig};
use crate::trail::Trail;
use crate::vsids::Vsids;

/// A small, deterministic linear-congruential generator.
///
/// Seeded per worker from a base seed combined with the worker id, so a run in deterministic mode
/// reproduces the exact same sequence of random decisions across repeated runs.
pub struct Lcg {
    state: u64,
}

impl Lcg {
    pub fn new(base_seed: u64, worker_id: usize) -> Lcg {
        Lcg {
            state: base_seed ^ (worker_id as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15),
        }
    }

    /// Next pseudo-random value in `[0, 1)`.
    fn next_f64(&mut self) -> f64 {
        // Numerical Recipes LCG constants.
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((self.state >> 11) as f64) / ((1u64 << 53) as f64)
    }

    /// Uniformly random index in `[0, bound)`.
    fn next_below(&mut self, bound: usize) -> usize {
        (self.next_f64() * bound as f64) as usize
    }
}

/// Branching decision state: polarity cache plus the biases configured for this worker.
pub struct Decision {
    /// Saved polarity per variable, `true` means "prefer positive".
    polarity: Vec<bool>,
    /// The decision level a saved polarity was last set at, used for `PhaseSaving::MostRecent`.
    polarity_set_at_level: Vec<usize>,
    phase_saving: PhaseSaving,
    rnd_pol: bool,
    random_var_freq: f64,
    lexicographical_first_propagation: bool,
    first_decision: bool,
    lexico_next: usize,
    rng: Lcg,
}

impl Decision {
    pub fn new(config: &SolverConfig, base_seed: u64, worker_id: usize) -> Decision {
        Decision {
            polarity: vec![],
            polarity_set_at_level: vec![],
            phase_saving: config.phase_saving,
            rnd_pol: config.rnd_pol,
            random_var_freq: config.random_var_freq,
            lexicographical_first_propagation: config.lexicographical_first_propagation,
            first_decision: true,
            lexico_next: 0,
            rng: Lcg::new(base_seed, worker_id),
        }
    }

    /// Update structures for a new variable count, seeding new variables' polarity per the
    /// configured first-phase policy.
    pub fn set_var_count(&mut self, count: usize, init_phase_policy: InitPhasePolicy) {
        let old = self.polarity.len();
        self.polarity.resize(count, false);
        self.polarity_set_at_level.resize(count, 0);
        for i in old..count {
            self.polarity[i] = match init_phase_policy {
                InitPhasePolicy::AllTrue => true,
                InitPhasePolicy::AllFalse => false,
                InitPhasePolicy::Random => self.rng.next_f64() < 0.5,
            };
        }
    }

    /// Record a variable's polarity after it was assigned, honoring the phase saving depth.
    pub fn save_polarity(&mut self, var: Var, positive: bool, level: usize) {
        match self.phase_saving {
            PhaseSaving::Full => {
                self.polarity[var.index()] = positive;
            }
            PhaseSaving::MostRecent => {
                if level >= self.polarity_set_at_level[var.index()] {
                    self.polarity[var.index()] = positive;
                    self.polarity_set_at_level[var.index()] = level;
                }
            }
        }
    }

    /// The cached polarity for a variable, as last saved per the configured phase-saving policy
    /// (ignores any `rnd_pol` override, which only applies when actually picking a decision).
    pub fn polarity(&self, var: Var) -> bool {
        self.polarity[var.index()]
    }

    /// Pick the next decision literal, or `None` if every variable is assigned.
    ///
    /// `vsids` supplies the variable ordering; `trail` is consulted to skip already-assigned
    /// variables drawn from the heap (VSIDS itself only tracks availability, not assignment).
    pub fn pick_branch_lit(&mut self, vsids: &mut Vsids, trail: &Trail) -> Option<Lit> {
        if self.lexicographical_first_propagation && self.first_decision {
            while self.lexico_next < self.polarity.len() {
                let var = Var::from_index(self.lexico_next);
                if trail.var_value(var).is_none() {
                    self.first_decision = false;
                    return Some(var.positive());
                }
                self.lexico_next += 1;
            }
        }

        let use_random = self.first_decision || self.rng.next_f64() < self.random_var_freq;
        self.first_decision = false;

        let var = if use_random && !vsids.is_empty() {
            let idx = self.rng.next_below(vsids.len());
            Some(vsids.var_at(idx))
        } else {
            None
        };

        let var = match var {
            Some(var) => {
                vsids.remove_available(var);
                Some(var)
            }
            None => loop {
                match vsids.next() {
                    Some(var) if trail.var_value(var).is_some() => continue,
                    other => break other,
                }
            },
        };

        var.map(|var| {
            let positive = if self.rnd_pol {
                self.rng.next_f64() < 0.5
            } else {
                self.polarity[var.index()]
            };
            var.lit(positive)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lcg_is_deterministic_per_seed() {
        let mut a = Lcg::new(42, 0);
        let mut b = Lcg::new(42, 0);
        for _ in 0..10 {
            assert_eq!(a.next_f64(), b.next_f64());
        }

        let mut c = Lcg::new(42, 1);
        assert_ne!(a.next_f64(), c.next_f64());
    }

    #[test]
    fn lexicographic_first_decision() {
        let config = SolverConfig {
            lexicographical_first_propagation: true,
            ..SolverConfig::default()
        };
        let mut decision = Decision::new(&config, 0, 0);
        decision.set_var_count(3, InitPhasePolicy::AllFalse);

        let mut vsids = Vsids::default();
        vsids.set_var_count(3);
        let trail = Trail::default();

        let lit = decision.pick_branch_lit(&mut vsids, &trail).unwrap();
        assert_eq!(lit, psat_formula::Var::from_index(0).positive());
    }
}

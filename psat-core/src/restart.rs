//! Restart policies (§4.6): Luby, Picosat-style geometric, Glucose-style average-LBD (with the
//! trail-based restart-delay filter) and width-based.
use std::collections::VecDeque;

use crate::config::{RestartPolicy, SolverConfig};

/// Luby sequence generator.
///
/// `luby(inc, i)` is `inc` raised to the length of the `i`-th run of the standard Luby sequence
/// (1 1 2 1 1 2 4 1 1 2 1 1 2 4 8 ...). With `inc == 2.0` this reproduces that sequence directly.
fn luby(inc: f64, index: u64) -> f64 {
    let mut size = 1u64;
    let mut seq = 0u32;
    let mut x = index;

    while size < x + 1 {
        seq += 1;
        size = 2 * size + 1;
    }

    while size - 1 != x {
        size = (size - 1) / 2;
        seq -= 1;
        x %= size;
    }

    inc.powi(seq as i32)
}

/// State private to the Luby restart policy.
struct LubyState {
    index: u64,
    conflicts_at_restart: u64,
}

/// State private to the Picosat-style geometric restart policy.
struct PicosatState {
    base: f64,
    limit: f64,
    next_max_conflicts: u64,
}

/// State private to the average-LBD restart policy.
struct AvgLbdState {
    recent_lbds: VecDeque<usize>,
    sum_lbd: u64,
    conflicts: u64,
    recent_trails: VecDeque<usize>,
}

/// State private to the width-based restart policy.
struct WidthState {
    width: usize,
    wide_clause_count: u64,
    restarts_since_update: u64,
}

enum PolicyState {
    Luby(LubyState),
    Picosat(PicosatState),
    AvgLbd(AvgLbdState),
    Width(WidthState),
}

/// Drives restart decisions for one worker.
pub struct RestartController {
    policy: PolicyState,
    conflicts_since_restart: u64,
}

impl RestartController {
    pub fn new(config: &SolverConfig) -> RestartController {
        let policy = match config.restart_policy {
            RestartPolicy::Luby => PolicyState::Luby(LubyState {
                index: 0,
                conflicts_at_restart: 0,
            }),
            RestartPolicy::Picosat => PolicyState::Picosat(PicosatState {
                base: config.picobase as f64,
                limit: config.picolimit as f64,
                next_max_conflicts: config.picobase,
            }),
            RestartPolicy::AvgLbd => PolicyState::AvgLbd(AvgLbdState {
                recent_lbds: VecDeque::with_capacity(config.historic_length),
                sum_lbd: 0,
                conflicts: 0,
                recent_trails: VecDeque::with_capacity(config.trail_avg_size),
            }),
            RestartPolicy::WidthBased => PolicyState::Width(WidthState {
                width: config.width_restart_w,
                wide_clause_count: 0,
                restarts_since_update: 0,
            }),
        };

        RestartController {
            policy,
            conflicts_since_restart: 0,
        }
    }

    /// Record that a conflict happened and a clause of the given size/lbd was learnt.
    ///
    /// `trail_size` is the size of the trail at the moment of the conflict, used by the
    /// trail-based restart-delay filter.
    pub fn record_conflict(&mut self, config: &SolverConfig, lbd: usize, learnt_size: usize, trail_size: usize) {
        self.conflicts_since_restart += 1;

        match &mut self.policy {
            PolicyState::Luby(_) | PolicyState::Picosat(_) => {}
            PolicyState::AvgLbd(state) => {
                state.conflicts += 1;
                state.sum_lbd += lbd as u64;

                state.recent_lbds.push_back(lbd);
                if state.recent_lbds.len() > config.historic_length {
                    state.recent_lbds.pop_front();
                }

                state.recent_trails.push_back(trail_size);
                if state.recent_trails.len() > config.trail_avg_size {
                    state.recent_trails.pop_front();
                }

                if state.conflicts > config.nb_conf_before_restart_delay
                    && state.recent_trails.len() == config.trail_avg_size
                {
                    let avg_trail = state.recent_trails.iter().sum::<usize>() as f64
                        / state.recent_trails.len() as f64;
                    if trail_size as f64 > config.trail_avg_factor * avg_trail {
                        // Delay the next restart by invalidating the LBD queue.
                        state.recent_lbds.clear();
                    }
                }
            }
            PolicyState::Width(state) => {
                if learnt_size > state.width {
                    state.wide_clause_count += 1;
                }
            }
        }
    }

    /// Whether a restart should happen now.
    pub fn should_restart(&self, config: &SolverConfig) -> bool {
        match &self.policy {
            PolicyState::Luby(state) => {
                let threshold = config.luby_factor as f64 * luby(config.luby_restart_inc, state.index);
                (self.conflicts_since_restart - state.conflicts_at_restart) as f64 >= threshold
            }
            PolicyState::Picosat(state) => self.conflicts_since_restart >= state.next_max_conflicts,
            PolicyState::AvgLbd(state) => {
                if state.recent_lbds.len() < config.historic_length || state.conflicts == 0 {
                    return false;
                }
                let recent_avg =
                    state.recent_lbds.iter().sum::<usize>() as f64 / state.recent_lbds.len() as f64;
                let global_avg = state.sum_lbd as f64 / state.conflicts as f64;
                recent_avg * config.restart_factor > global_avg
            }
            PolicyState::Width(state) => state.wide_clause_count > 0,
        }
    }

    /// Advance internal state after a restart has been performed (cancel to level 0 is the
    /// caller's job).
    pub fn restart(&mut self, config: &SolverConfig) {
        match &mut self.policy {
            PolicyState::Luby(state) => {
                state.index += 1;
                state.conflicts_at_restart = self.conflicts_since_restart;
            }
            PolicyState::Picosat(state) => {
                state.next_max_conflicts += state.base;
                if state.next_max_conflicts as f64 > state.limit {
                    state.base *= config.picobase_factor;
                    state.limit *= config.picolimit_factor;
                    state.next_max_conflicts = state.base as u64;
                }
            }
            PolicyState::AvgLbd(state) => {
                state.recent_lbds.clear();
            }
            PolicyState::Width(state) => {
                state.wide_clause_count = 0;
                state.restarts_since_update += 1;
                if state.restarts_since_update >= config.width_restart_r {
                    state.restarts_since_update = 0;
                    state.width += config.width_restart_c;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luby_sequence_matches_known_prefix() {
        let expected = [1.0, 1.0, 2.0, 1.0, 1.0, 2.0, 4.0, 1.0, 1.0, 2.0, 1.0, 1.0, 2.0, 4.0, 8.0];
        for (i, &want) in expected.iter().enumerate() {
            assert_eq!(luby(2.0, i as u64), want, "index {}", i);
        }
    }

    #[test]
    fn width_based_restarts_on_wide_clause() {
        let config = SolverConfig {
            restart_policy: RestartPolicy::WidthBased,
            width_restart_w: 3,
            ..SolverConfig::default()
        };
        let mut rc = RestartController::new(&config);

        assert!(!rc.should_restart(&config));
        rc.record_conflict(&config, 2, 5, 10);
        assert!(rc.should_restart(&config));
        rc.restart(&config);
        assert!(!rc.should_restart(&config));
    }

    #[test]
    fn picosat_geometric_growth() {
        let config = SolverConfig {
            restart_policy: RestartPolicy::Picosat,
            picobase: 10,
            picolimit: 15,
            picobase_factor: 2.0,
            picolimit_factor: 2.0,
            ..SolverConfig::default()
        };
        let mut rc = RestartController::new(&config);

        for _ in 0..10 {
            rc.record_conflict(&config, 2, 2, 0);
        }
        assert!(rc.should_restart(&config));
        rc.restart(&config);
        assert!(!rc.should_restart(&config));
    }
}

//! Solver configuration.
//!
//! Mirrors the per-`[solverN]` keys of the INI configuration file described in the external
//! interface: `psat-config` parses the file and produces one [`SolverConfig`] per worker by
//! layering `[solverN]` over `[default]` over these built-in defaults; nothing in this crate reads
//! files directly.

/// Which reduction policy [`crate::reduce`] runs.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReducePolicy {
    /// psm/usefulness driven freezing (mode A, the default).
    Psm,
    /// Activity-sort half-removal (mode B).
    ActivitySort,
}

/// Restart policy selected by [`crate::restart`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RestartPolicy {
    Luby,
    Picosat,
    AvgLbd,
    WidthBased,
}

/// Which clauses a worker offers to the sharing fabric.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExportPolicy {
    /// Only export clauses with `lbd <= max_lbd_exchanged`.
    Lbd,
    /// Export regardless of size, subject only to ring capacity.
    Unlimited,
    /// Only export clauses no larger than the consumer's current per-pair limit.
    Legacy,
}

/// How a consumer installs an imported clause (see §4.10).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ImportPolicy {
    /// Attach small/useful clauses immediately, freeze the rest.
    Freeze,
    /// Always attach immediately.
    NoFreeze,
    /// Never attach immediately; always frozen on arrival.
    FreezeAll,
}

/// Initial polarity assigned to every variable before any phase is saved.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InitPhasePolicy {
    AllTrue,
    AllFalse,
    Random,
}

/// Phase saving depth, see §4.5.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PhaseSaving {
    /// Preserve polarity on every backtrack.
    Full,
    /// Preserve polarity only for the most-recently-started decision level.
    MostRecent,
}

/// Whether the deterministic-mode barrier frequency is fixed or adapts to lagging workers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DetFreqMode {
    Static,
    Dynamic,
}

/// Per-worker configuration, as described in §6.
///
/// A `SolverConfig` is self-contained: it has no reference to other workers or to the sharing
/// fabric. The worker id and total worker count are passed separately where needed (e.g. to seed
/// the per-worker random source).
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    pub use_psm: bool,
    pub max_freeze: usize,
    pub extra_imported_freeze: usize,
    pub initial_nb_conflict_before_reduce: u64,
    pub nb_conflict_before_reduce_increment: u64,
    pub max_lbd_exchanged: usize,
    pub max_lbd: usize,

    pub luby_factor: u64,
    pub luby_restart_inc: f64,
    pub restart_policy: RestartPolicy,
    pub picobase: u64,
    pub picobase_factor: f64,
    pub picolimit: u64,
    pub picolimit_factor: f64,

    pub export_policy: ExportPolicy,
    pub import_policy: ImportPolicy,
    pub reject_at_import: bool,
    pub reject_lbd: usize,

    pub lexicographical_first_propagation: bool,
    pub init_phase_policy: InitPhasePolicy,
    pub phase_saving: PhaseSaving,
    pub rnd_pol: bool,
    pub random_var_freq: f64,

    pub restart_factor: f64,
    pub historic_length: usize,
    pub trail_avg_size: usize,
    pub nb_conf_before_restart_delay: u64,
    pub trail_avg_factor: f64,

    pub width_restart_r: u64,
    pub width_restart_w: usize,
    pub width_restart_c: usize,

    pub var_decay: f32,
    pub clause_decay: f32,
}

impl SolverConfig {
    /// Which reduction policy `use_psm` currently selects.
    pub fn reduce_policy(&self) -> ReducePolicy {
        if self.use_psm {
            ReducePolicy::Psm
        } else {
            ReducePolicy::ActivitySort
        }
    }
}

impl Default for SolverConfig {
    fn default() -> SolverConfig {
        SolverConfig {
            use_psm: true,
            max_freeze: 30,
            extra_imported_freeze: 15,
            initial_nb_conflict_before_reduce: 2000,
            nb_conflict_before_reduce_increment: 300,
            max_lbd_exchanged: 6,
            max_lbd: 6,

            luby_factor: 100,
            luby_restart_inc: 2.0,
            restart_policy: RestartPolicy::AvgLbd,
            picobase: 100,
            picobase_factor: 1.1,
            picolimit: 100,
            picolimit_factor: 1.1,

            export_policy: ExportPolicy::Lbd,
            import_policy: ImportPolicy::Freeze,
            reject_at_import: false,
            reject_lbd: 12,

            lexicographical_first_propagation: false,
            init_phase_policy: InitPhasePolicy::AllFalse,
            phase_saving: PhaseSaving::Full,
            rnd_pol: false,
            random_var_freq: 0.0,

            restart_factor: 0.8,
            historic_length: 50,
            trail_avg_size: 5000,
            nb_conf_before_restart_delay: 10000,
            trail_avg_factor: 1.4,

            width_restart_r: 14,
            width_restart_w: 30,
            width_restart_c: 2,

            var_decay: 0.95,
            clause_decay: 0.999,
        }
    }
}

/// Global configuration shared by all workers (the `[global]` section).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalConfig {
    /// Number of worker threads, or `None` for "max" (number of available cores).
    pub ncores: Option<usize>,
    pub deterministic: bool,
    pub det_freq_mode: DetFreqMode,
}

impl Default for GlobalConfig {
    fn default() -> GlobalConfig {
        GlobalConfig {
            ncores: None,
            deterministic: false,
            det_freq_mode: DetFreqMode::Static,
        }
    }
}

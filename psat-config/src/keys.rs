//! Applying a single `key = value` pair from §6's recognized key table onto a [`SolverConfig`] or
//! [`GlobalConfig`].
//!
//! Every setter here is infallible: a value that doesn't parse, or an enumerated value outside
//! its allowed set, produces a [`ConfigWarning`] and leaves the field at whatever it already was
//! (the built-in default, or a `[default]` section value already applied) — per §7's "Configuration
//! errors are accumulated and the run proceeds with defaults."

use psat_core::config::{
    DetFreqMode, ExportPolicy, GlobalConfig, ImportPolicy, InitPhasePolicy, RestartPolicy,
    SolverConfig,
};

use crate::ini::IniEntry;
use crate::ConfigWarning;

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn parse_usize(value: &str) -> Option<usize> {
    value.parse().ok()
}

fn parse_u64(value: &str) -> Option<u64> {
    value.parse().ok()
}

fn parse_f64(value: &str) -> Option<f64> {
    value.parse().ok()
}

fn warn_invalid(warnings: &mut Vec<ConfigWarning>, entry: &IniEntry) {
    warnings.push(ConfigWarning::InvalidValue {
        line: entry.line,
        key: entry.key.clone(),
        value: entry.value.clone(),
    });
}

macro_rules! parse_or_warn {
    ($entry:expr, $warnings:expr, $target:expr, $parse:expr) => {
        match $parse($entry.value.as_str()) {
            Some(parsed) => $target = parsed,
            None => warn_invalid($warnings, $entry),
        }
    };
}

/// Apply one entry from a `[solverN]` or `[default]` section.
///
/// Returns `false` if `key` isn't a recognized solver key at all (the caller records
/// [`ConfigWarning::UnknownKey`] in that case); unrecognized *values* for a recognized key are
/// reported here directly.
pub fn apply_solver_key(cfg: &mut SolverConfig, entry: &IniEntry, warnings: &mut Vec<ConfigWarning>) -> bool {
    match entry.key.as_str() {
        "usePsm" => parse_or_warn!(entry, warnings, cfg.use_psm, parse_bool),
        "maxFreeze" => parse_or_warn!(entry, warnings, cfg.max_freeze, parse_usize),
        "extraImportedFreeze" => {
            parse_or_warn!(entry, warnings, cfg.extra_imported_freeze, parse_usize)
        }
        "initialNbConflictBeforeReduce" => parse_or_warn!(
            entry,
            warnings,
            cfg.initial_nb_conflict_before_reduce,
            parse_u64
        ),
        "nbConflictBeforeReduceIncrement" => parse_or_warn!(
            entry,
            warnings,
            cfg.nb_conflict_before_reduce_increment,
            parse_u64
        ),
        "maxLBDExchange" => {
            parse_or_warn!(entry, warnings, cfg.max_lbd_exchanged, parse_usize)
        }
        "maxLBD" => parse_or_warn!(entry, warnings, cfg.max_lbd, parse_usize),
        "lubyFactor" => parse_or_warn!(entry, warnings, cfg.luby_factor, parse_u64),
        "restartPolicy" => match entry.value.as_str() {
            "avgLBD" => cfg.restart_policy = RestartPolicy::AvgLbd,
            "luby" => cfg.restart_policy = RestartPolicy::Luby,
            "picosat" => cfg.restart_policy = RestartPolicy::Picosat,
            "widthBased" => cfg.restart_policy = RestartPolicy::WidthBased,
            _ => warn_invalid(warnings, entry),
        },
        "picobase" => parse_or_warn!(entry, warnings, cfg.picobase, parse_u64),
        "picobaseFactor" => {
            parse_or_warn!(entry, warnings, cfg.picobase_factor, parse_f64)
        }
        "picolimit" => parse_or_warn!(entry, warnings, cfg.picolimit, parse_u64),
        "picolimitFactor" => {
            parse_or_warn!(entry, warnings, cfg.picolimit_factor, parse_f64)
        }
        "exportPolicy" => match entry.value.as_str() {
            "lbd" => cfg.export_policy = ExportPolicy::Lbd,
            "unlimited" => cfg.export_policy = ExportPolicy::Unlimited,
            "legacy" => cfg.export_policy = ExportPolicy::Legacy,
            _ => warn_invalid(warnings, entry),
        },
        "importPolicy" => match entry.value.as_str() {
            "freeze" => cfg.import_policy = ImportPolicy::Freeze,
            "no-freeze" => cfg.import_policy = ImportPolicy::NoFreeze,
            "freeze-all" => cfg.import_policy = ImportPolicy::FreezeAll,
            _ => warn_invalid(warnings, entry),
        },
        "rejectAtImport" => parse_or_warn!(entry, warnings, cfg.reject_at_import, parse_bool),
        "rejectLBD" => parse_or_warn!(entry, warnings, cfg.reject_lbd, parse_usize),
        "lexicographicalFirstPropagation" => parse_or_warn!(
            entry,
            warnings,
            cfg.lexicographical_first_propagation,
            parse_bool
        ),
        "initPhasePolicy" => match entry.value.as_str() {
            "true" => cfg.init_phase_policy = InitPhasePolicy::AllTrue,
            "false" => cfg.init_phase_policy = InitPhasePolicy::AllFalse,
            "random" => cfg.init_phase_policy = InitPhasePolicy::Random,
            _ => warn_invalid(warnings, entry),
        },
        "restartFactor" => parse_or_warn!(entry, warnings, cfg.restart_factor, parse_f64),
        "historicLength" => {
            parse_or_warn!(entry, warnings, cfg.historic_length, parse_usize)
        }
        "trailAvgSize" => parse_or_warn!(entry, warnings, cfg.trail_avg_size, parse_usize),
        "nbConfBeforeRestartDelay" => parse_or_warn!(
            entry,
            warnings,
            cfg.nb_conf_before_restart_delay,
            parse_u64
        ),
        "trailAvgFactor" => {
            parse_or_warn!(entry, warnings, cfg.trail_avg_factor, parse_f64)
        }
        "widthRestartR" => {
            parse_or_warn!(entry, warnings, cfg.width_restart_r, parse_u64)
        }
        "widthRestartW" => {
            parse_or_warn!(entry, warnings, cfg.width_restart_w, parse_usize)
        }
        "widthRestartC" => {
            parse_or_warn!(entry, warnings, cfg.width_restart_c, parse_usize)
        }
        _ => return false,
    }
    true
}

/// Apply one entry from the `[global]` section.
pub fn apply_global_key(cfg: &mut GlobalConfig, entry: &IniEntry, warnings: &mut Vec<ConfigWarning>) -> bool {
    match entry.key.as_str() {
        "ncores" => {
            if entry.value.eq_ignore_ascii_case("max") {
                cfg.ncores = None;
            } else {
                match entry.value.parse::<usize>() {
                    Ok(0) | Err(_) => warn_invalid(warnings, entry),
                    Ok(n) => cfg.ncores = Some(n),
                }
            }
        }
        "deterministic" => parse_or_warn!(entry, warnings, cfg.deterministic, parse_bool),
        "detFreqMode" => match entry.value.as_str() {
            "static" => cfg.det_freq_mode = DetFreqMode::Static,
            "dynamic" => cfg.det_freq_mode = DetFreqMode::Dynamic,
            _ => warn_invalid(warnings, entry),
        },
        _ => return false,
    }
    true
}

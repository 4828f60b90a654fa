//! The INI-style configuration format of §6: `[solver0]`, `[solver1]`, …, `[default]`, `[global]`
//! sections layered into one [`psat_core::GlobalConfig`] and one [`psat_core::SolverConfig`] per
//! worker.
//!
//! Configuration errors never abort a run (§7): [`resolve`] always returns a usable
//! configuration, accumulating a [`ConfigWarning`] for every unknown key or unparseable value
//! instead of failing.

pub mod ini;
mod keys;

use std::fs;
use std::io::BufReader;
use std::path::Path;

use thiserror::Error;

use psat_core::config::{GlobalConfig, SolverConfig};

use ini::{IniEntry, IniError};

/// A non-fatal problem found while resolving a configuration file, per §7's `ConfigError` (a
/// warning, default retained).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    #[error("line {line}: unknown configuration key '{key}' (section '{section}')")]
    UnknownKey {
        line: usize,
        section: String,
        key: String,
    },
    #[error("line {line}: invalid value '{value}' for '{key}'")]
    InvalidValue {
        line: usize,
        key: String,
        value: String,
    },
}

/// A resolved configuration: the parsed `[global]` section and one `[solverN]`-layered
/// `SolverConfig` per worker, plus every warning collected while getting there.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub global: GlobalConfig,
    pub solvers: Vec<SolverConfig>,
    pub warnings: Vec<ConfigWarning>,
}

/// Read and resolve a configuration file for `worker_count` workers.
///
/// I/O failures reading the file are reported as [`IniError`] (there is no sensible default to
/// fall back to when the file named on the command line doesn't exist); once the file is read,
/// every remaining problem becomes a [`ConfigWarning`].
pub fn load_file(path: impl AsRef<Path>, worker_count: usize) -> Result<ResolvedConfig, IniError> {
    let file = fs::File::open(path)?;
    resolve(ini::parse(BufReader::new(file))?, worker_count)
}

/// Resolve a configuration already read from a string (used by the CLI's `-C key=value`
/// overrides, and by tests).
pub fn load_str(text: &str, worker_count: usize) -> Result<ResolvedConfig, IniError> {
    resolve(ini::parse(text.as_bytes())?, worker_count)
}

/// Resolve a set of parsed [`IniEntry`] values into a [`ResolvedConfig`].
///
/// `worker_count` many `SolverConfig`s are produced, each starting from the built-in default,
/// then having `[default]` applied, then `[solverN]` for that worker's index — matching §6's
/// "Missing keys fall back to `[default]` and then to built-in defaults."
fn resolve(entries: Vec<IniEntry>, worker_count: usize) -> Result<ResolvedConfig, IniError> {
    let mut warnings = vec![];
    let mut global = GlobalConfig::default();

    for entry in entries.iter().filter(|e| e.section == "global") {
        if !keys::apply_global_key(&mut global, entry, &mut warnings) {
            warnings.push(ConfigWarning::UnknownKey {
                line: entry.line,
                section: entry.section.clone(),
                key: entry.key.clone(),
            });
        }
    }

    let default_entries: Vec<&IniEntry> = entries.iter().filter(|e| e.section == "default").collect();

    let mut solvers = Vec::with_capacity(worker_count);
    for worker_id in 0..worker_count {
        let mut cfg = SolverConfig::default();
        let solver_section = format!("solver{}", worker_id);

        for entry in default_entries.iter().copied().chain(
            entries
                .iter()
                .filter(|e| e.section == solver_section),
        ) {
            if !keys::apply_solver_key(&mut cfg, entry, &mut warnings) {
                // Only report unknown keys once, from the `[default]` pass, to avoid repeating
                // the same warning once per worker.
                if worker_id == 0 || entry.section == solver_section {
                    warnings.push(ConfigWarning::UnknownKey {
                        line: entry.line,
                        section: entry.section.clone(),
                        key: entry.key.clone(),
                    });
                }
            }
        }

        solvers.push(cfg);
    }

    Ok(ResolvedConfig {
        global,
        solvers,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use psat_core::config::{ExportPolicy, RestartPolicy};

    #[test]
    fn layering_default_over_builtin_over_solver() {
        let text = "\
[default]
maxLBD = 8
restartPolicy = luby

[solver1]
maxLBD = 4
";
        let resolved = load_str(text, 3).unwrap();
        assert!(resolved.warnings.is_empty());
        assert_eq!(resolved.solvers.len(), 3);
        assert_eq!(resolved.solvers[0].max_lbd, 8);
        assert_eq!(resolved.solvers[0].restart_policy, RestartPolicy::Luby);
        assert_eq!(resolved.solvers[1].max_lbd, 4);
        assert_eq!(resolved.solvers[2].max_lbd, 8);
    }

    #[test]
    fn unknown_key_is_a_warning_not_a_failure() {
        let resolved = load_str("[default]\nnotARealKey = 3\n", 1).unwrap();
        assert_eq!(resolved.solvers.len(), 1);
        assert_eq!(resolved.warnings.len(), 1);
        assert!(matches!(
            resolved.warnings[0],
            ConfigWarning::UnknownKey { .. }
        ));
    }

    #[test]
    fn invalid_enum_value_keeps_default() {
        let resolved = load_str("[default]\nexportPolicy = bogus\n", 1).unwrap();
        assert_eq!(resolved.solvers[0].export_policy, ExportPolicy::Lbd);
        assert_eq!(resolved.warnings.len(), 1);
        assert!(matches!(
            resolved.warnings[0],
            ConfigWarning::InvalidValue { .. }
        ));
    }

    #[test]
    fn ncores_max_is_none() {
        let resolved = load_str("[global]\nncores = max\ndeterministic = true\n", 1).unwrap();
        assert_eq!(resolved.global.ncores, None);
        assert!(resolved.global.deterministic);
    }

    #[test]
    fn ncores_number() {
        let resolved = load_str("[global]\nncores = 4\n", 1).unwrap();
        assert_eq!(resolved.global.ncores, Some(4));
    }
}

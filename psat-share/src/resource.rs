//! Resident memory sampling, for the CLI's `--memory-limit` watchdog.
//!
//! Grounded on `examples/original_source/src/System.cpp`'s `penelope::memUsed()`, which reads
//! `/proc/<pid>/statm` on Linux; the other platform branches it carries (FreeBSD `getrusage`,
//! Windows `GetProcessMemoryInfo`, macOS `malloc_zone_statistics`) aren't reproduced here since
//! this workspace has no existing dependency that gets us there without adding a libc-level crate
//! purely for this one reading. Unsupported platforms just never trip the limit.

use std::fs;

/// Resident set size of the current process, in mebibytes, or `None` if it can't be determined.
#[cfg(target_os = "linux")]
pub fn memory_used_mb() -> Option<u64> {
    let statm = fs::read_to_string("/proc/self/statm").ok()?;
    let resident_pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    let page_size = 4096u64;
    Some(resident_pages * page_size / (1024 * 1024))
}

#[cfg(not(target_os = "linux"))]
pub fn memory_used_mb() -> Option<u64> {
    None
}

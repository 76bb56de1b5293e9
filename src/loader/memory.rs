//! Process memory sampling for the advisory per-unit budget.
//!
//! Deltas measured around a load are inherently noisy (allocator reuse,
//! concurrent loads of other units), so the loader treats them as a
//! heuristic warning signal only.

/// Resident set size in bytes, read from `/proc/self/statm`.
///
/// `None` on platforms without procfs; the loader then records a zero delta
/// and the budget check degrades to a no-op.
pub fn resident_set_bytes() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
        let pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
        // statm reports pages; 4 KiB on the Linux targets we build for.
        Some(pages * 4096)
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

/// Sampling helper for delta arithmetic — unknown reads as zero.
pub fn sample() -> u64 {
    resident_set_bytes().unwrap_or(0)
}

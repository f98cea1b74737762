//! Memory mapping utilities for the process's own address space
//!
//! This module parses /proc/self/maps to find where the running executable is
//! mapped, which is needed to translate runtime addresses of a
//! position-independent executable (PIE) back to link-time addresses.

use log::debug;
use std::fs;

use crate::domain::SymbolError;

/// Memory range of a loaded binary in the process's address space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRange {
    pub start: u64,
    pub end: u64,
}

impl MemoryRange {
    /// Check if an address falls within this memory range
    #[must_use]
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.end
    }
}

/// Find the memory range of `binary_path` in maps-formatted text
///
/// All mappings whose pathname equals `binary_path` are merged into one range
/// from the minimum start to the maximum end. A ` (deleted)` suffix, left by
/// the kernel when the file was replaced after exec, is ignored.
#[must_use]
pub fn parse_memory_maps(maps: &str, binary_path: &str) -> Option<MemoryRange> {
    let mut range: Option<MemoryRange> = None;

    for line in maps.lines() {
        // "start-end perms offset dev inode pathname"
        let mut fields = line.split_whitespace();
        let Some(span) = fields.next() else { continue };
        let Some(pathname) = fields.nth(4) else { continue };
        let rest: Vec<&str> = fields.collect();
        let pathname = if rest.is_empty() {
            pathname.to_string()
        } else {
            format!("{pathname} {}", rest.join(" "))
        };
        let pathname = pathname.strip_suffix(" (deleted)").unwrap_or(&pathname);
        if pathname != binary_path {
            continue;
        }

        let Some((start, end)) = span.split_once('-') else { continue };
        let (Ok(start), Ok(end)) = (u64::from_str_radix(start, 16), u64::from_str_radix(end, 16))
        else {
            continue;
        };

        range = Some(match range {
            Some(r) => MemoryRange { start: r.start.min(start), end: r.end.max(end) },
            None => MemoryRange { start, end },
        });
    }

    range
}

/// Read /proc/self/maps and find the memory range of `binary_path`
///
/// # Errors
/// Returns an error if /proc/self/maps cannot be read or the binary is not mapped
pub fn self_memory_range(binary_path: &str) -> Result<MemoryRange, SymbolError> {
    let maps = fs::read_to_string("/proc/self/maps").map_err(SymbolError::MemoryMapsReadFailed)?;

    let range = parse_memory_maps(&maps, binary_path)
        .ok_or_else(|| SymbolError::NoMemoryRangeFound(binary_path.to_string()))?;

    debug!(
        "Executable memory range: 0x{:x} - 0x{:x} (size: {} KB)",
        range.start,
        range.end,
        (range.end - range.start) / 1024
    );
    Ok(range)
}

//! # Symbol Resolution for the Running Process
//!
//! Converts raw instruction addresses captured from the calling thread's stack
//! into function metadata: the entry address and qualified name of the
//! function containing the address, and the source file and line.
//!
//! ## Inlining
//!
//! In optimized builds one machine function often holds several source
//! functions. An address then expands to a chain of [`LogicalFrame`]s,
//! innermost first, read from the DWARF inline records. Each level carries its
//! own name and line: the executing line for the innermost level and the call
//! site of the inlined call for the ones around it. [`resolve`] still reports
//! the machine function.
//!
//! ## The process-wide table
//!
//! Resolution runs against a single [`SymbolTable`] built from the running
//! executable the first time any address is resolved (or eagerly through
//! [`init`]). Building it reads the executable, demangles its function
//! symbols and flattens the DWARF line program into address-sorted rows.
//! Once built the table is never mutated, so any number of threads read it
//! without coordination and every lookup is an O(log n) binary search that
//! allocates nothing. Returned strings borrow from the table and live for the
//! rest of the process.
//!
//! ## PIE and ASLR
//!
//! Symbols and DWARF carry link-time addresses; a position-independent
//! executable is loaded at a randomized base. The load bias is taken from
//! `/proc/self/maps`:
//!
//! ```text
//! Runtime Address = Load Bias + Link-time Address
//! ```
//!
//! Addresses outside the executable's mapping (shared libraries, the vDSO)
//! never resolve.
//!
//! ## Failure
//!
//! If the table cannot be built (stripped binary, unreadable file, no
//! `/proc`), the failure is logged once and an empty table is installed:
//! every frame is then unresolved, and nothing is reported to callers.
//!
//! ## Limitations
//!
//! - **Requires debug symbols**: line numbers need `debug = true` (or at least
//!   line tables) in the build profile
//! - **Main executable only**: frames in dynamically loaded libraries are
//!   reported unresolved
//! - **Linux**: the load bias comes from procfs

pub mod memory_maps;
pub mod symbol_table;

pub use memory_maps::{parse_memory_maps, MemoryRange};
pub use symbol_table::{LogicalFrame, LogicalFrames, SymbolConfig, SymbolTable, TableStats};

use log::warn;
use std::sync::OnceLock;

use crate::domain::{Address, Symbol};

static TABLE: OnceLock<SymbolTable> = OnceLock::new();

/// The process-wide table, built from [`SymbolConfig::from_env`] on first use
pub fn table() -> &'static SymbolTable {
    TABLE.get_or_init(|| {
        SymbolConfig::from_env().and_then(|config| SymbolTable::load(&config)).unwrap_or_else(
            |e| {
                warn!("Symbol resolution disabled: {e}");
                SymbolTable::empty()
            },
        )
    })
}

/// Build the process-wide table now instead of on the first capture
pub fn init() -> TableStats {
    table().stats()
}

/// Install a table built from an explicit configuration
///
/// Returns `false`, leaving the existing table in place, if one was already
/// built. A configuration that fails to load installs an empty table.
pub fn init_with(config: &SymbolConfig) -> bool {
    if TABLE.get().is_some() {
        return false;
    }
    let table = SymbolTable::load(config).unwrap_or_else(|e| {
        warn!("Symbol resolution disabled: {e}");
        SymbolTable::empty()
    });
    TABLE.set(table).is_ok()
}

/// Function containing `address`
///
/// `None` for the zero address, addresses outside the executable, and
/// addresses no function claims.
pub fn resolve(address: Address) -> Option<Symbol> {
    table()
        .function(address.as_u64())
        .map(|(entry, qualified_name)| Symbol { entry: Address(to_usize(entry)), qualified_name })
}

/// Source file and line of `address`, for its innermost logical frame
pub fn location(address: Address) -> Option<(&'static str, u32)> {
    table().location(address.as_u64())
}

/// Logical frames at `address`, innermost first
pub fn frames(address: Address) -> Option<LogicalFrames<'static>> {
    table().logical_frames(address.as_u64())
}

/// How many logical frames `address` expands to; an unresolved address counts as one
pub fn inline_depth(address: Address) -> usize {
    table().inline_depth(address.as_u64()).unwrap_or(1)
}

pub(crate) fn to_usize(addr: u64) -> usize {
    usize::try_from(addr).unwrap_or(0)
}

//! Address-sorted function and line tables for the running executable
//!
//! The table is materialized once: function symbols come from the object's
//! symbol table (demangled and rewritten into qualified-name form) and line
//! rows from the DWARF line program, flattened with `addr2line`. Each row also
//! carries its inline chain, so an address inside inlined code expands to the
//! source functions that were merged into one machine function, each paired
//! with its own file and line. After that the table is immutable, so lookups
//! are binary searches that borrow from it and never allocate.

use addr2line::Context;
use gimli::{EndianRcSlice, RunTimeEndian};
use log::{debug, info};
use object::{Object, ObjectSection, ObjectSegment, ObjectSymbol, SymbolKind};
use rustc_demangle::demangle;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::memory_maps::{self, MemoryRange};
use crate::domain::SymbolError;
use crate::qualified_name;

const PAGE_MASK: u64 = !0xfff;

/// Where to read symbols from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolConfig {
    /// The executable mapped into this process
    pub binary: PathBuf,
    /// Separate file carrying the symbol table and DWARF (for stripped binaries)
    pub debug_file: Option<PathBuf>,
}

impl SymbolConfig {
    pub const DEBUG_FILE_ENV: &'static str = "FRAMEOF_DEBUG_FILE";

    /// Current executable, with `FRAMEOF_DEBUG_FILE` as the optional debug file
    ///
    /// # Errors
    /// Returns an error if the path of the current executable is unavailable
    pub fn from_env() -> Result<Self, SymbolError> {
        let binary = std::env::current_exe().map_err(SymbolError::CurrentExe)?;
        let debug_file =
            std::env::var_os(Self::DEBUG_FILE_ENV).filter(|v| !v.is_empty()).map(PathBuf::from);
        Ok(Self { binary, debug_file })
    }
}

#[derive(Debug)]
struct FunctionEntry {
    start: u64,
    end: u64,
    name: Box<str>,
}

/// One level of an inline chain, by interned name and file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InlineFrame {
    name: u32,
    file: u32,
    line: u32,
    /// Capture entry points inlined into their caller; never reported
    hidden: bool,
}

/// Address range sharing one inline chain, `frames[first..first + len]`
#[derive(Debug, Clone, Copy)]
struct LineRow {
    start: u64,
    end: u64,
    first: u32,
    len: u32,
}

/// Immutable lookup tables keyed by link-time address
#[derive(Debug, Default)]
pub struct SymbolTable {
    /// Runtime address minus link-time address
    bias: u64,
    /// Runtime range of the executable; `None` accepts every address
    mapped: Option<MemoryRange>,
    functions: Vec<FunctionEntry>,
    lines: Vec<LineRow>,
    /// Inline chains of every row, innermost level first
    frames: Vec<InlineFrame>,
    names: Vec<Box<str>>,
    files: Vec<Box<str>>,
}

/// Summary of a loaded table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableStats {
    pub functions: usize,
    pub line_rows: usize,
    /// Inline levels across all rows; equals `line_rows` without inlining
    pub logical_frames: usize,
    pub files: usize,
    pub load_bias: u64,
}

/// A function as seen in source at some address, inlined or not
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicalFrame<'a> {
    /// Runtime entry of the machine function the address belongs to
    pub entry: u64,
    pub qualified_name: &'a str,
    pub file: &'a str,
    /// The executing line for the innermost level, the call site for the others
    pub line: u32,
}

/// Logical frames at one address, innermost first
#[derive(Debug, Clone)]
pub struct LogicalFrames<'a> {
    table: &'a SymbolTable,
    entry: u64,
    chain: std::slice::Iter<'a, InlineFrame>,
}

impl<'a> Iterator for LogicalFrames<'a> {
    type Item = LogicalFrame<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let frame = self.chain.by_ref().find(|f| !f.hidden)?;
        Some(LogicalFrame {
            entry: self.entry,
            qualified_name: self.table.names.get(frame.name as usize).map_or("", |n| &**n),
            file: self.table.files.get(frame.file as usize).map_or("", |f| &**f),
            line: frame.line,
        })
    }
}

impl SymbolTable {
    /// A table that resolves nothing
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build the table for the executable described by `config`
    ///
    /// # Errors
    /// Returns an error if a binary cannot be read or parsed, the executable is
    /// not mapped into this process, or its DWARF is malformed
    pub fn load(config: &SymbolConfig) -> Result<Self, SymbolError> {
        let binary_data = read(&config.binary)?;
        let binary = parse(&config.binary, &binary_data)?;

        let binary_path = config.binary.to_string_lossy();
        let mapped = memory_maps::self_memory_range(&binary_path)?;
        let bias = load_bias(&binary, mapped);

        let debug_data;
        let source = match &config.debug_file {
            Some(path) => {
                debug!("Reading symbols from debug file {}", path.display());
                debug_data = read(path)?;
                parse(path, &debug_data)?
            }
            None => binary,
        };

        let functions = collect_functions(&source);
        let rows = collect_rows(&source, &functions)?;

        let table = Self {
            bias,
            mapped: Some(mapped),
            functions,
            lines: rows.lines,
            frames: rows.frames,
            names: rows.names.strings,
            files: rows.files.strings,
        };
        let stats = table.stats();
        info!(
            "Symbol table loaded: {} functions, {} line rows, {} logical frames, {} files, \
             load bias 0x{:x}",
            stats.functions, stats.line_rows, stats.logical_frames, stats.files, stats.load_bias
        );
        Ok(table)
    }

    #[must_use]
    pub fn stats(&self) -> TableStats {
        TableStats {
            functions: self.functions.len(),
            line_rows: self.lines.len(),
            logical_frames: self.frames.len(),
            files: self.files.len(),
            load_bias: self.bias,
        }
    }

    /// Translate a runtime address to a link-time address inside the executable
    fn link_address(&self, addr: u64) -> Option<u64> {
        if addr == 0 {
            return None;
        }
        if let Some(range) = self.mapped {
            if !range.contains(addr) {
                return None;
            }
        }
        addr.checked_sub(self.bias)
    }

    /// Machine function claiming runtime address `addr`: (runtime entry, qualified name)
    ///
    /// Inlining is not visible here; see [`logical_frames`](Self::logical_frames).
    pub fn function(&self, addr: u64) -> Option<(u64, &str)> {
        let addr = self.link_address(addr)?;
        let idx = self.functions.partition_point(|f| f.start <= addr).checked_sub(1)?;
        let entry = &self.functions[idx];
        (addr < entry.end).then(|| (entry.start + self.bias, &*entry.name))
    }

    /// Source functions executing at runtime address `addr`, innermost first
    ///
    /// A call inlined twice yields three frames: the inlined callee, the
    /// function it was inlined into, and so on out to the machine function.
    /// `None` unless both a machine function and a line row claim `addr`.
    pub fn logical_frames(&self, addr: u64) -> Option<LogicalFrames<'_>> {
        let (entry, _) = self.function(addr)?;
        let link = self.link_address(addr)?;
        let idx = self.lines.partition_point(|r| r.start <= link).checked_sub(1)?;
        let row = self.lines[idx];
        if link >= row.end {
            return None;
        }
        let first = row.first as usize;
        let chain = self.frames.get(first..first + row.len as usize)?;
        Some(LogicalFrames { table: self, entry, chain: chain.iter() })
    }

    /// Number of logical frames at `addr`, `None` if it does not resolve
    pub fn inline_depth(&self, addr: u64) -> Option<usize> {
        self.logical_frames(addr).map(Iterator::count)
    }

    /// Source file and line of runtime address `addr`, for its innermost logical frame
    pub fn location(&self, addr: u64) -> Option<(&str, u32)> {
        let frame = self.logical_frames(addr)?.next()?;
        Some((frame.file, frame.line))
    }

    #[cfg(test)]
    fn from_parts(
        bias: u64,
        functions: &[(u64, u64, &str)],
        rows: &[(u64, u64, &[(&str, &str, u32)])],
    ) -> Self {
        let functions = functions
            .iter()
            .map(|&(start, end, name)| FunctionEntry { start, end, name: name.into() })
            .collect();
        let hidden = entry_point_names();
        let mut collected = Rows::default();
        for &(start, end, chain) in rows {
            let chain: Vec<InlineFrame> = chain
                .iter()
                .map(|&(name, file, line)| collected.inline_frame(name, file, line, &hidden))
                .collect();
            collected.push(start, end, &chain);
        }
        Self {
            bias,
            mapped: None,
            functions,
            lines: collected.lines,
            frames: collected.frames,
            names: collected.names.strings,
            files: collected.files.strings,
        }
    }
}

fn read(path: &Path) -> Result<Vec<u8>, SymbolError> {
    fs::read(path).map_err(|source| SymbolError::ReadBinary { path: path.to_path_buf(), source })
}

fn parse<'data>(path: &Path, data: &'data [u8]) -> Result<object::File<'data>, SymbolError> {
    object::File::parse(data)
        .map_err(|source| SymbolError::ParseObject { path: path.to_path_buf(), source })
}

/// Difference between where the first segment is mapped and where it was linked
fn load_bias(binary: &object::File<'_>, mapped: MemoryRange) -> u64 {
    let linked = binary
        .segments()
        .filter(|segment| segment.file_range().0 == 0)
        .map(|segment| segment.address() & PAGE_MASK)
        .min()
        .unwrap_or(0);
    mapped.start.wrapping_sub(linked)
}

/// Qualified form of a possibly mangled symbol name
fn qualify(raw: &str) -> String {
    let demangled = format!("{:#}", demangle(raw));
    qualified_name::from_rust_path(&demangled)
}

fn collect_functions(obj: &object::File<'_>) -> Vec<FunctionEntry> {
    let mut raw: Vec<(u64, u64, &str)> = obj
        .symbols()
        .filter(|s| s.kind() == SymbolKind::Text && s.is_definition() && s.address() != 0)
        .filter_map(|s| Some((s.address(), s.size(), s.name().ok()?)))
        .collect();
    if raw.is_empty() {
        debug!("No static symbols, falling back to the dynamic symbol table");
        raw = obj
            .dynamic_symbols()
            .filter(|s| s.kind() == SymbolKind::Text && s.is_definition() && s.address() != 0)
            .filter_map(|s| Some((s.address(), s.size(), s.name().ok()?)))
            .collect();
    }

    // Aliases share an address; keep the sized one
    raw.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));
    raw.dedup_by_key(|s| s.0);

    let mut functions = Vec::with_capacity(raw.len());
    for (i, &(start, size, name)) in raw.iter().enumerate() {
        // Unsized symbols extend to the next one
        let end = if size > 0 {
            start + size
        } else {
            raw.get(i + 1).map_or(start + 1, |next| next.0)
        };
        functions.push(FunctionEntry { start, end, name: qualify(name).into_boxed_str() });
    }
    functions
}

/// Machine function covering link-time address `addr` in a sorted function list
fn function_at(functions: &[FunctionEntry], addr: u64) -> Option<&FunctionEntry> {
    let idx = functions.partition_point(|f| f.start <= addr).checked_sub(1)?;
    functions.get(idx).filter(|f| addr < f.end)
}

/// Qualified names of the capture entry points, which inline into their callers
fn entry_point_names() -> Vec<String> {
    crate::capture::ENTRY_POINTS.iter().map(|path| qualified_name::from_rust_path(path)).collect()
}

#[derive(Default)]
struct Interner {
    index: HashMap<Box<str>, u32>,
    strings: Vec<Box<str>>,
}

impl Interner {
    fn intern(&mut self, s: &str) -> u32 {
        if let Some(&idx) = self.index.get(s) {
            return idx;
        }
        let idx = u32::try_from(self.strings.len()).unwrap_or(u32::MAX);
        self.strings.push(s.into());
        self.index.insert(s.into(), idx);
        idx
    }
}

#[derive(Default)]
struct Rows {
    lines: Vec<LineRow>,
    frames: Vec<InlineFrame>,
    names: Interner,
    files: Interner,
    /// Mangled DWARF name to interned qualified name
    demangled: HashMap<Box<str>, u32>,
}

impl Rows {
    fn inline_frame(
        &mut self,
        name: &str,
        file: &str,
        line: u32,
        hidden: &[String],
    ) -> InlineFrame {
        let name = self.names.intern(name);
        self.frame_named(name, file, line, hidden)
    }

    fn mangled_frame(
        &mut self,
        raw: &str,
        file: &str,
        line: u32,
        hidden: &[String],
    ) -> InlineFrame {
        let name = match self.demangled.get(raw) {
            Some(&idx) => idx,
            None => {
                let idx = self.names.intern(&qualify(raw));
                self.demangled.insert(raw.into(), idx);
                idx
            }
        };
        self.frame_named(name, file, line, hidden)
    }

    fn frame_named(&mut self, name: u32, file: &str, line: u32, hidden: &[String]) -> InlineFrame {
        let hidden = self
            .names
            .strings
            .get(name as usize)
            .is_some_and(|n| hidden.iter().any(|h| h.as_str() == &**n));
        InlineFrame { name, file: self.files.intern(file), line, hidden }
    }

    /// Append a row; adjacent rows with equal chains collapse into one
    fn push(&mut self, start: u64, end: u64, chain: &[InlineFrame]) {
        if let Some(last) = self.lines.last_mut() {
            let first = last.first as usize;
            let same = self.frames.get(first..first + last.len as usize) == Some(chain);
            if last.end == start && same {
                last.end = end;
                return;
            }
        }
        let first = u32::try_from(self.frames.len()).unwrap_or(u32::MAX);
        let len = u32::try_from(chain.len()).unwrap_or(u32::MAX);
        self.frames.extend_from_slice(chain);
        self.lines.push(LineRow { start, end, first, len });
    }
}

fn collect_rows(
    obj: &object::File<'_>,
    functions: &[FunctionEntry],
) -> Result<Rows, SymbolError> {
    let endian = if obj.is_little_endian() { RunTimeEndian::Little } else { RunTimeEndian::Big };

    let load_section = |id: gimli::SectionId| -> Result<EndianRcSlice<RunTimeEndian>, gimli::Error> {
        let data = obj
            .section_by_name(id.name())
            .and_then(|section| section.uncompressed_data().ok())
            .unwrap_or(Cow::Borrowed(&[][..]));
        Ok(EndianRcSlice::new(Rc::from(&*data), endian))
    };

    let dwarf = gimli::Dwarf::load(&load_section)?;
    let ctx = Context::from_dwarf(dwarf)?;

    let mut spans: Vec<(u64, u64, &str, u32)> = Vec::new();
    for (start, len, location) in ctx.find_location_range(0, u64::MAX)? {
        let (Some(file), Some(line)) = (location.file, location.line) else { continue };
        if line == 0 || len == 0 {
            continue;
        }
        spans.push((start, start.saturating_add(len), file, line));
    }
    spans.sort_by_key(|span| span.0);

    let hidden = entry_point_names();
    let mut rows = Rows::default();
    let mut chain: Vec<InlineFrame> = Vec::new();
    for (start, end, file, line) in spans {
        let Some(machine) = function_at(functions, start) else { continue };
        chain.clear();

        // Inlined callees first, out to the machine function
        if let Ok(mut frame_iter) = ctx.find_frames(start).skip_all_loads() {
            while let Ok(Some(frame)) = frame_iter.next() {
                let (file, line) = frame
                    .location
                    .map_or(("", 0), |loc| (loc.file.unwrap_or(""), loc.line.unwrap_or(0)));
                let raw = frame.function.as_ref().and_then(|f| f.raw_name().ok());
                let inline_frame = match raw {
                    Some(raw) => rows.mangled_frame(&raw, file, line, &hidden),
                    None => rows.inline_frame(&machine.name, file, line, &hidden),
                };
                chain.push(inline_frame);
            }
        }
        // No DWARF function covers the row
        if chain.is_empty() {
            chain.push(rows.inline_frame(&machine.name, file, line, &hidden));
        }
        rows.push(start, end, &chain);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SymbolTable {
        SymbolTable::from_parts(
            0x1000,
            &[
                (0x100, 0x180, "app.main"),
                (0x180, 0x200, "app/net/tcp.connect"),
                (0x300, 0x340, "app/net/tcp.close"),
            ],
            &[
                (0x100, 0x120, &[("app.main", "src/main.rs", 10)]),
                (0x120, 0x180, &[("app.main", "src/main.rs", 11)]),
                (0x180, 0x200, &[("app/net/tcp.connect", "src/net/tcp.rs", 42)]),
            ],
        )
    }

    /// `app.main` with `app/net.dial` inlined at line 12, and `app/net.resolve`
    /// inlined into that at line 30
    fn inlined_table() -> SymbolTable {
        SymbolTable::from_parts(
            0,
            &[(0x100, 0x200, "app.main")],
            &[
                (0x100, 0x110, &[("app.main", "src/main.rs", 11)]),
                (
                    0x110,
                    0x120,
                    &[("app/net.dial", "src/net.rs", 29), ("app.main", "src/main.rs", 12)],
                ),
                (
                    0x120,
                    0x130,
                    &[
                        ("app/net.resolve", "src/net.rs", 50),
                        ("app/net.dial", "src/net.rs", 30),
                        ("app.main", "src/main.rs", 12),
                    ],
                ),
                (
                    0x130,
                    0x140,
                    &[
                        ("frameof/capture.capture_here", "src/capture.rs", 15),
                        ("app.main", "src/main.rs", 13),
                    ],
                ),
            ],
        )
    }

    #[test]
    fn test_function_lookup_applies_bias() {
        let table = table();
        assert_eq!(table.function(0x1100), Some((0x1100, "app.main")));
        assert_eq!(table.function(0x117f), Some((0x1100, "app.main")));
        assert_eq!(table.function(0x1180), Some((0x1180, "app/net/tcp.connect")));
        assert_eq!(table.function(0x1310), Some((0x1300, "app/net/tcp.close")));
    }

    #[test]
    fn test_function_lookup_misses() {
        let table = table();
        assert_eq!(table.function(0), None);
        assert_eq!(table.function(0x10ff), None);
        // Gap between connect and close
        assert_eq!(table.function(0x1250), None);
        assert_eq!(table.function(0x1340), None);
        // Below the bias
        assert_eq!(table.function(0x50), None);
    }

    #[test]
    fn test_location_lookup() {
        let table = table();
        assert_eq!(table.location(0x1100), Some(("src/main.rs", 10)));
        assert_eq!(table.location(0x1125), Some(("src/main.rs", 11)));
        assert_eq!(table.location(0x11ff), Some(("src/net/tcp.rs", 42)));
        assert_eq!(table.location(0x1200), None);
        assert_eq!(table.location(0), None);
    }

    #[test]
    fn test_lookup_is_idempotent() {
        let table = table();
        assert_eq!(table.function(0x1190), table.function(0x1190));
        assert_eq!(table.location(0x1190), table.location(0x1190));
    }

    #[test]
    fn test_files_are_interned() {
        let table = table();
        assert_eq!(table.stats().files, 2);
        assert_eq!(table.stats().line_rows, 3);
        assert_eq!(table.stats().logical_frames, 3);
        assert_eq!(table.stats().functions, 3);
    }

    #[test]
    fn test_inline_chain_innermost_first() {
        let table = inlined_table();
        let frames: Vec<_> = table.logical_frames(0x125).expect("row should resolve").collect();
        let levels: Vec<_> = frames.iter().map(|f| (f.qualified_name, f.file, f.line)).collect();
        assert_eq!(
            levels,
            [
                ("app/net.resolve", "src/net.rs", 50),
                ("app/net.dial", "src/net.rs", 30),
                ("app.main", "src/main.rs", 12),
            ]
        );
        // Every level belongs to the one machine function
        assert!(frames.iter().all(|f| f.entry == 0x100));
        assert_eq!(table.inline_depth(0x125), Some(3));
    }

    #[test]
    fn test_location_pairs_with_innermost_name() {
        let table = inlined_table();
        assert_eq!(table.location(0x115), Some(("src/net.rs", 29)));
        let innermost = table.logical_frames(0x115).and_then(|mut f| f.next());
        assert_eq!(innermost.map(|f| f.qualified_name), Some("app/net.dial"));
        // The machine function is still the outer one
        assert_eq!(table.function(0x115), Some((0x100, "app.main")));
    }

    #[test]
    fn test_inlined_entry_points_are_skipped() {
        let table = inlined_table();
        let frames: Vec<_> = table.logical_frames(0x135).expect("row should resolve").collect();
        assert_eq!(frames.len(), 1);
        assert_eq!((frames[0].qualified_name, frames[0].line), ("app.main", 13));
        assert_eq!(table.location(0x135), Some(("src/main.rs", 13)));
    }

    #[test]
    fn test_equal_adjacent_chains_merge() {
        let table = SymbolTable::from_parts(
            0,
            &[(0x100, 0x200, "app.main")],
            &[
                (0x100, 0x110, &[("app.main", "src/main.rs", 4)]),
                (0x110, 0x120, &[("app.main", "src/main.rs", 4)]),
                (0x120, 0x130, &[("app/io.read", "src/io.rs", 4), ("app.main", "src/main.rs", 4)]),
            ],
        );
        assert_eq!(table.stats().line_rows, 2);
        assert_eq!(table.inline_depth(0x11f), Some(1));
        assert_eq!(table.inline_depth(0x120), Some(2));
    }

    #[test]
    fn test_logical_frames_need_a_machine_function() {
        let table = inlined_table();
        assert!(table.logical_frames(0x1000).is_none());
        assert_eq!(table.inline_depth(0), None);
    }

    #[test]
    fn test_empty_table_resolves_nothing() {
        let table = SymbolTable::empty();
        let here = test_empty_table_resolves_nothing as fn() as usize as u64;
        assert_eq!(table.function(here), None);
        assert_eq!(table.location(here), None);
    }

    #[test]
    fn test_load_missing_binary_fails() {
        let config =
            SymbolConfig { binary: PathBuf::from("/nonexistent/frameof-binary"), debug_file: None };
        let err = SymbolTable::load(&config).unwrap_err();
        assert!(matches!(err, SymbolError::ReadBinary { .. }));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_load_current_executable() {
        let config = SymbolConfig {
            binary: std::env::current_exe().expect("Failed to get current exe"),
            debug_file: None,
        };
        let table = SymbolTable::load(&config).expect("test binary should load");
        assert!(table.stats().functions > 0);
        assert!(table.stats().line_rows > 0);

        let here = test_load_current_executable as fn() as usize as u64;
        let (entry, name) = table.function(here).expect("this test should be in the table");
        assert_eq!(entry, here);
        assert_eq!(name, "frameof/symbolization/symbol_table/tests.test_load_current_executable");

        let outermost = table
            .logical_frames(here)
            .and_then(Iterator::last)
            .expect("this test should have line info");
        assert!(outermost.file.ends_with("symbol_table.rs"), "unexpected file {}", outermost.file);
        assert!(outermost.line > 0);
        assert!(table.stats().logical_frames >= table.stats().line_rows);
    }
}

//! Pre-flight checks for frameof
//!
//! Inspects a binary for the symbol information frame resolution depends on,
//! so a tool can warn up front instead of printing unresolved frames.

use anyhow::{bail, Context, Result};
use object::{Object, ObjectSection};
use std::path::Path;

/// Symbol information present in a binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugSymbols {
    /// `.symtab` (function names and entry addresses)
    pub has_symtab: bool,
    /// `.debug_line` (source files and lines)
    pub has_line_info: bool,
}

impl DebugSymbols {
    /// Warning to show for this binary, if any
    #[must_use]
    pub fn warning(self) -> Option<&'static str> {
        match (self.has_symtab, self.has_line_info) {
            (true, true) => None,
            (false, false) => Some("binary stripped, frames will be unresolved"),
            (true, false) => Some("no DWARF line info, frames will be unresolved"),
            (false, true) => Some("no symbol table, frames will be unresolved"),
        }
    }
}

/// Check if the binary has the symbols needed to resolve frames
///
/// # Errors
/// Returns an error if the path is not a readable object file
pub fn check_debug_symbols(target_path: &Path) -> Result<DebugSymbols> {
    if !target_path.is_file() {
        bail!("Binary not found: {}", target_path.display());
    }

    let file_data = std::fs::read(target_path)
        .with_context(|| format!("Failed to read binary: {}", target_path.display()))?;

    let obj = object::File::parse(&*file_data)
        .with_context(|| format!("Not an object file: {}", target_path.display()))?;

    let has_line_info = obj.section_by_name(".debug_line").is_some_and(|s| s.size() > 0);
    let has_symtab = obj.section_by_name(".symtab").is_some_and(|s| s.size() > 0);

    Ok(DebugSymbols { has_symtab, has_line_info })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_matrix() {
        let full = DebugSymbols { has_symtab: true, has_line_info: true };
        assert_eq!(full.warning(), None);

        let stripped = DebugSymbols { has_symtab: false, has_line_info: false };
        assert!(stripped.warning().unwrap().contains("stripped"));

        let no_lines = DebugSymbols { has_symtab: true, has_line_info: false };
        assert!(no_lines.warning().unwrap().contains("line info"));
    }

    #[test]
    fn test_missing_binary() {
        let err = check_debug_symbols(Path::new("/nonexistent/frameof")).unwrap_err();
        assert!(err.to_string().contains("Binary not found"));
    }

    #[test]
    fn test_not_an_object_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "plain text").unwrap();
        let err = check_debug_symbols(&path).unwrap_err();
        assert!(err.to_string().contains("Not an object file"));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_current_executable_has_symbols() {
        let exe = std::env::current_exe().unwrap();
        let symbols = check_debug_symbols(&exe).unwrap();
        assert_eq!(symbols.warning(), None);
    }
}

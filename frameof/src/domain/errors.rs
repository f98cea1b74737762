//! Structured error types for frameof
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! None of these reach callers of the capture API: a table that fails to load
//! degrades to unresolved frames.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SymbolError {
    #[error("Failed to locate the current executable: {0}")]
    CurrentExe(#[source] io::Error),

    #[error("Failed to read binary {path}: {source}")]
    ReadBinary {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse object file {path}: {source}")]
    ParseObject {
        path: PathBuf,
        #[source]
        source: object::Error,
    },

    #[error("Failed to load DWARF debug information: {0}")]
    Dwarf(#[from] gimli::Error),

    #[error("Failed to read /proc/self/maps: {0}")]
    MemoryMapsReadFailed(#[source] io::Error),

    #[error("No memory range found for binary {0}")]
    NoMemoryRangeFound(String),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_memory_range_display() {
        let err = SymbolError::NoMemoryRangeFound("/usr/bin/my-app".to_string());
        assert_eq!(err.to_string(), "No memory range found for binary /usr/bin/my-app");
    }

    #[test]
    fn test_read_binary_error_names_path() {
        let err = SymbolError::ReadBinary {
            path: PathBuf::from("/missing/app"),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };
        assert!(err.to_string().contains("/missing/app"));
        assert!(err.to_string().contains("not found"));
    }
}

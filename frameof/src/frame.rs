//! Resolved call-site snapshots

use serde::Serialize;
use std::fmt;

use crate::domain::Address;
use crate::qualified_name;
use crate::symbolization;

/// One resolved call site
///
/// A `Frame` is an immutable snapshot: its strings borrow from the
/// process-lifetime symbol table, so it is `Copy` and producing one never
/// allocates. An unresolved frame has zero [`line`](Frame::line), zero
/// [`entry`](Frame::entry) and empty name and file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Frame {
    pc: Address,
    entry: Address,
    #[serde(rename = "function")]
    qualified_name: &'static str,
    file: &'static str,
    line: u32,
}

impl Frame {
    /// Resolve a return address captured from the stack
    ///
    /// The call instruction (`pc - 1`) is looked up and its innermost source
    /// function reported. Unless both the function and its source line
    /// resolve, only `pc` is kept.
    #[must_use]
    pub fn resolve(pc: Address) -> Self {
        Self::resolve_inlined(pc, 0)
    }

    /// Resolve inline level `inline_depth` of a return address
    ///
    /// Level 0 is the innermost source function at the call instruction, level
    /// 1 the function it was inlined into, and so on. Name, file and line all
    /// come from the same level.
    #[must_use]
    pub fn resolve_inlined(pc: Address, inline_depth: usize) -> Self {
        let unresolved = Self { pc, ..Self::default() };
        if pc.is_zero() {
            return unresolved;
        }
        let Some(frame) =
            symbolization::frames(pc.call_site()).and_then(|mut frames| frames.nth(inline_depth))
        else {
            return unresolved;
        };
        let entry = Address(symbolization::to_usize(frame.entry));
        if entry.is_zero() || frame.line == 0 {
            return unresolved;
        }
        Self { pc, entry, qualified_name: frame.qualified_name, file: frame.file, line: frame.line }
    }

    /// A frame carrying only a qualified name, for interpreting names directly
    #[must_use]
    pub const fn with_name(qualified_name: &'static str) -> Self {
        Self { pc: Address::ZERO, entry: Address::ZERO, qualified_name, file: "", line: 0 }
    }

    #[must_use]
    pub const fn pc(&self) -> Address {
        self.pc
    }

    #[must_use]
    pub const fn entry(&self) -> Address {
        self.entry
    }

    #[must_use]
    pub const fn qualified_name(&self) -> &'static str {
        self.qualified_name
    }

    #[must_use]
    pub const fn file(&self) -> &'static str {
        self.file
    }

    #[must_use]
    pub const fn line(&self) -> u32 {
        self.line
    }

    /// True when the frame was attributed to a function and a source line
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        !self.entry.is_zero() && self.line != 0
    }

    /// File and line of the call site
    #[must_use]
    pub const fn location(&self) -> (&'static str, u32) {
        (self.file, self.line)
    }

    /// Function name: `connect` for `my_crate/net/tcp.connect`
    #[must_use]
    pub fn function_name(&self) -> &'static str {
        qualified_name::function_name(self.qualified_name)
    }

    /// Package name: `tcp` for `my_crate/net/tcp.connect`
    #[must_use]
    pub fn package_name(&self) -> &'static str {
        qualified_name::package_name(self.qualified_name)
    }

    /// Package path: `my_crate/net` for `my_crate/net/tcp.connect`
    #[must_use]
    pub fn package_path(&self) -> &'static str {
        qualified_name::package_path(self.qualified_name)
    }

    /// `"<qualified name>\n\t<file>:<line>"`
    #[must_use]
    pub fn describe(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n\t{}:{}", self.qualified_name, self.file, self.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_frame_accessors() {
        let fr = Frame::with_name("example.org/path/of/pkg.Func");
        assert_eq!(fr.package_path(), "example.org/path/of");
        assert_eq!(fr.package_name(), "pkg");
        assert_eq!(fr.function_name(), "Func");
    }

    #[test]
    fn test_trailing_dot() {
        let fr = Frame::with_name("pkg.");
        assert_eq!(fr.package_path(), "pkg");
        assert_eq!(fr.package_name(), "pkg");
        assert_eq!(fr.function_name(), "");
    }

    #[test]
    fn test_default_frame_is_unresolved() {
        let fr = Frame::default();
        assert!(!fr.is_resolved());
        assert_eq!(fr.pc(), Address::ZERO);
        assert_eq!(fr.location(), ("", 0));
        assert_eq!(fr.function_name(), "");
        assert_eq!(fr.package_name(), "");
        assert_eq!(fr.package_path(), "");
    }

    #[test]
    fn test_resolve_zero_is_default() {
        assert_eq!(Frame::resolve(Address::ZERO), Frame::default());
    }

    #[test]
    fn test_resolve_unknown_address_keeps_pc() {
        let fr = Frame::resolve(Address(1));
        assert_eq!(fr.pc(), Address(1));
        assert_eq!(fr.entry(), Address::ZERO);
        assert_eq!(fr.line(), 0);
        assert_eq!(fr.qualified_name(), "");
        assert_eq!(fr.file(), "");
    }

    #[test]
    fn test_resolved_needs_entry_and_line() {
        let full = Frame {
            pc: Address(0x1010),
            entry: Address(0x1000),
            qualified_name: "app.main",
            file: "src/main.rs",
            line: 7,
        };
        assert!(full.is_resolved());
        assert!(!Frame { line: 0, ..full }.is_resolved());
        assert!(!Frame { entry: Address::ZERO, ..full }.is_resolved());
        assert!(!Frame::with_name("app.main").is_resolved());
    }

    #[test]
    fn test_resolve_inlined_past_chain_keeps_pc() {
        let pc = Address(test_resolve_inlined_past_chain_keeps_pc as fn() as usize + 1);
        let fr = Frame::resolve_inlined(pc, 10_000);
        assert_eq!(fr.pc(), pc);
        assert!(!fr.is_resolved());
        assert_eq!(fr.qualified_name(), "");
    }

    #[test]
    fn test_describe() {
        let fr = Frame {
            pc: Address(0x1010),
            entry: Address(0x1000),
            qualified_name: "app/net/tcp.connect",
            file: "src/net/tcp.rs",
            line: 42,
        };
        assert_eq!(fr.describe(), "app/net/tcp.connect\n\tsrc/net/tcp.rs:42");
        assert_eq!(fr.location(), ("src/net/tcp.rs", 42));
    }

    #[test]
    fn test_serialize() {
        let fr = Frame {
            pc: Address(16),
            entry: Address(8),
            qualified_name: "app.main",
            file: "src/main.rs",
            line: 3,
        };
        let json = serde_json::to_value(fr).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "pc": 16,
                "entry": 8,
                "function": "app.main",
                "file": "src/main.rs",
                "line": 3,
            })
        );
    }
}

//! Newtypes shared by the walker, the resolver and [`crate::Frame`]

use serde::Serialize;
use std::fmt;

/// An address in the running process (program counter or function entry)
///
/// Zero is the sentinel for "unresolved".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Address(pub usize);

impl Address {
    pub const ZERO: Address = Address(0);

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Address of the instruction before this one
    ///
    /// Return addresses point just past the call; looking up `pc - 1` attributes
    /// the frame to the call instruction instead.
    #[must_use]
    pub const fn call_site(self) -> Address {
        Address(self.0.saturating_sub(1))
    }

    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0 as u64
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

impl From<usize> for Address {
    fn from(value: usize) -> Self {
        Address(value)
    }
}

/// A function claimed by the symbol table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    /// Runtime address of the function's first instruction
    pub entry: Address,
    /// `[<path>/]<package>.<function>` form of the function name
    pub qualified_name: &'static str,
}

//! Stack walking on the calling thread
//!
//! Frames are located relative to a *marker*: the entry address of the public
//! capture function that started the walk. Everything the unwinder reports
//! before the marker frame (its own machinery) is discarded, so depth zero is
//! always the frame that called the capture function, however many internal
//! frames the platform unwinder adds.
//!
//! Depth counts logical frames. A machine frame whose return address lies in
//! inlined code counts once per source function, innermost first, so a wrapper
//! inlined into its caller is still a level of its own. Frames removed by tail
//! calls are gone from the machine stack and cannot be counted.

#![allow(unsafe_code)] // the unsynchronized unwinder is unsafe to call

use crate::domain::Address;
use crate::symbolization;

/// Maximum number of frames captured by [`stack_addresses`]
///
/// Deeper stacks lose their outermost frames.
pub const MAX_STACK_DEPTH: usize = 32;

/// A logical frame on the stack: a return address and the inline level within it
///
/// `inline_depth` 0 is the innermost source function at `pc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallSite {
    pub pc: Address,
    pub inline_depth: usize,
}

impl CallSite {
    pub const ZERO: Self = Self { pc: Address::ZERO, inline_depth: 0 };
}

/// Entry address of the capture function a walk starts from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker(usize);

impl Marker {
    #[must_use]
    pub const fn new(entry: usize) -> Self {
        Self(entry)
    }

    fn matches(self, frame: &backtrace::Frame) -> bool {
        if frame.symbol_address() as usize == self.0 {
            return true;
        }
        let ip = Address(frame.ip() as usize);
        symbolization::table()
            .function(ip.call_site().as_u64())
            .is_some_and(|(entry, _)| entry == self.0 as u64)
    }
}

/// Walk the current thread's stack, innermost frame first
fn walk<F: FnMut(&backtrace::Frame) -> bool>(visit: F) {
    // Build the table before unwinding so the callback only reads it
    symbolization::table();
    unwind(visit);
}

#[cfg(unix)]
fn unwind<F: FnMut(&backtrace::Frame) -> bool>(visit: F) {
    // SAFETY: the libunwind/libgcc unwinder used on unix targets only reads the
    // calling thread's stack and is safe to run from several threads at once.
    unsafe { backtrace::trace_unsynchronized(visit) }
}

// dbghelp is not thread-safe, so other targets take the unwinder's lock
#[cfg(not(unix))]
fn unwind<F: FnMut(&backtrace::Frame) -> bool>(visit: F) {
    backtrace::trace(visit);
}

/// Logical frame `skip` levels above the caller of the marker function
///
/// `None` when the stack is shallower than that or the marker frame was never
/// seen.
pub fn frame_address(marker: Marker, skip: usize) -> Option<CallSite> {
    let mut remaining: Option<usize> = None;
    let mut found = None;

    walk(|frame| {
        let Some(left) = remaining else {
            if marker.matches(frame) {
                remaining = Some(skip);
            }
            return true;
        };
        let pc = Address(frame.ip() as usize);
        if pc.is_zero() {
            return false;
        }
        let levels = symbolization::inline_depth(pc.call_site());
        if left < levels {
            found = Some(CallSite { pc, inline_depth: left });
            return false;
        }
        remaining = Some(left - levels);
        true
    });

    found
}

/// Fill `buf` with logical frames starting at the caller of the marker function
///
/// Returns how many entries were written.
pub fn stack_addresses(marker: Marker, buf: &mut [CallSite; MAX_STACK_DEPTH]) -> usize {
    let mut seen_marker = false;
    let mut count = 0;

    walk(|frame| {
        if !seen_marker {
            seen_marker = marker.matches(frame);
            return true;
        }
        let pc = Address(frame.ip() as usize);
        if pc.is_zero() {
            return false;
        }
        for inline_depth in 0..symbolization::inline_depth(pc.call_site()) {
            if count == MAX_STACK_DEPTH {
                return false;
            }
            buf[count] = CallSite { pc, inline_depth };
            count += 1;
        }
        count < MAX_STACK_DEPTH
    });

    count
}

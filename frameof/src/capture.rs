//! Capture entry points
//!
//! Each function reports frames from the perspective of *its caller*: depth
//! zero is the function that called `capture_*`, not the capture function
//! itself. All of them are safe to call from any number of threads, and the
//! single-frame captures never allocate once the symbol table is built.
//!
//! The public functions inline into the caller and call a private marker
//! function the walk is anchored on. The call is followed by a `black_box`, so
//! a wrapper such as `fn log_site() -> Frame { capture_caller() }` cannot turn
//! it into a tail call and drop itself from the stack. The inlined copies show
//! up in the DWARF inline chain under the paths in [`ENTRY_POINTS`] and are
//! never reported.

use std::hint::black_box;

use crate::frame::Frame;
use crate::walker::{self, CallSite, Marker, MAX_STACK_DEPTH};

/// Rust paths of the public capture functions
pub(crate) const ENTRY_POINTS: [&str; 4] = [
    concat!(module_path!(), "::capture_here"),
    concat!(module_path!(), "::capture_caller"),
    concat!(module_path!(), "::capture_skip"),
    concat!(module_path!(), "::capture_stack"),
];

/// The caller's own frame (depth 0)
#[allow(clippy::inline_always)]
#[inline(always)]
#[must_use]
pub fn capture_here() -> Frame {
    black_box(here_marked())
}

/// The frame that called the caller (depth 1)
///
/// For wrappers that report who invoked them.
#[allow(clippy::inline_always)]
#[inline(always)]
#[must_use]
pub fn capture_caller() -> Frame {
    black_box(skip_marked(1))
}

/// The frame `n` levels above the caller
///
/// `capture_skip(0)` is [`capture_here`] and `capture_skip(1)` is
/// [`capture_caller`]. Depths beyond the stack give an unresolved frame with a
/// zero `pc`.
#[allow(clippy::inline_always)]
#[inline(always)]
#[must_use]
pub fn capture_skip(n: usize) -> Frame {
    black_box(skip_marked(n))
}

/// Every frame on the current stack, innermost (the caller) first
///
/// At most [`MAX_STACK_DEPTH`] frames are returned; the outermost frames of a
/// deeper stack are dropped.
#[allow(clippy::inline_always)]
#[inline(always)]
#[must_use]
pub fn capture_stack() -> Vec<Frame> {
    black_box(stack_marked())
}

#[inline(never)]
fn here_marked() -> Frame {
    let marker = Marker::new(here_marked as fn() -> Frame as usize);
    frame_at(walker::frame_address(marker, 0))
}

#[inline(never)]
fn skip_marked(n: usize) -> Frame {
    let marker = Marker::new(skip_marked as fn(usize) -> Frame as usize);
    frame_at(walker::frame_address(marker, n))
}

#[inline(never)]
fn stack_marked() -> Vec<Frame> {
    let marker = Marker::new(stack_marked as fn() -> Vec<Frame> as usize);
    let mut sites = [CallSite::ZERO; MAX_STACK_DEPTH];
    let n = walker::stack_addresses(marker, &mut sites);
    sites[..n].iter().map(|site| Frame::resolve_inlined(site.pc, site.inline_depth)).collect()
}

fn frame_at(site: Option<CallSite>) -> Frame {
    site.map_or_else(Frame::default, |site| Frame::resolve_inlined(site.pc, site.inline_depth))
}

//! # frameof - Call Frames From the Caller's Perspective
//!
//! frameof captures call-stack frames of the calling thread with minimal
//! overhead, as a building block for tracing, logging and error reporting.
//! Every capture function answers relative to *its caller*:
//!
//! ```rust,no_run
//! use frameof::{capture_caller, capture_here, capture_skip};
//!
//! let mine = capture_here(); // my current frame
//! let who = capture_caller(); // my caller
//! let up = capture_skip(2); // my caller's caller
//! println!("{mine}");
//! ```
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────┐
//! │ Capture API  │──▶│ Stack Walker │──▶│   Resolver   │──▶│  Frame   │
//! │  capture_*   │   │  (unwinder)  │   │ (symbol tbl) │   │ (record) │
//! └──────────────┘   └──────────────┘   └──────────────┘   └──────────┘
//! ```
//!
//! - [`capture`]: the four entry points
//! - [`walker`]: unwinds the calling thread's stack, anchored on the capture
//!   function so unwinder internals never count towards depth
//! - [`symbolization`]: process-wide, read-only table mapping addresses to
//!   function entry, qualified name, file and line
//! - [`frame`]: the immutable [`Frame`] value and its accessors
//! - [`qualified_name`]: pure decomposition of `[<path>/]<package>.<function>`
//!
//! Supporting modules: [`domain`] (newtypes and errors), [`export`] (JSON
//! records), [`preflight`] (debug-symbol checks) and [`cli`] (the `frameof`
//! binary's arguments).
//!
//! ## Qualified names
//!
//! Rust paths are rewritten into qualified-name form when the table is built:
//! `my_crate::net::tcp::connect` becomes `my_crate/net/tcp.connect`, whose
//! package path is `my_crate/net`, package `tcp` and function `connect`.
//!
//! ## Guarantees
//!
//! - Single-frame captures do not allocate once the table is built; a
//!   [`Frame`] is `Copy` and borrows its strings from the table
//! - No locks on the capture path; any number of threads may capture at once
//! - Nothing fails loudly: unresolvable frames have zero line and entry and
//!   empty strings, and malformed names still decompose deterministically
//! - [`capture_stack`] returns at most [`MAX_STACK_DEPTH`] frames, dropping
//!   the outermost ones of deeper stacks
//! - Depth counts source functions, not machine frames: a function inlined
//!   into its caller is still reported as its own frame, with its own name
//!   and line, as long as the build carries DWARF inline info
//! - Frames removed by tail calls (a call in return position compiled into a
//!   jump) are not on the stack and never appear in captures. A wrapper that
//!   must be counted should do some work after its call returns, such as
//!   passing the result through [`std::hint::black_box`]
//!
//! Resolution needs the executable's symbol table and DWARF line info
//! (`debug = true` or line tables in the build profile).

pub mod capture;
pub mod cli;
pub mod domain;
pub mod export;
pub mod frame;
pub mod preflight;
pub mod qualified_name;
pub mod symbolization;
pub mod walker;

pub use capture::{capture_caller, capture_here, capture_skip, capture_stack};
pub use domain::Address;
pub use frame::Frame;
pub use walker::MAX_STACK_DEPTH;

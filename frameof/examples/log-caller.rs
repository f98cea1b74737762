//! Logging helper that tags each message with its call site
//!
//! `trace_event` reports where *it was called from*, not where it lives, by
//! capturing its caller's frame. Capturing the frame allocates nothing; only
//! the log record itself does.
//!
//! Run with: RUST_LOG=info cargo run --example log-caller

use frameof::{capture_caller, capture_stack};
use log::info;

#[inline(never)]
fn trace_event(message: &str) {
    let frame = capture_caller();
    let (file, line) = frame.location();
    info!("[{}::{} {file}:{line}] {message}", frame.package_name(), frame.function_name());
}

#[inline(never)]
fn handle_request(id: u32) {
    trace_event("request received");
    if id % 2 == 0 {
        validate(id);
    }
    trace_event("request done");
}

#[inline(never)]
fn validate(id: u32) {
    trace_event(&format!("validating request {id}"));
    for frame in capture_stack().iter().take(3) {
        println!("  at {} ({}:{})", frame.function_name(), frame.file(), frame.line());
    }
}

fn main() {
    env_logger::init();
    frameof::symbolization::init();

    for id in 0..3 {
        handle_request(id);
    }
}

#![deny(missing_docs)]
//! Shared logging utilities for the courier workspace.
//!
//! Provides the `courier_*` logging macros used across the codebase and a
//! minimal test initializer for the global logger. Every line is prefixed with
//! the event-loop dispatch sequence number of the current thread, so log output
//! from one dispatched message can be grouped after the fact.

use std::cell::Cell;

#[doc(hidden)]
pub use log;

thread_local! {
    /// Sequence number of the message currently being dispatched on this thread.
    static DISPATCH_SEQ: Cell<u64> = const { Cell::new(0) };
}

/// Sets the dispatch sequence number for the current thread.
/// The event loop calls this once per dispatched message.
pub fn set_dispatch_seq(seq: u64) {
    DISPATCH_SEQ.with(|v| v.set(seq));
}

/// Retrieves the dispatch sequence number for the current thread.
/// Returns 0 outside the event loop.
pub fn dispatch_seq() -> u64 {
    DISPATCH_SEQ.with(|v| v.get())
}

/// Logs a trace-level message tagged with the dispatch sequence.
#[macro_export]
macro_rules! courier_trace {
    ($($arg:tt)*) => {{
        $crate::log::trace!("[#{}] {}", $crate::dispatch_seq(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message tagged with the dispatch sequence.
#[macro_export]
macro_rules! courier_debug {
    ($($arg:tt)*) => {{
        $crate::log::debug!("[#{}] {}", $crate::dispatch_seq(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message tagged with the dispatch sequence.
#[macro_export]
macro_rules! courier_info {
    ($($arg:tt)*) => {{
        $crate::log::info!("[#{}] {}", $crate::dispatch_seq(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message tagged with the dispatch sequence.
#[macro_export]
macro_rules! courier_warn {
    ($($arg:tt)*) => {{
        $crate::log::warn!("[#{}] {}", $crate::dispatch_seq(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message tagged with the dispatch sequence.
#[macro_export]
macro_rules! courier_error {
    ($($arg:tt)*) => {{
        $crate::log::error!("[#{}] {}", $crate::dispatch_seq(), format_args!($($arg)*));
    }};
}

/// Initializes a simple terminal logger for use in tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}

#![deny(missing_docs)]
//! Shared logging utilities for the job monitor workspace.
//!
//! This crate provides the `monitor_*` logging macros used across the
//! codebase, a per-thread session tag that prefixes channel log lines, and a
//! minimal test initializer for the global logger.

use std::cell::Cell;

thread_local! {
    /// Session id currently being handled on this thread (0 = none).
    static SESSION_TAG: Cell<u64> = const { Cell::new(0) };
}

/// Sets the session id that log lines emitted on this thread belong to.
/// The monitor driver calls this before applying each channel event.
pub fn set_session_tag(session: u64) {
    SESSION_TAG.with(|v| v.set(session));
}

/// Retrieves the session id tagged on the current thread.
/// Returns 0 if no session has been tagged.
pub fn session_tag() -> u64 {
    SESSION_TAG.with(|v| v.get())
}

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! monitor_trace {
    ($($arg:tt)*) => {{
        log::trace!("[s{}] {}", $crate::session_tag(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! monitor_debug {
    ($($arg:tt)*) => {{
        log::debug!("[s{}] {}", $crate::session_tag(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! monitor_info {
    ($($arg:tt)*) => {{
        log::info!("[s{}] {}", $crate::session_tag(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! monitor_warn {
    ($($arg:tt)*) => {{
        log::warn!("[s{}] {}", $crate::session_tag(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! monitor_error {
    ($($arg:tt)*) => {{
        log::error!("[s{}] {}", $crate::session_tag(), format_args!($($arg)*));
    }};
}

/// Initializes a simple terminal logger for use in tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // A logger may already be set by another test in the same binary.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}

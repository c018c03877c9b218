//! Logging interface for aura-fs
//!
//! A single process-wide pipeline: messages go to the installed handler,
//! or to the [`log`] facade when no handler is installed.
//!
//! # Example
//!
//! ```no_run
//! use aura_fs::{LogLevel, set_log_handler, clear_log_handler, log_emit};
//!
//! set_log_handler(|level, msg| {
//!     eprintln!("[{:?}] {}", level, msg);
//! });
//!
//! log_emit(LogLevel::Info, "proactor started");
//!
//! clear_log_handler();
//! ```

use std::sync::{Arc, Mutex};

/// Log severity levels (match syslog priorities 1:1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// Error condition (syslog LOG_ERR = 3)
    Error = 3,
    /// Warning condition (syslog LOG_WARNING = 4)
    Warning = 4,
    /// Normal but significant (syslog LOG_NOTICE = 5)
    Notice = 5,
    /// Informational (syslog LOG_INFO = 6)
    Info = 6,
    /// Debug-level (syslog LOG_DEBUG = 7)
    Debug = 7,
}

impl LogLevel {
    /// Syslog priority value
    pub fn priority(self) -> i32 {
        self as i32
    }

    /// Short name for the log level ("ERR", "WARN", etc.)
    pub fn name(self) -> &'static str {
        match self {
            LogLevel::Error => "ERR",
            LogLevel::Warning => "WARN",
            LogLevel::Notice => "NOTICE",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }

    fn to_facade(self) -> log::Level {
        match self {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warning => log::Level::Warn,
            // log has no notice level
            LogLevel::Notice | LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

type Handler = Arc<dyn Fn(LogLevel, &str) + Send + Sync + 'static>;

/// Process-wide handler storage
static LOG_HANDLER: Mutex<Option<Handler>> = Mutex::new(None);

/// Install a process-wide log handler.
///
/// Replaces any previously installed handler. The handler is called from
/// whichever thread emits the log message; it must be thread-safe. It runs
/// without the registry lock held, so it may itself log or replace the
/// handler.
pub fn set_log_handler<F>(handler: F)
where
    F: Fn(LogLevel, &str) + Send + Sync + 'static,
{
    let mut guard = LOG_HANDLER.lock().unwrap_or_else(|e| e.into_inner());
    *guard = Some(Arc::new(handler));
}

/// Remove the current log handler.
///
/// Messages fall back to the `log` facade afterwards.
pub fn clear_log_handler() {
    let mut guard = LOG_HANDLER.lock().unwrap_or_else(|e| e.into_inner());
    *guard = None;
}

/// Emit a log message through the registered handler, or the `log` facade.
pub fn log_emit(level: LogLevel, msg: &str) {
    let handler = LOG_HANDLER
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .clone();
    match handler {
        Some(handler) => {
            // A panicking handler must not unwind into the engine
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                handler(level, msg);
            }));
        }
        None => log::log!(target: "aura_fs", level.to_facade(), "{}", msg),
    }
}

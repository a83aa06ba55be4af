//! Leveled diagnostics channel.
//!
//! Every pipeline stage is handed a [`Notifier`] explicitly instead of
//! writing to a process-wide logger. The default sink forwards to `tracing`;
//! tests install a [`MemorySink`] and inspect what was emitted.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// Verbosity threshold, from silent to chatty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Verbosity {
    Quiet,
    Error,
    Warning,
    Notice,
    Info,
    Debug,
}

impl Verbosity {
    pub fn as_str(self) -> &'static str {
        match self {
            Verbosity::Quiet => "QUIET",
            Verbosity::Error => "ERROR",
            Verbosity::Warning => "WARNING",
            Verbosity::Notice => "NOTICE",
            Verbosity::Info => "INFO",
            Verbosity::Debug => "DEBUG",
        }
    }

    pub fn as_tracing_level(self) -> Option<tracing::Level> {
        match self {
            Verbosity::Quiet => None,
            Verbosity::Error => Some(tracing::Level::ERROR),
            Verbosity::Warning => Some(tracing::Level::WARN),
            Verbosity::Notice => Some(tracing::Level::INFO),
            Verbosity::Info => Some(tracing::Level::DEBUG),
            Verbosity::Debug => Some(tracing::Level::TRACE),
        }
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verbosity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "QUIET" => Ok(Verbosity::Quiet),
            "ERROR" => Ok(Verbosity::Error),
            "WARNING" => Ok(Verbosity::Warning),
            "NOTICE" => Ok(Verbosity::Notice),
            "INFO" => Ok(Verbosity::Info),
            "DEBUG" => Ok(Verbosity::Debug),
            _ => Err(format!(
                "unknown verbosity `{s}` (expected QUIET, ERROR, WARNING, NOTICE, INFO or DEBUG)"
            )),
        }
    }
}

/// Destination of diagnostics that passed the verbosity threshold.
pub trait NotifySink: Send + Sync {
    fn emit(&self, level: Verbosity, message: &str);
}

/// Forwards diagnostics to the `tracing` macros under the `genwrapper` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotifySink for TracingSink {
    fn emit(&self, level: Verbosity, message: &str) {
        match level {
            Verbosity::Quiet => {}
            Verbosity::Error => tracing::error!(target: "genwrapper", "{message}"),
            Verbosity::Warning => tracing::warn!(target: "genwrapper", "{message}"),
            Verbosity::Notice => tracing::info!(target: "genwrapper", "{message}"),
            Verbosity::Info => tracing::debug!(target: "genwrapper", "{message}"),
            Verbosity::Debug => tracing::trace!(target: "genwrapper", "{message}"),
        }
    }
}

/// Keeps every diagnostic in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<(Verbosity, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn records(&self) -> Vec<(Verbosity, String)> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Messages emitted at exactly `level`.
    pub fn messages(&self, level: Verbosity) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m)
            .collect()
    }
}

impl NotifySink for MemorySink {
    fn emit(&self, level: Verbosity, message: &str) {
        let mut records = match self.records.lock() {
            Ok(records) => records,
            Err(poisoned) => poisoned.into_inner(),
        };
        records.push((level, message.to_string()));
    }
}

/// A verbosity threshold bound to a sink.
#[derive(Clone)]
pub struct Notifier {
    threshold: Verbosity,
    sink: Arc<dyn NotifySink>,
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::tracing(Verbosity::Notice)
    }
}

impl Notifier {
    pub fn new(threshold: Verbosity, sink: Arc<dyn NotifySink>) -> Self {
        Self { threshold, sink }
    }

    /// A notifier that forwards to `tracing`.
    pub fn tracing(threshold: Verbosity) -> Self {
        Self::new(threshold, Arc::new(TracingSink))
    }

    /// A notifier that drops everything.
    pub fn silent() -> Self {
        Self::tracing(Verbosity::Quiet)
    }

    pub fn threshold(&self) -> Verbosity {
        self.threshold
    }

    pub fn enabled(&self, level: Verbosity) -> bool {
        level != Verbosity::Quiet && level <= self.threshold
    }

    pub fn log(&self, level: Verbosity, message: impl fmt::Display) {
        if self.enabled(level) {
            self.sink.emit(level, &message.to_string());
        }
    }

    pub fn error(&self, message: impl fmt::Display) {
        self.log(Verbosity::Error, message);
    }

    pub fn warning(&self, message: impl fmt::Display) {
        self.log(Verbosity::Warning, message);
    }

    pub fn notice(&self, message: impl fmt::Display) {
        self.log(Verbosity::Notice, message);
    }

    pub fn info(&self, message: impl fmt::Display) {
        self.log(Verbosity::Info, message);
    }

    pub fn debug(&self, message: impl fmt::Display) {
        self.log(Verbosity::Debug, message);
    }
}

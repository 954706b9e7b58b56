// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex};

/// Severity of a log line.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum LogLevel {
    /// Per-statement detail.
    Debug,
    /// Progress, e.g. a transaction attempt starting or ending.
    Info,
    /// Recoverable failure, e.g. a rolled back attempt that will be retried.
    Warn,
    /// Unrecoverable failure.
    Error,
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        })
    }
}

#[derive(Default)]
pub(crate) struct LoggerInner {
    pub(crate) lines: Vec<(LogLevel, String)>,
}

/// Thread-safe string logger. Clones share the same lines.
#[derive(Clone, Default)]
pub struct StringLogger {
    pub(crate) debug: bool,
    pub(crate) inner: Arc<Mutex<LoggerInner>>,
}

impl StringLogger {
    /// Create a new string logger which echoes every line to stdout if `debug`.
    pub fn new(debug: bool) -> Self {
        Self {
            debug,
            inner: Arc::new(Mutex::new(Default::default())),
        }
    }

    /// Record a line at the given level.
    pub fn log(&self, level: LogLevel, line: impl Into<String>) {
        let line = line.into();
        if line.is_empty() {
            return;
        }
        if self.debug {
            println!("{level}: {line}");
        }
        if let Ok(mut inner) = self.inner.lock() {
            inner.lines.push((level, line));
        }
    }

    /// Add a debug line.
    pub fn debug(&self, line: impl Into<String>) {
        self.log(LogLevel::Debug, line);
    }

    /// Add an informational line.
    pub fn info(&self, line: impl Into<String>) {
        self.log(LogLevel::Info, line);
    }

    /// Add a warning line.
    pub fn warn(&self, line: impl Into<String>) {
        self.log(LogLevel::Warn, line);
    }

    /// Add an error line.
    pub fn error(&self, line: impl Into<String>) {
        self.log(LogLevel::Error, line);
    }

    /// Whether the log contains any warnings or errors.
    pub fn contains_warnings(&self) -> bool {
        self.count_at_least(LogLevel::Warn) > 0
    }

    /// Number of lines at `level` or above.
    pub fn count_at_least(&self, level: LogLevel) -> usize {
        self.inner
            .lock()
            .map(|inner| inner.lines.iter().filter(|(l, _)| *l >= level).count())
            .unwrap_or(0)
    }

    /// Snapshot of the lines logged so far.
    pub fn lines(&self) -> Vec<(LogLevel, String)> {
        self.inner
            .lock()
            .map(|inner| inner.lines.clone())
            .unwrap_or_default()
    }

    /// Add all lines from the specified logger to this logger.
    pub fn extend(&self, other: &StringLogger) {
        if Arc::ptr_eq(&self.inner, &other.inner) {
            return;
        }
        for (level, line) in other.lines() {
            self.log(level, line);
        }
    }
}

impl Display for StringLogger {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let lines = self.lines();
        for (i, (level, line)) in lines.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{level}: {line}")?;
        }
        Ok(())
    }
}

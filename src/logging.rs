use std::collections::VecDeque;
use std::fmt;

const DEFAULT_RECENT_CAPACITY: usize = 64;

/// Severity levels recognised by the SDK logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Returns the canonical uppercase representation.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One retained log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub ts_ms: u64,
    pub level: LogLevel,
    pub message: String,
}

/// Level-gated logger keeping a bounded ring of recent entries.
///
/// The SDK never writes to stdout on the host's behalf; embedders read
/// `recent()` and forward entries to whatever console they own.
#[derive(Debug, Clone)]
pub struct SdkLogger {
    min_level: LogLevel,
    recent: VecDeque<LogEntry>,
    capacity: usize,
}

impl SdkLogger {
    /// Creates a logger; the debug flag lowers the threshold to `Debug`.
    pub fn new(debug: bool) -> Self {
        Self {
            min_level: if debug { LogLevel::Debug } else { LogLevel::Warn },
            recent: VecDeque::new(),
            capacity: DEFAULT_RECENT_CAPACITY,
        }
    }

    /// Current threshold.
    pub fn level(&self) -> LogLevel {
        self.min_level
    }

    /// Applies a dynamic level override.
    pub fn set_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    /// Records an entry if it clears the threshold.
    pub fn log(&mut self, ts_ms: u64, level: LogLevel, message: impl Into<String>) {
        if level < self.min_level {
            return;
        }
        self.recent.push_back(LogEntry {
            ts_ms,
            level,
            message: message.into(),
        });
        while self.recent.len() > self.capacity {
            self.recent.pop_front();
        }
    }

    pub fn debug(&mut self, ts_ms: u64, message: impl Into<String>) {
        self.log(ts_ms, LogLevel::Debug, message);
    }

    pub fn warn(&mut self, ts_ms: u64, message: impl Into<String>) {
        self.log(ts_ms, LogLevel::Warn, message);
    }

    pub fn error(&mut self, ts_ms: u64, message: impl Into<String>) {
        self.log(ts_ms, LogLevel::Error, message);
    }

    /// Retained entries, oldest first.
    pub fn recent(&self) -> impl Iterator<Item = &LogEntry> {
        self.recent.iter()
    }
}

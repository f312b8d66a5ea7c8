//! Structured JSON logger
//!
//! - One log line = one event
//! - Event first, then severity, then fields sorted by key
//! - Synchronous, no buffering
//!
//! A `Logger` is a plain value: the client owns one, and any builder may be
//! handed a different one for its own requests. There is no global switch.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::events::Event;

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Request and response bodies
    Trace = 0,
    /// Normal operations
    Info = 1,
    /// Partial failures, best-effort cleanup failures
    Warn = 2,
    /// Failed requests
    Error = 3,
}

impl Severity {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shared in-memory log destination
#[derive(Debug, Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    /// Everything written so far
    pub fn contents(&self) -> String {
        match self.0.lock() {
            Ok(buf) => String::from_utf8_lossy(&buf).into_owned(),
            Err(_) => String::new(),
        }
    }

    /// Every line parsed back into JSON
    pub fn records(&self) -> Vec<Value> {
        self.contents()
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    /// Records whose event matches
    pub fn events(&self, event: Event) -> Vec<Value> {
        self.records()
            .into_iter()
            .filter(|r| r["event"] == event.as_str())
            .collect()
    }

    fn append(&self, line: &str) {
        if let Ok(mut buf) = self.0.lock() {
            buf.extend_from_slice(line.as_bytes());
        }
    }
}

/// Where log lines go
#[derive(Debug, Clone)]
pub enum LogSink {
    /// INFO/TRACE/WARN to stdout, ERROR to stderr
    Console,
    /// Everything to stderr
    Stderr,
    /// Captured in memory
    Memory(LogBuffer),
}

/// A structured logger value
#[derive(Debug, Clone)]
pub struct Logger {
    level: Option<Severity>,
    sink: LogSink,
}

impl Default for Logger {
    fn default() -> Self {
        Self::disabled()
    }
}

impl Logger {
    /// A logger that writes nothing
    pub fn disabled() -> Self {
        Self {
            level: None,
            sink: LogSink::Console,
        }
    }

    /// Log to the console at or above `level`
    pub fn console(level: Severity) -> Self {
        Self {
            level: Some(level),
            sink: LogSink::Console,
        }
    }

    /// Log to stderr at or above `level`
    pub fn stderr(level: Severity) -> Self {
        Self {
            level: Some(level),
            sink: LogSink::Stderr,
        }
    }

    /// Log into a buffer the caller can inspect
    pub fn memory(level: Severity) -> (Self, LogBuffer) {
        let buffer = LogBuffer::default();
        let logger = Self {
            level: Some(level),
            sink: LogSink::Memory(buffer.clone()),
        };
        (logger, buffer)
    }

    /// Console logger at the configured level, or disabled
    pub fn from_level(level: Option<Severity>) -> Self {
        match level {
            Some(level) => Self::console(level),
            None => Self::disabled(),
        }
    }

    /// Returns true if a line at `severity` would be written
    pub fn enabled(&self, severity: Severity) -> bool {
        matches!(self.level, Some(min) if severity >= min)
    }

    /// Log an event with the given severity and fields
    pub fn log(&self, severity: Severity, event: Event, fields: &[(&str, &str)]) {
        if !self.enabled(severity) {
            return;
        }
        let line = Self::render_line(severity, event, fields);
        match &self.sink {
            LogSink::Console if severity >= Severity::Error => {
                Self::write_line(&mut io::stderr(), &line)
            }
            LogSink::Console => Self::write_line(&mut io::stdout(), &line),
            LogSink::Stderr => Self::write_line(&mut io::stderr(), &line),
            LogSink::Memory(buffer) => buffer.append(&line),
        }
    }

    /// Render one newline-terminated JSON line
    pub fn render_line(severity: Severity, event: Event, fields: &[(&str, &str)]) -> String {
        let sorted: BTreeMap<&str, &str> = fields.iter().copied().collect();

        let mut record = Map::new();
        record.insert("event".into(), Value::from(event.as_str()));
        record.insert("severity".into(), Value::from(severity.as_str()));
        for (key, value) in sorted {
            record.insert(key.to_string(), Value::from(value));
        }

        let mut line = Value::Object(record).to_string();
        line.push('\n');
        line
    }

    fn write_line<W: Write>(writer: &mut W, line: &str) {
        let _ = writer.write_all(line.as_bytes());
        let _ = writer.flush();
    }

    /// Log at TRACE level
    pub fn trace(&self, event: Event, fields: &[(&str, &str)]) {
        self.log(Severity::Trace, event, fields);
    }

    /// Log at INFO level
    pub fn info(&self, event: Event, fields: &[(&str, &str)]) {
        self.log(Severity::Info, event, fields);
    }

    /// Log at WARN level
    pub fn warn(&self, event: Event, fields: &[(&str, &str)]) {
        self.log(Severity::Warn, event, fields);
    }

    /// Log at ERROR level
    pub fn error(&self, event: Event, fields: &[(&str, &str)]) {
        self.log(Severity::Error, event, fields);
    }
}

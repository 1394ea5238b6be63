//! Log records
//!
//! A `LogRecord` is built once by a producer and only read afterwards. The
//! category is shared with the `Logger` that created it, so building a record
//! allocates only the message.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Local};

/// Record severity, ordered from least to most severe
///
/// `Off` is a filter value only; nothing is ever recorded at it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Critical,
    Off,
}

impl Level {
    /// Upper-case label used in rendered lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
            Self::Off => "OFF",
        }
    }

    /// Numeric severity (0 = trace .. 6 = off)
    #[inline]
    pub fn ordinal(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized level name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown level '{0}' (expected trace, debug, info, warn, error, critical or off)")]
pub struct ParseLevelError(String);

impl FromStr for Level {
    type Err = ParseLevelError;

    /// Case-insensitive; accepts `warning` and `none` as aliases
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" | "information" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "critical" => Ok(Self::Critical),
            "off" | "none" => Ok(Self::Off),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

/// Event identifier: numeric code plus optional name
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct EventId {
    id: i32,
    name: Option<Arc<str>>,
}

impl EventId {
    /// Event id without a name
    pub const fn new(id: i32) -> Self {
        Self { id, name: None }
    }

    /// Event id with a name
    pub fn named(id: i32, name: impl Into<Arc<str>>) -> Self {
        Self {
            id,
            name: Some(name.into()),
        }
    }

    #[inline]
    pub fn id(&self) -> i32 {
        self.id
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl From<i32> for EventId {
    fn from(id: i32) -> Self {
        Self::new(id)
    }
}

/// Formats as `1001` or `1001:FetchEmployee`
impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}:{}", self.id, name),
            None => write!(f, "{}", self.id),
        }
    }
}

/// Structured error payload attached to a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionInfo {
    /// Short type label (e.g. "Io")
    pub kind: String,
    /// Top-level error message
    pub message: String,
    /// Messages of the `source()` chain, outermost first
    pub sources: Vec<String>,
}

impl ExceptionInfo {
    /// Create a payload without a source chain
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            sources: Vec::new(),
        }
    }

    /// Capture an error and its `source()` chain
    pub fn from_error(kind: impl Into<String>, error: &(dyn std::error::Error + 'static)) -> Self {
        let mut sources = Vec::new();
        let mut next = error.source();
        while let Some(source) = next {
            sources.push(source.to_string());
            next = source.source();
        }

        Self {
            kind: kind.into(),
            message: error.to_string(),
            sources,
        }
    }
}

impl fmt::Display for ExceptionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        for source in &self.sources {
            write!(f, "; caused by: {}", source)?;
        }
        Ok(())
    }
}

/// One diagnostic event
#[derive(Debug, Clone)]
pub struct LogRecord {
    timestamp: DateTime<Local>,
    category: Arc<str>,
    level: Level,
    event_id: EventId,
    exception: Option<ExceptionInfo>,
    message: String,
}

impl LogRecord {
    /// Create a record stamped with the current local time
    pub fn new(
        category: impl Into<Arc<str>>,
        level: Level,
        event_id: impl Into<EventId>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Local::now(),
            category: category.into(),
            level,
            event_id: event_id.into(),
            exception: None,
            message: message.into(),
        }
    }

    /// Attach an error payload
    #[must_use]
    pub fn with_exception(mut self, exception: ExceptionInfo) -> Self {
        self.exception = Some(exception);
        self
    }

    /// Override the timestamp
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Local>) -> Self {
        self.timestamp = timestamp;
        self
    }

    #[inline]
    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    #[inline]
    pub fn category(&self) -> &str {
        &self.category
    }

    #[inline]
    pub fn level(&self) -> Level {
        self.level
    }

    #[inline]
    pub fn event_id(&self) -> &EventId {
        &self.event_id
    }

    #[inline]
    pub fn exception(&self) -> Option<&ExceptionInfo> {
        self.exception.as_ref()
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}
